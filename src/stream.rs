//! Splitting a memory write into bus-sized transfers.

use crate::protocol::{Frame, Header};

/// Position of a chunk within its logical write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Carries the memory write header. `last` is set when it is also the only chunk.
    First { last: bool },
    Middle,
    Last,
}

/// Byte range `offset..offset + len` of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub offset: usize,
    pub len: usize,
    pub kind: ChunkKind,
}

impl Chunk {
    pub fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn frame<'a>(&self, header: Header, data: &'a [u8]) -> Frame<'a> {
        match self.kind {
            ChunkKind::First { last } => Frame::Init {
                header,
                data,
                keep_active: !last,
            },
            ChunkKind::Middle => Frame::Chained(data),
            ChunkKind::Last => Frame::Final(data),
        }
    }
}

/// Iterator over the chunks of a `total`-byte write.
#[derive(Debug, Clone)]
pub struct Chunks {
    total: usize,
    max: usize,
    offset: usize,
}

/// Plans a write of `total` bytes in chunks of at most `max_chunk` bytes.
///
/// `max_chunk` is rounded down to a whole number of pixels (minimum one), so a
/// chunk never ends in the middle of a 2-byte pixel as long as `total` is even.
pub fn plan(total: usize, max_chunk: usize) -> Chunks {
    Chunks {
        total,
        max: (max_chunk & !1).max(2),
        offset: 0,
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.offset >= self.total {
            return None;
        }
        let len = (self.total - self.offset).min(self.max);
        let last = self.offset + len == self.total;
        let kind = match (self.offset == 0, last) {
            (true, last) => ChunkKind::First { last },
            (false, false) => ChunkKind::Middle,
            (false, true) => ChunkKind::Last,
        };
        let chunk = Chunk {
            offset: self.offset,
            len,
            kind,
        };
        self.offset += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.total - self.offset.min(self.total)).div_ceil(self.max);
        (n, Some(n))
    }
}
