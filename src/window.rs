/// Address window in panel-native coordinates, rotation offset applied.
///
/// The column range always starts on an even pixel and ends on an odd one:
/// the RM690B0 addresses GRAM columns in two-pixel words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

impl Window {
    /// Builds the window for the inclusive logical rectangle `(x1, y1)-(x2, y2)`.
    ///
    /// No clipping against the panel extents is done.
    pub fn new(x1: u16, y1: u16, x2: u16, y2: u16, offset: (u16, u16)) -> Self {
        let (dx, dy) = offset;
        Self {
            x1: x1.saturating_add(dx) & !1,
            y1: y1.saturating_add(dy),
            x2: x2.saturating_add(dx) | 1,
            y2: y2.saturating_add(dy),
        }
    }

    /// CASET parameters, big-endian start and end.
    pub fn columns(&self) -> [u8; 4] {
        range_bytes(self.x1, self.x2)
    }

    /// RASET parameters, big-endian start and end.
    pub fn rows(&self) -> [u8; 4] {
        range_bytes(self.y1, self.y2)
    }
}

fn range_bytes(start: u16, end: u16) -> [u8; 4] {
    let [s0, s1] = start.to_be_bytes();
    let [e0, e1] = end.to_be_bytes();
    [s0, s1, e0, e1]
}
