//! QSPI command framing for the RM690B0.
//!
//! The panel's QSPI wrapper expects every transfer to start with a one byte
//! opcode followed by a 24-bit address whose middle byte is the DCS command:
//!
//! ```text
//! 02 00 <cmd> 00 [params...]       register write, single lane
//! 32 00 2C    00 [pixels...]       memory write, quad lane data
//! ```

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;
#[cfg(not(feature = "async"))]
use embedded_hal::spi::SpiBus;
#[cfg(feature = "async")]
use embedded_hal_async::spi::SpiBus;

/// Opcode for register writes.
pub const OPCODE_WRITE_REGISTER: u8 = 0x02;
/// Opcode for memory writes with quad-lane data phase.
pub const OPCODE_WRITE_QUAD: u8 = 0x32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Sleep Out (11h) - Exit low-power mode
    SleepOut = 0x11,
    /// Display On (29h) - Enable panel output
    DisplayOn = 0x29,
    /// Column Address Set (2Ah) - Horizontal addressing bounds
    ColumnAddressSet = 0x2A,
    /// Row Address Set (2Bh) - Vertical addressing bounds
    RowAddressSet = 0x2B,
    /// Memory Write (2Ch) - Write to memory
    MemoryWrite = 0x2C,
    /// Tearing Effect Line On (35h) - Enable VSync output
    TearingEffectEnable = 0x35,
    /// Memory Access Control (36h) - GRAM orientation/order
    MemoryAccessControl = 0x36,
    /// Pixel Format Set (3Ah) - Color depth configuration
    PixelFormatSet = 0x3A,
    /// Write Display Brightness (51h)
    WriteBrightness = 0x51,
    /// Command Page Select (FEh) - Switch between user and vendor pages
    PageSelect = 0xFE,
}

/// Opcode and 24-bit address that open a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub opcode: u8,
    pub address: u32,
}

impl Header {
    /// Register write header: `02 00 code 00`.
    pub const fn command(code: u8) -> Self {
        Self {
            opcode: OPCODE_WRITE_REGISTER,
            address: (code as u32) << 8,
        }
    }

    /// Memory write header: `32 00 2C 00`, or `02 00 2C 00` on a single lane.
    pub const fn memory_write(quad: bool) -> Self {
        Self {
            opcode: if quad {
                OPCODE_WRITE_QUAD
            } else {
                OPCODE_WRITE_REGISTER
            },
            address: (Instruction::MemoryWrite as u32) << 8,
        }
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        [
            self.opcode,
            (self.address >> 16) as u8,
            (self.address >> 8) as u8,
            self.address as u8,
        ]
    }
}

/// One physical transfer of a logical write.
///
/// A logical write is either a single `Init` frame with `keep_active: false`,
/// or an `Init` frame with `keep_active: true` followed by zero or more
/// `Chained` frames and exactly one `Final` frame. Chip-select stays asserted
/// from the `Init` frame until the end of the `Final` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Init {
        header: Header,
        data: &'a [u8],
        keep_active: bool,
    },
    Chained(&'a [u8]),
    Final(&'a [u8]),
}

impl Frame<'_> {
    pub fn data(&self) -> &[u8] {
        match self {
            Frame::Init { data, .. } | Frame::Chained(data) | Frame::Final(data) => data,
        }
    }

    /// Whether chip-select must stay asserted after this frame.
    pub fn keeps_active(&self) -> bool {
        match self {
            Frame::Init { keep_active, .. } => *keep_active,
            Frame::Chained(_) => true,
            Frame::Final(_) => false,
        }
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "QspiBus",),
    async(feature = "async", keep_self)
)]
/// Exclusive access to the panel bus.
///
/// The driver brackets every logical write with `acquire` and `release`, so
/// frames of two logical writes never interleave. Implementations sharing the
/// bus with other devices lock it in `acquire`.
pub trait QspiBus {
    type Error;

    async fn acquire(&mut self) -> Result<(), Self::Error>;

    async fn transmit(&mut self, frame: Frame<'_>) -> Result<(), Self::Error>;

    /// Ends ownership. Must leave chip-select deasserted even if a held
    /// transfer was cut short.
    async fn release(&mut self) -> Result<(), Self::Error>;
}

/// [`QspiBus`] over a plain SPI bus and a manually driven chip-select.
///
/// Header and data are clocked out on the same lane, which suits boards that
/// wire the panel in single-lane mode (use `Config { quad: false, .. }`).
pub struct SpiQspiBus<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin<Error = Infallible>,
{
    spi: SPI,
    cs: CS,
    selected: bool,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "SpiQspiBus",),
    async(feature = "async", keep_self)
)]
impl<SPI, CS> SpiQspiBus<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin<Error = Infallible>,
{
    pub fn new(spi: SPI, mut cs: CS) -> Self {
        let Ok(()) = cs.set_high();
        Self {
            spi,
            cs,
            selected: false,
        }
    }

    pub fn into_inner(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn select(&mut self, selected: bool) {
        let Ok(()) = if selected {
            self.cs.set_low()
        } else {
            self.cs.set_high()
        };
        self.selected = selected;
    }

    async fn write_data(&mut self, data: &[u8], end: bool) -> Result<(), SPI::Error> {
        if !data.is_empty() {
            self.spi.write(data).await?;
        }
        if end {
            self.spi.flush().await?;
            self.select(false);
        }
        Ok(())
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<SPI, CS> QspiBus for SpiQspiBus<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin<Error = Infallible>,
{
    type Error = SPI::Error;

    async fn acquire(&mut self) -> Result<(), Self::Error> {
        // Ownership of `spi` is already exclusive.
        Ok(())
    }

    async fn transmit(&mut self, frame: Frame<'_>) -> Result<(), Self::Error> {
        match frame {
            Frame::Init {
                header,
                data,
                keep_active,
            } => {
                self.select(true);
                self.spi.write(&header.to_bytes()).await?;
                self.write_data(data, !keep_active).await
            }
            Frame::Chained(data) => self.write_data(data, false).await,
            Frame::Final(data) => self.write_data(data, true).await,
        }
    }

    async fn release(&mut self) -> Result<(), Self::Error> {
        if !self.selected {
            return Ok(());
        }
        let flushed = self.spi.flush().await;
        self.select(false);
        flushed
    }
}
