#![cfg_attr(not(test), no_std)]

use core::convert::Infallible;

use embedded_graphics_core::pixelcolor::{Rgb565, raw::RawU16};
use embedded_graphics_core::prelude::RawData;
use embedded_hal::digital::OutputPin;

pub mod paint;
pub mod pattern;
pub mod power;
pub mod protocol;
pub mod rotation;
pub mod stream;
pub mod touch;
pub mod window;

#[cfg(all(test, feature = "async"))]
mod mock;

pub use paint::TouchPainter;
pub use pattern::{Scene, TestPattern, rotate_and_redraw};
pub use protocol::{Frame, Header, Instruction, QspiBus, SpiQspiBus};
pub use rotation::{Geometry, Rotation};
pub use touch::{Ft6336u, TouchMapper, TouchPoint, TouchSample};
pub use window::Window;

// Screen dimensions for RM690B0 450RGB×600, native portrait
pub const SCREEN_WIDTH: u16 = 450; // Physical width (short edge)
pub const SCREEN_HEIGHT: u16 = 600; // Physical height (long edge)

// Recommended buffer size for pixel conversion and solid fills
pub const BUF_SIZE: usize = 16 * 1024;
// Largest single physical transfer
pub const MAX_CHUNK_BYTES: usize = 32 * 1024;

// Quiet time the panel needs after CASET/RASET before pixel data
const WINDOW_SETTLE_MS: u64 = 1;
// Recovery time after a full-frame write
const FILL_RECOVERY_MS: u64 = 10;

#[derive(Clone, Copy)]
pub struct Config {
    /// Brightness applied at the end of bring-up
    pub brightness: u8,
    /// Pixel data on four lanes (opcode 32h) instead of one (02h)
    pub quad: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brightness: 0xFF,
            quad: true,
        }
    }
}

#[derive(Debug)]
pub enum Error<E = ()> {
    /// Communication error
    Comm(E),
    /// Pin setting error
    Pin(Infallible),
    /// Caller buffer cannot hold a single pixel
    BufferTooSmall,
    /// Raw pixel data is not a whole number of pixels
    OddLength,
    /// Panel not brought up, or its state was lost to a bus error
    NotInitialized,
}

#[derive(Clone, Copy)]
enum Source<'p> {
    Raw(&'p [u8]),
    Pixels(&'p [Rgb565]),
    // buffer already holds the colour
    Solid,
}

/// One live RM690B0 session.
///
/// Rotation, window offsets, and the touch mapping live here and change only
/// through [`set_rotation`](Self::set_rotation) and [`bring_up`](Self::bring_up).
pub struct Rm690b0<'b, BUS, RST, TIMER>
where
    BUS: QspiBus,
    RST: OutputPin<Error = Infallible>,
    TIMER: Timer,
{
    bus: BUS,
    rst: RST,
    config: Config,
    buffer: &'b mut [u8],
    rotation: Rotation,
    touch: TouchMapper,
    ready: bool,
    _timer: core::marker::PhantomData<TIMER>,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Rm690b0",),
    async(feature = "async", keep_self)
)]
impl<'b, BUS, RST, E, TIMER> Rm690b0<'b, BUS, RST, TIMER>
where
    BUS: QspiBus<Error = E>,
    RST: OutputPin<Error = Infallible>,
    TIMER: Timer,
{
    pub fn new(config: Config, bus: BUS, rst: RST, buffer: &'b mut [u8]) -> Self {
        Self {
            bus,
            rst,
            config,
            buffer,
            rotation: Rotation::Deg0,
            touch: TouchMapper::new(Rotation::Deg0),
            ready: false,
            _timer: core::marker::PhantomData,
        }
    }

    /// Resets and fully initializes the panel.
    ///
    /// Assumes nothing about prior register state, so it serves both first
    /// boot and every wake after the panel rail was cut. Leaves rotation at
    /// `Deg0` for panel and touch alike.
    pub async fn bring_up(&mut self) -> Result<(), Error<E>> {
        self.ready = false;
        log::info!("rm690b0: bring-up");
        self.init_sequence().await?;
        self.ready = true;
        log::info!("rm690b0: bring-up complete");
        Ok(())
    }

    async fn init_sequence(&mut self) -> Result<(), Error<E>> {
        self.reset().await?;

        // Vendor page 20h: panel voltage setup
        self.write_command(Instruction::PageSelect as u8, &[0x20])
            .await?;
        self.write_command(0x26, &[0x0A]).await?;
        self.write_command(0x24, &[0x80]).await?;
        self.write_command(0x5A, &[0x51]).await?;
        self.write_command(0x5B, &[0x2E]).await?;
        self.write_command(Instruction::PageSelect as u8, &[0x00])
            .await?;

        self.write_command(Instruction::PixelFormatSet as u8, &[0x55])
            .await?; // 16-bit color
        self.write_command(0xC2, &[]).await?;
        TIMER::delay_ms(10).await;

        self.write_command(Instruction::TearingEffectEnable as u8, &[0x00])
            .await?;
        self.write_command(Instruction::WriteBrightness as u8, &[0x00])
            .await?;

        self.write_command(Instruction::SleepOut as u8, &[]).await?;
        TIMER::delay_ms(120).await;

        // Register state is gone after a power cut; never trust the old rotation.
        self.apply_rotation(Rotation::Deg0).await?;

        self.write_command(Instruction::DisplayOn as u8, &[]).await?;
        TIMER::delay_ms(120).await;

        self.write_command(Instruction::WriteBrightness as u8, &[self.config.brightness])
            .await?;
        Ok(())
    }

    pub async fn reset(&mut self) -> Result<(), Error<E>> {
        self.rst.set_high().map_err(Error::Pin)?;
        TIMER::delay_ms(20).await;
        self.rst.set_low().map_err(Error::Pin)?;
        TIMER::delay_ms(100).await;
        self.rst.set_high().map_err(Error::Pin)?;
        TIMER::delay_ms(100).await; // Wait for reset to complete

        Ok(())
    }

    /// Write command with optional parameters as one framed transfer.
    ///
    /// A failed transfer leaves the panel in an unknown state; the session
    /// refuses draw calls until the next successful [`bring_up`](Self::bring_up).
    pub async fn write_command(&mut self, cmd: u8, params: &[u8]) -> Result<(), Error<E>> {
        let frame = Frame::Init {
            header: Header::command(cmd),
            data: params,
            keep_active: false,
        };
        let result = self.transact(frame).await.map_err(Error::Comm);
        self.check(result)
    }

    async fn transact(&mut self, frame: Frame<'_>) -> Result<(), E> {
        self.bus.acquire().await?;
        let sent = self.bus.transmit(frame).await;
        let released = self.bus.release().await;
        sent.and(released)
    }

    fn check<T>(&mut self, result: Result<T, Error<E>>) -> Result<T, Error<E>> {
        if let Err(Error::Comm(_)) = result {
            log::error!("rm690b0: bus transfer failed, panel needs bring-up");
            self.ready = false;
        }
        result
    }

    fn ensure_ready(&self) -> Result<(), Error<E>> {
        if self.ready {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Marks the panel state as lost after its supply rail was cut.
    ///
    /// Draw calls return [`Error::NotInitialized`] until the next successful
    /// [`bring_up`](Self::bring_up).
    pub fn power_down(&mut self) {
        if self.ready {
            log::info!("rm690b0: powered down, bring-up required");
        }
        self.ready = false;
    }

    /// Rotates panel and touch mapping together.
    pub async fn set_rotation(&mut self, rotation: Rotation) -> Result<(), Error<E>> {
        self.ensure_ready()?;
        self.apply_rotation(rotation).await
    }

    async fn apply_rotation(&mut self, rotation: Rotation) -> Result<(), Error<E>> {
        let geometry = rotation.geometry();
        self.rotation = rotation;
        self.touch.set_rotation(rotation);
        log::info!(
            "rm690b0: rotation {} deg: {}x{} (offset {},{})",
            rotation.degrees(),
            geometry.width,
            geometry.height,
            geometry.offset_x,
            geometry.offset_y
        );
        self.write_command(Instruction::MemoryAccessControl as u8, &[geometry.madctl])
            .await
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Get logical screen dimensions (after rotation)
    pub fn dimensions(&self) -> (u16, u16) {
        let geometry = self.rotation.geometry();
        (geometry.width, geometry.height)
    }

    /// Window offset of the active rotation
    pub fn offset(&self) -> (u16, u16) {
        let geometry = self.rotation.geometry();
        (geometry.offset_x, geometry.offset_y)
    }

    pub fn touch_mapper(&self) -> &TouchMapper {
        &self.touch
    }

    pub async fn set_brightness(&mut self, level: u8) -> Result<(), Error<E>> {
        self.ensure_ready()?;
        self.write_command(Instruction::WriteBrightness as u8, &[level])
            .await
    }

    /// Sets the address window for the inclusive logical rectangle.
    ///
    /// Coordinates are not clipped to the panel.
    pub async fn set_window(&mut self, x1: u16, y1: u16, x2: u16, y2: u16) -> Result<(), Error<E>> {
        self.ensure_ready()?;
        let window = Window::new(x1, y1, x2, y2, self.offset());

        self.write_command(Instruction::ColumnAddressSet as u8, &window.columns())
            .await?;
        self.write_command(Instruction::RowAddressSet as u8, &window.rows())
            .await?;
        TIMER::delay_ms(WINDOW_SETTLE_MS).await;
        Ok(())
    }

    /// Streams pixels into the current window.
    ///
    /// Pixels are converted to big-endian through the driver buffer one chunk
    /// at a time.
    pub async fn write_pixels(&mut self, pixels: &[Rgb565]) -> Result<(), Error<E>> {
        self.ensure_ready()?;
        if pixels.is_empty() {
            return Ok(());
        }
        let chunk = self.chunk_capacity()?;
        self.stream(Source::Pixels(pixels), pixels.len() * 2, chunk)
            .await
    }

    /// Streams already big-endian RGB565 bytes into the current window.
    pub async fn write_pixels_raw(&mut self, data: &[u8]) -> Result<(), Error<E>> {
        self.ensure_ready()?;
        if data.is_empty() {
            return Ok(());
        }
        if data.len() % 2 != 0 {
            return Err(Error::OddLength);
        }
        self.stream(Source::Raw(data), data.len(), MAX_CHUNK_BYTES)
            .await
    }

    /// Fill entire screen with a single color
    pub async fn fill_screen(&mut self, color: Rgb565) -> Result<(), Error<E>> {
        self.ensure_ready()?;
        let chunk = self.chunk_capacity()?;
        let (width, height) = self.dimensions();
        self.set_window(0, 0, width - 1, height - 1).await?;
        self.fill_solid(width as usize * height as usize, color, chunk)
            .await?;
        TIMER::delay_ms(FILL_RECOVERY_MS).await;
        Ok(())
    }

    /// Fill a rectangular area with a color
    pub async fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Rgb565,
    ) -> Result<(), Error<E>> {
        if width == 0 || height == 0 {
            return Ok(()); // Nothing to draw
        }
        self.ensure_ready()?;
        let chunk = self.chunk_capacity()?;
        // Clamped at the end of the address space; stream only what fits.
        let x2 = x.saturating_add(width - 1);
        let y2 = y.saturating_add(height - 1);
        self.set_window(x, y, x2, y2).await?;
        let count = (x2 - x + 1) as usize * (y2 - y + 1) as usize;
        self.fill_solid(count, color, chunk).await
    }

    async fn fill_solid(&mut self, count: usize, color: Rgb565, chunk: usize) -> Result<(), Error<E>> {
        let total = count * 2;
        let bytes = RawU16::from(color).into_inner().to_be_bytes();
        // The same chunk is sent over and over; only prepare what is used.
        let used = total.min(chunk);
        for px in self.buffer[..used].chunks_exact_mut(2) {
            px.copy_from_slice(&bytes);
        }
        self.stream(Source::Solid, total, chunk).await
    }

    fn chunk_capacity(&self) -> Result<usize, Error<E>> {
        let capacity = self.buffer.len().min(MAX_CHUNK_BYTES) & !1;
        if capacity == 0 {
            log::error!("rm690b0: pixel buffer too small");
            return Err(Error::BufferTooSmall);
        }
        Ok(capacity)
    }

    /// One logical memory write, chip-select held across every chunk.
    async fn stream(&mut self, source: Source<'_>, total: usize, chunk: usize) -> Result<(), Error<E>> {
        let result = match self.bus.acquire().await {
            Ok(()) => {
                let sent = self.stream_chunks(source, total, chunk).await;
                let released = self.bus.release().await.map_err(Error::Comm);
                sent.and(released)
            }
            Err(e) => Err(Error::Comm(e)),
        };
        self.check(result)
    }

    async fn stream_chunks(&mut self, source: Source<'_>, total: usize, chunk: usize) -> Result<(), Error<E>> {
        let header = Header::memory_write(self.config.quad);
        for c in stream::plan(total, chunk) {
            let data: &[u8] = match source {
                Source::Raw(bytes) => &bytes[c.range()],
                Source::Pixels(pixels) => {
                    let pixels = &pixels[c.offset / 2..(c.offset + c.len) / 2];
                    for (dst, px) in self.buffer[..c.len].chunks_exact_mut(2).zip(pixels) {
                        dst.copy_from_slice(&RawU16::from(*px).into_inner().to_be_bytes());
                    }
                    &self.buffer[..c.len]
                }
                Source::Solid => &self.buffer[..c.len],
            };
            self.bus
                .transmit(c.frame(header, data))
                .await
                .map_err(Error::Comm)?;
        }
        Ok(())
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "DrawSurface",),
    async(feature = "async", keep_self)
)]
/// The draw API the power controller and scenes work against.
pub trait DrawSurface {
    type Error;

    async fn bring_up(&mut self) -> Result<(), Self::Error>;

    fn rotation(&self) -> Rotation;

    async fn set_rotation(&mut self, rotation: Rotation) -> Result<(), Self::Error>;

    fn dimensions(&self) -> (u16, u16);

    /// Touch mapping matching the current rotation.
    fn touch_mapper(&self) -> &TouchMapper;

    /// Forgets panel state after its supply was cut; only `bring_up` restores it.
    fn power_down(&mut self);

    async fn fill_screen(&mut self, color: Rgb565) -> Result<(), Self::Error>;

    async fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Rgb565,
    ) -> Result<(), Self::Error>;
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<BUS, RST, E, TIMER> DrawSurface for Rm690b0<'_, BUS, RST, TIMER>
where
    BUS: QspiBus<Error = E>,
    RST: OutputPin<Error = Infallible>,
    TIMER: Timer,
{
    type Error = Error<E>;

    async fn bring_up(&mut self) -> Result<(), Self::Error> {
        Self::bring_up(self).await
    }

    fn rotation(&self) -> Rotation {
        Self::rotation(self)
    }

    async fn set_rotation(&mut self, rotation: Rotation) -> Result<(), Self::Error> {
        Self::set_rotation(self, rotation).await
    }

    fn dimensions(&self) -> (u16, u16) {
        Self::dimensions(self)
    }

    fn touch_mapper(&self) -> &TouchMapper {
        Self::touch_mapper(self)
    }

    fn power_down(&mut self) {
        Self::power_down(self)
    }

    async fn fill_screen(&mut self, color: Rgb565) -> Result<(), Self::Error> {
        Self::fill_screen(self, color).await
    }

    async fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Rgb565,
    ) -> Result<(), Self::Error> {
        Self::fill_rect(self, x, y, width, height, color).await
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Timer",),
    async(feature = "async", keep_self)
)]
/// Simplified timer trait for delay operations.
pub trait Timer {
    /// Delay for the specified number of milliseconds.
    async fn delay_ms(milliseconds: u64);
}

/// [`Timer`] backed by the embassy time driver.
#[cfg(all(feature = "embassy-time", feature = "async"))]
pub struct EmbassyTimer;

#[cfg(all(feature = "embassy-time", feature = "async"))]
impl Timer for EmbassyTimer {
    async fn delay_ms(milliseconds: u64) {
        embassy_time::Timer::after_millis(milliseconds).await;
    }
}
