//! Finger painting: a small brush stamped under every touch.

use core::marker::PhantomData;

use embedded_graphics_core::pixelcolor::{Rgb565, RgbColor};
#[cfg(not(feature = "async"))]
use embedded_hal::i2c::I2c;
#[cfg(feature = "async")]
use embedded_hal_async::i2c::I2c;

use crate::touch::{self, Ft6336u, TouchPoint};
use crate::{DrawSurface, Timer};

/// Touch sampling period
pub const PAINT_INTERVAL_MS: u64 = 10;
/// Default brush edge length
pub const BRUSH_SIZE: u16 = 4;

#[derive(Debug)]
pub enum Error<D, T> {
    /// Panel operation failed
    Display(D),
    /// Touch controller failed
    Touch(T),
}

pub struct TouchPainter<I2C, TIMER>
where
    I2C: I2c,
    TIMER: Timer,
{
    touch: Ft6336u<I2C>,
    brush: u16,
    color: Rgb565,
    _timer: PhantomData<TIMER>,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "TouchPainter",),
    async(feature = "async", keep_self)
)]
impl<I2C, E, TIMER> TouchPainter<I2C, TIMER>
where
    I2C: I2c<Error = E>,
    TIMER: Timer,
{
    /// Cyan brush of [`BRUSH_SIZE`] pixels.
    pub fn new(touch: Ft6336u<I2C>) -> Self {
        Self::with_brush(touch, BRUSH_SIZE, Rgb565::CYAN)
    }

    pub fn with_brush(touch: Ft6336u<I2C>, size: u16, color: Rgb565) -> Self {
        Self {
            touch,
            brush: size,
            color,
            _timer: PhantomData,
        }
    }

    /// Stamps the brush centred on `point`, clamped at the top-left edges.
    pub async fn paint<P: DrawSurface>(&self, panel: &mut P, point: TouchPoint) -> Result<(), P::Error> {
        let half = self.brush / 2;
        panel
            .fill_rect(
                point.x.saturating_sub(half),
                point.y.saturating_sub(half),
                self.brush,
                self.brush,
                self.color,
            )
            .await
    }

    /// Samples the touch controller once, in the panel's current rotation,
    /// and paints the point if there is one.
    pub async fn step<P: DrawSurface>(
        &mut self,
        panel: &mut P,
    ) -> Result<Option<TouchPoint>, Error<P::Error, touch::Error<E>>> {
        let point = self
            .touch
            .read(panel.touch_mapper())
            .await
            .map_err(Error::Touch)?;
        if let Some(point) = point {
            self.paint(panel, point).await.map_err(Error::Display)?;
        }
        Ok(point)
    }

    /// Paints every [`PAINT_INTERVAL_MS`] until the touch controller or the
    /// panel fails, and returns that failure.
    pub async fn run<P: DrawSurface>(&mut self, panel: &mut P) -> Error<P::Error, touch::Error<E>> {
        log::info!("paint: started");
        loop {
            if let Err(e) = self.step(panel).await {
                log::error!("paint: stopped on error");
                return e;
            }
            TIMER::delay_ms(PAINT_INTERVAL_MS).await;
        }
    }

    pub fn release(self) -> Ft6336u<I2C> {
        self.touch
    }
}
