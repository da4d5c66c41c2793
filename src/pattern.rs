use embedded_graphics_core::pixelcolor::{Rgb565, RgbColor};

use crate::{DrawSurface, Rotation};

const MARKER: u16 = 50;

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Scene",),
    async(feature = "async", keep_self)
)]
/// Content that can be redrawn from scratch, e.g. after the panel lost its
/// GRAM across a sleep cycle.
pub trait Scene<P: DrawSurface> {
    async fn render(&mut self, panel: &mut P) -> Result<(), P::Error>;
}

/// Orientation check: coloured squares in each corner and one in the centre.
///
/// Red marks the logical origin, so a wrong MADCTL or offset shows up at a
/// glance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestPattern;

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
impl<P: DrawSurface> Scene<P> for TestPattern {
    async fn render(&mut self, panel: &mut P) -> Result<(), P::Error> {
        let (width, height) = panel.dimensions();
        panel.fill_screen(Rgb565::BLACK).await?;

        let right = width.saturating_sub(MARKER);
        let bottom = height.saturating_sub(MARKER);
        let markers = [
            (0, 0, Rgb565::RED),
            (right, 0, Rgb565::GREEN),
            (right, bottom, Rgb565::BLUE),
            (0, bottom, Rgb565::WHITE),
            (
                (width / 2).saturating_sub(MARKER / 2),
                (height / 2).saturating_sub(MARKER / 2),
                Rgb565::YELLOW,
            ),
        ];
        for (x, y, color) in markers {
            panel.fill_rect(x, y, MARKER, MARKER, color).await?;
        }
        log::debug!("pattern: drawn at {}x{}", width, height);
        Ok(())
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), keep_self),
    async(feature = "async", keep_self)
)]
/// Steps panel and touch to the next rotation, clears the old frame and
/// redraws `scene` in the new orientation.
pub async fn rotate_and_redraw<P, S>(panel: &mut P, scene: &mut S) -> Result<Rotation, P::Error>
where
    P: DrawSurface,
    S: Scene<P>,
{
    let rotation = panel.rotation().next();
    log::info!("pattern: rotating to {} deg", rotation.degrees());
    panel.set_rotation(rotation).await?;
    panel.fill_screen(Rgb565::BLACK).await?;
    scene.render(panel).await?;
    Ok(rotation)
}
