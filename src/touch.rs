//! FT6336U capacitive touch controller and rotation-aware sample mapping.

#[cfg(not(feature = "async"))]
use embedded_hal::i2c::I2c;
#[cfg(feature = "async")]
use embedded_hal_async::i2c::I2c;

use crate::rotation::Rotation;

/// Default 7-bit I2C address
pub const FT6336U_ADDRESS: u8 = 0x38;

const REG_TOUCH_COUNT: u8 = 0x02;
const REG_CHIP_ID: u8 = 0xA8;

/// Sample in the sensor's fixed 450x600 portrait frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub x: u16,
    pub y: u16,
}

/// Sample in logical display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchPoint {
    pub x: u16,
    pub y: u16,
}

/// Raw-to-logical mapping for the active rotation.
///
/// Owned by the panel driver and only changed together with the panel's
/// MADCTL, so the two cannot disagree. Borrow it with
/// [`Rm690b0::touch_mapper`](crate::Rm690b0::touch_mapper) at the time of
/// sampling rather than keeping a copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TouchMapper {
    rotation: Rotation,
}

impl TouchMapper {
    pub(crate) const fn new(rotation: Rotation) -> Self {
        Self { rotation }
    }

    pub(crate) fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
        log::debug!("touch: rotation set to {} deg", rotation.degrees());
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn map(&self, sample: TouchSample) -> TouchPoint {
        let (x, y) = self.rotation.map_touch(sample.x, sample.y);
        TouchPoint { x, y }
    }
}

#[derive(Debug)]
pub enum Error<E = ()> {
    /// Bus error
    I2c(E),
    /// `read` called before `init`
    NotInitialized,
}

/// Decodes a register dump starting at TD_STATUS (02h).
///
/// Returns `None` unless one or two fingers are reported.
pub fn decode(data: &[u8; 5]) -> Option<TouchSample> {
    let count = data[0] & 0x0F;
    if count == 0 || count > 2 {
        return None;
    }
    // Upper two bits of the X/Y high bytes carry event flags and touch id.
    let x = u16::from(data[1] & 0x0F) << 8 | u16::from(data[2]);
    let y = u16::from(data[3] & 0x0F) << 8 | u16::from(data[4]);
    Some(TouchSample { x, y })
}

pub struct Ft6336u<I2C>
where
    I2C: I2c,
{
    i2c: I2C,
    address: u8,
    chip_id: Option<u8>,
    initialized: bool,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Ft6336u",),
    async(feature = "async", keep_self)
)]
impl<I2C, E> Ft6336u<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, FT6336U_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            chip_id: None,
            initialized: false,
        }
    }

    /// Probes the chip id.
    ///
    /// A controller that does not answer may simply be asleep, so the device is
    /// marked usable either way; the id is `None` if the probe failed.
    pub async fn init(&mut self) -> Option<u8> {
        let mut id = [0u8];
        self.chip_id = match self
            .i2c
            .write_read(self.address, &[REG_CHIP_ID], &mut id)
            .await
        {
            Ok(()) => {
                log::info!("touch: FT6336U chip id 0x{:02X}", id[0]);
                Some(id[0])
            }
            Err(_) => {
                log::warn!("touch: no answer from FT6336U at 0x{:02X}", self.address);
                None
            }
        };
        self.initialized = true;
        self.chip_id
    }

    pub fn chip_id(&self) -> Option<u8> {
        self.chip_id
    }

    /// Reads the first touch point in the sensor's native frame.
    pub async fn read_raw(&mut self) -> Result<Option<TouchSample>, Error<E>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        let mut data = [0u8; 5];
        self.i2c
            .write_read(self.address, &[REG_TOUCH_COUNT], &mut data)
            .await
            .map_err(Error::I2c)?;
        Ok(decode(&data))
    }

    /// Reads the first touch point in logical coordinates.
    pub async fn read(&mut self, mapper: &TouchMapper) -> Result<Option<TouchPoint>, Error<E>> {
        Ok(self.read_raw().await?.map(|sample| mapper.map(sample)))
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
