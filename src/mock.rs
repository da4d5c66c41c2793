//! In-memory stand-ins for the bus, pins, touch controller and board services.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::i2c::{ErrorKind as I2cErrorKind, NoAcknowledgeSource};
use embedded_hal::spi::ErrorKind as SpiErrorKind;
use embedded_hal_async::i2c::{I2c, Operation};
use embedded_hal_async::spi::SpiBus;

use crate::power::Platform;
use crate::{Frame, QspiBus, Timer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Acquire,
    Init {
        header: [u8; 4],
        data: Vec<u8>,
        keep_active: bool,
    },
    Chained(Vec<u8>),
    Final(Vec<u8>),
    Release,
}

impl BusEvent {
    pub fn data(&self) -> &[u8] {
        match self {
            BusEvent::Init { data, .. } | BusEvent::Chained(data) | BusEvent::Final(data) => data,
            BusEvent::Acquire | BusEvent::Release => &[],
        }
    }

    pub fn data_len(&self) -> usize {
        self.data().len()
    }
}

#[derive(Debug)]
pub struct BusFault;

/// Records every frame. Failed transmits leave no event behind.
#[derive(Default)]
pub struct MockBus {
    pub events: Vec<BusEvent>,
    /// Number of transmits that still succeed before one fails
    pub fail_transmit_after: Option<usize>,
    /// Every transmit fails while set
    pub offline: Rc<Cell<bool>>,
}

impl QspiBus for MockBus {
    type Error = BusFault;

    async fn acquire(&mut self) -> Result<(), BusFault> {
        self.events.push(BusEvent::Acquire);
        Ok(())
    }

    async fn transmit(&mut self, frame: Frame<'_>) -> Result<(), BusFault> {
        if self.offline.get() {
            return Err(BusFault);
        }
        match self.fail_transmit_after {
            Some(0) => return Err(BusFault),
            Some(n) => self.fail_transmit_after = Some(n - 1),
            None => {}
        }
        self.events.push(match frame {
            Frame::Init {
                header,
                data,
                keep_active,
            } => BusEvent::Init {
                header: header.to_bytes(),
                data: data.to_vec(),
                keep_active,
            },
            Frame::Chained(data) => BusEvent::Chained(data.to_vec()),
            Frame::Final(data) => BusEvent::Final(data.to_vec()),
        });
        Ok(())
    }

    async fn release(&mut self) -> Result<(), BusFault> {
        self.events.push(BusEvent::Release);
        Ok(())
    }
}

thread_local! {
    static ELAPSED_MS: Cell<u64> = const { Cell::new(0) };
}

/// Adds requested delays to a per-thread clock instead of sleeping.
pub struct MockTimer;

impl MockTimer {
    pub fn reset() {
        ELAPSED_MS.with(|t| t.set(0));
    }

    pub fn elapsed() -> u64 {
        ELAPSED_MS.with(|t| t.get())
    }
}

impl Timer for MockTimer {
    async fn delay_ms(milliseconds: u64) {
        ELAPSED_MS.with(|t| t.set(t.get() + milliseconds));
    }
}

pub struct NoopPin;

impl PinErrorType for NoopPin {
    type Error = Infallible;
}

impl OutputPin for NoopPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Every level driven on a [`RecordingPin`], `true` for high.
#[derive(Default, Clone)]
pub struct PinLog(Rc<RefCell<Vec<bool>>>);

impl PinLog {
    pub fn levels(&self) -> Vec<bool> {
        self.0.borrow().clone()
    }
}

pub struct RecordingPin {
    log: PinLog,
}

impl RecordingPin {
    pub fn new(log: &PinLog) -> Self {
        Self { log: log.clone() }
    }
}

impl PinErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.0.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.0.borrow_mut().push(true);
        Ok(())
    }
}

/// Active-low button replaying a press script; released once it runs out.
pub struct ScriptedButton {
    script: Vec<bool>,
    reads: usize,
}

impl ScriptedButton {
    pub fn new(script: &[bool]) -> Self {
        Self {
            script: script.to_vec(),
            reads: 0,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    fn sample(&mut self) -> bool {
        let pressed = self.script.get(self.reads).copied().unwrap_or(false);
        self.reads += 1;
        pressed
    }
}

impl PinErrorType for ScriptedButton {
    type Error = Infallible;
}

impl InputPin for ScriptedButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.sample())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.sample())
    }
}

#[derive(Default)]
pub struct MockSpi {
    pub written: Vec<u8>,
    /// Number of writes that still succeed before every further one fails
    pub fail_writes_after: Option<usize>,
    writes: usize,
}

impl MockSpi {
    fn record(&mut self, data: &[u8]) -> Result<(), SpiErrorKind> {
        if self.fail_writes_after.is_some_and(|limit| self.writes >= limit) {
            return Err(SpiErrorKind::Other);
        }
        self.writes += 1;
        self.written.extend_from_slice(data);
        Ok(())
    }
}

impl embedded_hal::spi::ErrorType for MockSpi {
    type Error = SpiErrorKind;
}

impl SpiBus for MockSpi {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), SpiErrorKind> {
        words.fill(0);
        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), SpiErrorKind> {
        self.record(words)
    }

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), SpiErrorKind> {
        self.record(write)?;
        read.fill(0);
        Ok(())
    }

    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), SpiErrorKind> {
        self.record(words)?;
        words.fill(0);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SpiErrorKind> {
        Ok(())
    }
}

/// Register file behind an auto-incrementing pointer, like the FT6336U.
pub struct MockI2c {
    pub registers: [u8; 256],
    /// NACK every transaction
    pub fail: bool,
    pub last_address: Option<u8>,
    pointer: u8,
}

impl Default for MockI2c {
    fn default() -> Self {
        Self {
            registers: [0; 256],
            fail: false,
            last_address: None,
            pointer: 0,
        }
    }
}

impl embedded_hal::i2c::ErrorType for MockI2c {
    type Error = I2cErrorKind;
}

impl I2c for MockI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), I2cErrorKind> {
        self.last_address = Some(address);
        if self.fail {
            return Err(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some(&register) = bytes.first() {
                        self.pointer = register;
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.registers[self.pointer as usize];
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    DisplayPower(bool),
    LatchHold(bool),
    WakeSourceEnabled,
    Suspend,
}

#[derive(Debug)]
pub struct PlatformFault;

#[derive(Default)]
pub struct MockPlatform {
    pub events: Vec<PlatformEvent>,
    pub fail_power_off: bool,
    pub fail_power_on: bool,
    pub fail_wake_source: bool,
    /// Fails engaging the hold; releasing it always succeeds
    pub fail_latch_hold: bool,
    /// Flag raised on suspend, e.g. a panel bus's `offline`
    pub cut_bus_on_suspend: Option<Rc<Cell<bool>>>,
}

impl Platform for MockPlatform {
    type Error = PlatformFault;

    async fn set_display_power(&mut self, enable: bool) -> Result<(), PlatformFault> {
        if (enable && self.fail_power_on) || (!enable && self.fail_power_off) {
            return Err(PlatformFault);
        }
        self.events.push(PlatformEvent::DisplayPower(enable));
        Ok(())
    }

    fn set_latch_hold(&mut self, hold: bool) -> Result<(), PlatformFault> {
        if hold && self.fail_latch_hold {
            return Err(PlatformFault);
        }
        self.events.push(PlatformEvent::LatchHold(hold));
        Ok(())
    }

    fn enable_wake_source(&mut self) -> Result<(), PlatformFault> {
        if self.fail_wake_source {
            return Err(PlatformFault);
        }
        self.events.push(PlatformEvent::WakeSourceEnabled);
        Ok(())
    }

    async fn suspend(&mut self) -> Result<(), PlatformFault> {
        self.events.push(PlatformEvent::Suspend);
        if let Some(flag) = &self.cut_bus_on_suspend {
            flag.set(true);
        }
        Ok(())
    }
}
