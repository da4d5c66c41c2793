//! Power button handling and the sleep/wake cycle.
//!
//! ```text
//!            press                 hold >= LONG_PRESS_MS
//!   Awake ----------> Holding ---------------------------> Sleeping
//!     ^                  |                                    |
//!     +--- release ------+                                    |
//!     +------------------------ wake source ------------------+
//! ```
//!
//! The board's power latch must stay asserted the whole time, including
//! through the processor's low-power state, or the PMIC drops system power.

use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_graphics_core::pixelcolor::{Rgb565, RgbColor};
use embedded_hal::digital::{InputPin, OutputPin};

use crate::{DrawSurface, Scene, Timer};

/// Button sampling period
pub const POLL_INTERVAL_MS: u32 = 100;
/// Hold time that sends the device to sleep
pub const LONG_PRESS_MS: u32 = 1500;
/// Panel rail settle time before bring-up
pub const POWER_SETTLE_MS: u64 = 100;
/// How long the wake confirmation fill stays on screen
pub const WAKE_CONFIRM_MS: u64 = 1500;
/// Quiet time after wake before the button is sampled again
pub const WAKE_DEBOUNCE_MS: u64 = 500;

const WAKE_COLOR: Rgb565 = Rgb565::GREEN;

/// Hold duration, only tracked while the button is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PressTimer {
    held_ms: u32,
}

impl PressTimer {
    pub fn held_ms(&self) -> u32 {
        self.held_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Awake,
    Holding(PressTimer),
    Sleeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    PressStarted,
    /// Released before the long-press threshold
    ShortPress,
    LongPress,
}

/// Button timing without any hardware attached.
///
/// Call [`tick`](Self::tick) once per [`POLL_INTERVAL_MS`] with the current
/// button level.
#[derive(Debug, Clone)]
pub struct PowerStateMachine {
    state: PowerState,
}

impl Default for PowerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerStateMachine {
    pub const fn new() -> Self {
        Self {
            state: PowerState::Awake,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn tick(&mut self, pressed: bool) -> Transition {
        match (self.state, pressed) {
            (PowerState::Awake, true) => {
                self.state = PowerState::Holding(PressTimer::default());
                Transition::PressStarted
            }
            (PowerState::Awake, false) => Transition::None,
            (PowerState::Holding(_), false) => {
                self.state = PowerState::Awake;
                Transition::ShortPress
            }
            (PowerState::Holding(timer), true) => {
                let held_ms = timer.held_ms + POLL_INTERVAL_MS;
                if held_ms >= LONG_PRESS_MS {
                    self.state = PowerState::Sleeping;
                    Transition::LongPress
                } else {
                    self.state = PowerState::Holding(PressTimer { held_ms });
                    Transition::None
                }
            }
            // Nothing polls while suspended; only `wake` leaves this state.
            (PowerState::Sleeping, _) => Transition::None,
        }
    }

    pub fn wake(&mut self) {
        self.state = PowerState::Awake;
    }
}

/// What one poll of the power button produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Idle,
    Pressed,
    /// Still held, below the long-press threshold
    Holding(u32),
    /// Released before the long-press threshold; no display effect
    ShortPress,
    /// Went through a full sleep cycle and the display is back
    Woke,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Platform",),
    async(feature = "async", keep_self)
)]
/// Board services the sleep cycle needs.
pub trait Platform {
    type Error;

    /// Switches the panel supply rail (on this board an IO-expander output).
    async fn set_display_power(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Retains the power latch output level through the low-power state.
    fn set_latch_hold(&mut self, hold: bool) -> Result<(), Self::Error>;

    /// Arms the power button line as the wake source.
    fn enable_wake_source(&mut self) -> Result<(), Self::Error>;

    /// Suspends the processor; returns once the wake source fired.
    async fn suspend(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub enum Error<D, P> {
    /// Panel operation failed
    Display(D),
    /// Board service failed
    Platform(P),
}

pub struct PowerController<BTN, LATCH, PLAT, TIMER>
where
    BTN: InputPin<Error = Infallible>,
    LATCH: OutputPin<Error = Infallible>,
    PLAT: Platform,
    TIMER: Timer,
{
    button: BTN,
    latch: LATCH,
    platform: PLAT,
    machine: PowerStateMachine,
    _timer: PhantomData<TIMER>,
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "PowerController",),
    async(feature = "async", keep_self)
)]
impl<BTN, LATCH, PLAT, PE, TIMER> PowerController<BTN, LATCH, PLAT, TIMER>
where
    BTN: InputPin<Error = Infallible>,
    LATCH: OutputPin<Error = Infallible>,
    PLAT: Platform<Error = PE>,
    TIMER: Timer,
{
    /// Takes over the power latch and drives it high to keep the board on.
    pub fn new(button: BTN, mut latch: LATCH, platform: PLAT) -> Self {
        let Ok(()) = latch.set_high();
        log::info!("power: latch held high");
        Self {
            button,
            latch,
            platform,
            machine: PowerStateMachine::new(),
            _timer: PhantomData,
        }
    }

    pub fn state(&self) -> PowerState {
        self.machine.state()
    }

    fn button_pressed(&mut self) -> bool {
        // active low
        let Ok(low) = self.button.is_low();
        low
    }

    /// Samples the button once and acts on the result.
    ///
    /// Call every [`POLL_INTERVAL_MS`]. A long press runs the whole sleep
    /// cycle before returning [`ButtonEvent::Woke`].
    pub async fn poll<P, S>(
        &mut self,
        panel: &mut P,
        scene: &mut S,
    ) -> Result<ButtonEvent, Error<P::Error, PE>>
    where
        P: DrawSurface,
        S: Scene<P>,
    {
        let pressed = self.button_pressed();
        match self.machine.tick(pressed) {
            Transition::None => Ok(match self.machine.state() {
                PowerState::Holding(timer) => ButtonEvent::Holding(timer.held_ms()),
                _ => ButtonEvent::Idle,
            }),
            Transition::PressStarted => {
                log::info!("power: button pressed, holding");
                Ok(ButtonEvent::Pressed)
            }
            Transition::ShortPress => {
                log::info!("power: short press");
                Ok(ButtonEvent::ShortPress)
            }
            Transition::LongPress => {
                log::info!("power: long press, preparing for sleep");
                self.sleep_cycle(panel, scene).await?;
                Ok(ButtonEvent::Woke)
            }
        }
    }

    /// Polls on the regular cadence until a short press or a completed wake.
    pub async fn next_event<P, S>(
        &mut self,
        panel: &mut P,
        scene: &mut S,
    ) -> Result<ButtonEvent, Error<P::Error, PE>>
    where
        P: DrawSurface,
        S: Scene<P>,
    {
        loop {
            match self.poll(panel, scene).await? {
                event @ (ButtonEvent::ShortPress | ButtonEvent::Woke) => return Ok(event),
                _ => TIMER::delay_ms(POLL_INTERVAL_MS as u64).await,
            }
        }
    }

    async fn sleep_cycle<P, S>(&mut self, panel: &mut P, scene: &mut S) -> Result<(), Error<P::Error, PE>>
    where
        P: DrawSurface,
        S: Scene<P>,
    {
        if let Err(e) = self.cut_display(panel).await {
            log::error!("power: sleep entry failed, staying awake");
            self.machine.wake();
            return Err(e);
        }
        if let Err(e) = self.arm_wake().await {
            log::error!("power: sleep entry failed after power cut, restoring display");
            self.machine.wake();
            self.resume(panel, scene).await?;
            return Err(e);
        }

        log::info!("power: entering light sleep");
        let suspended = self.platform.suspend().await.map_err(Error::Platform);
        // Give the latch back to normal GPIO control before anything else.
        let unheld = self.platform.set_latch_hold(false).map_err(Error::Platform);
        self.machine.wake();
        log::info!("power: woke from sleep");
        unheld?;

        let resumed = self.resume(panel, scene).await;
        suspended?;
        resumed
    }

    async fn cut_display<P: DrawSurface>(&mut self, panel: &mut P) -> Result<(), Error<P::Error, PE>> {
        panel.fill_screen(Rgb565::BLACK).await.map_err(Error::Display)?;
        self.platform
            .set_display_power(false)
            .await
            .map_err(Error::Platform)?;
        // Panel registers are gone with the rail.
        panel.power_down();
        Ok(())
    }

    async fn arm_wake<D>(&mut self) -> Result<(), Error<D, PE>> {
        // A still-held button would fire the wake source straight away.
        log::info!("power: release button to sleep");
        while self.button_pressed() {
            TIMER::delay_ms(POLL_INTERVAL_MS as u64).await;
        }

        self.platform.enable_wake_source().map_err(Error::Platform)?;
        self.platform.set_latch_hold(true).map_err(Error::Platform)
    }

    async fn resume<P, S>(&mut self, panel: &mut P, scene: &mut S) -> Result<(), Error<P::Error, PE>>
    where
        P: DrawSurface,
        S: Scene<P>,
    {
        self.platform
            .set_display_power(true)
            .await
            .map_err(Error::Platform)?;
        TIMER::delay_ms(POWER_SETTLE_MS).await;

        panel.bring_up().await.map_err(Error::Display)?;
        panel.fill_screen(WAKE_COLOR).await.map_err(Error::Display)?;
        TIMER::delay_ms(WAKE_CONFIRM_MS).await;

        scene.render(panel).await.map_err(Error::Display)?;
        TIMER::delay_ms(WAKE_DEBOUNCE_MS).await;
        Ok(())
    }

    /// Releases the power latch. With no other supply present the board
    /// switches off; on USB power it keeps running with the latch low.
    pub fn power_off(mut self) {
        log::info!("power: releasing latch, powering down");
        let Ok(()) = self.latch.set_low();
    }
}
