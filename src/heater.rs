//! Time-proportional (slow PWM) drive of the two heating elements.
//!
//! Heater 1 runs a Bresenham style duty distributor: every interval the
//! duty is added to a counter, and the element is on for the intervals in
//! which the counter wraps past 100. The counter keeps the fractional part,
//! so over any 100 intervals at a constant integer duty `d` the element is
//! on for exactly `d` of them, spread as evenly as possible.
//!
//! Heater 1 fires on a fixed grid of `interval` slots counted from
//! construction. Heater 2 copies each command at slot + [`ActuationConfig::offset`],
//! and never in the same `update` call as heater 1, so the two SSRs do not
//! switch together as long as the driver calls faster than once per interval.

use embassy_time::Instant;
use embedded_hal::digital::{OutputPin, PinState, StatefulOutputPin};

use crate::config::ActuationConfig;
use crate::error::ReflowError;
use crate::log::*;

pub struct HeaterBank<H1, H2, L> {
    heater_1: H1,
    heater_2: H2,
    heating_led: L,
    config: ActuationConfig,
    duty_counter: f32,
    command: bool,
    heater_1_due: Instant,
    // Pending copy of `command` for heater 2.
    heater_2_due: Option<Instant>,
}

impl<H1, H2, L> HeaterBank<H1, H2, L>
where
    H1: StatefulOutputPin,
    H2: StatefulOutputPin,
    L: OutputPin,
{
    /// Take the pins and switch everything off. The first heater 1 update
    /// falls one interval after `now`, heater 2 follows `offset` later.
    pub fn new(
        heater_1: H1,
        heater_2: H2,
        heating_led: L,
        config: ActuationConfig,
        now: Instant,
    ) -> Result<Self, ReflowError> {
        let mut bank = Self {
            heater_1,
            heater_2,
            heating_led,
            config,
            duty_counter: 0.0,
            command: false,
            heater_1_due: now + config.interval,
            heater_2_due: None,
        };
        bank.all_off()?;
        Ok(bank)
    }

    /// Apply one control cycle of `duty` (0..=100). Out of range duty is
    /// saturated. Returns the aggregate heating state.
    pub fn update(&mut self, now: Instant, duty: f32) -> Result<bool, ReflowError> {
        let heater_1_due = now >= self.heater_1_due;

        if let Some(due) = self.heater_2_due {
            // Flush a copy heater 1 is about to overwrite, even if late.
            if heater_1_due || now >= due {
                self.heater_2_due = None;
                drive(&mut self.heater_2, self.command)?;
            }
        }

        if heater_1_due {
            // Next slot strictly after `now`; missed slots are skipped, not replayed.
            let slot = self.heater_1_due;
            let interval = self.config.interval.as_ticks().max(1);
            let behind = now.as_ticks() - slot.as_ticks();
            self.heater_1_due = Instant::from_ticks(slot.as_ticks() + (behind / interval + 1) * interval);

            self.duty_counter += saturate_duty(duty);
            if self.duty_counter >= 100.0 {
                self.duty_counter -= 100.0;
                self.command = true;
            } else {
                self.command = false;
            }

            drive(&mut self.heater_1, self.command)?;
            self.heater_2_due = Some(slot + self.config.offset);
        }

        // If either heater is on, set the led to on
        let heating = self.heater_1.is_set_high().map_err(pin_error)?
            | self.heater_2.is_set_high().map_err(pin_error)?;
        drive(&mut self.heating_led, heating)?;
        Ok(heating)
    }

    pub fn all_off(&mut self) -> Result<(), ReflowError> {
        self.duty_counter = 0.0;
        self.command = false;
        self.heater_2_due = None;
        drive(&mut self.heater_1, false)?;
        drive(&mut self.heater_2, false)?;
        drive(&mut self.heating_led, false)
    }

    pub fn duty_counter(&self) -> f32 {
        self.duty_counter
    }

    /// Last command computed for heater 1.
    pub fn command(&self) -> bool {
        self.command
    }

    pub fn heater_1(&self) -> &H1 {
        &self.heater_1
    }

    pub fn heater_2(&self) -> &H2 {
        &self.heater_2
    }

    pub fn heating_led(&self) -> &L {
        &self.heating_led
    }
}

fn saturate_duty(duty: f32) -> f32 {
    if duty.is_nan() {
        warn!("Heater duty is NaN, treating as 0");
        return 0.0;
    }
    if !(0.0..=100.0).contains(&duty) {
        warn!("Heater duty {} out of range, saturating", duty);
    }
    duty.clamp(0.0, 100.0)
}

fn drive<P: OutputPin>(pin: &mut P, on: bool) -> Result<(), ReflowError> {
    pin.set_state(PinState::from(on)).map_err(pin_error)
}

fn pin_error<E: embedded_hal::digital::Error>(e: E) -> ReflowError {
    ReflowError::Actuator(e.kind())
}
