//! Phase sequencing of one reflow run.
//!
//! The driver owns the clock and calls [`ReflowController::step`] once per
//! control cycle with the current instant. Nothing in here sleeps: holds and
//! ramps are elapsed-time checks against references captured on phase entry.

use core::fmt;

use embassy_time::{Duration, Instant};
use serde::Serialize;

use crate::config::{as_secs_f32, ControllerConfig};
use crate::control::{ControlVariables, Direction, FeedbackController, Mode};
use crate::door::{DoorActuator, DOOR_CLOSED_POSITION, DOOR_OPEN_POSITION};
use crate::error::{ReflowError, SensorFault};
use crate::log::*;
use crate::profile::ReflowProfile;
use crate::temperature_sensor::{check_reading, TemperatureSensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    None = 0,
    Idle = 1,

    RampToSoak = 10,
    Soak,
    RampUp,
    Peak,
    RampDown,
    CoolDown,

    Complete = 20,
    Error = 30,
}

impl Phase {
    pub fn to_str(&self) -> &'static str {
        match self {
            Phase::None => "None",
            Phase::Idle => "Idle",
            Phase::RampToSoak => "Ramp To Soak",
            Phase::Soak => "Soak",
            Phase::RampUp => "Ramp Up",
            Phase::Peak => "Peak",
            Phase::RampDown => "Ramp Down",
            Phase::CoolDown => "Cool Down",
            Phase::Complete => "Complete",
            Phase::Error => "Error",
        }
    }

    /// Between start and completion.
    pub fn is_running(&self) -> bool {
        (Phase::RampToSoak..=Phase::CoolDown).contains(self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Everything one control cycle touches outside the state machine.
pub struct Cycle<'a, F, S, D> {
    pub now: Instant,
    pub vars: &'a mut ControlVariables,
    pub feedback: &'a mut F,
    pub sensor: &'a mut S,
    pub door: &'a mut D,
}

pub struct ReflowController {
    profile: ReflowProfile,
    config: ControllerConfig,
    current: Phase,
    previous: Phase,
    state_changed: bool,
    started_at: Option<Instant>,
    setpoint_updated_at: Instant,
    hold_started_at: Instant,
    stuck_reference: f32,
    stuck_since: Instant,
    fault: Option<ReflowError>,
}

impl ReflowController {
    pub fn new(profile: ReflowProfile, config: ControllerConfig) -> Result<Self, ReflowError> {
        profile.validate()?;
        Ok(Self {
            profile,
            config,
            current: Phase::Idle,
            previous: Phase::Idle,
            state_changed: false,
            started_at: None,
            setpoint_updated_at: Instant::from_ticks(0),
            hold_started_at: Instant::from_ticks(0),
            stuck_reference: 0.0,
            stuck_since: Instant::from_ticks(0),
            fault: None,
        })
    }

    pub fn phase(&self) -> Phase {
        self.current
    }

    pub fn previous_phase(&self) -> Phase {
        self.previous
    }

    /// True from a transition until the first cycle of the new phase has run.
    pub fn state_changed(&self) -> bool {
        self.state_changed
    }

    pub fn fault(&self) -> Option<ReflowError> {
        self.fault
    }

    pub fn profile(&self) -> &ReflowProfile {
        &self.profile
    }

    /// Time since `start`, zero when no run is in progress.
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or(Duration::from_ticks(0))
    }

    pub fn start(&mut self, now: Instant) -> Result<(), ReflowError> {
        if self.current != Phase::Idle {
            info!("Cannot start: not idle ({})", self.current);
            return Err(ReflowError::NotIdle(self.current));
        }
        info!("Starting reflow process: {}", self.profile.name.as_str());
        self.started_at = Some(now);
        self.setpoint_updated_at = now;
        self.hold_started_at = now;
        self.stuck_since = now;
        self.transition_to(Phase::RampToSoak);
        Ok(())
    }

    /// Abort a run in progress and drop back to Idle with the output off.
    pub fn stop<F: FeedbackController>(&mut self, vars: &mut ControlVariables, feedback: &mut F) {
        if !self.current.is_running() {
            return;
        }
        info!("Stopping reflow process in {}", self.current);
        feedback.set_mode(Mode::Manual);
        vars.set_output(0.0);
        self.started_at = None;
        self.transition_to(Phase::Idle);
    }

    /// Return from Complete or Error to Idle. Returns false in any other phase.
    pub fn reset(&mut self) -> bool {
        match self.current {
            Phase::Complete | Phase::Error => {
                info!("Resetting from {} to idle", self.current);
                self.fault = None;
                self.started_at = None;
                self.transition_to(Phase::Idle);
                true
            }
            _ => false,
        }
    }

    /// Run one control cycle of the current phase. A fault moves the
    /// machine to [`Phase::Error`] and is returned once, on that cycle.
    pub fn step<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>) -> Result<Phase, ReflowError>
    where
        F: FeedbackController,
        S: TemperatureSensor,
        D: DoorActuator,
    {
        match self.run_phase(cycle) {
            Ok(()) => Ok(self.current),
            Err(e) => {
                self.fail(e, cycle.vars, cycle.feedback, cycle.door);
                Err(e)
            }
        }
    }

    fn run_phase<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>) -> Result<(), ReflowError>
    where
        F: FeedbackController,
        S: TemperatureSensor,
        D: DoorActuator,
    {
        if self.current.is_running() {
            self.check_input(cycle.now, cycle.vars)?;
        }

        match self.current {
            Phase::RampToSoak => self.ramp_to_soak(cycle)?,
            Phase::Soak => self.soak(cycle),
            Phase::RampUp => self.ramp_up(cycle),
            Phase::Peak => self.peak(cycle),
            Phase::RampDown => self.ramp_down(cycle),
            Phase::CoolDown => self.cool_down(cycle),
            Phase::Error => cycle.vars.set_output(0.0),
            Phase::None | Phase::Idle | Phase::Complete => {}
        }
        Ok(())
    }

    /// Heat the oven to the soaking temperature.
    pub fn ramp_to_soak<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>) -> Result<(), ReflowError>
    where
        F: FeedbackController,
        S: TemperatureSensor,
        D: DoorActuator,
    {
        if self.take_state_changed() {
            let reading = cycle.sensor.read_celsius()?;
            let celsius = check_reading(
                reading,
                self.config.min_plausible_temp,
                self.config.max_plausible_temp,
            )?;

            cycle.vars.set_output(self.config.startup_duty);
            cycle.feedback.set_mode(Mode::Automatic);
            cycle.feedback.set_direction(Direction::Direct);
            cycle.feedback.set_tunings(self.config.heating_tunings);
            cycle.vars.set_setpoint(celsius);
            self.setpoint_updated_at = cycle.now;
            cycle.door.set_position(DOOR_CLOSED_POSITION);
        }

        self.update_setpoint(self.profile.ramp_up_rate, cycle.now, cycle.vars);

        if cycle.vars.setpoint() >= f32::from(self.profile.soak_temp) - 1.0 {
            self.transition_to(Phase::Soak);
        }
        Ok(())
    }

    /// Hold the boards at the soak temperature for the soak duration.
    pub fn soak<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>) {
        if self.take_state_changed() {
            cycle.vars.set_setpoint(f32::from(self.profile.soak_temp));
            self.hold_started_at = cycle.now;
        }

        if self.hold_elapsed(cycle.now, self.profile.soak_duration) {
            self.transition_to(Phase::RampUp);
        }
    }

    pub fn ramp_up<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>) {
        if self.take_state_changed() {
            self.setpoint_updated_at = cycle.now;
        }

        self.update_setpoint(self.profile.ramp_up_rate, cycle.now, cycle.vars);

        let peak = f32::from(self.profile.peak_temp);
        if cycle.vars.setpoint() >= peak - 1.0 {
            cycle.vars.set_setpoint(peak);
            self.transition_to(Phase::Peak);
        }
    }

    pub fn peak<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>) {
        if self.take_state_changed() {
            cycle.vars.set_setpoint(f32::from(self.profile.peak_temp));
            self.hold_started_at = cycle.now;
        }

        if self.hold_elapsed(cycle.now, self.profile.peak_duration) {
            self.transition_to(Phase::RampDown);
        }
    }

    pub fn ramp_down<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>)
    where
        F: FeedbackController,
        D: DoorActuator,
    {
        if self.take_state_changed() {
            cycle.feedback.set_direction(Direction::Reverse);
            cycle.feedback.set_tunings(self.config.cooling_tunings);
            // Kick the setpoint below peak, the oven is sluggish here otherwise.
            cycle
                .vars
                .set_setpoint(f32::from(self.profile.peak_temp) - self.config.ramp_down_kick);
            self.setpoint_updated_at = cycle.now;
            cycle.door.set_position(DOOR_OPEN_POSITION);
        }

        self.update_setpoint(self.profile.ramp_down_rate, cycle.now, cycle.vars);

        if cycle.vars.setpoint() <= self.config.safe_cool_temp {
            self.transition_to(Phase::CoolDown);
        }
    }

    pub fn cool_down<F, S, D>(&mut self, cycle: &mut Cycle<'_, F, S, D>)
    where
        F: FeedbackController,
    {
        if self.take_state_changed() {
            cycle.feedback.set_direction(Direction::Reverse);
            cycle.vars.set_setpoint(self.config.safe_cool_temp);
        }

        if cycle.vars.input() < self.config.safe_cool_temp + self.config.cool_down_margin {
            cycle.feedback.set_mode(Mode::Manual);
            cycle.vars.set_output(0.0);
            self.started_at = None;
            self.transition_to(Phase::Complete);
        }
    }

    /// Advance the setpoint by `rate_per_second` times the time since the
    /// last advance, at most once per setpoint interval. Returns true when
    /// the setpoint moved.
    pub fn update_setpoint(
        &mut self,
        rate_per_second: f32,
        now: Instant,
        vars: &mut ControlVariables,
    ) -> bool {
        let elapsed = now.saturating_duration_since(self.setpoint_updated_at);
        if elapsed < self.config.setpoint_interval {
            return false;
        }
        self.setpoint_updated_at = now;
        vars.set_setpoint(vars.setpoint() + rate_per_second * as_secs_f32(elapsed));
        true
    }

    fn hold_elapsed(&mut self, now: Instant, duration: Duration) -> bool {
        if now.saturating_duration_since(self.hold_started_at) >= duration {
            self.hold_started_at = now;
            true
        } else {
            false
        }
    }

    fn take_state_changed(&mut self) -> bool {
        core::mem::take(&mut self.state_changed)
    }

    fn transition_to(&mut self, next: Phase) {
        info!("Phase {} -> {}", self.current, next);
        self.previous = self.current;
        self.current = next;
        self.state_changed = true;
    }

    fn check_input(&mut self, now: Instant, vars: &ControlVariables) -> Result<(), SensorFault> {
        let input = check_reading(
            vars.input(),
            self.config.min_plausible_temp,
            self.config.max_plausible_temp,
        )?;

        let heating = matches!(self.current, Phase::RampToSoak | Phase::RampUp) && vars.output() > 0.0;
        let moved = if input > self.stuck_reference {
            input - self.stuck_reference
        } else {
            self.stuck_reference - input
        };

        if !heating || moved >= self.config.stuck_sensor_delta {
            self.stuck_reference = input;
            self.stuck_since = now;
            return Ok(());
        }

        if now.saturating_duration_since(self.stuck_since) >= self.config.stuck_sensor_timeout {
            warn!("Input stuck at {} while heating", input);
            return Err(SensorFault::Stuck);
        }
        Ok(())
    }

    /// Enter [`Phase::Error`] on a fault the driver detected itself, such
    /// as a heater pin failure. The first fault is kept if already in Error.
    pub fn abort<F, D>(
        &mut self,
        e: ReflowError,
        vars: &mut ControlVariables,
        feedback: &mut F,
        door: &mut D,
    ) where
        F: FeedbackController,
        D: DoorActuator,
    {
        if self.current == Phase::Error {
            vars.set_output(0.0);
            return;
        }
        self.fail(e, vars, feedback, door);
    }

    fn fail<F, D>(&mut self, e: ReflowError, vars: &mut ControlVariables, feedback: &mut F, door: &mut D)
    where
        F: FeedbackController,
        D: DoorActuator,
    {
        error!("Reflow fault in {}: {}", self.current, e);
        self.fault = Some(e);
        feedback.set_mode(Mode::Manual);
        vars.set_output(0.0);
        door.set_position(DOOR_OPEN_POSITION);
        self.transition_to(Phase::Error);
    }
}
