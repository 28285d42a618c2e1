//! PID controller for the oven, suitable for no_std embedded use.
//!
//! - Uses `f32` math
//! - Samples at a fixed interval; `compute` is a no-op between samples
//! - Output clamped to configured limits (default 0..100)
//! - Integral anti-windup via integral clamping
//! - Derivative-on-measurement with optional low-pass filtering
//! - `Reverse` direction negates the gains
//! - Bumpless transfer when switching from manual to automatic
//!
//! Example
//! ```ignore
//! let mut pid = PidController::new(HEATING_TUNINGS)
//!     .with_output_limits(0.0, 100.0)
//!     .with_derivative_filter_alpha(0.5);
//!
//! pid.set_mode(Mode::Automatic);
//! pid.compute(Instant::now(), &mut vars);
//! ```

use embassy_time::{Duration, Instant};

use crate::config::{as_secs_f32, PID_SAMPLE_MILLIS};
use crate::control::{ControlVariables, Direction, FeedbackController, Mode, Tunings};

#[derive(Debug, Clone)]
pub struct PidController {
    tunings: Tunings,
    direction: Direction,

    // Output limits
    out_min: f32,
    out_max: f32,

    sample_time: Duration,

    // State
    mode: Mode,
    integrator: f32,
    last_measurement: f32,
    last_derivative: f32,
    last_output: f32,
    last_sample: Option<Instant>,
    // Set on manual -> automatic; the next compute seeds the integrator
    // from the output the controller is taking over.
    needs_init: bool,

    // Derivative first-order low-pass filter coefficient (0..1).
    // 0 = heavy filtering, 1 = no filtering.
    d_filter_alpha: f32,
}

impl PidController {
    /// Defaults: output limits [0,100], mode=Manual, direction=Direct,
    /// 200ms sample time, derivative filter alpha=1.0
    pub fn new(tunings: Tunings) -> Self {
        Self {
            tunings,
            direction: Direction::Direct,
            out_min: 0.0,
            out_max: 100.0,
            sample_time: Duration::from_millis(PID_SAMPLE_MILLIS),
            mode: Mode::Manual,
            integrator: 0.0,
            last_measurement: 0.0,
            last_derivative: 0.0,
            last_output: 0.0,
            last_sample: None,
            needs_init: true,
            d_filter_alpha: 1.0,
        }
    }

    /// Builder: set output limits.
    pub fn with_output_limits(mut self, min: f32, max: f32) -> Self {
        self.set_output_limits(min, max);
        self
    }

    /// Builder: set derivative filter alpha (0..1). 1 = no filtering.
    pub fn with_derivative_filter_alpha(mut self, alpha: f32) -> Self {
        self.d_filter_alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Set output limits and clamp current state accordingly.
    pub fn set_output_limits(&mut self, min: f32, max: f32) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.out_min = min;
        self.out_max = max;
        self.integrator = self.integrator.clamp(self.out_min, self.out_max);
        self.last_output = self.last_output.clamp(self.out_min, self.out_max);
    }

    /// Run one compute step if a sample is due and the controller is
    /// automatic. Writes the new output into `vars` and returns true when
    /// it did.
    pub fn compute(&mut self, now: Instant, vars: &mut ControlVariables) -> bool {
        if self.mode == Mode::Manual {
            return false;
        }

        if self.needs_init {
            self.needs_init = false;
            self.integrator = vars.output().clamp(self.out_min, self.out_max);
            self.last_measurement = vars.input();
            self.last_derivative = 0.0;
            self.last_sample = Some(now);
            return false;
        }

        let dt = match self.last_sample {
            Some(last) => now.saturating_duration_since(last),
            None => self.sample_time,
        };
        if dt < self.sample_time {
            return false;
        }
        self.last_sample = Some(now);

        let output = self.update(vars.setpoint(), vars.input(), as_secs_f32(dt));
        vars.set_output(output);
        true
    }

    /// One PID step over `dt_s` seconds. Returns the clamped control output.
    fn update(&mut self, setpoint: f32, measurement: f32, dt_s: f32) -> f32 {
        if dt_s <= 0.0 || !dt_s.is_finite() {
            return self.last_output;
        }

        let (kp, ki, kd) = self.gains();

        let error = setpoint - measurement;

        let p = kp * error;

        self.integrator += ki * error * dt_s;
        self.integrator = self.integrator.clamp(self.out_min, self.out_max);

        // Derivative on measurement: d = -kd * d(meas)/dt
        let raw_d = if kd != 0.0 {
            -kd * (measurement - self.last_measurement) / dt_s
        } else {
            0.0
        };

        let d = self.d_filter_alpha * raw_d + (1.0 - self.d_filter_alpha) * self.last_derivative;

        let output = (p + self.integrator + d).clamp(self.out_min, self.out_max);

        self.last_output = output;
        self.last_measurement = measurement;
        self.last_derivative = d;

        output
    }

    /// Gains with the direction applied.
    pub fn gains(&self) -> (f32, f32, f32) {
        let Tunings { kp, ki, kd } = self.tunings;
        match self.direction {
            Direction::Direct => (kp, ki, kd),
            Direction::Reverse => (-kp, -ki, -kd),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl FeedbackController for PidController {
    fn set_mode(&mut self, mode: Mode) {
        if mode == Mode::Automatic && self.mode == Mode::Manual {
            self.needs_init = true;
        }
        self.mode = mode;
    }

    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    fn set_tunings(&mut self, tunings: Tunings) {
        if tunings.kp < 0.0 || tunings.ki < 0.0 || tunings.kd < 0.0 {
            return;
        }
        self.tunings = tunings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P_ONLY: Tunings = Tunings {
        kp: 2.0,
        ki: 0.0,
        kd: 0.0,
    };

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn manual_mode_leaves_output_alone() {
        let mut pid = PidController::new(P_ONLY);
        let mut vars = ControlVariables::new(20.0);
        vars.set_setpoint(100.0);
        vars.set_output(42.0);

        assert_eq!(pid.mode(), Mode::Manual);
        assert!(!pid.compute(at(0), &mut vars));
        assert!(!pid.compute(at(1000), &mut vars));
        assert_eq!(vars.output(), 42.0);
    }

    #[test]
    fn derivative_kick_is_filtered() {
        let kd_only = Tunings {
            kp: 0.0,
            ki: 0.0,
            kd: 1.0,
        };
        let kick = |alpha: f32| {
            let mut pid = PidController::new(kd_only)
                .with_output_limits(-100.0, 100.0)
                .with_derivative_filter_alpha(alpha);
            pid.set_mode(Mode::Automatic);
            let mut vars = ControlVariables::new(0.0);
            pid.compute(at(0), &mut vars);
            vars.set_input(10.0);
            pid.compute(at(200), &mut vars);
            vars.output()
        };

        assert!((kick(1.0) + 50.0).abs() < 1e-3);
        assert!((kick(0.5) + 25.0).abs() < 1e-3);
    }

    #[test]
    fn first_automatic_sample_is_bumpless() {
        let mut pid = PidController::new(P_ONLY);
        let mut vars = ControlVariables::new(20.0);
        vars.set_setpoint(100.0);
        vars.set_output(80.0);
        pid.set_mode(Mode::Automatic);

        // Seeding cycle: output untouched.
        assert!(!pid.compute(at(0), &mut vars));
        assert_eq!(vars.output(), 80.0);

        // Too early for a sample.
        assert!(!pid.compute(at(100), &mut vars));

        assert!(pid.compute(at(200), &mut vars));
        assert_eq!(vars.output(), 100.0);
    }

    #[test]
    fn direct_heats_below_setpoint() {
        let mut pid = PidController::new(P_ONLY);
        let mut vars = ControlVariables::new(95.0);
        vars.set_setpoint(100.0);
        pid.set_mode(Mode::Automatic);
        pid.compute(at(0), &mut vars);

        assert!(pid.compute(at(200), &mut vars));
        assert!((vars.output() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn reverse_drives_output_above_setpoint() {
        let mut pid = PidController::new(P_ONLY);
        pid.set_direction(Direction::Reverse);
        pid.set_mode(Mode::Automatic);

        let mut vars = ControlVariables::new(110.0);
        vars.set_setpoint(100.0);
        pid.compute(at(0), &mut vars);
        pid.compute(at(200), &mut vars);
        assert!((vars.output() - 20.0).abs() < 1e-4);

        // Below the setpoint a reverse loop has nothing to do.
        vars.set_input(90.0);
        pid.compute(at(400), &mut vars);
        assert_eq!(vars.output(), 0.0);
    }

    #[test]
    fn negative_tunings_are_ignored() {
        let mut pid = PidController::new(P_ONLY);
        pid.set_tunings(Tunings {
            kp: -1.0,
            ki: 0.0,
            kd: 0.0,
        });
        assert_eq!(pid.gains(), (2.0, 0.0, 0.0));
    }

    #[test]
    fn integrator_is_clamped_to_output_limits() {
        let mut pid = PidController::new(Tunings {
            kp: 0.0,
            ki: 50.0,
            kd: 0.0,
        })
        .with_output_limits(0.0, 60.0);
        pid.set_mode(Mode::Automatic);

        let mut vars = ControlVariables::new(0.0);
        vars.set_setpoint(200.0);
        pid.compute(at(0), &mut vars);
        for step in 1..=20 {
            pid.compute(at(step * 200), &mut vars);
        }
        assert_eq!(vars.output(), 60.0);
    }
}
