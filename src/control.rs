//! The narrow interface between the state machine and the feedback
//! controller.
//!
//! [`ControlVariables`] is the only state shared across components:
//! - `setpoint` is written by the state machine,
//! - `input` is written by the driver loop from the temperature sensor,
//! - `output` is written by the feedback controller, and by the state
//!   machine only at phase edges (startup duty, forced off).
//!
//! Only `input` can be written from outside the crate:
//!
//! ```compile_fail
//! let mut vars = reflow_sequencer::ControlVariables::new(20.0);
//! vars.set_output(50.0);
//! ```
//!
//! ```compile_fail
//! let mut vars = reflow_sequencer::ControlVariables::new(20.0);
//! vars.set_setpoint(150.0);
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ControlVariables {
    setpoint: f32,
    input: f32,
    output: f32,
}

impl ControlVariables {
    pub fn new(input: f32) -> Self {
        Self {
            setpoint: 0.0,
            input,
            output: 0.0,
        }
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn input(&self) -> f32 {
        self.input
    }

    /// Duty command, nominally 0..=100.
    pub fn output(&self) -> f32 {
        self.output
    }

    pub(crate) fn set_setpoint(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    /// Written by the driver from the latest sensor reading.
    pub fn set_input(&mut self, input: f32) {
        self.input = input;
    }

    pub(crate) fn set_output(&mut self, output: f32) {
        self.output = output;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Manual,
    Automatic,
}

/// Sense of the control action. `Direct` raises the output when the input
/// is below the setpoint; `Reverse` raises it when the input is above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Direct,
    Reverse,
}

impl Direction {
    /// Route a controller output to `(heating duty, cooling duty)`. A
    /// reverse-acting loop is asking for cooling, so it never reaches the
    /// heaters.
    pub fn split(self, output: f32) -> (f32, f32) {
        match self {
            Direction::Direct => (output, 0.0),
            Direction::Reverse => (0.0, output),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tunings {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Configuration surface of the closed-loop controller. The state machine
/// only touches it at phase edges.
pub trait FeedbackController {
    fn set_mode(&mut self, mode: Mode);

    fn set_direction(&mut self, direction: Direction);

    fn set_tunings(&mut self, tunings: Tunings);
}
