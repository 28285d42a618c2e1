#![cfg_attr(not(test), no_std)]

#[cfg(feature = "defmt")]
pub use defmt as log;

#[cfg(not(feature = "defmt"))]
pub use log;

pub mod config;
pub mod control;
pub mod door;
pub mod error;
pub mod heater;
pub mod outputs_mock;
pub mod pid;
pub mod profile;
pub mod reflow_controller;
pub mod status;
pub mod temperature_sensor;
pub mod temperature_sensor_mock;

pub use control::{ControlVariables, Direction, FeedbackController, Mode, Tunings};
pub use error::{ProfileError, ReflowError, SensorFault};
pub use heater::HeaterBank;
pub use profile::{ProfileStore, ReflowProfile};
pub use reflow_controller::{Cycle, Phase, ReflowController};
pub use status::{ControllerStatus, CURRENT_STATUS};

pub static VERSION: &str = "v0.1";
