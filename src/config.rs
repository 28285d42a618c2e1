//! Compiled-in process constants.
//!
//! The constants are the firmware defaults. [`ControllerConfig`] and
//! [`ActuationConfig`] gather them so a host run or a test can shorten an
//! interval without touching the defaults.

use embassy_time::Duration;

use crate::control::Tunings;

/// Safe temperature to leave the oven to cool naturally.
pub const SAFE_COOL_TEMP: f32 = 50.0;
/// CoolDown completes once the input is below `SAFE_COOL_TEMP + COOL_DOWN_MARGIN`.
pub const COOL_DOWN_MARGIN: f32 = 5.0;

/// Duty applied on RampToSoak entry, before the PID has a sample.
pub const STARTUP_DUTY: f32 = 80.0;
/// Downward kick below peak on RampDown entry; the oven is sluggish otherwise.
pub const RAMP_DOWN_KICK: f32 = 15.0;

pub const SETPOINT_UPDATE_MILLIS: u64 = 1000;

/// Heaters update once every 250ms, the PID only samples every 200ms.
pub const SSR_UPDATE_MILLIS: u64 = 250;
pub const SSR_OFFSET_MILLIS: u64 = 50;
pub const PID_SAMPLE_MILLIS: u64 = 200;

pub const MIN_PLAUSIBLE_TEMP: f32 = -20.0;
pub const MAX_PLAUSIBLE_TEMP: f32 = 300.0;
pub const STUCK_SENSOR_SECS: u64 = 60;
pub const STUCK_SENSOR_DELTA: f32 = 1.0;

pub const HEATING_TUNINGS: Tunings = Tunings {
    kp: 5.0,
    ki: 0.1,
    kd: 0.0,
};

pub const COOLING_TUNINGS: Tunings = Tunings {
    kp: 8.0,
    ki: 0.05,
    kd: 0.0,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub setpoint_interval: Duration,
    pub safe_cool_temp: f32,
    pub cool_down_margin: f32,
    pub startup_duty: f32,
    pub ramp_down_kick: f32,
    pub heating_tunings: Tunings,
    pub cooling_tunings: Tunings,
    pub min_plausible_temp: f32,
    pub max_plausible_temp: f32,
    /// How long a heating ramp may see no movement on the input before
    /// the sensor is declared stuck.
    pub stuck_sensor_timeout: Duration,
    pub stuck_sensor_delta: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            setpoint_interval: Duration::from_millis(SETPOINT_UPDATE_MILLIS),
            safe_cool_temp: SAFE_COOL_TEMP,
            cool_down_margin: COOL_DOWN_MARGIN,
            startup_duty: STARTUP_DUTY,
            ramp_down_kick: RAMP_DOWN_KICK,
            heating_tunings: HEATING_TUNINGS,
            cooling_tunings: COOLING_TUNINGS,
            min_plausible_temp: MIN_PLAUSIBLE_TEMP,
            max_plausible_temp: MAX_PLAUSIBLE_TEMP,
            stuck_sensor_timeout: Duration::from_secs(STUCK_SENSOR_SECS),
            stuck_sensor_delta: STUCK_SENSOR_DELTA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationConfig {
    pub interval: Duration,
    /// Phase shift of heater 2 behind heater 1.
    pub offset: Duration,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(SSR_UPDATE_MILLIS),
            offset: Duration::from_millis(SSR_OFFSET_MILLIS),
        }
    }
}

/// Seconds in `duration`, with sub-second precision.
pub(crate) fn as_secs_f32(duration: Duration) -> f32 {
    duration.as_micros() as f32 / 1_000_000.0
}
