use core::fmt;

use embedded_hal::digital::ErrorKind;

use crate::reflow_controller::Phase;

/// A profile rejected before it could become active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileError {
    PeakNotAboveSoak,
    RampUpNotPositive,
    RampDownNotNegative,
    Parse,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::PeakNotAboveSoak => write!(f, "peak temperature must be above soak"),
            ProfileError::RampUpNotPositive => write!(f, "ramp up rate must be positive"),
            ProfileError::RampDownNotNegative => write!(f, "ramp down rate must be negative"),
            ProfileError::Parse => write!(f, "profile parse error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    ReadFailed,
    /// Not finite, or outside the plausible temperature range.
    Implausible,
    /// No movement while the heaters were driven.
    Stuck,
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorFault::ReadFailed => write!(f, "sensor read failed"),
            SensorFault::Implausible => write!(f, "implausible sensor reading"),
            SensorFault::Stuck => write!(f, "sensor reading stuck while heating"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReflowError {
    Profile(ProfileError),
    Sensor(SensorFault),
    NotIdle(Phase),
    Actuator(ErrorKind),
}

impl fmt::Display for ReflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReflowError::Profile(e) => write!(f, "invalid profile: {}", e),
            ReflowError::Sensor(e) => write!(f, "sensor fault: {}", e),
            ReflowError::NotIdle(phase) => write!(f, "cannot start while in {}", phase),
            ReflowError::Actuator(kind) => write!(f, "heater pin error: {:?}", kind),
        }
    }
}

impl From<ProfileError> for ReflowError {
    fn from(e: ProfileError) -> Self {
        ReflowError::Profile(e)
    }
}

impl From<SensorFault> for ReflowError {
    fn from(e: SensorFault) -> Self {
        ReflowError::Sensor(e)
    }
}

impl From<ErrorKind> for ReflowError {
    fn from(kind: ErrorKind) -> Self {
        ReflowError::Actuator(kind)
    }
}
