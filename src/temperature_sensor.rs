use crate::error::SensorFault;

/// Produces one oven temperature reading in degrees C on demand.
pub trait TemperatureSensor {
    fn read_celsius(&mut self) -> Result<f32, SensorFault>;
}

/// Accept a reading only if it is finite and inside `[min, max]`.
pub fn check_reading(celsius: f32, min: f32, max: f32) -> Result<f32, SensorFault> {
    if celsius.is_finite() && celsius >= min && celsius <= max {
        Ok(celsius)
    } else {
        Err(SensorFault::Implausible)
    }
}
