//! Thermal model of a two element oven, standing in for the thermocouple
//! on the host.

use embassy_time::Duration;

use crate::config::as_secs_f32;
use crate::error::SensorFault;
use crate::log::*;
use crate::temperature_sensor::TemperatureSensor;

pub struct SimulatedOven {
    temperature: f32,
    ambient: f32,
    /// Degrees C per second one element adds while on.
    element_rate: f32,
    /// Heat loss to ambient per second, per degree of difference.
    loss_coefficient: f32,
    /// Loss multiplier while the door is open.
    door_loss_factor: f32,
    /// Extra loss coefficient at full fan.
    fan_loss: f32,
    ticks: u32,
    fault: Option<SensorFault>,
}

impl SimulatedOven {
    pub fn new(ambient: f32) -> Self {
        let oven = Self {
            temperature: ambient,
            ambient,
            element_rate: 1.6,
            loss_coefficient: 0.004,
            door_loss_factor: 4.0,
            fan_loss: 0.02,
            ticks: 0,
            fault: None,
        };
        info!(
            "Thermal parameters: element_rate={}C/s, loss={}, door_factor={}",
            oven.element_rate, oven.loss_coefficient, oven.door_loss_factor
        );
        oven
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Back to ambient with no fault.
    pub fn reset(&mut self) {
        self.temperature = self.ambient;
        self.ticks = 0;
        self.fault = None;
    }

    /// Make every following read fail with `fault`.
    pub fn inject_fault(&mut self, fault: Option<SensorFault>) {
        self.fault = fault;
    }

    /// Integrate the oven over `dt` with the given element states, door and
    /// fan duty (0..=100).
    pub fn advance(&mut self, dt: Duration, heater_1: bool, heater_2: bool, door_open: bool, fan_duty: f32) {
        let dt = as_secs_f32(dt);
        let elements = u8::from(heater_1) + u8::from(heater_2);
        let heat_input = self.element_rate * f32::from(elements);

        let mut loss = self.loss_coefficient;
        if door_open {
            loss *= self.door_loss_factor;
        }
        loss += self.fan_loss * fan_duty.clamp(0.0, 100.0) / 100.0;

        // Newton's law of cooling
        let heat_loss = loss * (self.temperature - self.ambient);
        self.temperature += (heat_input - heat_loss) * dt;

        if self.temperature < self.ambient {
            self.temperature = self.ambient;
        }
        self.ticks = self.ticks.wrapping_add(1);
    }
}

impl TemperatureSensor for SimulatedOven {
    fn read_celsius(&mut self) -> Result<f32, SensorFault> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        // Small repeatable ripple, +-0.1C
        let noise = (self.ticks % 5) as f32 * 0.05 - 0.1;
        Ok(self.temperature + noise)
    }
}
