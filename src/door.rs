//! Optional oven door servo.

pub const DOOR_CLOSED_POSITION: u8 = 0;
/// Halfway. How far to open sets the cooling gradient; too fast is bad,
/// too slow is not good either.
pub const DOOR_OPEN_POSITION: u8 = 90;

/// Accepts an absolute servo position in degrees.
pub trait DoorActuator {
    fn set_position(&mut self, degrees: u8);
}

/// Ovens without a door servo.
impl DoorActuator for () {
    fn set_position(&mut self, _degrees: u8) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedDoor {
    position: u8,
}

impl SimulatedDoor {
    pub fn new() -> Self {
        Self {
            position: DOOR_CLOSED_POSITION,
        }
    }

    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn is_open(&self) -> bool {
        self.position != DOOR_CLOSED_POSITION
    }
}

impl Default for SimulatedDoor {
    fn default() -> Self {
        Self::new()
    }
}

impl DoorActuator for SimulatedDoor {
    fn set_position(&mut self, degrees: u8) {
        self.position = degrees;
    }
}
