use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::Watch;
use embassy_time::Instant;
use heapless::String;
use serde::Serialize;

use crate::control::ControlVariables;
use crate::reflow_controller::{Phase, ReflowController};

/// Latest status published by the control loop for reporting tasks.
pub static CURRENT_STATUS: Watch<CriticalSectionRawMutex, ControllerStatus, 2> = Watch::new();

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub phase: Phase,
    pub setpoint: f32,
    pub input: f32,
    pub output: f32, // value between 0 and 100
    pub heater_1: bool,
    pub heater_2: bool,
    pub heating: bool,
    pub door_open: bool,
    pub elapsed_secs: u32,
    pub profile: String<32>,
    pub fault: String<64>,
}

impl ControllerStatus {
    pub fn capture(
        controller: &ReflowController,
        vars: &ControlVariables,
        heaters: (bool, bool),
        door_open: bool,
        now: Instant,
    ) -> Self {
        let mut fault = String::new();
        if let Some(e) = controller.fault() {
            let _ = write!(fault, "{}", e);
        }
        Self {
            phase: controller.phase(),
            setpoint: vars.setpoint(),
            input: vars.input(),
            output: vars.output(),
            heater_1: heaters.0,
            heater_2: heaters.1,
            heating: heaters.0 || heaters.1,
            door_open,
            elapsed_secs: controller.elapsed(now).as_secs() as u32,
            profile: controller.profile().name.clone(),
            fault,
        }
    }

    pub fn to_json(&self) -> Result<String<512>, serde_json_core::ser::Error> {
        serde_json_core::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::profile::leaded_profile;

    #[test]
    fn idle_snapshot_as_json() {
        let controller = ReflowController::new(leaded_profile(), ControllerConfig::default()).unwrap();
        let vars = ControlVariables::new(24.5);

        let status = ControllerStatus::capture(
            &controller,
            &vars,
            (false, true),
            false,
            Instant::from_secs(5),
        );
        assert_eq!(status.phase, Phase::Idle);
        assert!(status.heating);
        assert_eq!(status.elapsed_secs, 0);

        let json = status.to_json().unwrap();
        assert!(json.starts_with("{\"phase\":\"Idle\""));
        assert!(json.contains("\"input\":24.5"));
        assert!(json.contains("\"profile\":\"Leaded\""));
        assert!(json.contains("\"fault\":\"\""));
    }

    #[test]
    fn elapsed_counts_from_start() {
        let mut controller =
            ReflowController::new(leaded_profile(), ControllerConfig::default()).unwrap();
        controller.start(Instant::from_secs(10)).unwrap();

        let status = ControllerStatus::capture(
            &controller,
            &ControlVariables::new(25.0),
            (false, false),
            false,
            Instant::from_secs(42),
        );
        assert_eq!(status.phase, Phase::RampToSoak);
        assert_eq!(status.elapsed_secs, 32);
        assert!(!status.heating);
    }
}
