use embassy_time::Duration;
use heapless::String;
use serde::Deserialize;

use crate::error::ProfileError;
use crate::log::*;

/// Target temperatures, hold times and ramp rates of one reflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflowProfile {
    pub name: String<32>,
    pub soak_temp: i16,
    pub soak_duration: Duration,
    pub peak_temp: i16,
    pub peak_duration: Duration,
    /// Degrees per second, positive.
    pub ramp_up_rate: f32,
    /// Degrees per second, negative.
    pub ramp_down_rate: f32,
}

impl ReflowProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.peak_temp <= self.soak_temp {
            return Err(ProfileError::PeakNotAboveSoak);
        }
        if !(self.ramp_up_rate.is_finite() && self.ramp_up_rate > 0.0) {
            return Err(ProfileError::RampUpNotPositive);
        }
        if !(self.ramp_down_rate.is_finite() && self.ramp_down_rate < 0.0) {
            return Err(ProfileError::RampDownNotNegative);
        }
        Ok(())
    }

    /// Parse and validate a JSON profile record:
    ///
    /// ```json
    /// {"name":"Leaded","soak_temp":150,"soak_duration_secs":90,
    ///  "peak_temp":235,"peak_duration_secs":60,
    ///  "ramp_up_rate":2.0,"ramp_down_rate":-5.0}
    /// ```
    pub fn from_json(json: &[u8]) -> Result<Self, ProfileError> {
        let (record, _) = serde_json_core::from_slice::<ProfileRecord>(json).map_err(|_| {
            error!("Profile JSON could not be parsed");
            ProfileError::Parse
        })?;
        let profile = Self::from(record);
        profile.validate()?;
        Ok(profile)
    }
}

#[derive(Deserialize)]
struct ProfileRecord {
    name: String<32>,
    soak_temp: i16,
    soak_duration_secs: u32,
    peak_temp: i16,
    peak_duration_secs: u32,
    ramp_up_rate: f32,
    ramp_down_rate: f32,
}

impl From<ProfileRecord> for ReflowProfile {
    fn from(record: ProfileRecord) -> Self {
        Self {
            name: record.name,
            soak_temp: record.soak_temp,
            soak_duration: Duration::from_secs(record.soak_duration_secs.into()),
            peak_temp: record.peak_temp,
            peak_duration: Duration::from_secs(record.peak_duration_secs.into()),
            ramp_up_rate: record.ramp_up_rate,
            ramp_down_rate: record.ramp_down_rate,
        }
    }
}

fn named(name: &str) -> String<32> {
    let mut s = String::new();
    let _ = s.push_str(name);
    s
}

/// Sn63/Pb37 leaded solder; the default profile.
pub fn leaded_profile() -> ReflowProfile {
    ReflowProfile {
        name: named("Leaded"),
        soak_temp: 150,
        soak_duration: Duration::from_secs(90),
        peak_temp: 235,
        peak_duration: Duration::from_secs(60),
        ramp_up_rate: 2.0,
        ramp_down_rate: -5.0,
    }
}

/// SAC305 lead free solder.
pub fn lead_free_profile() -> ReflowProfile {
    ReflowProfile {
        name: named("Lead Free"),
        soak_temp: 180,
        soak_duration: Duration::from_secs(90),
        peak_temp: 250,
        peak_duration: Duration::from_secs(45),
        ramp_up_rate: 1.5,
        ramp_down_rate: -4.0,
    }
}

/// Sn42/Bi58 low temperature solder.
pub fn low_temp_profile() -> ReflowProfile {
    ReflowProfile {
        name: named("Low Temperature"),
        soak_temp: 120,
        soak_duration: Duration::from_secs(90),
        peak_temp: 170,
        peak_duration: Duration::from_secs(60),
        ramp_up_rate: 1.0,
        ramp_down_rate: -3.0,
    }
}

/// Holds the one active profile. Anything loaded from outside is
/// validated before it replaces the active profile.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    active: ReflowProfile,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            active: leaded_profile(),
        }
    }

    pub fn active(&self) -> &ReflowProfile {
        &self.active
    }

    pub fn load_default(&mut self) {
        self.active = leaded_profile();
    }

    /// Activate one of the compiled-in profiles by key.
    pub fn load_builtin(&mut self, key: &str) -> bool {
        let profile = match key {
            "leaded" => leaded_profile(),
            "lead_free" => lead_free_profile(),
            "low_temp" => low_temp_profile(),
            _ => {
                warn!("Unknown builtin profile: {}", key);
                return false;
            }
        };
        info!("Loaded profile: {}", profile.name.as_str());
        self.active = profile;
        true
    }

    pub fn load_json(&mut self, json: &[u8]) -> Result<(), ProfileError> {
        let profile = ReflowProfile::from_json(json)?;
        info!("Loaded profile: {}", profile.name.as_str());
        self.active = profile;
        Ok(())
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAD_FREE_JSON: &[u8] = br#"{"name":"SAC305","soak_temp":180,"soak_duration_secs":100,
        "peak_temp":245,"peak_duration_secs":40,"ramp_up_rate":1.5,"ramp_down_rate":-4.0}"#;

    #[test]
    fn builtin_profiles_are_valid() {
        assert_eq!(leaded_profile().validate(), Ok(()));
        assert_eq!(lead_free_profile().validate(), Ok(()));
        assert_eq!(low_temp_profile().validate(), Ok(()));
    }

    #[test]
    fn default_profile_values() {
        let mut store = ProfileStore::new();
        store.load_builtin("low_temp");
        store.load_default();

        let p = store.active();
        assert_eq!(p.soak_temp, 150);
        assert_eq!(p.soak_duration, Duration::from_secs(90));
        assert_eq!(p.peak_temp, 235);
        assert_eq!(p.peak_duration, Duration::from_secs(60));
        assert_eq!(p.ramp_up_rate, 2.0);
        assert_eq!(p.ramp_down_rate, -5.0);
    }

    #[test]
    fn rejects_broken_invariants() {
        let mut p = leaded_profile();
        p.peak_temp = p.soak_temp;
        assert_eq!(p.validate(), Err(ProfileError::PeakNotAboveSoak));

        let mut p = leaded_profile();
        p.ramp_up_rate = 0.0;
        assert_eq!(p.validate(), Err(ProfileError::RampUpNotPositive));

        let mut p = leaded_profile();
        p.ramp_up_rate = f32::NAN;
        assert_eq!(p.validate(), Err(ProfileError::RampUpNotPositive));

        let mut p = leaded_profile();
        p.ramp_down_rate = 5.0;
        assert_eq!(p.validate(), Err(ProfileError::RampDownNotNegative));
    }

    #[test]
    fn loads_json_profile() {
        let mut store = ProfileStore::new();
        store.load_json(LEAD_FREE_JSON).unwrap();

        let p = store.active();
        assert_eq!(p.name.as_str(), "SAC305");
        assert_eq!(p.soak_duration, Duration::from_secs(100));
        assert_eq!(p.peak_temp, 245);
        assert_eq!(p.ramp_down_rate, -4.0);
    }

    #[test]
    fn invalid_json_keeps_active_profile() {
        let mut store = ProfileStore::new();

        assert_eq!(store.load_json(b"{not json"), Err(ProfileError::Parse));

        let inverted = br#"{"name":"bad","soak_temp":200,"soak_duration_secs":90,
            "peak_temp":180,"peak_duration_secs":60,"ramp_up_rate":2.0,"ramp_down_rate":-5.0}"#;
        assert_eq!(
            store.load_json(inverted),
            Err(ProfileError::PeakNotAboveSoak)
        );

        assert_eq!(store.active(), &leaded_profile());
    }

    #[test]
    fn unknown_builtin_is_refused() {
        let mut store = ProfileStore::new();
        assert!(!store.load_builtin("mystery"));
        assert!(store.load_builtin("lead_free"));
        assert_eq!(store.active().name.as_str(), "Lead Free");
    }
}
