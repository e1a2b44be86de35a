use std::{collections::BTreeSet, fmt, ops::BitOr, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    Auto,
    Dry,
    FanOnly,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::HeatCool => "heat_cool",
            Self::Auto => "auto",
            Self::Dry => "dry",
            Self::FanOnly => "fan_only",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown hvac mode {0:?}")]
pub struct UnknownHvacMode(pub String);

impl FromStr for HvacMode {
    type Err = UnknownHvacMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "heat" => Ok(Self::Heat),
            "cool" => Ok(Self::Cool),
            "heat_cool" => Ok(Self::HeatCool),
            "auto" => Ok(Self::Auto),
            "dry" => Ok(Self::Dry),
            "fan_only" => Ok(Self::FanOnly),
            other => Err(UnknownHvacMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    Heating,
    Idle,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[serde(rename = "°C")]
    Celsius,
}

pub const PRECISION_HALVES: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClimateFeatures(u32);

impl ClimateFeatures {
    pub const TARGET_TEMPERATURE: Self = Self(1);
    pub const FAN_MODE: Self = Self(8);

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for ClimateFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: BTreeSet<(String, String)>,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateAttributes {
    pub alarm_code: Option<String>,
    pub device_status: i32,
    pub human_device_status: String,
    pub smoke_temperature: Option<f64>,
    pub real_power: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateState {
    pub unique_id: String,
    pub name: String,
    #[serde(rename = "currentTemperature")]
    pub current_temperature: Option<f64>,
    #[serde(rename = "targetTemperature")]
    pub target_temperature: Option<f64>,
    #[serde(rename = "minTemp")]
    pub min_temp: f64,
    #[serde(rename = "maxTemp")]
    pub max_temp: f64,
    #[serde(rename = "targetTemperatureStep")]
    pub target_temperature_step: f64,
    #[serde(rename = "temperatureUnit")]
    pub temperature_unit: TemperatureUnit,
    #[serde(rename = "hvacMode")]
    pub hvac_mode: HvacMode,
    #[serde(rename = "hvacModes")]
    pub hvac_modes: Vec<HvacMode>,
    #[serde(rename = "hvacAction")]
    pub hvac_action: HvacAction,
    #[serde(rename = "fanMode")]
    pub fan_mode: String,
    #[serde(rename = "fanModes")]
    pub fan_modes: Vec<String>,
    #[serde(rename = "supportedFeatures")]
    pub supported_features: ClimateFeatures,
    pub attributes: StateAttributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes_case_insensitively() {
        assert_eq!("HEAT".parse::<HvacMode>(), Ok(HvacMode::Heat));
        assert_eq!(" off ".parse::<HvacMode>(), Ok(HvacMode::Off));
        assert_eq!("fan_only".parse::<HvacMode>(), Ok(HvacMode::FanOnly));
        assert!("boost".parse::<HvacMode>().is_err());
    }

    #[test]
    fn mode_serializes_like_as_str() {
        for mode in [HvacMode::Off, HvacMode::Heat, HvacMode::HeatCool] {
            let encoded = serde_json::to_string(&mode).unwrap();
            assert_eq!(encoded, format!("\"{}\"", mode.as_str()));
        }
    }

    #[test]
    fn feature_flags_combine() {
        let features = ClimateFeatures::TARGET_TEMPERATURE | ClimateFeatures::FAN_MODE;
        assert_eq!(features.bits(), 9);
        assert_eq!(ClimateFeatures::default().bits(), 0);
        assert_eq!(
            serde_json::to_string(&ClimateFeatures::TARGET_TEMPERATURE).unwrap(),
            "1"
        );
    }
}
