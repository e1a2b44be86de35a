use std::collections::BTreeSet;

use tracing::{debug, error};

use crate::{
    device::HeatingDevice,
    error::DeviceError,
    status::{hvac_action_for, hvac_mode_for},
    types::{
        ClimateFeatures, ClimateState, DeviceInfo, HvacAction, HvacMode, StateAttributes,
        TemperatureUnit, PRECISION_HALVES,
    },
    DOMAIN,
};

pub const MANUFACTURER: &str = "Micronova";

const HVAC_MODES: [HvacMode; 2] = [HvacMode::Heat, HvacMode::Off];

#[derive(Debug)]
pub struct AguaClimate<D> {
    device: D,
}

impl<D: HeatingDevice> AguaClimate<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn unique_id(&self) -> String {
        self.device.id_device()
    }

    pub fn name(&self) -> String {
        self.device.name()
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: BTreeSet::from([(DOMAIN.to_string(), self.unique_id())]),
            name: self.name(),
            manufacturer: MANUFACTURER,
            model: self.device.name_product(),
        }
    }

    pub fn supported_features(&self) -> ClimateFeatures {
        ClimateFeatures::TARGET_TEMPERATURE | ClimateFeatures::FAN_MODE
    }

    pub fn extra_state_attributes(&self) -> StateAttributes {
        StateAttributes {
            alarm_code: self.device.alarms(),
            device_status: self.device.status(),
            human_device_status: self.device.status_translated(),
            smoke_temperature: self.device.gas_temperature(),
            real_power: self.device.real_power(),
        }
    }

    pub fn precision(&self) -> f64 {
        PRECISION_HALVES
    }

    pub fn target_temperature_step(&self) -> f64 {
        PRECISION_HALVES
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        TemperatureUnit::Celsius
    }

    pub fn min_temp(&self) -> f64 {
        self.device.min_temp()
    }

    pub fn max_temp(&self) -> f64 {
        self.device.max_temp()
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.device
            .air_temperature()
            .or_else(|| self.device.water_temperature())
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.device
            .set_air_temperature()
            .or_else(|| self.device.set_water_temperature())
    }

    pub fn hvac_mode(&self) -> HvacMode {
        hvac_mode_for(self.device.status())
    }

    pub fn hvac_modes(&self) -> Vec<HvacMode> {
        HVAC_MODES.to_vec()
    }

    pub fn hvac_action(&self) -> HvacAction {
        hvac_action_for(&self.device.status_translated())
    }

    pub fn fan_mode(&self) -> String {
        self.device.set_power().to_string()
    }

    pub fn fan_modes(&self) -> Vec<String> {
        (self.device.min_power()..=self.device.max_power())
            .map(|power| power.to_string())
            .collect()
    }

    pub fn state(&self) -> ClimateState {
        ClimateState {
            unique_id: self.unique_id(),
            name: self.name(),
            current_temperature: self.current_temperature(),
            target_temperature: self.target_temperature(),
            min_temp: self.min_temp(),
            max_temp: self.max_temp(),
            target_temperature_step: self.target_temperature_step(),
            temperature_unit: self.temperature_unit(),
            hvac_mode: self.hvac_mode(),
            hvac_modes: self.hvac_modes(),
            hvac_action: self.hvac_action(),
            fan_mode: self.fan_mode(),
            fan_modes: self.fan_modes(),
            supported_features: self.supported_features(),
            attributes: self.extra_state_attributes(),
        }
    }

    pub fn turn_off(&mut self) {
        if let Err(err) = self.device.turn_off() {
            error!("failed to turn off {}, error: {err}", self.label());
        }
    }

    pub fn turn_on(&mut self) {
        if let Err(err) = self.device.turn_on() {
            error!("failed to turn on {}, error: {err}", self.label());
        }
    }

    pub fn set_temperature(&mut self, temperature: Option<f64>) {
        let Some(temperature) = temperature else {
            return;
        };

        if let Err(err) = self.try_set_temperature(temperature) {
            error!("failed to set temperature on {}, error: {err}", self.label());
        }
    }

    pub fn set_fan_mode(&mut self, fan_mode: Option<&str>) {
        let Some(fan_mode) = fan_mode.filter(|mode| is_power_level(mode)) else {
            return;
        };

        if let Err(err) = self.try_set_fan_mode(fan_mode) {
            error!("failed to set fan mode on {}, error: {err}", self.label());
        }
    }

    pub fn set_hvac_mode(&mut self, hvac_mode: HvacMode) {
        match hvac_mode {
            HvacMode::Off => self.turn_off(),
            HvacMode::Heat => self.turn_on(),
            other => debug!("ignoring unsupported hvac mode {other} for {}", self.label()),
        }
    }

    pub fn update(&mut self) -> bool {
        match self.device.update() {
            Ok(()) => true,
            Err(err) => {
                error!("{}", self.update_failure_message(&err));
                false
            }
        }
    }

    fn try_set_temperature(&mut self, temperature: f64) -> Result<(), DeviceError> {
        if !temperature.is_finite() {
            return Err(DeviceError::InvalidValue(format!(
                "temperature {temperature} is not a finite number"
            )));
        }

        // Air sensor wins when both are reported.
        if self.device.air_temperature().is_some() {
            self.device.write_air_temperature(temperature)
        } else if self.device.water_temperature().is_some() {
            self.device.write_water_temperature(temperature)
        } else {
            Ok(())
        }
    }

    fn try_set_fan_mode(&mut self, fan_mode: &str) -> Result<(), DeviceError> {
        let power = fan_mode
            .parse::<i32>()
            .map_err(|err| DeviceError::InvalidValue(format!("fan mode {fan_mode}: {err}")))?;
        self.device.write_power(power)
    }

    fn update_failure_message(&self, err: &DeviceError) -> String {
        match err {
            DeviceError::Unauthorized => format!("wrong credentials for device {}", self.label()),
            DeviceError::Connection(_) => "connection to Agua IOT not possible".to_string(),
            other => format!("failed to update {}, error: {other}", self.label()),
        }
    }

    fn label(&self) -> String {
        format!("{} ({})", self.device.name(), self.device.id_device())
    }
}

fn is_power_level(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}
