use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aguaiot_common::{DeviceError, DeviceSource, HeatingDevice};

pub const STATUS_OFF: i32 = 0;
pub const STATUS_CLEANING: i32 = 1;
pub const STATUS_FLAME: i32 = 2;
pub const STATUS_ON: i32 = 3;
pub const STATUS_CLEANING_FINAL: i32 = 6;

const AMBIENT_FLOOR_C: f64 = 15.0;

#[derive(Debug, Clone)]
struct StoveState {
    status: i32,
    air_temperature: f64,
    set_air_temperature: f64,
    gas_temperature: f64,
    set_power: i32,
    real_power: i32,
}

impl Default for StoveState {
    fn default() -> Self {
        Self {
            status: STATUS_OFF,
            air_temperature: 18.0,
            set_air_temperature: 21.0,
            gas_temperature: 20.0,
            set_power: 3,
            real_power: 0,
        }
    }
}

// Clones share one stove state.
#[derive(Debug, Clone)]
pub struct SimulatedStove {
    id: String,
    name: String,
    state: Arc<Mutex<StoveState>>,
}

impl SimulatedStove {
    pub const MIN_POWER: i32 = 1;
    pub const MAX_POWER: i32 = 5;
    pub const MIN_TEMP: f64 = 7.0;
    pub const MAX_TEMP: f64 = 30.0;

    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: Arc::new(Mutex::new(StoveState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status_text(status: i32) -> &'static str {
        match status {
            STATUS_OFF => "OFF",
            STATUS_CLEANING => "CLEANING FIRE-POT",
            STATUS_FLAME => "FLAME LIGHT",
            STATUS_ON => "ON",
            STATUS_CLEANING_FINAL => "CLEANING FINAL",
            _ => "UNKNOWN",
        }
    }
}

impl HeatingDevice for SimulatedStove {
    fn id_device(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn name_product(&self) -> String {
        "Simulated pellet stove".to_string()
    }

    fn air_temperature(&self) -> Option<f64> {
        Some(self.state().air_temperature)
    }

    fn water_temperature(&self) -> Option<f64> {
        None
    }

    fn gas_temperature(&self) -> Option<f64> {
        Some(self.state().gas_temperature)
    }

    fn set_air_temperature(&self) -> Option<f64> {
        Some(self.state().set_air_temperature)
    }

    fn set_water_temperature(&self) -> Option<f64> {
        None
    }

    fn status(&self) -> i32 {
        self.state().status
    }

    fn status_translated(&self) -> String {
        Self::status_text(self.state().status).to_string()
    }

    fn alarms(&self) -> Option<String> {
        None
    }

    fn real_power(&self) -> i32 {
        self.state().real_power
    }

    fn set_power(&self) -> i32 {
        self.state().set_power
    }

    fn min_power(&self) -> i32 {
        Self::MIN_POWER
    }

    fn max_power(&self) -> i32 {
        Self::MAX_POWER
    }

    fn min_temp(&self) -> f64 {
        Self::MIN_TEMP
    }

    fn max_temp(&self) -> f64 {
        Self::MAX_TEMP
    }

    fn write_air_temperature(&mut self, value: f64) -> Result<(), DeviceError> {
        if !(Self::MIN_TEMP..=Self::MAX_TEMP).contains(&value) {
            return Err(DeviceError::InvalidValue(format!(
                "air temperature {value} outside {}..={}",
                Self::MIN_TEMP,
                Self::MAX_TEMP
            )));
        }
        self.state().set_air_temperature = value;
        Ok(())
    }

    fn write_water_temperature(&mut self, _value: f64) -> Result<(), DeviceError> {
        Err(DeviceError::Vendor(format!(
            "{} has no water circuit",
            self.id
        )))
    }

    fn write_power(&mut self, value: i32) -> Result<(), DeviceError> {
        if !(Self::MIN_POWER..=Self::MAX_POWER).contains(&value) {
            return Err(DeviceError::InvalidValue(format!(
                "power {value} outside {}..={}",
                Self::MIN_POWER,
                Self::MAX_POWER
            )));
        }
        self.state().set_power = value;
        Ok(())
    }

    fn turn_on(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state();
        if matches!(state.status, STATUS_OFF | STATUS_CLEANING_FINAL) {
            state.status = STATUS_CLEANING;
        }
        Ok(())
    }

    fn turn_off(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.status != STATUS_OFF {
            state.status = STATUS_CLEANING_FINAL;
        }
        Ok(())
    }

    fn update(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state();

        state.status = match state.status {
            STATUS_CLEANING => STATUS_FLAME,
            STATUS_FLAME => STATUS_ON,
            STATUS_CLEANING_FINAL => STATUS_OFF,
            other => other,
        };

        if state.status == STATUS_ON {
            state.real_power = state.set_power;
            let step = 0.1 * f64::from(state.set_power);
            state.air_temperature = (state.air_temperature + step).min(state.set_air_temperature);
            state.gas_temperature = 60.0 + 20.0 * f64::from(state.set_power);
        } else {
            state.real_power = 0;
            state.air_temperature = (state.air_temperature - 0.2).max(AMBIENT_FLOOR_C);
            state.gas_temperature = (state.gas_temperature - 10.0).max(state.air_temperature);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedAccount {
    stoves: Vec<SimulatedStove>,
}

impl SimulatedAccount {
    pub fn new(count: u8) -> Self {
        let stoves = (1..=count)
            .map(|index| SimulatedStove::new(format!("sim-{index}"), format!("Stove {index}")))
            .collect();
        Self { stoves }
    }
}

impl DeviceSource for SimulatedAccount {
    type Device = SimulatedStove;

    fn devices(&self) -> Vec<SimulatedStove> {
        self.stoves.clone()
    }
}

#[cfg(test)]
mod tests {
    use aguaiot_common::{AguaClimate, HvacAction, HvacMode};

    use super::*;

    #[test]
    fn start_sequence_reaches_heating() {
        let mut climate = AguaClimate::new(SimulatedStove::new("sim-1", "Stove"));
        assert_eq!(climate.hvac_mode(), HvacMode::Off);
        assert_eq!(climate.hvac_action(), HvacAction::Off);

        climate.set_hvac_mode(HvacMode::Heat);
        assert_eq!(climate.hvac_action(), HvacAction::Idle);

        assert!(climate.update());
        assert_eq!(climate.hvac_action(), HvacAction::Heating);
        assert!(climate.update());
        assert_eq!(climate.device().status(), STATUS_ON);
        assert_eq!(climate.hvac_mode(), HvacMode::Heat);
    }

    #[test]
    fn shutdown_passes_through_final_cleaning() {
        let mut climate = AguaClimate::new(SimulatedStove::new("sim-1", "Stove"));
        climate.turn_on();
        climate.update();
        climate.update();

        climate.turn_off();
        assert_eq!(climate.device().status(), STATUS_CLEANING_FINAL);
        assert_eq!(climate.hvac_mode(), HvacMode::Off);
        assert_eq!(climate.hvac_action(), HvacAction::Idle);

        climate.update();
        assert_eq!(climate.hvac_action(), HvacAction::Off);
    }

    #[test]
    fn out_of_range_setpoints_are_rejected() {
        let mut climate = AguaClimate::new(SimulatedStove::new("sim-1", "Stove"));
        climate.set_temperature(Some(45.0));
        climate.set_fan_mode(Some("9"));

        assert_eq!(climate.target_temperature(), Some(21.0));
        assert_eq!(climate.fan_mode(), "3");

        climate.set_temperature(Some(23.5));
        climate.set_fan_mode(Some("5"));
        assert_eq!(climate.target_temperature(), Some(23.5));
        assert_eq!(climate.fan_mode(), "5");
    }

    #[test]
    fn heating_approaches_setpoint_without_overshoot() {
        let mut climate = AguaClimate::new(SimulatedStove::new("sim-1", "Stove"));
        climate.turn_on();
        for _ in 0..200 {
            climate.update();
        }
        assert_eq!(climate.current_temperature(), Some(21.0));
    }

    #[test]
    fn clones_share_device_state() {
        let account = SimulatedAccount::new(2);
        let devices = account.devices();
        assert_eq!(devices.len(), 2);

        let mut handle = devices[0].clone();
        handle.write_power(1).unwrap();
        assert_eq!(account.devices()[0].set_power(), 1);
        assert_eq!(account.devices()[1].set_power(), 3);
    }
}
