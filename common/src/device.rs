use crate::error::DeviceError;

#[cfg_attr(test, mockall::automock)]
pub trait HeatingDevice {
    fn id_device(&self) -> String;
    fn name(&self) -> String;
    fn name_product(&self) -> String;

    fn air_temperature(&self) -> Option<f64>;
    fn water_temperature(&self) -> Option<f64>;
    fn gas_temperature(&self) -> Option<f64>;
    fn set_air_temperature(&self) -> Option<f64>;
    fn set_water_temperature(&self) -> Option<f64>;

    fn status(&self) -> i32;
    fn status_translated(&self) -> String;
    fn alarms(&self) -> Option<String>;

    fn real_power(&self) -> i32;
    fn set_power(&self) -> i32;
    fn min_power(&self) -> i32;
    fn max_power(&self) -> i32;
    fn min_temp(&self) -> f64;
    fn max_temp(&self) -> f64;

    fn write_air_temperature(&mut self, value: f64) -> Result<(), DeviceError>;
    fn write_water_temperature(&mut self, value: f64) -> Result<(), DeviceError>;
    fn write_power(&mut self, value: i32) -> Result<(), DeviceError>;

    fn turn_on(&mut self) -> Result<(), DeviceError>;
    fn turn_off(&mut self) -> Result<(), DeviceError>;
    fn update(&mut self) -> Result<(), DeviceError>;
}

pub trait DeviceSource {
    type Device: HeatingDevice;

    fn devices(&self) -> Vec<Self::Device>;
}
