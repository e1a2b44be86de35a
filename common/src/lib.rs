pub mod climate;
pub mod config;
pub mod device;
pub mod error;
pub mod setup;
pub mod status;
pub mod topics;
pub mod types;

pub const DOMAIN: &str = "aguaiot";

pub use climate::AguaClimate;
pub use config::{BridgeConfig, EntryConfig, MqttConfig};
pub use device::{DeviceSource, HeatingDevice};
pub use error::{DeviceError, SetupError};
pub use setup::{setup_entry, setup_platform, IntegrationData};
pub use types::{ClimateState, HvacAction, HvacMode};
