use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("credentials rejected by the Agua IOT backend")]
    Unauthorized,
    #[error("cannot reach the Agua IOT backend: {0}")]
    Connection(String),
    #[error("{0}")]
    Vendor(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("no Agua IOT session registered for config entry {0}")]
    UnknownEntry(String),
}
