use std::collections::HashMap;

use tracing::{debug, info};

use crate::{
    climate::AguaClimate,
    config::EntryConfig,
    device::{DeviceSource, HeatingDevice},
    error::SetupError,
};

// Sessions are keyed by config entry unique id.
#[derive(Debug)]
pub struct IntegrationData<S> {
    sessions: HashMap<String, S>,
}

impl<S> Default for IntegrationData<S> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<S: DeviceSource> IntegrationData<S> {
    pub fn insert(&mut self, unique_id: impl Into<String>, session: S) -> Option<S> {
        self.sessions.insert(unique_id.into(), session)
    }

    pub fn get(&self, unique_id: &str) -> Option<&S> {
        self.sessions.get(unique_id)
    }
}

// Entities only come from config entries; the platform hook registers nothing.
pub fn setup_platform<D, F>(_config: &EntryConfig, _add_entities: F)
where
    D: HeatingDevice,
    F: FnOnce(Vec<AguaClimate<D>>, bool),
{
    debug!("aguaiot climate platform setup has nothing to do");
}

pub fn setup_entry<S, F>(
    data: &IntegrationData<S>,
    entry: &EntryConfig,
    add_entities: F,
) -> Result<usize, SetupError>
where
    S: DeviceSource,
    F: FnOnce(Vec<AguaClimate<S::Device>>, bool),
{
    let session = data
        .get(&entry.unique_id)
        .ok_or_else(|| SetupError::UnknownEntry(entry.unique_id.clone()))?;

    let entities: Vec<_> = session.devices().into_iter().map(AguaClimate::new).collect();
    let count = entities.len();
    info!("registering {count} Agua IOT climate entities for {}", entry.unique_id);
    add_entities(entities, true);
    Ok(count)
}
