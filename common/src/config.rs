use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryConfig {
    pub unique_id: String,
    pub email: String,
    pub password: String,
    pub api_url: String,
    pub customer_code: String,
    pub brand_id: String,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            unique_id: String::new(),
            email: String::new(),
            password: String::new(),
            api_url: "https://agua-iot.example.invalid".to_string(),
            customer_code: String::new(),
            brand_id: "1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub entry: EntryConfig,
    pub poll_interval_ms: u64,
    pub state_publish_interval_ms: u64,
    pub http_port: u16,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default = "default_simulated_devices")]
    pub simulated_devices: u8,
}

fn default_simulated_devices() -> u8 {
    1
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            entry: EntryConfig {
                unique_id: "local".to_string(),
                ..EntryConfig::default()
            },
            poll_interval_ms: 60_000,
            state_publish_interval_ms: 10_000,
            http_port: 8080,
            mqtt: MqttConfig::default(),
            simulated_devices: default_simulated_devices(),
        }
    }
}

impl BridgeConfig {
    pub fn sanitize(&mut self) {
        self.poll_interval_ms = self.poll_interval_ms.clamp(5_000, 3_600_000);
        self.state_publish_interval_ms = self.state_publish_interval_ms.clamp(1_000, 3_600_000);
        self.simulated_devices = self.simulated_devices.clamp(1, 8);

        if self.entry.unique_id.trim().is_empty() {
            self.entry.unique_id = if self.entry.email.is_empty() {
                "local".to_string()
            } else {
                self.entry.email.clone()
            };
        }
    }
}
