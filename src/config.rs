use crate::engine::CapabilityConfig;
use crate::environment::DEFAULT_ENVIRONMENT_NAME;
use crate::error::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parse `.env` content into key/value pairs.
/// Handles values with spaces without requiring quotes.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let mut value = value.trim();

        // Remove surrounding quotes if present
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }

        pairs.push((key.trim().to_string(), value.to_string()));
    }

    pairs
}

/// Load environment variables from a `.env` file in the working directory.
/// Variables already present in the environment win.
pub fn load_dotenv() {
    let Ok(content) = fs::read_to_string(".env") else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(&key).is_err() {
            // SAFETY: called once at start-up, before the async runtime spawns threads
            unsafe { std::env::set_var(&key, value) };
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment_name: String,
    pub detectors: Vec<CapabilityConfig>,
    pub notifiers: Vec<CapabilityConfig>,
    pub pin_source: PinSourceConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PinSourceConfig {
    /// Random pin levels generated in-process every `interval_secs`.
    Simulated { interval_secs: u64 },
    /// Pin levels read from the MQTT broker in [`MqttConfig`].
    Mqtt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pin levels are expected on `<topic_prefix>/<pin>`.
    pub topic_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "motion-bus".to_string(),
            username: None,
            password: None,
            topic_prefix: "gpio".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment_name: DEFAULT_ENVIRONMENT_NAME.to_string(),
            detectors: vec![CapabilityConfig::new("pir").with_pin(17)],
            notifiers: vec![CapabilityConfig::new("log")],
            pin_source: PinSourceConfig::Simulated { interval_secs: 30 },
            mqtt: MqttConfig::default(),
        }
    }
}

impl Config {
    /// `<config dir>/motion-bus/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("motion-bus").join("config.json"))
    }

    /// Load from `path`, or from [`Config::default_path`] when it exists,
    /// then apply environment overrides.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup.
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(name) = var("MOTION_ENVIRONMENT_NAME") {
            self.environment_name = name;
        }

        if let Some(url) = var("SLACK_WEBHOOK_URL") {
            if self.notifiers.iter().any(|n| n.kind == "slack") {
                for notifier in self.notifiers.iter_mut().filter(|n| n.kind == "slack") {
                    notifier.url = Some(url.clone());
                }
            } else {
                self.notifiers
                    .push(CapabilityConfig::new("slack").with_url(url));
            }
        }

        // MQTT configuration
        if let Some(host) = var("MQTT_BROKER_HOST") {
            self.mqtt.broker_host = host;
        }
        if let Some(port) = var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            self.mqtt.broker_port = p;
        }
        if let Some(client_id) = var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(prefix) = var("MQTT_TOPIC_PREFIX") {
            self.mqtt.topic_prefix = prefix;
        }

        self
    }

    /// Pins of all hardware detectors in the configuration.
    pub fn hardware_pins(&self) -> Vec<u8> {
        self.detectors.iter().filter_map(|d| d.pin).collect()
    }
}
