//! Bridge configuration
//!
//! Parsed from `bridge.yaml` in the config directory:
//!
//! ```yaml
//! base_topic: homeassistant
//! mqtt:
//!   host: broker.local
//!   password: !secret mqtt_password
//! api:
//!   base_url: http://homeassistant.local:8123
//!   token: !secret api_token
//! command_transport: service
//! cache_path: .storage/bridge.attribute_cache
//! entities:
//!   - entity_id: light.kitchen
//!     name: Kitchen
//!   - entity_id: lock.front_door
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use ha_core::EntityId;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

pub const CONFIG_FILE: &str = "bridge.yaml";

/// How outbound commands leave the bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTransport {
    /// Publish to `<base>/<domain>/<name>/set`
    #[default]
    Publish,
    /// Call the REST service endpoint
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            username: None,
            password: None,
        }
    }
}

/// Home Assistant REST API used for service calls and state refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// e.g. `http://homeassistant.local:8123`
    pub base_url: String,

    /// Long-lived access token
    #[serde(default)]
    pub token: Option<String>,
}

/// One bridged entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub entity_id: EntityId,

    #[serde(default)]
    pub name: Option<String>,
}

impl EntityConfig {
    /// Configured name, or the object_id when none was given
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.entity_id.object_id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub command_transport: CommandTransport,

    /// Seconds before an unacknowledged service call is reported
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,

    #[serde(default = "default_ack_check_interval_secs")]
    pub ack_check_interval_secs: u64,

    /// Attribute cache file, relative paths are resolved against the config dir
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Bridged entities; list order is the slot order
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

fn default_base_topic() -> String {
    "homeassistant".to_string()
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "ha-bridge".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_ack_timeout_secs() -> u64 {
    10
}

fn default_ack_check_interval_secs() -> u64 {
    5
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_topic: default_base_topic(),
            mqtt: MqttConfig::default(),
            api: None,
            command_transport: CommandTransport::default(),
            ack_timeout_secs: default_ack_timeout_secs(),
            ack_check_interval_secs: default_ack_check_interval_secs(),
            cache_path: None,
            entities: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate `bridge.yaml` from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let yaml = load_yaml(config_dir, CONFIG_FILE)?;
        let mut config = Self::from_yaml(yaml)?;

        if let Some(path) = config.cache_path.take() {
            config.cache_path = Some(if path.is_absolute() {
                path
            } else {
                config_dir.join(path)
            });
        }

        debug!(
            entities = config.entities.len(),
            transport = ?config.command_transport,
            "Loaded bridge configuration"
        );
        Ok(config)
    }

    /// Deserialize and validate an already tag-resolved YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        if !yaml.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }

        let config: BridgeConfig =
            serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
                key: "bridge".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_topic.trim_matches('/').is_empty() && !self.base_topic.is_empty() {
            return Err(ConfigError::ValidationFailed {
                message: format!("base_topic '{}' has no usable segment", self.base_topic),
            });
        }

        let mut seen = HashSet::new();
        for entity in &self.entities {
            if !seen.insert(&entity.entity_id) {
                return Err(ConfigError::ValidationFailed {
                    message: format!("entity '{}' is listed more than once", entity.entity_id),
                });
            }
        }

        if self.command_transport == CommandTransport::Service && self.api.is_none() {
            return Err(ConfigError::ValidationFailed {
                message: "command_transport 'service' requires an 'api' section".to_string(),
            });
        }

        if self.ack_timeout_secs == 0 || self.ack_check_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "ack intervals must be at least one second".to_string(),
            });
        }

        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    pub fn ack_check_interval(&self) -> Duration {
        Duration::from_secs(self.ack_check_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::Domain;
    use std::fs;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> ConfigResult<BridgeConfig> {
        BridgeConfig::from_yaml(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = parse("{}").unwrap();
        assert_eq!(config.base_topic, "homeassistant");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.command_transport, CommandTransport::Publish);
        assert_eq!(config.ack_timeout(), Duration::from_secs(10));
        assert_eq!(config.ack_check_interval(), Duration::from_secs(5));
        assert!(config.entities.is_empty());
    }

    #[test]
    fn test_parse_entities() {
        let config = parse(
            r#"
base_topic: site/ha
entities:
  - entity_id: light.kitchen
    name: Kitchen
  - entity_id: lock.front_door
"#,
        )
        .unwrap();

        assert_eq!(config.base_topic, "site/ha");
        assert_eq!(config.entities.len(), 2);
        assert_eq!(config.entities[0].entity_id.domain(), Domain::Light);
        assert_eq!(config.entities[0].display_name(), "Kitchen");
        assert_eq!(config.entities[1].display_name(), "front_door");
    }

    #[test]
    fn test_invalid_entity_id() {
        let result = parse("entities:\n  - entity_id: toaster.kitchen\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = parse("entities:\n  - entity_id: light\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_duplicate_entity() {
        let result = parse(
            "entities:\n  - entity_id: switch.pump\n  - entity_id: switch.pump\n",
        );
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn test_service_transport_requires_api() {
        let result = parse("command_transport: service\n");
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));

        let config = parse(
            "command_transport: service\napi:\n  base_url: http://ha.local:8123\n  token: abc\n",
        )
        .unwrap();
        assert_eq!(config.command_transport, CommandTransport::Service);
        assert_eq!(config.api.unwrap().token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_load_from_dir_with_secrets() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.yaml"), "mqtt_password: hunter2\n").unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
mqtt:
  host: broker.local
  username: bridge
  password: !secret mqtt_password
cache_path: .storage/cache.json
entities:
  - entity_id: cover.garage
"#,
        )
        .unwrap();

        let config = BridgeConfig::load(dir.path()).unwrap();
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.password.as_deref(), Some("hunter2"));
        assert_eq!(
            config.cache_path,
            Some(dir.path().join(".storage/cache.json"))
        );
    }

    #[test]
    fn test_missing_config_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            BridgeConfig::load(dir.path()),
            Err(ConfigError::ReadFile { .. })
        ));
    }
}
