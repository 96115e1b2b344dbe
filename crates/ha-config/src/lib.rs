//! YAML configuration loading for the bridge
//!
//! `bridge.yaml` is loaded from a config directory with support for the
//! Home Assistant style tags:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ha_config::BridgeConfig;
//!
//! let config = BridgeConfig::load("/config")?;
//! for entity in &config.entities {
//!     println!("{} at {}", entity.display_name(), entity.entity_id);
//! }
//! ```

mod bridge_config;
mod error;
mod loader;
mod secrets;

pub use bridge_config::{
    ApiConfig, BridgeConfig, CommandTransport, EntityConfig, MqttConfig, CONFIG_FILE,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use secrets::{Secrets, SECRETS_FILE};
