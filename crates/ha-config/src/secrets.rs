//! `secrets.yaml` lookup for the `!secret` tag

use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SECRETS_FILE: &str = "secrets.yaml";

/// Flat key/value secrets, every value rendered as a string
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
    path: Option<PathBuf>,
}

impl Secrets {
    /// Load `secrets.yaml` from the config directory; a missing file is empty
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(SECRETS_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "No secrets file, continuing without secrets");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;
        let raw: HashMap<String, serde_yaml::Value> =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseYaml {
                path: path.clone(),
                source,
            })?;

        let values: HashMap<String, String> = raw
            .into_iter()
            .map(|(key, value)| (key, scalar_to_string(value)))
            .collect();

        debug!(count = values.len(), path = %path.display(), "Loaded secrets");
        Ok(Self {
            values,
            path: Some(path),
        })
    }

    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Path of the loaded file, `None` when no secrets file existed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn scalar_to_string(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_secrets() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SECRETS_FILE),
            "mqtt_password: hunter2\nmqtt_port: 8883\ntls: true\n",
        )
        .unwrap();

        let secrets = Secrets::load(dir.path()).unwrap();
        assert_eq!(secrets.get("mqtt_password").unwrap(), "hunter2");
        assert_eq!(secrets.get("mqtt_port").unwrap(), "8883");
        assert_eq!(secrets.get("tls").unwrap(), "true");
        assert_eq!(secrets.len(), 3);
        assert!(secrets.path().is_some());
    }

    #[test]
    fn test_missing_secret() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SECRETS_FILE), "token: abc\n").unwrap();

        let secrets = Secrets::load(dir.path()).unwrap();
        assert!(secrets.contains("token"));
        assert!(matches!(
            secrets.get("nonexistent"),
            Err(ConfigError::SecretNotFound { .. })
        ));
    }

    #[test]
    fn test_no_secrets_file() {
        let dir = TempDir::new().unwrap();
        let secrets = Secrets::load(dir.path()).unwrap();
        assert!(secrets.is_empty());
        assert!(secrets.path().is_none());
    }
}
