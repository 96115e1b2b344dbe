//! YAML loader with custom tag support
//!
//! Tags resolved while loading:
//! - `!include path` - Include another YAML file (relative to the including file)
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable, with optional fallback

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, outermost first
    include_stack: Vec<PathBuf>,
}

impl YamlLoader {
    /// Create a loader for `config_dir`, reading its secrets.yaml
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: Vec::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load a file and resolve every tag in it
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        debug!(path = %path.display(), "Loading YAML file");
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;

        self.include_stack.push(path.clone());
        let result = self.load_str(&content, &path);
        self.include_stack.pop();
        result
    }

    /// Parse YAML text; `source_path` anchors relative includes
    pub fn load_str(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
                path: source_path.to_path_buf(),
                source,
            })?;
        self.resolve(value, source_path)
    }

    fn resolve(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.resolve_tag(*tagged, source_path),
            Value::Mapping(map) => {
                let mut resolved = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(key, self.resolve(value, source_path)?);
                }
                Ok(Value::Mapping(resolved))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|item| self.resolve(item, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn resolve_tag(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(tag = %tag, "Resolving tag");

        match tag.as_str() {
            "!include" => {
                let path = include_path(&tagged.value, source_path, &self.config_dir)?;
                self.load_file(path)
            }
            "!secret" => {
                let key = tag_argument(&tag, &tagged.value)?;
                let secret = self.secrets.get(&key)?;
                debug!(key = %key, "Substituted secret");
                Ok(Value::String(secret.to_string()))
            }
            "!env_var" => resolve_env_var(&tag_argument(&tag, &tagged.value)?),
            _ => Err(ConfigError::InvalidValue {
                key: tag,
                reason: "unsupported YAML tag".to_string(),
            }),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

fn tag_argument(tag: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err(ConfigError::InvalidValue {
            key: tag.to_string(),
            reason: "tag argument must be a string".to_string(),
        }),
    }
}

/// `!env_var NAME` or `!env_var NAME fallback value`
fn resolve_env_var(argument: &str) -> ConfigResult<Value> {
    let (name, fallback) = match argument.split_once(char::is_whitespace) {
        Some((name, fallback)) => (name, Some(fallback.trim())),
        None => (argument, None),
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => {
            debug!(var = %name, "Substituted environment variable");
            Ok(Value::String(value))
        }
        (Err(_), Some(fallback)) => {
            debug!(var = %name, "Environment variable unset, using fallback");
            Ok(Value::String(fallback.to_string()))
        }
        (Err(_), None) => Err(ConfigError::EnvVarNotFound {
            var: name.to_string(),
        }),
    }
}

fn include_path(value: &Value, source_path: &Path, config_dir: &Path) -> ConfigResult<PathBuf> {
    let raw = match value {
        Value::String(s) if !s.trim().is_empty() => s.trim(),
        other => {
            return Err(ConfigError::InvalidIncludePath {
                path: format!("{:?}", other),
                reason: "path must be a non-empty string".to_string(),
            })
        }
    };

    let path = Path::new(raw);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let base = source_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(config_dir);
    Ok(base.join(path))
}

/// Load `file` from `config_dir` with full tag resolution
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir)?.load_file(file)
}
