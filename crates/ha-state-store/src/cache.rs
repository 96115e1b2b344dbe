//! Persisted attribute cache
//!
//! Last known state and attributes of every entity the bridge has seen,
//! written as a versioned JSON file so values survive a restart. The cache
//! only seeds entities; live transport data always wins.
//!
//! JSON format:
//! ```json
//! {
//!   "version": 1,
//!   "minor_version": 1,
//!   "key": "bridge.attribute_cache",
//!   "data": {
//!     "light.kitchen": { "state": "on", "attributes": {...}, "last_updated": "..." }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ha_core::{Attributes, Entity, EntityId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub const CACHE_KEY: &str = "bridge.attribute_cache";
pub const CACHE_VERSION: u32 = 1;
pub const CACHE_MINOR_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported cache version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// One cached entity snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntity {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    minor_version: u32,
    key: String,
    data: BTreeMap<String, CachedEntity>,
}

/// Attribute cache keyed by entity_id
#[derive(Debug, Default)]
pub struct AttributeCache {
    /// Backing file, `None` keeps the cache in memory only
    path: Option<PathBuf>,
    entries: BTreeMap<String, CachedEntity>,
}

impl AttributeCache {
    /// A cache that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache from `path`; a missing file yields an empty cache
    #[instrument(skip(path), fields(cache_path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!("Attribute cache not found, starting empty");
            return Ok(Self {
                path: Some(path),
                entries: BTreeMap::new(),
            });
        }

        let content = fs::read_to_string(&path)?;
        let file: CacheFile = serde_json::from_str(&content)?;
        if file.version != CACHE_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: file.version,
                expected: CACHE_VERSION,
            });
        }

        debug!(
            entries = file.data.len(),
            "Loaded attribute cache (v{}.{})", file.version, file.minor_version
        );
        Ok(Self {
            path: Some(path),
            entries: file.data,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&CachedEntity> {
        self.entries.get(&entity_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot an entity into the cache (in memory only until [`save`](Self::save))
    pub fn record(&mut self, entity: &Entity) {
        self.entries.insert(
            entity.entity_id.to_string(),
            CachedEntity {
                state: entity.state.clone(),
                attributes: entity.attributes.clone(),
                last_updated: entity.last_updated,
            },
        );
    }

    /// Write the cache atomically (temp file, then rename)
    pub fn save(&self) -> CacheResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = CacheFile {
            version: CACHE_VERSION,
            minor_version: CACHE_MINOR_VERSION,
            key: CACHE_KEY.to_string(),
            data: self.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        debug!(entries = self.entries.len(), "Saved attribute cache");
        Ok(())
    }
}
