//! Entity ID type representing a `domain.object_id` pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::Domain;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("unsupported domain '{0}'")]
    UnsupportedDomain(String),

    #[error(
        "object_id contains invalid characters (must be lowercase alphanumeric with underscores, cannot start/end with underscore)"
    )]
    InvalidObjectIdChars,
}

/// Identifies one bridged entity (e.g. `light.living_room`)
///
/// The domain part is restricted to the closed set of [`Domain`]s the bridge
/// knows how to translate; the object_id follows Home Assistant's slug rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: Domain,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from a domain and an object_id
    pub fn new(domain: Domain, object_id: impl Into<String>) -> Result<Self, EntityIdError> {
        let object_id = object_id.into();
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if !is_valid_object_id(&object_id) {
            return Err(EntityIdError::InvalidObjectIdChars);
        }
        Ok(Self { domain, object_id })
    }

    /// Build an EntityId from the raw domain and name segments of a topic
    ///
    /// The name is slugified first so that topic names such as `Kitchen-Lamp`
    /// map onto `kitchen_lamp`.
    pub fn from_topic_parts(domain: &str, name: &str) -> Result<Self, EntityIdError> {
        let domain: Domain = domain
            .parse()
            .map_err(|_| EntityIdError::UnsupportedDomain(domain.to_string()))?;
        Self::new(domain, slugify(name))
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Identifier of the primary slot mirroring this entity
    pub fn slot_identifier(&self) -> String {
        sanitize_identifier(&self.to_string())
    }
}

/// Lowercase a free-form name and collapse anything that is not
/// alphanumeric into single underscores.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Turn any identifier into the form used by the slot store: lowercase,
/// every non-alphanumeric character replaced by `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Matches Home Assistant's object_id regex: `(?!_)[\da-z_]+(?<!_)`
fn is_valid_object_id(s: &str) -> bool {
    if s.starts_with('_') || s.ends_with('_') {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, object_id) = s.split_once('.').ok_or(EntityIdError::InvalidFormat)?;
        if object_id.contains('.') {
            return Err(EntityIdError::InvalidFormat);
        }
        let domain: Domain = domain
            .parse()
            .map_err(|_| EntityIdError::UnsupportedDomain(domain.to_string()))?;
        Self::new(domain, object_id)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_entity_id() {
        let id = EntityId::new(Domain::Light, "living_room").unwrap();
        assert_eq!(id.domain(), Domain::Light);
        assert_eq!(id.object_id(), "living_room");
        assert_eq!(id.to_string(), "light.living_room");
    }

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "binary_sensor.front_door".parse().unwrap();
        assert_eq!(id.domain(), Domain::BinarySensor);
        assert_eq!(id.object_id(), "front_door");
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(
            "no_separator".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "light.too.many".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
    }

    #[test]
    fn test_unsupported_domain() {
        assert_eq!(
            "weather.home".parse::<EntityId>().unwrap_err(),
            EntityIdError::UnsupportedDomain("weather".to_string())
        );
    }

    #[test]
    fn test_object_id_rules() {
        assert_eq!(
            "light.".parse::<EntityId>().unwrap_err(),
            EntityIdError::EmptyObjectId
        );
        assert_eq!(
            "light.UPPER".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectIdChars
        );
        assert_eq!(
            "light._room".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectIdChars
        );
        assert!("light.my__room".parse::<EntityId>().is_ok());
    }

    #[test]
    fn test_from_topic_parts_slugifies_name() {
        let id = EntityId::from_topic_parts("light", "Kitchen-Lamp 2").unwrap();
        assert_eq!(id.to_string(), "light.kitchen_lamp_2");
    }

    #[test]
    fn test_slot_identifier_is_sanitized() {
        let id = EntityId::new(Domain::MediaPlayer, "den_tv").unwrap();
        assert_eq!(id.slot_identifier(), "media_player_den_tv");
        assert_eq!(sanitize_identifier("Cover.Garage-Door"), "cover_garage_door");
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = EntityId::new(Domain::Switch, "kitchen").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.kitchen\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
