//! Topic parsing
//!
//! Topics have the shape `<base>/<domain>/<name>/<suffix>`. The base prefix
//! may itself contain `/`, so the last three segments are what identify the
//! entity and the kind of message.

use std::fmt;

use ha_core::Domain;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic '{0}' has fewer than 3 segments")]
    TooFewSegments(String),

    #[error("topic '{0}' has an empty domain, name or suffix segment")]
    EmptySegment(String),
}

/// What the last topic segment says about the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicSuffix {
    /// Full state update (`.../state`)
    State,
    /// Command topic (`.../set`), our own outbound traffic
    Set,
    /// Single-attribute update (`.../<attribute>`)
    Attribute(String),
}

impl TopicSuffix {
    fn from_segment(segment: &str) -> Self {
        match segment {
            "state" => TopicSuffix::State,
            "set" => TopicSuffix::Set,
            other => TopicSuffix::Attribute(other.to_string()),
        }
    }
}

impl fmt::Display for TopicSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicSuffix::State => f.write_str("state"),
            TopicSuffix::Set => f.write_str("set"),
            TopicSuffix::Attribute(name) => f.write_str(name),
        }
    }
}

/// A parsed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicParts {
    /// Everything before the domain segment, without trailing `/`
    pub base_prefix: String,
    pub domain: String,
    pub entity_name: String,
    pub suffix: TopicSuffix,
}

/// Split a topic into base, domain, entity name and suffix
pub fn parse_topic(topic: &str) -> Result<TopicParts, TopicError> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 3 {
        return Err(TopicError::TooFewSegments(topic.to_string()));
    }

    let n = segments.len();
    let (domain, name, suffix) = (segments[n - 3], segments[n - 2], segments[n - 1]);
    if domain.is_empty() || name.is_empty() || suffix.is_empty() {
        return Err(TopicError::EmptySegment(topic.to_string()));
    }

    Ok(TopicParts {
        base_prefix: segments[..n - 3].join("/"),
        domain: domain.to_string(),
        entity_name: name.to_string(),
        suffix: TopicSuffix::from_segment(suffix),
    })
}

/// Command topic for an entity: `<base>/<domain>/<name>/set`
///
/// `name` is the topic segment the entity is published under, which may
/// differ from its slugified object id (`Kitchen-Lamp` vs `kitchen_lamp`).
pub fn set_topic(base: &str, domain: Domain, name: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        format!("{domain}/{name}/set")
    } else {
        format!("{base}/{domain}/{name}/set")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state_topic() {
        let parts = parse_topic("homeassistant/light/kitchen/state").unwrap();
        assert_eq!(parts.base_prefix, "homeassistant");
        assert_eq!(parts.domain, "light");
        assert_eq!(parts.entity_name, "kitchen");
        assert_eq!(parts.suffix, TopicSuffix::State);
    }

    #[test]
    fn test_parse_attribute_topic_with_nested_base() {
        let parts = parse_topic("site/a/ha/light/kitchen/brightness").unwrap();
        assert_eq!(parts.base_prefix, "site/a/ha");
        assert_eq!(parts.suffix, TopicSuffix::Attribute("brightness".to_string()));
    }

    #[test]
    fn test_parse_event_topic() {
        let parts = parse_topic("ha/event/doorbell/event_type").unwrap();
        assert_eq!(parts.domain, "event");
        assert_eq!(parts.suffix, TopicSuffix::Attribute("event_type".to_string()));
    }

    #[test]
    fn test_parse_without_base() {
        let parts = parse_topic("switch/pump/set").unwrap();
        assert_eq!(parts.base_prefix, "");
        assert_eq!(parts.suffix, TopicSuffix::Set);
    }

    #[test]
    fn test_too_few_segments() {
        assert_eq!(
            parse_topic("light/kitchen").unwrap_err(),
            TopicError::TooFewSegments("light/kitchen".to_string())
        );
        assert!(parse_topic("").is_err());
    }

    #[test]
    fn test_empty_segment() {
        assert!(matches!(
            parse_topic("ha/light//state"),
            Err(TopicError::EmptySegment(_))
        ));
    }

    #[test]
    fn test_set_topic() {
        assert_eq!(set_topic("ha/", Domain::Cover, "garage"), "ha/cover/garage/set");
        assert_eq!(set_topic("", Domain::Cover, "garage"), "cover/garage/set");
        assert_eq!(
            set_topic("homeassistant", Domain::Light, "Kitchen-Lamp"),
            "homeassistant/light/Kitchen-Lamp/set"
        );
    }
}
