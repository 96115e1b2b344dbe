//! The closed set of entity domains the bridge translates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown domain '{0}'")]
pub struct UnknownDomain(pub String);

/// Category of an entity
///
/// Every domain has its own reducer, presentation rules and command
/// vocabulary, so this is an enum rather than a free-form string: adding a
/// domain is a compile-time exercise over every `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    BinarySensor,
    Button,
    Climate,
    Cover,
    Event,
    Fan,
    Humidifier,
    Light,
    Lock,
    MediaPlayer,
    Number,
    Select,
    Sensor,
    Switch,
    Vacuum,
}

impl Domain {
    pub const ALL: [Domain; 15] = [
        Domain::BinarySensor,
        Domain::Button,
        Domain::Climate,
        Domain::Cover,
        Domain::Event,
        Domain::Fan,
        Domain::Humidifier,
        Domain::Light,
        Domain::Lock,
        Domain::MediaPlayer,
        Domain::Number,
        Domain::Select,
        Domain::Sensor,
        Domain::Switch,
        Domain::Vacuum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::BinarySensor => "binary_sensor",
            Domain::Button => "button",
            Domain::Climate => "climate",
            Domain::Cover => "cover",
            Domain::Event => "event",
            Domain::Fan => "fan",
            Domain::Humidifier => "humidifier",
            Domain::Light => "light",
            Domain::Lock => "lock",
            Domain::MediaPlayer => "media_player",
            Domain::Number => "number",
            Domain::Select => "select",
            Domain::Sensor => "sensor",
            Domain::Switch => "switch",
            Domain::Vacuum => "vacuum",
        }
    }

    /// Domains that only report state and never accept writes
    pub fn is_readonly(&self) -> bool {
        matches!(self, Domain::Sensor | Domain::BinarySensor | Domain::Event)
    }

    /// Domains whose primary value is an ON/OFF boolean
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Domain::Switch
                | Domain::Light
                | Domain::BinarySensor
                | Domain::Fan
                | Domain::Humidifier
        )
    }
}

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDomain(s.to_string()))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
    }

    #[test]
    fn test_unknown_domain() {
        assert_eq!(
            "weather".parse::<Domain>().unwrap_err(),
            UnknownDomain("weather".to_string())
        );
    }

    #[test]
    fn test_readonly_domains() {
        assert!(Domain::Sensor.is_readonly());
        assert!(Domain::BinarySensor.is_readonly());
        assert!(Domain::Event.is_readonly());
        assert!(!Domain::Light.is_readonly());
        assert!(!Domain::Lock.is_readonly());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Domain::MediaPlayer).unwrap();
        assert_eq!(json, "\"media_player\"");
    }
}
