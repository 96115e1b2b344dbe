//! Canonical entity model

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{value, Domain, EntityId};

/// Attribute map attached to an entity
pub type Attributes = HashMap<String, serde_json::Value>;

/// One bridged entity and everything known about it
///
/// `attributes` only ever grows: [`Entity::merge`] overwrites the keys
/// present in an update and leaves every other key untouched, so a partial
/// update can never erase previously known values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: EntityId,

    pub display_name: String,

    /// Last raw state string received (may be empty for attribute-only entities)
    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub attributes: Attributes,

    /// Stable ordering key assigned when configuration is applied
    pub position: usize,

    /// Secondary attribute keys whose slot has already been declared
    #[serde(skip)]
    pub materialized: BTreeSet<String>,

    pub last_updated: DateTime<Utc>,
}

impl Entity {
    pub fn new(entity_id: EntityId, display_name: impl Into<String>, position: usize) -> Self {
        Self {
            entity_id,
            display_name: display_name.into(),
            state: String::new(),
            attributes: Attributes::new(),
            position,
            materialized: BTreeSet::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn domain(&self) -> Domain {
        self.entity_id.domain()
    }

    /// Shallow, additive merge of an update into the entity
    ///
    /// An empty `state` leaves the stored state alone. Returns `true` when
    /// anything actually changed.
    pub fn merge(&mut self, state: &str, attributes: &Attributes) -> bool {
        let mut changed = false;
        if !state.is_empty() && self.state != state {
            self.state = state.to_string();
            changed = true;
        }
        for (key, value) in attributes {
            if self.attributes.get(key) != Some(value) {
                self.attributes.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        self.last_updated = Utc::now();
        changed
    }

    /// Get an attribute deserialized into `T`
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn attr_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(value::as_f64)
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(value::as_bool)
    }

    pub fn attr_text(&self, key: &str) -> Option<String> {
        self.attributes
            .get(key)
            .map(value::as_text)
            .filter(|s| !s.is_empty())
    }

    pub fn attr_list(&self, key: &str) -> Vec<String> {
        self.attributes
            .get(key)
            .map(value::as_str_list)
            .unwrap_or_default()
    }

    /// The `supported_features` bitmask, 0 when absent or malformed
    pub fn supported_features(&self) -> u32 {
        self.attr_f64("supported_features")
            .filter(|v| *v >= 0.0)
            .map(|v| v as u32)
            .unwrap_or(0)
    }

    pub fn has_feature(&self, bit: u32) -> bool {
        crate::features::has(self.supported_features(), bit)
    }

    pub fn supported_color_modes(&self) -> Vec<String> {
        self.attr_list("supported_color_modes")
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and slot bookkeeping are not compared
        self.entity_id == other.entity_id
            && self.display_name == other.display_name
            && self.state == other.state
            && self.attributes == other.attributes
            && self.position == other.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn light() -> Entity {
        Entity::new(EntityId::new(Domain::Light, "desk").unwrap(), "Desk", 0)
    }

    #[test]
    fn test_merge_is_shallow_and_additive() {
        let mut entity = light();
        entity.merge(
            "on",
            &Attributes::from([
                ("brightness".to_string(), json!(10)),
                ("color_mode".to_string(), json!("hs")),
            ]),
        );
        entity.merge("", &Attributes::from([("color_temp".to_string(), json!(300))]));

        assert_eq!(entity.state, "on");
        assert_eq!(entity.attributes["brightness"], json!(10));
        assert_eq!(entity.attributes["color_mode"], json!("hs"));
        assert_eq!(entity.attributes["color_temp"], json!(300));
    }

    #[test]
    fn test_merge_overwrites_present_keys() {
        let mut entity = light();
        entity.merge("on", &Attributes::from([("brightness".to_string(), json!(10))]));
        let changed =
            entity.merge("off", &Attributes::from([("brightness".to_string(), json!(99))]));
        assert!(changed);
        assert_eq!(entity.state, "off");
        assert_eq!(entity.attributes["brightness"], json!(99));
    }

    #[test]
    fn test_merge_reports_no_change() {
        let mut entity = light();
        entity.merge("on", &Attributes::new());
        assert!(!entity.merge("on", &Attributes::new()));
    }

    #[test]
    fn test_supported_features() {
        let mut entity = light();
        assert_eq!(entity.supported_features(), 0);
        entity.merge("", &Attributes::from([("supported_features".to_string(), json!(44))]));
        assert_eq!(entity.supported_features(), 44);
        assert!(entity.has_feature(crate::features::light::EFFECT));
        assert!(!entity.has_feature(crate::features::light::SUPPORT_COLOR));
    }

    #[test]
    fn test_attribute_accessors() {
        let mut entity = light();
        entity.merge(
            "",
            &Attributes::from([
                ("min_mireds".to_string(), json!("153")),
                ("supported_color_modes".to_string(), json!(["hs", "color_temp"])),
            ]),
        );
        assert_eq!(entity.attr_f64("min_mireds"), Some(153.0));
        assert_eq!(entity.attribute::<String>("min_mireds"), Some("153".to_string()));
        assert_eq!(entity.supported_color_modes(), vec!["hs", "color_temp"]);
        assert_eq!(entity.attr_text("missing"), None);
    }
}
