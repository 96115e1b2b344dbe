//! Host slot store port
//!
//! The host application owns named, typed slots. The engine declares a slot
//! (or re-declares it to refresh its presentation) and publishes values into
//! it; it never reads values back.

use chrono::{DateTime, Utc};
use ha_core::domains::SemanticType;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Everything the host needs to create or refresh one slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDeclaration {
    pub identifier: String,
    pub display_name: String,
    pub semantic: SemanticType,
    /// Rendering hints, null-valued keys already dropped
    pub presentation: Map<String, Value>,
    /// Layout position: `entity position * 100 + attribute index + 1`
    pub order_key: u64,
    pub writable: bool,
}

/// Order key of a slot within the host's layout
///
/// Primary slots use `attribute_index == None`.
pub fn order_key(position: usize, attribute_index: Option<usize>) -> u64 {
    let offset = attribute_index.map(|i| i as u64 + 1).unwrap_or(0);
    position as u64 * 100 + offset
}

/// Slot store provided by the host
pub trait SlotStore: Send {
    /// Create the slot, or refresh an existing one in place
    fn declare(&mut self, declaration: SlotDeclaration);

    /// Set a slot's value; `false` when no such slot exists
    fn publish(&mut self, identifier: &str, value: Value) -> bool;

    fn contains(&self, identifier: &str) -> bool;

    /// Drop a slot; `false` when no such slot exists
    fn remove(&mut self, identifier: &str) -> bool;
}

/// One slot held by [`MemorySlotStore`]
#[derive(Debug, Clone)]
pub struct Slot {
    pub declaration: SlotDeclaration,
    pub value: Option<Value>,
    pub updated: Option<DateTime<Utc>>,
}

/// In-process slot store, used by the binary and in tests
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: IndexMap<String, Slot>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&Slot> {
        self.slots.get(identifier)
    }

    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.slots.get(identifier).and_then(|s| s.value.as_ref())
    }

    /// Slots in layout order
    pub fn slots(&self) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self.slots.values().collect();
        slots.sort_by_key(|s| s.declaration.order_key);
        slots
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.slots().into_iter().map(|s| s.declaration.identifier.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SlotStore for MemorySlotStore {
    fn declare(&mut self, declaration: SlotDeclaration) {
        match self.slots.get_mut(&declaration.identifier) {
            Some(slot) => {
                trace!(slot = %declaration.identifier, "Refreshing slot");
                slot.declaration = declaration;
            }
            None => {
                debug!(
                    slot = %declaration.identifier,
                    semantic = ?declaration.semantic,
                    writable = declaration.writable,
                    "Declaring slot"
                );
                self.slots.insert(
                    declaration.identifier.clone(),
                    Slot {
                        declaration,
                        value: None,
                        updated: None,
                    },
                );
            }
        }
    }

    fn publish(&mut self, identifier: &str, value: Value) -> bool {
        let Some(slot) = self.slots.get_mut(identifier) else {
            return false;
        };
        trace!(slot = %identifier, value = %value, "Publishing slot value");
        slot.value = Some(value);
        slot.updated = Some(Utc::now());
        true
    }

    fn contains(&self, identifier: &str) -> bool {
        self.slots.contains_key(identifier)
    }

    fn remove(&mut self, identifier: &str) -> bool {
        self.slots.shift_remove(identifier).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::Presentation;
    use serde_json::json;

    fn declaration(identifier: &str, order_key: u64) -> SlotDeclaration {
        SlotDeclaration {
            identifier: identifier.to_string(),
            display_name: identifier.to_string(),
            semantic: SemanticType::Number,
            presentation: Presentation::value(None).to_map(),
            order_key,
            writable: false,
        }
    }

    #[test]
    fn test_order_key() {
        assert_eq!(order_key(0, None), 0);
        assert_eq!(order_key(2, None), 200);
        assert_eq!(order_key(2, Some(0)), 201);
        assert_eq!(order_key(3, Some(11)), 312);
    }

    #[test]
    fn test_publish_requires_declaration() {
        let mut store = MemorySlotStore::new();
        assert!(!store.publish("sensor_power", json!(1.0)));

        store.declare(declaration("sensor_power", 0));
        assert!(store.publish("sensor_power", json!(1.5)));
        assert_eq!(store.value("sensor_power"), Some(&json!(1.5)));
        assert!(store.get("sensor_power").unwrap().updated.is_some());
    }

    #[test]
    fn test_redeclare_keeps_value() {
        let mut store = MemorySlotStore::new();
        store.declare(declaration("number_level", 0));
        store.publish("number_level", json!(4.0));

        let mut refreshed = declaration("number_level", 0);
        refreshed.writable = true;
        store.declare(refreshed);

        assert_eq!(store.len(), 1);
        assert!(store.get("number_level").unwrap().declaration.writable);
        assert_eq!(store.value("number_level"), Some(&json!(4.0)));
    }

    #[test]
    fn test_layout_order() {
        let mut store = MemorySlotStore::new();
        store.declare(declaration("light_b", 100));
        store.declare(declaration("light_a_brightness", 1));
        store.declare(declaration("light_a", 0));

        assert_eq!(
            store.identifiers(),
            vec!["light_a", "light_a_brightness", "light_b"]
        );
        assert!(store.remove("light_b"));
        assert!(!store.contains("light_b"));
    }
}
