//! Entity storage for the bridge
//!
//! This crate provides the EntityStore, the single owned map of every
//! bridged entity, and the AttributeCache that persists their last known
//! attributes across restarts.

mod cache;

pub use cache::{
    AttributeCache, CacheError, CacheResult, CachedEntity, CACHE_KEY, CACHE_MINOR_VERSION,
    CACHE_VERSION,
};

use std::collections::HashMap;

use ha_core::{Attributes, Entity, EntityId};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

/// One configured entity, in configuration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityEntry {
    pub entity_id: EntityId,
    pub display_name: String,
}

impl EntityEntry {
    pub fn new(entity_id: EntityId, display_name: impl Into<String>) -> Self {
        Self {
            entity_id,
            display_name: display_name.into(),
        }
    }
}

/// What changed when configuration was applied
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    pub retained: Vec<EntityId>,
}

/// The entity store tracks every bridged entity
///
/// The EntityStore is responsible for:
/// - Keeping entities ordered by their configured position
/// - Merging partial updates additively into known attributes
/// - Resolving slot identifiers back to entities
/// - Seeding newly configured entities from the attribute cache
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: IndexMap<EntityId, Entity>,
    /// Primary slot identifier to entity_id
    identifiers: HashMap<String, EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the live entity set from configuration
    ///
    /// Entities no longer listed are dropped, retained entities keep their
    /// attributes and take the new name and position, new entities are seeded
    /// from `cache` when it holds a snapshot for them.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub fn apply_config(&mut self, entries: &[EntityEntry], cache: &AttributeCache) -> ConfigChange {
        let mut previous = std::mem::take(&mut self.entities);
        let mut change = ConfigChange::default();

        for (position, entry) in entries.iter().enumerate() {
            let entity = match previous.shift_remove(&entry.entity_id) {
                Some(mut existing) => {
                    existing.display_name = entry.display_name.clone();
                    existing.position = position;
                    change.retained.push(entry.entity_id.clone());
                    existing
                }
                None => {
                    let mut entity =
                        Entity::new(entry.entity_id.clone(), &entry.display_name, position);
                    seed(&mut entity, cache);
                    change.added.push(entry.entity_id.clone());
                    entity
                }
            };
            self.entities.insert(entry.entity_id.clone(), entity);
        }

        change.removed = previous.into_keys().collect();
        self.rebuild_identifiers();

        debug!(
            added = change.added.len(),
            removed = change.removed.len(),
            retained = change.retained.len(),
            "Applied entity configuration"
        );
        change
    }

    /// Get the entity, creating it on first observation
    ///
    /// Entities discovered this way are placed after every known entity and
    /// seeded from `cache` like configured ones. Returns `true` as the second
    /// value when the entity was created.
    #[instrument(skip(self, cache), fields(entity_id = %entity_id))]
    pub fn ensure(&mut self, entity_id: &EntityId, cache: &AttributeCache) -> (&mut Entity, bool) {
        let created = !self.entities.contains_key(entity_id);
        let position = self.next_position();
        if created {
            debug!(position, "Creating entity from first observation");
            self.identifiers
                .insert(entity_id.slot_identifier(), entity_id.clone());
        }

        let entity = self.entities.entry(entity_id.clone()).or_insert_with(|| {
            let mut entity = Entity::new(entity_id.clone(), entity_id.object_id(), position);
            seed(&mut entity, cache);
            entity
        });
        (entity, created)
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&Entity> {
        self.entities.get(entity_id)
    }

    pub fn get_mut(&mut self, entity_id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(entity_id)
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.entities.contains_key(entity_id)
    }

    /// Resolve a primary slot identifier (e.g. `light_kitchen`) to its entity
    pub fn lookup_identifier(&self, identifier: &str) -> Option<&EntityId> {
        self.identifiers.get(identifier)
    }

    /// Merge an update into an entity
    ///
    /// Returns `None` for unknown entities, otherwise whether anything changed.
    #[instrument(skip(self, attributes), fields(entity_id = %entity_id))]
    pub fn merge(
        &mut self,
        entity_id: &EntityId,
        state: &str,
        attributes: &Attributes,
    ) -> Option<bool> {
        let entity = self.entities.get_mut(entity_id)?;
        let changed = entity.merge(state, attributes);
        trace!(changed, state = %entity.state, "Merged entity update");
        Some(changed)
    }

    #[instrument(skip(self), fields(entity_id = %entity_id))]
    pub fn remove(&mut self, entity_id: &EntityId) -> Option<Entity> {
        let removed = self.entities.shift_remove(entity_id)?;
        self.identifiers.remove(&entity_id.slot_identifier());
        trace!("Removed entity");
        Some(removed)
    }

    /// Entities in position order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn next_position(&self) -> usize {
        self.entities
            .values()
            .map(|e| e.position + 1)
            .max()
            .unwrap_or(0)
    }

    fn rebuild_identifiers(&mut self) {
        self.identifiers = self
            .entities
            .keys()
            .map(|id| (id.slot_identifier(), id.clone()))
            .collect();
    }
}

/// Copy the last known snapshot of a new entity out of the cache
fn seed(entity: &mut Entity, cache: &AttributeCache) {
    if let Some(cached) = cache.get(&entity.entity_id) {
        trace!(entity_id = %entity.entity_id, "Seeding entity from cache");
        entity.state = cached.state.clone();
        entity.attributes = cached.attributes.clone();
        entity.last_updated = cached.last_updated;
    }
}
