//! The bridge engine
//!
//! Owns the entity store, the attribute cache, the slot store and the
//! diagnostic and acknowledgement bookkeeping, and drives every flow through
//! them: inbound messages, slot writes, remote refreshes and ack checks. It
//! is single-owner (`&mut self`); the caller serializes access.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ha_codec::{decode_attribute, decode_payload, parse_topic, set_topic, DecodedPayload, TopicSuffix};
use ha_config::{BridgeConfig, CommandTransport};
use ha_core::domains::{self, AttributeDescriptor};
use ha_core::{Entity, EntityId};
use ha_state_store::{AttributeCache, ConfigChange, EntityEntry, EntityStore};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, trace};

use crate::acks::PendingAcks;
use crate::command::{build_command, Command, CommandError};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::presentation::{self, SlotTarget};
use crate::reducers;
use crate::slots::{order_key, SlotDeclaration, SlotStore};
use crate::transport::{PublishError, Publisher, RemoteCaller, RemoteError, RemoteRequest};

const DEFAULT_BASE_TOPIC: &str = "homeassistant";

/// Why a slot write did not go out
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("no entity behind slot '{0}'")]
    UnknownSlot(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("service transport selected but no remote caller available")]
    NoRemoteCaller,
}

/// Identifier of a secondary slot: `<primary>_<attribute>`
pub fn secondary_identifier(entity_id: &EntityId, key: &str) -> String {
    format!("{}_{}", entity_id.slot_identifier(), key)
}

fn primary_declaration(entity: &Entity) -> SlotDeclaration {
    SlotDeclaration {
        identifier: entity.entity_id.slot_identifier(),
        display_name: entity.display_name.clone(),
        semantic: domains::descriptor(entity.domain()).primary,
        presentation: presentation::derive(entity, SlotTarget::Primary).to_map(),
        order_key: order_key(entity.position, None),
        writable: presentation::is_writable(entity, SlotTarget::Primary),
    }
}

fn secondary_declaration(
    entity: &Entity,
    descriptor: &'static AttributeDescriptor,
    index: usize,
) -> SlotDeclaration {
    let target = SlotTarget::Attribute(descriptor);
    SlotDeclaration {
        identifier: secondary_identifier(&entity.entity_id, descriptor.key),
        display_name: format!("{} {}", entity.display_name, descriptor.caption),
        semantic: descriptor.semantic,
        presentation: presentation::derive(entity, target).to_map(),
        order_key: order_key(entity.position, Some(index)),
        writable: presentation::is_writable(entity, target),
    }
}

/// Diagnostic kind for a rejected command
fn rejection_kind(error: &CommandError) -> DiagnosticKind {
    match error {
        CommandError::NotWritable { .. } => DiagnosticKind::NotWritable,
        CommandError::UnknownAttribute { .. } => DiagnosticKind::UnknownAttribute,
        CommandError::InvalidValue { .. } | CommandError::InvalidOption { .. } => {
            DiagnosticKind::InvalidValue
        }
    }
}

pub struct Bridge<S: SlotStore> {
    base_topic: String,
    transport: CommandTransport,
    store: EntityStore,
    cache: AttributeCache,
    slots: S,
    diagnostics: Diagnostics,
    acks: PendingAcks,
    /// Topic name segments that differ from the entity's object id
    topic_names: HashMap<EntityId, String>,
}

impl<S: SlotStore> Bridge<S> {
    /// Create an unconfigured bridge; call [`Bridge::apply_config`] next
    pub fn new(slots: S, cache: AttributeCache) -> Self {
        Self {
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            transport: CommandTransport::default(),
            store: EntityStore::new(),
            cache,
            slots,
            diagnostics: Diagnostics::default(),
            acks: PendingAcks::new(std::time::Duration::from_secs(10)),
            topic_names: HashMap::new(),
        }
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Subscription covering every topic below the base
    pub fn subscription_filter(&self) -> String {
        if self.base_topic.is_empty() {
            "#".to_string()
        } else {
            format!("{}/#", self.base_topic)
        }
    }

    pub fn transport(&self) -> CommandTransport {
        self.transport
    }

    pub fn entity(&self, entity_id: &EntityId) -> Option<&Entity> {
        self.store.get(entity_id)
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn cache(&self) -> &AttributeCache {
        &self.cache
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn acks(&self) -> &PendingAcks {
        &self.acks
    }

    pub fn has_pending_acks(&self) -> bool {
        self.acks.has_pending()
    }

    /// Replace routing and the entity set in one step
    ///
    /// Removed entities lose their slots and pending acks, every configured
    /// entity gets its primary slot (re)declared, and entities seeded from
    /// the cache are projected so their slots show the last known values.
    #[instrument(skip_all, fields(entities = config.entities.len()))]
    pub fn apply_config(&mut self, config: &BridgeConfig) -> ConfigChange {
        self.base_topic = config.base_topic.trim_matches('/').to_string();
        self.transport = config.command_transport;
        self.acks.set_timeout(config.ack_timeout());

        let entries: Vec<EntityEntry> = config
            .entities
            .iter()
            .map(|e| EntityEntry::new(e.entity_id.clone(), e.display_name()))
            .collect();
        let change = self.store.apply_config(&entries, &self.cache);

        for entity_id in &change.removed {
            self.acks.clear(entity_id);
            self.topic_names.remove(entity_id);
            self.slots.remove(&entity_id.slot_identifier());
            for descriptor in domains::descriptor(entity_id.domain()).attributes {
                self.slots
                    .remove(&secondary_identifier(entity_id, descriptor.key));
            }
        }

        let entity_ids: Vec<EntityId> = self.store.entity_ids().cloned().collect();
        for entity_id in &entity_ids {
            self.declare_slots(entity_id);

            if change.added.contains(entity_id) {
                self.project_snapshot(entity_id);
            }
        }

        info!(
            base_topic = %self.base_topic,
            added = change.added.len(),
            removed = change.removed.len(),
            "Bridge configured"
        );
        change
    }

    /// Handle one inbound `{topic, payload}` message
    ///
    /// Returns the entity the message updated. Anything malformed is
    /// recorded as a diagnostic and skipped.
    #[instrument(skip(self, payload), fields(topic = %topic))]
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Option<EntityId> {
        let parts = match parse_topic(topic) {
            Ok(parts) => parts,
            Err(e) => {
                self.diagnostics
                    .record(DiagnosticKind::MalformedTopic, topic, e.to_string());
                return None;
            }
        };
        if parts.base_prefix.trim_matches('/') != self.base_topic {
            trace!("Topic outside base, ignoring");
            return None;
        }

        let update = match &parts.suffix {
            TopicSuffix::Set => return None,
            TopicSuffix::State => decode_payload(payload),
            TopicSuffix::Attribute(name) => decode_attribute(name, payload),
        };

        let entity_id = match EntityId::from_topic_parts(&parts.domain, &parts.entity_name) {
            Ok(entity_id) => entity_id,
            Err(e) => {
                self.diagnostics
                    .record(DiagnosticKind::MalformedTopic, topic, e.to_string());
                return None;
            }
        };

        if parts.entity_name != entity_id.object_id() {
            self.topic_names
                .insert(entity_id.clone(), parts.entity_name.clone());
        }

        if update.is_empty() {
            self.diagnostics.record(
                DiagnosticKind::MalformedPayload,
                entity_id.to_string(),
                "empty payload",
            );
            return None;
        }

        self.apply_update(&entity_id, &update);
        Some(entity_id)
    }

    /// Merge, project and persist one decoded update
    fn apply_update(&mut self, entity_id: &EntityId, update: &DecodedPayload) {
        let (_, created) = self.store.ensure(entity_id, &self.cache);
        if created {
            self.declare_slots(entity_id);
            self.project_snapshot(entity_id);
        }
        let changed = self
            .store
            .merge(entity_id, &update.state, &update.attributes)
            .unwrap_or(false);

        // Presentation depends on attributes, refresh before publishing
        if changed {
            self.declare_slots(entity_id);
        }
        self.project(entity_id, update);

        if let Some(ack) = self.acks.clear(entity_id) {
            debug!(
                entity_id = %entity_id,
                service = %ack.service,
                call_id = %ack.call_id,
                "Command acknowledged"
            );
        }
        self.persist(entity_id);
    }

    /// Project a cache-seeded entity so its slots show the last known values
    fn project_snapshot(&mut self, entity_id: &EntityId) {
        let snapshot = self
            .store
            .get(entity_id)
            .filter(|e| !e.state.is_empty() || !e.attributes.is_empty())
            .map(|e| DecodedPayload {
                state: e.state.clone(),
                attributes: e.attributes.clone(),
            });
        if let Some(snapshot) = snapshot {
            trace!(entity_id = %entity_id, "Projecting cached snapshot");
            self.project(entity_id, &snapshot);
        }
    }

    /// Declare the primary slot and re-declare materialized secondaries
    fn declare_slots(&mut self, entity_id: &EntityId) {
        let Some(entity) = self.store.get(entity_id) else {
            return;
        };
        let descriptor = domains::descriptor(entity.domain());

        let mut declarations = vec![primary_declaration(entity)];
        declarations.extend(
            descriptor
                .attributes
                .iter()
                .enumerate()
                .filter(|(_, d)| entity.materialized.contains(d.key))
                .map(|(index, d)| secondary_declaration(entity, d, index)),
        );
        trace!(
            entity_id = %entity_id,
            features = ?descriptor.feature_labels(entity.supported_features()),
            slots = declarations.len(),
            "Declaring slots"
        );
        for declaration in declarations {
            self.slots.declare(declaration);
        }
    }

    /// Run the domain reducer and push its outcome into the slots
    fn project(&mut self, entity_id: &EntityId, update: &DecodedPayload) {
        let Some(entity) = self.store.get(entity_id) else {
            return;
        };
        let reduction = reducers::reduce(entity, update);
        if !reduction.attributes.is_empty() {
            self.store.merge(entity_id, "", &reduction.attributes);
        }

        if let Some(value) = reduction.primary {
            self.publish_slot(&entity_id.slot_identifier(), value);
        }

        for (key, value) in reduction.secondary {
            self.materialize(entity_id, key);
            if !value.is_null() {
                self.publish_slot(&secondary_identifier(entity_id, key), value);
            }
        }
    }

    /// Declare a secondary slot the first time its attribute is observed
    fn materialize(&mut self, entity_id: &EntityId, key: &str) {
        let descriptor = domains::descriptor(entity_id.domain());
        let (Some(attribute), Some(index)) = (descriptor.attribute(key), descriptor.attribute_index(key))
        else {
            return;
        };

        let declaration = {
            let Some(entity) = self.store.get_mut(entity_id) else {
                return;
            };
            if !entity.materialized.insert(key.to_string()) {
                return;
            }
            secondary_declaration(entity, attribute, index)
        };
        debug!(slot = %declaration.identifier, writable = declaration.writable, "Creating attribute slot");
        self.slots.declare(declaration);
    }

    fn publish_slot(&mut self, identifier: &str, value: Value) {
        if !self.slots.contains(identifier) || !self.slots.publish(identifier, value) {
            self.diagnostics.record(
                DiagnosticKind::MissingSlot,
                identifier,
                "value dropped, slot does not exist",
            );
        }
    }

    fn persist(&mut self, entity_id: &EntityId) {
        let Some(entity) = self.store.get(entity_id) else {
            return;
        };
        self.cache.record(entity);
        if let Err(e) = self.cache.save() {
            self.diagnostics
                .record(DiagnosticKind::CacheFailure, entity_id.to_string(), e.to_string());
        }
    }

    /// Resolve a slot identifier to its entity and optional attribute
    ///
    /// Primary identifiers win; otherwise the longest primary prefix
    /// followed by `_` names the entity and the rest is the attribute.
    pub fn resolve_slot(&self, identifier: &str) -> Option<(EntityId, Option<String>)> {
        if let Some(entity_id) = self.store.lookup_identifier(identifier) {
            return Some((entity_id.clone(), None));
        }

        self.store
            .entity_ids()
            .filter_map(|entity_id| {
                let primary = entity_id.slot_identifier();
                let rest = identifier.strip_prefix(primary.as_str())?.strip_prefix('_')?;
                Some((primary.len(), entity_id, rest))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, entity_id, rest)| (entity_id.clone(), Some(rest.to_string())))
    }

    /// Write a value into a slot, turning it into an outbound command
    ///
    /// The command goes out through `publisher` or, with the service
    /// transport, as a remote service call that is then tracked until the
    /// entity reports back.
    #[instrument(skip(self, value, publisher, caller), fields(slot = %identifier))]
    pub async fn write(
        &mut self,
        identifier: &str,
        value: &Value,
        publisher: &dyn Publisher,
        caller: Option<&dyn RemoteCaller>,
    ) -> Result<Command, WriteError> {
        let Some((entity_id, attribute)) = self.resolve_slot(identifier) else {
            self.diagnostics.record(
                DiagnosticKind::UnknownEntity,
                identifier,
                "write to a slot with no entity",
            );
            return Err(WriteError::UnknownSlot(identifier.to_string()));
        };

        let built = match self.store.get(&entity_id) {
            Some(entity) => build_command(entity, attribute.as_deref(), value),
            None => return Err(WriteError::UnknownSlot(identifier.to_string())),
        };
        let command = match built {
            Ok(command) => command,
            Err(e) => {
                self.diagnostics
                    .record(rejection_kind(&e), identifier, e.to_string());
                return Err(e.into());
            }
        };

        match self.transport {
            CommandTransport::Publish => {
                let name = self
                    .topic_names
                    .get(&entity_id)
                    .map(String::as_str)
                    .unwrap_or_else(|| entity_id.object_id());
                let topic = set_topic(&self.base_topic, entity_id.domain(), name);
                if let Err(e) = publisher
                    .publish(&topic, command.payload.clone().into_bytes())
                    .await
                {
                    self.diagnostics
                        .record(DiagnosticKind::RemoteFailure, topic, e.to_string());
                    return Err(e.into());
                }
                debug!(topic = %topic, payload = %command.payload, "Published command");
            }
            CommandTransport::Service => {
                let Some(caller) = caller else {
                    self.diagnostics.record(
                        DiagnosticKind::RemoteFailure,
                        entity_id.to_string(),
                        "no remote caller for service transport",
                    );
                    return Err(WriteError::NoRemoteCaller);
                };

                let call = command.to_service_call();
                let result = caller
                    .call(RemoteRequest::post(call.path(), call.body()))
                    .await
                    .and_then(|response| {
                        if response.is_success() {
                            Ok(response)
                        } else {
                            Err(RemoteError::from_response(&response))
                        }
                    });
                if let Err(e) = result {
                    self.diagnostics
                        .record(DiagnosticKind::RemoteFailure, call.service_id(), e.to_string());
                    return Err(e.into());
                }

                debug!(service = %call.service_id(), call_id = %call.call_id, "Service called");
                if let Some(superseded) =
                    self.acks
                        .issue(entity_id.clone(), call.service_id(), call.call_id, Utc::now())
                {
                    trace!(call_id = %superseded.call_id, "Superseded pending command");
                }
            }
        }
        Ok(command)
    }

    /// Fetch the current state of every entity from the remote API
    ///
    /// Failures are recorded per entity and leave known state untouched.
    /// Returns the number of entities refreshed.
    #[instrument(skip_all, fields(entities = self.store.len()))]
    pub async fn refresh_from_remote(&mut self, caller: &dyn RemoteCaller) -> usize {
        let entity_ids: Vec<EntityId> = self.store.entity_ids().cloned().collect();
        let mut refreshed = 0;

        for entity_id in entity_ids {
            let request = RemoteRequest::get(format!("/api/states/{entity_id}"));
            let response = match caller.call(request).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    let e = RemoteError::from_response(&response);
                    self.diagnostics
                        .record(DiagnosticKind::RemoteFailure, entity_id.to_string(), e.to_string());
                    continue;
                }
                Err(e) => {
                    self.diagnostics
                        .record(DiagnosticKind::RemoteFailure, entity_id.to_string(), e.to_string());
                    continue;
                }
            };

            // The state object has the same shape as a full state payload
            let update = decode_payload(response.body.to_string().as_bytes());
            if update.is_empty() {
                self.diagnostics.record(
                    DiagnosticKind::MalformedPayload,
                    entity_id.to_string(),
                    "empty state from remote",
                );
                continue;
            }
            self.apply_update(&entity_id, &update);
            refreshed += 1;
        }

        debug!(refreshed, "Refreshed entities from remote");
        refreshed
    }

    /// Report every pending acknowledgement older than the timeout
    pub fn check_acks(&mut self, now: DateTime<Utc>) -> Vec<EntityId> {
        self.acks
            .expired(now)
            .into_iter()
            .map(|(entity_id, ack)| {
                self.diagnostics.record(
                    DiagnosticKind::AckTimeout,
                    entity_id.to_string(),
                    format!(
                        "{} (call {}) not acknowledged since {}",
                        ack.service,
                        ack.call_id,
                        ack.issued_at.to_rfc3339()
                    ),
                );
                entity_id
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::MemorySlotStore;
    use ha_config::EntityConfig;
    use ha_core::Domain;
    use serde_json::json;

    fn config(ids: &[(Domain, &str)]) -> BridgeConfig {
        BridgeConfig {
            entities: ids
                .iter()
                .map(|(domain, object_id)| EntityConfig {
                    entity_id: EntityId::new(*domain, *object_id).unwrap(),
                    name: None,
                })
                .collect(),
            ..BridgeConfig::default()
        }
    }

    fn bridge(ids: &[(Domain, &str)]) -> Bridge<MemorySlotStore> {
        let mut bridge = Bridge::new(MemorySlotStore::new(), AttributeCache::in_memory());
        bridge.apply_config(&config(ids));
        bridge
    }

    #[test]
    fn test_apply_config_declares_primaries() {
        let bridge = bridge(&[(Domain::Light, "kitchen"), (Domain::Sensor, "power")]);
        assert_eq!(bridge.slots().identifiers(), vec!["light_kitchen", "sensor_power"]);
        assert_eq!(bridge.slots().get("sensor_power").unwrap().declaration.order_key, 100);
        assert_eq!(bridge.subscription_filter(), "homeassistant/#");
    }

    #[test]
    fn test_state_message_publishes_primary() {
        let mut bridge = bridge(&[(Domain::Switch, "fan")]);
        let id = bridge.handle_message("homeassistant/switch/fan/state", b"ON");
        assert_eq!(id.unwrap().to_string(), "switch.fan");
        assert_eq!(bridge.slots().value("switch_fan"), Some(&json!(true)));
    }

    #[test]
    fn test_foreign_base_and_set_topics_ignored() {
        let mut bridge = bridge(&[(Domain::Switch, "fan")]);
        assert!(bridge.handle_message("other/switch/fan/state", b"ON").is_none());
        assert!(bridge.handle_message("homeassistant/switch/fan/set", b"ON").is_none());
        assert!(bridge.slots().value("switch_fan").is_none());
        assert!(bridge.diagnostics().is_empty());
    }

    #[test]
    fn test_malformed_topic_recorded() {
        let mut bridge = bridge(&[]);
        assert!(bridge.handle_message("light", b"ON").is_none());
        assert!(bridge.handle_message("homeassistant/toaster/x/state", b"ON").is_none());
        assert_eq!(bridge.diagnostics().count(DiagnosticKind::MalformedTopic), 2);
    }

    #[test]
    fn test_unknown_entity_created_on_first_observation() {
        let mut bridge = bridge(&[(Domain::Switch, "fan")]);
        bridge.handle_message("homeassistant/sensor/Outdoor-Temp/state", b"12.5");

        let id = EntityId::new(Domain::Sensor, "outdoor_temp").unwrap();
        assert_eq!(bridge.entity(&id).unwrap().position, 1);
        assert_eq!(bridge.slots().value("sensor_outdoor_temp"), Some(&json!(12.5)));
    }

    #[test]
    fn test_light_secondary_slots_are_lazy() {
        let mut bridge = bridge(&[(Domain::Light, "kitchen")]);
        bridge.handle_message(
            "homeassistant/light/kitchen/state",
            br#"{"state": "on", "attributes": {"supported_color_modes": ["brightness"]}}"#,
        );
        assert!(!bridge.slots().contains("light_kitchen_brightness"));

        bridge.handle_message("homeassistant/light/kitchen/brightness", b"128");
        let slot = bridge.slots().get("light_kitchen_brightness").unwrap();
        assert!(slot.declaration.writable);
        assert_eq!(slot.declaration.order_key, 1);
        assert_eq!(slot.value, Some(json!(128)));
    }

    #[test]
    fn test_attribute_only_update_keeps_state() {
        let mut bridge = bridge(&[(Domain::Switch, "fan")]);
        bridge.handle_message("homeassistant/switch/fan/state", b"ON");
        bridge.handle_message("homeassistant/switch/fan/state", br#"{"power": 12}"#);

        let entity = bridge.entity(&EntityId::new(Domain::Switch, "fan").unwrap()).unwrap();
        assert_eq!(entity.state, "ON");
        assert_eq!(entity.attributes["power"], json!(12));
        assert_eq!(bridge.slots().value("switch_fan"), Some(&json!(true)));
    }

    #[test]
    fn test_resolve_slot_prefers_longest_primary() {
        let bridge = bridge(&[(Domain::Light, "kitchen"), (Domain::Light, "kitchen_lamp")]);
        let (id, attribute) = bridge.resolve_slot("light_kitchen_lamp_brightness").unwrap();
        assert_eq!(id.object_id(), "kitchen_lamp");
        assert_eq!(attribute.as_deref(), Some("brightness"));

        let (id, attribute) = bridge.resolve_slot("light_kitchen").unwrap();
        assert_eq!(id.object_id(), "kitchen");
        assert!(attribute.is_none());
        assert!(bridge.resolve_slot("switch_nothing").is_none());
    }

    #[test]
    fn test_reconfigure_drops_removed_slots() {
        let mut bridge = bridge(&[(Domain::Lock, "door"), (Domain::Switch, "fan")]);
        bridge.handle_message("homeassistant/lock/door/state", b"locked");
        assert!(bridge.slots().contains("lock_door_action"));

        let change = bridge.apply_config(&config(&[(Domain::Switch, "fan")]));
        assert_eq!(change.removed.len(), 1);
        assert!(!bridge.slots().contains("lock_door"));
        assert!(!bridge.slots().contains("lock_door_action"));
        assert_eq!(bridge.slots().get("switch_fan").unwrap().declaration.order_key, 0);
    }

    #[test]
    fn test_ack_expiry_reported() {
        let mut bridge = bridge(&[(Domain::Lock, "door")]);
        let id = EntityId::new(Domain::Lock, "door").unwrap();
        let issued = Utc::now();
        bridge.acks.issue(id.clone(), "lock.lock", "01J", issued);

        assert!(bridge.check_acks(issued).is_empty());
        let expired = bridge.check_acks(issued + chrono::Duration::seconds(11));
        assert_eq!(expired, vec![id]);
        assert_eq!(bridge.diagnostics().count(DiagnosticKind::AckTimeout), 1);
        assert!(!bridge.has_pending_acks());
    }
}
