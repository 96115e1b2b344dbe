//! Domain state reducers
//!
//! Each reducer looks at one decoded update (already merged into the entity)
//! and decides what the slots should show: the primary value, which
//! secondary attribute slots to refresh, and any derived attributes to store.
//! Reducers never fail. Anything unparseable is skipped so that known state
//! never regresses.

use ha_codec::DecodedPayload;
use ha_core::domains::{self, LOCK_STATES, REPEAT_MODES};
use ha_core::features;
use ha_core::{value, Attributes, Domain, Entity, STATE_UNAVAILABLE, STATE_UNKNOWN};
use serde_json::Value;

/// Position attribute names, in priority order
const POSITION_NAMES: &[&str] = &["current_position", "current_cover_position"];
const TILT_NAMES: &[&str] = &["current_tilt_position", "current_cover_tilt_position"];

/// Outcome of reducing one update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reduction {
    /// New primary value, `None` leaves the slot untouched
    pub primary: Option<Value>,
    /// Secondary slots to refresh, in descriptor order; `Null` declares
    /// the slot without publishing a value
    pub secondary: Vec<(&'static str, Value)>,
    /// Derived attributes to merge back into the entity
    pub attributes: Attributes,
}

impl Reduction {
    fn primary(value: impl Into<Value>) -> Self {
        Self {
            primary: Some(value.into()),
            ..Self::default()
        }
    }

    fn with_primary(mut self, value: Option<Value>) -> Self {
        self.primary = value;
        self
    }

    fn push(&mut self, key: &'static str, value: Value) {
        self.secondary.push((key, value));
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_empty() && self.attributes.is_empty()
    }
}

/// Dispatch an update to the reducer of the entity's domain
pub fn reduce(entity: &Entity, update: &DecodedPayload) -> Reduction {
    match entity.domain() {
        Domain::Switch | Domain::BinarySensor => Reduction::default().with_primary(binary(update)),
        Domain::Light => light(entity, update),
        Domain::Fan | Domain::Humidifier => gated(entity, update).with_primary(binary(update)),
        Domain::Sensor | Domain::Number => Reduction::default().with_primary(numeric(update)),
        Domain::Climate => climate(entity, update),
        Domain::Cover => cover(entity, update),
        Domain::Lock => lock(update),
        Domain::Vacuum => vacuum(entity, update),
        Domain::MediaPlayer => media_player(entity, update),
        Domain::Event => event(update),
        Domain::Select | Domain::Button => Reduction::default().with_primary(text(update)),
    }
}

/// State string, unless empty or a placeholder
fn reported_state(update: &DecodedPayload) -> Option<&str> {
    let state = update.state.trim();
    if state.is_empty() || state == STATE_UNAVAILABLE || state == STATE_UNKNOWN {
        None
    } else {
        Some(state)
    }
}

/// `on` (any case) is true, any other reported state false
pub fn is_on(state: &str) -> bool {
    state.eq_ignore_ascii_case("on")
}

fn binary(update: &DecodedPayload) -> Option<Value> {
    reported_state(update).map(|s| Value::Bool(is_on(s)))
}

fn numeric(update: &DecodedPayload) -> Option<Value> {
    reported_state(update)
        .and_then(value::parse_f64)
        .map(Value::from)
}

fn text(update: &DecodedPayload) -> Option<Value> {
    reported_state(update).map(|s| Value::String(s.to_string()))
}

/// Descriptor attributes present in the update, in descriptor order
fn observed(entity: &Entity, update: &DecodedPayload) -> Vec<(&'static str, Value)> {
    domains::descriptor(entity.domain())
        .attributes
        .iter()
        .filter_map(|d| update.attributes.get(d.key).map(|v| (d.key, v.clone())))
        .collect()
}

/// Secondary slots only for attributes whose capability requirements hold
fn gated(entity: &Entity, update: &DecodedPayload) -> Reduction {
    let descriptor = domains::descriptor(entity.domain());
    Reduction {
        secondary: observed(entity, update)
            .into_iter()
            .filter(|(key, _)| {
                descriptor
                    .attribute(key)
                    .is_some_and(|d| d.requirements_met(entity))
            })
            .collect(),
        ..Reduction::default()
    }
}

/// Every light attribute gets a slot on first sight; unmet requirements
/// only make it read-only
fn light(entity: &Entity, update: &DecodedPayload) -> Reduction {
    Reduction {
        primary: binary(update),
        secondary: observed(entity, update),
        ..Reduction::default()
    }
}

fn climate(entity: &Entity, update: &DecodedPayload) -> Reduction {
    let mut reduction = Reduction {
        secondary: observed(entity, update),
        ..Reduction::default()
    };

    let target = update.attributes.get("temperature").and_then(value::as_f64);
    let current = update
        .attributes
        .get("current_temperature")
        .and_then(value::as_f64);

    reduction.primary = if entity.has_feature(features::climate::TARGET_TEMPERATURE) && target.is_some() {
        target
    } else {
        current.or(target)
    }
    .map(Value::from);

    if let Some(state) = reported_state(update) {
        match value::parse_f64(state) {
            Some(number) => {
                if reduction.primary.is_none() {
                    reduction.primary = Some(Value::from(number));
                }
            }
            None => {
                // The climate state is its HVAC mode
                let mode = Value::String(state.to_string());
                reduction.attributes.insert("hvac_mode".to_string(), mode.clone());
                reduction.secondary.retain(|(key, _)| *key != "hvac_mode");
                reduction.secondary.insert(0, ("hvac_mode", mode));
            }
        }
    }
    reduction
}

/// First numeric attribute among `names`, clamped to 0-100
fn percent_attribute(update: &DecodedPayload, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .find_map(|name| update.attributes.get(*name).and_then(value::as_f64))
        .map(|v| v.clamp(0.0, 100.0))
}

/// Position 0-100 from the position attributes, else from open/closed state
pub fn cover_position(update: &DecodedPayload) -> Option<f64> {
    if let Some(position) = percent_attribute(update, POSITION_NAMES) {
        return Some(position);
    }

    match reported_state(update)?.to_ascii_lowercase().as_str() {
        "open" | "opened" => Some(100.0),
        "closed" => Some(0.0),
        _ => None,
    }
}

fn cover(entity: &Entity, update: &DecodedPayload) -> Reduction {
    let mut reduction = Reduction::default().with_primary(cover_position(update).map(Value::from));

    if entity.has_feature(features::cover::SET_POSITION) {
        if let Some(position) = percent_attribute(update, POSITION_NAMES) {
            reduction.push("current_position", Value::from(position));
        }
    }
    if entity.has_feature(features::cover::SET_TILT_POSITION) {
        if let Some(tilt) = percent_attribute(update, TILT_NAMES) {
            reduction.push("current_tilt_position", Value::from(tilt));
        }
    }
    reduction
}

/// Resolve the display state of a lock
///
/// An exact match of the lowercased state against the lock vocabulary wins;
/// otherwise the first true `is_*` flag, in vocabulary order.
pub fn resolve_lock_state(state: &str, attributes: &Attributes) -> Option<&'static str> {
    let lowered = state.trim().to_ascii_lowercase();
    if let Some((name, _)) = LOCK_STATES.iter().find(|(name, _)| *name == lowered) {
        return Some(*name);
    }

    LOCK_STATES
        .iter()
        .find(|(_, flag)| {
            attributes
                .get(*flag)
                .and_then(value::as_bool)
                .unwrap_or(false)
        })
        .map(|(name, _)| *name)
}

/// Action shown for a resolved lock state
fn lock_action(state: &str) -> Option<&'static str> {
    match state {
        "locked" | "locking" => Some("lock"),
        "unlocked" | "unlocking" => Some("unlock"),
        "open" | "opening" => Some("open"),
        _ => None,
    }
}

fn lock(update: &DecodedPayload) -> Reduction {
    let Some(state) = resolve_lock_state(&update.state, &update.attributes) else {
        return Reduction::default();
    };

    let mut reduction = Reduction::primary(state);
    reduction.push(
        "action",
        lock_action(state).map(Value::from).unwrap_or(Value::Null),
    );
    reduction
}

/// Vacuum activity as the action that would lead to it
fn vacuum_action(state: &str) -> Option<&'static str> {
    match state {
        "cleaning" => Some("start"),
        "paused" => Some("pause"),
        "returning" => Some("return_home"),
        "docked" | "idle" => Some("stop"),
        _ => None,
    }
}

fn vacuum(entity: &Entity, update: &DecodedPayload) -> Reduction {
    let state = reported_state(update);
    let mut reduction = Reduction::default().with_primary(state.map(Value::from));

    if let Some(speed) = update.attributes.get("fan_speed") {
        if !entity.attr_list("fan_speed_list").is_empty() {
            reduction.push("fan_speed", speed.clone());
        }
    }
    if let Some(battery) = update.attributes.get("battery_level").and_then(value::as_f64) {
        reduction.push("battery_level", Value::from(battery));
    }
    if let Some(state) = state {
        if !crate::presentation::vacuum_actions(entity).is_empty() {
            reduction.push(
                "action",
                vacuum_action(state).map(Value::from).unwrap_or(Value::Null),
            );
        }
    }
    reduction
}

/// Media player power: `off` and `standby` are off, anything else on
pub fn media_powered(state: &str) -> bool {
    !(state.eq_ignore_ascii_case("off") || state.eq_ignore_ascii_case("standby"))
}

/// Repeat mode name to its integer encoding
pub fn repeat_index(mode: &str) -> Option<usize> {
    REPEAT_MODES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(mode.trim()))
}

fn media_player(entity: &Entity, update: &DecodedPayload) -> Reduction {
    let mut reduction = gated(entity, update).with_primary(text(update));

    for (key, slot) in reduction.secondary.iter_mut() {
        if *key == "repeat" {
            *slot = repeat_index(&value::as_text(slot))
                .map(Value::from)
                .unwrap_or(Value::Null);
        }
    }

    let power = domains::attribute(Domain::MediaPlayer, "power");
    if let (Some(state), Some(power)) = (reported_state(update), power) {
        if power.requirements_met(entity) {
            reduction
                .secondary
                .insert(0, ("power", Value::Bool(media_powered(state))));
        }
    }
    reduction
}

fn event(update: &DecodedPayload) -> Reduction {
    // event_types only feeds the presentation
    Reduction::default().with_primary(
        update
            .attributes
            .get("event_type")
            .map(value::as_text)
            .filter(|t| !t.is_empty())
            .map(Value::String),
    )
}
