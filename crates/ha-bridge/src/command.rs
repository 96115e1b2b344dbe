//! Outbound command builder
//!
//! Turns a slot write into a [`Command`]: the service name and data for the
//! remote-call path, and the payload for the publish path. Capabilities are
//! re-checked here on every write; a rejected write never reaches a
//! transport.

use std::sync::OnceLock;

use ha_core::domains::{self, color_arity, AttributeDescriptor, Options, SemanticType, REPEAT_MODES};
use ha_core::features::{cover, lock};
use ha_core::{value, Domain, Entity, EntityId, ServiceCall};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::presentation;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("{} is not writable", target(.entity_id, .attribute))]
    NotWritable {
        entity_id: EntityId,
        attribute: Option<String>,
    },

    #[error("{entity_id} has no attribute '{attribute}'")]
    UnknownAttribute {
        entity_id: EntityId,
        attribute: String,
    },

    #[error("invalid value for {entity_id}: {reason}")]
    InvalidValue { entity_id: EntityId, reason: String },

    #[error("'{value}' is not an option of {entity_id}")]
    InvalidOption { entity_id: EntityId, value: String },
}

fn target(entity_id: &EntityId, attribute: &Option<String>) -> String {
    match attribute {
        Some(attribute) => format!("{entity_id}.{attribute}"),
        None => entity_id.to_string(),
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// A validated command for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub entity_id: EntityId,
    /// Service name without the domain, e.g. `set_cover_position`
    pub service: String,
    /// Service data, without the target entity
    pub data: Map<String, Value>,
    /// Body for the publish path
    pub payload: String,
}

impl Command {
    fn new(entity: &Entity, service: &str, payload: impl Into<String>) -> Self {
        Self {
            entity_id: entity.entity_id.clone(),
            service: service.to_string(),
            data: Map::new(),
            payload: payload.into(),
        }
    }

    /// Command whose payload is the JSON form of its data
    fn with_data(entity: &Entity, service: &str, data: Map<String, Value>) -> Self {
        let payload = Value::Object(data.clone()).to_string();
        Self {
            data,
            ..Self::new(entity, service, payload)
        }
    }

    fn set(entity: &Entity, service: &str, key: &str, value: Value) -> Self {
        let mut data = Map::new();
        data.insert(key.to_string(), value);
        Self::with_data(entity, service, data)
    }

    fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// `domain.service`
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.entity_id.domain(), self.service)
    }

    pub fn to_service_call(&self) -> ServiceCall {
        let mut call = ServiceCall::new(self.entity_id.clone(), &self.service);
        call.service_data = self.data.clone();
        call
    }
}

/// Build the command for a write to an entity's primary slot
/// (`attribute == None`) or to one of its secondary slots
pub fn build_command(
    entity: &Entity,
    attribute: Option<&str>,
    value: &Value,
) -> CommandResult<Command> {
    if entity.domain().is_readonly() {
        return Err(not_writable(entity, attribute));
    }
    match attribute {
        None => build_primary(entity, value),
        Some(key) => build_attribute(entity, key, value),
    }
}

fn not_writable(entity: &Entity, attribute: Option<&str>) -> CommandError {
    CommandError::NotWritable {
        entity_id: entity.entity_id.clone(),
        attribute: attribute.map(str::to_string),
    }
}

fn invalid(entity: &Entity, reason: impl Into<String>) -> CommandError {
    CommandError::InvalidValue {
        entity_id: entity.entity_id.clone(),
        reason: reason.into(),
    }
}

fn invalid_option(entity: &Entity, value: impl Into<String>) -> CommandError {
    CommandError::InvalidOption {
        entity_id: entity.entity_id.clone(),
        value: value.into(),
    }
}

fn number(entity: &Entity, value: &Value) -> CommandResult<f64> {
    value::as_f64(value).ok_or_else(|| invalid(entity, format!("expected a number, got {value}")))
}

fn switch(entity: &Entity, value: &Value) -> CommandResult<bool> {
    value::as_bool(value).ok_or_else(|| invalid(entity, format!("expected on/off, got {value}")))
}

/// Lowercased, trimmed text form of a value
fn word(value: &Value) -> String {
    value::as_text(value).trim().to_ascii_lowercase()
}

/// Whole numbers as integers, everything else as floats
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Case-insensitive pick from a list of options, returning the canonical spelling
fn pick<'a>(options: impl IntoIterator<Item = &'a str>, wanted: &str) -> Option<&'a str> {
    options
        .into_iter()
        .find(|o| o.eq_ignore_ascii_case(wanted.trim()))
}

fn build_primary(entity: &Entity, value: &Value) -> CommandResult<Command> {
    if !domains::descriptor(entity.domain()).primary_writable {
        return Err(not_writable(entity, None));
    }

    match entity.domain() {
        Domain::Switch | Domain::Light | Domain::Fan | Domain::Humidifier => {
            Ok(power(entity, switch(entity, value)?))
        }
        Domain::Cover => cover_primary(entity, value),
        Domain::Lock => {
            let action = lock_word(value).ok_or_else(|| invalid(entity, format!("unknown lock command {value}")))?;
            lock_command(entity, action, None)
        }
        Domain::Select => {
            let wanted = value::as_text(value);
            let options = entity.attr_list("options");
            let option = pick(options.iter().map(String::as_str), &wanted)
                .ok_or_else(|| invalid_option(entity, wanted.trim()))?;
            Ok(Command::new(entity, "select_option", option).param("option", option))
        }
        Domain::Vacuum => vacuum_primary(entity, value),
        Domain::Number => {
            let n = number(entity, value)?;
            Ok(Command::new(entity, "set_value", number_value(n).to_string()).param("value", number_value(n)))
        }
        Domain::Button => Ok(Command::new(entity, "press", "PRESS")),
        Domain::Climate => climate_primary(entity, value),
        Domain::Sensor | Domain::BinarySensor | Domain::Event | Domain::MediaPlayer => {
            Err(not_writable(entity, None))
        }
    }
}

fn power(entity: &Entity, on: bool) -> Command {
    if on {
        Command::new(entity, "turn_on", "ON")
    } else {
        Command::new(entity, "turn_off", "OFF")
    }
}

/// Cover motion word for text and boolean writes
fn cover_word(value: &Value) -> Option<&'static str> {
    match value {
        Value::Bool(true) => Some("open"),
        Value::Bool(false) => Some("close"),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "open" | "opened" | "up" | "true" | "on" => Some("open"),
            "close" | "closed" | "down" | "false" | "off" => Some("close"),
            "stop" | "stopped" => Some("stop"),
            _ => None,
        },
        _ => None,
    }
}

fn cover_motion(entity: &Entity, motion: &str) -> Command {
    match motion {
        "open" => Command::new(entity, "open_cover", "OPEN"),
        "close" => Command::new(entity, "close_cover", "CLOSE"),
        _ => Command::new(entity, "stop_cover", "STOP"),
    }
}

fn cover_primary(entity: &Entity, value: &Value) -> CommandResult<Command> {
    if let Some(motion) = cover_word(value) {
        return Ok(cover_motion(entity, motion));
    }

    let position = number(entity, value)?.clamp(0.0, 100.0);
    if entity.has_feature(cover::SET_POSITION) {
        return Ok(cover_position(entity, "set_cover_position", "position", position));
    }
    if position == 0.0 {
        Ok(cover_motion(entity, "close"))
    } else if position == 100.0 {
        Ok(cover_motion(entity, "open"))
    } else {
        Err(invalid(entity, "cover does not support positioning"))
    }
}

fn cover_position(entity: &Entity, service: &str, key: &str, position: f64) -> Command {
    let position = number_value(position.round());
    Command::new(entity, service, position.to_string()).param(key, position)
}

/// Lock action for a write; booleans, `1`/`0` and `true`/`false` mean lock/unlock
fn lock_word(value: &Value) -> Option<&'static str> {
    match word(value).as_str() {
        "lock" | "locked" | "locking" => Some("lock"),
        "unlock" | "unlocked" | "unlocking" => Some("unlock"),
        "open" | "opening" => Some("open"),
        _ => value::as_bool(value).map(|locked| if locked { "lock" } else { "unlock" }),
    }
}

fn lock_command(entity: &Entity, action: &str, attribute: Option<&str>) -> CommandResult<Command> {
    match action {
        "lock" => Ok(Command::new(entity, "lock", "LOCK")),
        "unlock" => Ok(Command::new(entity, "unlock", "UNLOCK")),
        _ if entity.has_feature(lock::OPEN) => Ok(Command::new(entity, "open", "OPEN")),
        _ => Err(not_writable(entity, attribute.or(Some("open")))),
    }
}

/// Vacuum service for a free-text command
fn vacuum_service(word: &str) -> Option<&'static str> {
    match word {
        "start" | "clean" | "cleaning" => Some("start"),
        "stop" | "idle" => Some("stop"),
        "pause" | "paused" => Some("pause"),
        "return_home" | "return_to_base" | "return" | "home" | "dock" | "returning" => {
            Some("return_to_base")
        }
        "clean_spot" | "spot" => Some("clean_spot"),
        "locate" => Some("locate"),
        _ => None,
    }
}

fn fan_speed(entity: &Entity, value: &Value) -> CommandResult<Command> {
    let wanted = value::as_text(value);
    let speeds = entity.attr_list("fan_speed_list");
    let speed = pick(speeds.iter().map(String::as_str), &wanted)
        .ok_or_else(|| invalid_option(entity, wanted.trim()))?;
    Ok(Command::new(entity, "set_fan_speed", speed).param("fan_speed", speed))
}

fn vacuum_primary(entity: &Entity, value: &Value) -> CommandResult<Command> {
    if let Value::Object(map) = value {
        if let Some(speed) = map.get("fan_speed") {
            return fan_speed(entity, speed);
        }
        let command = map.get("command").map(value::as_text).unwrap_or_default();
        if command.trim().is_empty() {
            return Err(invalid(entity, "expected 'fan_speed' or 'command'"));
        }
        let mut data = Map::new();
        data.insert("command".to_string(), Value::String(command.trim().to_string()));
        if let Some(params) = map.get("params") {
            data.insert("params".to_string(), params.clone());
        }
        return Ok(Command::with_data(entity, "send_command", data));
    }

    let text = word(value);
    if let Some(service) = vacuum_service(&text) {
        return Ok(Command::new(entity, service, service));
    }
    if pick(entity.attr_list("fan_speed_list").iter().map(String::as_str), &text).is_some() {
        return fan_speed(entity, value);
    }
    Err(invalid(entity, format!("unknown vacuum command '{text}'")))
}

fn climate_primary(entity: &Entity, value: &Value) -> CommandResult<Command> {
    if let Some(temperature) = value::as_f64(value) {
        let temperature = number_value(temperature);
        return Ok(Command::new(entity, "set_temperature", temperature.to_string())
            .param("temperature", temperature));
    }

    let wanted = value::as_text(value);
    let modes = entity.attr_list("hvac_modes");
    let mode = if modes.is_empty() {
        Some(wanted.trim()).filter(|m| !m.is_empty())
    } else {
        pick(modes.iter().map(String::as_str), &wanted)
    };
    let mode = mode.ok_or_else(|| invalid_option(entity, wanted.trim()))?;
    Ok(Command::new(entity, "set_hvac_mode", mode).param("hvac_mode", mode))
}

fn build_attribute(entity: &Entity, key: &str, value: &Value) -> CommandResult<Command> {
    let descriptor =
        domains::attribute(entity.domain(), key).ok_or_else(|| CommandError::UnknownAttribute {
            entity_id: entity.entity_id.clone(),
            attribute: key.to_string(),
        })?;
    if !descriptor.is_writable_for(entity) {
        return Err(not_writable(entity, Some(key)));
    }

    match (entity.domain(), key) {
        (Domain::Light, _) => light_attribute(entity, descriptor, value),

        (Domain::Cover, "current_position") => {
            let position = number(entity, value)?.clamp(0.0, 100.0);
            Ok(cover_position(entity, "set_cover_position", "position", position))
        }
        (Domain::Cover, "current_tilt_position") => {
            let tilt = number(entity, value)?.clamp(0.0, 100.0);
            Ok(cover_position(entity, "set_cover_tilt_position", "tilt_position", tilt))
        }

        (Domain::Climate, "target_temp_low" | "target_temp_high") => {
            let mut data = Map::new();
            for bound in ["target_temp_low", "target_temp_high"] {
                let current = if bound == key {
                    Some(number(entity, value)?)
                } else {
                    entity.attr_f64(bound)
                };
                if let Some(current) = current {
                    data.insert(bound.to_string(), number_value(current));
                }
            }
            Ok(Command::with_data(entity, "set_temperature", data))
        }
        (Domain::Climate | Domain::Humidifier, "humidity") => {
            let humidity = number(entity, value)?.clamp(0.0, 100.0);
            Ok(Command::set(entity, "set_humidity", "humidity", number_value(humidity)))
        }
        (Domain::Climate, "hvac_mode") => option_command(entity, descriptor, value, "set_hvac_mode"),
        (Domain::Climate, "fan_mode") => option_command(entity, descriptor, value, "set_fan_mode"),
        (Domain::Climate | Domain::Fan, "preset_mode") => {
            option_command(entity, descriptor, value, "set_preset_mode")
        }
        (Domain::Climate, "swing_mode") => option_command(entity, descriptor, value, "set_swing_mode"),

        (Domain::Fan, "percentage") => {
            let percentage = number(entity, value)?.clamp(0.0, 100.0);
            Ok(Command::set(entity, "set_percentage", "percentage", number_value(percentage.round())))
        }
        (Domain::Fan, "oscillating") => {
            Ok(Command::set(entity, "oscillate", "oscillating", Value::Bool(switch(entity, value)?)))
        }
        (Domain::Fan, "direction") => option_command(entity, descriptor, value, "set_direction"),

        (Domain::Humidifier, "mode") => option_command(entity, descriptor, value, "set_mode"),

        (Domain::MediaPlayer, "power") => Ok(power(entity, switch(entity, value)?)),
        (Domain::MediaPlayer, "volume_level") => {
            let volume = number(entity, value)?.clamp(0.0, 1.0);
            Ok(Command::set(entity, "volume_set", "volume_level", Value::from(volume)))
        }
        (Domain::MediaPlayer, "is_volume_muted") => Ok(Command::set(
            entity,
            "volume_mute",
            "is_volume_muted",
            Value::Bool(switch(entity, value)?),
        )),
        (Domain::MediaPlayer, "source") => option_command(entity, descriptor, value, "select_source"),
        (Domain::MediaPlayer, "sound_mode") => {
            option_command(entity, descriptor, value, "select_sound_mode")
        }
        (Domain::MediaPlayer, "repeat") => {
            let mode = repeat_mode(value).ok_or_else(|| invalid_option(entity, value::as_text(value)))?;
            Ok(Command::set(entity, "repeat_set", "repeat", Value::from(mode)))
        }
        (Domain::MediaPlayer, "shuffle") => {
            Ok(Command::set(entity, "shuffle_set", "shuffle", Value::Bool(switch(entity, value)?)))
        }

        (Domain::Lock, "action") => {
            let action = lock_word(value).ok_or_else(|| invalid_option(entity, value::as_text(value)))?;
            lock_command(entity, action, Some(key))
        }

        (Domain::Vacuum, "fan_speed") => fan_speed(entity, value),
        (Domain::Vacuum, "action") => {
            let wanted = word(value);
            let action = pick(presentation::vacuum_actions(entity), &wanted)
                .ok_or_else(|| invalid_option(entity, wanted.as_str()))?;
            let service = vacuum_service(action).unwrap_or(action);
            Ok(Command::new(entity, service, service))
        }

        _ => Err(not_writable(entity, Some(key))),
    }
}

/// Repeat mode from its name or its integer encoding
fn repeat_mode(value: &Value) -> Option<&'static str> {
    if let Some(index) = value.as_u64() {
        return REPEAT_MODES.get(index as usize).copied();
    }
    let text = value::as_text(value);
    match text.trim().parse::<usize>() {
        Ok(index) => REPEAT_MODES.get(index).copied(),
        Err(_) => pick(REPEAT_MODES.iter().copied(), &text),
    }
}

/// Legal spelling of an enumeration write, checked against the descriptor's options
fn choose_option(
    entity: &Entity,
    descriptor: &AttributeDescriptor,
    value: &Value,
) -> CommandResult<String> {
    let wanted = value::as_text(value);
    let chosen = match descriptor.options {
        Options::Attribute(list) => {
            let options = entity.attr_list(list);
            if options.is_empty() {
                Some(wanted.trim().to_string()).filter(|w| !w.is_empty())
            } else {
                pick(options.iter().map(String::as_str), &wanted).map(str::to_string)
            }
        }
        Options::Fixed(options) => pick(options.iter().copied(), &wanted).map(str::to_string),
        Options::None => Some(wanted.trim().to_string()).filter(|w| !w.is_empty()),
    };
    chosen.ok_or_else(|| invalid_option(entity, wanted.trim()))
}

fn option_command(
    entity: &Entity,
    descriptor: &AttributeDescriptor,
    value: &Value,
    service: &str,
) -> CommandResult<Command> {
    let option = choose_option(entity, descriptor, value)?;
    Ok(Command::set(entity, service, descriptor.key, Value::String(option)))
}

fn color_component() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").ok())
        .as_ref()
}

/// Parse a color list from an array, a JSON string or a delimited string,
/// truncated to the attribute's arity
pub fn parse_color(value: &Value, arity: usize) -> Option<Vec<f64>> {
    let mut components = match value {
        Value::Array(items) => items.iter().map(value::as_f64).collect::<Option<Vec<_>>>()?,
        Value::String(text) if text.trim_start().starts_with('[') => {
            let parsed: Value = serde_json::from_str(text).ok()?;
            return parse_color(&parsed, arity);
        }
        Value::String(text) => color_component()?
            .find_iter(text)
            .map(|m| m.as_str().parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };
    if components.len() < arity {
        return None;
    }
    components.truncate(arity);
    Some(components)
}

fn light_attribute(
    entity: &Entity,
    descriptor: &AttributeDescriptor,
    value: &Value,
) -> CommandResult<Command> {
    let key = descriptor.key;
    let converted = if let Some(arity) = color_arity(key) {
        let components = parse_color(value, arity)
            .ok_or_else(|| invalid(entity, format!("expected {arity} color components, got {value}")))?;
        Value::Array(components.into_iter().map(number_value).collect())
    } else {
        match descriptor.semantic {
            SemanticType::Number => number_value(number(entity, value)?),
            SemanticType::Enumeration => Value::String(choose_option(entity, descriptor, value)?),
            _ => value.clone(),
        }
    };

    let mut payload = Map::new();
    payload.insert("state".to_string(), Value::String("ON".to_string()));
    payload.insert(key.to_string(), converted.clone());

    let mut command = Command::new(entity, "turn_on", Value::Object(payload).to_string());
    command.data.insert(key.to_string(), converted);
    Ok(command)
}
