//! Presentation metadata for slots
//!
//! Decides how the host should render and edit a slot (switch, slider,
//! enumeration or plain value) from the entity's domain, attributes and
//! feature bitmask. Derivation is deterministic: the same entity always
//! yields the same presentation.

use ha_core::domains::{
    self, AttributeDescriptor, Options, Range, SemanticType, COVER_STATES, LOCK_STATES,
    REPEAT_MODES, VACUUM_ACTIONS, VACUUM_STATES,
};
use ha_core::features::{self, cover, lock};
use ha_core::{value, Domain, Entity};
use serde::Serialize;
use serde_json::{Map, Value};

/// Slider/min/max attribute pairs, in priority order
const BOUND_NAMES: &[(&str, &str)] = &[("min", "max"), ("native_min_value", "native_max_value")];

/// Alternate step attribute names, checked after the slot's own step
const STEP_NAMES: &[&str] = &["native_step", "target_temp_step", "step"];

/// Unit attribute names, checked in order
const UNIT_NAMES: &[&str] = &[
    "unit_of_measurement",
    "native_unit_of_measurement",
    "unit",
    "temperature_unit",
];

const MAX_DIGITS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationKind {
    Switch,
    Slider,
    Enumeration,
    Value,
}

/// One legal option of an enumeration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumOption {
    pub value: String,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl EnumOption {
    fn plain(value: &str) -> Self {
        Self {
            value: value.to_string(),
            caption: caption(value),
            icon: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub kind: PresentationKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub digits: Option<u32>,
    pub unit: Option<String>,
    pub options: Vec<EnumOption>,
    pub on_caption: Option<String>,
    pub off_caption: Option<String>,
}

impl Presentation {
    fn new(kind: PresentationKind) -> Self {
        Self {
            kind,
            min: None,
            max: None,
            step: None,
            digits: None,
            unit: None,
            options: Vec::new(),
            on_caption: None,
            off_caption: None,
        }
    }

    pub fn switch(on: &str, off: &str) -> Self {
        Self {
            on_caption: Some(on.to_string()),
            off_caption: Some(off.to_string()),
            ..Self::new(PresentationKind::Switch)
        }
    }

    pub fn enumeration(options: Vec<EnumOption>) -> Self {
        Self {
            options,
            ..Self::new(PresentationKind::Enumeration)
        }
    }

    pub fn value(unit: Option<String>) -> Self {
        Self {
            unit,
            ..Self::new(PresentationKind::Value)
        }
    }

    pub fn option_values(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.value.as_str()).collect()
    }

    /// Mapping handed to the slot store, without null-valued keys
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| match v {
                    Value::Null => false,
                    Value::Array(items) => !items.is_empty(),
                    _ => true,
                })
                .collect(),
            _ => Map::new(),
        }
    }
}

/// Which slot of an entity a presentation is for
#[derive(Debug, Clone, Copy)]
pub enum SlotTarget {
    Primary,
    Attribute(&'static AttributeDescriptor),
}

pub fn derive(entity: &Entity, target: SlotTarget) -> Presentation {
    match target {
        SlotTarget::Primary => derive_primary(entity),
        SlotTarget::Attribute(descriptor) => derive_attribute(entity, descriptor),
    }
}

/// Presentation of the primary slot
pub fn derive_primary(entity: &Entity) -> Presentation {
    match entity.domain() {
        Domain::Switch | Domain::Light | Domain::Fan | Domain::Humidifier => {
            Presentation::switch("On", "Off")
        }
        Domain::BinarySensor => {
            let (on, off) = binary_captions(entity.attr_text("device_class").as_deref());
            Presentation::switch(on, off)
        }
        Domain::Sensor | Domain::Number => numeric(entity, None, &[], None),
        Domain::Climate => numeric(entity, None, &[("min_temp", "max_temp")], Some("temperature"))
            .with_unit_fallback(entity, "°C"),
        Domain::Cover => cover_primary(entity),
        Domain::Lock => Presentation::enumeration(lock_states(entity)),
        Domain::Vacuum => Presentation::enumeration(
            VACUUM_STATES
                .iter()
                .map(|(state, icon)| EnumOption {
                    icon: Some(icon.to_string()),
                    ..EnumOption::plain(state)
                })
                .collect(),
        ),
        Domain::Select => Presentation::enumeration(list_options(entity, "options")),
        Domain::Event => Presentation::enumeration(list_options(entity, "event_types")),
        Domain::MediaPlayer | Domain::Button => Presentation::value(None),
    }
}

/// Presentation of a secondary attribute slot
pub fn derive_attribute(entity: &Entity, descriptor: &AttributeDescriptor) -> Presentation {
    match descriptor.semantic {
        SemanticType::Switch => Presentation::switch("On", "Off"),
        SemanticType::Number => number_attribute(entity, descriptor),
        SemanticType::Enumeration => {
            Presentation::enumeration(attribute_options(entity, descriptor))
        }
        SemanticType::Text | SemanticType::Event => {
            Presentation::value(attribute_unit(entity, descriptor.key))
        }
    }
}

impl Presentation {
    fn with_unit_fallback(mut self, entity: &Entity, fallback: &str) -> Self {
        if self.unit.is_none() {
            self.unit = resolve_unit(entity).or_else(|| Some(fallback.to_string()));
        }
        self
    }
}

fn number_attribute(entity: &Entity, descriptor: &AttributeDescriptor) -> Presentation {
    let current = entity.attributes.get(descriptor.key);
    let mut presentation = match descriptor.range {
        Range::Fixed { min, max, step } => slider(entity, min, max, Some(step), current),
        Range::Attributes {
            min,
            max,
            step,
            default_min,
            default_max,
        } => {
            let min = entity.attr_f64(min).unwrap_or(default_min);
            let max = entity.attr_f64(max).unwrap_or(default_max);
            let step = step.and_then(|name| entity.attr_f64(name));
            slider(entity, min, max, step, current)
        }
        Range::None => Presentation {
            digits: infer_digits(entity, None, current),
            ..Presentation::value(None)
        },
    };
    presentation.unit = attribute_unit(entity, descriptor.key);
    presentation
}

/// Numeric primary value: a slider when bounds are known, else a plain value
fn numeric(
    entity: &Entity,
    explicit_step: Option<f64>,
    extra_bounds: &[(&str, &str)],
    value_key: Option<&str>,
) -> Presentation {
    let current = value_key
        .and_then(|key| entity.attributes.get(key).cloned())
        .unwrap_or_else(|| Value::String(entity.state.clone()));

    let bounds = BOUND_NAMES
        .iter()
        .chain(extra_bounds.iter())
        .find_map(|(min, max)| Some((entity.attr_f64(min)?, entity.attr_f64(max)?)));

    let mut presentation = match bounds {
        Some((min, max)) => slider(entity, min, max, explicit_step, Some(&current)),
        None => Presentation {
            digits: infer_digits(entity, explicit_step, Some(&current)),
            ..Presentation::value(None)
        },
    };
    presentation.unit = resolve_unit(entity);
    presentation
}

fn slider(
    entity: &Entity,
    min: f64,
    max: f64,
    explicit_step: Option<f64>,
    current: Option<&Value>,
) -> Presentation {
    let step = explicit_step
        .or_else(|| STEP_NAMES.iter().find_map(|name| entity.attr_f64(name)))
        .filter(|s| *s > 0.0)
        .unwrap_or(1.0);
    Presentation {
        min: Some(min),
        max: Some(max),
        step: Some(step),
        digits: infer_digits(entity, explicit_step, current),
        ..Presentation::new(PresentationKind::Slider)
    }
}

/// Number of decimal digits to display
///
/// Sources in priority order: the slot's own step, the alternate step
/// attributes, `precision`, `suggested_display_precision`, then the decimal
/// count of the current value. Clamped to [0, 3]. When none of these yields a
/// count but the step is a fraction in (0, 1), one digit is used.
pub fn infer_digits(entity: &Entity, explicit_step: Option<f64>, current: Option<&Value>) -> Option<u32> {
    let step = explicit_step.or_else(|| STEP_NAMES.iter().find_map(|name| entity.attr_f64(name)));

    let digits = step
        .and_then(|s| serde_json::Number::from_f64(s).map(Value::Number))
        .and_then(|s| value::decimal_places(&s))
        .or_else(|| precision(entity, "precision"))
        .or_else(|| precision(entity, "suggested_display_precision"))
        .or_else(|| current.and_then(value::decimal_places));

    match digits {
        Some(digits) => Some(digits.min(MAX_DIGITS)),
        None if step.is_some_and(|s| s > 0.0 && s < 1.0) => Some(1),
        None => None,
    }
}

fn precision(entity: &Entity, key: &str) -> Option<u32> {
    entity
        .attr_f64(key)
        .filter(|p| *p >= 0.0)
        .map(|p| p.round() as u32)
}

/// Unit suffix from the unit attributes, then the device-class table
pub fn resolve_unit(entity: &Entity) -> Option<String> {
    UNIT_NAMES
        .iter()
        .find_map(|name| entity.attr_text(name))
        .or_else(|| {
            entity
                .attr_text("device_class")
                .and_then(|class| device_class_unit(&class))
                .map(str::to_string)
        })
}

/// Default unit for a device class
pub fn device_class_unit(device_class: &str) -> Option<&'static str> {
    match device_class {
        "battery" | "humidity" | "moisture" | "power_factor" => Some("%"),
        "temperature" => Some("°C"),
        "illuminance" => Some("lx"),
        "power" => Some("W"),
        "energy" => Some("kWh"),
        "voltage" => Some("V"),
        "current" => Some("A"),
        "frequency" => Some("Hz"),
        "pressure" | "atmospheric_pressure" => Some("hPa"),
        "carbon_dioxide" | "carbon_monoxide" => Some("ppm"),
        "pm1" | "pm25" | "pm10" => Some("µg/m³"),
        "signal_strength" => Some("dBm"),
        "sound_pressure" => Some("dB"),
        "duration" => Some("s"),
        _ => None,
    }
}

fn attribute_unit(entity: &Entity, key: &str) -> Option<String> {
    match key {
        "current_temperature" | "target_temp_low" | "target_temp_high" | "temperature" => Some(
            entity
                .attr_text("temperature_unit")
                .unwrap_or_else(|| "°C".to_string()),
        ),
        "humidity" | "current_humidity" | "current_position" | "current_tilt_position"
        | "percentage" | "battery_level" => Some("%".to_string()),
        "color_temp" => Some("mired".to_string()),
        "color_temp_kelvin" => Some("K".to_string()),
        "transition" => Some("s".to_string()),
        _ => None,
    }
}

fn cover_primary(entity: &Entity) -> Presentation {
    let positionable = entity.has_feature(cover::SET_POSITION)
        || entity.attr_f64("current_position").is_some()
        || entity.attr_f64("current_cover_position").is_some();
    if positionable {
        return Presentation {
            min: Some(0.0),
            max: Some(100.0),
            step: Some(1.0),
            digits: Some(0),
            unit: Some("%".to_string()),
            ..Presentation::new(PresentationKind::Slider)
        };
    }

    // Without a position the value is still 0/100, captioned by state
    Presentation::enumeration(
        COVER_STATES
            .iter()
            .filter_map(|state| {
                let value = match *state {
                    "open" => "100",
                    "closed" => "0",
                    _ => return None,
                };
                Some(EnumOption {
                    value: value.to_string(),
                    caption: caption(state),
                    icon: None,
                })
            })
            .collect(),
    )
}

/// Lock states, without `open` unless the lock can open
pub fn lock_states(entity: &Entity) -> Vec<EnumOption> {
    let can_open = entity.has_feature(lock::OPEN);
    LOCK_STATES
        .iter()
        .filter(|(state, _)| can_open || (*state != "open" && *state != "opening"))
        .map(|(state, _)| EnumOption::plain(state))
        .collect()
}

/// Lock actions, `open` gated by the OPEN bit
pub fn lock_actions(entity: &Entity) -> Vec<&'static str> {
    let mut actions = vec!["lock", "unlock"];
    if entity.has_feature(lock::OPEN) {
        actions.push("open");
    }
    actions
}

/// Vacuum actions enabled by the entity's feature bits
pub fn vacuum_actions(entity: &Entity) -> Vec<&'static str> {
    let bits = entity.supported_features();
    VACUUM_ACTIONS
        .iter()
        .filter(|(_, bit)| features::has(bits, *bit))
        .map(|(action, _)| *action)
        .collect()
}

fn attribute_options(entity: &Entity, descriptor: &AttributeDescriptor) -> Vec<EnumOption> {
    match (entity.domain(), descriptor.key) {
        (Domain::Lock, "action") => lock_actions(entity)
            .into_iter()
            .map(EnumOption::plain)
            .collect(),
        (Domain::Vacuum, "action") => vacuum_actions(entity)
            .into_iter()
            .map(EnumOption::plain)
            .collect(),
        // Repeat is published as its integer encoding
        (Domain::MediaPlayer, "repeat") => REPEAT_MODES
            .iter()
            .enumerate()
            .map(|(index, mode)| EnumOption {
                value: index.to_string(),
                caption: caption(mode),
                icon: None,
            })
            .collect(),
        _ => match descriptor.options {
            Options::Attribute(list) => list_options(entity, list),
            Options::Fixed(values) => values.iter().map(|v| EnumOption::plain(v)).collect(),
            Options::None => Vec::new(),
        },
    }
}

fn list_options(entity: &Entity, list: &str) -> Vec<EnumOption> {
    entity
        .attr_list(list)
        .iter()
        .map(|v| EnumOption::plain(v))
        .collect()
}

fn binary_captions(device_class: Option<&str>) -> (&'static str, &'static str) {
    match device_class {
        Some("door" | "window" | "opening" | "garage_door") => ("Open", "Closed"),
        Some("moisture") => ("Wet", "Dry"),
        Some("motion" | "occupancy" | "presence") => ("Detected", "Clear"),
        Some("lock") => ("Unlocked", "Locked"),
        Some("battery") => ("Low", "Normal"),
        Some("connectivity") => ("Connected", "Disconnected"),
        _ => ("On", "Off"),
    }
}

/// `return_home` -> `Return home`
fn caption(value: &str) -> String {
    let text = value.replace('_', " ");
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether the slot accepts writes for this entity
pub fn is_writable(entity: &Entity, target: SlotTarget) -> bool {
    match target {
        SlotTarget::Primary => domains::descriptor(entity.domain()).primary_writable,
        SlotTarget::Attribute(descriptor) => descriptor.is_writable_for(entity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_core::{Attributes, EntityId};
    use serde_json::json;

    fn entity(domain: Domain, state: &str, attrs: Value) -> Entity {
        let mut entity = Entity::new(EntityId::new(domain, "test").unwrap(), "Test", 0);
        let attrs: Attributes = serde_json::from_value(attrs).unwrap();
        entity.merge(state, &attrs);
        entity
    }

    #[test]
    fn test_binary_domains_are_switches() {
        let p = derive_primary(&entity(Domain::Switch, "on", json!({})));
        assert_eq!(p.kind, PresentationKind::Switch);

        let door = entity(Domain::BinarySensor, "off", json!({"device_class": "door"}));
        let p = derive_primary(&door);
        assert_eq!(p.on_caption.as_deref(), Some("Open"));
        assert_eq!(p.off_caption.as_deref(), Some("Closed"));
    }

    #[test]
    fn test_number_slider_with_step() {
        let number = entity(
            Domain::Number,
            "2.5",
            json!({"min": 0, "max": 10, "step": 0.5}),
        );
        let p = derive_primary(&number);
        assert_eq!(p.kind, PresentationKind::Slider);
        assert_eq!(p.min, Some(0.0));
        assert_eq!(p.max, Some(10.0));
        assert_eq!(p.step, Some(0.5));
        assert_eq!(p.digits, Some(1));
    }

    #[test]
    fn test_native_bounds() {
        let number = entity(
            Domain::Number,
            "20",
            json!({"native_min_value": 5, "native_max_value": 30}),
        );
        let p = derive_primary(&number);
        assert_eq!(p.kind, PresentationKind::Slider);
        assert_eq!(p.min, Some(5.0));
        assert_eq!(p.step, Some(1.0));
        assert_eq!(p.digits, Some(0));
    }

    #[test]
    fn test_digits_from_step() {
        let half = entity(Domain::Number, "1", json!({"step": 0.5}));
        assert_eq!(infer_digits(&half, None, None), Some(1));

        let whole = entity(Domain::Number, "12.345", json!({"step": 1}));
        assert_eq!(infer_digits(&whole, None, Some(&json!("12.345"))), Some(0));
    }

    #[test]
    fn test_digits_from_value() {
        let sensor = entity(Domain::Sensor, "12.345", json!({}));
        assert_eq!(infer_digits(&sensor, None, Some(&json!("12.345"))), Some(3));
        assert_eq!(infer_digits(&sensor, None, Some(&json!(1.234567))), Some(3));
        assert_eq!(derive_primary(&sensor).digits, Some(3));
    }

    #[test]
    fn test_digits_precision_order() {
        let sensor = entity(
            Domain::Sensor,
            "21.456",
            json!({"precision": 2, "suggested_display_precision": 1}),
        );
        assert_eq!(infer_digits(&sensor, None, Some(&json!("21.456"))), Some(2));

        let suggested = entity(Domain::Sensor, "21.456", json!({"suggested_display_precision": 1}));
        assert_eq!(infer_digits(&suggested, None, Some(&json!("21.456"))), Some(1));
    }

    #[test]
    fn test_digits_explicit_step_wins() {
        let number = entity(Domain::Number, "3", json!({"step": 0.001}));
        assert_eq!(infer_digits(&number, Some(0.5), None), Some(1));
    }

    #[test]
    fn test_fractional_step_without_digit_source() {
        let number = entity(Domain::Number, "", json!({}));
        assert_eq!(infer_digits(&number, Some(1e-7), None), Some(1));
        assert_eq!(infer_digits(&number, None, None), None);
    }

    #[test]
    fn test_unit_resolution_order() {
        let sensor = entity(
            Domain::Sensor,
            "5",
            json!({"native_unit_of_measurement": "kW", "unit": "W"}),
        );
        assert_eq!(derive_primary(&sensor).unit.as_deref(), Some("kW"));

        let battery = entity(Domain::Sensor, "80", json!({"device_class": "battery"}));
        assert_eq!(derive_primary(&battery).unit.as_deref(), Some("%"));

        let plain = entity(Domain::Sensor, "80", json!({}));
        assert_eq!(derive_primary(&plain).unit, None);
    }

    #[test]
    fn test_climate_bounds_from_temperature_range() {
        let climate = entity(
            Domain::Climate,
            "heat",
            json!({"min_temp": 7, "max_temp": 30, "target_temp_step": 0.5, "temperature": 21.5}),
        );
        let p = derive_primary(&climate);
        assert_eq!(p.kind, PresentationKind::Slider);
        assert_eq!(p.max, Some(30.0));
        assert_eq!(p.step, Some(0.5));
        assert_eq!(p.digits, Some(1));
        assert_eq!(p.unit.as_deref(), Some("°C"));
    }

    #[test]
    fn test_lock_states_gated_by_open() {
        let plain = entity(Domain::Lock, "locked", json!({}));
        let values = derive_primary(&plain).option_values().join(",");
        assert!(!values.contains("open"));

        let openable = entity(Domain::Lock, "locked", json!({"supported_features": 1}));
        assert!(derive_primary(&openable).option_values().contains(&"open"));
        assert_eq!(lock_actions(&openable), vec!["lock", "unlock", "open"]);
    }

    #[test]
    fn test_vacuum_states_have_icons() {
        let vacuum = entity(Domain::Vacuum, "docked", json!({}));
        let p = derive_primary(&vacuum);
        assert_eq!(p.kind, PresentationKind::Enumeration);
        assert!(p.options.iter().all(|o| o.icon.is_some()));
    }

    #[test]
    fn test_vacuum_actions_gated() {
        let vacuum = entity(Domain::Vacuum, "docked", json!({"supported_features": 8192 | 16}));
        assert_eq!(vacuum_actions(&vacuum), vec!["start", "return_home"]);
    }

    #[test]
    fn test_select_and_event_options() {
        let select = entity(Domain::Select, "A", json!({"options": ["A", "B"]}));
        assert_eq!(derive_primary(&select).option_values(), vec!["A", "B"]);

        let event = entity(Domain::Event, "", json!({"event_types": ["single_press", "double_press"]}));
        let p = derive_primary(&event);
        assert_eq!(p.options[1].caption, "Double press");
    }

    #[test]
    fn test_attribute_presentations() {
        let light = entity(
            Domain::Light,
            "on",
            json!({"effect_list": ["rainbow", "none"], "min_mireds": 153, "max_mireds": 370, "color_temp": 250}),
        );
        let effect = domains::attribute(Domain::Light, "effect").unwrap();
        assert_eq!(derive_attribute(&light, effect).option_values(), vec!["rainbow", "none"]);

        let color_temp = domains::attribute(Domain::Light, "color_temp").unwrap();
        let p = derive_attribute(&light, color_temp);
        assert_eq!(p.max, Some(370.0));
        assert_eq!(p.unit.as_deref(), Some("mired"));

        let transition = domains::attribute(Domain::Light, "transition").unwrap();
        assert_eq!(derive_attribute(&light, transition).digits, Some(1));
    }

    #[test]
    fn test_repeat_options_are_encoded() {
        let player = entity(Domain::MediaPlayer, "playing", json!({}));
        let repeat = domains::attribute(Domain::MediaPlayer, "repeat").unwrap();
        let p = derive_attribute(&player, repeat);
        assert_eq!(p.option_values(), vec!["0", "1", "2"]);
        assert_eq!(p.options[2].caption, "One");
    }

    #[test]
    fn test_cover_without_position_is_enumeration() {
        let cover = entity(Domain::Cover, "closed", json!({"supported_features": 3}));
        let p = derive_primary(&cover);
        assert_eq!(p.kind, PresentationKind::Enumeration);
        assert_eq!(p.option_values(), vec!["100", "0"]);

        let positioned = entity(Domain::Cover, "open", json!({"supported_features": 4}));
        assert_eq!(derive_primary(&positioned).kind, PresentationKind::Slider);
    }

    #[test]
    fn test_to_map_drops_nulls() {
        let map = Presentation::switch("On", "Off").to_map();
        assert_eq!(map.get("kind"), Some(&json!("switch")));
        assert_eq!(map.get("on_caption"), Some(&json!("On")));
        assert!(!map.contains_key("min"));
        assert!(!map.contains_key("unit"));
        assert!(!map.contains_key("options"));

        let map = Presentation::enumeration(vec![EnumOption::plain("a")]).to_map();
        assert_eq!(map["options"][0]["caption"], json!("A"));
        assert!(map["options"][0].get("icon").is_none());
    }
}
