//! Domain registry
//!
//! Static, per-domain tables describing the canonical attributes each domain
//! exposes as secondary slots, which of them accept writes and under which
//! capability requirements, plus the supported-feature labels and state
//! vocabularies. Pure data: nothing in here holds entity-specific state.

use crate::features::{self, climate, cover, fan, humidifier, light, lock, media_player, vacuum};
use crate::{Domain, Entity};
use SemanticType::{Enumeration, Number, Switch, Text};

/// How a slot's value is typed on the host side
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Switch,
    Number,
    Text,
    Enumeration,
    Event,
}

/// Where the legal options of an enumeration slot come from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Options {
    None,
    /// Read the list from an entity attribute (e.g. `effect_list`)
    Attribute(&'static str),
    Fixed(&'static [&'static str]),
}

/// Bounds of a numeric slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Range {
    None,
    Fixed {
        min: f64,
        max: f64,
        step: f64,
    },
    /// Bounds read from entity attributes, with fallbacks when absent
    Attributes {
        min: &'static str,
        max: &'static str,
        step: Option<&'static str>,
        default_min: f64,
        default_max: f64,
    },
}

/// A canonical secondary attribute of a domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeDescriptor {
    pub key: &'static str,
    pub caption: &'static str,
    pub semantic: SemanticType,
    pub writable: bool,
    /// Any of these feature bits satisfies the requirement
    pub required_features: &'static [u32],
    /// Any of these `supported_color_modes` satisfies the requirement
    pub required_modes: &'static [&'static str],
    pub options: Options,
    pub range: Range,
}

impl AttributeDescriptor {
    const fn new(key: &'static str, caption: &'static str, semantic: SemanticType) -> Self {
        Self {
            key,
            caption,
            semantic,
            writable: false,
            required_features: &[],
            required_modes: &[],
            options: Options::None,
            range: Range::None,
        }
    }

    const fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    const fn features(mut self, bits: &'static [u32]) -> Self {
        self.required_features = bits;
        self
    }

    const fn modes(mut self, modes: &'static [&'static str]) -> Self {
        self.required_modes = modes;
        self
    }

    const fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    const fn range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    /// Whether the entity's capabilities satisfy this attribute's requirements
    ///
    /// An attribute without requirements is always satisfied. Otherwise a
    /// single matching feature bit or a single matching color mode is enough:
    /// newer lights announce capabilities through color modes while legacy
    /// ones only set the old feature bits.
    pub fn requirements_met(&self, entity: &Entity) -> bool {
        if self.required_features.is_empty() && self.required_modes.is_empty() {
            return true;
        }
        let bits = entity.supported_features();
        if self
            .required_features
            .iter()
            .any(|bit| features::has(bits, *bit))
        {
            return true;
        }
        let modes = entity.supported_color_modes();
        self.required_modes
            .iter()
            .any(|m| modes.iter().any(|s| s == m))
    }

    /// Whether a slot for this attribute should accept writes for `entity`
    pub fn is_writable_for(&self, entity: &Entity) -> bool {
        self.writable && self.requirements_met(entity)
    }
}

/// Static description of one domain
#[derive(Debug)]
pub struct DomainDescriptor {
    pub domain: Domain,
    pub primary: SemanticType,
    pub primary_writable: bool,
    /// Secondary attributes in slot layout order
    pub attributes: &'static [AttributeDescriptor],
    /// Supported-feature bit to label
    pub features: &'static [(u32, &'static str)],
}

impl DomainDescriptor {
    pub fn attribute(&self, key: &str) -> Option<&'static AttributeDescriptor> {
        self.attributes.iter().find(|a| a.key == key)
    }

    /// Position of an attribute in the slot layout
    pub fn attribute_index(&self, key: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.key == key)
    }

    /// Labels of every feature bit set in `bits`, in table order
    pub fn feature_labels(&self, bits: u32) -> Vec<&'static str> {
        self.features
            .iter()
            .filter(|(bit, _)| features::has(bits, *bit))
            .map(|(_, label)| *label)
            .collect()
    }
}

/// Lock states, also the priority order of the `is_*` flag scan
pub const LOCK_STATES: &[(&str, &str)] = &[
    ("jammed", "is_jammed"),
    ("opening", "is_opening"),
    ("open", "is_open"),
    ("locking", "is_locking"),
    ("locked", "is_locked"),
    ("unlocking", "is_unlocking"),
    ("unlocked", "is_unlocked"),
];

pub const COVER_STATES: &[&str] = &["open", "opening", "closed", "closing", "stopped"];

/// Vacuum states with the icon shown next to each
pub const VACUUM_STATES: &[(&str, &str)] = &[
    ("cleaning", "mdi:robot-vacuum"),
    ("docked", "mdi:home"),
    ("idle", "mdi:sleep"),
    ("paused", "mdi:pause"),
    ("returning", "mdi:home-import-outline"),
    ("error", "mdi:alert-circle"),
];

/// Vacuum action options and the feature bit that enables each
pub const VACUUM_ACTIONS: &[(&str, u32)] = &[
    ("start", vacuum::START),
    ("stop", vacuum::STOP),
    ("pause", vacuum::PAUSE),
    ("return_home", vacuum::RETURN_HOME),
    ("clean_spot", vacuum::CLEAN_SPOT),
    ("locate", vacuum::LOCATE),
];

/// Media player repeat modes, indexed by their integer encoding
pub const REPEAT_MODES: &[&str] = &["off", "all", "one"];

/// Fixed arity of the light color-list attributes
pub fn color_arity(key: &str) -> Option<usize> {
    match key {
        "hs_color" | "xy_color" => Some(2),
        "rgb_color" => Some(3),
        "rgbw_color" => Some(4),
        "rgbww_color" => Some(5),
        _ => None,
    }
}

const COLOR_MODES_DIMMABLE: &[&str] = &[
    "brightness",
    "color_temp",
    "hs",
    "xy",
    "rgb",
    "rgbw",
    "rgbww",
    "white",
];

static LIGHT_ATTRIBUTES: [AttributeDescriptor; 12] = [
    AttributeDescriptor::new("brightness", "Brightness", Number)
        .writable()
        .features(&[light::SUPPORT_BRIGHTNESS])
        .modes(COLOR_MODES_DIMMABLE)
        .range(Range::Fixed {
            min: 0.0,
            max: 255.0,
            step: 1.0,
        }),
    AttributeDescriptor::new("color_temp", "Color temperature", Number)
        .writable()
        .features(&[light::SUPPORT_COLOR_TEMP])
        .modes(&["color_temp"])
        .range(Range::Attributes {
            min: "min_mireds",
            max: "max_mireds",
            step: None,
            default_min: 153.0,
            default_max: 500.0,
        }),
    AttributeDescriptor::new("color_temp_kelvin", "Color temperature (K)", Number)
        .writable()
        .features(&[light::SUPPORT_COLOR_TEMP])
        .modes(&["color_temp"])
        .range(Range::Attributes {
            min: "min_color_temp_kelvin",
            max: "max_color_temp_kelvin",
            step: None,
            default_min: 2000.0,
            default_max: 6500.0,
        }),
    AttributeDescriptor::new("color_mode", "Color mode", Text),
    AttributeDescriptor::new("transition", "Transition", Number)
        .writable()
        .features(&[light::TRANSITION])
        .range(Range::Fixed {
            min: 0.0,
            max: 300.0,
            step: 0.5,
        }),
    AttributeDescriptor::new("hs_color", "HS color", Text)
        .writable()
        .features(&[light::SUPPORT_COLOR])
        .modes(&["hs"]),
    AttributeDescriptor::new("xy_color", "XY color", Text)
        .writable()
        .features(&[light::SUPPORT_COLOR])
        .modes(&["xy"]),
    AttributeDescriptor::new("rgb_color", "RGB color", Text)
        .writable()
        .features(&[light::SUPPORT_COLOR])
        .modes(&["rgb"]),
    AttributeDescriptor::new("rgbw_color", "RGBW color", Text)
        .writable()
        .modes(&["rgbw"]),
    AttributeDescriptor::new("rgbww_color", "RGBWW color", Text)
        .writable()
        .modes(&["rgbww"]),
    AttributeDescriptor::new("effect", "Effect", Enumeration)
        .writable()
        .features(&[light::EFFECT])
        .options(Options::Attribute("effect_list")),
    AttributeDescriptor::new("flash", "Flash", Enumeration)
        .writable()
        .features(&[light::FLASH])
        .options(Options::Fixed(&["short", "long"])),
];

static CLIMATE_ATTRIBUTES: [AttributeDescriptor; 10] = [
    AttributeDescriptor::new("hvac_mode", "Mode", Enumeration)
        .writable()
        .options(Options::Attribute("hvac_modes")),
    AttributeDescriptor::new("current_temperature", "Current temperature", Number),
    AttributeDescriptor::new("target_temp_low", "Target low", Number)
        .writable()
        .features(&[climate::TARGET_TEMPERATURE_RANGE])
        .range(CLIMATE_TEMPERATURE_RANGE),
    AttributeDescriptor::new("target_temp_high", "Target high", Number)
        .writable()
        .features(&[climate::TARGET_TEMPERATURE_RANGE])
        .range(CLIMATE_TEMPERATURE_RANGE),
    AttributeDescriptor::new("humidity", "Target humidity", Number)
        .writable()
        .features(&[climate::TARGET_HUMIDITY])
        .range(Range::Attributes {
            min: "min_humidity",
            max: "max_humidity",
            step: None,
            default_min: 30.0,
            default_max: 99.0,
        }),
    AttributeDescriptor::new("current_humidity", "Current humidity", Number),
    AttributeDescriptor::new("fan_mode", "Fan mode", Enumeration)
        .writable()
        .features(&[climate::FAN_MODE])
        .options(Options::Attribute("fan_modes")),
    AttributeDescriptor::new("preset_mode", "Preset", Enumeration)
        .writable()
        .features(&[climate::PRESET_MODE])
        .options(Options::Attribute("preset_modes")),
    AttributeDescriptor::new("swing_mode", "Swing mode", Enumeration)
        .writable()
        .features(&[climate::SWING_MODE])
        .options(Options::Attribute("swing_modes")),
    AttributeDescriptor::new("hvac_action", "Action", Text),
];

const CLIMATE_TEMPERATURE_RANGE: Range = Range::Attributes {
    min: "min_temp",
    max: "max_temp",
    step: Some("target_temp_step"),
    default_min: 7.0,
    default_max: 35.0,
};

const PERCENT: Range = Range::Fixed {
    min: 0.0,
    max: 100.0,
    step: 1.0,
};

static COVER_ATTRIBUTES: [AttributeDescriptor; 2] = [
    AttributeDescriptor::new("current_position", "Position", Number)
        .writable()
        .features(&[cover::SET_POSITION])
        .range(PERCENT),
    AttributeDescriptor::new("current_tilt_position", "Tilt", Number)
        .writable()
        .features(&[cover::SET_TILT_POSITION])
        .range(PERCENT),
];

static LOCK_ATTRIBUTES: [AttributeDescriptor; 1] =
    [AttributeDescriptor::new("action", "Action", Enumeration).writable()];

static VACUUM_ATTRIBUTES: [AttributeDescriptor; 3] = [
    AttributeDescriptor::new("fan_speed", "Fan speed", Enumeration)
        .writable()
        .features(&[vacuum::FAN_SPEED])
        .options(Options::Attribute("fan_speed_list")),
    AttributeDescriptor::new("battery_level", "Battery", Number).range(PERCENT),
    AttributeDescriptor::new("action", "Action", Enumeration).writable(),
];

static FAN_ATTRIBUTES: [AttributeDescriptor; 4] = [
    AttributeDescriptor::new("percentage", "Speed", Number)
        .writable()
        .features(&[fan::SET_SPEED])
        .range(Range::Attributes {
            min: "min_percentage",
            max: "max_percentage",
            step: Some("percentage_step"),
            default_min: 0.0,
            default_max: 100.0,
        }),
    AttributeDescriptor::new("preset_mode", "Preset", Enumeration)
        .writable()
        .features(&[fan::PRESET_MODE])
        .options(Options::Attribute("preset_modes")),
    AttributeDescriptor::new("oscillating", "Oscillating", Switch)
        .writable()
        .features(&[fan::OSCILLATE]),
    AttributeDescriptor::new("direction", "Direction", Enumeration)
        .writable()
        .features(&[fan::DIRECTION])
        .options(Options::Fixed(&["forward", "reverse"])),
];

static HUMIDIFIER_ATTRIBUTES: [AttributeDescriptor; 4] = [
    AttributeDescriptor::new("humidity", "Target humidity", Number)
        .writable()
        .range(Range::Attributes {
            min: "min_humidity",
            max: "max_humidity",
            step: None,
            default_min: 0.0,
            default_max: 100.0,
        }),
    AttributeDescriptor::new("current_humidity", "Current humidity", Number).range(PERCENT),
    AttributeDescriptor::new("mode", "Mode", Enumeration)
        .writable()
        .features(&[humidifier::MODES])
        .options(Options::Attribute("available_modes")),
    AttributeDescriptor::new("action", "Action", Text),
];

static MEDIA_PLAYER_ATTRIBUTES: [AttributeDescriptor; 8] = [
    AttributeDescriptor::new("power", "Power", Switch)
        .writable()
        .features(&[media_player::TURN_ON, media_player::TURN_OFF]),
    AttributeDescriptor::new("volume_level", "Volume", Number)
        .writable()
        .features(&[media_player::VOLUME_SET])
        .range(Range::Fixed {
            min: 0.0,
            max: 1.0,
            step: 0.01,
        }),
    AttributeDescriptor::new("is_volume_muted", "Muted", Switch)
        .writable()
        .features(&[media_player::VOLUME_MUTE]),
    AttributeDescriptor::new("source", "Source", Enumeration)
        .writable()
        .features(&[media_player::SELECT_SOURCE])
        .options(Options::Attribute("source_list")),
    AttributeDescriptor::new("sound_mode", "Sound mode", Enumeration)
        .writable()
        .features(&[media_player::SELECT_SOUND_MODE])
        .options(Options::Attribute("sound_mode_list")),
    AttributeDescriptor::new("repeat", "Repeat", Enumeration)
        .writable()
        .features(&[media_player::REPEAT_SET])
        .options(Options::Fixed(REPEAT_MODES)),
    AttributeDescriptor::new("shuffle", "Shuffle", Switch)
        .writable()
        .features(&[media_player::SHUFFLE_SET]),
    AttributeDescriptor::new("media_title", "Title", Text),
];

static LIGHT_FEATURES: [(u32, &str); 6] = [
    (light::SUPPORT_BRIGHTNESS, "brightness"),
    (light::SUPPORT_COLOR_TEMP, "color_temp"),
    (light::EFFECT, "effect"),
    (light::FLASH, "flash"),
    (light::SUPPORT_COLOR, "color"),
    (light::TRANSITION, "transition"),
];

static CLIMATE_FEATURES: [(u32, &str); 9] = [
    (climate::TARGET_TEMPERATURE, "target_temperature"),
    (climate::TARGET_TEMPERATURE_RANGE, "target_temperature_range"),
    (climate::TARGET_HUMIDITY, "target_humidity"),
    (climate::FAN_MODE, "fan_mode"),
    (climate::PRESET_MODE, "preset_mode"),
    (climate::SWING_MODE, "swing_mode"),
    (climate::AUX_HEAT, "aux_heat"),
    (climate::TURN_OFF, "turn_off"),
    (climate::TURN_ON, "turn_on"),
];

static COVER_FEATURES: [(u32, &str); 8] = [
    (cover::OPEN, "open"),
    (cover::CLOSE, "close"),
    (cover::SET_POSITION, "set_position"),
    (cover::STOP, "stop"),
    (cover::OPEN_TILT, "open_tilt"),
    (cover::CLOSE_TILT, "close_tilt"),
    (cover::STOP_TILT, "stop_tilt"),
    (cover::SET_TILT_POSITION, "set_tilt_position"),
];

static LOCK_FEATURES: [(u32, &str); 1] = [(lock::OPEN, "open")];

static VACUUM_FEATURES: [(u32, &str); 14] = [
    (vacuum::TURN_ON, "turn_on"),
    (vacuum::TURN_OFF, "turn_off"),
    (vacuum::PAUSE, "pause"),
    (vacuum::STOP, "stop"),
    (vacuum::RETURN_HOME, "return_home"),
    (vacuum::FAN_SPEED, "fan_speed"),
    (vacuum::BATTERY, "battery"),
    (vacuum::STATUS, "status"),
    (vacuum::SEND_COMMAND, "send_command"),
    (vacuum::LOCATE, "locate"),
    (vacuum::CLEAN_SPOT, "clean_spot"),
    (vacuum::MAP, "map"),
    (vacuum::STATE, "state"),
    (vacuum::START, "start"),
];

static FAN_FEATURES: [(u32, &str); 6] = [
    (fan::SET_SPEED, "set_speed"),
    (fan::OSCILLATE, "oscillate"),
    (fan::DIRECTION, "direction"),
    (fan::PRESET_MODE, "preset_mode"),
    (fan::TURN_OFF, "turn_off"),
    (fan::TURN_ON, "turn_on"),
];

static HUMIDIFIER_FEATURES: [(u32, &str); 1] = [(humidifier::MODES, "modes")];

static MEDIA_PLAYER_FEATURES: [(u32, &str); 19] = [
    (media_player::PAUSE, "pause"),
    (media_player::SEEK, "seek"),
    (media_player::VOLUME_SET, "volume_set"),
    (media_player::VOLUME_MUTE, "volume_mute"),
    (media_player::PREVIOUS_TRACK, "previous_track"),
    (media_player::NEXT_TRACK, "next_track"),
    (media_player::TURN_ON, "turn_on"),
    (media_player::TURN_OFF, "turn_off"),
    (media_player::PLAY_MEDIA, "play_media"),
    (media_player::VOLUME_STEP, "volume_step"),
    (media_player::SELECT_SOURCE, "select_source"),
    (media_player::STOP, "stop"),
    (media_player::CLEAR_PLAYLIST, "clear_playlist"),
    (media_player::PLAY, "play"),
    (media_player::SHUFFLE_SET, "shuffle_set"),
    (media_player::SELECT_SOUND_MODE, "select_sound_mode"),
    (media_player::BROWSE_MEDIA, "browse_media"),
    (media_player::REPEAT_SET, "repeat_set"),
    (media_player::GROUPING, "grouping"),
];

macro_rules! descriptor {
    ($name:ident, $domain:expr, $primary:expr, $writable:expr, $attrs:expr, $features:expr) => {
        static $name: DomainDescriptor = DomainDescriptor {
            domain: $domain,
            primary: $primary,
            primary_writable: $writable,
            attributes: $attrs,
            features: $features,
        };
    };
}

descriptor!(BINARY_SENSOR, Domain::BinarySensor, Switch, false, &[], &[]);
descriptor!(BUTTON, Domain::Button, Text, true, &[], &[]);
descriptor!(
    CLIMATE,
    Domain::Climate,
    Number,
    true,
    &CLIMATE_ATTRIBUTES,
    &CLIMATE_FEATURES
);
descriptor!(COVER, Domain::Cover, Number, true, &COVER_ATTRIBUTES, &COVER_FEATURES);
descriptor!(EVENT, Domain::Event, SemanticType::Event, false, &[], &[]);
descriptor!(FAN, Domain::Fan, Switch, true, &FAN_ATTRIBUTES, &FAN_FEATURES);
descriptor!(
    HUMIDIFIER,
    Domain::Humidifier,
    Switch,
    true,
    &HUMIDIFIER_ATTRIBUTES,
    &HUMIDIFIER_FEATURES
);
descriptor!(LIGHT, Domain::Light, Switch, true, &LIGHT_ATTRIBUTES, &LIGHT_FEATURES);
descriptor!(LOCK, Domain::Lock, Enumeration, true, &LOCK_ATTRIBUTES, &LOCK_FEATURES);
descriptor!(
    MEDIA_PLAYER,
    Domain::MediaPlayer,
    Text,
    false,
    &MEDIA_PLAYER_ATTRIBUTES,
    &MEDIA_PLAYER_FEATURES
);
descriptor!(NUMBER, Domain::Number, Number, true, &[], &[]);
descriptor!(SELECT, Domain::Select, Enumeration, true, &[], &[]);
descriptor!(SENSOR, Domain::Sensor, Number, false, &[], &[]);
descriptor!(SWITCH, Domain::Switch, Switch, true, &[], &[]);
descriptor!(
    VACUUM,
    Domain::Vacuum,
    Enumeration,
    true,
    &VACUUM_ATTRIBUTES,
    &VACUUM_FEATURES
);

/// Look up the static descriptor of a domain
pub fn descriptor(domain: Domain) -> &'static DomainDescriptor {
    match domain {
        Domain::BinarySensor => &BINARY_SENSOR,
        Domain::Button => &BUTTON,
        Domain::Climate => &CLIMATE,
        Domain::Cover => &COVER,
        Domain::Event => &EVENT,
        Domain::Fan => &FAN,
        Domain::Humidifier => &HUMIDIFIER,
        Domain::Light => &LIGHT,
        Domain::Lock => &LOCK,
        Domain::MediaPlayer => &MEDIA_PLAYER,
        Domain::Number => &NUMBER,
        Domain::Select => &SELECT,
        Domain::Sensor => &SENSOR,
        Domain::Switch => &SWITCH,
        Domain::Vacuum => &VACUUM,
    }
}

/// Shorthand for `descriptor(domain).attribute(key)`
pub fn attribute(domain: Domain, key: &str) -> Option<&'static AttributeDescriptor> {
    descriptor(domain).attribute(key)
}
