//! Supported-feature bit constants
//!
//! Values match the `*EntityFeature` flags Home Assistant publishes in the
//! `supported_features` attribute.

/// Check whether `bit` is set in a feature bitmask
pub fn has(features: u32, bit: u32) -> bool {
    features & bit != 0
}

pub mod light {
    /// Legacy flags, still sent by older integrations
    pub const SUPPORT_BRIGHTNESS: u32 = 1;
    pub const SUPPORT_COLOR_TEMP: u32 = 2;
    pub const EFFECT: u32 = 4;
    pub const FLASH: u32 = 8;
    pub const SUPPORT_COLOR: u32 = 16;
    pub const TRANSITION: u32 = 32;
}

pub mod climate {
    pub const TARGET_TEMPERATURE: u32 = 1;
    pub const TARGET_TEMPERATURE_RANGE: u32 = 2;
    pub const TARGET_HUMIDITY: u32 = 4;
    pub const FAN_MODE: u32 = 8;
    pub const PRESET_MODE: u32 = 16;
    pub const SWING_MODE: u32 = 32;
    pub const AUX_HEAT: u32 = 64;
    pub const TURN_OFF: u32 = 128;
    pub const TURN_ON: u32 = 256;
}

pub mod cover {
    pub const OPEN: u32 = 1;
    pub const CLOSE: u32 = 2;
    pub const SET_POSITION: u32 = 4;
    pub const STOP: u32 = 8;
    pub const OPEN_TILT: u32 = 16;
    pub const CLOSE_TILT: u32 = 32;
    pub const STOP_TILT: u32 = 64;
    pub const SET_TILT_POSITION: u32 = 128;
}

pub mod lock {
    pub const OPEN: u32 = 1;
}

pub mod vacuum {
    pub const TURN_ON: u32 = 1;
    pub const TURN_OFF: u32 = 2;
    pub const PAUSE: u32 = 4;
    pub const STOP: u32 = 8;
    pub const RETURN_HOME: u32 = 16;
    pub const FAN_SPEED: u32 = 32;
    pub const BATTERY: u32 = 64;
    pub const STATUS: u32 = 128;
    pub const SEND_COMMAND: u32 = 256;
    pub const LOCATE: u32 = 512;
    pub const CLEAN_SPOT: u32 = 1024;
    pub const MAP: u32 = 2048;
    pub const STATE: u32 = 4096;
    pub const START: u32 = 8192;
}

pub mod fan {
    pub const SET_SPEED: u32 = 1;
    pub const OSCILLATE: u32 = 2;
    pub const DIRECTION: u32 = 4;
    pub const PRESET_MODE: u32 = 8;
    pub const TURN_OFF: u32 = 16;
    pub const TURN_ON: u32 = 32;
}

pub mod humidifier {
    pub const MODES: u32 = 1;
}

pub mod media_player {
    pub const PAUSE: u32 = 1;
    pub const SEEK: u32 = 2;
    pub const VOLUME_SET: u32 = 4;
    pub const VOLUME_MUTE: u32 = 8;
    pub const PREVIOUS_TRACK: u32 = 16;
    pub const NEXT_TRACK: u32 = 32;
    pub const TURN_ON: u32 = 128;
    pub const TURN_OFF: u32 = 256;
    pub const PLAY_MEDIA: u32 = 512;
    pub const VOLUME_STEP: u32 = 1024;
    pub const SELECT_SOURCE: u32 = 2048;
    pub const STOP: u32 = 4096;
    pub const CLEAR_PLAYLIST: u32 = 8192;
    pub const PLAY: u32 = 16384;
    pub const SHUFFLE_SET: u32 = 32768;
    pub const SELECT_SOUND_MODE: u32 = 65536;
    pub const BROWSE_MEDIA: u32 = 131072;
    pub const REPEAT_SET: u32 = 262144;
    pub const GROUPING: u32 = 524288;
}
