//! Payload decoding
//!
//! The transport carries both bare scalar states (`on`, `42.5`) and JSON
//! envelopes (`{"state": "on", "attributes": {...}}`). Decoding never fails:
//! anything that is not a usable JSON envelope is taken as a raw state.

use ha_core::{value, Attributes};
use serde_json::Value;
use tracing::trace;

/// Result of decoding one inbound payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPayload {
    /// New state, empty for attribute-only updates
    pub state: String,
    pub attributes: Attributes,
}

impl DecodedPayload {
    pub fn raw(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: Attributes::new(),
        }
    }

    /// True when the update carries neither state nor attributes
    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.attributes.is_empty()
    }
}

/// Decode a state-topic payload into a state string and attributes
pub fn decode_payload(raw: &[u8]) -> DecodedPayload {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();

    if !trimmed.starts_with(['{', '[', '"']) {
        return DecodedPayload::raw(trimmed);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(mut map)) => {
            let attributes = match map.remove("attributes") {
                Some(Value::Object(attrs)) => attrs.into_iter().collect(),
                Some(other) if map.contains_key("state") => {
                    trace!(attributes = %other, "Ignoring non-object attributes");
                    Attributes::new()
                }
                Some(other) => {
                    // No envelope: the whole object is an attribute map
                    map.insert("attributes".to_string(), other);
                    Attributes::new()
                }
                None => Attributes::new(),
            };

            match map.remove("state") {
                Some(state) => DecodedPayload {
                    state: value::as_text(&state),
                    attributes,
                },
                None => {
                    let mut attributes = attributes;
                    attributes.extend(map);
                    DecodedPayload {
                        state: String::new(),
                        attributes,
                    }
                }
            }
        }
        Ok(_) => DecodedPayload::raw(trimmed),
        Err(e) => {
            trace!(error = %e, "Payload is not JSON, using it as raw state");
            DecodedPayload::raw(trimmed)
        }
    }
}

/// Decode the payload of an attribute topic into an attribute-only update
///
/// The value is kept as JSON when it parses, otherwise as the raw string.
pub fn decode_attribute(name: &str, raw: &[u8]) -> DecodedPayload {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    let value = serde_json::from_str::<Value>(trimmed)
        .unwrap_or_else(|_| Value::String(trimmed.to_string()));

    DecodedPayload {
        state: String::new(),
        attributes: Attributes::from([(name.to_string(), value)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_bare_number() {
        let decoded = decode_payload(b"42.5");
        assert_eq!(decoded.state, "42.5");
        assert!(decoded.attributes.is_empty());
    }

    #[test]
    fn test_decode_envelope() {
        let decoded = decode_payload(br#"{"state":"on","attributes":{"brightness":10}}"#);
        assert_eq!(decoded.state, "on");
        assert_eq!(decoded.attributes.len(), 1);
        assert_eq!(decoded.attributes["brightness"], json!(10));
    }

    #[test]
    fn test_decode_invalid_json_is_raw_state() {
        let decoded = decode_payload(b"not json {");
        assert_eq!(decoded.state, "not json {");
        assert!(decoded.attributes.is_empty());

        let decoded = decode_payload(b"{broken");
        assert_eq!(decoded.state, "{broken");
    }

    #[test]
    fn test_decode_trims_whitespace() {
        assert_eq!(decode_payload(b"  ON \n").state, "ON");
    }

    #[test]
    fn test_decode_json_string_literal_keeps_raw_text() {
        let decoded = decode_payload(br#" "heat" "#);
        assert_eq!(decoded.state, r#""heat""#);
        assert!(decoded.attributes.is_empty());
    }

    #[test]
    fn test_decode_scalar_state_in_envelope() {
        let decoded = decode_payload(br#"{"state": 21.5}"#);
        assert_eq!(decoded.state, "21.5");
    }

    #[test]
    fn test_decode_array_is_raw_state() {
        let decoded = decode_payload(b"[1, 2]");
        assert_eq!(decoded.state, "[1, 2]");
        assert!(decoded.attributes.is_empty());
    }

    #[test]
    fn test_decode_object_without_state_is_attribute_update() {
        let decoded = decode_payload(br#"{"current_position": 40, "current_tilt_position": 10}"#);
        assert_eq!(decoded.state, "");
        assert_eq!(decoded.attributes["current_position"], json!(40));
        assert_eq!(decoded.attributes["current_tilt_position"], json!(10));
    }

    #[test]
    fn test_decode_lossy_utf8() {
        let decoded = decode_payload(&[b'o', 0xff, b'n']);
        assert_eq!(decoded.state, "o\u{fffd}n");
    }

    #[test]
    fn test_decode_attribute() {
        let decoded = decode_attribute("brightness", b"128");
        assert_eq!(decoded.state, "");
        assert_eq!(decoded.attributes["brightness"], json!(128));

        let decoded = decode_attribute("effect", b"rainbow");
        assert_eq!(decoded.attributes["effect"], json!("rainbow"));

        let decoded = decode_attribute("rgb_color", b"[255, 0, 0]");
        assert_eq!(decoded.attributes["rgb_color"], json!([255, 0, 0]));
    }
}
