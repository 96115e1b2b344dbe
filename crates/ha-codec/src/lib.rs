//! Topic and payload codec
//!
//! Pure functions translating the raw pub/sub representation into the
//! bridge's vocabulary:
//!
//! - [`parse_topic`] splits `<base>/<domain>/<name>/<suffix>` topics
//! - [`decode_payload`] turns a state payload into a state string plus
//!   attributes, accepting both bare scalars and JSON envelopes
//! - [`decode_attribute`] handles payloads of per-attribute topics

mod payload;
mod topic;

pub use payload::{decode_attribute, decode_payload, DecodedPayload};
pub use topic::{parse_topic, set_topic, TopicError, TopicParts, TopicSuffix};
