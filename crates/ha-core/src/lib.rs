//! Core types for the Home Assistant bridge
//!
//! This crate provides the fundamental types shared by every other crate:
//! EntityId, Domain, the canonical Entity model, ServiceCall, the
//! supported-feature constants and the static domain registry.

pub mod domains;
pub mod features;
pub mod value;

mod domain;
mod entity;
mod entity_id;
mod service_call;

pub use domain::{Domain, UnknownDomain};
pub use entity::{Attributes, Entity};
pub use entity_id::{sanitize_identifier, slugify, EntityId, EntityIdError};
pub use service_call::ServiceCall;

/// State value for entities that exist but have not reported yet
pub const STATE_UNKNOWN: &str = "unknown";

/// State value reported when an entity is unreachable
pub const STATE_UNAVAILABLE: &str = "unavailable";
