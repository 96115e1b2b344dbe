//! Entity/domain translation engine
//!
//! Mirrors Home Assistant entities into a host application's typed slots and
//! turns slot writes back into commands. Inbound `{topic, payload}` messages
//! are decoded, merged into the entity store, reduced per domain and
//! published into slots; writes are validated against the entity's
//! capabilities and leave through a [`Publisher`] or a [`RemoteCaller`].
//!
//! # Example
//!
//! ```ignore
//! use ha_bridge::{Bridge, MemorySlotStore};
//! use ha_state_store::AttributeCache;
//!
//! let mut bridge = Bridge::new(MemorySlotStore::new(), AttributeCache::in_memory());
//! bridge.apply_config(&config);
//! bridge.handle_message("homeassistant/light/kitchen/state", b"ON");
//! ```

pub mod acks;
pub mod command;
pub mod diagnostics;
mod engine;
pub mod presentation;
pub mod reducers;
pub mod slots;
pub mod transport;

pub use acks::{PendingAck, PendingAcks};
pub use command::{build_command, Command, CommandError, CommandResult};
pub use diagnostics::{DiagnosticEntry, DiagnosticKind, Diagnostics};
pub use engine::{secondary_identifier, Bridge, WriteError};
pub use presentation::{EnumOption, Presentation, PresentationKind, SlotTarget};
pub use reducers::{reduce, Reduction};
pub use slots::{MemorySlotStore, Slot, SlotDeclaration, SlotStore};
pub use transport::{
    Method, PublishError, Publisher, RemoteCaller, RemoteError, RemoteRequest, RemoteResponse,
};
