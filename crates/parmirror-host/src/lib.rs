//! Host-side state for parmirror.
//!
//! The host owns the authoritative parameter state. This crate holds
//! the pieces that decide *what* to mirror and *when*:
//!
//! - [`OperationTracker`] — the single-slot bind/active state machine
//! - [`SyncEngine`] — turns tracker events, value-change batches and
//!   inbound client messages into outgoing protocol messages
//! - [`RelayLink`] — keeps a connection to the relay alive, replaying
//!   the current snapshot after every (re)connect
//!
//! Schema contents and value storage belong to external collaborators
//! behind the [`SchemaProvider`] and [`ValueStore`] traits.

pub mod engine;
pub mod error;
pub mod link;
pub mod provider;
pub mod tracker;

pub use engine::{Outbound, SyncEngine};
pub use error::{HostError, Result, SendFault};
pub use link::{LinkConfig, LinkHandle, LinkSender, RelayLink};
pub use provider::{MemoryOperation, ProviderError, SchemaProvider, ValueStore};
pub use tracker::{BindingEvent, OperationId, OperationTracker};
