//! The sync engine: tracker events in, protocol messages out.
//!
//! The engine is driven synchronously from the host's own event loop.
//! Nothing here blocks beyond the outbound send, and no failure here
//! is fatal: fetch failures unbind, apply failures skip the key, send
//! failures are logged and the next snapshot resynchronizes.

use std::collections::BTreeMap;

use parmirror_proto::{Message, ParamValue};
use tracing::{debug, info, trace, warn};

use crate::error::SendFault;
use crate::provider::{SchemaProvider, ValueStore};
use crate::tracker::{BindingEvent, OperationId, OperationTracker};

/// Where outgoing messages go. Implemented by the relay link; tests
/// substitute a recording sink.
pub trait Outbound {
    fn send(&mut self, msg: &Message) -> Result<(), SendFault>;
}

/// Host-side component constructing outgoing messages from tracker
/// lifecycle events, value-change batches and inbound client messages.
pub struct SyncEngine<P, V, O> {
    tracker: OperationTracker,
    provider: P,
    store: V,
    outbound: O,
}

impl<P: SchemaProvider, V: ValueStore, O: Outbound> SyncEngine<P, V, O> {
    pub fn new(provider: P, store: V, outbound: O) -> Self {
        Self {
            tracker: OperationTracker::new(),
            provider,
            store,
            outbound,
        }
    }

    /// The tracker state, read-only.
    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    /// Bind a new operation (or clear the binding) and emit whatever
    /// the resulting lifecycle events require.
    pub fn set_operation(&mut self, op: Option<OperationId>) {
        let events = self.tracker.set_operation(op);
        self.apply_events(events);
    }

    /// Show or hide the mirror.
    pub fn set_active(&mut self, active: bool) {
        let events = self.tracker.set_active(active);
        self.apply_events(events);
    }

    /// Replay the current snapshot, as after a reconnect or a
    /// `client_ready` handshake. No-op unless bound and active.
    pub fn resync(&mut self) {
        if let (true, Some(id)) = (self.tracker.is_active(), self.tracker.bound().cloned()) {
            self.push_schema(&id);
        }
    }

    /// Consume one value-change batch from the value watcher.
    ///
    /// Batches for a foreign or no-longer-bound operation, or arriving
    /// while hidden, are ignored. The batch coalesces last-write-wins
    /// into a single `parameter_update` to bound message volume under
    /// rapid manipulation.
    pub fn on_value_changes(&mut self, id: &OperationId, changes: &[(String, ParamValue)]) {
        if !self.tracker.is_active() || self.tracker.bound() != Some(id) {
            debug!(operation = %id, "ignoring value changes for unbound or hidden operation");
            return;
        }
        if changes.is_empty() {
            return;
        }

        let mut values = BTreeMap::new();
        for (name, value) in changes {
            values.insert(name.clone(), value.clone());
        }

        self.emit(&Message::ParameterUpdate {
            id: id.as_str().to_string(),
            values,
        });
    }

    /// Consume one inbound message from the relay connection.
    pub fn on_inbound(&mut self, msg: &Message) {
        match msg {
            Message::ParameterUpdate { id, values } => self.apply_update(id, values),
            Message::ClientReady => {
                info!("client attached, replaying snapshot");
                self.resync();
            }
            Message::Ping { payload } => {
                self.emit(&Message::pong_for(payload.clone()));
            }
            other => {
                trace!(kind = other.kind(), "dropping inbound message");
            }
        }
    }

    /// Apply an inbound edit to the value store.
    ///
    /// Only edits targeting the currently bound operation mutate
    /// anything; per-key failures never abort the remaining keys.
    fn apply_update(&mut self, id: &str, values: &BTreeMap<String, ParamValue>) {
        let bound = match self.tracker.bound() {
            Some(bound) if bound.as_str() == id => bound.clone(),
            _ => {
                debug!(operation = id, "ignoring parameter update for foreign operation");
                return;
            }
        };

        for (name, value) in values {
            if let Err(err) = self.store.set_value(&bound, name, value.clone()) {
                warn!(operation = %bound, parameter = %name, error = %err, "apply fault, key skipped");
            }
        }
    }

    fn apply_events(&mut self, events: Vec<BindingEvent>) {
        for event in events {
            match event {
                BindingEvent::Bind(id) => self.push_schema(&id),
                BindingEvent::Unbind(id) => {
                    self.emit(&Message::remove_window(id.as_str()));
                }
            }
        }
    }

    /// Fetch schema + full state and push an authoritative snapshot.
    ///
    /// A vanished operation is a tracking fault: logged, the binding
    /// cleared, nothing sent.
    fn push_schema(&mut self, id: &OperationId) {
        let snapshot = self.provider.title(id).and_then(|title| {
            let schema = self.provider.fetch_schema(id)?;
            let state = self.store.fetch_state(id)?;
            Ok((title, schema, state))
        });

        match snapshot {
            Ok((title, schema, state)) => {
                info!(operation = %id, "pushing schema");
                self.emit(&Message::SchemaUpdate {
                    id: id.as_str().to_string(),
                    title,
                    schema,
                    state,
                });
            }
            Err(err) => {
                // No snapshot was pushed, so no teardown notice goes
                // out: the binding is cleared off the event path.
                warn!(operation = %id, error = %err, "tracking fault, unbinding");
                let _ = self.tracker.set_operation(None);
            }
        }
    }

    /// Best-effort send. A failure is logged, never propagated; the
    /// next successful snapshot resynchronizes full state.
    fn emit(&mut self, msg: &Message) {
        if let Err(err) = self.outbound.send(msg) {
            warn!(kind = msg.kind(), error = %err, "outbound send failed, message dropped");
        }
    }
}
