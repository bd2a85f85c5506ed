//! The single-slot operation binding state machine.
//!
//! At most one operation is mirrored at a time. The binding and the
//! active flag change only through [`OperationTracker::set_operation`]
//! and [`OperationTracker::set_active`]; both return the lifecycle
//! events the change produced, and produce none for a no-op. This is
//! the only place that decides whether a schema push or a teardown
//! notice is due.

/// Opaque stable identifier of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A net change in what is being mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingEvent {
    /// The operation's schema and state should be pushed to clients.
    Bind(OperationId),
    /// The operation's UI should be torn down on clients.
    Unbind(OperationId),
}

/// Tracks which operation is bound and whether the mirror is active.
///
/// `active = false` with a binding still present means "linked but
/// hidden": no schema or state is pushed, but re-activating is cheap
/// and needs no re-selection.
#[derive(Debug, Default)]
pub struct OperationTracker {
    bound: Option<OperationId>,
    active: bool,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently bound operation, if any.
    pub fn bound(&self) -> Option<&OperationId> {
        self.bound.as_ref()
    }

    /// Whether the mirror is currently shown on clients.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bind to a new operation, or clear the binding with `None`.
    ///
    /// While active, switching from `x` to `y` emits `Unbind(x)`
    /// strictly before `Bind(y)` so stale UI is torn down in the same
    /// turn. Re-binding the already-bound operation is a no-op.
    pub fn set_operation(&mut self, op: Option<OperationId>) -> Vec<BindingEvent> {
        if self.bound == op {
            return Vec::new();
        }

        let previous = std::mem::replace(&mut self.bound, op);
        if !self.active {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(old) = previous {
            events.push(BindingEvent::Unbind(old));
        }
        if let Some(new) = &self.bound {
            events.push(BindingEvent::Bind(new.clone()));
        }
        events
    }

    /// Show or hide the mirror without touching the binding.
    pub fn set_active(&mut self, active: bool) -> Vec<BindingEvent> {
        if self.active == active {
            return Vec::new();
        }
        self.active = active;

        match &self.bound {
            Some(id) if active => vec![BindingEvent::Bind(id.clone())],
            Some(id) => vec![BindingEvent::Unbind(id.clone())],
            None => Vec::new(),
        }
    }
}
