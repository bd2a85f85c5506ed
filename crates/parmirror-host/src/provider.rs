//! Collaborator seams: schema provider and value store.
//!
//! The sync engine never interprets schema contents and never detects
//! value changes itself; it fetches snapshots through these traits and
//! consumes a change feed produced elsewhere.

use std::collections::BTreeMap;

use parmirror_proto::{ParamValue, ValueKind};
use serde_json::Value;

use crate::tracker::OperationId;

/// Errors reported by schema/value-store collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The operation no longer exists.
    #[error("operation {0} not found")]
    NotFound(OperationId),

    /// The parameter name is not part of the operation.
    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),

    /// The value was refused by the store.
    #[error("value for {name:?} rejected: {reason}")]
    Rejected { name: String, reason: String },
}

/// Supplies the full parameter schema of an operation.
///
/// The schema document is opaque to the core; it is fetched and
/// transported, never inspected.
pub trait SchemaProvider {
    fn fetch_schema(&self, id: &OperationId) -> Result<Value, ProviderError>;

    fn title(&self, id: &OperationId) -> Result<String, ProviderError>;
}

/// Holds current parameter values and accepts edits.
pub trait ValueStore {
    fn fetch_state(&self, id: &OperationId) -> Result<BTreeMap<String, ParamValue>, ProviderError>;

    fn set_value(
        &mut self,
        id: &OperationId,
        name: &str,
        value: ParamValue,
    ) -> Result<(), ProviderError>;
}

/// An in-process operation backing both collaborator traits.
///
/// Each parameter has a declared [`ValueKind`]; `set_value` coerces
/// compatible incoming values and rejects the rest. Used by the demo
/// host command and tests — real deployments put their own adapters
/// behind the traits instead.
#[derive(Debug, Clone)]
pub struct MemoryOperation {
    id: OperationId,
    title: String,
    schema: Value,
    kinds: BTreeMap<String, ValueKind>,
    state: BTreeMap<String, ParamValue>,
}

impl MemoryOperation {
    /// Build from a schema document and an initial state. Declared
    /// kinds are taken from the initial values.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        schema: Value,
        state: BTreeMap<String, ParamValue>,
    ) -> Self {
        let kinds = state
            .iter()
            .map(|(name, value)| (name.clone(), value.kind()))
            .collect();
        Self {
            id: OperationId::new(id),
            title: title.into(),
            schema,
            kinds,
            state,
        }
    }

    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// Current value of one parameter.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.state.get(name)
    }

    fn check(&self, id: &OperationId) -> Result<(), ProviderError> {
        if *id == self.id {
            Ok(())
        } else {
            Err(ProviderError::NotFound(id.clone()))
        }
    }
}

impl SchemaProvider for MemoryOperation {
    fn fetch_schema(&self, id: &OperationId) -> Result<Value, ProviderError> {
        self.check(id)?;
        Ok(self.schema.clone())
    }

    fn title(&self, id: &OperationId) -> Result<String, ProviderError> {
        self.check(id)?;
        Ok(self.title.clone())
    }
}

impl ValueStore for MemoryOperation {
    fn fetch_state(&self, id: &OperationId) -> Result<BTreeMap<String, ParamValue>, ProviderError> {
        self.check(id)?;
        Ok(self.state.clone())
    }

    fn set_value(
        &mut self,
        id: &OperationId,
        name: &str,
        value: ParamValue,
    ) -> Result<(), ProviderError> {
        self.check(id)?;
        let kind = *self
            .kinds
            .get(name)
            .ok_or_else(|| ProviderError::UnknownParameter(name.to_string()))?;

        let coerced = value.coerce(kind).ok_or_else(|| ProviderError::Rejected {
            name: name.to_string(),
            reason: format!("cannot coerce {} to {}", value.kind(), kind),
        })?;

        self.state.insert(name.to_string(), coerced);
        Ok(())
    }
}
