//! Read-only named context views.

use crate::errors::PidlError;
use serde_json::Value;

/// A read-only auxiliary view registered on a [`Context`](super::Context)
/// at construction time.
///
/// A mapping option becomes a keyed view, a sequence or scalar option is
/// returned verbatim.
#[derive(Debug, Clone)]
pub enum ContextView {
    /// A mapping view with keyed lookup.
    Mapping(serde_json::Map<String, Value>),
    /// A sequence view, returned whole.
    Sequence(Vec<Value>),
    /// A scalar view, returned whole.
    Scalar(Value),
}

impl ContextView {
    /// Classifies an option value into a view.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Mapping(map),
            Value::Array(items) => Self::Sequence(items),
            other => Self::Scalar(other),
        }
    }

    /// Returns the whole view payload.
    #[must_use]
    pub fn as_value(&self) -> Value {
        match self {
            Self::Mapping(map) => Value::Object(map.clone()),
            Self::Sequence(items) => Value::Array(items.clone()),
            Self::Scalar(value) => value.clone(),
        }
    }

    /// Looks up `key` in a mapping view.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::KeyNotFound`] when the key is absent, and
    /// [`PidlError::Runtime`] when the view is not a mapping.
    pub fn get(&self, view_name: &str, key: &str) -> Result<Value, PidlError> {
        match self {
            Self::Mapping(map) => map
                .get(key)
                .cloned()
                .ok_or_else(|| PidlError::key_not_found(view_name, key)),
            Self::Sequence(_) | Self::Scalar(_) => Err(PidlError::runtime(format!(
                "context view '{view_name}' is not a mapping"
            ))),
        }
    }
}
