//! Conditional skipping via `only_if` predicates.
//!
//! Any configurable entity (action, task, pipeline) may carry exactly one
//! skip condition. The entity is skipped iff a condition is configured and
//! its forced value is falsey; a missing condition never skips.

use crate::context::Context;
use crate::errors::PidlError;
use crate::promise::Promise;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// An infallible deferred evaluator for a condition.
pub type ConditionFn = Box<dyn Fn() -> Value + Send + Sync>;

/// Declarative value source for an `only_if` condition.
#[derive(Debug, Clone)]
pub enum ConditionValue {
    /// A context key: met iff the key is set and its value is truthy.
    Key(String),
    /// A raw value checked for truthiness.
    Value(Value),
}

impl ConditionValue {
    /// Shorthand for a context-key source.
    #[must_use]
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    /// Shorthand for a raw-value source.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }
}

/// Ruby-style truthiness: null and `false` are falsey, everything else is
/// truthy (including `0` and `""`).
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// A configured skip predicate backed by a lazily evaluated [`Promise`].
#[derive(Debug)]
pub struct Condition {
    predicate: Promise,
}

impl Condition {
    /// A condition over a raw value.
    #[must_use]
    pub fn from_value(value: impl Into<Value>) -> Self {
        Self {
            predicate: Promise::from_value(value),
        }
    }

    /// A condition over a context key: met iff the key is set and truthy.
    #[must_use]
    pub fn from_key(key: impl Into<String>, context: Arc<Context>) -> Self {
        let key = key.into();
        Self {
            predicate: Promise::from_fn(move || {
                Value::Bool(context.is_set(&key) && truthy(&context.get(&key)))
            }),
        }
    }

    /// A condition over a deferred evaluator.
    pub fn from_fn(thunk: ConditionFn) -> Self {
        Self {
            predicate: Promise::from_fn(move || thunk()),
        }
    }

    /// Forces the predicate and reports whether it is met.
    ///
    /// # Errors
    ///
    /// Propagates predicate evaluation errors.
    pub fn is_met(&self) -> Result<bool, PidlError> {
        Ok(truthy(&self.predicate.value()?))
    }
}

/// Resolves an `only_if` configuration call into an optional condition.
///
/// Both sources supplied is a configuration error; neither logs a warning
/// and leaves the condition unset.
pub(crate) fn build_condition(
    value: Option<ConditionValue>,
    thunk: Option<ConditionFn>,
    context: &Arc<Context>,
) -> Result<Option<Condition>, PidlError> {
    match (value, thunk) {
        (Some(_), Some(_)) => Err(PidlError::runtime(
            "only_if accepts either a value or a block, not both",
        )),
        (None, None) => {
            warn!("only_if called without a value or block; skip condition left unset");
            Ok(None)
        }
        (Some(ConditionValue::Key(key)), None) => {
            Ok(Some(Condition::from_key(key, Arc::clone(context))))
        }
        (Some(ConditionValue::Value(value)), None) => Ok(Some(Condition::from_value(value))),
        (None, Some(thunk)) => Ok(Some(Condition::from_fn(thunk))),
    }
}

/// Returns true iff a condition is configured and evaluates falsey.
pub(crate) fn skip_requested(condition: Option<&Condition>) -> Result<bool, PidlError> {
    match condition {
        None => Ok(false),
        Some(condition) => Ok(!condition.is_met()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(0)));
        assert!(truthy(&json!("")));
        assert!(truthy(&json!([])));
    }

    #[test]
    fn test_missing_condition_never_skips() {
        assert!(!skip_requested(None).unwrap());
    }

    #[test]
    fn test_true_condition_does_not_skip() {
        let condition = Condition::from_value(true);
        assert!(!skip_requested(Some(&condition)).unwrap());
    }

    #[test]
    fn test_false_condition_skips() {
        let condition = Condition::from_value(false);
        assert!(skip_requested(Some(&condition)).unwrap());
    }

    #[test]
    fn test_key_condition_requires_set_and_truthy() {
        let ctx = Arc::new(Context::new());

        let unset = Condition::from_key("flag", Arc::clone(&ctx));
        assert!(!unset.is_met().unwrap());

        ctx.set("flag", false);
        let falsey = Condition::from_key("flag", Arc::clone(&ctx));
        assert!(!falsey.is_met().unwrap());

        ctx.set("flag", "yes");
        let set = Condition::from_key("flag", Arc::clone(&ctx));
        assert!(set.is_met().unwrap());
    }

    #[test]
    fn test_build_condition_rejects_both_sources() {
        let ctx = Arc::new(Context::new());
        let thunk: ConditionFn = Box::new(|| json!(true));
        let result = build_condition(Some(ConditionValue::value(true)), Some(thunk), &ctx);
        assert!(matches!(result, Err(PidlError::Runtime(_))));
    }

    #[test]
    fn test_build_condition_without_sources_is_noop() {
        let ctx = Arc::new(Context::new());
        let condition = build_condition(None, None, &ctx).unwrap();
        assert!(condition.is_none());
    }

    #[test]
    fn test_thunk_condition_is_lazy() {
        let ctx = Arc::new(Context::new());
        let seen = Arc::clone(&ctx);
        let thunk: ConditionFn = Box::new(move || seen.get("gate"));
        let condition = build_condition(None, Some(thunk), &ctx).unwrap().unwrap();

        ctx.set("gate", true);
        assert!(condition.is_met().unwrap());
    }
}
