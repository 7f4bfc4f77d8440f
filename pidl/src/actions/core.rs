//! Shared configuration state for action types.

use super::policy::{normalize_exit_code, ErrorPolicy};
use crate::condition::{build_condition, skip_requested, Condition, ConditionFn, ConditionValue};
use crate::context::Context;
use crate::errors::PidlError;
use crate::promise::Promise;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Common action state: name, verb, error policy, skip condition and the
/// attributes map.
///
/// Custom action types embed an `ActionCore` and delegate the corresponding
/// [`Action`](super::Action) methods to it. Attributes hold [`Promise`]
/// values, so an attribute bound to a context key or a thunk is resolved
/// only when the action reads it during `run`.
#[derive(Debug)]
pub struct ActionCore {
    name: String,
    verb: String,
    policy: ErrorPolicy,
    exit_code: i32,
    condition: Option<Condition>,
    attributes: HashMap<String, Promise>,
}

impl ActionCore {
    /// Creates action state with the default raise policy.
    #[must_use]
    pub fn new(name: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verb: verb.into(),
            policy: ErrorPolicy::default(),
            exit_code: 0,
            condition: None,
            attributes: HashMap::new(),
        }
    }

    /// The action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The action verb.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Replaces the action verb.
    pub fn set_verb(&mut self, verb: impl Into<String>) {
        self.verb = verb.into();
    }

    /// The configured error policy.
    #[must_use]
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// True iff failures re-raise.
    #[must_use]
    pub fn raise_on_error(&self) -> bool {
        self.policy == ErrorPolicy::Raise
    }

    /// True iff failures flag the task for exit.
    #[must_use]
    pub fn exit_on_error(&self) -> bool {
        self.policy == ErrorPolicy::Exit
    }

    /// The exit code recorded under the exit policy.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Configures the error policy by name, with an optional exit code.
    ///
    /// The code defaults to 0 and is only meaningful under the exit policy.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] for an invalid policy name.
    pub fn on_error(&mut self, policy: &str, code: Option<&Value>) -> Result<(), PidlError> {
        self.policy = ErrorPolicy::parse(policy)?;
        self.exit_code = code.map_or(0, normalize_exit_code);
        Ok(())
    }

    /// Configures the skip condition from a value source or a thunk.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] when both sources are supplied.
    pub fn only_if(
        &mut self,
        value: Option<ConditionValue>,
        thunk: Option<ConditionFn>,
        context: &Arc<Context>,
    ) -> Result<(), PidlError> {
        if let Some(condition) = build_condition(value, thunk, context)? {
            self.condition = Some(condition);
        }
        Ok(())
    }

    /// Evaluates the skip condition.
    ///
    /// # Errors
    ///
    /// Propagates predicate evaluation errors.
    pub fn should_skip(&self) -> Result<bool, PidlError> {
        skip_requested(self.condition.as_ref())
    }

    /// Binds an attribute to a promise.
    pub fn set_attr(&mut self, name: impl Into<String>, value: Promise) {
        self.attributes.insert(name.into(), value);
    }

    /// Returns an attribute's promise, if bound.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Promise> {
        self.attributes.get(name)
    }

    /// Forces an attribute's value; unbound attributes read as null.
    ///
    /// # Errors
    ///
    /// Propagates forcing errors.
    pub fn attr_value(&self, name: &str) -> Result<Value, PidlError> {
        self.attributes
            .get(name)
            .map_or(Ok(Value::Null), Promise::value)
    }

    /// Returns the bound attribute names.
    #[must_use]
    pub fn attr_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }
}
