//! Closure-backed and no-op actions.

use super::{Action, ActionCore};
use crate::condition::{ConditionFn, ConditionValue};
use crate::context::Context;
use crate::errors::PidlError;
use crate::promise::Promise;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

type RunFn = Box<dyn Fn(&Context) -> Result<(), PidlError> + Send + Sync>;

/// An action backed by a closure.
///
/// Covers the common case where the work fits in a function of the shared
/// context; implement [`Action`] directly for work that needs to await.
pub struct FnAction {
    core: ActionCore,
    type_name: String,
    run_fn: RunFn,
}

impl FnAction {
    /// Starts building an action with the given name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FnActionBuilder {
        FnActionBuilder::new(name)
    }

    /// Creates an action from a name and a closure, with default policy and
    /// verb.
    pub fn new<F>(name: impl Into<String>, run_fn: F) -> Self
    where
        F: Fn(&Context) -> Result<(), PidlError> + Send + Sync + 'static,
    {
        Self::builder(name).run_fn(run_fn).build()
    }

    /// Returns the action's core configuration.
    #[must_use]
    pub fn core(&self) -> &ActionCore {
        &self.core
    }
}

impl std::fmt::Debug for FnAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction")
            .field("name", &self.core.name())
            .field("type_name", &self.type_name)
            .field("verb", &self.core.verb())
            .finish()
    }
}

#[async_trait]
impl Action for FnAction {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn verb(&self) -> &str {
        self.core.verb()
    }

    fn should_skip(&self) -> Result<bool, PidlError> {
        self.core.should_skip()
    }

    fn raise_on_error(&self) -> bool {
        self.core.raise_on_error()
    }

    fn exit_on_error(&self) -> bool {
        self.core.exit_on_error()
    }

    fn exit_code(&self) -> i32 {
        self.core.exit_code()
    }

    async fn run(&self, context: &Context) -> Result<(), PidlError> {
        (self.run_fn)(context)
    }
}

/// Builder for [`FnAction`].
pub struct FnActionBuilder {
    core: ActionCore,
    type_name: String,
    run_fn: Option<RunFn>,
}

impl FnActionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            core: ActionCore::new(name, "execute"),
            type_name: "FnAction".to_string(),
            run_fn: None,
        }
    }

    /// Sets the action verb (default `execute`).
    #[must_use]
    pub fn verb(mut self, verb: impl Into<String>) -> Self {
        self.core.set_verb(verb);
        self
    }

    /// Sets the type name used in the action label (default `FnAction`).
    #[must_use]
    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Sets the work closure. Unset, the action is a no-op.
    #[must_use]
    pub fn run_fn<F>(mut self, run_fn: F) -> Self
    where
        F: Fn(&Context) -> Result<(), PidlError> + Send + Sync + 'static,
    {
        self.run_fn = Some(Box::new(run_fn));
        self
    }

    /// Configures the error policy by name with an optional exit code.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] for an invalid policy name.
    pub fn on_error(mut self, policy: &str, code: Option<&Value>) -> Result<Self, PidlError> {
        self.core.on_error(policy, code)?;
        Ok(self)
    }

    /// Configures the skip condition.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] when both sources are supplied.
    pub fn only_if(
        mut self,
        value: Option<ConditionValue>,
        thunk: Option<ConditionFn>,
        context: &Arc<Context>,
    ) -> Result<Self, PidlError> {
        self.core.only_if(value, thunk, context)?;
        Ok(self)
    }

    /// Binds an attribute to a promise.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: Promise) -> Self {
        self.core.set_attr(name, value);
        self
    }

    /// Finishes the build.
    #[must_use]
    pub fn build(self) -> FnAction {
        FnAction {
            core: self.core,
            type_name: self.type_name,
            run_fn: self.run_fn.unwrap_or_else(|| Box::new(|_ctx| Ok(()))),
        }
    }
}

/// An action that does nothing; useful for wiring and tests.
#[derive(Debug, Clone)]
pub struct NoOpAction {
    name: String,
}

impl NoOpAction {
    /// Creates a no-op action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Action for NoOpAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "NoOpAction"
    }

    fn verb(&self) -> &str {
        "execute"
    }

    async fn run(&self, _context: &Context) -> Result<(), PidlError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_action_runs_against_context() {
        let action = FnAction::new("mark", |ctx| {
            ctx.set("ran", true);
            Ok(())
        });

        let ctx = Context::new();
        action.run(&ctx).await.unwrap();
        assert_eq!(ctx.get("ran"), json!(true));
    }

    #[test]
    fn test_label_form() {
        let action = FnAction::builder("load")
            .type_name("DbAction")
            .verb("insert")
            .build();
        assert_eq!(action.label(), "DbAction:load:insert");
    }

    #[test]
    fn test_default_describe_is_label() {
        let action = FnAction::builder("load").build();
        assert_eq!(action.describe(), "FnAction:load:execute");
    }

    #[test]
    fn test_on_error_configures_policy() {
        let action = FnAction::builder("load")
            .on_error("exit", Some(&json!(7)))
            .unwrap()
            .build();

        assert!(action.exit_on_error());
        assert_eq!(action.exit_code(), 7);
    }

    #[test]
    fn test_on_error_rejects_bad_policy() {
        let result = FnAction::builder("load").on_error("abort", None);
        assert!(matches!(result, Err(PidlError::Runtime(_))));
    }

    #[test]
    fn test_only_if_false_value_skips() {
        let ctx = Arc::new(Context::new());
        let action = FnAction::builder("load")
            .only_if(Some(ConditionValue::value(false)), None, &ctx)
            .unwrap()
            .build();

        assert!(action.should_skip().unwrap());
    }

    #[tokio::test]
    async fn test_noop_action() {
        let action = NoOpAction::new("idle");
        assert_eq!(action.label(), "NoOpAction:idle:execute");
        assert!(!action.should_skip().unwrap());

        let ctx = Context::new();
        action.run(&ctx).await.unwrap();
    }
}
