//! Actions: the units of work inside a task.
//!
//! The core consumes actions only through the [`Action`] trait: a named unit
//! of work with an error policy, a skip predicate and an async `run`.
//! Concrete work (database, filesystem, HTTP, ...) is user-supplied;
//! [`FnAction`] wraps a closure for the common case and [`ActionCore`]
//! carries the shared configuration state for custom action types.

mod core;
mod fn_action;
mod policy;
mod registry;

pub use self::core::ActionCore;
pub use fn_action::{FnAction, FnActionBuilder, NoOpAction};
pub use policy::{normalize_exit_code, ErrorPolicy};
pub use registry::{ActionFactory, ActionRegistry};

use crate::context::Context;
use crate::errors::PidlError;
use async_trait::async_trait;

/// A named unit of work with an error policy and a skip predicate.
///
/// Implementations must be cheap to share across threads; a task runs its
/// actions strictly sequentially in insertion order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Action: Send + Sync {
    /// The action's configured name.
    fn name(&self) -> &str;

    /// The action type's name, the first segment of [`Action::label`].
    fn type_name(&self) -> &str;

    /// The action's verb, the last segment of [`Action::label`].
    fn verb(&self) -> &str;

    /// Evaluates the skip predicate. Actions without one never skip.
    ///
    /// # Errors
    ///
    /// Propagates predicate evaluation errors; these are not filtered by
    /// the error policy.
    fn should_skip(&self) -> Result<bool, PidlError> {
        Ok(false)
    }

    /// True iff a failure re-raises out of the task.
    fn raise_on_error(&self) -> bool {
        true
    }

    /// True iff a failure flags the task for exit. Both this and
    /// [`Action::raise_on_error`] false means the failure is logged and the
    /// task continues.
    fn exit_on_error(&self) -> bool {
        false
    }

    /// The exit code recorded when an exit-policy failure occurs.
    fn exit_code(&self) -> i32 {
        0
    }

    /// Validates configuration when the action is added to a task.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid action.
    fn validate(&self) -> Result<(), PidlError> {
        Ok(())
    }

    /// The action's string form, `"<TypeName>:<name>:<verb>"`.
    fn label(&self) -> String {
        format!("{}:{}:{}", self.type_name(), self.name(), self.verb())
    }

    /// A one-line description for dry runs.
    fn describe(&self) -> String {
        self.label()
    }

    /// Performs the work.
    ///
    /// # Errors
    ///
    /// Failures are filtered through the action's error policy by the
    /// owning task.
    async fn run(&self, context: &Context) -> Result<(), PidlError>;
}
