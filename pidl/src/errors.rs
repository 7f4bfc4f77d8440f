//! Error types for the pidl orchestration engine.
//!
//! The taxonomy is closed: configuration mistakes surface as [`PidlError::Argument`]
//! or [`PidlError::Runtime`], context view lookups as [`PidlError::KeyNotFound`] and
//! [`PidlError::UnknownView`], plan validation as [`PidlError::UnreachableTasks`],
//! and wave execution failures as [`PidlError::TaskFailed`] /
//! [`PidlError::WaveFailed`]. User-supplied action failures ride in as
//! [`PidlError::Action`].

use thiserror::Error;

/// The main error type for pidl operations.
#[derive(Debug, Error)]
pub enum PidlError {
    /// Misconfiguration detected at construction time.
    #[error("{0}")]
    Argument(String),

    /// A mapping-typed context view has no entry for the requested key.
    #[error("key '{key}' not found in context view '{view}'")]
    KeyNotFound {
        /// The view that was queried.
        view: String,
        /// The missing key.
        key: String,
    },

    /// A context view that was never registered was accessed.
    #[error("no context view named '{name}' is registered")]
    UnknownView {
        /// The requested view name.
        name: String,
    },

    /// A runtime misuse: invalid error policy, unknown task, misconfigured
    /// skip condition, unknown custom action type.
    #[error("{0}")]
    Runtime(String),

    /// Plan validation failed: some tasks can never become ready because of
    /// missing prerequisites or dependency cycles.
    #[error("unreachable tasks in plan: {}", names.join(", "))]
    UnreachableTasks {
        /// The tasks whose prerequisites cannot be satisfied, in pipeline
        /// insertion order.
        names: Vec<String>,
    },

    /// A single task failed during a wave.
    #[error("task '{task}' failed: {source}")]
    TaskFailed {
        /// The failed task's name.
        task: String,
        /// The underlying error, unwrapped.
        #[source]
        source: Box<PidlError>,
    },

    /// Several tasks failed during the same wave.
    #[error("tasks failed in wave: {}", tasks.join(", "))]
    WaveFailed {
        /// The names of every task that failed, in wave order.
        tasks: Vec<String>,
    },

    /// A user-supplied action failed.
    #[error(transparent)]
    Action(#[from] anyhow::Error),
}

impl PidlError {
    /// Creates an [`PidlError::Argument`] error.
    #[must_use]
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Creates a [`PidlError::Runtime`] error.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Creates a [`PidlError::KeyNotFound`] error.
    #[must_use]
    pub fn key_not_found(view: impl Into<String>, key: impl Into<String>) -> Self {
        Self::KeyNotFound {
            view: view.into(),
            key: key.into(),
        }
    }

    /// Creates an [`PidlError::UnknownView`] error.
    #[must_use]
    pub fn unknown_view(name: impl Into<String>) -> Self {
        Self::UnknownView { name: name.into() }
    }
}
