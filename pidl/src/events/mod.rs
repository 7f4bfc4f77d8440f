//! Pipeline lifecycle events and their fan-out.
//!
//! The event set is closed: pipeline, task and action start/end pairs, with
//! integer millisecond durations on the end events. Emission is synchronous
//! on the emitting thread; the pipeline dispatcher replays events captured
//! from concurrent tasks so its subscribers observe a single-threaded
//! stream.

mod emitter;

pub use emitter::{EventBuffer, EventEmitter, EventHandler};

use serde::Serialize;

/// An event emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PipelineEvent {
    /// The pipeline began running.
    PipelineStart {
        /// The pipeline name.
        name: String,
    },
    /// The pipeline finished without a propagating error.
    PipelineEnd {
        /// The pipeline name.
        name: String,
        /// Elapsed wall-clock time in whole milliseconds.
        duration_ms: u64,
    },
    /// A task began running.
    TaskStart {
        /// The task name.
        name: String,
    },
    /// A task finished without a propagating error.
    TaskEnd {
        /// The task name.
        name: String,
        /// Elapsed wall-clock time in whole milliseconds.
        duration_ms: u64,
    },
    /// An action began running.
    ActionStart {
        /// The action label, `"<TypeName>:<name>:<verb>"`.
        action: String,
    },
    /// An action finished successfully.
    ActionEnd {
        /// The action label, `"<TypeName>:<name>:<verb>"`.
        action: String,
        /// Elapsed wall-clock time in whole milliseconds.
        duration_ms: u64,
    },
}

/// Discriminant of a [`PipelineEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// `PipelineStart` events.
    PipelineStart,
    /// `PipelineEnd` events.
    PipelineEnd,
    /// `TaskStart` events.
    TaskStart,
    /// `TaskEnd` events.
    TaskEnd,
    /// `ActionStart` events.
    ActionStart,
    /// `ActionEnd` events.
    ActionEnd,
}

impl PipelineEvent {
    /// Creates a `PipelineStart` event.
    #[must_use]
    pub fn pipeline_start(name: impl Into<String>) -> Self {
        Self::PipelineStart { name: name.into() }
    }

    /// Creates a `PipelineEnd` event.
    #[must_use]
    pub fn pipeline_end(name: impl Into<String>, duration_ms: u64) -> Self {
        Self::PipelineEnd {
            name: name.into(),
            duration_ms,
        }
    }

    /// Creates a `TaskStart` event.
    #[must_use]
    pub fn task_start(name: impl Into<String>) -> Self {
        Self::TaskStart { name: name.into() }
    }

    /// Creates a `TaskEnd` event.
    #[must_use]
    pub fn task_end(name: impl Into<String>, duration_ms: u64) -> Self {
        Self::TaskEnd {
            name: name.into(),
            duration_ms,
        }
    }

    /// Creates an `ActionStart` event.
    #[must_use]
    pub fn action_start(action: impl Into<String>) -> Self {
        Self::ActionStart {
            action: action.into(),
        }
    }

    /// Creates an `ActionEnd` event.
    #[must_use]
    pub fn action_end(action: impl Into<String>, duration_ms: u64) -> Self {
        Self::ActionEnd {
            action: action.into(),
            duration_ms,
        }
    }

    /// Returns the event's kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PipelineStart { .. } => EventKind::PipelineStart,
            Self::PipelineEnd { .. } => EventKind::PipelineEnd,
            Self::TaskStart { .. } => EventKind::TaskStart,
            Self::TaskEnd { .. } => EventKind::TaskEnd,
            Self::ActionStart { .. } => EventKind::ActionStart,
            Self::ActionEnd { .. } => EventKind::ActionEnd,
        }
    }
}
