//! Pipeline configuration options.

use crate::actions::{ActionFactory, ActionRegistry};
use crate::errors::PidlError;
use serde_json::Value;

/// Recognized pipeline options.
///
/// `concurrency` caps the number of tasks per wave; 0 means unbounded.
/// `skip` names tasks that are planned but never run. `single_thread`
/// forces serial wave execution regardless of wave size. `actions` is the
/// custom action factory registry injected into every task.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Always run each wave serially.
    pub single_thread: bool,
    /// Tasks that are never run.
    pub skip: Vec<String>,
    /// Maximum concurrent tasks per wave; 0 means unbounded.
    pub concurrency: usize,
    /// Custom action factories injected into every task.
    pub actions: ActionRegistry,
}

impl PipelineOptions {
    /// Creates default options: multi-threaded, unbounded, nothing skipped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces serial wave execution.
    #[must_use]
    pub fn with_single_thread(mut self, single_thread: bool) -> Self {
        self.single_thread = single_thread;
        self
    }

    /// Names tasks that are never run.
    #[must_use]
    pub fn with_skip<I, S>(mut self, skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip = skip.into_iter().map(Into::into).collect();
        self
    }

    /// Caps concurrent tasks per wave; 0 means unbounded.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Replaces the custom action registry.
    #[must_use]
    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Registers a single custom action factory.
    pub fn register_action(&mut self, type_name: impl Into<String>, factory: ActionFactory) {
        self.actions.register(type_name, factory);
    }

    /// Parses options from a JSON mapping; unrecognized keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Argument`] when the value is not a mapping or a
    /// recognized key has the wrong shape (in particular, `concurrency`
    /// must be a non-negative integer).
    pub fn from_value(value: &Value) -> Result<Self, PidlError> {
        let Some(map) = value.as_object() else {
            return Err(PidlError::argument("pipeline options must be a mapping"));
        };

        let mut options = Self::default();

        if let Some(single_thread) = map.get("single_thread") {
            options.single_thread = single_thread
                .as_bool()
                .ok_or_else(|| PidlError::argument("single_thread must be a boolean"))?;
        }

        if let Some(concurrency) = map.get("concurrency") {
            let cap = concurrency.as_u64().ok_or_else(|| {
                PidlError::argument("concurrency must be a non-negative integer")
            })?;
            options.concurrency = usize::try_from(cap)
                .map_err(|_| PidlError::argument("concurrency is out of range"))?;
        }

        if let Some(skip) = map.get("skip") {
            let names = skip
                .as_array()
                .ok_or_else(|| PidlError::argument("skip must be a sequence of task names"))?;
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| PidlError::argument("skip entries must be strings"))?;
                options.skip.push(name.to_string());
            }
        }

        Ok(options)
    }
}
