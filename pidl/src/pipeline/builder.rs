//! Validating pipeline builder.

use super::exec::Pipeline;
use super::options::PipelineOptions;
use crate::condition::{build_condition, Condition, ConditionFn, ConditionValue};
use crate::context::{Context, JOB_NAME_KEY, RUN_DATE_KEY};
use crate::errors::PidlError;
use crate::events::EventEmitter;
use crate::task::{Task, TaskBuilder};
use crate::utils::iso_timestamp;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the cleanup task configured via [`PipelineBuilder::on_error`].
pub(crate) const ERROR_HANDLER_NAME: &str = "error_handler";

/// Builder for [`Pipeline`].
///
/// Set [`PipelineBuilder::options`] before registering tasks so the custom
/// action registry reaches the task builders.
pub struct PipelineBuilder {
    name: String,
    context: Arc<Context>,
    options: PipelineOptions,
    tasks: HashMap<String, Arc<Task>>,
    task_order: Vec<String>,
    error_handler: Option<Arc<Task>>,
    condition: Option<Condition>,
}

impl PipelineBuilder {
    /// Starts building a pipeline over the given shared context.
    #[must_use]
    pub fn new(name: impl Into<String>, context: Arc<Context>) -> Self {
        Self {
            name: name.into(),
            context,
            options: PipelineOptions::default(),
            tasks: HashMap::new(),
            task_order: Vec::new(),
            error_handler: None,
            condition: None,
        }
    }

    /// Applies pipeline options.
    #[must_use]
    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// The shared context, for building key-bound conditions and promises.
    #[must_use]
    pub fn context(&self) -> Arc<Context> {
        Arc::clone(&self.context)
    }

    /// Registers a task configured through the given closure.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Argument`] for a duplicate task name and
    /// propagates configuration errors from the closure.
    pub fn task<F>(mut self, name: impl Into<String>, configure: F) -> Result<Self, PidlError>
    where
        F: FnOnce(TaskBuilder) -> Result<TaskBuilder, PidlError>,
    {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(PidlError::argument(format!(
                "duplicate task name '{name}'"
            )));
        }

        let builder = TaskBuilder::new(
            name.clone(),
            Arc::clone(&self.context),
            self.options.actions.clone(),
        );
        let task = configure(builder)?.build();

        self.task_order.push(name.clone());
        self.tasks.insert(name, Arc::new(task));
        Ok(self)
    }

    /// Configures the cleanup task run when a wave fails or a task exits
    /// with an error. The handler participates in no plan.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from the closure.
    pub fn on_error<F>(mut self, configure: F) -> Result<Self, PidlError>
    where
        F: FnOnce(TaskBuilder) -> Result<TaskBuilder, PidlError>,
    {
        let builder = TaskBuilder::new(
            ERROR_HANDLER_NAME,
            Arc::clone(&self.context),
            self.options.actions.clone(),
        );
        self.error_handler = Some(Arc::new(configure(builder)?.build()));
        Ok(self)
    }

    /// Configures the pipeline's own skip condition.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] when both sources are supplied.
    pub fn only_if(
        mut self,
        value: Option<ConditionValue>,
        thunk: Option<ConditionFn>,
    ) -> Result<Self, PidlError> {
        if let Some(condition) = build_condition(value, thunk, &self.context)? {
            self.condition = Some(condition);
        }
        Ok(self)
    }

    /// Finishes the build, stamping `job_name` and `run_date` into the
    /// context.
    #[must_use]
    pub fn build(self) -> Pipeline {
        self.context.set(JOB_NAME_KEY, self.name.clone());
        self.context.set(RUN_DATE_KEY, iso_timestamp());

        Pipeline {
            name: self.name,
            context: self.context,
            tasks: self.tasks,
            task_order: self.task_order,
            error_handler: self.error_handler,
            single_thread: self.options.single_thread,
            skip: self.options.skip,
            concurrency: self.options.concurrency,
            condition: self.condition,
            emitter: Arc::new(EventEmitter::new()),
        }
    }
}
