//! The pipeline orchestrator: wave dispatch, event forwarding, cleanup.

use super::builder::PipelineBuilder;
use super::options::PipelineOptions;
use super::plan::{build_plan, Plan};
use crate::condition::{skip_requested, Condition};
use crate::context::{Context, EXIT_CODE_KEY};
use crate::errors::PidlError;
use crate::events::{EventBuffer, EventEmitter, EventHandler, EventKind, PipelineEvent};
use crate::task::Task;
use crate::utils::elapsed_ms;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

/// Summary of a completed pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identity of this run, also attached to the run's tracing span.
    pub run_id: Uuid,
    /// The planned waves, whether or not every wave was reached.
    pub waves: Vec<Vec<String>>,
    /// True iff the pipeline's own skip condition prevented the run.
    pub skipped: bool,
    /// True iff a task requested termination via the exit policy.
    pub exited: bool,
    /// The exit code recorded in the context when `exited` is true.
    pub exit_code: Option<i32>,
    /// Wall-clock duration in whole milliseconds.
    pub duration_ms: u64,
}

/// The orchestrator owning the full task set, plan and event stream.
///
/// Waves run concurrently by default, one tokio task per pipeline task with
/// a barrier between waves; the `single_thread` option forces serial
/// execution. Events emitted by concurrently running tasks are buffered and
/// replayed on the dispatcher after each wave, so pipeline subscribers
/// observe a single-threaded stream.
pub struct Pipeline {
    pub(crate) name: String,
    pub(crate) context: Arc<Context>,
    pub(crate) tasks: HashMap<String, Arc<Task>>,
    pub(crate) task_order: Vec<String>,
    pub(crate) error_handler: Option<Arc<Task>>,
    pub(crate) single_thread: bool,
    pub(crate) skip: Vec<String>,
    pub(crate) concurrency: usize,
    pub(crate) condition: Option<Condition>,
    pub(crate) emitter: Arc<EventEmitter>,
}

impl Pipeline {
    /// Builds a pipeline in one call: name, shared context, options and a
    /// configuration closure over the builder.
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from the closure.
    pub fn new<F>(
        name: impl Into<String>,
        context: Arc<Context>,
        options: PipelineOptions,
        configure: F,
    ) -> Result<Self, PidlError>
    where
        F: FnOnce(PipelineBuilder) -> Result<PipelineBuilder, PidlError>,
    {
        Ok(configure(PipelineBuilder::new(name, context).options(options))?.build())
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Looks up a task by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.get(name)
    }

    /// The registered task names in insertion order.
    #[must_use]
    pub fn task_names(&self) -> &[String] {
        &self.task_order
    }

    /// The number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Subscribes a handler to one pipeline event kind.
    pub fn on(&self, kind: EventKind, handler: EventHandler) {
        self.emitter.on(kind, handler);
    }

    /// Subscribes a handler to every pipeline event.
    pub fn on_any(&self, handler: EventHandler) {
        self.emitter.on_any(handler);
    }

    /// Removes a handler by identity.
    pub fn remove_listener(&self, kind: EventKind, handler: &EventHandler) -> bool {
        self.emitter.remove_listener(kind, handler)
    }

    /// Removes a wildcard handler by identity.
    pub fn remove_any_listener(&self, handler: &EventHandler) -> bool {
        self.emitter.remove_any_listener(handler)
    }

    fn plan(&self) -> Result<Plan, PidlError> {
        build_plan(&self.task_order, &self.tasks, self.concurrency)
    }

    /// Returns the wave plan as task names.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::UnreachableTasks`] when the plan cannot cover
    /// every registered task.
    pub fn explain(&self) -> Result<Vec<Vec<String>>, PidlError> {
        Ok(self.plan()?.into_waves())
    }

    /// Runs the pipeline wave by wave.
    ///
    /// # Errors
    ///
    /// Returns plan validation errors, and [`PidlError::TaskFailed`] /
    /// [`PidlError::WaveFailed`] (or the raising task's own error under
    /// serial execution) when a wave fails; the error handler runs before
    /// the error propagates.
    pub async fn run(&self) -> Result<RunReport, PidlError> {
        let plan = self.plan()?;
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", pipeline = %self.name, run_id = %run_id);
        self.run_planned(plan, run_id).instrument(span).await
    }

    async fn run_planned(&self, plan: Plan, run_id: Uuid) -> Result<RunReport, PidlError> {
        if skip_requested(self.condition.as_ref())? {
            debug!(pipeline = %self.name, "skip condition not met; pipeline not run");
            return Ok(RunReport {
                run_id,
                waves: plan.into_waves(),
                skipped: true,
                exited: false,
                exit_code: None,
                duration_ms: 0,
            });
        }

        let started = Instant::now();
        self.emitter
            .emit(&PipelineEvent::pipeline_start(&self.name));

        match self.run_waves(&plan).await {
            Ok(exited) => {
                let duration_ms = elapsed_ms(started);
                self.emitter
                    .emit(&PipelineEvent::pipeline_end(&self.name, duration_ms));

                let exit_code = if exited {
                    self.context
                        .get(EXIT_CODE_KEY)
                        .as_i64()
                        .and_then(|code| i32::try_from(code).ok())
                } else {
                    None
                };

                Ok(RunReport {
                    run_id,
                    waves: plan.into_waves(),
                    skipped: false,
                    exited,
                    exit_code,
                    duration_ms,
                })
            }
            Err(err) => {
                self.run_error_handler().await;
                Err(err)
            }
        }
    }

    /// Runs all waves; returns true iff a task requested exit.
    async fn run_waves(&self, plan: &Plan) -> Result<bool, PidlError> {
        for wave in plan.waves() {
            if self.single_thread {
                self.run_wave_serial(wave).await?;
            } else {
                self.run_wave_concurrent(wave).await?;
            }

            let exited: Vec<&Arc<Task>> = wave
                .iter()
                .filter_map(|name| self.tasks.get(name))
                .filter(|task| task.exit())
                .collect();

            if !exited.is_empty() {
                if exited.iter().any(|task| task.error()) {
                    self.run_error_handler().await;
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn run_wave_serial(&self, wave: &[String]) -> Result<(), PidlError> {
        for name in wave {
            let task = self.task_ref(name)?;
            if self.skip.iter().any(|skipped| skipped == name) {
                debug!(task = %name, "task in skip list; not running");
                continue;
            }
            if task.should_skip()? {
                debug!(task = %name, "skip condition not met; task not run");
                continue;
            }

            let forward = self.forwarding_handler();
            task.emitter().on_any(forward.clone());
            let result = task.run().await;
            task.emitter().remove_any_listener(&forward);
            result?;
        }
        Ok(())
    }

    async fn run_wave_concurrent(&self, wave: &[String]) -> Result<(), PidlError> {
        let buffer = EventBuffer::new();
        let capture = buffer.handler();

        let mut names: Vec<String> = Vec::new();
        let mut handles = Vec::new();
        for name in wave {
            let task = Arc::clone(self.task_ref(name)?);
            if self.skip.iter().any(|skipped| skipped == name) {
                debug!(task = %name, "task in skip list; not running");
                continue;
            }
            if task.should_skip()? {
                debug!(task = %name, "skip condition not met; task not run");
                continue;
            }

            task.emitter().on_any(capture.clone());
            names.push(name.clone());
            handles.push(tokio::spawn(async move { task.run().await }));
        }

        let results = join_all(handles).await;

        for name in &names {
            if let Some(task) = self.tasks.get(name) {
                task.emitter().remove_any_listener(&capture);
            }
        }

        // Replay captured events on the dispatcher thread, in capture order.
        for event in buffer.drain() {
            self.emitter.emit(&event);
        }

        let mut failures: Vec<(String, PidlError)> = Vec::new();
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(task = %name, error = %err, "task failed");
                    failures.push((name.clone(), err));
                }
                Err(join_err) => {
                    error!(task = %name, error = %join_err, "task panicked");
                    failures.push((
                        name.clone(),
                        PidlError::runtime(format!("task '{name}' panicked")),
                    ));
                }
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => {
                let (task, source) = failures.swap_remove(0);
                Err(PidlError::TaskFailed {
                    task,
                    source: Box::new(source),
                })
            }
            _ => Err(PidlError::WaveFailed {
                tasks: failures.into_iter().map(|(name, _)| name).collect(),
            }),
        }
    }

    /// Runs a single task by name, ignoring skip lists and dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] for an unknown name and propagates
    /// the task's own failure.
    pub async fn run_one(&self, task_name: &str) -> Result<(), PidlError> {
        let task = self
            .tasks
            .get(task_name)
            .ok_or_else(|| PidlError::runtime(format!("unknown task '{task_name}'")))?;

        let started = Instant::now();
        self.emitter
            .emit(&PipelineEvent::pipeline_start(&self.name));

        let forward = self.forwarding_handler();
        task.emitter().on_any(forward.clone());
        let result = task.run().await;
        task.emitter().remove_any_listener(&forward);
        result?;

        self.emitter
            .emit(&PipelineEvent::pipeline_end(&self.name, elapsed_ms(started)));
        Ok(())
    }

    /// Describes the plan without running anything.
    ///
    /// # Errors
    ///
    /// Returns plan validation errors.
    pub fn dry_run(&self) -> Result<String, PidlError> {
        let plan = self.plan()?;
        let mut out = format!("pipeline {}", self.name);
        for (index, wave) in plan.waves().iter().enumerate() {
            out.push_str(&format!("\nwave {}:", index + 1));
            for name in wave {
                let task = self.task_ref(name)?;
                for line in task.describe().lines() {
                    out.push_str("\n  ");
                    out.push_str(line);
                }
            }
        }
        Ok(out)
    }

    /// Runs the error handler, honoring its skip condition and suppressing
    /// its failures so they never mask the original error.
    async fn run_error_handler(&self) {
        let Some(handler) = &self.error_handler else {
            return;
        };

        match handler.should_skip() {
            Ok(true) => {
                debug!("error handler skip condition not met; not run");
                return;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "error handler skip condition failed; not run");
                return;
            }
        }

        if let Err(err) = handler.run().await {
            warn!(error = %err, "error handler failed");
        }
    }

    fn task_ref(&self, name: &str) -> Result<&Arc<Task>, PidlError> {
        self.tasks
            .get(name)
            .ok_or_else(|| PidlError::runtime(format!("task '{name}' not found")))
    }

    fn forwarding_handler(&self) -> EventHandler {
        let emitter = Arc::clone(&self.emitter);
        Arc::new(move |event: &PipelineEvent| emitter.emit(event))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("tasks", &self.task_order)
            .field("single_thread", &self.single_thread)
            .field("concurrency", &self.concurrency)
            .field("skip", &self.skip)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}
