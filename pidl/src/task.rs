//! Tasks: ordered collections of actions with prerequisites.
//!
//! A task owns its actions and its own [`EventEmitter`]; the pipeline binds
//! that emitter onto its own stream while the task runs. Actions run
//! strictly sequentially in insertion order, with each failure filtered
//! through the action's error policy.

use crate::actions::{Action, ActionRegistry};
use crate::condition::{build_condition, skip_requested, Condition, ConditionFn, ConditionValue};
use crate::context::{Context, ERROR_KEY, EXIT_CODE_KEY};
use crate::errors::PidlError;
use crate::events::{EventEmitter, PipelineEvent};
use crate::utils::elapsed_ms;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// An ordered group of actions with prerequisite task dependencies.
pub struct Task {
    name: String,
    actions: Vec<Box<dyn Action>>,
    prerequisites: Vec<String>,
    condition: Option<Condition>,
    context: Arc<Context>,
    emitter: EventEmitter,
    exited: AtomicBool,
    exit_code: AtomicI32,
}

impl Task {
    /// The task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared prerequisite task names.
    #[must_use]
    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    /// The number of registered actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// The task's shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// The task's event emitter.
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// True iff the task has no prerequisites.
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.prerequisites.is_empty()
    }

    /// True iff every prerequisite is in `seen`.
    #[must_use]
    pub fn is_ready(&self, seen: &HashSet<String>) -> bool {
        self.prerequisites.iter().all(|p| seen.contains(p))
    }

    /// True iff an exit-policy action failed during the last run.
    #[must_use]
    pub fn exit(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// The exit code recorded by the last exit-policy failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// True iff any task of the run has recorded an error in the context.
    #[must_use]
    pub fn error(&self) -> bool {
        self.context.is_set(ERROR_KEY)
    }

    /// Evaluates the task's skip condition.
    ///
    /// # Errors
    ///
    /// Propagates predicate evaluation errors.
    pub fn should_skip(&self) -> Result<bool, PidlError> {
        skip_requested(self.condition.as_ref())
    }

    fn reset(&self) {
        self.exited.store(false, Ordering::SeqCst);
        self.exit_code.store(0, Ordering::SeqCst);
    }

    /// Runs the task's actions in insertion order.
    ///
    /// Emits `task_start`, then per-action `action_start`/`action_end`
    /// pairs, then `task_end`. A raising failure records the error message
    /// in the context and propagates without emitting the trailing events
    /// for the failed action or the task. An exit failure records the error
    /// and exit code, flags the task, and ends the action sequence. A
    /// continue failure is logged and the remaining actions still run.
    ///
    /// # Errors
    ///
    /// Propagates failures of raise-policy actions and skip-predicate
    /// evaluation errors.
    pub async fn run(&self) -> Result<(), PidlError> {
        self.reset();
        let started = Instant::now();
        self.emitter.emit(&PipelineEvent::task_start(&self.name));

        for action in &self.actions {
            if action.should_skip()? {
                debug!(
                    task = %self.name,
                    action = %action.label(),
                    "skip condition not met; skipping action"
                );
                continue;
            }

            let label = action.label();
            self.emitter.emit(&PipelineEvent::action_start(&label));
            let action_started = Instant::now();

            match action.run(&self.context).await {
                Ok(()) => {
                    self.emitter
                        .emit(&PipelineEvent::action_end(&label, elapsed_ms(action_started)));
                }
                Err(err) if action.raise_on_error() => {
                    self.context.set(ERROR_KEY, err.to_string());
                    return Err(err);
                }
                Err(err) if action.exit_on_error() => {
                    let code = action.exit_code();
                    warn!(
                        task = %self.name,
                        action = %label,
                        error = %err,
                        exit_code = code,
                        "action failed; task requesting pipeline exit"
                    );
                    self.context.set(ERROR_KEY, err.to_string());
                    self.context.set(EXIT_CODE_KEY, code);
                    self.exit_code.store(code, Ordering::SeqCst);
                    self.exited.store(true, Ordering::SeqCst);
                    break;
                }
                Err(err) => {
                    warn!(
                        task = %self.name,
                        action = %label,
                        error = %err,
                        "action failed; continuing"
                    );
                }
            }
        }

        self.emitter
            .emit(&PipelineEvent::task_end(&self.name, elapsed_ms(started)));
        Ok(())
    }

    /// Describes the task and its actions for dry runs.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!("task {}", self.name);
        if !self.prerequisites.is_empty() {
            out.push_str(&format!(" (after {})", self.prerequisites.join(", ")));
        }
        for action in &self.actions {
            out.push_str("\n  ");
            out.push_str(&action.describe());
        }
        out
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<String> = self.actions.iter().map(|a| a.label()).collect();
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("actions", &labels)
            .field("prerequisites", &self.prerequisites)
            .finish()
    }
}

/// Builder for [`Task`]; obtained from the pipeline builder's task
/// configuration closure.
pub struct TaskBuilder {
    name: String,
    context: Arc<Context>,
    registry: ActionRegistry,
    actions: Vec<Box<dyn Action>>,
    prerequisites: Vec<String>,
    condition: Option<Condition>,
}

impl TaskBuilder {
    pub(crate) fn new(
        name: impl Into<String>,
        context: Arc<Context>,
        registry: ActionRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            context,
            registry,
            actions: Vec::new(),
            prerequisites: Vec::new(),
            condition: None,
        }
    }

    /// The shared context, for building key-bound conditions and promises.
    #[must_use]
    pub fn context(&self) -> Arc<Context> {
        Arc::clone(&self.context)
    }

    /// Appends an action; duplicate registration appends again.
    ///
    /// # Errors
    ///
    /// Propagates the action's `validate` failure.
    pub fn action(self, action: impl Action + 'static) -> Result<Self, PidlError> {
        self.boxed_action(Box::new(action))
    }

    /// Appends an already-boxed action.
    ///
    /// # Errors
    ///
    /// Propagates the action's `validate` failure.
    pub fn boxed_action(mut self, action: Box<dyn Action>) -> Result<Self, PidlError> {
        action.validate()?;
        self.actions.push(action);
        Ok(self)
    }

    /// Instantiates and appends a registered custom action type.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] for an unknown type name and
    /// propagates the action's `validate` failure.
    pub fn custom_action(self, type_name: &str, action_name: &str) -> Result<Self, PidlError> {
        let action = self.registry.create(type_name, action_name)?;
        self.boxed_action(action)
    }

    /// Declares prerequisite task names.
    #[must_use]
    pub fn after<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for prerequisite in prerequisites {
            let prerequisite = prerequisite.into();
            if !self.prerequisites.contains(&prerequisite) {
                self.prerequisites.push(prerequisite);
            }
        }
        self
    }

    /// Configures the task's skip condition.
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

    pub(crate) fn build(self) -> Task {
        Task {
            name: self.name,
            actions: self.actions,
            prerequisites: self.prerequisites,
            condition: self.condition,
            context: self.context,
            emitter: EventEmitter::new(),
            exited: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{FnAction, MockAction, NoOpAction};
    use crate::events::EventBuffer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn builder(name: &str) -> TaskBuilder {
        TaskBuilder::new(name, Arc::new(Context::new()), ActionRegistry::new())
    }

    fn event_names(events: &[PipelineEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                PipelineEvent::TaskStart { name } => format!("task_start:{name}"),
                PipelineEvent::TaskEnd { name, .. } => format!("task_end:{name}"),
                PipelineEvent::ActionStart { action } => format!("action_start:{action}"),
                PipelineEvent::ActionEnd { action, .. } => format!("action_end:{action}"),
                PipelineEvent::PipelineStart { name } => format!("pipeline_start:{name}"),
                PipelineEvent::PipelineEnd { name, .. } => format!("pipeline_end:{name}"),
            })
            .collect()
    }

    #[test]
    fn test_first_and_ready() {
        let task = builder("load").build();
        assert!(task.is_first());
        assert!(task.is_ready(&HashSet::new()));

        let task = builder("load").after(["extract", "validate"]).build();
        assert!(!task.is_first());
        assert!(!task.is_ready(&HashSet::new()));

        let mut seen = HashSet::new();
        seen.insert("extract".to_string());
        assert!(!task.is_ready(&seen));

        seen.insert("validate".to_string());
        assert!(task.is_ready(&seen));
    }

    #[test]
    fn test_after_deduplicates() {
        let task = builder("load").after(["a", "a", "b"]).build();
        assert_eq!(task.prerequisites(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_validate_is_called_on_add() {
        let mut action = MockAction::new();
        action.expect_validate().times(1).returning(|| Ok(()));

        builder("load").action(action).unwrap();
    }

    #[test]
    fn test_invalid_action_is_rejected() {
        let mut action = MockAction::new();
        action
            .expect_validate()
            .returning(|| Err(PidlError::argument("missing field")));

        assert!(builder("load").action(action).is_err());
    }

    #[tokio::test]
    async fn test_run_emits_bracketed_events() {
        let task = builder("load")
            .action(NoOpAction::new("first"))
            .unwrap()
            .action(NoOpAction::new("second"))
            .unwrap()
            .build();

        let buffer = EventBuffer::new();
        task.emitter().on_any(buffer.handler());

        task.run().await.unwrap();

        assert_eq!(
            event_names(&buffer.drain()),
            vec![
                "task_start:load",
                "action_start:NoOpAction:first:execute",
                "action_end:NoOpAction:first:execute",
                "action_start:NoOpAction:second:execute",
                "action_end:NoOpAction:second:execute",
                "task_end:load",
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_action_names_both_run() {
        let ctx = Arc::new(Context::new());
        let task = TaskBuilder::new("load", Arc::clone(&ctx), ActionRegistry::new())
            .action(FnAction::new("bump", |ctx| {
                let next = ctx.get("count").as_i64().unwrap_or(0) + 1;
                ctx.set("count", next);
                Ok(())
            }))
            .unwrap()
            .action(FnAction::new("bump", |ctx| {
                let next = ctx.get("count").as_i64().unwrap_or(0) + 1;
                ctx.set("count", next);
                Ok(())
            }))
            .unwrap()
            .build();

        task.run().await.unwrap();
        assert_eq!(ctx.get("count"), json!(2));
    }

    #[tokio::test]
    async fn test_skipped_action_emits_nothing() {
        let ctx = Arc::new(Context::new());
        let skipped = FnAction::builder("gated")
            .only_if(Some(ConditionValue::value(false)), None, &ctx)
            .unwrap()
            .run_fn(|ctx| {
                ctx.set("gated_ran", true);
                Ok(())
            })
            .build();

        let task = TaskBuilder::new("load", Arc::clone(&ctx), ActionRegistry::new())
            .action(skipped)
            .unwrap()
            .build();

        let buffer = EventBuffer::new();
        task.emitter().on_any(buffer.handler());
        task.run().await.unwrap();

        assert!(!ctx.is_set("gated_ran"));
        assert_eq!(
            event_names(&buffer.drain()),
            vec!["task_start:load", "task_end:load"]
        );
    }

    #[tokio::test]
    async fn test_raise_policy_records_error_and_propagates() {
        let ctx = Arc::new(Context::new());
        let task = TaskBuilder::new("load", Arc::clone(&ctx), ActionRegistry::new())
            .action(FnAction::new("explode", |_ctx| {
                Err(PidlError::Action(anyhow::anyhow!("boom")))
            }))
            .unwrap()
            .build();

        let buffer = EventBuffer::new();
        task.emitter().on_any(buffer.handler());

        let err = task.run().await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(ctx.get(ERROR_KEY), json!("boom"));
        assert!(task.error());

        // No action_end and no task_end after the raise.
        assert_eq!(
            event_names(&buffer.drain()),
            vec!["task_start:load", "action_start:FnAction:explode:execute"]
        );
    }

    #[tokio::test]
    async fn test_exit_policy_flags_task_and_ends_sequence() {
        let ctx = Arc::new(Context::new());
        let task = TaskBuilder::new("load", Arc::clone(&ctx), ActionRegistry::new())
            .action(
                FnAction::builder("explode")
                    .run_fn(|_ctx| Err(PidlError::Action(anyhow::anyhow!("boom"))))
                    .on_error("exit", Some(&json!(101)))
                    .unwrap()
                    .build(),
            )
            .unwrap()
            .action(FnAction::new("after", |ctx| {
                ctx.set("after_ran", true);
                Ok(())
            }))
            .unwrap()
            .build();

        let buffer = EventBuffer::new();
        task.emitter().on_any(buffer.handler());

        task.run().await.unwrap();

        assert!(task.exit());
        assert_eq!(task.exit_code(), 101);
        assert_eq!(ctx.get(ERROR_KEY), json!("boom"));
        assert_eq!(ctx.get(EXIT_CODE_KEY), json!(101));
        assert!(!ctx.is_set("after_ran"));

        // The failed action has no action_end; the task still ends.
        assert_eq!(
            event_names(&buffer.drain()),
            vec![
                "task_start:load",
                "action_start:FnAction:explode:execute",
                "task_end:load",
            ]
        );
    }

    #[tokio::test]
    async fn test_continue_policy_proceeds() {
        let ctx = Arc::new(Context::new());
        let task = TaskBuilder::new("load", Arc::clone(&ctx), ActionRegistry::new())
            .action(
                FnAction::builder("explode")
                    .run_fn(|_ctx| Err(PidlError::Action(anyhow::anyhow!("boom"))))
                    .on_error("continue", None)
                    .unwrap()
                    .build(),
            )
            .unwrap()
            .action(FnAction::new("after", |ctx| {
                ctx.set("after_ran", true);
                Ok(())
            }))
            .unwrap()
            .build();

        task.run().await.unwrap();

        assert!(!task.exit());
        assert_eq!(ctx.get("after_ran"), json!(true));
    }

    #[tokio::test]
    async fn test_run_invokes_each_action_once() {
        let mut action = MockAction::new();
        action.expect_validate().returning(|| Ok(()));
        action.expect_should_skip().returning(|| Ok(false));
        action
            .expect_label()
            .return_const("MockAction:probe:execute".to_string());
        action.expect_run().times(1).returning(|_ctx| Ok(()));

        let task = builder("load").action(action).unwrap().build();
        task.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_task_skip_condition() {
        let ctx = Arc::new(Context::new());
        let task = TaskBuilder::new("load", Arc::clone(&ctx), ActionRegistry::new())
            .only_if(Some(ConditionValue::key("enabled")), None)
            .unwrap()
            .build();

        assert!(task.should_skip().unwrap());

        let ctx2 = Arc::new(Context::new());
        ctx2.set("enabled", true);
        let task = TaskBuilder::new("load", Arc::clone(&ctx2), ActionRegistry::new())
            .only_if(Some(ConditionValue::key("enabled")), None)
            .unwrap()
            .build();
        assert!(!task.should_skip().unwrap());
    }

    #[test]
    fn test_custom_action_from_registry() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("noop", |name| Box::new(NoOpAction::new(name)));

        let task = TaskBuilder::new("load", Arc::new(Context::new()), registry)
            .custom_action("noop", "idle")
            .unwrap()
            .build();

        assert_eq!(task.action_count(), 1);
    }

    #[test]
    fn test_custom_action_unknown_type() {
        let result = builder("load").custom_action("db", "insert");
        assert!(matches!(result, Err(PidlError::Runtime(_))));
    }

    #[test]
    fn test_describe_lists_actions() {
        let task = builder("load")
            .after(["extract"])
            .action(NoOpAction::new("first"))
            .unwrap()
            .build();

        let description = task.describe();
        assert!(description.contains("task load (after extract)"));
        assert!(description.contains("NoOpAction:first:execute"));
    }
}
