//! # Pidl
//!
//! Pidl orchestrates dependent pipelines of work. A pipeline is a collection
//! of named **tasks**; each task is an ordered list of named **actions**.
//! Tasks declare dependencies on other tasks by name, and the library
//! derives a wave-grouped execution plan honoring those dependencies:
//!
//! - **Wave dispatch**: waves run concurrently (optionally capped) or
//!   strictly serially; wave N+1 starts only after wave N fully terminates
//! - **Error policy**: per-action raise, exit-with-code or continue handling,
//!   with a cleanup handler for failed runs
//! - **Lazy context**: shared key/value state with promise-based deferred
//!   resolution and read-only named views
//! - **Events**: start/end events for pipelines, tasks and actions, fanned
//!   out on a single-threaded stream
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pidl::prelude::*;
//!
//! let context = Arc::new(Context::new());
//! let pipeline = PipelineBuilder::new("nightly-load", context)
//!     .task("extract", |t| t.action(FnAction::new("pull", |ctx| { /* ... */ Ok(()) })))?
//!     .task("load", |t| t.after(["extract"]).action(FnAction::new("push", |ctx| Ok(()))))?
//!     .build();
//!
//! pipeline.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod condition;
pub mod context;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod promise;
pub mod task;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{
        Action, ActionCore, ActionFactory, ActionRegistry, ErrorPolicy, FnAction, NoOpAction,
    };
    pub use crate::condition::{Condition, ConditionValue};
    pub use crate::context::{Context, ERROR_KEY, EXIT_CODE_KEY, JOB_NAME_KEY, RUN_DATE_KEY};
    pub use crate::errors::PidlError;
    pub use crate::events::{EventBuffer, EventEmitter, EventKind, PipelineEvent};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineOptions, Plan, RunReport};
    pub use crate::promise::Promise;
    pub use crate::task::{Task, TaskBuilder};
    pub use crate::utils::{iso_timestamp, now_utc, Timestamp};
    pub use std::sync::Arc;
}
