//! Wave plan construction.
//!
//! The plan groups tasks into waves by iterative topological layering: a
//! task joins a wave once every prerequisite has been planned. Waves wider
//! than the concurrency cap are split into sub-waves, preserving pipeline
//! insertion order. Tasks that never become ready (missing references or
//! cycles) fail validation by name.

use crate::errors::PidlError;
use crate::task::Task;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A wave-grouped execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    waves: Vec<Vec<String>>,
}

impl Plan {
    /// The planned waves, in execution order.
    #[must_use]
    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    /// Consumes the plan into its waves.
    #[must_use]
    pub fn into_waves(self) -> Vec<Vec<String>> {
        self.waves
    }

    /// The number of waves.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    /// True for the empty plan.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Every planned task name, in wave order.
    #[must_use]
    pub fn task_names(&self) -> Vec<String> {
        self.waves.iter().flatten().cloned().collect()
    }
}

/// Builds the wave plan for the given tasks.
///
/// `order` is the pipeline insertion order and acts as the tie-break within
/// a wave. When `concurrency` is non-zero, ready sets are chunked into
/// sub-waves of at most that many tasks.
///
/// # Errors
///
/// Returns [`PidlError::UnreachableTasks`] naming the tasks whose
/// prerequisites cannot be satisfied.
pub(crate) fn build_plan(
    order: &[String],
    tasks: &HashMap<String, Arc<Task>>,
    concurrency: usize,
) -> Result<Plan, PidlError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut waves: Vec<Vec<String>> = Vec::new();

    loop {
        let ready: Vec<String> = order
            .iter()
            .filter(|name| !seen.contains(*name))
            .filter(|name| {
                tasks
                    .get(*name)
                    .is_some_and(|task| task.is_ready(&seen))
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            break;
        }

        if concurrency == 0 {
            waves.push(ready.clone());
        } else {
            for chunk in ready.chunks(concurrency) {
                waves.push(chunk.to_vec());
            }
        }

        seen.extend(ready);
    }

    if seen.len() != tasks.len() {
        let names: Vec<String> = order
            .iter()
            .filter(|name| !seen.contains(*name))
            .cloned()
            .collect();
        return Err(PidlError::UnreachableTasks { names });
    }

    Ok(Plan { waves })
}
