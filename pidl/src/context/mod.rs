//! Shared key/value state for a pipeline run.
//!
//! The [`Context`] is the one piece of mutable state shared by every task and
//! action in a pipeline. All reads and writes serialize on a single mutex;
//! there is no per-key locking. Missing keys read as [`Value::Null`] rather
//! than failing, and [`Context::is_set`] distinguishes an absent key from a
//! present-but-null one.
//!
//! Alongside the mutable store, a context carries read-only named views built
//! from a construction-time options mapping (for example `params` or
//! `config`). The `logger` option name is reserved: logging goes through
//! `tracing` and never becomes a view.

mod views;

pub use views::ContextView;

use crate::errors::PidlError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Context key holding the stringified pipeline name.
pub const JOB_NAME_KEY: &str = "job_name";
/// Context key holding the pipeline construction timestamp.
pub const RUN_DATE_KEY: &str = "run_date";
/// Context key set to the failing action's error message.
pub const ERROR_KEY: &str = "error";
/// Context key set when an exit-policy action fails.
pub const EXIT_CODE_KEY: &str = "exit_code";

/// Option name reserved for logger configuration; never registered as a view.
const LOGGER_OPTION: &str = "logger";

/// Shared mutable key/value state plus read-only named views.
#[derive(Default)]
pub struct Context {
    values: Mutex<HashMap<String, Value>>,
    views: HashMap<String, ContextView>,
}

impl Context {
    /// Creates an empty context with no views.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context whose options become read-only named views.
    ///
    /// A mapping option becomes a keyed view, a sequence or scalar option is
    /// returned verbatim by [`Context::view`]. The `logger` entry is
    /// reserved and skipped.
    #[must_use]
    pub fn with_options(options: HashMap<String, Value>) -> Self {
        let views = options
            .into_iter()
            .filter(|(name, _)| name != LOGGER_OPTION)
            .map(|(name, value)| (name, ContextView::from_value(value)))
            .collect();

        Self {
            values: Mutex::new(HashMap::new()),
            views,
        }
    }

    /// Writes a value, overwriting any prior value for the key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.lock().insert(key.into(), value.into());
    }

    /// Reads a value; missing keys read as [`Value::Null`].
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        self.values.lock().get(key).cloned().unwrap_or(Value::Null)
    }

    /// Returns true iff a value is present and not null.
    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.values
            .lock()
            .get(key)
            .is_some_and(|value| !value.is_null())
    }

    /// Returns a snapshot of all user-set key/value pairs.
    #[must_use]
    pub fn all(&self) -> HashMap<String, Value> {
        self.values.lock().clone()
    }

    /// Returns all keys currently set.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.lock().keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Returns true if no entries have been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Returns true iff a view with the given name was registered.
    #[must_use]
    pub fn has_view(&self, name: &str) -> bool {
        self.views.contains_key(name)
    }

    /// Returns the whole payload of a named view.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::UnknownView`] when no such view is registered.
    pub fn view(&self, name: &str) -> Result<Value, PidlError> {
        self.views
            .get(name)
            .map(ContextView::as_value)
            .ok_or_else(|| PidlError::unknown_view(name))
    }

    /// Looks up a key in a mapping-typed view.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::UnknownView`] when no such view is registered,
    /// [`PidlError::KeyNotFound`] when the key is absent, and
    /// [`PidlError::Runtime`] when the view is not a mapping.
    pub fn view_get(&self, name: &str, key: &str) -> Result<Value, PidlError> {
        self.views
            .get(name)
            .ok_or_else(|| PidlError::unknown_view(name))?
            .get(name, key)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.keys();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("views", &self.views.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let ctx = Context::new();
        ctx.set("answer", 42);

        assert_eq!(ctx.get("answer"), json!(42));
        assert!(ctx.is_set("answer"));
    }

    #[test]
    fn test_missing_key_reads_as_null() {
        let ctx = Context::new();
        assert_eq!(ctx.get("absent"), Value::Null);
        assert!(!ctx.is_set("absent"));
    }

    #[test]
    fn test_null_value_is_present_but_not_set() {
        let ctx = Context::new();
        ctx.set("nothing", Value::Null);

        assert!(!ctx.is_set("nothing"));
        assert!(ctx.keys().contains(&"nothing".to_string()));
    }

    #[test]
    fn test_set_is_idempotent() {
        let ctx = Context::new();
        ctx.set("key", "value");
        ctx.set("key", "value");

        assert_eq!(ctx.get("key"), json!("value"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let ctx = Context::new();
        ctx.set("key", 1);
        ctx.set("key", 2);

        assert_eq!(ctx.get("key"), json!(2));
    }

    #[test]
    fn test_all_snapshot() {
        let ctx = Context::new();
        ctx.set("a", 1);
        ctx.set("b", 2);

        let all = ctx.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_mapping_view() {
        let mut options = HashMap::new();
        options.insert("params".to_string(), json!({"region": "eu-west-1"}));
        let ctx = Context::with_options(options);

        assert!(ctx.has_view("params"));
        assert_eq!(ctx.view_get("params", "region").unwrap(), json!("eu-west-1"));
        assert_eq!(ctx.view("params").unwrap(), json!({"region": "eu-west-1"}));
    }

    #[test]
    fn test_mapping_view_missing_key() {
        let mut options = HashMap::new();
        options.insert("params".to_string(), json!({}));
        let ctx = Context::with_options(options);

        assert!(matches!(
            ctx.view_get("params", "region"),
            Err(PidlError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_scalar_and_sequence_views() {
        let mut options = HashMap::new();
        options.insert("retries".to_string(), json!(3));
        options.insert("hosts".to_string(), json!(["a", "b"]));
        let ctx = Context::with_options(options);

        assert_eq!(ctx.view("retries").unwrap(), json!(3));
        assert_eq!(ctx.view("hosts").unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_unregistered_view_fails() {
        let ctx = Context::new();
        assert!(matches!(
            ctx.view("params"),
            Err(PidlError::UnknownView { .. })
        ));
        assert!(matches!(
            ctx.view_get("params", "x"),
            Err(PidlError::UnknownView { .. })
        ));
    }

    #[test]
    fn test_logger_option_is_reserved() {
        let mut options = HashMap::new();
        options.insert("logger".to_string(), json!("stdout"));
        let ctx = Context::with_options(options);

        assert!(!ctx.has_view("logger"));
    }

    #[test]
    fn test_concurrent_writers_serialize() {
        let ctx = std::sync::Arc::new(Context::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let ctx = std::sync::Arc::clone(&ctx);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    ctx.set(format!("key_{i}_{j}"), j);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ctx.len(), 800);
    }
}
