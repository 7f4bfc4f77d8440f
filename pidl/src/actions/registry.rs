//! Registry of custom action factories.

use super::Action;
use crate::errors::PidlError;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an action of a registered type from an action name.
pub type ActionFactory = Arc<dyn Fn(&str) -> Box<dyn Action> + Send + Sync>;

/// Name → factory map injected into every task of a pipeline via the
/// `actions` option, so task configuration can instantiate custom action
/// types by name.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    factories: HashMap<String, ActionFactory>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under a type name; re-registration replaces.
    pub fn register(&mut self, type_name: impl Into<String>, factory: ActionFactory) {
        self.factories.insert(type_name.into(), factory);
    }

    /// Registers a plain function as a factory.
    pub fn register_fn<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.register(type_name, Arc::new(factory));
    }

    /// Instantiates an action of a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] for an unknown type name.
    pub fn create(&self, type_name: &str, action_name: &str) -> Result<Box<dyn Action>, PidlError> {
        let factory = self.factories.get(type_name).ok_or_else(|| {
            PidlError::runtime(format!("unknown action type '{type_name}'"))
        })?;
        Ok(factory(action_name))
    }

    /// Returns true iff a factory is registered under the type name.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Returns the registered type names.
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Returns true if no factories are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("type_names", &self.type_names())
            .finish()
    }
}
