//! Single-assignment lazy values.
//!
//! A [`Promise`] wraps one of: a plain value (trivially evaluated), a thunk,
//! or a context key read on demand. Forcing with [`Promise::value`] memoizes:
//! the thunk is invoked at most once, and every later call returns the same
//! result even if the thunk would now produce something different.

use crate::context::Context;
use crate::errors::PidlError;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// A deferred evaluator supplying a promise's value.
pub type Thunk = Box<dyn Fn() -> Result<Value, PidlError> + Send + Sync>;

enum Source {
    Thunk(Thunk),
    Key {
        key: String,
        context: Option<Arc<Context>>,
    },
}

enum State {
    Pending(Source),
    Done(Value),
    Failed(String),
}

/// A single-assignment lazily-evaluated value with memoization.
pub struct Promise {
    state: Mutex<State>,
}

impl Promise {
    /// Creates a promise from an optional raw value and an optional thunk.
    ///
    /// A raw value is considered already evaluated; a missing value and
    /// missing thunk yield a null promise.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Argument`] when both a value and a thunk are
    /// supplied.
    pub fn new(value: Option<Value>, thunk: Option<Thunk>) -> Result<Self, PidlError> {
        match (value, thunk) {
            (Some(_), Some(_)) => Err(PidlError::argument(
                "a promise takes a value or a block, not both",
            )),
            (Some(value), None) => Ok(Self::from_value(value)),
            (None, Some(thunk)) => Ok(Self {
                state: Mutex::new(State::Pending(Source::Thunk(thunk))),
            }),
            (None, None) => Ok(Self::from_value(Value::Null)),
        }
    }

    /// Creates an already-evaluated promise.
    #[must_use]
    pub fn from_value(value: impl Into<Value>) -> Self {
        Self {
            state: Mutex::new(State::Done(value.into())),
        }
    }

    /// Creates a promise from an infallible thunk.
    pub fn from_fn<F>(thunk: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(State::Pending(Source::Thunk(Box::new(move || Ok(thunk()))))),
        }
    }

    /// Creates a promise from a fallible thunk.
    ///
    /// A forcing error propagates unwrapped to the first caller; the thunk
    /// is still invoked at most once.
    pub fn from_try_fn<F>(thunk: F) -> Self
    where
        F: Fn() -> Result<Value, PidlError> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(State::Pending(Source::Thunk(Box::new(thunk)))),
        }
    }

    /// Creates a promise that reads `key` from the context when forced.
    ///
    /// Without a context the key resolves to its own name.
    #[must_use]
    pub fn from_key(key: impl Into<String>, context: Option<Arc<Context>>) -> Self {
        Self {
            state: Mutex::new(State::Pending(Source::Key {
                key: key.into(),
                context,
            })),
        }
    }

    /// Forces evaluation and returns the memoized value.
    ///
    /// # Errors
    ///
    /// Propagates the thunk's error on first evaluation; later calls after a
    /// failure return a [`PidlError::Runtime`] carrying the same message.
    pub fn value(&self) -> Result<Value, PidlError> {
        let mut state = self.state.lock();
        match &*state {
            State::Done(value) => return Ok(value.clone()),
            State::Failed(message) => return Err(PidlError::runtime(message.clone())),
            State::Pending(_) => {}
        }

        let prior = std::mem::replace(
            &mut *state,
            State::Failed("promise evaluation interrupted".to_string()),
        );
        let State::Pending(source) = prior else {
            return Err(PidlError::runtime("promise evaluation interrupted"));
        };

        let result = match source {
            Source::Thunk(thunk) => thunk(),
            Source::Key { key, context } => Ok(match context {
                Some(ctx) => ctx.get(&key),
                None => Value::String(key),
            }),
        };

        match result {
            Ok(value) => {
                *state = State::Done(value.clone());
                Ok(value)
            }
            Err(err) => {
                *state = State::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Returns true iff the value has been materialized.
    ///
    /// Always true for promises built from raw values; for thunk and key
    /// promises, true only after [`Promise::value`] has been called.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        !matches!(&*self.state.lock(), State::Pending(_))
    }

    /// Forces evaluation and renders the value as a string.
    ///
    /// # Errors
    ///
    /// Propagates forcing errors.
    pub fn force_string(&self) -> Result<String, PidlError> {
        Ok(match self.value()? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        match &*state {
            State::Pending(_) => f.write_str("Promise(<pending>)"),
            State::Done(value) => write!(f, "Promise({value})"),
            State::Failed(message) => write!(f, "Promise(<failed: {message}>)"),
        }
    }
}

impl From<Value> for Promise {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
