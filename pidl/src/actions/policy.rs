//! Action error policies.

use crate::errors::PidlError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an action failure is handled by its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Re-raise out of the task, aborting it and the pipeline (default).
    #[default]
    Raise,
    /// Swallow locally, flag the task for exit; the pipeline stops after the
    /// current wave.
    Exit,
    /// Swallow and log; subsequent actions in the task still run.
    Continue,
}

impl ErrorPolicy {
    /// Parses a policy name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`PidlError::Runtime`] for anything other than `raise`,
    /// `exit` or `continue`.
    pub fn parse(name: &str) -> Result<Self, PidlError> {
        match name.to_ascii_lowercase().as_str() {
            "raise" => Ok(Self::Raise),
            "exit" => Ok(Self::Exit),
            "continue" => Ok(Self::Continue),
            other => Err(PidlError::runtime(format!(
                "invalid error policy '{other}'; expected raise, exit or continue"
            ))),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Raise => "raise",
            Self::Exit => "exit",
            Self::Continue => "continue",
        };
        f.write_str(name)
    }
}

/// Normalizes a configured exit code.
///
/// Zero stays zero; anything that coerces to an integer becomes that
/// integer (floats truncate, numeric strings parse); anything non-numeric
/// becomes 1.
#[must_use]
pub fn normalize_exit_code(code: &Value) -> i32 {
    if let Some(int) = code.as_i64() {
        return i32::try_from(int).unwrap_or(1);
    }
    if let Some(float) = code.as_f64() {
        let truncated = float.trunc();
        if truncated >= f64::from(i32::MIN) && truncated <= f64::from(i32::MAX) {
            #[allow(clippy::cast_possible_truncation)]
            return truncated as i32;
        }
        return 1;
    }
    if let Some(text) = code.as_str() {
        if let Ok(int) = text.trim().parse::<i32>() {
            return int;
        }
        if let Ok(float) = text.trim().parse::<f64>() {
            return normalize_exit_code(&Value::from(float));
        }
    }
    1
}
