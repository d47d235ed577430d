//! Error types used by loaders, tasks and registries.
//!
//! This module defines two error enums:
//!
//! - [`LoadError`]: failures of a load (the loader's own error, a timed out attempt, a panic).
//!   These are recorded into task state as data and only surface as a rejected future when a
//!   caller explicitly asks for it (forced drains, `preload`).
//! - [`UsageError`]: caller misuse detected while *defining* a load. Always returned
//!   synchronously and never retried.
//!
//! Both types provide `as_label` for logs and `as_message` for human readable output.

use std::time::Duration;
use thiserror::Error;

/// Sentinel message carried by [`LoadError::Timeout`].
///
/// External code can compare `err.to_string()` against it to tell "timed out" apart from the
/// loader's own errors.
pub const TIMEOUT_ERR: &str = "_t";

/// # Errors produced by a load.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The loader itself failed. Displays the loader's message verbatim.
    #[error("{error}")]
    Failed {
        /// The loader's error message.
        error: String,
    },

    /// An attempt exceeded its per-attempt timeout while `fail_on_timeout` was set.
    #[error("{}", TIMEOUT_ERR)]
    Timeout {
        /// The per-attempt timeout that was exceeded.
        timeout: Duration,
    },

    /// The loader panicked while producing its value.
    #[error("loader panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },
}

impl LoadError {
    /// Shorthand for [`LoadError::Failed`].
    ///
    /// # Example
    /// ```
    /// use loadvisor::LoadError;
    ///
    /// let err = LoadError::failed("boom");
    /// assert_eq!(err.to_string(), "boom");
    /// ```
    pub fn failed(error: impl Into<String>) -> Self {
        LoadError::Failed {
            error: error.into(),
        }
    }

    /// Returns `true` for the timeout sentinel.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LoadError::Timeout { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use loadvisor::LoadError;
    /// use std::time::Duration;
    ///
    /// let err = LoadError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "load_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::Failed { .. } => "load_failed",
            LoadError::Timeout { .. } => "load_timeout",
            LoadError::Panicked { .. } => "load_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoadError::Failed { error } => format!("error: {error}"),
            LoadError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            LoadError::Panicked { info } => format!("panic: {info}"),
        }
    }

    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        LoadError::Panicked { info }
    }
}

/// # Errors raised when a load is defined incorrectly.
///
/// Returned synchronously by builders; a definition that fails validation never starts loading
/// and is never registered.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// A single-loader definition was built without a loader.
    #[error("`{name}` requires a loader")]
    MissingLoader {
        /// Definition name.
        name: String,
    },

    /// A keyed definition was built without any loaders.
    #[error("`{name}` requires a map of loaders")]
    EmptyLoaderMap {
        /// Definition name.
        name: String,
    },

    /// The same key was given to two loaders of one keyed definition.
    #[error("`{name}` has more than one loader for key `{key}`")]
    DuplicateKey {
        /// Definition name.
        name: String,
        /// The repeated key.
        key: String,
    },

    /// The hoist option was given to a keyed definition.
    #[error("`{name}` does not support the hoist option")]
    HoistUnsupported {
        /// Definition name.
        name: String,
    },
}

impl UsageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            UsageError::MissingLoader { .. } => "usage_missing_loader",
            UsageError::EmptyLoaderMap { .. } => "usage_empty_loader_map",
            UsageError::DuplicateKey { .. } => "usage_duplicate_key",
            UsageError::HoistUnsupported { .. } => "usage_hoist_unsupported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_displays_loader_message() {
        assert_eq!(LoadError::failed("boom").to_string(), "boom");
    }

    #[test]
    fn test_timeout_displays_sentinel() {
        let err = LoadError::Timeout {
            timeout: Duration::from_millis(400),
        };
        assert_eq!(err.to_string(), TIMEOUT_ERR);
        assert!(err.is_timeout());
        assert!(!LoadError::failed(TIMEOUT_ERR).is_timeout());
    }

    #[test]
    fn test_panic_payload_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad module");
        assert_eq!(
            LoadError::from_panic(payload.as_ref()),
            LoadError::Panicked {
                info: "bad module".into()
            }
        );

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(LoadError::from_panic(payload.as_ref()).as_label(), "load_panicked");
    }

    #[test]
    fn test_usage_error_labels() {
        let err = UsageError::DuplicateKey {
            name: "widgets".into(),
            key: "a".into(),
        };
        assert_eq!(err.as_label(), "usage_duplicate_key");
        assert_eq!(err.to_string(), "`widgets` has more than one loader for key `a`");
    }
}
