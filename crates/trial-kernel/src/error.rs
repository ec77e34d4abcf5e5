//! Error types for kernel operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the kernel's own bookkeeping.
///
/// Device failures are reported through `anyhow::Error` by the device traits;
/// these variants cover configuration, stimulus lookup and record keeping.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A stimulus name was requested that the bank does not define.
    #[error("Unknown stimulus: {0}")]
    UnknownStimulus(String),

    /// A phase tried to write a field an earlier phase already wrote.
    #[error("Record field '{key}' already written by an earlier phase")]
    DuplicateField {
        /// The colliding field name
        key: String,
    },

    /// A duration setting is negative, non-finite or an inverted range.
    #[error("Invalid duration for {name}: {reason}")]
    InvalidDuration {
        /// Setting name (e.g. "stim_duration")
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// An observation payload could not be decoded.
    #[error("Malformed observation: {0}")]
    MalformedObservation(#[from] serde_json::Error),

    /// A configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl KernelError {
    /// Create an InvalidDuration error.
    pub fn invalid_duration(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
