//! Configuration primitives shared by every task.
//!
//! Tasks define their own settings tables; the kernel contributes the pieces
//! whose semantics it owns: phase durations, the trigger map, and TOML loading.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

/// Duration of a phase in seconds.
///
/// Written in TOML either as a number (`stim_duration = 2.0`) or as a jitter
/// range (`fixation_duration = [0.5, 0.7]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    /// Always the same number of seconds
    Fixed(f64),
    /// Uniformly sampled from `[min, max]` each time the phase runs
    Range([f64; 2]),
}

impl DurationSpec {
    /// Resolve the duration for one phase.
    ///
    /// Fixed durations never touch the generator, so a task with no jitter
    /// consumes no randomness here.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Fixed(seconds) => seconds,
            Self::Range([min, max]) if max > min => rng.random_range(min..=max),
            Self::Range([min, _]) => min,
        }
    }

    /// Latest moment the phase can end, used as the response deadline.
    pub fn deadline(&self) -> f64 {
        match *self {
            Self::Fixed(seconds) => seconds,
            Self::Range([min, max]) => min.max(max),
        }
    }

    /// Check that the duration is finite, non-negative and ordered.
    pub fn validate(&self, name: &str) -> KernelResult<()> {
        let bounds: &[f64] = match self {
            Self::Fixed(seconds) => std::slice::from_ref(seconds),
            Self::Range(range) => range,
        };
        for value in bounds {
            if !value.is_finite() {
                return Err(KernelError::invalid_duration(name, "must be finite"));
            }
            if *value < 0.0 {
                return Err(KernelError::invalid_duration(name, "must be non-negative"));
            }
        }
        if let Self::Range([min, max]) = self
            && min > max
        {
            return Err(KernelError::invalid_duration(
                name,
                format!("range [{}, {}] is inverted", min, max),
            ));
        }
        Ok(())
    }
}

impl Default for DurationSpec {
    fn default() -> Self {
        Self::Fixed(0.0)
    }
}

/// A resolved trigger: the logical event name and the code sent for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub event: String,
    pub code: u8,
}

/// Mapping from logical event name to trigger code.
///
/// Lookups of names the map does not define resolve to `None` and the send
/// is skipped, so a task may reference events a given setup does not wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerMap {
    codes: BTreeMap<String, u8>,
}

impl TriggerMap {
    /// Build a trigger map from `(event, code)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u8)>) -> Self {
        Self {
            codes: pairs
                .into_iter()
                .map(|(event, code)| (event.to_string(), code))
                .collect(),
        }
    }

    /// Raw code for an event.
    pub fn code(&self, event: &str) -> Option<u8> {
        self.codes.get(event).copied()
    }

    /// Resolve an event into a sendable trigger.
    pub fn get(&self, event: &str) -> Option<Trigger> {
        self.code(event).map(|code| Trigger {
            event: event.to_string(),
            code,
        })
    }

    /// Number of configured events.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no events are configured.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Load any deserializable settings table from a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> KernelResult<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| KernelError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| KernelError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
