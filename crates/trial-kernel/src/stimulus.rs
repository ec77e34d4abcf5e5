//! Stimulus bank: named, preconfigured stimuli looked up by phase.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};

fn default_color() -> String {
    "white".to_string()
}

/// Configuration for one stimulus as written in the task's `[stimuli]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusConfig {
    /// Text drawn on screen; may contain `{field}` placeholders
    pub text: String,
    /// Ink color name
    #[serde(default = "default_color")]
    pub color: String,
    /// Letter height in display units
    #[serde(default)]
    pub height: Option<f64>,
}

impl StimulusConfig {
    pub fn text(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: color.into(),
            height: None,
        }
    }
}

/// A stimulus ready to be drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub name: String,
    pub text: String,
    pub color: String,
    pub height: Option<f64>,
}

impl Stimulus {
    fn from_config(name: &str, config: &StimulusConfig) -> Self {
        Self {
            name: name.to_string(),
            text: config.text.clone(),
            color: config.color.clone(),
            height: config.height,
        }
    }
}

/// Named stimuli for a task.
#[derive(Debug, Clone, Default)]
pub struct StimBank {
    entries: BTreeMap<String, StimulusConfig>,
}

impl StimBank {
    /// Create a bank from configured entries.
    pub fn new(entries: BTreeMap<String, StimulusConfig>) -> Self {
        Self { entries }
    }

    /// Look up a stimulus by name.
    pub fn get(&self, name: &str) -> KernelResult<Stimulus> {
        self.entries
            .get(name)
            .map(|config| Stimulus::from_config(name, config))
            .ok_or_else(|| KernelError::UnknownStimulus(name.to_string()))
    }

    /// Look up a stimulus and fill its `{field}` placeholders.
    ///
    /// Placeholders without a matching field are left untouched.
    pub fn get_and_format(&self, name: &str, fields: &[(&str, String)]) -> KernelResult<Stimulus> {
        let mut stim = self.get(name)?;
        for (field, value) in fields {
            stim.text = stim.text.replace(&format!("{{{}}}", field), value);
        }
        Ok(stim)
    }

    /// Ensure every name in `required` is defined.
    pub fn require<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> KernelResult<()> {
        for name in required {
            if !self.entries.contains_key(name) {
                return Err(KernelError::UnknownStimulus(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
