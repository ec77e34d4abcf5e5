//! Task configuration.
//!
//! A config file has four tables: `[task]` with the trigger map under
//! `[task.triggers]`, `[stimuli]`, `[sim]` and `[output]`. Every table has
//! defaults, so a file only needs to list what it changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use trial_kernel::config::load_toml;
use trial_kernel::{DurationSpec, StimBank, StimulusConfig, TriggerMap};

use crate::condition::Condition;
use crate::responder::ResponderConfig;

/// Stimuli the task draws besides one per condition.
pub const REQUIRED_STIMULI: [&str; 7] = [
    "fixation",
    "instruction_text",
    "block_break",
    "good_bye",
    "correct_feedback",
    "incorrect_feedback",
    "no_response_feedback",
];

/// Settings of the task itself (`[task]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub task_name: String,
    pub total_blocks: usize,
    pub trials_per_block: usize,
    /// Condition labels, balanced within each block
    pub conditions: Vec<String>,
    /// Keys monitored during the target phase
    pub key_list: Vec<String>,
    pub red_key: String,
    pub green_key: String,
    /// Keys that dismiss instruction, block-break and goodbye screens
    pub continue_keys: Vec<String>,
    pub fixation_duration: DurationSpec,
    pub stim_duration: DurationSpec,
    pub feedback_duration: DurationSpec,
    pub iti_duration: DurationSpec,
    /// Seed of the task's own generator (block order, duration jitter)
    pub overall_seed: u64,
    pub triggers: TriggerMap,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            task_name: "stroop".to_string(),
            total_blocks: 2,
            trials_per_block: 40,
            conditions: ["congruent_red", "congruent_green", "incongruent_red", "incongruent_green"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            key_list: vec!["f".to_string(), "j".to_string()],
            red_key: "f".to_string(),
            green_key: "j".to_string(),
            continue_keys: vec!["space".to_string()],
            fixation_duration: DurationSpec::Range([0.5, 0.7]),
            stim_duration: DurationSpec::Fixed(2.0),
            feedback_duration: DurationSpec::Fixed(0.5),
            iti_duration: DurationSpec::Fixed(0.8),
            overall_seed: 2025,
            triggers: TriggerMap::default(),
        }
    }
}

impl TaskSettings {
    /// Total number of trials in a session.
    pub fn total_trials(&self) -> usize {
        self.total_blocks * self.trials_per_block
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_blocks == 0 {
            bail!("total_blocks must be at least 1");
        }
        if self.trials_per_block == 0 {
            bail!("trials_per_block must be at least 1");
        }
        if self.conditions.is_empty() {
            bail!("conditions must not be empty");
        }
        for condition in &self.conditions {
            Condition::parse(condition)?;
        }
        if self.key_list.is_empty() {
            bail!("key_list must not be empty");
        }
        for (name, key) in [("red_key", &self.red_key), ("green_key", &self.green_key)] {
            if !self.key_list.contains(key) {
                bail!("{} '{}' is not in key_list {:?}", name, key, self.key_list);
            }
        }
        if self.red_key == self.green_key {
            bail!("red_key and green_key must differ (both '{}')", self.red_key);
        }
        for (name, duration) in [
            ("fixation_duration", &self.fixation_duration),
            ("stim_duration", &self.stim_duration),
            ("feedback_duration", &self.feedback_duration),
            ("iti_duration", &self.iti_duration),
        ] {
            duration.validate(name)?;
        }
        Ok(())
    }
}

/// Simulated participant (`[sim]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub participant_id: String,
    /// Responder seed; falls back to the task's `overall_seed`
    pub seed: Option<u64>,
    pub responder: ResponderConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            participant_id: "sim001".to_string(),
            seed: None,
            responder: ResponderConfig::default(),
        }
    }
}

/// Where results are written (`[output]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
        }
    }
}

/// A complete experiment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub task: TaskSettings,
    pub stimuli: BTreeMap<String, StimulusConfig>,
    pub sim: SimConfig,
    pub output: OutputConfig,
}

impl ExperimentConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = load_toml(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.task.validate()?;

        let bank = self.stim_bank();
        bank.require(REQUIRED_STIMULI)?;
        bank.require(self.task.conditions.iter().map(String::as_str))?;

        if let ResponderConfig::StroopSampler(params) = &self.sim.responder
            && (params.red_key != self.task.red_key || params.green_key != self.task.green_key)
        {
            bail!(
                "sim.responder keys (red '{}', green '{}') do not match task keys (red '{}', green '{}')",
                params.red_key,
                params.green_key,
                self.task.red_key,
                self.task.green_key
            );
        }
        Ok(())
    }

    pub fn stim_bank(&self) -> StimBank {
        StimBank::new(self.stimuli.clone())
    }

    /// Seed for the responder's generator.
    pub fn sim_seed(&self) -> u64 {
        self.sim.seed.unwrap_or(self.task.overall_seed)
    }
}
