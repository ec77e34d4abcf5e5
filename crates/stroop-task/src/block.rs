//! Blocks: a balanced, shuffled run of trials.

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand::seq::{IndexedRandom, SliceRandom};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use trial_kernel::{Devices, StimBank, TrialRecord};

use crate::settings::TaskSettings;
use crate::trial::{BlockContext, TrialCounter, run_trial};

/// Spread `n` trials evenly over `conditions`, then shuffle.
///
/// Each condition appears `n / len` times; the remainder is filled with
/// distinct conditions drawn without replacement.
pub fn balanced_conditions<R: Rng + ?Sized>(conditions: &[String], n: usize, rng: &mut R) -> Vec<String> {
    if conditions.is_empty() {
        return Vec::new();
    }
    let repeats = n / conditions.len();
    let remainder = n % conditions.len();

    let mut sequence: Vec<String> = conditions
        .iter()
        .flat_map(|condition| std::iter::repeat_n(condition.clone(), repeats))
        .collect();
    sequence.extend(conditions.choose_multiple(rng, remainder).cloned());
    sequence.shuffle(rng);
    sequence
}

/// Per-block results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_id: String,
    pub block_idx: usize,
    pub n_trials: usize,
    pub hits: usize,
    /// Fraction of trials answered with the correct key
    pub accuracy: f64,
}

/// One block of trials.
pub struct BlockUnit<'a> {
    settings: &'a TaskSettings,
    context: BlockContext,
    conditions: Vec<String>,
    trials: Vec<TrialRecord>,
}

impl<'a> BlockUnit<'a> {
    /// A block seeded from `overall_seed + block_idx`, so every block of a
    /// session gets its own reproducible order and jitter.
    pub fn new(block_idx: usize, settings: &'a TaskSettings) -> Self {
        let seed = settings.overall_seed.wrapping_add(block_idx as u64);
        Self {
            settings,
            context: BlockContext {
                block_id: format!("block_{}", block_idx),
                block_idx,
                rng: ChaCha8Rng::seed_from_u64(seed),
            },
            conditions: Vec::new(),
            trials: Vec::new(),
        }
    }

    pub fn generate_conditions(mut self) -> Self {
        self.conditions = balanced_conditions(
            &self.settings.conditions,
            self.settings.trials_per_block,
            &mut self.context.rng,
        );
        self
    }

    pub fn block_id(&self) -> &str {
        &self.context.block_id
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    /// Run every generated condition as a trial.
    pub fn run(&mut self, devices: &mut Devices, stim_bank: &StimBank, counter: &mut TrialCounter) -> Result<&mut Self> {
        let triggers = &self.settings.triggers;
        devices.send_trigger(triggers.get("block_onset").as_ref())?;

        for condition in &self.conditions {
            let trial = run_trial(
                devices,
                self.settings,
                stim_bank,
                condition,
                &mut self.context,
                counter.next_id(),
            )?;
            self.trials.push(trial);
        }

        devices.send_trigger(triggers.get("block_end").as_ref())?;

        let summary = self.summary();
        info!(
            block = %summary.block_id,
            trials = summary.n_trials,
            accuracy = summary.accuracy,
            "Block complete"
        );
        Ok(self)
    }

    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    pub fn into_trials(self) -> Vec<TrialRecord> {
        self.trials
    }

    /// Fraction of trials with `stimulus_hit` set; 0 for an empty block.
    pub fn accuracy(&self) -> f64 {
        if self.trials.is_empty() {
            return 0.0;
        }
        self.hits() as f64 / self.trials.len() as f64
    }

    fn hits(&self) -> usize {
        self.trials.iter().filter(|t| t.flag("stimulus_hit")).count()
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            block_id: self.context.block_id.clone(),
            block_idx: self.context.block_idx,
            n_trials: self.trials.len(),
            hits: self.hits(),
            accuracy: self.accuracy(),
        }
    }
}
