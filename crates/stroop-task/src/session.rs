//! Session orchestration: instructions, blocks, goodbye.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use trial_kernel::device::{Clock, HeadlessDisplay, MockTriggerSink, ResponderInput, TriggerEvent, VirtualClock, WallClock};
use trial_kernel::{Devices, SessionInfo, StimUnit, TrialRecord};

use crate::block::{BlockSummary, BlockUnit};
use crate::responder::{ResponderConfig, ScriptedConfig};
use crate::settings::ExperimentConfig;
use crate::trial::TrialCounter;

/// How a session is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Scripted walk-through that exercises every screen quickly
    Qa,
    /// Simulated participant from `[sim.responder]`
    Sim,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qa => "qa",
            Self::Sim => "sim",
        }
    }

    /// Config file used when none is given.
    pub fn default_config(&self) -> &'static str {
        match self {
            Self::Qa => "config/config_qa.toml",
            Self::Sim => "config/config_scripted_sim.toml",
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "qa" => Ok(Self::Qa),
            "sim" => Ok(Self::Sim),
            "human" => bail!("Human mode needs a display and keyboard; use qa or sim"),
            other => bail!("Unknown mode: {}. Use qa or sim", other),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a finished session produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub session: SessionInfo,
    pub responder: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub trials: Vec<TrialRecord>,
    pub blocks: Vec<BlockSummary>,
    /// Triggers sent, in order; empty when the sink keeps no log
    pub triggers: Vec<TriggerEvent>,
    /// Session time at exit, in seconds
    pub duration_s: f64,
}

/// Runs sessions of one experiment configuration.
pub struct SessionRunner {
    config: ExperimentConfig,
}

impl SessionRunner {
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Responder that drives a session in `mode`. QA always runs scripted.
    pub fn responder_config(&self, mode: Mode) -> ResponderConfig {
        match mode {
            Mode::Qa => match &self.config.sim.responder {
                ResponderConfig::Scripted(scripted) => ResponderConfig::Scripted(scripted.clone()),
                _ => ResponderConfig::Scripted(ScriptedConfig::default()),
            },
            Mode::Sim => self.config.sim.responder.clone(),
        }
    }

    /// Run a session on headless devices.
    ///
    /// `seed` overrides the configured responder seed. With `realtime` the
    /// session is paced by the wall clock instead of finishing instantly.
    pub fn run(&self, mode: Mode, seed: Option<u64>, realtime: bool) -> Result<SessionResult> {
        let seed = seed.unwrap_or_else(|| self.config.sim_seed());
        let participant_id = match mode {
            Mode::Qa => "qa".to_string(),
            Mode::Sim => self.config.sim.participant_id.clone(),
        };
        let session = SessionInfo::new(participant_id, mode.as_str(), seed);
        let responder = self.responder_config(mode);

        let clock: Box<dyn Clock> = if realtime {
            Box::new(WallClock::new())
        } else {
            Box::new(VirtualClock::new())
        };
        let sink = MockTriggerSink::new();
        let trigger_log = sink.log();
        let mut devices = Devices::new(
            clock,
            Box::new(HeadlessDisplay::new()),
            Box::new(ResponderInput::new(responder.build())),
            Box::new(sink),
        );

        let mut result = self.run_with(&mut devices, &session, responder.kind())?;
        result.triggers = trigger_log
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?
            .clone();
        Ok(result)
    }

    /// Run a session on caller-supplied devices.
    pub fn run_with(&self, devices: &mut Devices, session: &SessionInfo, responder: &str) -> Result<SessionResult> {
        let task = &self.config.task;
        let stim_bank = self.config.stim_bank();
        let started_at = Utc::now();

        info!(
            session = %session.session_id,
            participant = %session.participant_id,
            mode = %session.mode,
            seed = session.seed,
            responder = responder,
            "Session starting"
        );

        devices
            .input
            .start_session(session, Box::new(ChaCha8Rng::seed_from_u64(session.seed)))?;
        devices.send_trigger(task.triggers.get("exp_onset").as_ref())?;

        StimUnit::new("instruction_text")
            .add_stim(stim_bank.get("instruction_text")?)
            .wait_and_continue(devices, &task.continue_keys)?;

        let mut counter = TrialCounter::new();
        let mut trials = Vec::with_capacity(task.total_trials());
        let mut blocks = Vec::with_capacity(task.total_blocks);

        for block_idx in 0..task.total_blocks {
            let mut block = BlockUnit::new(block_idx, task).generate_conditions();
            block.run(devices, &stim_bank, &mut counter)?;
            let summary = block.summary();

            let block_break = stim_bank.get_and_format(
                "block_break",
                &[
                    ("block_num", (block_idx + 1).to_string()),
                    ("total_blocks", task.total_blocks.to_string()),
                    ("accuracy", format!("{:.2}", summary.accuracy)),
                ],
            )?;
            StimUnit::new("block_feedback")
                .add_stim(block_break)
                .wait_and_continue(devices, &task.continue_keys)?;

            trials.extend(block.into_trials());
            blocks.push(summary);
        }

        StimUnit::new("goodbye")
            .add_stim(stim_bank.get("good_bye")?)
            .wait_and_continue(devices, &task.continue_keys)?;
        devices.send_trigger(task.triggers.get("exp_end").as_ref())?;

        devices.triggers.close()?;
        devices.input.end_session()?;

        let duration_s = devices.clock.now();
        info!(
            trials = trials.len(),
            blocks = blocks.len(),
            duration_s = duration_s,
            "Session complete"
        );

        Ok(SessionResult {
            session: session.clone(),
            responder: responder.to_string(),
            started_at,
            ended_at: Utc::now(),
            trials,
            blocks,
            triggers: Vec::new(),
            duration_s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn small_config() -> ExperimentConfig {
        let mut config = testing::config();
        config.task.total_blocks = 2;
        config.task.trials_per_block = 8;
        config
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("qa".parse::<Mode>().unwrap(), Mode::Qa);
        assert_eq!("SIM".parse::<Mode>().unwrap(), Mode::Sim);
        assert!("human".parse::<Mode>().is_err());
        assert!("robot".parse::<Mode>().is_err());
        assert_eq!(Mode::Sim.default_config(), "config/config_scripted_sim.toml");
    }

    #[test]
    fn test_runner_rejects_invalid_config() {
        let mut config = small_config();
        config.task.trials_per_block = 0;
        assert!(SessionRunner::new(config).is_err());
    }

    #[test]
    fn test_sim_session_produces_every_trial() {
        let runner = SessionRunner::new(small_config()).unwrap();
        let result = runner.run(Mode::Sim, Some(7), false).unwrap();

        assert_eq!(result.trials.len(), 16);
        assert_eq!(result.blocks.len(), 2);
        assert_eq!(result.responder, "stroop_sampler");
        assert_eq!(result.session.seed, 7);

        let ids: Vec<u64> = result
            .trials
            .iter()
            .filter_map(|t| t.get("trial_id").and_then(|v| v.as_u64()))
            .collect();
        assert_eq!(ids, (1..=16).collect::<Vec<u64>>());

        let events: Vec<&str> = result.triggers.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(events.first(), Some(&"exp_onset"));
        assert_eq!(events.last(), Some(&"exp_end"));
        assert_eq!(events.iter().filter(|e| **e == "block_onset").count(), 2);
        assert_eq!(events.iter().filter(|e| **e == "fixation_onset").count(), 16);
    }

    #[test]
    fn test_same_seed_replays_same_responses() {
        let runner = SessionRunner::new(small_config()).unwrap();
        let responses = |seed| {
            runner
                .run(Mode::Sim, Some(seed), false)
                .unwrap()
                .trials
                .iter()
                .map(|t| (t.get("stimulus_key_press").cloned(), t.get("stimulus_rt").cloned()))
                .collect::<Vec<_>>()
        };
        assert_eq!(responses(99), responses(99));
    }

    #[test]
    fn test_qa_session_uses_scripted_responder() {
        let runner = SessionRunner::new(small_config()).unwrap();
        let result = runner.run(Mode::Qa, None, false).unwrap();

        assert_eq!(result.session.participant_id, "qa");
        assert_eq!(result.responder, "scripted");
        // Scripted presses "f": exactly the red trials are hits
        for trial in &result.trials {
            let red = trial.get("color").and_then(|v| v.as_str()) == Some("red");
            assert_eq!(trial.flag("stimulus_hit"), red);
        }
    }

    #[test]
    fn test_session_time_covers_all_phases() {
        let mut config = small_config();
        config.task.fixation_duration = trial_kernel::DurationSpec::Fixed(0.5);
        let runner = SessionRunner::new(config).unwrap();
        let result = runner.run(Mode::Qa, None, false).unwrap();

        // 4 continue screens at 0.25s; 16 trials of 0.5 + 0.3 + 0.5 + 0.8
        let expected = 4.0 * 0.25 + 16.0 * (0.5 + 0.3 + 0.5 + 0.8);
        assert!((result.duration_s - expected).abs() < 1e-6, "duration {}", result.duration_s);
    }
}
