//! Simulated participants for the Stroop task.
//!
//! `StroopSamplerResponder` models the interference effect: incongruent
//! trials are answered less accurately and more slowly than congruent ones.
//! `ScriptedResponder` is a deterministic stand-in used for QA runs.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;
use trial_kernel::{Action, Observation, Responder, SessionInfo};

/// Phases that only need a continue key.
pub const CONTINUE_PHASES: [&str; 4] = ["instruction_text", "block", "goodbye", "block_feedback"];

/// Phase in which the colored word is shown.
pub const TARGET_PHASE: &str = "target";

fn is_continue_phase(phase: &str) -> bool {
    CONTINUE_PHASES.contains(&phase)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parameters of the sampling responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StroopSamplerConfig {
    pub red_key: String,
    pub green_key: String,
    pub p_correct_congruent: f64,
    pub p_correct_incongruent: f64,
    pub p_miss: f64,
    pub rt_congruent_mean_s: f64,
    pub rt_incongruent_mean_s: f64,
    pub rt_sd_s: f64,
    pub rt_min_s: f64,
    pub continue_rt_s: f64,
}

impl Default for StroopSamplerConfig {
    fn default() -> Self {
        Self {
            red_key: "f".to_string(),
            green_key: "j".to_string(),
            p_correct_congruent: 0.90,
            p_correct_incongruent: 0.78,
            p_miss: 0.05,
            rt_congruent_mean_s: 0.35,
            rt_incongruent_mean_s: 0.44,
            rt_sd_s: 0.07,
            rt_min_s: 0.12,
            continue_rt_s: 0.25,
        }
    }
}

/// Parameters of the scripted QA responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedConfig {
    /// Reaction time on target phases
    pub rt_s: f64,
    pub continue_rt_s: f64,
}

impl Default for ScriptedConfig {
    fn default() -> Self {
        Self {
            rt_s: 0.3,
            continue_rt_s: 0.25,
        }
    }
}

/// Which responder drives a simulated session, as written in `[sim.responder]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponderConfig {
    StroopSampler(StroopSamplerConfig),
    Scripted(ScriptedConfig),
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self::StroopSampler(StroopSamplerConfig::default())
    }
}

impl ResponderConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StroopSampler(_) => StroopSamplerResponder::SOURCE,
            Self::Scripted(_) => ScriptedResponder::SOURCE,
        }
    }

    pub fn build(&self) -> Box<dyn Responder> {
        match self {
            Self::StroopSampler(config) => Box::new(StroopSamplerResponder::new(config.clone())),
            Self::Scripted(config) => Box::new(ScriptedResponder::new(config.clone())),
        }
    }
}

/// Samples accuracy and reaction time from congruency-dependent distributions.
///
/// All randomness comes from the generator bound in `start_session`. Per
/// target phase the draws are consumed in a fixed order: the miss draw, then
/// the correctness draw, then the reaction time. Branches that stop early
/// consume fewer draws.
pub struct StroopSamplerResponder {
    config: StroopSamplerConfig,
    rng: Option<Box<dyn RngCore + Send>>,
}

impl StroopSamplerResponder {
    pub const SOURCE: &'static str = "stroop_sampler";

    pub fn new(mut config: StroopSamplerConfig) -> Self {
        config.rt_sd_s = config.rt_sd_s.max(1e-6);
        config.rt_min_s = config.rt_min_s.max(0.0);
        Self { config, rng: None }
    }

    /// Parameters after clamping.
    pub fn config(&self) -> &StroopSamplerConfig {
        &self.config
    }

    fn meta(entries: &[(&str, &str)]) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("source".to_string(), json!(Self::SOURCE));
        for (key, value) in entries {
            meta.insert(key.to_string(), json!(value));
        }
        meta
    }

    fn act_continue(&self, phase: &str, valid_keys: &[String]) -> Action {
        match valid_keys.first() {
            Some(key) => Action::press(
                key.clone(),
                self.config.continue_rt_s.max(0.01),
                Self::meta(&[("phase", phase)]),
            ),
            None => Action::withhold(Self::meta(&[("phase", phase), ("reason", "no_valid_key")])),
        }
    }

    fn act_target(&mut self, observation: &Observation) -> Action {
        let condition = normalize(observation.condition_id.as_deref().unwrap_or(""));
        let outcome = |outcome: &str| {
            Self::meta(&[
                ("phase", TARGET_PHASE),
                ("condition", condition.as_str()),
                ("outcome", outcome),
            ])
        };

        let Some(rng) = self.rng.as_mut() else {
            return Action::withhold(Self::meta(&[
                ("phase", TARGET_PHASE),
                ("condition", condition.as_str()),
                ("reason", "no_session"),
            ]));
        };

        let config = &self.config;
        let congruent = condition.starts_with("congruent");
        let correct_key = if condition.ends_with("red") {
            &config.red_key
        } else {
            &config.green_key
        };

        if rng.random::<f64>() < config.p_miss {
            return Action::withhold(outcome("miss"));
        }

        let p_correct = if congruent {
            config.p_correct_congruent
        } else {
            config.p_correct_incongruent
        };
        let valid_keys = &observation.valid_keys;
        let (key, label) = if rng.random::<f64>() <= p_correct {
            match pick_key(valid_keys, Some(correct_key)) {
                Some(key) => (key, "correct"),
                None => return Action::withhold(outcome("miss")),
            }
        } else {
            let alternatives: Vec<String> = valid_keys
                .iter()
                .filter(|key| *key != correct_key)
                .cloned()
                .collect();
            match pick_key(&alternatives, None) {
                Some(key) => (key, "error"),
                None => return Action::withhold(outcome("miss")),
            }
        };

        let mean = if congruent {
            config.rt_congruent_mean_s
        } else {
            config.rt_incongruent_mean_s
        };
        let rt_s = sample_rt(rng, mean, config.rt_sd_s, config.rt_min_s);

        if let Some(deadline) = observation.deadline()
            && rt_s > deadline
        {
            debug!(condition = %condition, rt_s, deadline, "Sampled response too late");
            return Action::withhold(outcome("late"));
        }

        Action::press(key, rt_s, outcome(label))
    }
}

impl Responder for StroopSamplerResponder {
    fn name(&self) -> &str {
        Self::SOURCE
    }

    fn start_session(&mut self, session: &SessionInfo, rng: Box<dyn RngCore + Send>) {
        debug!(session = %session.session_id, seed = session.seed, "Responder session started");
        self.rng = Some(rng);
    }

    fn act(&mut self, observation: &Observation) -> Action {
        let phase = normalize(&observation.phase);
        if is_continue_phase(&phase) {
            self.act_continue(&phase, &observation.valid_keys)
        } else if phase == TARGET_PHASE {
            self.act_target(observation)
        } else {
            Action::withhold(Self::meta(&[("phase", phase.as_str()), ("reason", "withhold")]))
        }
    }

    fn end_session(&mut self) {
        self.rng = None;
    }
}

/// First of `keys`, unless `preferred` is among them.
fn pick_key(keys: &[String], preferred: Option<&String>) -> Option<String> {
    if let Some(key) = preferred
        && keys.contains(key)
    {
        return Some(key.clone());
    }
    keys.first().cloned()
}

/// Normal reaction time floored at `min_s`.
fn sample_rt<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64, min_s: f64) -> f64 {
    let sampled = match Normal::new(mean, sd) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    };
    sampled.max(min_s)
}

/// Presses the first offered key at fixed reaction times. Uses no randomness.
pub struct ScriptedResponder {
    config: ScriptedConfig,
}

impl ScriptedResponder {
    pub const SOURCE: &'static str = "scripted";

    pub fn new(config: ScriptedConfig) -> Self {
        Self { config }
    }

    fn press_first(&self, phase: &str, keys: &[String], rt_s: f64) -> Action {
        let mut meta = Map::new();
        meta.insert("source".to_string(), json!(Self::SOURCE));
        meta.insert("phase".to_string(), json!(phase));
        match keys.first() {
            Some(key) => Action::press(key.clone(), rt_s, meta),
            None => {
                meta.insert("reason".to_string(), json!("no_valid_key"));
                Action::withhold(meta)
            }
        }
    }
}

impl Responder for ScriptedResponder {
    fn name(&self) -> &str {
        Self::SOURCE
    }

    fn start_session(&mut self, _session: &SessionInfo, _rng: Box<dyn RngCore + Send>) {}

    fn act(&mut self, observation: &Observation) -> Action {
        let phase = normalize(&observation.phase);
        if is_continue_phase(&phase) {
            self.press_first(&phase, &observation.valid_keys, self.config.continue_rt_s.max(0.01))
        } else if phase == TARGET_PHASE {
            self.press_first(&phase, &observation.valid_keys, self.config.rt_s)
        } else {
            let mut meta = Map::new();
            meta.insert("source".to_string(), json!(Self::SOURCE));
            meta.insert("phase".to_string(), json!(phase));
            meta.insert("reason".to_string(), json!("withhold"));
            Action::withhold(meta)
        }
    }
}
