//! Simulation contracts: what a simulated participant sees and does.
//!
//! In simulation the input device does not read a keyboard. Instead it hands
//! an `Observation` of the current phase to a `Responder` and turns the
//! returned `Action` into a key press. Every type here is a plain value so
//! that observations and actions can be logged and replayed.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::KernelResult;

/// Snapshot of the phase a responder must decide on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Phase name (e.g. "target", "instruction_text", "block_feedback")
    pub phase: String,
    #[serde(default)]
    pub trial_id: Option<u64>,
    #[serde(default)]
    pub block_id: Option<String>,
    /// Condition label of the current trial
    #[serde(default)]
    pub condition_id: Option<String>,
    /// Keys the phase will accept
    #[serde(default)]
    pub valid_keys: Vec<String>,
    /// Latest response time the phase accepts, in seconds from onset
    #[serde(default)]
    pub deadline_s: Option<f64>,
    /// Length of the response window, in seconds
    #[serde(default)]
    pub response_window_s: Option<f64>,
    /// Task-specific factors for audit trails
    #[serde(default)]
    pub task_factors: Map<String, Value>,
    #[serde(default)]
    pub stim_id: Option<String>,
}

impl Observation {
    /// Create an observation for a phase with no trial context.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            ..Default::default()
        }
    }

    /// Decode an observation from a JSON payload.
    pub fn from_value(value: Value) -> KernelResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_valid_keys(mut self, keys: &[String]) -> Self {
        self.valid_keys = keys.to_vec();
        self
    }

    /// Deadline if known, otherwise the response window.
    pub fn deadline(&self) -> Option<f64> {
        self.deadline_s.or(self.response_window_s)
    }
}

/// A responder's decision for one observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub key: Option<String>,
    pub rt_s: Option<f64>,
    /// Why this action was chosen (source, phase or condition, outcome)
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl Action {
    /// Press `key` after `rt_s` seconds.
    pub fn press(key: impl Into<String>, rt_s: f64, meta: Map<String, Value>) -> Self {
        Self {
            key: Some(key.into()),
            rt_s: Some(rt_s),
            meta,
        }
    }

    /// Do nothing.
    pub fn withhold(meta: Map<String, Value>) -> Self {
        Self {
            key: None,
            rt_s: None,
            meta,
        }
    }

    pub fn outcome(&self) -> Option<&str> {
        self.meta.get("outcome").and_then(Value::as_str)
    }

    pub fn reason(&self) -> Option<&str> {
        self.meta.get("reason").and_then(Value::as_str)
    }
}

/// What happened after a response window closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub phase: String,
    pub condition_id: Option<String>,
    pub response: bool,
    pub hit: bool,
    pub rt_s: Option<f64>,
}

/// Identity of a simulated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub participant_id: String,
    pub mode: String,
    pub seed: u64,
}

impl SessionInfo {
    pub fn new(participant_id: impl Into<String>, mode: impl Into<String>, seed: u64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            participant_id: participant_id.into(),
            mode: mode.into(),
            seed,
        }
    }
}

/// A simulated participant.
///
/// All randomness a responder uses must come from the generator handed to
/// `start_session`, so that the same seed replays the same session.
pub trait Responder: Send {
    /// Name recorded as the action source.
    fn name(&self) -> &str;

    /// Bind the session's generator.
    fn start_session(&mut self, session: &SessionInfo, rng: Box<dyn RngCore + Send>);

    /// Decide what to do for one observation. Must not fail: when no sensible
    /// action exists, return a withheld action with a reason.
    fn act(&mut self, observation: &Observation) -> Action;

    /// Outcome of the last response window.
    fn on_feedback(&mut self, _feedback: &Feedback) {}

    fn end_session(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_observation_from_value() {
        let obs = Observation::from_value(json!({
            "phase": "target",
            "condition_id": "incongruent_red",
            "valid_keys": ["f", "j"],
            "response_window_s": 2.0
        }))
        .unwrap();

        assert_eq!(obs.phase, "target");
        assert_eq!(obs.valid_keys, vec!["f", "j"]);
        assert_eq!(obs.deadline(), Some(2.0));
        assert!(obs.trial_id.is_none());
    }

    #[test]
    fn test_observation_from_malformed_value() {
        assert!(Observation::from_value(json!({"phase": 3})).is_err());
        assert!(Observation::from_value(json!(["target"])).is_err());
    }

    #[test]
    fn test_deadline_prefers_explicit_deadline() {
        let obs = Observation {
            deadline_s: Some(1.0),
            response_window_s: Some(2.0),
            ..Observation::new("target")
        };
        assert_eq!(obs.deadline(), Some(1.0));
        assert_eq!(Observation::new("target").deadline(), None);
    }

    #[test]
    fn test_action_meta_accessors() {
        let mut meta = Map::new();
        meta.insert("outcome".to_string(), json!("late"));
        let action = Action::withhold(meta);
        assert_eq!(action.outcome(), Some("late"));
        assert_eq!(action.reason(), None);
        assert!(action.key.is_none());
    }
}
