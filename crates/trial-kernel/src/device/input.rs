//! Input sources: where key presses come from.

use anyhow::Result;
use rand::RngCore;
use tracing::{debug, warn};

use crate::sim::{Action, Feedback, Observation, Responder, SessionInfo};

/// A key press measured from the onset of the phase that accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub key: String,
    pub rt_s: f64,
}

/// A source of key presses.
pub trait InputSource: Send {
    /// Begin a session; simulated inputs bind their generator here.
    fn start_session(&mut self, session: &SessionInfo, rng: Box<dyn RngCore + Send>) -> Result<()>;

    /// Wait for the first key in `observation.valid_keys`.
    ///
    /// `window_s` bounds the wait; `None` waits without a limit. Returns
    /// `None` when no valid key arrives in time. The caller owns the clock:
    /// this method reports the reaction time and does not advance time.
    fn wait_for_key(&mut self, observation: &Observation, window_s: Option<f64>) -> Result<Option<KeyPress>>;

    /// Report how the last response window ended.
    fn feedback(&mut self, _feedback: &Feedback) -> Result<()> {
        Ok(())
    }

    fn end_session(&mut self) -> Result<()>;
}

/// Input driven by a simulated participant.
///
/// Actions are screened the way a keyboard would screen them: keys outside
/// the offered set are ignored, and a press whose reaction time falls outside
/// the window never arrives.
pub struct ResponderInput {
    responder: Box<dyn Responder>,
    last_action: Option<Action>,
}

impl ResponderInput {
    pub fn new(responder: Box<dyn Responder>) -> Self {
        Self {
            responder,
            last_action: None,
        }
    }

    /// The action returned for the most recent observation.
    pub fn last_action(&self) -> Option<&Action> {
        self.last_action.as_ref()
    }

    fn screen(action: &Action, observation: &Observation, window_s: Option<f64>) -> Option<KeyPress> {
        let key = action.key.as_ref()?;
        if !observation.valid_keys.contains(key) {
            warn!(key = %key, phase = %observation.phase, "Responder pressed a key the phase does not accept");
            return None;
        }

        let rt_s = action.rt_s.unwrap_or(0.0).max(0.0);
        if let Some(window) = window_s
            && rt_s > window
        {
            debug!(rt_s = rt_s, window_s = window, "Simulated press fell outside the response window");
            return None;
        }

        Some(KeyPress {
            key: key.clone(),
            rt_s,
        })
    }
}

impl InputSource for ResponderInput {
    fn start_session(&mut self, session: &SessionInfo, rng: Box<dyn RngCore + Send>) -> Result<()> {
        debug!(
            responder = self.responder.name(),
            session_id = %session.session_id,
            seed = session.seed,
            "Starting responder session"
        );
        self.responder.start_session(session, rng);
        Ok(())
    }

    fn wait_for_key(&mut self, observation: &Observation, window_s: Option<f64>) -> Result<Option<KeyPress>> {
        let action = self.responder.act(observation);
        debug!(
            phase = %observation.phase,
            key = ?action.key,
            rt_s = ?action.rt_s,
            meta = %serde_json::Value::Object(action.meta.clone()),
            "Responder action"
        );
        let press = Self::screen(&action, observation, window_s);
        self.last_action = Some(action);
        Ok(press)
    }

    fn feedback(&mut self, feedback: &Feedback) -> Result<()> {
        self.responder.on_feedback(feedback);
        Ok(())
    }

    fn end_session(&mut self) -> Result<()> {
        self.responder.end_session();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::Map;

    /// Replays a fixed action for every observation.
    struct FixedResponder {
        action: Action,
    }

    impl Responder for FixedResponder {
        fn name(&self) -> &str {
            "fixed"
        }

        fn start_session(&mut self, _session: &SessionInfo, _rng: Box<dyn RngCore + Send>) {}

        fn act(&mut self, _observation: &Observation) -> Action {
            self.action.clone()
        }
    }

    fn input(key: Option<&str>, rt_s: Option<f64>) -> ResponderInput {
        let action = Action {
            key: key.map(str::to_string),
            rt_s,
            meta: Map::new(),
        };
        let mut input = ResponderInput::new(Box::new(FixedResponder { action }));
        let session = SessionInfo::new("test", "sim", 1);
        input
            .start_session(&session, Box::new(ChaCha8Rng::seed_from_u64(1)))
            .unwrap();
        input
    }

    fn target() -> Observation {
        Observation::new("target").with_valid_keys(&["f".to_string(), "j".to_string()])
    }

    #[test]
    fn test_valid_press_inside_window() {
        let mut input = input(Some("f"), Some(0.4));
        let press = input.wait_for_key(&target(), Some(2.0)).unwrap();
        assert_eq!(
            press,
            Some(KeyPress {
                key: "f".to_string(),
                rt_s: 0.4
            })
        );
        assert_eq!(input.last_action().unwrap().key.as_deref(), Some("f"));
    }

    #[test]
    fn test_press_after_window_is_dropped() {
        let mut input = input(Some("f"), Some(2.5));
        assert!(input.wait_for_key(&target(), Some(2.0)).unwrap().is_none());
        // Untimed waits accept any reaction time
        assert!(input.wait_for_key(&target(), None).unwrap().is_some());
    }

    #[test]
    fn test_unoffered_key_is_ignored() {
        let mut input = input(Some("space"), Some(0.3));
        assert!(input.wait_for_key(&target(), Some(2.0)).unwrap().is_none());
    }

    #[test]
    fn test_withheld_action_is_no_press() {
        let mut input = input(None, None);
        assert!(input.wait_for_key(&target(), Some(2.0)).unwrap().is_none());
    }
}
