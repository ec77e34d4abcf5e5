//! StimUnit: one presentation phase of a trial.
//!
//! A unit flips its stimuli onto the display once, sends its onset trigger,
//! and then either waits out a fixed duration (`show`), opens a response
//! window (`capture_response`), or waits for a continue key
//! (`wait_and_continue`). What it measured is kept as unit state and copied
//! into the trial record with `to_dict`, every field prefixed by the unit label.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Trigger;
use crate::device::{Devices, KeyPress};
use crate::error::KernelResult;
use crate::record::TrialRecord;
use crate::sim::{Feedback, Observation};
use crate::stimulus::Stimulus;

/// Parameters of a response window.
#[derive(Debug, Clone, Default)]
pub struct CaptureSpec {
    /// Keys the window accepts
    pub keys: Vec<String>,
    /// Keys that count as a hit
    pub correct_keys: Vec<String>,
    /// Window length in seconds
    pub duration: f64,
    pub onset_trigger: Option<Trigger>,
    /// Trigger sent when a given key is pressed
    pub response_triggers: BTreeMap<String, Trigger>,
    /// End the phase at the first valid key instead of waiting out the window
    pub terminate_on_response: bool,
}

/// One phase of a trial.
#[derive(Debug, Clone)]
pub struct StimUnit {
    label: String,
    stimuli: Vec<Stimulus>,
    context: Option<Observation>,
    state: Map<String, Value>,
}

impl StimUnit {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stimuli: Vec::new(),
            context: None,
            state: Map::new(),
        }
    }

    pub fn add_stim(mut self, stim: Stimulus) -> Self {
        self.stimuli.push(stim);
        self
    }

    /// Attach the trial context a simulated participant observes.
    pub fn with_context(mut self, context: Observation) -> Self {
        self.context = Some(context);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Present the stimuli for `duration` seconds. No response is collected.
    pub fn show(&mut self, devices: &mut Devices, duration: f64, onset_trigger: Option<&Trigger>) -> Result<&mut Self> {
        let onset = self.flip(devices)?;
        let trigger_code = devices.send_trigger(onset_trigger)?;

        devices.clock.wait(duration);
        self.record_timing(devices, onset, trigger_code);
        Ok(self)
    }

    /// Present the stimuli and collect the first valid key within the window.
    pub fn capture_response(&mut self, devices: &mut Devices, capture: &CaptureSpec) -> Result<&mut Self> {
        let onset = self.flip(devices)?;
        let trigger_code = devices.send_trigger(capture.onset_trigger.as_ref())?;

        let observation = self.observation(&capture.keys, Some(capture.duration));
        let press = devices
            .input
            .wait_for_key(&observation, Some(capture.duration))?
            .filter(|press| capture.keys.contains(&press.key));

        let mut response_code = None;
        let hit = match &press {
            Some(KeyPress { key, rt_s }) => {
                devices.clock.wait(*rt_s);
                response_code = devices.send_trigger(capture.response_triggers.get(key))?;
                if !capture.terminate_on_response {
                    devices.clock.wait(capture.duration - rt_s);
                }
                capture.correct_keys.contains(key)
            }
            None => {
                devices.clock.wait(capture.duration);
                false
            }
        };

        self.record_timing(devices, onset, trigger_code);
        self.set("response", press.is_some());
        self.set("key_press", press.as_ref().map(|p| p.key.clone()));
        self.set("rt", press.as_ref().map(|p| p.rt_s));
        self.set("hit", hit);
        self.set("correct_keys", capture.correct_keys.clone());
        self.set("response_trigger", response_code);

        debug!(
            label = %self.label,
            response = press.is_some(),
            hit = hit,
            rt_s = ?press.as_ref().map(|p| p.rt_s),
            "Response window closed"
        );

        devices.input.feedback(&Feedback {
            phase: observation.phase,
            condition_id: observation.condition_id,
            response: press.is_some(),
            hit,
            rt_s: press.map(|p| p.rt_s),
        })?;
        Ok(self)
    }

    /// Present the stimuli until a continue key arrives.
    ///
    /// A simulated participant that withholds does not stall the session:
    /// the unit logs it and moves on.
    pub fn wait_and_continue(&mut self, devices: &mut Devices, keys: &[String]) -> Result<&mut Self> {
        let onset = self.flip(devices)?;

        let observation = self.observation(keys, None);
        match devices.input.wait_for_key(&observation, None)? {
            Some(press) => {
                devices.clock.wait(press.rt_s);
                self.set("key_press", press.key);
            }
            None => {
                warn!(label = %self.label, "No continue key received; moving on");
                self.set("key_press", Value::Null);
            }
        }

        self.record_timing(devices, onset, None);
        Ok(self)
    }

    /// Read a state field by its unprefixed name (e.g. "response", "hit").
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Read a boolean state field; absent fields read as `false`.
    pub fn state_flag(&self, key: &str) -> bool {
        self.state.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Copy this unit's state into the trial record under `{label}_` keys.
    pub fn to_dict(&self, record: &mut TrialRecord) -> KernelResult<()> {
        let prefixed: Map<String, Value> = self
            .state
            .iter()
            .map(|(key, value)| (format!("{}_{}", self.label, key), value.clone()))
            .collect();
        record.merge(&prefixed)
    }

    fn flip(&self, devices: &mut Devices) -> Result<f64> {
        let onset = devices.clock.now();
        devices.display.flip(&self.label, &self.stimuli, onset)?;
        Ok(onset)
    }

    fn observation(&self, keys: &[String], window_s: Option<f64>) -> Observation {
        let mut observation = self
            .context
            .clone()
            .unwrap_or_else(|| Observation::new(self.label.clone()));
        observation.valid_keys = keys.to_vec();
        observation.response_window_s = window_s;
        if observation.stim_id.is_none() {
            observation.stim_id = self.stimuli.first().map(|s| s.name.clone());
        }
        observation
    }

    fn record_timing(&mut self, devices: &Devices, onset: f64, trigger_code: Option<u8>) {
        let close = devices.clock.now();
        self.set("onset_time", onset);
        self.set("duration", close - onset);
        self.set("close_time", close);
        self.set("onset_trigger", trigger_code);
    }

    fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.state.insert(key.to_string(), value.into());
    }
}
