//! One Stroop trial: fixation, target, feedback, inter-trial interval.

use std::collections::BTreeMap;

use anyhow::Result;
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, json};
use tracing::debug;
use trial_kernel::{CaptureSpec, Devices, Observation, StimBank, StimUnit, TrialRecord};

use crate::condition::Condition;
use crate::settings::TaskSettings;

/// Phases of a trial, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    Fixation,
    Target,
    Feedback,
    Iti,
}

impl TrialPhase {
    pub const ORDER: [TrialPhase; 4] = [Self::Fixation, Self::Target, Self::Feedback, Self::Iti];

    /// Unit label; every field the phase records starts with `{label}_`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fixation => "fixation",
            Self::Target => "stimulus",
            Self::Feedback => "feedback",
            Self::Iti => "iti",
        }
    }

    /// Phase name a simulated participant observes.
    pub fn observed_as(&self) -> &'static str {
        match self {
            Self::Fixation => "anticipation",
            Self::Target => "target",
            Self::Feedback => "feedback",
            Self::Iti => "iti",
        }
    }
}

/// Which feedback screen follows the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Correct,
    Incorrect,
    NoResponse,
}

impl FeedbackKind {
    /// A wrong key still counts as a response; only a timeout is `NoResponse`.
    pub fn select(response: bool, hit: bool) -> Self {
        match (response, hit) {
            (true, true) => Self::Correct,
            (true, false) => Self::Incorrect,
            (false, _) => Self::NoResponse,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::NoResponse => "no_response",
        }
    }

    pub fn stimulus(&self) -> &'static str {
        match self {
            Self::Correct => "correct_feedback",
            Self::Incorrect => "incorrect_feedback",
            Self::NoResponse => "no_response_feedback",
        }
    }

    pub fn trigger_event(&self) -> &'static str {
        match self {
            Self::Correct => "feedback_correct_response",
            Self::Incorrect => "feedback_incorrect_response",
            Self::NoResponse => "feedback_no_response",
        }
    }
}

/// Monotonic trial ids, owned by whoever runs the session.
#[derive(Debug, Clone)]
pub struct TrialCounter {
    next: u64,
}

impl Default for TrialCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl TrialCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id. Ids start at 1.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

/// Block a trial belongs to, with the generator that jitters its durations.
#[derive(Debug, Clone)]
pub struct BlockContext {
    pub block_id: String,
    pub block_idx: usize,
    pub rng: ChaCha8Rng,
}

/// Run one trial and return its record.
///
/// Each phase flips the display once and merges its measurements under its
/// own label. Errors from the devices propagate unchanged and abort the trial.
pub fn run_trial(
    devices: &mut Devices,
    settings: &TaskSettings,
    stim_bank: &StimBank,
    condition: &str,
    block: &mut BlockContext,
    trial_id: u64,
) -> Result<TrialRecord> {
    let parsed = Condition::parse(condition)?;
    let correct_key = parsed
        .correct_key(&settings.red_key, &settings.green_key)
        .to_string();
    let triggers = &settings.triggers;

    let mut trial_data = TrialRecord::new();
    trial_data.insert("trial_id", trial_id)?;
    trial_data.insert("block_id", block.block_id.clone())?;
    trial_data.insert("block_idx", block.block_idx)?;
    trial_data.insert("condition", condition)?;
    trial_data.insert("stroop_type", parsed.stroop_type.as_str())?;
    trial_data.insert("color", parsed.color.as_str())?;
    trial_data.insert("correct_response", correct_key.clone())?;

    let mut factors = Map::new();
    factors.insert("condition".to_string(), json!(condition));
    factors.insert("stroop_type".to_string(), json!(parsed.stroop_type.as_str()));
    factors.insert("color".to_string(), json!(parsed.color.as_str()));
    factors.insert("block_idx".to_string(), json!(block.block_idx));
    let context = |phase: TrialPhase, deadline_s: f64| {
        let mut task_factors = factors.clone();
        task_factors.insert("stage".to_string(), json!(phase.observed_as()));
        Observation {
            trial_id: Some(trial_id),
            block_id: Some(block.block_id.clone()),
            condition_id: Some(condition.to_string()),
            deadline_s: Some(deadline_s),
            task_factors,
            ..Observation::new(phase.observed_as())
        }
    };
    let fixation_context = context(TrialPhase::Fixation, settings.fixation_duration.deadline());
    let mut target_context = context(TrialPhase::Target, settings.stim_duration.deadline());
    target_context
        .task_factors
        .insert("correct_key".to_string(), json!(correct_key));

    // Fixation
    let duration = settings.fixation_duration.sample(&mut block.rng);
    let mut fixation = StimUnit::new(TrialPhase::Fixation.label())
        .add_stim(stim_bank.get("fixation")?)
        .with_context(fixation_context);
    fixation.show(devices, duration, triggers.get("fixation_onset").as_ref())?;
    fixation.to_dict(&mut trial_data)?;

    // Target
    let mut response_triggers = BTreeMap::new();
    for (key, event) in [
        (&settings.red_key, "red_key_press"),
        (&settings.green_key, "green_key_press"),
    ] {
        if let Some(trigger) = triggers.get(event) {
            response_triggers.insert(key.clone(), trigger);
        }
    }
    let capture = CaptureSpec {
        keys: settings.key_list.clone(),
        correct_keys: vec![correct_key],
        duration: settings.stim_duration.sample(&mut block.rng),
        onset_trigger: triggers.get(&parsed.stroop_type.onset_event()),
        response_triggers,
        terminate_on_response: true,
    };
    let mut stimulus = StimUnit::new(TrialPhase::Target.label())
        .add_stim(stim_bank.get(condition)?)
        .with_context(target_context);
    stimulus.capture_response(devices, &capture)?;
    stimulus.to_dict(&mut trial_data)?;

    // Feedback
    let feedback = FeedbackKind::select(stimulus.state_flag("response"), stimulus.state_flag("hit"));
    trial_data.insert("feedback_type", feedback.as_str())?;
    let duration = settings.feedback_duration.sample(&mut block.rng);
    let mut feedback_unit =
        StimUnit::new(TrialPhase::Feedback.label()).add_stim(stim_bank.get(feedback.stimulus())?);
    feedback_unit.show(devices, duration, triggers.get(feedback.trigger_event()).as_ref())?;
    feedback_unit.to_dict(&mut trial_data)?;

    // Inter-trial interval: blank, untriggered
    let duration = settings.iti_duration.sample(&mut block.rng);
    let mut iti = StimUnit::new(TrialPhase::Iti.label());
    iti.show(devices, duration, None)?;
    iti.to_dict(&mut trial_data)?;

    debug!(
        trial_id,
        block = %block.block_id,
        condition,
        feedback = feedback.as_str(),
        rt_s = ?trial_data.get("stimulus_rt"),
        "Trial complete"
    );
    Ok(trial_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{ScriptedConfig, ScriptedResponder};
    use crate::testing;
    use rand::{RngCore, SeedableRng};
    use serde_json::Value;
    use trial_kernel::device::{FlipLog, TriggerLog};
    use trial_kernel::{Action, Responder, SessionInfo};

    /// Presses a fixed key on the target phase only.
    struct TargetPresser {
        key: Option<&'static str>,
        rt_s: f64,
    }

    impl Responder for TargetPresser {
        fn name(&self) -> &str {
            "target_presser"
        }

        fn start_session(&mut self, _session: &SessionInfo, _rng: Box<dyn RngCore + Send>) {}

        fn act(&mut self, observation: &Observation) -> Action {
            match self.key {
                Some(key) if observation.phase == "target" => Action::press(key, self.rt_s, Map::new()),
                _ => Action::withhold(Map::new()),
            }
        }
    }

    fn seconds(record: &TrialRecord, key: &str) -> f64 {
        record.get(key).and_then(Value::as_f64).unwrap()
    }

    fn block() -> BlockContext {
        BlockContext {
            block_id: "block_0".to_string(),
            block_idx: 0,
            rng: ChaCha8Rng::seed_from_u64(1),
        }
    }

    fn run(key: Option<&'static str>, rt_s: f64, condition: &str) -> (TrialRecord, TriggerLog, FlipLog) {
        let config = testing::config();
        let (mut devices, flips, sent) = testing::devices(Box::new(TargetPresser { key, rt_s }), 1);
        let record = run_trial(
            &mut devices,
            &config.task,
            &config.stim_bank(),
            condition,
            &mut block(),
            7,
        )
        .unwrap();
        (record, sent, flips)
    }

    fn events(sent: &TriggerLog) -> Vec<String> {
        sent.read().unwrap().iter().map(|e| e.event.clone()).collect()
    }

    #[test]
    fn test_feedback_selection_table() {
        assert_eq!(FeedbackKind::select(true, true), FeedbackKind::Correct);
        assert_eq!(FeedbackKind::select(true, false), FeedbackKind::Incorrect);
        assert_eq!(FeedbackKind::select(false, false), FeedbackKind::NoResponse);
        assert_eq!(FeedbackKind::select(false, true), FeedbackKind::NoResponse);
    }

    #[test]
    fn test_trial_counter_starts_at_one() {
        let mut counter = TrialCounter::new();
        assert_eq!(counter.next_id(), 1);
        assert_eq!(counter.next_id(), 2);
        assert_eq!(counter.issued(), 2);
    }

    #[test]
    fn test_correct_trial_records_all_phases() {
        let (record, sent, flips) = run(Some("f"), 0.42, "incongruent_red");

        assert_eq!(record.get("trial_id"), Some(&json!(7)));
        assert_eq!(record.get("correct_response"), Some(&json!("f")));
        assert_eq!(record.get("stroop_type"), Some(&json!("incongruent")));
        for phase in TrialPhase::ORDER {
            for field in ["onset_time", "duration", "close_time", "onset_trigger"] {
                let key = format!("{}_{}", phase.label(), field);
                assert!(record.contains(&key), "missing {}", key);
            }
        }
        assert!(record.flag("stimulus_hit"));
        assert_eq!(record.get("stimulus_key_press"), Some(&json!("f")));
        assert_eq!(record.get("stimulus_rt"), Some(&json!(0.42)));
        assert!((seconds(&record, "stimulus_duration") - 0.42).abs() < 1e-9);
        assert_eq!(record.get("feedback_type"), Some(&json!("correct")));

        assert_eq!(
            events(&sent),
            vec![
                "fixation_onset",
                "incongruent_stim_onset",
                "red_key_press",
                "feedback_correct_response"
            ]
        );
        let labels: Vec<String> = flips.read().unwrap().iter().map(|f| f.label.clone()).collect();
        assert_eq!(labels, vec!["fixation", "stimulus", "feedback", "iti"]);
    }

    #[test]
    fn test_wrong_key_is_incorrect_not_no_response() {
        let (record, sent, _) = run(Some("j"), 0.3, "congruent_red");
        assert!(record.flag("stimulus_response"));
        assert!(!record.flag("stimulus_hit"));
        assert_eq!(record.get("feedback_type"), Some(&json!("incorrect")));
        assert_eq!(events(&sent)[2], "green_key_press");
        assert_eq!(events(&sent)[3], "feedback_incorrect_response");
    }

    #[test]
    fn test_timeout_gives_no_response_feedback() {
        let (record, sent, _) = run(None, 0.0, "congruent_green");
        assert!(!record.flag("stimulus_response"));
        assert!((seconds(&record, "stimulus_duration") - 2.0).abs() < 1e-9);
        assert_eq!(record.get("feedback_type"), Some(&json!("no_response")));
        assert_eq!(
            events(&sent),
            vec!["fixation_onset", "congruent_stim_onset", "feedback_no_response"]
        );
    }

    #[test]
    fn test_fixation_jitter_stays_in_range() {
        let (record, _, _) = run(None, 0.0, "congruent_green");
        let duration = seconds(&record, "fixation_duration");
        assert!((0.5..=0.7).contains(&duration), "fixation {}", duration);
    }

    #[test]
    fn test_malformed_condition_fails_fast() {
        let config = testing::config();
        let responder = ScriptedResponder::new(ScriptedConfig::default());
        let (mut devices, flips, _) = testing::devices(Box::new(responder), 1);
        let err = run_trial(
            &mut devices,
            &config.task,
            &config.stim_bank(),
            "congruent-red",
            &mut block(),
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("congruent-red"));
        assert!(flips.read().unwrap().is_empty());
    }

    #[test]
    fn test_missing_stimulus_propagates() {
        let mut config = testing::config();
        config.stimuli.remove("incongruent_green");
        let responder = ScriptedResponder::new(ScriptedConfig::default());
        let (mut devices, _, _) = testing::devices(Box::new(responder), 1);
        assert!(
            run_trial(
                &mut devices,
                &config.task,
                &config.stim_bank(),
                "incongruent_green",
                &mut block(),
                1,
            )
            .is_err()
        );
    }
}
