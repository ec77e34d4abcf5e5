//! Shared fixtures for unit tests.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use trial_kernel::device::{FlipLog, HeadlessDisplay, MockTriggerSink, ResponderInput, TriggerLog, VirtualClock};
use trial_kernel::{Devices, Responder, SessionInfo, StimulusConfig, TriggerMap};

use crate::settings::ExperimentConfig;

pub fn stimuli() -> BTreeMap<String, StimulusConfig> {
    let mut stimuli = BTreeMap::new();
    for (name, text, color) in [
        ("fixation", "+", "white"),
        ("instruction_text", "Press F for red ink, J for green ink.", "white"),
        ("block_break", "Block {block_num}/{total_blocks} done. Accuracy: {accuracy}", "white"),
        ("good_bye", "Thank you!", "white"),
        ("correct_feedback", "Correct", "white"),
        ("incorrect_feedback", "Wrong", "white"),
        ("no_response_feedback", "Too slow", "white"),
        ("congruent_red", "RED", "red"),
        ("congruent_green", "GREEN", "green"),
        ("incongruent_red", "GREEN", "red"),
        ("incongruent_green", "RED", "green"),
    ] {
        stimuli.insert(name.to_string(), StimulusConfig::text(text, color));
    }
    stimuli
}

pub fn triggers() -> TriggerMap {
    TriggerMap::from_pairs([
        ("exp_onset", 98),
        ("exp_end", 99),
        ("block_onset", 100),
        ("block_end", 101),
        ("fixation_onset", 1),
        ("congruent_stim_onset", 11),
        ("incongruent_stim_onset", 12),
        ("red_key_press", 21),
        ("green_key_press", 22),
        ("feedback_correct_response", 31),
        ("feedback_incorrect_response", 32),
        ("feedback_no_response", 33),
    ])
}

/// Default settings with every stimulus and trigger wired.
pub fn config() -> ExperimentConfig {
    let mut config = ExperimentConfig {
        stimuli: stimuli(),
        ..Default::default()
    };
    config.task.triggers = triggers();
    config
}

/// Headless devices driven by `responder`, its session already started.
pub fn devices(mut responder: Box<dyn Responder>, seed: u64) -> (Devices, FlipLog, TriggerLog) {
    let session = SessionInfo::new("test", "sim", seed);
    responder.start_session(&session, Box::new(ChaCha8Rng::seed_from_u64(seed)));

    let display = HeadlessDisplay::new();
    let flips = display.log();
    let sink = MockTriggerSink::new();
    let sent = sink.log();
    let devices = Devices::new(
        Box::new(VirtualClock::new()),
        Box::new(display),
        Box::new(ResponderInput::new(responder)),
        Box::new(sink),
    );
    (devices, flips, sent)
}
