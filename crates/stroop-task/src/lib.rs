//! Stroop Task: color naming under word interference.
//!
//! Each trial shows a color word in red or green ink; the participant presses
//! the key for the ink color. Congruent trials (word matches ink) are answered
//! faster and more accurately than incongruent ones.
//!
//! This crate provides:
//! - Condition parsing and the task's settings tables
//! - `run_trial`, the four-phase trial runner
//! - Block and session sequencing
//! - Simulated participants (`StroopSamplerResponder`, `ScriptedResponder`)
//! - CSV/JSON results and batch summaries

pub mod block;
pub mod condition;
pub mod responder;
pub mod results;
pub mod session;
pub mod settings;
pub mod trial;

#[cfg(test)]
mod testing;

pub use condition::{Condition, ConditionError, InkColor, StroopType};
pub use responder::{ResponderConfig, ScriptedResponder, StroopSamplerResponder};
pub use session::{Mode, SessionResult, SessionRunner};
pub use settings::{ExperimentConfig, TaskSettings};
pub use trial::{FeedbackKind, TrialCounter, run_trial};
