//! Trial Kernel: timed presentation phases for behavioral experiments.
//!
//! This crate provides the pieces a task needs to run trials without caring
//! whether a person or a simulated participant is on the other side:
//! - Settings primitives (durations, trigger maps) loaded from TOML
//! - A stimulus bank keyed by name
//! - Device traits (display, input, clock, triggers) with headless implementations
//! - `StimUnit`, which runs one phase and writes its measurements into a `TrialRecord`
//! - The simulation contracts exchanged with a `Responder`

pub mod config;
pub mod device;
pub mod error;
pub mod record;
pub mod sim;
pub mod stimulus;
pub mod unit;

pub use config::{DurationSpec, Trigger, TriggerMap};
pub use device::{Clock, Devices, Display, InputSource, KeyPress, TriggerSink};
pub use error::{KernelError, KernelResult};
pub use record::TrialRecord;
pub use sim::{Action, Feedback, Observation, Responder, SessionInfo};
pub use stimulus::{StimBank, Stimulus, StimulusConfig};
pub use unit::{CaptureSpec, StimUnit};
