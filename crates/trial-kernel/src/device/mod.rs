//! Devices a trial runs against.
//!
//! A trial touches four devices: a clock for timing, a display it flips once
//! per phase, an input source it waits on for key presses, and a trigger sink
//! that marks events for downstream recordings. `Devices` bundles one of each
//! so a trial can borrow them together.
//!
//! The implementations here are headless: a virtual or wall clock, a display
//! that records flips, a responder-driven input, and a trigger sink that
//! records sends instead of driving hardware.

mod clock;
mod display;
mod input;
mod trigger;

pub use clock::{Clock, VirtualClock, WallClock};
pub use display::{Display, FlipLog, FlipRecord, HeadlessDisplay};
pub use input::{InputSource, KeyPress, ResponderInput};
pub use trigger::{MockTriggerSink, TriggerEvent, TriggerLog, TriggerSink};

use anyhow::Result;

use crate::config::Trigger;

/// The devices one session runs against.
pub struct Devices {
    pub clock: Box<dyn Clock>,
    pub display: Box<dyn Display>,
    pub input: Box<dyn InputSource>,
    pub triggers: Box<dyn TriggerSink>,
}

impl Devices {
    pub fn new(
        clock: Box<dyn Clock>,
        display: Box<dyn Display>,
        input: Box<dyn InputSource>,
        triggers: Box<dyn TriggerSink>,
    ) -> Self {
        Self {
            clock,
            display,
            input,
            triggers,
        }
    }

    /// Send a trigger stamped with the current time; `None` is a no-op.
    ///
    /// Returns the code that was sent.
    pub fn send_trigger(&mut self, trigger: Option<&Trigger>) -> Result<Option<u8>> {
        match trigger {
            Some(trigger) => {
                let now = self.clock.now();
                self.triggers.send(&trigger.event, trigger.code, now)?;
                Ok(Some(trigger.code))
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for Devices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Devices")
            .field("now", &self.clock.now())
            .finish_non_exhaustive()
    }
}
