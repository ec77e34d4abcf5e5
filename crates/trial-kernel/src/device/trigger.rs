//! Trigger sinks: event markers for downstream synchronization.

use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fire-and-forget sink for event markers.
pub trait TriggerSink: Send {
    fn send(&mut self, event: &str, code: u8, at: f64) -> Result<()>;

    /// Flush and release the sink. Sends after close are errors.
    fn close(&mut self) -> Result<()>;
}

/// One trigger that was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub time: f64,
    pub event: String,
    pub code: u8,
}

/// Shared history of sent triggers.
pub type TriggerLog = Arc<RwLock<Vec<TriggerEvent>>>;

/// Sink that records triggers instead of driving hardware.
#[derive(Debug, Default)]
pub struct MockTriggerSink {
    log: TriggerLog,
    closed: bool,
}

impl MockTriggerSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the trigger history.
    pub fn log(&self) -> TriggerLog {
        Arc::clone(&self.log)
    }
}

impl TriggerSink for MockTriggerSink {
    fn send(&mut self, event: &str, code: u8, at: f64) -> Result<()> {
        if self.closed {
            bail!("Trigger sink is closed; cannot send '{}'", event);
        }
        debug!(event = event, code = code, time = at, "Trigger");
        let mut log = self
            .log
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        log.push(TriggerEvent {
            time: at,
            event: event.to_string(),
            code,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
