//! Display surfaces.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stimulus::Stimulus;

/// A surface that presents stimuli.
pub trait Display: Send {
    /// Replace what is on screen with `stimuli` (empty = blank screen).
    fn flip(&mut self, label: &str, stimuli: &[Stimulus], at: f64) -> Result<()>;
}

/// One screen update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlipRecord {
    pub time: f64,
    pub label: String,
    pub stimuli: Vec<String>,
}

/// Shared history of flips, readable while the display is owned elsewhere.
pub type FlipLog = Arc<RwLock<Vec<FlipRecord>>>;

/// Display that draws nothing and records every flip.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    log: FlipLog,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the flip history.
    pub fn log(&self) -> FlipLog {
        Arc::clone(&self.log)
    }
}

impl Display for HeadlessDisplay {
    fn flip(&mut self, label: &str, stimuli: &[Stimulus], at: f64) -> Result<()> {
        let names: Vec<String> = stimuli.iter().map(|s| s.name.clone()).collect();
        debug!(label = label, stimuli = ?names, time = at, "Flip");

        let mut log = self
            .log
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        log.push(FlipRecord {
            time: at,
            label: label.to_string(),
            stimuli: names,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_display_records_flips() {
        let mut display = HeadlessDisplay::new();
        let log = display.log();
        let fixation = Stimulus {
            name: "fixation".to_string(),
            text: "+".to_string(),
            color: "white".to_string(),
            height: None,
        };

        display.flip("fixation", &[fixation], 0.0).unwrap();
        display.flip("iti", &[], 1.0).unwrap();

        let flips = log.read().unwrap();
        assert_eq!(flips.len(), 2);
        assert_eq!(flips[0].stimuli, vec!["fixation"]);
        assert!(flips[1].stimuli.is_empty());
        assert_eq!(flips[1].time, 1.0);
    }
}
