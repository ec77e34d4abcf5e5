//! Results persistence: the trial table, settings snapshot and summaries.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trial_kernel::TrialRecord;
use uuid::Uuid;

use crate::block::BlockSummary;
use crate::session::SessionResult;
use crate::settings::ExperimentConfig;

/// Generate a timestamped output path from the given path.
/// e.g., "batch.json" -> "batch-20261018-101530.json"
pub fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

/// Columns of a trial table: every field of every record, in first-seen order.
pub fn trial_columns(trials: &[TrialRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for trial in trials {
        for key in trial.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

/// Render one value as a CSV cell. Nulls and absent fields are empty;
/// arrays and objects are written as JSON.
fn csv_cell(value: Option<&Value>) -> String {
    let raw = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    };
    escape_csv(&raw)
}

/// Quote a field when it holds a separator, quote or line break.
pub fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write trial records as a CSV table.
pub fn write_trials_csv(path: impl AsRef<Path>, trials: &[TrialRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let columns = trial_columns(trials);
    let header: Vec<String> = columns.iter().map(|c| escape_csv(c)).collect();
    writeln!(out, "{}", header.join(","))?;
    for trial in trials {
        let row: Vec<String> = columns.iter().map(|c| csv_cell(trial.get(c))).collect();
        writeln!(out, "{}", row.join(","))?;
    }
    out.flush()?;
    Ok(())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Standard error of the mean; 0 for fewer than two values.
fn standard_error(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    match mean(values) {
        Some(m) if values.len() > 1 => {
            let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt() / n.sqrt()
        }
        _ => 0.0,
    }
}

/// Headline numbers of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub participant_id: String,
    pub mode: String,
    pub seed: u64,
    pub responder: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub n_trials: usize,
    /// Fraction of trials answered with the correct key
    pub accuracy: f64,
    /// Fraction of trials with no response
    pub miss_rate: f64,
    /// Mean reaction time of correct congruent trials
    pub mean_rt_congruent_s: Option<f64>,
    /// Mean reaction time of correct incongruent trials
    pub mean_rt_incongruent_s: Option<f64>,
    /// Interference effect: incongruent minus congruent mean RT
    pub stroop_effect_s: Option<f64>,
    pub blocks: Vec<BlockSummary>,
}

impl SessionSummary {
    pub fn from_result(result: &SessionResult) -> Self {
        let trials = &result.trials;
        let n = trials.len();
        let rate = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };

        let hits = trials.iter().filter(|t| t.flag("stimulus_hit")).count();
        let misses = trials.iter().filter(|t| !t.flag("stimulus_response")).count();

        let hit_rts = |stroop_type: &str| -> Vec<f64> {
            trials
                .iter()
                .filter(|t| t.flag("stimulus_hit"))
                .filter(|t| t.get("stroop_type").and_then(Value::as_str) == Some(stroop_type))
                .filter_map(|t| t.get("stimulus_rt").and_then(Value::as_f64))
                .collect()
        };
        let mean_rt_congruent_s = mean(&hit_rts("congruent"));
        let mean_rt_incongruent_s = mean(&hit_rts("incongruent"));
        let stroop_effect_s = match (mean_rt_congruent_s, mean_rt_incongruent_s) {
            (Some(congruent), Some(incongruent)) => Some(incongruent - congruent),
            _ => None,
        };

        Self {
            session_id: result.session.session_id,
            participant_id: result.session.participant_id.clone(),
            mode: result.session.mode.clone(),
            seed: result.session.seed,
            responder: result.responder.clone(),
            started_at: result.started_at,
            ended_at: result.ended_at,
            n_trials: n,
            accuracy: rate(hits),
            miss_rate: rate(misses),
            mean_rt_congruent_s,
            mean_rt_incongruent_s,
            stroop_effect_s,
            blocks: result.blocks.clone(),
        }
    }
}

/// Files written for one session.
#[derive(Debug, Clone)]
pub struct SessionFiles {
    pub trials_csv: PathBuf,
    pub settings_json: PathBuf,
    pub summary_json: PathBuf,
}

/// Write the trial table, settings snapshot and summary of a session into `dir`.
///
/// Files share the stem `{participant}_{task}_{mode}-{timestamp}`.
pub fn save_session(dir: &Path, config: &ExperimentConfig, result: &SessionResult) -> Result<SessionFiles> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let stem = timestamped_path(&dir.join(format!(
        "{}_{}_{}.csv",
        result.session.participant_id, config.task.task_name, result.session.mode
    )));
    let files = SessionFiles {
        settings_json: with_suffix(&stem, "settings.json"),
        summary_json: with_suffix(&stem, "summary.json"),
        trials_csv: stem,
    };

    write_trials_csv(&files.trials_csv, &result.trials)?;
    fs::write(&files.settings_json, serde_json::to_string_pretty(config)?)?;
    let summary = SessionSummary::from_result(result);
    fs::write(&files.summary_json, serde_json::to_string_pretty(&summary)?)?;
    Ok(files)
}

/// `dir/name.csv` -> `dir/name_{suffix}`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    path.with_file_name(format!("{}_{}", stem, suffix))
}

/// Aggregate statistics over a batch of sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub sessions: usize,
    pub mean_accuracy: f64,
    pub accuracy_se: f64,
    pub mean_miss_rate: f64,
    /// Mean interference effect over sessions that had one
    pub mean_stroop_effect_s: Option<f64>,
    pub stroop_effect_se: f64,
    /// 95% CI of the interference effect
    pub stroop_effect_ci: Option<(f64, f64)>,
}

/// Summaries of many simulated sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResults {
    pub sessions: Vec<SessionSummary>,
    pub summary: Option<BatchSummary>,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, summary: SessionSummary) {
        self.sessions.push(summary);
    }

    pub fn compute_summary(&mut self) {
        if self.sessions.is_empty() {
            self.summary = None;
            return;
        }

        let accuracies: Vec<f64> = self.sessions.iter().map(|s| s.accuracy).collect();
        let miss_rates: Vec<f64> = self.sessions.iter().map(|s| s.miss_rate).collect();
        let effects: Vec<f64> = self.sessions.iter().filter_map(|s| s.stroop_effect_s).collect();

        let mean_stroop_effect_s = mean(&effects);
        let stroop_effect_se = standard_error(&effects);
        let z = 1.96;

        self.summary = Some(BatchSummary {
            sessions: self.sessions.len(),
            mean_accuracy: mean(&accuracies).unwrap_or(0.0),
            accuracy_se: standard_error(&accuracies),
            mean_miss_rate: mean(&miss_rates).unwrap_or(0.0),
            mean_stroop_effect_s,
            stroop_effect_se,
            stroop_effect_ci: mean_stroop_effect_s
                .map(|m| (m - z * stroop_effect_se, m + z * stroop_effect_se)),
        });
    }

    /// Save results to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let results = serde_json::from_str(&json)?;
        Ok(results)
    }
}
