//! Trial records: the flat field map a trial returns to its caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{KernelError, KernelResult};

/// Accumulating field → value mapping for one trial.
///
/// Fields keep insertion order so that tabular output lists columns in the
/// order the phases produced them. Writes are additive only: a field can be
/// set once, and a second write of the same name is an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialRecord {
    fields: Map<String, Value>,
}

impl TrialRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field that has not been written yet.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> KernelResult<()> {
        let key = key.into();
        if self.fields.contains_key(&key) {
            return Err(KernelError::DuplicateField { key });
        }
        self.fields.insert(key, value.into());
        Ok(())
    }

    /// Merge another set of fields, rejecting any collision before writing.
    pub fn merge(&mut self, other: &Map<String, Value>) -> KernelResult<()> {
        if let Some(key) = other.keys().find(|k| self.fields.contains_key(*k)) {
            return Err(KernelError::DuplicateField { key: key.clone() });
        }
        for (key, value) in other {
            self.fields.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Read a boolean field; absent or non-boolean fields read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.fields.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_preserves_order() {
        let mut record = TrialRecord::new();
        record.insert("condition", "congruent_red").unwrap();
        record.insert("stroop_type", "congruent").unwrap();
        record.insert("color", "red").unwrap();

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["condition", "stroop_type", "color"]);
    }

    #[test]
    fn test_insert_rejects_overwrite() {
        let mut record = TrialRecord::new();
        record.insert("fixation_duration", 0.5).unwrap();
        let err = record.insert("fixation_duration", 0.6).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateField { .. }));
        assert_eq!(record.get("fixation_duration"), Some(&json!(0.5)));
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let mut record = TrialRecord::new();
        record.insert("stimulus_hit", true).unwrap();

        let mut phase = Map::new();
        phase.insert("feedback_onset_time".to_string(), json!(1.2));
        phase.insert("stimulus_hit".to_string(), json!(false));

        assert!(record.merge(&phase).is_err());
        assert!(!record.contains("feedback_onset_time"));
        assert!(record.flag("stimulus_hit"));
    }

    #[test]
    fn test_flag_defaults_to_false() {
        let mut record = TrialRecord::new();
        record.insert("stimulus_rt", json!(null)).unwrap();
        assert!(!record.flag("stimulus_rt"));
        assert!(!record.flag("missing"));
    }
}
