//! Stroop trial conditions: `<congruency>_<color>` labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a condition label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Condition '{label}' must have the form <congruency>_<color>")]
    Shape { label: String },

    #[error("Unknown congruency '{token}' in condition '{label}' (expected congruent or incongruent)")]
    UnknownCongruency { label: String, token: String },

    #[error("Unknown color '{token}' in condition '{label}' (expected red or green)")]
    UnknownColor { label: String, token: String },
}

/// Whether the word and its ink color agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StroopType {
    Congruent,
    Incongruent,
}

impl StroopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Congruent => "congruent",
            Self::Incongruent => "incongruent",
        }
    }

    /// Trigger event sent at target onset for this congruency.
    pub fn onset_event(&self) -> String {
        format!("{}_stim_onset", self.as_str())
    }
}

impl FromStr for StroopType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "congruent" => Ok(Self::Congruent),
            "incongruent" => Ok(Self::Incongruent),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StroopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ink color the participant must name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InkColor {
    Red,
    Green,
}

impl InkColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
        }
    }
}

impl FromStr for InkColor {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Self::Red),
            "green" => Ok(Self::Green),
            _ => Err(()),
        }
    }
}

impl fmt::Display for InkColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed trial condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    label: String,
    pub stroop_type: StroopType,
    pub color: InkColor,
}

impl Condition {
    /// Parse a label such as `incongruent_green`.
    ///
    /// The label must split on `_` into exactly two known tokens.
    pub fn parse(label: &str) -> Result<Self, ConditionError> {
        let tokens: Vec<&str> = label.split('_').collect();
        let [congruency, color] = tokens.as_slice() else {
            return Err(ConditionError::Shape {
                label: label.to_string(),
            });
        };

        let stroop_type = congruency
            .parse()
            .map_err(|_| ConditionError::UnknownCongruency {
                label: label.to_string(),
                token: congruency.to_string(),
            })?;
        let color = color.parse().map_err(|_| ConditionError::UnknownColor {
            label: label.to_string(),
            token: color.to_string(),
        })?;

        Ok(Self {
            label: label.to_string(),
            stroop_type,
            color,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The key that names this condition's ink color. Congruency plays no part.
    pub fn correct_key<'a>(&self, red_key: &'a str, green_key: &'a str) -> &'a str {
        match self.color {
            InkColor::Red => red_key,
            InkColor::Green => green_key,
        }
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_incongruent_red() {
        let condition = Condition::parse("incongruent_red").unwrap();
        assert_eq!(condition.stroop_type, StroopType::Incongruent);
        assert_eq!(condition.color, InkColor::Red);
        assert_eq!(condition.correct_key("f", "j"), "f");
        assert_eq!(condition.label(), "incongruent_red");
    }

    #[test]
    fn test_correct_key_ignores_congruency() {
        for congruency in ["congruent", "incongruent"] {
            let red = Condition::parse(&format!("{}_red", congruency)).unwrap();
            let green = Condition::parse(&format!("{}_green", congruency)).unwrap();
            assert_eq!(red.correct_key("f", "j"), "f");
            assert_eq!(green.correct_key("f", "j"), "j");
        }
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        for label in ["congruent", "congruent_red_extra", "", "congruent-red"] {
            assert!(
                matches!(Condition::parse(label), Err(ConditionError::Shape { .. })),
                "label {:?} should be rejected",
                label
            );
        }
    }

    #[test]
    fn test_parse_rejects_unknown_tokens() {
        assert!(matches!(
            Condition::parse("neutral_red"),
            Err(ConditionError::UnknownCongruency { token, .. }) if token == "neutral"
        ));
        assert!(matches!(
            Condition::parse("congruent_blue"),
            Err(ConditionError::UnknownColor { token, .. }) if token == "blue"
        ));
    }

    #[test]
    fn test_onset_event_name() {
        assert_eq!(StroopType::Congruent.onset_event(), "congruent_stim_onset");
        assert_eq!(StroopType::Incongruent.onset_event(), "incongruent_stim_onset");
    }
}
