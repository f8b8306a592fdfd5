use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Kind of interval being timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Work,
    Break,
    LongBreak,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::Break => "break",
            Phase::LongBreak => "long_break",
        }
    }

    pub fn is_work(&self) -> bool {
        matches!(self, Phase::Work)
    }

    /// Human-readable name for display.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Work => "Focus",
            Phase::Break => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }

    /// Notification shown when this phase runs out.
    pub fn completion_message(&self) -> &'static str {
        match self {
            Phase::Work => "Work session complete! Time for a break.",
            Phase::Break | Phase::LongBreak => "Break complete! Ready for another work session?",
        }
    }

    /// Phase that follows this one.
    ///
    /// `completed_work` is the number of work phases finished so far,
    /// including the one that just ended. Every `long_break_interval`-th
    /// work phase is followed by a long break.
    pub fn next(&self, completed_work: u32, long_break_interval: u32) -> Phase {
        match self {
            Phase::Work => {
                let interval = long_break_interval.max(1);
                if completed_work > 0 && completed_work % interval == 0 {
                    Phase::LongBreak
                } else {
                    Phase::Break
                }
            }
            Phase::Break | Phase::LongBreak => Phase::Work,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Phase::Work),
            "break" => Ok(Phase::Break),
            "long_break" | "long-break" => Ok(Phase::LongBreak),
            other => Err(ValidationError::InvalidValue {
                field: "type".into(),
                message: format!("unknown phase '{other}'"),
            }),
        }
    }
}
