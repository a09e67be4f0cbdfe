use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// The five states of the job lifecycle.
///
/// ```text
/// Pending → Processing → Completed
///                      → Pending (retry)
///                      → Dead    (retries exhausted)
///                      → Failed  (runner error, not auto-retried)
/// Dead → Pending (manual DLQ retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    /// Every state, in the order they are reported by `stats`.
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::Processing,
        JobState::Completed,
        JobState::Failed,
        JobState::Dead,
    ];

    /// The storage mapping. This is the on-disk schema contract: the
    /// strings are versioned with the database and must never be derived
    /// from the Rust identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }
}

impl FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "dead" => Ok(JobState::Dead),
            other => Err(QueueError::Validation(format!(
                "unknown job state '{other}'"
            ))),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_mapping_is_stable() {
        assert_eq!(JobState::Pending.as_str(), "pending");
        assert_eq!(JobState::Processing.as_str(), "processing");
        assert_eq!(JobState::Completed.as_str(), "completed");
        assert_eq!(JobState::Failed.as_str(), "failed");
        assert_eq!(JobState::Dead.as_str(), "dead");
    }

    #[test]
    fn parse_roundtrip_all_states() {
        for state in JobState::ALL {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "zombie".parse::<JobState>().unwrap_err();
        assert!(matches!(err, QueueError::Validation(_)));
    }

    #[test]
    fn state_display() {
        assert_eq!(JobState::Dead.to_string(), "dead");
    }
}
