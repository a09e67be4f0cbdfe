use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobState;

/// How a failed or finished execution attempt resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Command exited zero.
    Completed,
    /// Command failed with retry budget remaining; the job goes back to
    /// Pending and is immediately re-claimable.
    Retrying { attempt: u32, max_retries: u32 },
    /// Command failed and the budget is exhausted; the job moves to the DLQ.
    Dead { attempts: u32 },
}

/// A single job in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
}

impl Job {
    pub fn new(id: String, command: String, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            command,
            state: JobState::Pending,
            attempts: 0,
            max_retries,
            created_at: now,
            updated_at: now,
            locked_at: None,
            locked_by: None,
        }
    }

    /// Generate a short unique job id (12-char uuid prefix).
    pub fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    /// Resolve a successful execution.
    pub fn apply_success(&mut self) -> Resolution {
        self.state = JobState::Completed;
        self.touch();
        Resolution::Completed
    }

    /// Resolve a failed execution attempt: increment `attempts` and move
    /// to Dead exactly when the budget is exhausted, otherwise back to
    /// Pending for another claim.
    pub fn apply_failure(&mut self) -> Resolution {
        self.attempts += 1;
        let resolution = if self.attempts >= self.max_retries {
            self.state = JobState::Dead;
            Resolution::Dead {
                attempts: self.attempts,
            }
        } else {
            self.state = JobState::Pending;
            Resolution::Retrying {
                attempt: self.attempts,
                max_retries: self.max_retries,
            }
        };
        self.touch();
        resolution
    }

    /// Mark the job failed after the runner could not even attempt
    /// execution. Distinct from a command failure: no retry accounting.
    pub fn mark_failed(&mut self) {
        self.state = JobState::Failed;
        self.touch();
    }

    /// Reset a dead job for a manual DLQ retry.
    pub fn reset_for_retry(&mut self) {
        self.state = JobState::Pending;
        self.attempts = 0;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
