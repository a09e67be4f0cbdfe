use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Duplicate job id: {0}")]
    DuplicateId(String),

    #[error("Job {id} is in state '{state}', expected '{expected}'")]
    StateConflict {
        id: String,
        state: String,
        expected: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_conflict_message_names_states() {
        let err = QueueError::StateConflict {
            id: "job1".into(),
            state: "pending".into(),
            expected: "dead".into(),
        };
        assert_eq!(
            err.to_string(),
            "Job job1 is in state 'pending', expected 'dead'"
        );
    }

    #[test]
    fn validation_message() {
        let err = QueueError::Validation("command must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Validation error: command must not be empty"
        );
    }
}
