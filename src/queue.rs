use serde::Serialize;

use crate::error::{QueueError, Result};
use crate::job::{Job, JobState};
use crate::store::JobStore;

/// Default policy values applied when an enqueue request omits them.
#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    pub max_retries: u32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Aggregate queue counts. `total` is always the sum of the five
/// per-state counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead: u64,
}

/// User-facing queue operations on top of the store.
#[derive(Debug, Clone)]
pub struct QueueManager {
    store: JobStore,
    policy: QueuePolicy,
}

impl QueueManager {
    pub fn new(store: JobStore, policy: QueuePolicy) -> Self {
        Self { store, policy }
    }

    /// Create and persist a new pending job. Generates a short id and
    /// applies the policy's retry ceiling when the caller omits them.
    /// A blank id counts as omitted, and a zero `max_retries` takes the
    /// policy default so every job gets at least one attempt.
    pub async fn enqueue(
        &self,
        command: &str,
        id: Option<String>,
        max_retries: Option<u32>,
    ) -> Result<Job> {
        if command.trim().is_empty() {
            return Err(QueueError::Validation("command must not be empty".into()));
        }

        let id = id.filter(|candidate| !candidate.trim().is_empty());
        let max_retries = match max_retries {
            Some(n) if n > 0 => n,
            _ => self.policy.max_retries,
        };
        let job = Job::new(
            id.unwrap_or_else(Job::generate_id),
            command.to_string(),
            max_retries,
        );
        self.store.add(&job).await?;
        tracing::info!(job_id = %job.id, command = %job.command, "job enqueued");
        Ok(job)
    }

    pub async fn job(&self, id: &str) -> Result<Option<Job>> {
        self.store.get(id).await
    }

    /// With a state filter: that state's jobs, oldest first. Without:
    /// every job, most recent first. Display wants recency, processing
    /// wants FIFO.
    pub async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>> {
        match state {
            Some(state) => self.store.list_by_state(state).await,
            None => self.store.list_all().await,
        }
    }

    /// Jobs that exhausted their retry budget.
    pub async fn dlq_jobs(&self) -> Result<Vec<Job>> {
        self.store.list_by_state(JobState::Dead).await
    }

    /// Move a dead job back to pending with a fresh attempt budget.
    pub async fn retry_dlq_job(&self, id: &str) -> Result<Job> {
        let mut job = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;

        if job.state != JobState::Dead {
            return Err(QueueError::StateConflict {
                id: job.id,
                state: job.state.to_string(),
                expected: JobState::Dead.to_string(),
            });
        }

        job.reset_for_retry();
        self.store.update(&job).await?;
        tracing::info!(job_id = %job.id, "dead job re-queued");
        Ok(job)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let counts = self.store.stats().await?;
        let count = |state: JobState| counts.get(&state).copied().unwrap_or(0);

        let stats = QueueStats {
            total: counts.values().sum(),
            pending: count(JobState::Pending),
            processing: count(JobState::Processing),
            completed: count(JobState::Completed),
            failed: count(JobState::Failed),
            dead: count(JobState::Dead),
        };
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager() -> QueueManager {
        QueueManager::new(JobStore::in_memory().await.unwrap(), QueuePolicy::default())
    }

    #[tokio::test]
    async fn enqueue_then_get_roundtrip() {
        let qm = manager().await;
        let job = qm.enqueue("echo hello", None, Some(5)).await.unwrap();

        let fetched = qm.job(&job.id).await.unwrap().unwrap();
        assert_eq!(fetched.state, JobState::Pending);
        assert_eq!(fetched.attempts, 0);
        assert_eq!(fetched.max_retries, 5);
        assert_eq!(fetched.command, "echo hello");
    }

    #[tokio::test]
    async fn enqueue_applies_policy_default_retries() {
        let store = JobStore::in_memory().await.unwrap();
        let qm = QueueManager::new(store, QueuePolicy { max_retries: 9 });

        let job = qm.enqueue("echo hello", None, None).await.unwrap();
        assert_eq!(job.max_retries, 9);
    }

    #[tokio::test]
    async fn enqueue_zero_max_retries_takes_policy_default() {
        let store = JobStore::in_memory().await.unwrap();
        let qm = QueueManager::new(store, QueuePolicy { max_retries: 4 });

        // Zero would let a single failure exceed the ceiling.
        let job = qm.enqueue("false", None, Some(0)).await.unwrap();
        assert_eq!(job.max_retries, 4);
    }

    #[tokio::test]
    async fn enqueue_blank_id_is_generated() {
        let qm = manager().await;
        for id in ["", "   "] {
            let job = qm.enqueue("echo hello", Some(id.into()), None).await.unwrap();
            assert!(!job.id.trim().is_empty());
            assert_eq!(job.id.len(), 12);
        }
    }

    #[tokio::test]
    async fn enqueue_rejects_blank_command() {
        let qm = manager().await;
        for command in ["", "   "] {
            let err = qm.enqueue(command, None, None).await.unwrap_err();
            assert!(matches!(err, QueueError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn enqueue_honors_caller_id() {
        let qm = manager().await;
        let job = qm.enqueue("echo hello", Some("job1".into()), None).await.unwrap();
        assert_eq!(job.id, "job1");

        let err = qm
            .enqueue("echo again", Some("job1".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn list_ordering_asymmetry() {
        let store = JobStore::in_memory().await.unwrap();
        let qm = QueueManager::new(store.clone(), QueuePolicy::default());
        // Explicit timestamps keep ordering independent of clock resolution.
        for (id, secs) in [("old", 30i64), ("new", 10)] {
            let mut job = Job::new(id.into(), "echo hello".into(), 3);
            job.created_at = chrono::Utc::now() - chrono::Duration::seconds(secs);
            store.add(&job).await.unwrap();
        }

        // Unfiltered is most-recent-first for display.
        let all = qm.list(None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);

        // A state filter is oldest-first for processing fairness.
        let pending = qm.list(Some(JobState::Pending)).await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "new"]);
    }

    #[tokio::test]
    async fn retry_dlq_job_not_found() {
        let qm = manager().await;
        let err = qm.retry_dlq_job("ghost").await.unwrap_err();
        assert!(matches!(err, QueueError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn retry_dlq_job_rejects_non_dead_states() {
        let store = JobStore::in_memory().await.unwrap();
        let qm = QueueManager::new(store.clone(), QueuePolicy::default());

        for state in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
        ] {
            let id = format!("job-{state}");
            let mut job = Job::new(id.clone(), "echo hello".into(), 3);
            job.state = state;
            job.attempts = 1;
            store.add(&job).await.unwrap();

            let err = qm.retry_dlq_job(&id).await.unwrap_err();
            assert!(matches!(err, QueueError::StateConflict { .. }));

            // The job must be left unmodified.
            let unchanged = store.get(&id).await.unwrap().unwrap();
            assert_eq!(unchanged.state, state);
            assert_eq!(unchanged.attempts, 1);
        }
    }

    #[tokio::test]
    async fn retry_dlq_job_resets_dead_job() {
        let store = JobStore::in_memory().await.unwrap();
        let qm = QueueManager::new(store.clone(), QueuePolicy::default());

        let mut job = Job::new("job1".into(), "false".into(), 2);
        job.state = JobState::Dead;
        job.attempts = 2;
        store.add(&job).await.unwrap();

        let retried = qm.retry_dlq_job("job1").await.unwrap();
        assert_eq!(retried.state, JobState::Pending);
        assert_eq!(retried.attempts, 0);

        // A second retry is only valid after the job re-fails.
        let err = qm.retry_dlq_job("job1").await.unwrap_err();
        assert!(matches!(err, QueueError::StateConflict { .. }));
    }

    #[tokio::test]
    async fn dlq_jobs_lists_only_dead() {
        let store = JobStore::in_memory().await.unwrap();
        let qm = QueueManager::new(store.clone(), QueuePolicy::default());

        let mut dead = Job::new("dead1".into(), "false".into(), 1);
        dead.state = JobState::Dead;
        store.add(&dead).await.unwrap();
        store
            .add(&Job::new("live1".into(), "echo hello".into(), 3))
            .await
            .unwrap();

        let dlq = qm.dlq_jobs().await.unwrap();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].id, "dead1");
    }

    #[tokio::test]
    async fn stats_total_is_sum_of_parts() {
        let store = JobStore::in_memory().await.unwrap();
        let qm = QueueManager::new(store.clone(), QueuePolicy::default());

        // Empty store first.
        let stats = qm.stats().await.unwrap();
        assert_eq!(stats.total, 0);

        for (i, state) in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
            JobState::Dead,
            JobState::Pending,
        ]
        .iter()
        .enumerate()
        {
            let mut job = Job::new(format!("job{i}"), "echo hello".into(), 3);
            job.state = *state;
            store.add(&job).await.unwrap();
        }

        let stats = qm.stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.dead, 1);
        assert_eq!(
            stats.total,
            stats.pending + stats.processing + stats.completed + stats.failed + stats.dead
        );
    }
}
