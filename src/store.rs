//! SQLite-backed job store.
//!
//! The store is the single source of truth for claim arbitration: all
//! mutual exclusion between workers goes through [`JobStore::claim`], a
//! single conditional `UPDATE` with exactly one winner under concurrency.
//! Every other mutation assumes the caller holds the job's lock.
//!
//! There is no lock expiry or heartbeat: a worker that dies mid-execution
//! leaves its job claimed until an operator intervenes.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::error::{QueueError, Result};
use crate::job::{Job, JobState};

const SCHEMA: &str = "\
    CREATE TABLE IF NOT EXISTS jobs (
        id          TEXT PRIMARY KEY,
        command     TEXT NOT NULL,
        state       TEXT NOT NULL,
        attempts    INTEGER NOT NULL DEFAULT 0,
        max_retries INTEGER NOT NULL DEFAULT 3,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL,
        locked_at   TEXT,
        locked_by   TEXT
    )";

const JOB_COLUMNS: &str =
    "id, command, state, attempts, max_retries, created_at, updated_at, locked_at, locked_by";

/// Raw row shape; `state` stays a string until [`JobRow::into_job`]
/// parses it into a [`JobState`].
#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    command: String,
    state: String,
    attempts: u32,
    max_retries: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    locked_at: Option<DateTime<Utc>>,
    locked_by: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            state: JobState::from_str(&self.state)?,
            id: self.id,
            command: self.command,
            attempts: self.attempts,
            max_retries: self.max_retries,
            created_at: self.created_at,
            updated_at: self.updated_at,
            locked_at: self.locked_at,
            locked_by: self.locked_by,
        })
    }
}

/// Durable keyed table of job records.
#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options).await
    }

    /// In-memory database, used by tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(SqliteConnectOptions::new().filename(":memory:")).await
    }

    // A single connection keeps writes serialized (SQLite allows only one
    // writer regardless) and makes in-memory databases coherent.
    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert a new job record.
    pub async fn add(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, updated_at, locked_at, locked_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(job.max_retries)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.locked_at)
        .bind(job.locked_by.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(QueueError::DuplicateId(job.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a job by id.
    pub async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(JobRow::into_job).transpose()
    }

    /// All jobs in the given state, oldest first. The ascending order is
    /// what makes claims FIFO-ish fair.
    pub async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE state = ? ORDER BY created_at ASC"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Pending jobs with no active lock, oldest first.
    pub async fn list_unclaimed_pending(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE state = ? AND locked_at IS NULL
             ORDER BY created_at ASC"
        ))
        .bind(JobState::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Every job, most recent first. Display order, deliberately the
    /// opposite of the per-state listings.
    pub async fn list_all(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Atomically claim a job for `worker_id`. Succeeds, moving the job
    /// to Processing with the lock fields set, if and only if the job was
    /// previously unlocked. Returns false (no side effect) if another
    /// claimant holds the lock.
    pub async fn claim(&self, id: &str, worker_id: &str) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs
             SET state = ?, locked_at = ?, locked_by = ?, updated_at = ?
             WHERE id = ? AND locked_at IS NULL",
        )
        .bind(JobState::Processing.as_str())
        .bind(now)
        .bind(worker_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() == 1;
        tracing::debug!(job_id = id, worker_id, won, "claim attempt");
        Ok(won)
    }

    /// Clear the lock fields without changing state. Used on the runner
    /// error path, where the state write and the lock release are kept as
    /// separate steps.
    pub async fn release(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs SET locked_at = NULL, locked_by = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Overwrite a job's mutable fields and clear the lock in the same
    /// write. A worker resolving a job always releases and transitions in
    /// one statement.
    pub async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs
             SET command = ?, state = ?, attempts = ?, max_retries = ?, updated_at = ?,
                 locked_at = NULL, locked_by = NULL
             WHERE id = ?",
        )
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(job.max_retries)
        .bind(job.updated_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(job.id.clone()));
        }
        Ok(())
    }

    /// Remove a job record. Not part of the lifecycle; explicit cleanup only.
    #[allow(dead_code)]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Per-state job counts, with every state present even at zero.
    pub async fn stats(&self) -> Result<BTreeMap<JobState, u64>> {
        let rows: Vec<(String, u32)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut counts: BTreeMap<JobState, u64> =
            JobState::ALL.iter().map(|s| (*s, 0)).collect();
        for (state, count) in rows {
            counts.insert(JobState::from_str(&state)?, u64::from(count));
        }
        Ok(counts)
    }
}
