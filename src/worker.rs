//! Worker poll loop: claim one job per tick, execute it, write the
//! outcome back. Any number of workers may run against the same store;
//! the store's atomic claim is the only coordination between them.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::job::Resolution;
use crate::store::JobStore;

/// The runner could not attempt execution at all (e.g. no shell). An
/// ordinary non-zero exit is a [`RunOutcome::Failed`], never this.
#[derive(Debug, Clone, Error)]
#[error("runner error: {0}")]
pub struct RunnerError(pub String);

/// What happened to a command that the runner did manage to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit status zero.
    Succeeded,
    /// Non-zero exit, with the code when one was reported.
    Failed(Option<i32>),
    /// Deadline exceeded. Treated by the worker exactly like `Failed`.
    TimedOut,
}

/// Executes a shell command under a deadline. Abstracted so tests can
/// substitute a deterministic runner for real process spawning.
pub trait CommandRunner {
    async fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> std::result::Result<RunOutcome, RunnerError>;
}

/// Runs commands via `sh -c`, killing the child when the deadline passes.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        timeout: Duration,
    ) -> std::result::Result<RunOutcome, RunnerError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RunnerError(format!("failed to spawn shell: {e}")))?;

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(RunOutcome::Succeeded),
            Ok(Ok(status)) => Ok(RunOutcome::Failed(status.code())),
            Ok(Err(e)) => Err(RunnerError(format!("failed to wait for command: {e}"))),
            Err(_elapsed) => {
                // Best effort; the child may already be gone.
                let _ = child.start_kill();
                Ok(RunOutcome::TimedOut)
            }
        }
    }
}

/// Result of one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// No unclaimed pending job was available.
    Idle,
    /// Another worker won the claim race; try again next tick.
    Lost,
    /// A job was executed and its outcome written back.
    Resolved {
        job_id: String,
        resolution: Resolution,
    },
    /// The runner could not attempt execution; the job was marked failed
    /// and its lock released.
    RunnerFailed { job_id: String },
}

/// A single polling agent. Safe to run many instances concurrently
/// against one store.
pub struct Worker<R: CommandRunner> {
    store: JobStore,
    runner: R,
    worker_id: String,
    poll_interval: Duration,
    command_timeout: Duration,
}

impl<R: CommandRunner> Worker<R> {
    pub fn new(
        store: JobStore,
        runner: R,
        command_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            runner,
            worker_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            poll_interval,
            command_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.worker_id
    }

    /// Poll until the token is cancelled. Per-job errors never stop the
    /// loop; cancellation is only observed between ticks, after any
    /// in-flight resolution has completed.
    pub async fn run(self, token: CancellationToken) {
        tracing::info!(worker_id = %self.worker_id, "worker started");
        loop {
            if token.is_cancelled() {
                break;
            }

            match self.tick().await {
                Ok(_) => {}
                Err(e) => {
                    // Persistence failure mid-resolution: the job may be
                    // left claimed with no state update. Report and move
                    // to the next tick.
                    tracing::error!(worker_id = %self.worker_id, error = %e, "tick failed");
                }
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        tracing::info!(worker_id = %self.worker_id, "worker stopped");
    }

    /// One poll tick: claim the oldest unclaimed pending job, execute it,
    /// resolve. Execution outcomes are fully absorbed into job-state
    /// transitions; only store failures surface as errors.
    pub async fn tick(&self) -> Result<Tick> {
        let mut candidates = self.store.list_unclaimed_pending().await?;
        if candidates.is_empty() {
            return Ok(Tick::Idle);
        }
        let mut job = candidates.remove(0);

        if !self.store.claim(&job.id, &self.worker_id).await? {
            tracing::debug!(worker_id = %self.worker_id, job_id = %job.id, "lost claim race");
            return Ok(Tick::Lost);
        }

        tracing::info!(worker_id = %self.worker_id, job_id = %job.id, command = %job.command, "processing job");

        match self.runner.run(&job.command, self.command_timeout).await {
            Ok(RunOutcome::Succeeded) => {
                let resolution = job.apply_success();
                self.store.update(&job).await?;
                tracing::info!(worker_id = %self.worker_id, job_id = %job.id, "job completed");
                Ok(Tick::Resolved {
                    job_id: job.id,
                    resolution,
                })
            }
            Ok(outcome @ (RunOutcome::Failed(_) | RunOutcome::TimedOut)) => {
                let resolution = job.apply_failure();
                self.store.update(&job).await?;
                match resolution {
                    Resolution::Dead { attempts } => {
                        tracing::warn!(
                            worker_id = %self.worker_id,
                            job_id = %job.id,
                            attempts,
                            "job moved to DLQ, retries exhausted"
                        );
                    }
                    Resolution::Retrying {
                        attempt,
                        max_retries,
                    } => {
                        tracing::warn!(
                            worker_id = %self.worker_id,
                            job_id = %job.id,
                            outcome = ?outcome,
                            "job failed, will retry (attempt {attempt}/{max_retries})"
                        );
                    }
                    Resolution::Completed => unreachable!("failure cannot resolve as completed"),
                }
                Ok(Tick::Resolved {
                    job_id: job.id,
                    resolution,
                })
            }
            Err(err) => {
                // Unrecoverable for this attempt. The state write and the
                // lock release are deliberately separate steps here.
                job.mark_failed();
                self.store.update(&job).await?;
                self.store.release(&job.id).await?;
                tracing::error!(worker_id = %self.worker_id, job_id = %job.id, error = %err, "runner error");
                Ok(Tick::RunnerFailed { job_id: job.id })
            }
        }
    }
}
