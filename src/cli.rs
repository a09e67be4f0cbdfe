//! clap-based command-line interface.
//!
//! Defines the [`Cli`] struct with the top-level subcommands and the
//! nested `worker`, `dlq` and `config` command groups.

use clap::{Parser, Subcommand, ValueEnum};

use crate::job::JobState;

/// queuectl: CLI-based background job queue with a dead letter queue.
#[derive(Debug, Parser)]
#[command(name = "queuectl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose (debug-level) logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Job state filter accepted by `list --state`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StateArg {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl From<StateArg> for JobState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Pending => JobState::Pending,
            StateArg::Processing => JobState::Processing,
            StateArg::Completed => JobState::Completed,
            StateArg::Failed => JobState::Failed,
            StateArg::Dead => JobState::Dead,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enqueue a new job.
    ///
    /// Accepts either a bare command string or a JSON object:
    /// `queuectl enqueue '{"id":"job1","command":"echo hello"}'`
    Enqueue {
        /// Command string, or JSON with `command` plus optional `id`
        /// and `max_retries`.
        job: String,
    },

    /// Worker commands.
    #[command(subcommand)]
    Worker(WorkerCommand),

    /// Show the queue status summary.
    Status,

    /// List jobs.
    List {
        /// Only show jobs in this state.
        #[arg(long)]
        state: Option<StateArg>,

        /// Maximum number of jobs to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Dead letter queue commands.
    #[command(subcommand)]
    Dlq(DlqCommand),

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show detailed information for one job.
    Info {
        /// Job id.
        id: String,
    },

    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Start worker loop(s) in this process.
    Start {
        /// Number of workers to run.
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// List jobs in the dead letter queue.
    List {
        /// Maximum number of jobs to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Move a dead job back to the queue with a fresh retry budget.
    Retry {
        /// Job id.
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print one configuration key, or all of them.
    Get {
        /// Key name (e.g. `max_retries`).
        key: Option<String>,
    },

    /// Set a configuration key.
    Set { key: String, value: String },

    /// Reset the configuration to defaults.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
}
