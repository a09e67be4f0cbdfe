mod cli;
mod config;
mod error;
mod job;
mod queue;
mod shutdown;
mod store;
mod ui;
mod worker;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

use cli::{Cli, Command, ConfigCommand, DlqCommand, WorkerCommand};
use config::QueueConfig;
use error::QueueError;
use queue::{QueueManager, QueuePolicy};
use store::JobStore;
use worker::{ShellRunner, Worker};

/// JSON form of an enqueue request. A payload that is not a JSON
/// object is treated as a bare command string; an object without a
/// `command` field is rejected rather than enqueued as literal text.
#[derive(Debug, Deserialize)]
struct JobSpec {
    command: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    max_retries: Option<u32>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "queuectl=debug" } else { "queuectl=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<()> {
    let home = config::queue_home()?;
    let cfg = QueueConfig::load(&home)?;

    match cli.command {
        Command::Enqueue { job } => {
            let manager = open_queue(&cfg).await?;
            let spec = parse_job_spec(&job)?;
            let created = manager
                .enqueue(&spec.command, spec.id, spec.max_retries)
                .await?;
            ui::print_enqueued(&created);
        }

        Command::Worker(WorkerCommand::Start { count }) => {
            if count < 1 {
                return Err(QueueError::Validation("worker count must be >= 1".into()).into());
            }
            let store = open_store().await?;
            let token = shutdown::install_shutdown_handler();
            let timeout = Duration::from_secs(cfg.worker_timeout);
            let poll_interval = Duration::from_secs(1);

            let mut handles = Vec::with_capacity(count);
            for _ in 0..count {
                let worker = Worker::new(store.clone(), ShellRunner, timeout, poll_interval);
                println!("Worker {} started", worker.id());
                handles.push(tokio::spawn(worker.run(token.clone())));
            }

            let spinner = ui::WorkerSpinner::start(count);
            for handle in handles {
                handle.await?;
            }
            spinner.finish();
        }

        Command::Status => {
            let manager = open_queue(&cfg).await?;
            ui::print_status(&manager.stats().await?);
        }

        Command::List { state, limit } => {
            let manager = open_queue(&cfg).await?;
            let jobs = manager.list(state.map(Into::into)).await?;
            ui::print_job_table(&jobs, limit);
        }

        Command::Dlq(DlqCommand::List { limit }) => {
            let manager = open_queue(&cfg).await?;
            let jobs = manager.dlq_jobs().await?;
            ui::print_dlq_table(&jobs, limit);
        }

        Command::Dlq(DlqCommand::Retry { id }) => {
            let manager = open_queue(&cfg).await?;
            manager.retry_dlq_job(&id).await?;
            ui::print_success(&format!("Job {id} moved back to queue for retry"));
        }

        Command::Config(ConfigCommand::Get { key }) => match key {
            Some(key) => println!("{key}={}", cfg.get(&key)?),
            None => {
                println!("Current configuration:");
                for (key, value) in cfg.entries() {
                    println!("  {key}: {value}");
                }
            }
        },

        Command::Config(ConfigCommand::Set { key, value }) => {
            let mut cfg = cfg;
            cfg.set(&key, &value)?;
            cfg.save(&home)?;
            ui::print_success(&format!("{key} = {value}"));
        }

        Command::Config(ConfigCommand::Reset { yes }) => {
            if !yes && !ui::confirm("Reset configuration to defaults?")? {
                println!("Aborted");
                return Ok(());
            }
            QueueConfig::default().save(&home)?;
            ui::print_success("Configuration reset to defaults");
        }

        Command::Info { id } => {
            let manager = open_queue(&cfg).await?;
            let job = manager
                .job(&id)
                .await?
                .ok_or(QueueError::JobNotFound(id))?;
            ui::print_job_details(&job);
        }

        Command::Version => {
            println!("queuectl version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn open_store() -> Result<JobStore> {
    let home = config::queue_home()?;
    std::fs::create_dir_all(&home)?;
    Ok(JobStore::open(&config::db_path(&home)).await?)
}

async fn open_queue(cfg: &QueueConfig) -> Result<QueueManager> {
    let store = open_store().await?;
    Ok(QueueManager::new(
        store,
        QueuePolicy {
            max_retries: cfg.max_retries,
        },
    ))
}

fn parse_job_spec(raw: &str) -> error::Result<JobSpec> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(_)) => serde_json::from_str(raw)
            .map_err(|e| QueueError::Validation(format!("invalid enqueue payload: {e}"))),
        _ => Ok(JobSpec {
            command: raw.to_string(),
            id: None,
            max_retries: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_parses_into_spec() {
        let spec = parse_job_spec(r#"{"id":"job1","command":"echo hello","max_retries":5}"#).unwrap();
        assert_eq!(spec.command, "echo hello");
        assert_eq!(spec.id.as_deref(), Some("job1"));
        assert_eq!(spec.max_retries, Some(5));
    }

    #[test]
    fn bare_string_is_the_command() {
        let spec = parse_job_spec("echo hello").unwrap();
        assert_eq!(spec.command, "echo hello");
        assert!(spec.id.is_none());
        assert!(spec.max_retries.is_none());
    }

    #[test]
    fn json_object_without_command_is_rejected() {
        // Must not fall through and enqueue the literal JSON text.
        let err = parse_job_spec(r#"{"id":"x","max_retries":2}"#).unwrap_err();
        assert!(matches!(err, QueueError::Validation(_)));
    }

    #[test]
    fn invalid_json_falls_back_to_command_string() {
        let spec = parse_job_spec(r#"{"command": }"#).unwrap();
        assert_eq!(spec.command, r#"{"command": }"#);
    }
}
