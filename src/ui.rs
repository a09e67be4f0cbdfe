//! Terminal output: colored tables and the worker spinner.
//!
//! Uses `console` for styling and `indicatif` for the long-running
//! worker spinner. Everything here is read-only rendering; queue state
//! never changes in this module.

use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use crate::job::{Job, JobState};
use crate::queue::QueueStats;

const COMMAND_WIDTH: usize = 50;

fn truncate(command: &str) -> String {
    if command.chars().count() > COMMAND_WIDTH {
        let cut: String = command.chars().take(COMMAND_WIDTH).collect();
        format!("{cut}...")
    } else {
        command.to_string()
    }
}

fn state_style(state: JobState) -> Style {
    match state {
        JobState::Completed => Style::new().green(),
        JobState::Failed => Style::new().yellow(),
        JobState::Dead => Style::new().red(),
        JobState::Processing => Style::new().cyan(),
        JobState::Pending => Style::new(),
    }
}

pub fn print_success(message: &str) {
    println!("{} {message}", Style::new().green().bold().apply_to("✓"));
}

pub fn print_error(message: &str) {
    eprintln!("{} {message}", Style::new().red().bold().apply_to("Error:"));
}

/// Yes/no prompt. Anything other than `y`/`yes` counts as no.
pub fn confirm(question: &str) -> std::io::Result<bool> {
    let term = Term::stdout();
    term.write_str(&format!("{question} [y/N] "))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn print_enqueued(job: &Job) {
    print_success(&format!("Job enqueued: {}", job.id));
    println!("  Command: {}", job.command);
    println!("  State: {}", job.state);
    println!("  Max retries: {}", job.max_retries);
}

pub fn print_status(stats: &QueueStats) {
    let header = Style::new().cyan().bold();
    println!();
    println!("{}", header.apply_to("=== Queue Status ==="));
    println!("  {:<18} {}", "Total Jobs", stats.total);
    println!("  {:<18} {}", "Pending", stats.pending);
    println!("  {:<18} {}", "Processing", stats.processing);
    println!(
        "  {:<18} {}",
        "Completed",
        Style::new().green().apply_to(stats.completed)
    );
    println!(
        "  {:<18} {}",
        "Failed",
        Style::new().yellow().apply_to(stats.failed)
    );
    println!(
        "  {:<18} {}",
        "Dead Letter Queue",
        Style::new().red().apply_to(stats.dead)
    );
}

pub fn print_job_table(jobs: &[Job], limit: usize) {
    if jobs.is_empty() {
        println!("No jobs found");
        return;
    }

    let shown = &jobs[..jobs.len().min(limit)];
    println!(
        "{:<14} {:<12} {:<53} {:<9} {}",
        "ID", "State", "Command", "Attempts", "Created"
    );
    for job in shown {
        println!(
            "{:<14} {:<12} {:<53} {:<9} {}",
            job.id,
            job.state,
            truncate(&job.command),
            format!("{}/{}", job.attempts, job.max_retries),
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    if jobs.len() > limit {
        println!("\n(showing {limit} of {} jobs, use --limit to change)", jobs.len());
    }
}

pub fn print_dlq_table(jobs: &[Job], limit: usize) {
    if jobs.is_empty() {
        println!("No jobs in DLQ");
        return;
    }

    println!("{}", Style::new().red().bold().apply_to("Dead Letter Queue:"));
    let shown = &jobs[..jobs.len().min(limit)];
    println!(
        "{:<14} {:<53} {:<9} {:<12} {}",
        "ID", "Command", "Attempts", "Max Retries", "Updated"
    );
    for job in shown {
        println!(
            "{:<14} {:<53} {:<9} {:<12} {}",
            job.id,
            truncate(&job.command),
            job.attempts,
            job.max_retries,
            job.updated_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

pub fn print_job_details(job: &Job) {
    println!(
        "{}",
        Style::new().cyan().bold().apply_to(format!("Job Details: {}", job.id))
    );
    println!("  Command: {}", job.command);
    println!(
        "  State: {}",
        state_style(job.state).apply_to(job.state)
    );
    println!("  Attempts: {}/{}", job.attempts, job.max_retries);
    println!("  Created: {}", job.created_at.to_rfc3339());
    println!("  Updated: {}", job.updated_at.to_rfc3339());
    if let (Some(locked_at), Some(locked_by)) = (&job.locked_at, &job.locked_by) {
        println!("  Locked by: {locked_by} since {}", locked_at.to_rfc3339());
    }
}

/// Spinner shown while workers poll. Finishes cleanly on shutdown.
pub struct WorkerSpinner {
    pb: ProgressBar,
}

impl WorkerSpinner {
    pub fn start(count: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("{count} worker(s) polling, Ctrl-C to stop"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_with_message("workers stopped");
    }
}
