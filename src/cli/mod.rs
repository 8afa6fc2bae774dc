//! Command-line interface for draftmill.
//!
//! Provides commands for generating content, checking job status, listing
//! finished jobs, and inspecting configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::{FileJobStore, HttpGenerator, HttpSearch, JobStore, JsonlSink};
use crate::config;
use crate::core::{cancel_pair, Orchestrator};
use crate::domain::{JobRequest, JobStatus};

/// draftmill - multi-stage content generation pipeline
#[derive(Parser, Debug)]
#[command(name = "draftmill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate content for a topic
    Generate {
        /// Subject to write about
        topic: String,

        /// Constraints on the content (tone, structure, facts to include)
        #[arg(short, long, default_value = "")]
        requirements: String,

        /// Target length in words
        #[arg(short = 'l', long, default_value_t = 1000)]
        length: u32,

        /// Writing style
        #[arg(short, long, default_value = "professional")]
        style: String,

        /// Override the job timeout from config
        #[arg(long)]
        timeout_seconds: Option<u64>,
    },

    /// Check the status of a finished job
    Status {
        /// Job ID (UUID)
        job_id: String,
    },

    /// List recent jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Start as HTTP server (stub - not yet implemented)
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = ":9000")]
        address: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate {
                topic,
                requirements,
                length,
                style,
                timeout_seconds,
            } => generate(topic, requirements, length, style, timeout_seconds).await,
            Commands::Status { job_id } => show_status(&job_id).await,
            Commands::Jobs { limit } => list_jobs(limit).await,
            Commands::Serve { address } => serve(&address).await,
            Commands::Config => show_config(),
        }
    }
}

/// Build the orchestrator with the production collaborators.
fn build_orchestrator(timeout_override: Option<u64>) -> Result<Orchestrator> {
    let cfg = config::config()?;
    let jobs_dir = config::jobs_dir()?;

    let research = Arc::new(HttpSearch::new(cfg.search.endpoint.clone()));
    let generator = Arc::new(
        HttpGenerator::new(
            cfg.generator.endpoint.clone(),
            cfg.generator.model.clone(),
            cfg.generator.api_key.clone(),
            Duration::from_secs(cfg.generator.request_timeout_seconds),
        )
        .with_retry(cfg.generator.retry.clone()),
    );
    let sink = Arc::new(JsonlSink::new(jobs_dir.clone()));
    let store = Arc::new(FileJobStore::new(jobs_dir));

    let timeout = timeout_override.unwrap_or(cfg.limits.job_timeout_seconds);

    Ok(Orchestrator::new(research, generator, sink)
        .with_store(store)
        .with_timeout(Duration::from_secs(timeout))
        .with_search_limit(cfg.search.limit))
}

/// Run one generation job and print the result
async fn generate(
    topic: String,
    requirements: String,
    length: u32,
    style: String,
    timeout_seconds: Option<u64>,
) -> Result<()> {
    let orchestrator = build_orchestrator(timeout_seconds)?;

    let request = JobRequest::new(topic)
        .with_requirements(requirements)
        .with_style(style)
        .with_target_length(length);

    // Ctrl-C aborts the job instead of killing the process mid-write
    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let report = orchestrator.run_cancellable(request, token).await;

    match &report.status {
        JobStatus::Success => {
            println!("{}", report.final_text.as_deref().unwrap_or_default());
            eprintln!("\n[Job {} completed]", report.job_id);
        }
        JobStatus::SuccessDegraded => {
            println!("{}", report.final_text.as_deref().unwrap_or_default());
            eprintln!(
                "\n[Job {} completed degraded after {} fact-check retries]",
                report.job_id, report.iteration_count
            );
        }
        JobStatus::Aborted { reason } => {
            eprintln!("\n[Job {} aborted: {}]", report.job_id, reason);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Show the status of a finished job
async fn show_status(job_id_str: &str) -> Result<()> {
    let job_id = Uuid::parse_str(job_id_str)
        .with_context(|| format!("Invalid job ID: {}", job_id_str))?;

    let jobs_dir = config::jobs_dir()?;
    let store = FileJobStore::new(jobs_dir.clone());

    let report = store
        .load_job(job_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Job {} not found", job_id))?;

    println!("Job ID: {}", report.job_id);
    println!("Topic: {}", report.topic);
    println!("Status: {:?}", report.status);
    println!("Iterations: {}", report.iteration_count);
    println!("Started: {}", report.started_at);
    println!("Completed: {}", report.completed_at);

    if !report.metadata.is_empty() {
        println!("\nMetadata:");
        for (key, value) in &report.metadata {
            println!("  {}: {}", key, value);
        }
    }

    let sink = JsonlSink::new(jobs_dir);
    let records = sink.replay(job_id)?;
    if !records.is_empty() {
        println!("\nStages:");
        for record in records {
            println!(
                "  {:<10} {:<10} {:>6}ms  {}",
                record.stage,
                format!("{:?}", record.status).to_lowercase(),
                record.duration_ms.unwrap_or(0),
                record.output
            );
        }
    }

    Ok(())
}

/// List recent jobs
async fn list_jobs(limit: usize) -> Result<()> {
    let store = FileJobStore::new(config::jobs_dir()?);
    let reports = store.list_jobs().await?;

    if reports.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!("{:<38} {:<30} {:<18} {:>5}", "JOB ID", "TOPIC", "STATUS", "ITER");
    println!("{}", "-".repeat(94));

    for report in reports.iter().take(limit) {
        let status_str = match &report.status {
            JobStatus::Success => "success".to_string(),
            JobStatus::SuccessDegraded => "success-degraded".to_string(),
            JobStatus::Aborted { .. } => "aborted".to_string(),
        };
        let topic_truncated = if report.topic.len() > 27 {
            format!("{}...", &report.topic[..27])
        } else {
            report.topic.clone()
        };
        println!(
            "{:<38} {:<30} {:<18} {:>5}",
            report.job_id, topic_truncated, status_str, report.iteration_count
        );
    }

    Ok(())
}

/// Start HTTP server (stub)
async fn serve(address: &str) -> Result<()> {
    anyhow::bail!(
        "HTTP server mode not yet implemented. Would serve on {}",
        address
    )
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("draftmill configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home: {}", cfg.home.display());
    println!("  Jobs: {}", cfg.home.join("jobs").display());
    println!();
    println!("Generator:");
    println!("  Endpoint: {}", cfg.generator.endpoint);
    println!("  Model: {}", cfg.generator.model);
    println!(
        "  API key: {}",
        if cfg.generator.api_key.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!("  Request timeout: {}s", cfg.generator.request_timeout_seconds);
    println!("  Retry attempts: {}", cfg.generator.retry.max_attempts);
    println!();
    println!("Search:");
    println!("  Endpoint: {}", cfg.search.endpoint);
    println!("  Findings per job: {}", cfg.search.limit);
    println!();
    println!("Limits:");
    println!("  Job timeout: {}s", cfg.limits.job_timeout_seconds);

    Ok(())
}
