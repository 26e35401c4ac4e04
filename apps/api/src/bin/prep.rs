//! Terminal front end: runs one analysis against a running `prep-api`.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use prep_api::pipeline::{
    ControllerOptions, HttpBackend, PipelineController, RunOutcome, StepStatus,
};

#[derive(Parser, Debug)]
#[command(name = "prep", about = "Transfer interview preparation report")]
struct Cli {
    /// Base URL of the prep API server.
    #[arg(long, default_value = "http://localhost:3001")]
    server: String,
    #[arg(long)]
    university: String,
    #[arg(long)]
    department: String,
    /// Take the suggested spelling when the institution looks like a typo.
    #[arg(long)]
    accept_correction: bool,
    /// Also run the quality audit on the finished research.
    #[arg(long)]
    audit: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prep_api=warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let backend = HttpBackend::new(&cli.server).context("invalid --server")?;
    let controller = Arc::new(PipelineController::new(
        Arc::new(backend),
        ControllerOptions::default(),
    ));
    watch_ctrl_c(controller.clone());

    let mut outcome = controller.run(&cli.university, &cli.department).await;
    loop {
        outcome = match outcome {
            RunOutcome::NeedsConfirmation(validation) => {
                if !cli.accept_correction {
                    let suggestion = validation
                        .corrected_university
                        .as_deref()
                        .unwrap_or(&cli.university);
                    let fallback = format!("혹시 '{suggestion}'을(를) 찾으셨나요?");
                    eprintln!("{}", message_or(&validation.message, &fallback));
                    eprintln!("re-run with --accept-correction to use the suggestion");
                    return Ok(ExitCode::from(2));
                }
                controller.confirm_correction().await
            }
            RunOutcome::Paused => {
                print_steps(&controller);
                eprintln!("paused; press Enter to resume");
                wait_for_enter().await?;
                controller.resume().await
            }
            RunOutcome::Completed(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                if cli.audit {
                    if let Some(audit) = controller.audit_cached().await {
                        println!("{}", serde_json::to_string_pretty(&audit)?);
                    }
                }
                return Ok(ExitCode::SUCCESS);
            }
            RunOutcome::RateLimited { message, .. }
            | RunOutcome::InvalidInput { message }
            | RunOutcome::Failed { message } => {
                print_steps(&controller);
                eprintln!("{message}");
                return Ok(ExitCode::FAILURE);
            }
            RunOutcome::Invalid(validation) => {
                eprintln!(
                    "{}",
                    message_or(&validation.message, "존재하지 않는 대학교 또는 학과입니다.")
                );
                return Ok(ExitCode::FAILURE);
            }
            RunOutcome::NotStarted => return Ok(ExitCode::FAILURE),
        };
    }
}

fn message_or<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}

/// First Ctrl-C during a run pauses it; with nothing running it exits.
fn watch_ctrl_c(controller: Arc<PipelineController>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if controller.is_running() {
                info!("stopping run");
                controller.stop();
            } else {
                std::process::exit(130);
            }
        }
    });
}

async fn wait_for_enter() -> Result<()> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("reading stdin")?;
    Ok(())
}

fn print_steps(controller: &PipelineController) {
    for step in controller.steps() {
        let mark = match step.status {
            StepStatus::Completed => "done",
            StepStatus::Loading | StepStatus::Reviewing => "running",
            StepStatus::Paused => "paused",
            StepStatus::Error => "error",
            StepStatus::Idle => "-",
        };
        eprintln!("  {:<20} {mark}", step.label);
    }
}
