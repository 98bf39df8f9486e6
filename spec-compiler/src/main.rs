//! Command-line entry point: compiles one request body and prints the outcome.
//!
//! ```bash
//! spec-compiler request.json --skip-downstream
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use spec_compiler::config::{LoggingConfig, ServiceConfig};
use spec_compiler::core::{validate_request_body, PipelineOutcome, RequestContext};
use spec_compiler::pipeline::CompilePipeline;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Compiles a structured specification against repository context.
#[derive(Debug, Parser)]
#[command(name = "spec-compiler")]
#[command(about = "Compiles a specification and forwards the artifact downstream")]
#[command(version)]
struct Args {
    /// JSON compile request (plan_id, spec_index, spec, github_owner, github_repo).
    request: PathBuf,

    /// Correlation id (UUID); generated when absent or invalid.
    #[arg(long)]
    request_id: Option<String>,

    /// Idempotency key recorded in the logs.
    #[arg(long)]
    idempotency_key: Option<String>,

    /// Stop after the model stage without forwarding the artifact.
    #[arg(long)]
    skip_downstream: bool,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_outcome(outcome: &PipelineOutcome) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(if outcome.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    init_tracing(&config.logging);
    tracing::info!(app_env = %config.app_env, "Spec compiler starting");

    let request = RequestContext::from_headers(args.request_id.as_deref(), args.idempotency_key.as_deref());
    let body = tokio::fs::read(&args.request)
        .await
        .with_context(|| format!("failed to read {}", args.request.display()))?;

    let task = match validate_request_body(&body, config.max_request_body_bytes) {
        Ok(task) => task,
        Err(error) => {
            tracing::warn!(error = %error, "Compile request rejected");
            return print_outcome(&PipelineOutcome::rejected(&request.request_id, &error));
        }
    };

    let pipeline = CompilePipeline::from_config(&config)
        .context("failed to assemble pipeline")?
        .with_skip_downstream(args.skip_downstream);

    let run = pipeline.run(&task, &request).await;
    tracing::debug!(states = ?run.trace.states, "Pipeline trace");
    print_outcome(&run.outcome)
}
