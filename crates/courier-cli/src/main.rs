//! slack-courier: deliver a block-formatted message, described as JSON on
//! stdin or in a file, to one channel with optional threading and crossposts.

mod de;
mod descriptor;
mod health;
mod orchestrate;
mod output;

#[cfg(test)]
mod tests;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use courier_slack::ApiClient;

use crate::descriptor::Descriptor;

#[derive(Debug, Parser)]
#[command(
    name = "slack-courier",
    about = "Deliver block-formatted messages to Slack from automation pipelines",
    version
)]
struct Cli {
    /// Path to the message descriptor JSON; standard input when omitted.
    input: Option<PathBuf>,

    /// Validate local dependencies without sending anything.
    #[arg(long)]
    health_check: bool,

    /// With --health-check, also probe the remote API with an auth test.
    #[arg(long)]
    remote: bool,

    /// Write the result JSON here instead of standard output.
    #[arg(long, env = "SLACK_COURIER_OUTPUT")]
    output: Option<PathBuf>,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    // Diagnostics go to stderr; stdout carries exactly one JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        error!("{error:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.health_check {
        // Only a file argument is read here; probing must work without a
        // descriptor on stdin.
        let descriptor_text = cli
            .input
            .as_deref()
            .map(std::fs::read_to_string)
            .transpose()
            .context("failed to read the descriptor file")?;
        let report =
            health::run_health_check(descriptor_text.as_deref(), cli.remote, &env_lookup).await;
        println!("{}", serde_json::to_string(&report.document)?);
        if !report.healthy {
            return Err(anyhow!("health check failed"));
        }
        return Ok(());
    }

    let text = read_descriptor_text(cli.input.as_deref())?;
    let descriptor: Descriptor =
        serde_json::from_str(&text).context("the descriptor is not valid JSON")?;
    let request = descriptor::resolve(descriptor, &env_lookup)?;
    let client = ApiClient::new(&request.api_base, &request.credential)?;

    let report = match request.overall_deadline() {
        Some(deadline) => tokio::time::timeout(deadline, orchestrate::run_send(&client, &request))
            .await
            .map_err(|_| {
                anyhow!(
                    "delivery pipeline timed out after {}s",
                    deadline.as_secs()
                )
            })??,
        None => orchestrate::run_send(&client, &request).await?,
    };

    output::emit_report(&report, cli.output.as_deref())
}

fn read_descriptor_text(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read descriptor from {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read descriptor from stdin")?;
            Ok(text)
        }
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
