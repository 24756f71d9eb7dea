//! Custom-Resource Provider for Account-Level Inspector Scanning
//!
//! Enables Amazon Inspector scanning for the configured resource categories
//! as a provisioning-framework custom resource. The provider speaks
//! line-delimited JSON on stdin/stdout: one lifecycle event per input line,
//! one response object per output line. Logs go to stderr.

mod client;
mod enabler;
mod event;
mod provider;

use anyhow::Context;
use clap::Parser;
use enabler::RetryPolicy;
use event::ResourceCategory;
use provider::{EnablementProvider, ProviderConfig};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Custom-resource provider enabling account-level scan coverage
#[derive(Parser, Debug)]
#[command(name = "cfn-provider-inspector")]
#[command(about = "Custom-resource provider that enables account-level Inspector scanning")]
struct Args {
    /// Inspector management API endpoint
    #[arg(long, env = "INSPECTOR_ENDPOINT")]
    endpoint: String,

    /// Bearer token for the management API
    #[arg(long, env = "INSPECTOR_API_TOKEN")]
    api_token: Option<String>,

    /// Resource categories to protect (comma separated)
    #[arg(
        long,
        env = "INSPECTOR_RESOURCE_TYPES",
        value_delimiter = ',',
        default_values_t = [
            ResourceCategory::Ec2,
            ResourceCategory::Ecr,
            ResourceCategory::Lambda,
        ]
    )]
    resource_types: Vec<ResourceCategory>,

    /// Maximum enable attempts per invocation
    #[arg(long, env = "INSPECTOR_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Base backoff delay in milliseconds
    #[arg(long, env = "INSPECTOR_BASE_DELAY_MS", default_value_t = 1000)]
    base_delay_ms: u64,

    /// Request timeout for the management API in seconds
    #[arg(long, env = "INSPECTOR_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    tracing::info!(
        resource_types = ?args.resource_types,
        "Starting scan enablement provider"
    );

    let provider = EnablementProvider::new(ProviderConfig {
        endpoint: args.endpoint,
        api_token: args.api_token,
        resource_types: args.resource_types,
        retry: RetryPolicy {
            max_attempts: args.max_attempts,
            base_delay: Duration::from_millis(args.base_delay_ms),
            ..RetryPolicy::default()
        },
        request_timeout: Duration::from_secs(args.request_timeout_secs),
    });

    // The framework delivers lifecycle events over stdin, one JSON object
    // per line, and reads responses from stdout.
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();

    for line in stdin.lock().lines() {
        let input = line.context("failed to read event from stdin")?;
        if input.trim().is_empty() {
            continue;
        }

        let response = provider.handle_request(&input);
        writeln!(stdout_lock, "{}", response).context("failed to write response")?;
        stdout_lock.flush().context("failed to flush stdout")?;
    }

    tracing::info!("Scan enablement provider shutting down");
    Ok(())
}
