//! Keycard CLI: permission checks and gates against the back-office API.

mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keycard_api::{HttpPermissionSource, RetryConfig};
use keycard_config::{CliOverrides, KeycardConfig};
use keycard_permissions::{
    CommonPermission, Gate, GateOptions, KeycardError, PermissionCache, PermissionEvaluator,
    PermissionSource, PermissionSpec, StaticSource,
};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "keycard", version, about = "Permission checks for the back office")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Permission API base URL (overrides KEYCARD_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Access token (overrides KEYCARD_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// User id the token belongs to (overrides KEYCARD_USER_ID)
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// Cache staleness window in seconds
    #[arg(long, global = true)]
    ttl: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one or more `resource:action[:scope]` specs
    Check {
        /// Specs to evaluate
        #[arg(required = true)]
        specs: Vec<PermissionSpec>,

        /// Require every spec (AND) instead of any (OR)
        #[arg(long)]
        all: bool,
    },
    /// List common permission aliases, or check one
    Common {
        /// Alias to check, e.g. CREATE_USER
        name: Option<CommonPermission>,
    },
    /// Resolve a gate and print what would be rendered
    Gate {
        /// Specs guarded by the gate; none means the gate always passes
        specs: Vec<PermissionSpec>,

        /// Require every spec (AND) instead of any (OR)
        #[arg(long)]
        all: bool,

        /// Render nothing instead of the unauthorized view
        #[arg(long)]
        hide_on_denied: bool,

        /// Render nothing while loading
        #[arg(long)]
        no_loading: bool,
    },
    /// Print the grants held by the configured user
    Grants,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = KeycardConfig::load(CliOverrides {
        api_base_url: cli.api_url,
        access_token: cli.token,
        user_id: cli.user_id,
        cache_ttl_secs: cli.ttl,
    })
    .context("Failed to load configuration")?;

    let source = build_source(&config).context("Failed to create permission source")?;
    tracing::debug!(
        source = source.name(),
        ttl_secs = config.cache_ttl.as_secs(),
        "permission source ready"
    );
    let cache = PermissionCache::new(source, config.cache_config());
    let evaluator = PermissionEvaluator::new(cache, config.identity());

    match cli.command {
        Command::Check { specs, all } => {
            let result = evaluator.evaluate_batch(&specs, all).await;
            report::print_result(&specs, &result, cli.json)?;
            Ok(report::exit_code(result.allowed))
        }
        Command::Common { name: None } => {
            report::print_common_table(cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Common { name: Some(common) } => {
            let specs = vec![common.spec()];
            let result = evaluator.evaluate_batch(&specs, true).await;
            report::print_result(&specs, &result, cli.json)?;
            Ok(report::exit_code(result.allowed))
        }
        Command::Gate {
            specs,
            all,
            hide_on_denied,
            no_loading,
        } => {
            let options = GateOptions {
                require_all: all || config.gate.require_all,
                show_loading: config.gate.show_loading && !no_loading,
                hide_on_denied: hide_on_denied || config.gate.hide_on_denied,
            };
            let gate = Gate::new(evaluator, specs).with_options(options);
            let decision = gate.resolve().await;
            report::print_gate(&decision, cli.json)?;
            Ok(report::exit_code(decision == keycard_permissions::GateDecision::Content))
        }
        Command::Grants => {
            let principal = config.require_principal()?;
            let set = evaluator
                .cache()
                .get(&principal)
                .await
                .context("Failed to fetch permissions")?;
            report::print_grants(&set, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Offline grants from the config file win over the HTTP API.
fn build_source(config: &KeycardConfig) -> Result<Arc<dyn PermissionSource>, KeycardError> {
    if config.is_offline() {
        return Ok(Arc::new(StaticSource::new(config.grants.clone())));
    }
    let source = HttpPermissionSource::new(&config.api_base_url, config.request_timeout)?
        .with_retry_config(RetryConfig {
            max_retries: config.max_retries,
            ..RetryConfig::default()
        });
    Ok(Arc::new(source))
}
