//! rsbootstrap -- idempotent replica-set bootstrap.
//!
//! Crash-only: there is no resume state. Every start re-inspects the
//! cluster and converges from there; a fatal failure exits non-zero so the
//! process supervisor restarts the whole sequence.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use rsbootstrap::admin::client::ClusterAdmin;
use rsbootstrap::admin::memory::MemoryCluster;
use rsbootstrap::admin::mongo::MongoClusterAdmin;
use rsbootstrap::bootstrap::inspect::{ReplicationState, ReplicationStateInspector};
use rsbootstrap::bootstrap::seed::assignment_seed;
use rsbootstrap::bootstrap::{BootstrapPlan, Bootstrapper, LOG_TARGET};
use rsbootstrap::config::{Config, LoggingConfig};
use rsbootstrap::errors::{BootstrapError, EXIT_CONFIG};
use rsbootstrap::retry::{RetryPolicy, TokioClock};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "rsbootstrap",
    version,
    about = "Idempotent MongoDB replica-set bootstrap"
)]
struct Cli {
    /// Optional YAML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run the bootstrap sequence (default).
    Run,
    /// Inspect and print the replica set state once.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match rsbootstrap::config::resolve_from_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            rsbootstrap::logging::init(&LoggingConfig::default());
            error!(target: LOG_TARGET, "Invalid configuration: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    rsbootstrap::logging::init(&config.logging);

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Status => status(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: LOG_TARGET, "Bootstrap failed: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn connect(config: &Config) -> Result<Arc<dyn ClusterAdmin>, BootstrapError> {
    match config.admin.backend.as_str() {
        "memory" => {
            info!(target: LOG_TARGET, "Using simulated in-memory replica set");
            Ok(Arc::new(MemoryCluster::new()))
        }
        _ => {
            let admin = MongoClusterAdmin::connect(&config.admin_uri()).await?;
            Ok(Arc::new(admin))
        }
    }
}

async fn run(config: &Config) -> Result<(), BootstrapError> {
    let admin = connect(config).await?;
    let policy = RetryPolicy::primary_wait().with_max_attempts(config.bootstrap.max_primary_attempts);
    let bootstrapper = Bootstrapper::new(
        admin,
        BootstrapPlan::from(config),
        policy,
        Arc::new(TokioClock),
    );
    bootstrapper.run(assignment_seed(chrono::Utc::now())).await?;
    Ok(())
}

async fn status(config: &Config) -> Result<(), BootstrapError> {
    let inspector = ReplicationStateInspector::new(connect(config).await?);
    let state = inspector.inspect().await;
    if let ReplicationState::Fatal(e) = &state {
        return Err(e.clone().into());
    }
    match state.status() {
        Some(s) => {
            let members: Vec<&str> = s.members.iter().map(|m| m.name.as_str()).collect();
            println!("{} (myState={:?}, members=[{}])", state.label(), s.my_state, members.join(", "));
        }
        None => println!("{}", state.label()),
    }
    Ok(())
}
