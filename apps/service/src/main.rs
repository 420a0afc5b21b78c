use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::level_filters::LevelFilter;

use upkeep_service::config::Config;
use upkeep_service::database::{self, Database, models::Service};
use upkeep_service::monitoring::{MonitoringScheduler, ProbeExecutor, ServiceType, StoredMaintenanceOracle};
use upkeep_service::notification::{NotificationDispatcher, WebhookSender};
use upkeep_service::retention::{RetentionCleanup, RetentionPolicy};
use upkeep_service::validation::validate_target;

#[derive(Parser)]
#[command(name = "upkeep")]
#[command(about = "upkeep - uptime and health monitoring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Config file path (defaults to ~/.config/upkeep/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor every active service until interrupted
    Run,

    /// Run one check and print the result as JSON
    Check {
        /// Protocol to check with
        #[arg(long = "type", value_parser = parse_service_type)]
        service_type: ServiceType,

        /// URL, host or host:port, depending on the type
        target: String,

        /// Expected body content, either a substring or /regex/flags
        #[arg(long)]
        pattern: Option<String>,

        /// Extra request header as `Name: value`
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Print the effective configuration
    Config,
}

fn parse_service_type(raw: &str) -> Result<ServiceType, String> {
    raw.parse()
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw.split_once(':').ok_or_else(|| format!("header '{raw}' must be 'Name: value'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header '{raw}' has no name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    logger::init_with(level, config.logging.format.parse().ok());

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Check { service_type, target, pattern, headers } => {
            check(&config, service_type, target, pattern, headers).await
        }
        Commands::Config => {
            print!("{config}");
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let database: Arc<dyn Database> =
        Arc::new(database::connect(&config.database.path, config.database.max_connections).await?);
    info!(path = %config.database.path.display(), "Database ready");

    let sender = WebhookSender::new(Duration::from_secs(config.notifications.delivery_timeout_seconds))?;
    let scheduler = MonitoringScheduler::new(
        database.clone(),
        ProbeExecutor::new(&config.probes)?,
        NotificationDispatcher::new(database.clone(), Arc::new(sender)),
        Arc::new(StoredMaintenanceOracle::new(database.clone())),
        config.notifications.ssl_policy(),
    );

    let started = scheduler.start_all_monitoring().await?;
    info!(started, "Monitoring active services");

    let shutdown = CancellationToken::new();
    let cleanup = RetentionCleanup::new(database, RetentionPolicy::from(&config.retention))
        .start_periodic_cleanup(shutdown.clone());

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    shutdown.cancel();
    scheduler.stop_all_monitoring().await;
    cleanup.await?;
    Ok(())
}

async fn check(
    config: &Config,
    service_type: ServiceType,
    target: String,
    pattern: Option<String>,
    headers: Vec<(String, String)>,
) -> Result<()> {
    if let Err(error) = validate_target(&target, service_type).into_result() {
        bail!("Invalid target: {error}");
    }

    let mut service = Service::new("on-demand", service_type, target);
    service.content_match_pattern = pattern;
    service.headers.extend(headers);

    let executor = ProbeExecutor::new(&config.probes)?;
    let result = executor.execute(&service).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
