//! CLI dispatcher for the log archival engine, per spec.md §6.
//!
//! Exit codes: `0` success, `2` validation error, `3` transient failure,
//! `4` fatal — taken straight from [`log_archive_engine::EngineError::exit_code`].

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log_archive_engine::retention::ManualCleanupOptions;
use log_archive_engine::{Config, Engine, EngineError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "log-archive", version, about = "Time-windowed log batching and archival engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and register scheduler triggers.
    Init,
    /// Process the immediately preceding clock hour.
    RunHourly,
    /// Process one specific `(date, hour)` slot directly, bypassing cron.
    ProcessHour { date: String, hour: u8 },
    /// Ensure a daily job row exists (defaults to today).
    CreateJobs { date: Option<String> },
    /// Immediate retry sweep over recently failed slots.
    Retry,
    /// Retention sub-commands.
    #[command(subcommand)]
    Retention(RetentionCommands),
    /// Report job status for a date.
    Status { date: String },
}

#[derive(Subcommand)]
enum RetentionCommands {
    Stats,
    Run,
    DryRun,
    SetupLifecycle,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = run(cli).await;
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> i32 {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return EngineError::Validation(e.to_string()).exit_code();
        }
    };

    let report = Engine::validate_config(&config);
    if !report.is_valid {
        for error in &report.errors {
            tracing::error!(%error, "configuration validation failed");
        }
        return 2;
    }

    match dispatch(cli, config).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            e.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, config: Config) -> Result<(), EngineError> {
    match cli.command {
        Commands::Init => {
            let engine = Engine::init(config).await?;
            tracing::info!("scheduler running; waiting for ctrl-c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
            }
            engine.shutdown().await
        }
        Commands::RunHourly => {
            let engine = Engine::init(config).await?;
            let result = engine.run_hourly_job().await?;
            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
            engine.shutdown().await
        }
        Commands::ProcessHour { date, hour } => {
            let date = parse_date(&date)?;
            let engine = Engine::init(config).await?;
            let result = engine.process_specific_hour(date, hour).await?;
            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
            engine.shutdown().await
        }
        Commands::CreateJobs { date } => {
            let date = date.map(|d| parse_date(&d)).transpose()?;
            let engine = Engine::init(config).await?;
            let job = engine.create_daily_jobs(date).await?;
            println!("{}", serde_json::to_string_pretty(&job).unwrap_or_default());
            engine.shutdown().await
        }
        Commands::Retry => {
            let engine = Engine::init(config).await?;
            let reset_count = engine.retry_failed_jobs().await?;
            println!("reset {reset_count} slots for retry");
            engine.shutdown().await
        }
        Commands::Retention(sub) => {
            let engine = Engine::init(config).await?;
            match sub {
                RetentionCommands::Stats => {
                    let stats = engine.retention_stats().await?;
                    println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
                }
                RetentionCommands::Run => {
                    let counts = engine
                        .retention_run_manual_cleanup(ManualCleanupOptions { db: true, storage: true, dry_run: false })
                        .await?;
                    println!("{}", serde_json::to_string_pretty(&counts).unwrap_or_default());
                }
                RetentionCommands::DryRun => {
                    let counts = engine
                        .retention_run_manual_cleanup(ManualCleanupOptions { db: true, storage: true, dry_run: true })
                        .await?;
                    println!("{}", serde_json::to_string_pretty(&counts).unwrap_or_default());
                }
                RetentionCommands::SetupLifecycle => {
                    engine.retention_setup_lifecycle().await?;
                    println!("lifecycle policy applied");
                }
            }
            engine.shutdown().await
        }
        Commands::Status { date } => {
            let date = parse_date(&date)?;
            let engine = Engine::init(config).await?;
            let job = engine.get_job_status(date).await?;
            match job {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job).unwrap_or_default()),
                None => println!("no job found for {date}"),
            }
            engine.shutdown().await
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| EngineError::Validation(format!("invalid date '{s}': {e}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "log_archive_engine=info,mongodb=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}
