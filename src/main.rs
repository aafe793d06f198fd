use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use alivewater_monitor::config::LoggingConfig;
use alivewater_monitor::pipeline::verdict;
use alivewater_monitor::web::{create_router, AppState};
use alivewater_monitor::{AppConfig, CycleScheduler, CycleScope, Monitor, Trigger};

#[derive(Parser)]
#[command(name = "alivewater-monitor", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic monitor and the trigger API (default)
    Serve,
    /// Run a single cycle and exit with its status
    Check {
        #[arg(long, value_enum, default_value_t = CycleScope::All)]
        scope: CycleScope,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            // No logging settings yet, so report through a default subscriber
            let _guard = init_tracing(&LoggingConfig::default())?;
            report_config_error(&e);
            return Err(e.into());
        }
    };
    let guard = init_tracing(&config.logging)?;

    let monitor = Arc::new(Monitor::from_config(Arc::clone(&config))?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, monitor).await,
        Command::Check { scope } => {
            let result = monitor
                .run_cycle(
                    scope,
                    Trigger::OnDemand {
                        caller: "cli".to_string(),
                    },
                )
                .await;
            let (status, message) = verdict(&result);
            println!("{}", message);

            drop(guard);
            std::process::exit(status.code());
        }
    }
}

async fn serve(config: Arc<AppConfig>, monitor: Arc<Monitor>) -> Result<()> {
    info!("Starting AliveWater monitor...");

    let mut scheduler = CycleScheduler::new(Arc::clone(&monitor)).await?;
    scheduler.start().await?;

    let state = AppState {
        monitor,
        config: Arc::clone(&config),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Trigger API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

fn report_config_error(err: &config::ConfigError) {
    error!("Configuration rejected: {}", err);
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "alivewater_monitor={},tower_http=info",
            config.level
        ))
    })?;

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "alivewater-monitor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
