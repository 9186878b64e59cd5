mod cli;
mod display;
mod logging;

use std::io::Stdout;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use ticker_engine::{
    CycleOutcome, DisplayPresenter, HelixTokenExchange, StatsClient, TickerConfig, TickerService,
    helix_scheduler,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::{Args, Commands};
use crate::display::TerminalRenderer;
use crate::logging::LogOptions;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Before parsing, so `.env` can feed the env-backed flags.
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let _log_guard = logging::init_logging(&LogOptions {
        verbose: args.verbose,
        quiet: args.quiet,
        json: args.log_json,
        dir: args.log_dir.clone(),
    })?;

    let config_path = args.config_path();
    let mut config = match &config_path {
        Some(path) => TickerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TickerConfig::default(),
    };
    args.apply_overrides(&mut config);

    match args.command() {
        Commands::Run => run(config, args.log_dir.clone()).await,
        Commands::Check => check(config).await,
        Commands::Config { show, init } => {
            if show {
                println!("{}", config.show()?);
            } else if init {
                let path = config_path.context("No config directory available, pass --config")?;
                if path.exists() {
                    println!("Config already exists at {}", path.display());
                } else {
                    TickerConfig::default().save(&path)?;
                    println!("✓ Wrote default config to {}", path.display());
                }
            } else {
                match config_path {
                    Some(path) => println!("Config file: {}", path.display()),
                    None => println!("No config directory available"),
                }
                println!("Use --show to display the effective configuration or --init to create one");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

type TerminalTicker = TickerService<HelixTokenExchange, StatsClient, TerminalRenderer<Stdout>>;

fn build_service(config: &TickerConfig) -> anyhow::Result<TerminalTicker> {
    let scheduler = helix_scheduler(config).context("Invalid configuration")?;
    let presenter = DisplayPresenter::new(config.display.clone(), &config.twitch.channel_login);
    Ok(TickerService::new(
        scheduler,
        presenter,
        TerminalRenderer::stdout(),
        config.display.refresh_interval(),
    ))
}

async fn run(config: TickerConfig, log_dir: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let service = build_service(&config)?;
    let cancel = CancellationToken::new();

    if let Some(dir) = log_dir {
        logging::start_retention_cleanup(dir, cancel.clone());
    }

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested");
        shutdown.cancel();
    });

    service.run(cancel).await;
    Ok(ExitCode::SUCCESS)
}

/// One cycle, for checking credentials and channel from a shell.
async fn check(config: TickerConfig) -> anyhow::Result<ExitCode> {
    let mut service = build_service(&config)?;
    match service.run_once().await {
        CycleOutcome::Updated(stats) => {
            info!(
                viewers = stats.viewer_count,
                followers = stats.follower_count,
                live = stats.is_live,
                "Check succeeded"
            );
            Ok(ExitCode::SUCCESS)
        }
        CycleOutcome::Failed(kind) => {
            error!(kind = %kind, "Check failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
