use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vigil_config::VigilConfig;

mod broadcast;
mod cli;
mod commands;
mod dto;
mod error;
mod extract;
mod routes;
mod state;

use cli::{Cli, Commands, ServeArgs};
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("vigil error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => VigilConfig::load_from(path),
        None => VigilConfig::load_with_dotenv(),
    }
    .context("failed to load configuration")?;

    match cli.command {
        Commands::Serve(args) => serve(args, config).await,
        Commands::User { action } => commands::user(action, &config).await,
        Commands::Org { action } => commands::org(action, &config).await,
        Commands::Member { action } => commands::member(action, &config).await,
        Commands::Session { action } => commands::session(action, &config).await,
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env("VIGIL_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}

async fn serve(args: ServeArgs, mut config: VigilConfig) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    let addr = config.server.socket_addr()?;
    let state = AppState::from_config(&config).await?;
    let broadcaster = state.broadcaster.clone();
    let activity_log = broadcast::spawn_activity_log(&broadcaster);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, database = %config.database.path, "vigil listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::debug!(
        subscribers = broadcaster.subscriber_count(),
        "closing activity broadcaster"
    );
    broadcaster.shutdown();
    if let Some(handle) = activity_log {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "activity log task failed");
        }
    }
    tracing::info!("vigil stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
