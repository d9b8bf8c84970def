use anyhow::Context;
use clap::{Parser, Subcommand};
use sessionlog::{config, open_store, routes, state::AppState};
use std::net::SocketAddr;
use tracing::info;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sessionlog", about = "Append-only session event log", version)]
struct Cli {
    /// Path to TOML config file
    #[arg(short, long, default_value = "sessionlog.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Print the ids of every session in the journal
    Sessions,
    /// Print the events of one session from the journal
    Events {
        /// Session id, exactly as it was appended
        session_id: String,
    },
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging from RUST_LOG (default: info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionlog=info,sessionlog_store=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Serve => serve(cfg).await,
        Commands::Sessions => print_sessions(&cfg),
        Commands::Events { session_id } => print_events(&cfg, &session_id),
    }
}

// ── Serve ──────────────────────────────────────────────────────────────────

async fn serve(cfg: config::ServerConfig) -> anyhow::Result<()> {
    info!(
        "Opening {} journal in {}...",
        cfg.journal,
        cfg.data_dir.display()
    );
    let store = open_store(&cfg)?;

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid bind address")?;

    let state = AppState::new(cfg, store);
    let app = routes::app(state);

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped.");
    Ok(())
}

// ── Graceful shutdown ──────────────────────────────────────────────────────

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install CTRL+C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server...");
}

// ── Journal inspection ─────────────────────────────────────────────────────

fn print_sessions(cfg: &config::ServerConfig) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    for session_id in store.list_sessions() {
        println!("{session_id}");
    }
    Ok(())
}

fn print_events(cfg: &config::ServerConfig, session_id: &str) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let events = store.list_events(session_id);
    let json = serde_json::to_string_pretty(&events).context("failed to render events")?;
    println!("{json}");
    Ok(())
}
