#![forbid(unsafe_code)]

//! `issue-agent-bridge` — issue tracker to remote coding agent bridge.
//!
//! Bootstraps configuration and the session store, resumes monitoring of
//! unfinished sessions, then serves the HTTP API until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use issue_agent_bridge::api::{self, AppState};
use issue_agent_bridge::config::GlobalConfig;
use issue_agent_bridge::gateway::client::GatewayClient;
use issue_agent_bridge::gateway::RemoteSessionGateway;
use issue_agent_bridge::notifier::github::GithubClient;
use issue_agent_bridge::orchestrator::monitor::{MonitorContext, MonitorSettings};
use issue_agent_bridge::orchestrator::session_manager::SessionManager;
use issue_agent_bridge::orchestrator::supervisor::MonitorSupervisor;
use issue_agent_bridge::persistence::db;
use issue_agent_bridge::persistence::session_repo::SessionRepo;
use issue_agent_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "issue-agent-bridge", about = "Issue tracker to remote agent bridge", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the HTTP listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the database file path.
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("issue-agent-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = if let Some(path) = &args.config {
        GlobalConfig::load_from_path(path)?
    } else {
        info!("no config file given; using defaults");
        GlobalConfig::default()
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(db_path) = args.db {
        config.db_path = db_path;
    }
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!(default_repo = %config.default_repo, "configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    let store = SessionRepo::new(Arc::clone(&db));
    info!(path = %config.db_path.display(), "database connected");

    // ── Collaborators ───────────────────────────────────
    let github = Arc::new(GithubClient::new(&config.github)?);
    let ct = CancellationToken::new();

    let supervisor = if config.gateway.api_key.is_some() {
        let gateway: Arc<dyn RemoteSessionGateway> = Arc::new(GatewayClient::new(&config.gateway)?);
        let ctx = MonitorContext {
            store: store.clone(),
            gateway,
            notifier: github.clone(),
            settings: MonitorSettings::from(&config.monitor),
        };
        Some(Arc::new(MonitorSupervisor::new(ctx, ct.clone())))
    } else {
        warn!("remote agent not configured; running without session monitoring");
        None
    };

    let sessions = Arc::new(SessionManager::new(
        store,
        github.clone(),
        github,
        supervisor.clone(),
    ));

    // ── Resume unfinished sessions before serving ───────
    match sessions.recover().await {
        Ok(report) => info!(resumed = report.resumed.len(), "recovery sweep done"),
        Err(err) => error!(%err, "recovery sweep failed"),
    }

    // ── Serve HTTP ──────────────────────────────────────
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        sessions,
    });
    let api_ct = ct.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(err) = api::serve(state, api_ct).await {
            error!(%err, "http api failed");
        }
    });

    info!("issue-agent-bridge ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if let Some(supervisor) = supervisor {
        supervisor.shutdown().await;
    }
    if let Err(err) = api_handle.await {
        error!(%err, "http api task panicked");
    }
    info!("issue-agent-bridge shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
