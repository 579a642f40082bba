// Webhook Gateway Service
// Authenticated webhook intake posting to an in-memory balance ledger

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_core::Ledger;
use security::{sign, RequestAuthenticator, SharedSecret};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use webhook_gateway::{logging, router, AppState, Config, Metrics, WebhookPipeline};

/// HMAC-authenticated webhook ledger
#[derive(Parser, Debug)]
#[command(
    name = "webhook-gateway",
    about = "HMAC-authenticated webhook ledger",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Server(ServerArgs),
    /// Print version information and exit
    Version,
    /// Print the authentication headers for a request body
    Sign(SignArgs),
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Directory holding app-config.toml and per-environment overrides
    #[arg(long, env = "WEBHOOK_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,
}

#[derive(Args, Debug)]
struct SignArgs {
    /// Shared HMAC secret
    #[arg(long, env = "HMAC_SECRET")]
    secret: String,

    /// One-time nonce
    #[arg(long)]
    nonce: String,

    /// Unix timestamp in seconds; defaults to now
    #[arg(long)]
    timestamp: Option<i64>,

    /// Exact request body to sign
    #[arg(long)]
    body: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => run_server(args).await,
        Commands::Version => {
            println!("webhook-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Sign(args) => {
            print_signed_headers(args);
            Ok(())
        }
    }
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let config = Config::load(&args.config_dir)
        .with_context(|| format!("failed to load configuration from {}", args.config_dir.display()))?;

    logging::init_logging(&config.logging.level, config.logging.format)
        .context("failed to initialize logging")?;

    info!("🚀 Starting Webhook Gateway");

    let auth_config = config.auth_config()?;
    info!(
        tolerance_secs = auth_config.timestamp_tolerance.as_secs(),
        nonce_retention_secs = auth_config.nonce.retention.as_secs(),
        "Authenticator configured"
    );

    let authenticator = Arc::new(RequestAuthenticator::new(config.webhook.secret(), auth_config));
    let ledger = Arc::new(Ledger::new());
    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);

    let state = AppState {
        pipeline: WebhookPipeline::new(authenticator, ledger),
        metrics,
    };
    let app = router(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("✅ Gateway listening on: {}", bind_addr);
    info!("   POST /webhook        - Signed ledger entry");
    info!("   GET  /balance/:user  - Balances for a user");
    info!("   GET  /health         - Health check");
    info!("   GET  /metrics        - Prometheus metrics");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        res = &mut server => {
            res.context("server task panicked")??;
            return Ok(());
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, draining connections");
        }
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(config.shutdown_grace(), &mut server).await {
        Ok(res) => res.context("server task panicked")??,
        Err(_) => {
            warn!(
                grace_secs = config.server.shutdown_grace_secs,
                "Graceful shutdown timed out, aborting open connections"
            );
            server.abort();
        }
    }

    info!("webhook-gateway stopped");
    Ok(())
}

fn print_signed_headers(args: SignArgs) {
    let timestamp = args
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp())
        .to_string();
    let signature = sign(
        &SharedSecret::from(args.secret),
        &timestamp,
        &args.nonce,
        args.body.as_bytes(),
    );

    println!("X-Timestamp: {}", timestamp);
    println!("X-Nonce: {}", args.nonce);
    println!("X-Signature: {}", signature);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sign_arguments_parse() {
        let cli = Cli::try_parse_from([
            "webhook-gateway",
            "sign",
            "--secret",
            "s",
            "--nonce",
            "n-1",
            "--timestamp",
            "1700000000",
            "--body",
            "{}",
        ])
        .unwrap();

        match cli.command {
            Commands::Sign(args) => {
                assert_eq!(args.nonce, "n-1");
                assert_eq!(args.timestamp, Some(1_700_000_000));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
