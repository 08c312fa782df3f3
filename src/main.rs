//! admission-webhooks - validating admission webhooks for Kubernetes.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Registers the policies on their routes
//! - Starts the health server and the HTTPS webhook server

use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use admission_webhooks::config::Args;
use admission_webhooks::health::{HealthState, run_health_server};
use admission_webhooks::webhooks::{WebhookServer, load_rustls_config, standard_registry};

/// Grace period for in-flight admission reviews to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("admission_webhooks=info".parse()?),
        )
        .json()
        .init();

    info!(
        addr = %args.addr,
        health_addr = %args.health_addr,
        exposure_annotation = %args.exposure_annotation,
        "Starting admission-webhooks"
    );

    let registry = standard_registry(&args.exposure_annotation)?;

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness probes pass while TLS loads
    let health_handle = {
        let health_state = health_state.clone();
        let addr = args.health_addr;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(addr, health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let tls = load_rustls_config(&args.tls_cert, &args.tls_key).await?;
    info!(cert = %args.tls_cert.display(), "Loaded TLS certificate");

    let server_handle = Handle::new();
    let webhook_handle = {
        let server = WebhookServer::new(registry, health_state.clone())
            .with_max_body_bytes(args.max_body_bytes);
        let handle = server_handle.clone();
        let addr = args.addr;
        tokio::spawn(async move { server.serve(addr, tls, handle).await })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            match result {
                Ok(Ok(())) => info!("Webhook server stopped"),
                Ok(Err(e)) => {
                    error!("Webhook server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => error!("Webhook server task panicked: {}", e),
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the endpoint is removed from the Service
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting up to {}s for in-flight admission reviews to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            server_handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)));
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("admission-webhooks stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the server cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
