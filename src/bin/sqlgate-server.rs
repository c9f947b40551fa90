// ABOUTME: sqlgate HTTP server binary
// ABOUTME: Loads env config, wires resources, serves axum routes and shuts down gracefully
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 sqlgate contributors

//! # sqlgate-server
//!
//! ```bash
//! SQLGATE_MASTER_SECRET=... sqlgate-server
//!
//! # Override port and config store
//! sqlgate-server --port 9000 --database-url sqlite:./data/sqlgate.db
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use sqlgate::config::{redact_url, ServerConfig};
use sqlgate::logging::{init_logging, LogFormat};
use sqlgate::resources::ServerResources;
use sqlgate::routes;

#[derive(Parser)]
#[command(
    name = "sqlgate-server",
    about = "Multi-tenant policy-enforced SQL gateway",
    long_about = "Executes ad-hoc SQL and templated APIs against per-tenant PostgreSQL databases"
)]
struct Args {
    /// HTTP port override
    #[arg(long)]
    port: Option<u16>,

    /// Config store URL override
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LogFormat::from_env())?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!(
        port = config.http_port,
        database = %redact_url(&config.database_url),
        admin_routes = config.admin_token.is_some(),
        "starting sqlgate"
    );

    let port = config.http_port;
    let resources = Arc::new(ServerResources::new(config).await?);
    let purge_task = resources.spawn_background_tasks();

    let app = routes::router(&resources);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("HTTP server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    purge_task.abort();
    resources.shutdown().await;
    info!("sqlgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
