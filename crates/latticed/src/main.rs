//! latticed — the Lattice metrics daemon.
//!
//! Assembles the metrics subsystem end to end:
//! - HTTP ingress with request-context tracking
//! - Simulated deployment replicas, one registry each
//! - Per-process reporters pushing snapshots to the exporter bridge
//! - Prometheus exposition endpoint
//!
//! # Usage
//!
//! ```text
//! latticed serve --ingress-bind 127.0.0.1:8000 --exporter-bind 127.0.0.1:9464
//! ```

mod app;
mod config;
mod replica;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use config::LatticeConfig;

#[derive(Parser)]
#[command(name = "latticed", about = "Lattice metrics daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the demo serving platform with metrics export.
    Serve {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address for the Prometheus exposition endpoint.
        #[arg(long)]
        exporter_bind: Option<SocketAddr>,

        /// Address for the HTTP ingress.
        #[arg(long)]
        ingress_bind: Option<SocketAddr>,

        /// Snapshot report interval in milliseconds.
        #[arg(long)]
        report_interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,latticed=debug,lattice=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
            exporter_bind,
            ingress_bind,
            report_interval_ms,
        } => {
            let mut config = match config {
                Some(path) => LatticeConfig::load(&path)?,
                None => LatticeConfig::default(),
            };
            if let Some(bind) = exporter_bind {
                config.exporter.bind = bind;
            }
            if let Some(bind) = ingress_bind {
                config.ingress.bind = bind;
            }
            if let Some(interval) = report_interval_ms {
                config.exporter.report_interval_ms = interval;
            }
            serve(config).await
        }
    }
}

async fn serve(config: LatticeConfig) -> anyhow::Result<()> {
    let demo = app::build(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    for reporter in demo.reporters {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { reporter.run(shutdown).await });
    }

    let exporter_task = tokio::spawn(lattice_exporter::serve(
        config.exporter.bind,
        demo.bridge.clone(),
        shutdown_rx.clone(),
    ));

    let ingress_listener = tokio::net::TcpListener::bind(config.ingress.bind).await?;
    info!(addr = %config.ingress.bind, "ingress listening");
    let mut ingress_shutdown = shutdown_rx.clone();
    let ingress_task = tokio::spawn(async move {
        axum::serve(ingress_listener, demo.app)
            .with_graceful_shutdown(async move {
                let _ = ingress_shutdown.changed().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    exporter_task.await??;
    ingress_task.await??;
    Ok(())
}
