//! Prometheus exporter for bridged client metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use metricsprom::source::Registry as SourceRegistry;
use metricsprom::target::Registry as TargetRegistry;
use metricsprom::{SharedRegistry, export_metrics};
use tokio::sync::watch;
use tracing::{error, info};

use metricsprom_exporter::{DemoLoad, ExporterConfig, HttpServer, init_tracing};

/// Prometheus exporter for bridged client metrics.
#[derive(Parser, Debug)]
#[command(name = "metricsprom-exporter")]
#[command(about = "Export broker and topic client metrics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Apply CLI overrides
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!("Starting metricsprom exporter");

    let listen_addr: SocketAddr = config
        .http
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source = Arc::new(SourceRegistry::new());
    let registry: SharedRegistry = Arc::new(TargetRegistry::new());
    let ready = Arc::new(AtomicBool::new(false));

    // Start demo load
    let demo_task = if config.demo.enabled {
        let demo = DemoLoad::new(&config.demo, &source)?;
        demo.tick();
        Some(tokio::spawn(demo.run(shutdown_rx.clone())))
    } else {
        None
    };

    // Start HTTP server; /ready answers 503 until the first pass completes
    let http_server = HttpServer::new(
        registry.clone(),
        ready.clone(),
        listen_addr,
        config.http.path.clone(),
    );
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Start export loop; the first pass has completed once this returns
    let export = export_metrics(source.clone(), config.export.to_options(registry.clone()));
    ready.store(true, Ordering::Relaxed);
    info!(families = registry.len(), "Initial metrics sync complete");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        export.stop().await;
        let _ = http_task.await;
        if let Some(task) = demo_task {
            let _ = task.await;
        }
    })
    .await;

    info!(
        source_metrics = source.len(),
        families = registry.len(),
        "Exporter stopped"
    );
    Ok(())
}
