//! HAR capturing proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http (context, capture middleware) ──▶ proxy handler ──▶ Upstream
//!                        │
//!                        ▼
//!                  capture::Capturer ──▶ har codec ──▶ sink pipeline
//!                        │                                  │
//!                        ▼                                  ▼
//!                  entry registry                 channel queue ──▶ admin::Archiver
//!                        │                                               │
//!                        └──────────── admin endpoints ◀── CaptureStore ◀┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use har_capture::admin::{Archiver, CaptureStore};
use har_capture::capture::Capturer;
use har_capture::config::{load_config, AppConfig};
use har_capture::http::HttpServer;
use har_capture::lifecycle::{signals, Shutdown};
use har_capture::observability::{logging::init_logging, metrics, CaptureEvents, TracingEvents};
use har_capture::sink::{self, PublishPipeline, SinkRoute};

#[derive(Parser)]
#[command(name = "har-capture")]
#[command(about = "HTTP proxy that records traffic as HAR entries", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "har-capture starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = ?config.upstream.address,
        sink = ?config.sink.kind,
        routing_key = %config.sink.routing_key,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let events: Arc<dyn CaptureEvents> = Arc::new(TracingEvents);
    let (publisher, deliveries) = sink::from_config(&config.sink);
    let pipeline = PublishPipeline::new(publisher, SinkRoute::from(&config.sink), events.clone());
    let capturer = Arc::new(Capturer::new(&config.capture, pipeline, events));

    let store = Arc::new(match &config.admin.persistence_path {
        Some(path) => CaptureStore::load(path)?,
        None => CaptureStore::new(None),
    });

    let shutdown = Arc::new(Shutdown::new());
    let archiver = deliveries.map(|rx| {
        tokio::spawn(Archiver::new(store.clone(), rx).run(shutdown.subscribe()))
    });

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = signals::forward_to(&shutdown).await {
                tracing::error!(error = %e, "Failed to install signal handlers");
            }
        });
    }

    let server = HttpServer::new(config, capturer, store.clone());
    let result = server.run(listener, admin_listener, &shutdown).await;

    // Also stops the archiver when the server exited on its own.
    shutdown.trigger();
    match archiver {
        Some(handle) => {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Archiver task failed");
            }
        }
        None => {
            if let Err(e) = store.save() {
                tracing::error!(error = %e, "Failed to save capture store");
            }
        }
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
