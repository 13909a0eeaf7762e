use anyhow::Result;
use clap::Parser;
use exposer_forwarder::HttpForwarder;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod feed;
mod metrics;
mod reconciler;
mod service_controller;

use config::{Args, LogFormat};
use metrics::ControllerMetrics;
use reconciler::Reconciler;
use service_controller::ServiceController;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting exposer-controller...");

    let metrics = Arc::new(ControllerMetrics::new()?);

    if let Some(addr) = args.metrics_addr {
        let listener = match metrics::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Metrics server error: {:#}", e);
                return Err(e);
            }
        };
        tokio::spawn(metrics::serve(listener, metrics.clone()));
    }

    let client = args.kube_client().await?;

    let forwarder = HttpForwarder::new(args.forwarder_config())?;
    info!(
        "Forwarding NodePorts via {} to {}",
        args.forwarder_url, args.virtual_ip
    );

    let controller = ServiceController::new(
        Reconciler::new(forwarder, metrics),
        args.watch_scope(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handle = tokio::spawn(async move { controller.run(client, shutdown_rx).await });

    tokio::select! {
        joined = &mut handle => {
            let result = joined?;
            if let Err(e) = &result {
                error!("Service controller error: {:#}", e);
            }
            return result;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received, finishing in-flight event...");
        }
    }

    // The receiver may already be gone if the controller just exited
    let _ = shutdown_tx.send(true);
    handle.await??;

    info!("exposer-controller stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
