//! Command-line configuration

use crate::service_controller::WatchScope;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use exposer_forwarder::config::{DEFAULT_BASE_URL, DEFAULT_VIRTUAL_IP};
use exposer_forwarder::ForwarderConfig;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Exposes NodePort services on the host through the port forwarder
#[derive(Parser, Debug, Clone)]
#[command(name = "exposer-controller", version, about)]
pub struct Args {
    /// Absolute path to the kubeconfig file
    #[arg(long, env = "KUBECONFIG_PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubernetes API server URL, overrides the kubeconfig
    #[arg(long, env = "KUBE_MASTER")]
    pub master: Option<String>,

    /// Only watch Services in this namespace
    #[arg(long, env = "EXPOSER_NAMESPACE")]
    pub namespace: Option<String>,

    /// Label selector for watched Services
    #[arg(long, env = "EXPOSER_SELECTOR")]
    pub selector: Option<String>,

    /// Base URL of the forwarder API
    #[arg(long, env = "EXPOSER_FORWARDER_URL", default_value = DEFAULT_BASE_URL)]
    pub forwarder_url: String,

    /// Host that exposed ports are forwarded to
    #[arg(long, env = "EXPOSER_VIRTUAL_IP", default_value = DEFAULT_VIRTUAL_IP)]
    pub virtual_ip: String,

    /// Timeout for each forwarder request, in seconds
    #[arg(long, env = "EXPOSER_FORWARDER_TIMEOUT_SECS")]
    pub forwarder_timeout_secs: Option<u64>,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "EXPOSER_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    #[arg(long, env = "EXPOSER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            base_url: self.forwarder_url.clone(),
            virtual_ip: self.virtual_ip.clone(),
            timeout: self.forwarder_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn watch_scope(&self) -> WatchScope {
        WatchScope {
            namespace: self.namespace.clone(),
            selector: self.selector.clone(),
        }
    }

    /// Build a cluster client from the kubeconfig flag, or infer one from
    /// the environment (in-cluster or `~/.kube/config`)
    pub async fn kube_client(&self) -> Result<Client> {
        let mut config = match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
            }
            None => Config::infer().await?,
        };

        if let Some(master) = &self.master {
            config.cluster_url = master
                .parse()
                .with_context(|| format!("invalid master url {}", master))?;
        }

        info!("Using Kubernetes API server {}", config.cluster_url);
        Ok(Client::try_from(config)?)
    }
}
