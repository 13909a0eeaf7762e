//! Forwarder client: turns expose/unexpose actions into HTTP POSTs
//!
//! Requests are sent once. A transport error or non-2xx status is returned
//! to the caller, which decides whether to log and move on; nothing here
//! retries or backs off.
//!
//! The forwarder is expected to treat a repeated expose or unexpose of the
//! same port as a successful no-op.

use crate::config::ForwarderConfig;
use crate::wire::{ExposeRequest, UnexposeRequest};
use crate::{ForwarderError, Result};
use async_trait::async_trait;
use exposer_core::{NodePort, PortAction};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{debug, info};

/// Something that can expose and unexpose host ports
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Start forwarding `port` on the host
    async fn expose(&self, port: NodePort) -> Result<()>;

    /// Stop forwarding `port` on the host
    async fn unexpose(&self, port: NodePort) -> Result<()>;

    /// Dispatch one planned action
    async fn apply(&self, action: PortAction) -> Result<()> {
        match action {
            PortAction::Expose(port) => self.expose(port).await,
            PortAction::Unexpose(port) => self.unexpose(port).await,
        }
    }
}

/// Forwarder reached over its JSON/HTTP API
pub struct HttpForwarder {
    client: reqwest::Client,
    expose_url: String,
    unexpose_url: String,
    virtual_ip: String,
}

impl HttpForwarder {
    /// Create a new forwarder client. The underlying connection pool is
    /// reused across requests.
    pub fn new(config: ForwarderConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ForwarderError::Build)?;

        debug!(
            "Forwarder client targeting {} (virtual host {})",
            config.base_url, config.virtual_ip
        );

        Ok(Self {
            expose_url: config.expose_url(),
            unexpose_url: config.unexpose_url(),
            virtual_ip: config.virtual_ip,
            client,
        })
    }

    pub fn virtual_ip(&self) -> &str {
        &self.virtual_ip
    }

    async fn post<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<()> {
        let body = serde_json::to_vec(payload)?;

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| ForwarderError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        debug!("Forwarder responded with status {} for {}", status, endpoint);
        if !status.is_success() {
            return Err(ForwarderError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn expose(&self, port: NodePort) -> Result<()> {
        let request = ExposeRequest::new(port, &self.virtual_ip);
        info!("Exposing port ({} -> {})", request.local, request.remote);
        self.post(&self.expose_url, &request).await
    }

    async fn unexpose(&self, port: NodePort) -> Result<()> {
        let request = UnexposeRequest::new(port);
        info!("Unexposing port '{}'", request.local);
        self.post(&self.unexpose_url, &request).await
    }
}
