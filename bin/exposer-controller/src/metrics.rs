//! Prometheus metrics for the controller

use anyhow::{Context, Result};
use exposer_core::{EventKind, PortAction};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub struct ControllerMetrics {
    /// Service events handled, by kind
    pub events_total: IntCounterVec,
    /// Forwarder calls, by action and result
    pub forwarder_actions_total: IntCounterVec,
    registry: Registry,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("exposer_events_total", "Service events handled"),
            &["kind"],
        )?;

        let forwarder_actions_total = IntCounterVec::new(
            Opts::new(
                "exposer_forwarder_actions_total",
                "Expose/unexpose calls sent to the forwarder",
            ),
            &["action", "result"],
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(forwarder_actions_total.clone()))?;

        Ok(Self {
            events_total,
            forwarder_actions_total,
            registry,
        })
    }

    pub fn record_event(&self, kind: EventKind) {
        self.events_total.with_label_values(&[kind.as_str()]).inc();
    }

    pub fn record_action(&self, action: PortAction, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.forwarder_actions_total
            .with_label_values(&[action.name(), result])
            .inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Bind the metrics listener. Done before the server task is spawned so a
/// bad address stops startup.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics server on {}", addr))?;
    info!("Metrics server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve `GET /metrics` on `listener` until the task is dropped
pub async fn serve(listener: TcpListener, metrics: Arc<ControllerMetrics>) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Error accepting metrics connection: {}", e);
                continue;
            }
        };
        let metrics = metrics.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, metrics.clone()));
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Error serving metrics connection from {}: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<ControllerMetrics>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET || req.uri().path() != "/metrics" {
        return Ok(text_response(StatusCode::NOT_FOUND, "Not Found\n".to_string()));
    }

    Ok(match metrics.gather() {
        Ok(text) => text_response(StatusCode::OK, text),
        Err(e) => {
            warn!("Failed to gather metrics: {}", e);
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to gather metrics\n".to_string(),
            )
        }
    })
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
