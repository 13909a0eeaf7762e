//! In-process forwarder endpoint for tests
//!
//! Serves the expose/unexpose API on a loopback port, records every
//! request, and keeps the set of exposed local addresses the way the real
//! forwarder would (repeated expose/unexpose are no-ops).

use crate::config::{EXPOSE_PATH, UNEXPOSE_PATH};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::{BTreeSet, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

/// One request as received by the endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    /// Parsed JSON body, `Null` if the body was not JSON
    pub body: serde_json::Value,
}

#[derive(Default)]
struct State {
    requests: Vec<RecordedRequest>,
    exposed: BTreeSet<String>,
    failures: VecDeque<StatusCode>,
}

/// Recording forwarder listening on 127.0.0.1
pub struct RecordingForwarder {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    task: JoinHandle<()>,
}

impl RecordingForwarder {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(State::default()));

        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!("Recording forwarder accept error: {}", e);
                        continue;
                    }
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(state.clone(), req));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("Recording forwarder connection error: {}", e);
                    }
                });
            }
        });

        Ok(Self { addr, state, task })
    }

    /// Base URL to hand to `ForwarderConfig`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer the next request with `status` instead of 200
    pub fn fail_next(&self, status: u16) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        lock(&self.state).failures.push_back(status);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Local addresses currently exposed, e.g. `":30080"`
    pub fn exposed(&self) -> BTreeSet<String> {
        lock(&self.state).exposed.clone()
    }

    pub fn is_exposed(&self, local: &str) -> bool {
        lock(&self.state).exposed.contains(local)
    }
}

impl Drop for RecordingForwarder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// URL of a loopback port with nothing listening on it
pub async fn unreachable_url() -> std::io::Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn handle(
    state: Arc<Mutex<State>>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

    let mut state = lock(&state);
    let known = method == Method::POST && (path == EXPOSE_PATH || path == UNEXPOSE_PATH);
    let status = if !known {
        StatusCode::NOT_FOUND
    } else {
        state.failures.pop_front().unwrap_or(StatusCode::OK)
    };

    if status.is_success() {
        if let Some(local) = body.get("Local").and_then(|v| v.as_str()) {
            if path == EXPOSE_PATH {
                state.exposed.insert(local.to_string());
            } else {
                state.exposed.remove(local);
            }
        }
    }

    state.requests.push(RecordedRequest {
        method: method.to_string(),
        path,
        content_type,
        body,
    });

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    Ok(response)
}
