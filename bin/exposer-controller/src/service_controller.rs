//! Service controller: watches Services and keeps the forwarder in sync

use crate::feed::ServiceFeed;
use crate::reconciler::Reconciler;
use exposer_forwarder::Forwarder;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use kube_runtime::{watcher, WatchStreamExt};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Which Services the controller watches
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchScope {
    /// Restrict to one namespace; all namespaces when `None`
    pub namespace: Option<String>,
    /// Label selector, e.g. `app=web`
    pub selector: Option<String>,
}

pub struct ServiceController<F> {
    reconciler: Reconciler<F>,
    scope: WatchScope,
}

impl<F: Forwarder> ServiceController<F> {
    pub fn new(reconciler: Reconciler<F>, scope: WatchScope) -> Self {
        Self { reconciler, scope }
    }

    /// Watch Services until `shutdown` flips or the watch ends.
    pub async fn run(
        &self,
        client: Client,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        info!("Starting Service reconciliation");

        let services: Api<Service> = match &self.scope.namespace {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::all(client),
        };

        let mut config = watcher::Config::default();
        if let Some(selector) = &self.scope.selector {
            config = config.labels(selector);
        }

        let stream = watcher(services, config).default_backoff().boxed();
        self.drive(stream, shutdown).await
    }

    /// Process watch events one at a time. Shutdown is only observed between
    /// events, so an event whose actions are in flight always completes.
    /// A watch error before the first full list has been received is fatal;
    /// later errors are logged and the watch resumes.
    pub async fn drive<S>(
        &self,
        mut stream: S,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()>
    where
        S: Stream<Item = Result<watcher::Event<Service>, watcher::Error>> + Unpin,
    {
        let mut feed = ServiceFeed::new();
        let mut synced = false;

        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping Service watch");
                    break;
                }
                item = stream.next() => item,
            };

            let Some(item) = item else {
                warn!("Service watch stream ended");
                break;
            };

            match item {
                Ok(event) => {
                    let initial_sync = !synced && matches!(event, watcher::Event::InitDone);
                    for service_event in feed.observe(event) {
                        let report = self.reconciler.handle(&service_event).await;
                        debug!(
                            "Handled {} event: {} actions, {} failed",
                            service_event.kind(),
                            report.attempted,
                            report.failed
                        );
                    }
                    if initial_sync {
                        synced = true;
                        info!("Initial Service list synced ({} services)", feed.len());
                    }
                }
                Err(e) if !synced => {
                    return Err(
                        anyhow::Error::new(e).context("failed to start watching Services")
                    );
                }
                Err(e) => error!("Service watch error: {}", e),
            }
        }

        Ok(())
    }
}
