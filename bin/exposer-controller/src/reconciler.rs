//! Applies the port-delta policy to service events

use crate::metrics::ControllerMetrics;
use exposer_core::{plan, ServiceEvent};
use exposer_forwarder::Forwarder;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of executing one event's actions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub failed: usize,
}

pub struct Reconciler<F> {
    forwarder: F,
    metrics: Arc<ControllerMetrics>,
}

impl<F: Forwarder> Reconciler<F> {
    pub fn new(forwarder: F, metrics: Arc<ControllerMetrics>) -> Self {
        Self { forwarder, metrics }
    }

    /// Run one event to completion. Actions are sent in plan order, each
    /// awaited before the next; a failed action is logged and does not stop
    /// the rest of the batch.
    pub async fn handle(&self, event: &ServiceEvent) -> BatchReport {
        self.metrics.record_event(event.kind());

        match event {
            ServiceEvent::Added(svc) => {
                info!("Added service '{}' of type '{}'", svc.key(), svc.service_type)
            }
            ServiceEvent::Updated { new, .. } => info!("Updated service '{}'", new.key()),
            ServiceEvent::Deleted(svc) => {
                info!("Deleted service '{}' of type '{}'", svc.key(), svc.service_type)
            }
        }

        let plan = plan(event);
        info!("Service '{}': {}", plan.service, plan.decision);

        let mut report = BatchReport::default();
        for action in plan.actions {
            report.attempted += 1;
            match self.forwarder.apply(action).await {
                Ok(()) => self.metrics.record_action(action, true),
                Err(e) => {
                    report.failed += 1;
                    self.metrics.record_action(action, false);
                    error!("Failed to {} for service '{}': {}", action, plan.service, e);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use exposer_core::{NodePort, PortAction, ServiceSnapshot, ServiceType};
    use exposer_forwarder::testing::RecordingForwarder;
    use exposer_forwarder::{ForwarderConfig, ForwarderError, HttpForwarder};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records calls in order and fails the configured actions
    #[derive(Default)]
    struct MockForwarder {
        calls: Mutex<Vec<PortAction>>,
        failing: HashSet<PortAction>,
    }

    impl MockForwarder {
        fn failing(actions: &[PortAction]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing: actions.iter().copied().collect(),
            }
        }

        fn calls(&self) -> Vec<PortAction> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, action: PortAction) -> exposer_forwarder::Result<()> {
            self.calls.lock().unwrap().push(action);
            if self.failing.contains(&action) {
                return Err(ForwarderError::Status {
                    endpoint: "mock".to_string(),
                    status: 503,
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Forwarder for &MockForwarder {
        async fn expose(&self, port: NodePort) -> exposer_forwarder::Result<()> {
            self.record(PortAction::Expose(port))
        }

        async fn unexpose(&self, port: NodePort) -> exposer_forwarder::Result<()> {
            self.record(PortAction::Unexpose(port))
        }
    }

    fn port(p: u16) -> NodePort {
        NodePort::new(p).unwrap()
    }

    fn web(service_type: &str, ports: &[u16]) -> ServiceSnapshot {
        ServiceSnapshot::new(
            Some("default".to_string()),
            "web",
            ServiceType::from(service_type),
            ports.iter().map(|p| port(*p)).collect(),
        )
    }

    fn metrics() -> Arc<ControllerMetrics> {
        Arc::new(ControllerMetrics::new().unwrap())
    }

    #[tokio::test]
    async fn test_failed_action_does_not_stop_batch() {
        let mock = MockForwarder::failing(&[PortAction::Expose(port(30080))]);
        let metrics = metrics();
        let reconciler = Reconciler::new(&mock, metrics.clone());

        let report = reconciler
            .handle(&ServiceEvent::Added(web("NodePort", &[30080, 30443])))
            .await;

        assert_eq!(report, BatchReport { attempted: 2, failed: 1 });
        assert_eq!(
            mock.calls(),
            vec![PortAction::Expose(port(30080)), PortAction::Expose(port(30443))]
        );
        assert_eq!(
            metrics
                .forwarder_actions_total
                .with_label_values(&["expose", "error"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .forwarder_actions_total
                .with_label_values(&["expose", "ok"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_unexpose_does_not_block_expose() {
        let mock = MockForwarder::failing(&[PortAction::Unexpose(port(30080))]);
        let reconciler = Reconciler::new(&mock, metrics());

        let report = reconciler
            .handle(&ServiceEvent::Updated {
                old: web("NodePort", &[30080]),
                new: web("NodePort", &[30081]),
            })
            .await;

        assert_eq!(report, BatchReport { attempted: 2, failed: 1 });
        assert_eq!(
            mock.calls(),
            vec![PortAction::Unexpose(port(30080)), PortAction::Expose(port(30081))]
        );
    }

    #[tokio::test]
    async fn test_non_node_port_event_makes_no_calls() {
        let mock = MockForwarder::default();
        let metrics = metrics();
        let reconciler = Reconciler::new(&mock, metrics.clone());

        let report = reconciler
            .handle(&ServiceEvent::Deleted(web("ClusterIP", &[])))
            .await;

        assert_eq!(report, BatchReport::default());
        assert!(mock.calls().is_empty());
        assert_eq!(metrics.events_total.with_label_values(&["delete"]).get(), 1);
    }

    async fn http_reconciler(server: &RecordingForwarder) -> Reconciler<HttpForwarder> {
        let forwarder = HttpForwarder::new(ForwarderConfig {
            base_url: server.base_url(),
            virtual_ip: "192.168.127.2".to_string(),
            timeout: None,
        })
        .unwrap();
        Reconciler::new(forwarder, metrics())
    }

    #[tokio::test]
    async fn test_add_node_port_service_posts_expose_per_port() {
        let server = RecordingForwarder::start().await.unwrap();
        let reconciler = http_reconciler(&server).await;

        reconciler
            .handle(&ServiceEvent::Added(web("NodePort", &[30080, 30443])))
            .await;

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| r.path == "/services/forwarder/expose"));
        assert_eq!(
            requests[0].body,
            json!({"Local": ":30080", "Remote": "192.168.127.2:30080"})
        );
        assert_eq!(
            requests[1].body,
            json!({"Local": ":30443", "Remote": "192.168.127.2:30443"})
        );
    }

    #[tokio::test]
    async fn test_update_port_change_unexposes_then_exposes() {
        let server = RecordingForwarder::start().await.unwrap();
        let reconciler = http_reconciler(&server).await;

        reconciler
            .handle(&ServiceEvent::Added(web("NodePort", &[30080])))
            .await;
        reconciler
            .handle(&ServiceEvent::Updated {
                old: web("NodePort", &[30080]),
                new: web("NodePort", &[30081]),
            })
            .await;

        let requests = server.requests();
        assert_eq!(requests[1].path, "/services/forwarder/unexpose");
        assert_eq!(requests[1].body, json!({"Local": ":30080"}));
        assert_eq!(requests[2].path, "/services/forwarder/expose");
        assert_eq!(
            requests[2].body,
            json!({"Local": ":30081", "Remote": "192.168.127.2:30081"})
        );
        assert_eq!(
            server.exposed().into_iter().collect::<Vec<_>>(),
            vec![":30081".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_to_node_port_only_exposes() {
        let server = RecordingForwarder::start().await.unwrap();
        let reconciler = http_reconciler(&server).await;

        reconciler
            .handle(&ServiceEvent::Updated {
                old: web("ClusterIP", &[]),
                new: web("NodePort", &[30090]),
            })
            .await;

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/services/forwarder/expose");
        assert_eq!(requests[0].body["Local"], ":30090");
    }

    #[tokio::test]
    async fn test_delete_cluster_ip_service_makes_no_calls() {
        let server = RecordingForwarder::start().await.unwrap();
        let reconciler = http_reconciler(&server).await;

        let report = reconciler
            .handle(&ServiceEvent::Deleted(web("ClusterIP", &[])))
            .await;

        assert_eq!(report.attempted, 0);
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_forwarder_error_status_continues_batch() {
        let server = RecordingForwarder::start().await.unwrap();
        server.fail_next(502);
        let reconciler = http_reconciler(&server).await;

        let report = reconciler
            .handle(&ServiceEvent::Added(web("NodePort", &[30080, 30443])))
            .await;

        assert_eq!(report, BatchReport { attempted: 2, failed: 1 });
        assert_eq!(server.requests().len(), 2);
        assert!(!server.is_exposed(":30080"));
        assert!(server.is_exposed(":30443"));
    }
}
