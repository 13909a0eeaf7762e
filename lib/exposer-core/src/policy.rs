//! Port-delta policy
//!
//! Maps one [`ServiceEvent`] to the ordered list of forwarder actions that
//! moves the host's exposed ports toward the service's declared state. The
//! policy keeps no state and performs no I/O: each event carries the old
//! and new snapshots it needs.
//!
//! An update between two NodePort snapshots does not diff the port lists.
//! Every old port is unexposed first, then every new port is exposed, so a
//! port kept across both snapshots is briefly unforwarded.

use crate::{PortAction, ServiceEvent, ServiceSnapshot, ServiceType};
use std::fmt;

/// Which branch of the policy an event took
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// A NodePort service was added
    ExposeAdded,
    /// A NodePort service was deleted
    UnexposeDeleted,
    /// A non-NodePort service was added or deleted
    NotNodePort { service_type: ServiceType },
    /// Type changed away from NodePort
    LeftNodePort { from: ServiceType, to: ServiceType },
    /// Type changed to NodePort
    EnteredNodePort { from: ServiceType, to: ServiceType },
    /// Both snapshots are NodePort
    RefreshNodePort,
    /// Neither snapshot is NodePort
    NeitherNodePort { from: ServiceType, to: ServiceType },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::ExposeAdded => write!(f, "service is of type NodePort, exposing NodePorts"),
            Decision::UnexposeDeleted => {
                write!(f, "service was of type NodePort, unexposing NodePorts")
            }
            Decision::NotNodePort { service_type } => write!(
                f,
                "service is of type '{}', not NodePort, nothing to do",
                service_type
            ),
            Decision::LeftNodePort { from, to } => write!(
                f,
                "type changed ('{}' -> '{}'), unexposing NodePorts",
                from, to
            ),
            Decision::EnteredNodePort { from, to } => write!(
                f,
                "type changed ('{}' -> '{}'), exposing NodePorts",
                from, to
            ),
            Decision::RefreshNodePort => write!(
                f,
                "type didn't change ('NodePort' -> 'NodePort'), making sure that correct ports are exposed"
            ),
            Decision::NeitherNodePort { from, to } => write!(
                f,
                "neither old ('{}') nor new ('{}') type is NodePort, nothing to do",
                from, to
            ),
        }
    }
}

/// Outcome of running the policy over one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    /// `namespace/name` of the service the event concerns
    pub service: String,
    pub decision: Decision,
    /// Actions to execute, strictly in this order
    pub actions: Vec<PortAction>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Compute the ordered actions for one event. Total over its input.
pub fn plan(event: &ServiceEvent) -> Plan {
    let service = event.current().key();

    let (decision, actions) = match event {
        ServiceEvent::Added(svc) => {
            if svc.service_type.is_node_port() {
                (Decision::ExposeAdded, exposes(svc).collect())
            } else {
                (not_node_port(svc), Vec::new())
            }
        }
        ServiceEvent::Deleted(svc) => {
            if svc.service_type.is_node_port() {
                (Decision::UnexposeDeleted, unexposes(svc).collect())
            } else {
                (not_node_port(svc), Vec::new())
            }
        }
        ServiceEvent::Updated { old, new } => {
            let from = old.service_type.clone();
            let to = new.service_type.clone();
            match (from.is_node_port(), to.is_node_port()) {
                (true, true) => (
                    Decision::RefreshNodePort,
                    unexposes(old).chain(exposes(new)).collect(),
                ),
                (true, false) => (Decision::LeftNodePort { from, to }, unexposes(old).collect()),
                (false, true) => (Decision::EnteredNodePort { from, to }, exposes(new).collect()),
                (false, false) => (Decision::NeitherNodePort { from, to }, Vec::new()),
            }
        }
    };

    Plan {
        service,
        decision,
        actions,
    }
}

fn not_node_port(svc: &ServiceSnapshot) -> Decision {
    Decision::NotNodePort {
        service_type: svc.service_type.clone(),
    }
}

fn exposes(svc: &ServiceSnapshot) -> impl Iterator<Item = PortAction> + '_ {
    svc.node_ports.iter().copied().map(PortAction::Expose)
}

fn unexposes(svc: &ServiceSnapshot) -> impl Iterator<Item = PortAction> + '_ {
    svc.node_ports.iter().copied().map(PortAction::Unexpose)
}
