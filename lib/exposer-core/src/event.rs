//! Watch events and the actions they resolve to

use crate::{NodePort, ServiceSnapshot};
use std::fmt;

/// One state transition of a watched service
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceEvent {
    Added(ServiceSnapshot),
    Updated {
        old: ServiceSnapshot,
        new: ServiceSnapshot,
    },
    Deleted(ServiceSnapshot),
}

impl ServiceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServiceEvent::Added(_) => EventKind::Add,
            ServiceEvent::Updated { .. } => EventKind::Update,
            ServiceEvent::Deleted(_) => EventKind::Delete,
        }
    }

    /// The most recent snapshot carried by the event
    pub fn current(&self) -> &ServiceSnapshot {
        match self {
            ServiceEvent::Added(svc) | ServiceEvent::Deleted(svc) => svc,
            ServiceEvent::Updated { new, .. } => new,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command directed at the forwarder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortAction {
    Expose(NodePort),
    Unexpose(NodePort),
}

impl PortAction {
    pub fn port(self) -> NodePort {
        match self {
            PortAction::Expose(port) | PortAction::Unexpose(port) => port,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PortAction::Expose(_) => "expose",
            PortAction::Unexpose(_) => "unexpose",
        }
    }
}

impl fmt::Display for PortAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.port())
    }
}
