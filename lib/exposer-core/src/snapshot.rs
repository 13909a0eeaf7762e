//! Service snapshots as delivered by the cluster watch

use crate::{CoreError, Result};
use k8s_openapi::api::core::v1::Service;
use std::fmt;
use tracing::warn;

/// Type name the API server assigns when a service omits `spec.type`.
const DEFAULT_SERVICE_TYPE: &str = "ClusterIP";

const NODE_PORT_TYPE: &str = "NodePort";

/// A host port allocated to a service on every cluster node
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePort(u16);

impl NodePort {
    /// Create a node port. Zero is not a valid host port.
    pub fn new(port: u16) -> Result<Self> {
        if port == 0 {
            return Err(CoreError::InvalidNodePort(0));
        }
        Ok(Self(port))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i32> for NodePort {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self> {
        let port = u16::try_from(value).map_err(|_| CoreError::InvalidNodePort(value))?;
        Self::new(port).map_err(|_| CoreError::InvalidNodePort(value))
    }
}

impl fmt::Display for NodePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Service type as far as exposing is concerned
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceType {
    NodePort,
    /// Any other type, keeping the raw name for logging
    Other(String),
}

impl ServiceType {
    pub fn is_node_port(&self) -> bool {
        matches!(self, ServiceType::NodePort)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ServiceType::NodePort => NODE_PORT_TYPE,
            ServiceType::Other(name) => name,
        }
    }
}

impl From<&str> for ServiceType {
    fn from(name: &str) -> Self {
        if name == NODE_PORT_TYPE {
            ServiceType::NodePort
        } else {
            ServiceType::Other(name.to_string())
        }
    }
}

impl From<Option<&str>> for ServiceType {
    fn from(name: Option<&str>) -> Self {
        ServiceType::from(name.unwrap_or(DEFAULT_SERVICE_TYPE))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of one service at the moment an event fired
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSnapshot {
    pub namespace: Option<String>,
    pub name: String,
    pub service_type: ServiceType,
    /// Node ports in declaration order
    pub node_ports: Vec<NodePort>,
}

impl ServiceSnapshot {
    pub fn new(
        namespace: Option<String>,
        name: impl Into<String>,
        service_type: ServiceType,
        node_ports: Vec<NodePort>,
    ) -> Self {
        Self {
            namespace,
            name: name.into(),
            service_type,
            node_ports,
        }
    }

    /// Cache key in `namespace/name` form
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}/{}", namespace, self.name),
            None => self.name.clone(),
        }
    }
}

impl From<&Service> for ServiceSnapshot {
    fn from(service: &Service) -> Self {
        let name = match &service.metadata.name {
            Some(name) => name.clone(),
            None => {
                warn!(
                    "Service in namespace '{}' has no metadata.name",
                    service.metadata.namespace.as_deref().unwrap_or("")
                );
                String::new()
            }
        };
        let spec = service.spec.as_ref();

        let service_type = ServiceType::from(spec.and_then(|s| s.type_.as_deref()));

        let node_ports = spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .filter_map(|port| {
                        let raw = port.node_port?;
                        match NodePort::try_from(raw) {
                            Ok(node_port) => Some(node_port),
                            Err(e) => {
                                warn!("Skipping port of service '{}': {}", name, e);
                                None
                            }
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            namespace: service.metadata.namespace.clone(),
            name,
            service_type,
            node_ports,
        }
    }
}
