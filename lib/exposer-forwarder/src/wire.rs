//! JSON bodies accepted by the forwarder API

use exposer_core::NodePort;
use serde::{Deserialize, Serialize};

/// Listen address on the host for a node port
pub fn local_address(port: NodePort) -> String {
    format!(":{}", port)
}

/// Start forwarding a host port to the same port on the virtual host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExposeRequest {
    pub local: String,
    pub remote: String,
}

impl ExposeRequest {
    pub fn new(port: NodePort, virtual_ip: &str) -> Self {
        Self {
            local: local_address(port),
            remote: format!("{}:{}", virtual_ip, port),
        }
    }
}

/// Stop forwarding a host port
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnexposeRequest {
    pub local: String,
}

impl UnexposeRequest {
    pub fn new(port: NodePort) -> Self {
        Self {
            local: local_address(port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expose_request_body() {
        let req = ExposeRequest::new(NodePort::new(30080).unwrap(), "192.168.127.2");
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"Local":":30080","Remote":"192.168.127.2:30080"}"#
        );
    }

    #[test]
    fn test_unexpose_request_body() {
        let req = UnexposeRequest::new(NodePort::new(30443).unwrap());
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"Local":":30443"}"#);
    }
}
