//! Forwarder endpoint configuration

use std::time::Duration;

/// Base URL of the forwarder API as seen from inside the VM
pub const DEFAULT_BASE_URL: &str = "http://host";

/// Address of the VM on the forwarder's virtual network
pub const DEFAULT_VIRTUAL_IP: &str = "192.168.127.2";

pub const EXPOSE_PATH: &str = "/services/forwarder/expose";
pub const UNEXPOSE_PATH: &str = "/services/forwarder/unexpose";

/// Where the forwarder lives and where it forwards to.
/// Fixed for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// Scheme and authority of the forwarder API, e.g. `http://host`
    pub base_url: String,
    /// Host that exposed ports are forwarded to
    pub virtual_ip: String,
    /// Per-request timeout; `None` leaves the transport default
    pub timeout: Option<Duration>,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            virtual_ip: DEFAULT_VIRTUAL_IP.to_string(),
            timeout: None,
        }
    }
}

impl ForwarderConfig {
    pub fn expose_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), EXPOSE_PATH)
    }

    pub fn unexpose_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), UNEXPOSE_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ForwarderConfig::default();
        assert_eq!(config.base_url, "http://host");
        assert_eq!(config.virtual_ip, "192.168.127.2");
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ForwarderConfig::default();
        assert_eq!(config.expose_url(), "http://host/services/forwarder/expose");
        assert_eq!(config.unexpose_url(), "http://host/services/forwarder/unexpose");
    }

    #[test]
    fn test_endpoint_urls_tolerate_trailing_slash() {
        let config = ForwarderConfig {
            base_url: "http://127.0.0.1:7777/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.expose_url(),
            "http://127.0.0.1:7777/services/forwarder/expose"
        );
    }
}
