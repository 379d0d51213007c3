//! Configuration for the UDP transport

use crate::error::ConfigError;
use crate::{DEFAULT_PORT, DEFAULT_RECV_BUFFER_BYTES};
use serde::{Deserialize, Serialize};

/// Where and how to listen for OSC datagrams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Size of the datagram receive buffer in bytes
    pub recv_buffer_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            recv_buffer_bytes: DEFAULT_RECV_BUFFER_BYTES,
        }
    }
}

impl TransportConfig {
    /// Get the listen address as `host:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }
        if self.recv_buffer_bytes < 16 {
            return Err(ConfigError::BufferTooSmall(self.recv_buffer_bytes));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_transport_config_validation() {
        let config = TransportConfig { port: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidPort(0)));

        let config = TransportConfig { host: " ".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHost(_))));

        let config = TransportConfig { recv_buffer_bytes: 8, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::BufferTooSmall(8)));
    }
}
