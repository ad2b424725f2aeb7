//! Client configuration loaded from YAML
//!
//! Every field has a default matching the instrument's factory network setup,
//! so an empty document is a valid configuration.
//!
//! ```rust
//! use xipp_trial::ClientConfig;
//!
//! let config = ClientConfig::from_yaml_str("refresh_interval_ms: 500\nfile_path_base: /data/run")?;
//! assert_eq!(config.refresh_interval().as_millis(), 500);
//! assert_eq!(config.send_attempts, 3);
//! # Ok::<(), xipp_trial::XippError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use crate::command::DEFAULT_SEND_ATTEMPTS;
use crate::types::xipp_ids::{net, processor};
use crate::types::{FrameHeader, SchemaVersion};
use crate::{Result, XippError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Local address bound to receive data and configuration acknowledgements.
    pub listen_addr: SocketAddr,
    /// Where configuration requests are sent.
    pub request_addr: SocketAddr,
    pub expected_schema: SchemaVersion,
    pub refresh_interval_ms: u64,
    pub receive_timeout_ms: u64,
    pub send_attempts: u32,
    pub max_datagram_bytes: usize,
    /// Lowest source processor ID treated as an Operator.
    pub operator_processor_min: u8,
    /// Remote file path base written with every start request.
    pub file_path_base: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, net::DACAR_PORT)),
            request_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::new(192, 168, 42, 255),
                net::CRR_PORT,
            )),
            expected_schema: SchemaVersion::default(),
            refresh_interval_ms: 1000,
            receive_timeout_ms: 250,
            send_attempts: DEFAULT_SEND_ATTEMPTS,
            max_datagram_bytes: net::UDP_BUFFER_BYTES,
            operator_processor_min: processor::OPERATOR_MIN,
            file_path_base: None,
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)
                .map_err(|e| XippError::config(format!("invalid YAML: {}", e)))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            XippError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.send_attempts == 0 {
            return Err(XippError::config("send_attempts must be at least 1"));
        }
        if self.refresh_interval_ms == 0 {
            return Err(XippError::config("refresh_interval_ms must be nonzero"));
        }
        if self.receive_timeout_ms == 0 {
            return Err(XippError::config("receive_timeout_ms must be nonzero"));
        }
        if self.max_datagram_bytes < FrameHeader::LEN {
            return Err(XippError::config(format!(
                "max_datagram_bytes must hold at least one {}-byte frame header",
                FrameHeader::LEN
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ClientConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.listen_addr.port(), 2046);
        assert_eq!(config.request_addr.to_string(), "192.168.42.255:2047");
        assert_eq!(config.expected_schema, SchemaVersion { major: 3, minor: 0 });
        assert_eq!(config.operator_processor_min, 128);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let yaml = "\
request_addr: 10.0.0.7:2047
expected_schema:
  major: 4
  minor: 1
receive_timeout_ms: 50
file_path_base: /data/rat12
";
        let config = ClientConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.request_addr.to_string(), "10.0.0.7:2047");
        assert_eq!(config.expected_schema.to_string(), "4.1");
        assert_eq!(config.receive_timeout(), Duration::from_millis(50));
        assert_eq!(config.file_path_base.as_deref(), Some("/data/rat12"));
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn rejects_invalid_values() {
        for yaml in ["send_attempts: 0", "refresh_interval_ms: 0", "max_datagram_bytes: 4"] {
            let err = ClientConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, XippError::Config { .. }), "{yaml}: {err:?}");
        }
        assert!(ClientConfig::from_yaml_str("listen_addr: [1, 2").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ClientConfig::load("/nonexistent/xipp.yaml").unwrap_err();
        assert!(matches!(err, XippError::Config { .. }));
    }
}
