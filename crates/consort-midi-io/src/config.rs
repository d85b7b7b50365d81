//! Device manager configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceManagerConfig {
    /// Client name announced to the platform MIDI service.
    pub client_name: String,
    /// How often the topology watcher re-enumerates outputs.
    pub poll_interval_ms: u64,
    /// Device name fragment to connect to right after initialization.
    pub auto_connect: Option<String>,
}

impl DeviceManagerConfig {
    pub const DEFAULT_CLIENT_NAME: &'static str = "consort";
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "client_name must not be empty".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DeviceManagerConfig {
    fn default() -> Self {
        Self {
            client_name: Self::DEFAULT_CLIENT_NAME.to_string(),
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
            auto_connect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DeviceManagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.auto_connect.is_none());
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let config = DeviceManagerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_blank_client_name() {
        let config = DeviceManagerConfig {
            client_name: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_bincode_round_trip() {
        let config = DeviceManagerConfig {
            client_name: "stage-rig".to_string(),
            poll_interval_ms: 250,
            auto_connect: Some("IAC".to_string()),
        };
        let encoded = bincode::serialize(&config).unwrap();
        let decoded: DeviceManagerConfig = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded, config);
    }
}
