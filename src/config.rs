use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for the cloud TCP session. The defaults match the
/// production gateway; everything is overridable for testing against a
/// different endpoint or with different timings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_host")]
    pub server_host: String,
    #[serde(default = "SessionConfig::default_port")]
    pub server_port: u16,
    #[serde(default = "SessionConfig::default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "SessionConfig::default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "SessionConfig::default_tls_retry_delay_secs")]
    pub tls_retry_delay_secs: u64,
}

impl SessionConfig {
    pub const DEFAULT_HOST: &'static str = "cm-sec.gelighting.com";
    pub const DEFAULT_PORT: u16 = 23779;

    fn default_host() -> String {
        Self::DEFAULT_HOST.to_string()
    }

    const fn default_port() -> u16 {
        Self::DEFAULT_PORT
    }

    const fn default_heartbeat_secs() -> u64 {
        20
    }

    const fn default_reconnect_delay_secs() -> u64 {
        10
    }

    const fn default_tls_retry_delay_secs() -> u64 {
        5
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    #[must_use]
    pub const fn tls_retry_delay(&self) -> Duration {
        Duration::from_secs(self.tls_retry_delay_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_host: Self::default_host(),
            server_port: Self::default_port(),
            heartbeat_secs: Self::default_heartbeat_secs(),
            reconnect_delay_secs: Self::default_reconnect_delay_secs(),
            tls_retry_delay_secs: Self::default_tls_retry_delay_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.server_host, "cm-sec.gelighting.com");
        assert_eq!(config.server_port, 23779);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(20));
    }

    #[test]
    fn overrides_are_respected() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"server_host": "localhost", "server_port": 9000}"#).unwrap();
        assert_eq!(config.server_host, "localhost");
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(10));
    }
}
