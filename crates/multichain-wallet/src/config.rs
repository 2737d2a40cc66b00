/*
[INPUT]:  YAML configuration file or string
[OUTPUT]: Parsed and validated wallet configuration
[POS]:    Configuration layer - timeouts, proof policy, wallet context
[UPDATE]: When adding new configuration options
*/

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::authority::RemoteAuthorityConfig;
use crate::error::{Result, WalletError};
use crate::types::{Network, WalletContext};

/// Top-level configuration of a wallet client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WalletConfig {
    /// Application name sent with connect requests and proof claims
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_estimate_timeout_secs")]
    pub estimate_timeout_secs: u64,
    /// Tolerance applied to proof `iat`/`exp` checks
    #[serde(default)]
    pub proof_clock_skew_secs: u64,
    #[serde(default = "default_proof_ttl_secs")]
    pub default_proof_ttl_secs: i64,
    /// Queue length of each event subscription
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default)]
    pub wallet_context: WalletContext,
    /// Static network table; fetched from the authority when empty
    #[serde(default)]
    pub networks: Vec<Network>,
    /// Wallet bridge settings for the remote authority
    #[serde(default)]
    pub remote: Option<RemoteAuthorityConfig>,
}

fn default_app_name() -> String {
    "multichain-wallet".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_confirmation_timeout_secs() -> u64 {
    120
}

fn default_estimate_timeout_secs() -> u64 {
    15
}

fn default_proof_ttl_secs() -> i64 {
    3600
}

fn default_event_buffer() -> usize {
    64
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            connect_timeout_secs: default_connect_timeout_secs(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            estimate_timeout_secs: default_estimate_timeout_secs(),
            proof_clock_skew_secs: 0,
            default_proof_ttl_secs: default_proof_ttl_secs(),
            event_buffer: default_event_buffer(),
            wallet_context: WalletContext::default(),
            networks: Vec::new(),
            remote: None,
        }
    }
}

impl WalletConfig {
    /// Parse and validate YAML
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(WalletError::Config("app_name must not be empty".to_string()));
        }
        for (name, secs) in [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("confirmation_timeout_secs", self.confirmation_timeout_secs),
            ("estimate_timeout_secs", self.estimate_timeout_secs),
        ] {
            if secs == 0 {
                return Err(WalletError::Config(format!("{name} must be positive")));
            }
        }
        if self.default_proof_ttl_secs <= 0 {
            return Err(WalletError::Config(
                "default_proof_ttl_secs must be positive".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(WalletError::Config("event_buffer must be positive".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn estimate_timeout(&self) -> Duration {
        Duration::from_secs(self.estimate_timeout_secs)
    }

    pub fn proof_clock_skew(&self) -> Duration {
        Duration::from_secs(self.proof_clock_skew_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = WalletConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, WalletConfig::default());
        assert_eq!(config.proof_clock_skew_secs, 0);
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
app_name: wee
connect_timeout_secs: 5
confirmation_timeout_secs: 30
proof_clock_skew_secs: 2
networks:
  - chainId: 137
    name: polygon
    isDefault: true
    rpcUrl: https://polygon-rpc.com
remote:
  endpoint: http://127.0.0.1:8545
  events_url: ws://127.0.0.1:8546
"#;
        let config = WalletConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.app_name, "wee");
        assert_eq!(config.networks.len(), 1);
        assert!(config.networks[0].is_default);
        let remote = config.remote.unwrap();
        assert_eq!(remote.timeout_secs, 30);
        assert_eq!(remote.events_url.as_deref(), Some("ws://127.0.0.1:8546"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = WalletConfig::from_yaml_str("estimate_timeout_secs: 0").unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
    }
}
