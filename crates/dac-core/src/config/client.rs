//! # Client Configuration
//!
//! Configuration for clients sending access requests to a gateway.

use super::common::*;
use serde::Deserialize;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

/// Client configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub client: ClientSection,
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub trust: TrustSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ClientSection {
    /// Gateway address (`host:port`)
    pub server: String,
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.trust.validate()?;
        self.trust.decoded_keys(self.identity.suite)?;
        Ok(())
    }

    /// Resolve the gateway address
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.client
            .server
            .to_socket_addrs()
            .map_err(|e| ConfigError::InvalidAddress(format!("{}: {}", self.client.server, e)))?
            .next()
            .ok_or_else(|| ConfigError::InvalidAddress(self.client.server.clone()))
    }
}

/// Generate example client config
pub fn example_client_config() -> &'static str {
    r#"# dacgate Client Configuration
# Usage: dacgate request -c client.toml "ACTUATOR:door:unlock"

[client]
server = "gateway.local:9998"

# ─────────────────────────────────────────────────────────────────────────────
# Identity
# ─────────────────────────────────────────────────────────────────────────────
[identity]
suite = "curve25519"                 # must match the gateway
# key_file = "/etc/dacgate/client.key"

# ─────────────────────────────────────────────────────────────────────────────
# Trusted gateways (base64 public keys, see: dacgate pubkey server.key)
# ─────────────────────────────────────────────────────────────────────────────
[trust]
allowed_keys = []
# accept_any = true                  # DANGEROUS: disables gateway authentication

[limits]
max_frame_len = 16384

[timeouts]
read = 30
write = 10

[logging]
level = "warn"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let config = ClientConfig::parse(
            r#"
[client]
server = "127.0.0.1:9998"
[trust]
accept_any = true
[timeouts]
read = 0
"#,
        )
        .unwrap();
        assert_eq!(config.server_addr().unwrap().port(), 9998);
        assert_eq!(config.timeouts.to_timeouts().read, None);
        assert!(config.identity.key_file.is_none());
    }

    #[test]
    fn test_example_parses_once_trusted() {
        let content = example_client_config().replace("# accept_any = true", "accept_any = true");
        let config = ClientConfig::parse(&content).unwrap();
        assert_eq!(config.client.server, "gateway.local:9998");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_missing_client_section() {
        assert!(matches!(
            ClientConfig::parse("[trust]\naccept_any = true\n"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
