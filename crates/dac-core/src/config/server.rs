//! # Server Configuration
//!
//! Access gateway (request listener) configuration.

use super::common::*;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Server configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub server: ServerSection,
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
    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    pub listen: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Static access policy
///
/// Requests are matched exactly; anything not listed is denied.
#[derive(Debug, Deserialize, Default)]
pub struct PolicySection {
    #[serde(default)]
    pub grant: Vec<String>,
}

impl PolicySection {
    pub fn is_granted(&self, request: &str) -> bool {
        self.grant.iter().any(|g| g == request)
    }
}

impl ServerConfig {
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
        self.listen_addr()?;
        self.limits.validate()?;
        self.trust.validate()?;
        self.trust.decoded_keys(self.identity.suite)?;
        if self.server.max_connections == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.server.listen.clone()))
    }
}

/// Generate example server config
pub fn example_server_config() -> &'static str {
    r#"# dacgate Server Configuration
# Usage: dacgate serve -c server.toml

[server]
listen = "0.0.0.0:9998"
max_connections = 64

# ─────────────────────────────────────────────────────────────────────────────
# Identity
# ─────────────────────────────────────────────────────────────────────────────
[identity]
suite = "curve25519"                 # or "p256"
# key_file = "/etc/dacgate/server.key" # dacgate genkey -o server.key
# Without key_file a fresh identity is generated for every handshake.

# ─────────────────────────────────────────────────────────────────────────────
# Trusted clients (base64 public keys, see: dacgate pubkey client.key)
# ─────────────────────────────────────────────────────────────────────────────
[trust]
allowed_keys = []
# accept_any = true                  # DANGEROUS: disables client authentication

[limits]
max_frame_len = 16384
max_frames_per_key = 4294967295

[timeouts]
read = 30
write = 10

[logging]
level = "info"

# ─────────────────────────────────────────────────────────────────────────────
# Requests granted by the gateway (exact match, everything else is denied)
# ─────────────────────────────────────────────────────────────────────────────
[policy]
grant = ["ACTUATOR:door:unlock"]
"#
}
