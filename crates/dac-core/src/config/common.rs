//! # Common Configuration Types
//!
//! Sections shared by server and client configuration files.

use crate::crypto::{create_suite, IdentityKey, KeyFile, SuiteId};
use base64::Engine;
use dac_protocol::{
    Timeouts, DEFAULT_MAX_FRAMES_PER_KEY, DEFAULT_MAX_FRAME_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN,
};
use log::debug;
use serde::Deserialize;
use thiserror::Error;

/// Long-term identity configuration
#[derive(Debug, Deserialize, Default)]
pub struct IdentitySection {
    #[serde(default)]
    pub suite: SuiteId,
    /// Identity key file; absent means a fresh identity per handshake
    #[serde(default)]
    pub key_file: Option<String>,
}

impl IdentitySection {
    /// Load the configured identity, `None` when no key file is set
    pub fn load(&self) -> Result<Option<Box<dyn IdentityKey>>, ConfigError> {
        let Some(ref path) = self.key_file else {
            return Ok(None);
        };

        let keyfile = KeyFile::read_from_file(path)
            .map_err(|e| ConfigError::KeyFile(format!("{}: {}", path, e)))?;
        if keyfile.suite() != self.suite {
            return Err(ConfigError::KeyFile(format!(
                "{} holds a {} key but suite is {}",
                path,
                keyfile.suite(),
                self.suite
            )));
        }
        let identity = keyfile
            .to_identity()
            .map_err(|e| ConfigError::KeyFile(format!("{}: {}", path, e)))?;
        debug!("Loaded {} identity key from {}", self.suite, path);
        Ok(Some(identity))
    }
}

/// Peer trust configuration
#[derive(Debug, Deserialize, Default)]
pub struct TrustSection {
    /// Base64 identity public keys accepted from peers
    #[serde(default)]
    pub allowed_keys: Vec<String>,
    /// Accept any peer identity (disables authentication)
    #[serde(default)]
    pub accept_any: bool,
}

impl TrustSection {
    /// Decode `allowed_keys`, checking each against the suite's key size
    pub fn decoded_keys(&self, suite: SuiteId) -> Result<Vec<Vec<u8>>, ConfigError> {
        let expected = create_suite(suite).identity_len();
        self.allowed_keys
            .iter()
            .map(|encoded| {
                let key = base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| ConfigError::InvalidKey(format!("{}: {}", encoded, e)))?;
                if key.len() != expected {
                    return Err(ConfigError::InvalidKey(format!(
                        "{}: expected {} bytes for {}, got {}",
                        encoded,
                        expected,
                        suite,
                        key.len()
                    )));
                }
                Ok(key)
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_keys.is_empty() && !self.accept_any {
            return Err(ConfigError::MissingTrust);
        }
        Ok(())
    }
}

/// Resource limits
#[derive(Debug, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    #[serde(default = "default_max_frames_per_key")]
    pub max_frames_per_key: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        LimitsSection {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_frames_per_key: DEFAULT_MAX_FRAMES_PER_KEY,
        }
    }
}

impl LimitsSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&self.max_frame_len) {
            return Err(ConfigError::InvalidLimit(format!(
                "max_frame_len must be within {}..={}, got {}",
                MIN_FRAME_LEN, MAX_FRAME_LEN, self.max_frame_len
            )));
        }
        if self.max_frames_per_key == 0 || self.max_frames_per_key > u32::MAX as u64 {
            return Err(ConfigError::InvalidLimit(format!(
                "max_frames_per_key must be within 1..={}, got {}",
                u32::MAX,
                self.max_frames_per_key
            )));
        }
        Ok(())
    }
}

/// Timeout configuration (seconds, 0 = block forever)
#[derive(Debug, Deserialize)]
pub struct TimeoutsSection {
    #[serde(default = "default_read_timeout")]
    pub read: u64,
    #[serde(default = "default_write_timeout")]
    pub write: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        TimeoutsSection {
            read: default_read_timeout(),
            write: default_write_timeout(),
        }
    }
}

impl TimeoutsSection {
    pub fn to_timeouts(&self) -> Timeouts {
        Timeouts::from_secs(self.read, self.write)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: default_log_level(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT VALUES
// ═══════════════════════════════════════════════════════════════════════════

pub fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}
pub fn default_max_frames_per_key() -> u64 {
    DEFAULT_MAX_FRAMES_PER_KEY
}
pub fn default_read_timeout() -> u64 {
    30
}
pub fn default_write_timeout() -> u64 {
    10
}
pub fn default_log_level() -> String {
    "info".to_string()
}
pub fn default_max_connections() -> usize {
    64
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Key file error: {0}")]
    KeyFile(String),
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
    #[error("No trusted peers (set trust.allowed_keys, or trust.accept_any = true)")]
    MissingTrust,
}
