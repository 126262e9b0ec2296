//! # TCP Gateway
//!
//! Request-listener glue over TCP. One request per connection:
//!
//! ```text
//! client                                   gateway
//!   │  handshake (4 messages)                │
//!   │ ◀────────────────────────────────────▶ │
//!   │  frame: request string                 │
//!   │ ─────────────────────────────────────▶ │  PEP decides
//!   │  frame: GRANTED | DENIED | ERROR       │
//!   │ ◀───────────────────────────────────── │
//!   ╳  both sides release                    ╳
//! ```

mod client;
mod server;

pub use client::request_access;
pub use server::{GatewayServer, ShutdownHandle};

use crate::session::{Limits, Role, SessionBuilder};
use crate::verify::{AcceptAnyPeer, AllowList, PeerVerifier};
use dac_core::crypto::{IdentityKey, SuiteId};
use dac_core::{ClientConfig, ConfigError, IdentitySection, ServerConfig, TrustSection};
use dac_protocol::Timeouts;
use log::warn;
use std::fmt;
use std::sync::Arc;

/// Everything needed to open a session on either side
#[derive(Clone)]
pub struct SessionSettings {
    pub suite: SuiteId,
    pub identity: Option<Arc<dyn IdentityKey>>,
    pub verifier: Arc<dyn PeerVerifier>,
    pub limits: Limits,
    pub timeouts: Timeouts,
}

impl SessionSettings {
    pub fn new(verifier: Arc<dyn PeerVerifier>) -> Self {
        Self {
            suite: SuiteId::default(),
            identity: None,
            verifier,
            limits: Limits::default(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn from_server_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        Self::from_sections(&config.identity, &config.trust)
            .map(|s| s.with_limits(Limits::from(&config.limits), config.timeouts.to_timeouts()))
    }

    pub fn from_client_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Self::from_sections(&config.identity, &config.trust)
            .map(|s| s.with_limits(Limits::from(&config.limits), config.timeouts.to_timeouts()))
    }

    fn from_sections(
        identity: &IdentitySection,
        trust: &TrustSection,
    ) -> Result<Self, ConfigError> {
        let verifier = verifier_from_trust(trust, identity.suite)?;
        let key = identity.load()?;
        if key.is_none() {
            warn!("No identity key_file configured, a fresh identity is generated per handshake");
        }
        Ok(Self {
            suite: identity.suite,
            identity: key.map(Arc::from),
            verifier,
            limits: Limits::default(),
            timeouts: Timeouts::default(),
        })
    }

    fn with_limits(mut self, limits: Limits, timeouts: Timeouts) -> Self {
        self.limits = limits;
        self.timeouts = timeouts;
        self
    }

    /// Session builder for `role` with these settings
    pub fn builder(&self, role: Role) -> SessionBuilder {
        let builder = SessionBuilder::new(role, Arc::clone(&self.verifier))
            .suite(self.suite)
            .limits(self.limits);
        match &self.identity {
            Some(identity) => builder.identity(Arc::clone(identity)),
            None => builder,
        }
    }
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("suite", &self.suite)
            .field("has_identity", &self.identity.is_some())
            .field("limits", &self.limits)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

/// Verifier described by a `[trust]` section
pub fn verifier_from_trust(
    trust: &TrustSection,
    suite: SuiteId,
) -> Result<Arc<dyn PeerVerifier>, ConfigError> {
    if trust.accept_any {
        warn!("[trust] accept_any is set: peers are NOT authenticated");
        return Ok(Arc::new(AcceptAnyPeer));
    }
    trust.validate()?;
    Ok(Arc::new(AllowList::from_keys(trust.decoded_keys(suite)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn test_verifier_from_trust() {
        let key = vec![0x42u8; 32];
        let trust = TrustSection {
            allowed_keys: vec![base64::engine::general_purpose::STANDARD.encode(&key)],
            accept_any: false,
        };
        let verifier = verifier_from_trust(&trust, SuiteId::Curve25519).unwrap();
        assert!(verifier.is_trusted(&key));
        assert!(!verifier.is_trusted(&[0x43u8; 32]));
    }

    #[test]
    fn test_empty_trust_rejected() {
        let trust = TrustSection {
            allowed_keys: vec![],
            accept_any: false,
        };
        assert!(verifier_from_trust(&trust, SuiteId::Curve25519).is_err());
    }

    #[test]
    fn test_accept_any_trust() {
        let trust = TrustSection {
            allowed_keys: vec![],
            accept_any: true,
        };
        let verifier = verifier_from_trust(&trust, SuiteId::P256).unwrap();
        assert!(verifier.is_trusted(&[1, 2, 3]));
    }
}
