//! # Handshake State Machine
//!
//! Both roles walk the same stage sequence with their own transition
//! functions:
//!
//! ```text
//! client:  Init → Generate → Verify → Finish → Done
//! server:  Init → Compute  → Verify → Finish → Done
//!                        any failure → Error
//! ```
//!
//! The driver calls the role's transition function until it reaches
//! `Done` or fails. `Error` is absorbing: the context is dropped and all
//! secret material goes with it.

mod client;
mod server;

use crate::session::Role;
use crate::verify::PeerVerifier;
use dac_core::crypto::{
    confirmation_tag, transcript_hash, IdentityKey, KeyAgreement, KeySchedule, Suite,
    TranscriptInput,
};
use dac_protocol::{
    CancelToken, DacError, Nonce, Result, Transport, CONFIRMATION_LEN, NONCE_LEN, TRANSCRIPT_LEN,
};
use log::debug;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Handshake stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Init,
    /// Client: ephemeral key and parameter exchange
    Generate,
    /// Server: ephemeral key, shared secret and signed transcript
    Compute,
    Verify,
    Finish,
    Done,
    Error,
}

impl AuthStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuthStage::Done | AuthStage::Error)
    }
}

/// What a successful handshake leaves behind
pub struct HandshakeOutcome {
    pub schedule: KeySchedule,
    pub peer_identity: Vec<u8>,
}

/// Per-run handshake state
///
/// Lives only for one `authenticate()` call. Values are stored by role
/// (client/server) rather than local/peer so both sides fill the
/// transcript in the same order.
pub struct HandshakeContext {
    suite: Arc<dyn Suite>,
    identity: Option<Arc<dyn IdentityKey>>,
    verifier: Arc<dyn PeerVerifier>,
    fixed_nonce: Option<Nonce>,

    client_nonce: Nonce,
    server_nonce: Nonce,
    client_ephemeral: Vec<u8>,
    server_ephemeral: Vec<u8>,
    client_identity: Vec<u8>,
    server_identity: Vec<u8>,
    peer_signature: Vec<u8>,

    ephemeral: Option<Box<dyn KeyAgreement>>,
    shared_secret: Zeroizing<Vec<u8>>,
    h: Zeroizing<[u8; TRANSCRIPT_LEN]>,
    hc: Zeroizing<[u8; TRANSCRIPT_LEN]>,
    schedule: Option<KeySchedule>,
    stage: AuthStage,
}

impl HandshakeContext {
    pub fn new(
        suite: Arc<dyn Suite>,
        identity: Option<Arc<dyn IdentityKey>>,
        verifier: Arc<dyn PeerVerifier>,
        fixed_nonce: Option<Nonce>,
    ) -> Self {
        Self {
            suite,
            identity,
            verifier,
            fixed_nonce,
            client_nonce: [0u8; NONCE_LEN],
            server_nonce: [0u8; NONCE_LEN],
            client_ephemeral: Vec::new(),
            server_ephemeral: Vec::new(),
            client_identity: Vec::new(),
            server_identity: Vec::new(),
            peer_signature: Vec::new(),
            ephemeral: None,
            shared_secret: Zeroizing::new(Vec::new()),
            h: Zeroizing::new([0u8; TRANSCRIPT_LEN]),
            hc: Zeroizing::new([0u8; TRANSCRIPT_LEN]),
            schedule: None,
            stage: AuthStage::Init,
        }
    }

    pub fn stage(&self) -> AuthStage {
        self.stage
    }

    /// Use the configured identity or generate a fresh one for this run
    fn load_identity(&mut self) -> Result<Arc<dyn IdentityKey>> {
        if let Some(identity) = &self.identity {
            if identity.suite() != self.suite.id() {
                return Err(DacError::Config(format!(
                    "identity key is {} but the session uses {}",
                    identity.suite(),
                    self.suite.id()
                )));
            }
            return Ok(Arc::clone(identity));
        }

        debug!("No identity key configured, generating one for this handshake");
        let identity: Arc<dyn IdentityKey> = Arc::from(self.suite.generate_identity()?);
        self.identity = Some(Arc::clone(&identity));
        Ok(identity)
    }

    fn identity(&self) -> Result<&Arc<dyn IdentityKey>> {
        self.identity
            .as_ref()
            .ok_or_else(|| DacError::InvalidState("identity not loaded".into()))
    }

    /// Fixed nonce if one was supplied (used once), otherwise fresh random bytes
    fn take_nonce(&mut self) -> Nonce {
        self.fixed_nonce
            .take()
            .unwrap_or_else(dac_core::crypto::random_bytes::<NONCE_LEN>)
    }

    /// Consume the ephemeral key against the peer's public value
    fn agree(&mut self, peer_public: &[u8]) -> Result<()> {
        let ephemeral = self
            .ephemeral
            .take()
            .ok_or_else(|| DacError::InvalidState("ephemeral key already used".into()))?;
        self.shared_secret = ephemeral.agree(peer_public)?;
        Ok(())
    }

    fn transcript(&self, identity: &[u8]) -> [u8; TRANSCRIPT_LEN] {
        transcript_hash(&TranscriptInput {
            client_nonce: &self.client_nonce,
            server_nonce: &self.server_nonce,
            identity,
            client_ephemeral: &self.client_ephemeral,
            server_ephemeral: &self.server_ephemeral,
            shared_secret: &self.shared_secret,
        })
    }

    /// `H`, over the server identity
    fn server_transcript(&self) -> [u8; TRANSCRIPT_LEN] {
        self.transcript(&self.server_identity)
    }

    /// `Hc`, over the client identity
    fn client_transcript(&self) -> [u8; TRANSCRIPT_LEN] {
        self.transcript(&self.client_identity)
    }

    /// Derive the key schedule and the server key confirmation
    fn derive_schedule(&mut self) -> Result<[u8; CONFIRMATION_LEN]> {
        let schedule = KeySchedule::derive(&self.shared_secret, &self.h);
        let confirm = confirmation_tag(&schedule, &self.h, &self.hc)?;
        self.schedule = Some(schedule);
        Ok(confirm)
    }

    fn into_outcome(mut self, role: Role) -> Result<HandshakeOutcome> {
        let schedule = self
            .schedule
            .take()
            .ok_or_else(|| DacError::InvalidState("handshake finished without keys".into()))?;
        let peer_identity = match role {
            Role::Client => std::mem::take(&mut self.server_identity),
            Role::Server => std::mem::take(&mut self.client_identity),
        };
        Ok(HandshakeOutcome {
            schedule,
            peer_identity,
        })
    }
}

impl fmt::Debug for HandshakeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeContext")
            .field("suite", &self.suite.name())
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// Run the handshake for `role` to completion
pub fn run<T: Transport + ?Sized>(
    mut ctx: HandshakeContext,
    role: Role,
    transport: &mut T,
    cancel: &CancelToken,
) -> Result<HandshakeOutcome> {
    while !ctx.stage.is_terminal() {
        if cancel.is_cancelled() {
            ctx.stage = AuthStage::Error;
            return Err(DacError::Cancelled);
        }

        let current = ctx.stage;
        let next = match role {
            Role::Client => client::step(&mut ctx, transport),
            Role::Server => server::step(&mut ctx, transport),
        };

        match next {
            Ok(stage) => {
                debug!("{} handshake: {:?} -> {:?}", role, current, stage);
                ctx.stage = stage;
            }
            Err(e) => {
                debug!("{} handshake: {:?} -> Error", role, current);
                ctx.stage = AuthStage::Error;
                return Err(e);
            }
        }
    }

    ctx.into_outcome(role)
}
