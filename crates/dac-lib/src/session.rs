//! # Session Lifecycle
//!
//! A [`Session`] owns one transport and runs one role over it:
//!
//! ```text
//!            authenticate()              send()/receive()
//! Initialized ───────────────▶ Authenticated ◀──────────────┐
//!      │                           │   │                     │
//!      │                 budget    │   └─────────────────────┘
//!      │                 used up   ▼
//!      │                     RekeyRequired ── authenticate() ──▶ Authenticated
//!      │
//!      └──── any failure ──▶ Failed ──── release() ──▶ Released
//! ```
//!
//! Sessions are not shared between threads. Every failure is final:
//! the keys are dropped (and zeroed) immediately, and only `release()`
//! is left to call.

use crate::channel::{max_payload_len, SecureChannel};
use crate::handshake::{self, HandshakeContext};
use crate::verify::PeerVerifier;
use dac_core::crypto::{create_suite, Direction, IdentityKey, KeySchedule, Suite, SuiteId};
use dac_core::LimitsSection;
use dac_protocol::{
    CancelToken, DacError, Nonce, ProtocolError, Result, Transport, DEFAULT_MAX_FRAMES_PER_KEY,
    DEFAULT_MAX_FRAME_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN,
};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// ROLE AND LIMITS
// ═══════════════════════════════════════════════════════════════════════════

/// Which side of the handshake a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Direction of frames this role sends
    pub fn outbound(self) -> Direction {
        match self {
            Role::Client => Direction::ClientToServer,
            Role::Server => Direction::ServerToClient,
        }
    }

    /// Direction of frames this role receives
    pub fn inbound(self) -> Direction {
        match self {
            Role::Client => Direction::ServerToClient,
            Role::Server => Direction::ClientToServer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

/// Frame limits for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest frame accepted or produced (length prefix value)
    pub max_frame_len: usize,
    /// Frames per direction before a new handshake is required
    pub max_frames_per_key: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_frames_per_key: DEFAULT_MAX_FRAMES_PER_KEY,
        }
    }
}

impl From<&LimitsSection> for Limits {
    fn from(section: &LimitsSection) -> Self {
        Self {
            max_frame_len: section.max_frame_len,
            max_frames_per_key: section.max_frames_per_key,
        }
    }
}

impl Limits {
    /// Clamp into the range the frame format can express
    fn normalized(self) -> Self {
        Self {
            max_frame_len: self.max_frame_len.clamp(MIN_FRAME_LEN, MAX_FRAME_LEN),
            max_frames_per_key: self.max_frames_per_key.clamp(1, DEFAULT_MAX_FRAMES_PER_KEY),
        }
    }

    /// Largest payload one frame can carry
    pub fn max_payload_len(&self) -> usize {
        max_payload_len(self.max_frame_len)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STATUS
// ═══════════════════════════════════════════════════════════════════════════

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Created, no handshake yet
    Initialized,
    /// Keys established, frames may flow
    Authenticated,
    /// Frame budget used up, `authenticate()` again to continue
    RekeyRequired,
    /// A handshake or frame operation failed
    Failed,
    /// Released, nothing left to do
    Released,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Initialized => "Initialized",
            SessionStatus::Authenticated => "Authenticated",
            SessionStatus::RekeyRequired => "RekeyRequired",
            SessionStatus::Failed => "Failed",
            SessionStatus::Released => "Released",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Session configuration
///
/// A verifier is always required. Use [`crate::AcceptAnyPeer`] only when
/// peer authentication is knowingly switched off.
pub struct SessionBuilder {
    role: Role,
    verifier: Arc<dyn PeerVerifier>,
    suite: SuiteId,
    identity: Option<Arc<dyn IdentityKey>>,
    limits: Limits,
    cancel: CancelToken,
    fixed_nonce: Option<Nonce>,
}

impl SessionBuilder {
    pub fn new(role: Role, verifier: Arc<dyn PeerVerifier>) -> Self {
        Self {
            role,
            verifier,
            suite: SuiteId::default(),
            identity: None,
            limits: Limits::default(),
            cancel: CancelToken::new(),
            fixed_nonce: None,
        }
    }

    pub fn suite(mut self, suite: SuiteId) -> Self {
        self.suite = suite;
        self
    }

    /// Long-term identity; without one a fresh key is generated per handshake
    pub fn identity(mut self, identity: Arc<dyn IdentityKey>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.limits.max_frame_len = max_frame_len;
        self
    }

    pub fn max_frames_per_key(mut self, frames: u64) -> Self {
        self.limits.max_frames_per_key = frames;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Nonce for the next handshake only (test vectors)
    pub fn fixed_nonce(mut self, nonce: Nonce) -> Self {
        self.fixed_nonce = Some(nonce);
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> Session<T> {
        Session {
            role: self.role,
            suite: Arc::from(create_suite(self.suite)),
            identity: self.identity,
            verifier: self.verifier,
            limits: self.limits.normalized(),
            cancel: self.cancel,
            fixed_nonce: self.fixed_nonce,
            transport: Some(transport),
            channel: None,
            schedule: None,
            peer_identity: None,
            status: SessionStatus::Initialized,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════

/// One mutually authenticated session over a transport
pub struct Session<T: Transport> {
    role: Role,
    suite: Arc<dyn Suite>,
    identity: Option<Arc<dyn IdentityKey>>,
    verifier: Arc<dyn PeerVerifier>,
    limits: Limits,
    cancel: CancelToken,
    fixed_nonce: Option<Nonce>,
    transport: Option<T>,
    channel: Option<SecureChannel>,
    schedule: Option<KeySchedule>,
    peer_identity: Option<Vec<u8>>,
    status: SessionStatus,
}

impl<T: Transport> Session<T> {
    /// Client session with default settings
    pub fn init_client(transport: T, verifier: Arc<dyn PeerVerifier>) -> Self {
        SessionBuilder::new(Role::Client, verifier).build(transport)
    }

    /// Server session with default settings
    pub fn init_server(transport: T, verifier: Arc<dyn PeerVerifier>) -> Self {
        SessionBuilder::new(Role::Server, verifier).build(transport)
    }

    pub fn client(transport: T, verifier: Arc<dyn PeerVerifier>) -> Self {
        Self::init_client(transport, verifier)
    }

    pub fn server(transport: T, verifier: Arc<dyn PeerVerifier>) -> Self {
        Self::init_server(transport, verifier)
    }

    /// Run the handshake
    ///
    /// Valid on a new session and to re-key an authenticated one. Any
    /// failure leaves the session `Failed`.
    pub fn authenticate(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::Initialized
            | SessionStatus::Authenticated
            | SessionStatus::RekeyRequired => {}
            status => {
                return Err(DacError::InvalidState(format!(
                    "cannot authenticate a {} session",
                    status
                )))
            }
        }

        // Old keys never outlive a new handshake attempt
        self.clear_keys();

        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => return Err(DacError::InvalidState("transport released".into())),
        };
        let ctx = HandshakeContext::new(
            Arc::clone(&self.suite),
            self.identity.clone(),
            Arc::clone(&self.verifier),
            self.fixed_nonce.take(),
        );

        let result = handshake::run(ctx, self.role, transport, &self.cancel).and_then(|outcome| {
            let channel = SecureChannel::new(&outcome.schedule, self.role, &self.limits)?;
            Ok((outcome, channel))
        });

        match result {
            Ok((outcome, channel)) => {
                info!(
                    "{} session authenticated ({}), peer {}",
                    self.role,
                    self.suite.name(),
                    short_key(&outcome.peer_identity)
                );
                self.channel = Some(channel);
                self.schedule = Some(outcome.schedule);
                self.peer_identity = Some(outcome.peer_identity);
                self.status = SessionStatus::Authenticated;
                Ok(())
            }
            Err(e) => {
                warn!("{} authentication failed: {}", self.role, e);
                self.fail();
                Err(e)
            }
        }
    }

    /// Encrypt and send one payload
    ///
    /// An oversized payload is refused without touching the channel.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.check_ready()?;
        let max = self.limits.max_payload_len();
        if data.len() > max {
            return Err(ProtocolError::PayloadTooLarge {
                max,
                got: data.len(),
            }
            .into());
        }
        let result = match (self.channel.as_mut(), self.transport.as_mut()) {
            (Some(channel), Some(transport)) => channel.send(transport, data),
            _ => Err(DacError::InvalidState("no channel".into())),
        };
        self.settle(result)
    }

    /// Receive and decrypt one payload
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        self.check_ready()?;
        let result = match (self.channel.as_mut(), self.transport.as_mut()) {
            (Some(channel), Some(transport)) => channel.receive(transport),
            _ => Err(DacError::InvalidState("no channel".into())),
        };
        self.settle(result)
    }

    /// Drop keys and transport
    ///
    /// Idempotent, and valid in every state including after a failure.
    pub fn release(&mut self) {
        if self.status == SessionStatus::Released {
            return;
        }
        self.clear_keys();
        self.transport = None;
        self.identity = None;
        self.status = SessionStatus::Released;
        debug!("{} session released", self.role);
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn suite(&self) -> SuiteId {
        self.suite.id()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Peer identity key once authenticated
    pub fn peer_identity(&self) -> Option<&[u8]> {
        self.peer_identity.as_deref()
    }

    /// Current key schedule once authenticated
    pub fn key_schedule(&self) -> Option<&KeySchedule> {
        self.schedule.as_ref()
    }

    /// Raw transport access (bypasses framing)
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn check_ready(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::Authenticated => {}
            SessionStatus::RekeyRequired => return Err(DacError::RekeyRequired),
            status => {
                return Err(DacError::InvalidState(format!(
                    "no frames on a {} session",
                    status
                )))
            }
        }
        if self.cancel.is_cancelled() {
            debug!("{} session cancelled", self.role);
            self.fail();
            return Err(DacError::Cancelled);
        }
        Ok(())
    }

    /// Map a frame result onto the session status
    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        match result {
            Ok(value) => Ok(value),
            Err(DacError::RekeyRequired) => {
                debug!("{} frame budget used up, re-authentication required", self.role);
                self.status = SessionStatus::RekeyRequired;
                Err(DacError::RekeyRequired)
            }
            Err(e) => {
                warn!("{} session failed: {}", self.role, e);
                self.fail();
                Err(e)
            }
        }
    }

    fn fail(&mut self) {
        self.clear_keys();
        self.status = SessionStatus::Failed;
    }

    fn clear_keys(&mut self) {
        self.channel = None;
        self.schedule = None;
        self.peer_identity = None;
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("suite", &self.suite.name())
            .field("status", &self.status)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

fn short_key(key: &[u8]) -> String {
    key.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
