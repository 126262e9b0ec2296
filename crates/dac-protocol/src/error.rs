//! # Error Module
//!
//! Unified error handling for dac sessions.
//!
//! Every variant is fatal to the session that produced it. Nothing here is
//! ever sent to the peer: on failure the connection is simply dropped, so
//! the detail only reaches local logs.

use std::io;
use thiserror::Error;

/// Result type used across the dac crates
pub type Result<T> = std::result::Result<T, DacError>;

/// Top-level session error
#[derive(Debug, Error)]
pub enum DacError {
    /// Byte pipe failed, timed out or was closed by the peer
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Key generation, signing or cipher setup failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Peer could not be authenticated
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthFailure),

    /// Malformed message or frame
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Packet counter exhausted, a new handshake is needed
    #[error("Packet counter exhausted, re-authenticate to continue")]
    RekeyRequired,

    /// Session was cancelled through its cancel token
    #[error("Session cancelled")]
    Cancelled,

    /// Operation not valid in the current session state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Bad configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl DacError {
    /// True for failures that must be reported as a uniform authentication failure
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, DacError::Authentication(_) | DacError::Protocol(_))
    }
}

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer closed the pipe
    #[error("Connection closed by peer")]
    Closed,

    /// Read or write did not complete in time
    #[error("Timed out")]
    Timeout,

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify an I/O error, folding time-outs into [`TransportError::Timeout`]
    pub fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportError::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportError::Closed,
            _ => TransportError::Io(e),
        }
    }
}

/// Primitive-layer failures
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key agreement produced a non-contributory secret")]
    NonContributory,

    #[error("Unsupported suite id: {0}")]
    UnsupportedSuite(u8),

    #[error("Ciphertext is not block aligned")]
    NotBlockAligned,
}

/// Why authentication failed
///
/// Distinguishable locally for logging; the peer only ever sees the
/// connection drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// Transcript signature did not verify
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Peer verifier rejected the long-term public key
    #[error("peer identity rejected")]
    PeerRejected,

    /// Frame MAC mismatch
    #[error("frame MAC mismatch")]
    MacMismatch,

    /// Server key confirmation did not match
    #[error("key confirmation mismatch")]
    KeyConfirmation,
}

/// Wire format violations
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid version: expected {expected}, got {got}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("Field too large: max {max}, got {got}")]
    FieldTooLarge { max: usize, got: usize },

    #[error("Invalid field length: expected {expected}, got {got}")]
    InvalidFieldLength { expected: usize, got: usize },

    #[error("Frame too small: min {min}, got {got}")]
    FrameTooSmall { min: usize, got: usize },

    #[error("Frame too large: max {max}, got {got}")]
    FrameTooLarge { max: usize, got: usize },

    #[error("Payload too large: max {max}, got {got}")]
    PayloadTooLarge { max: usize, got: usize },

    #[error("Corrupted frame: {0}")]
    CorruptedFrame(String),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),
}
