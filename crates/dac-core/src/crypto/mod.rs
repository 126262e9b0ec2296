//! # Cryptographic Module
//!
//! Primitive layer for the dac handshake, built on RustCrypto and dalek.
//!
//! ## Handshake suites
//! - `curve25519`: X25519 key agreement, Ed25519 signatures
//! - `p256`: ECDH over NIST P-256, ECDSA-P256/SHA-256 signatures
//!
//! Both suites plug into one handshake through the [`Suite`],
//! [`IdentityKey`] and [`KeyAgreement`] traits.
//!
//! ## Framing primitives
//! - AES-256-CBC with a chained IV per direction
//! - HMAC-SHA256
//! - SHA-256 transcripts and key schedule

mod cbc_stream;
mod curve25519;
mod mac;
mod nistp256;
mod util;

pub mod keyfile;
pub mod schedule;

pub use cbc_stream::{CbcDecryptor, CbcEncryptor};
pub use curve25519::Curve25519Suite;
pub use keyfile::{KeyFile, KeyFileError, KeyFileInfo};
pub use mac::{hmac_sha256, verify_hmac_sha256};
pub use nistp256::P256Suite;
pub use schedule::{
    confirmation_tag, transcript_hash, Direction, DirectionKeys, KeySchedule, TranscriptInput,
};
pub use util::{constant_time_compare, fill_random, random_bytes};

use dac_protocol::Result;
use serde::Deserialize;
use std::fmt;
use zeroize::Zeroizing;

// ═══════════════════════════════════════════════════════════════════════════
// SUITE IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════

/// Handshake suite identifiers, as sent in `ClientHello`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SuiteId {
    /// X25519 + Ed25519
    #[default]
    Curve25519 = 1,
    /// ECDH-P256 + ECDSA-P256
    P256 = 2,
}

impl SuiteId {
    /// Parse from wire byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(SuiteId::Curve25519),
            2 => Some(SuiteId::P256),
            _ => None,
        }
    }

    /// Wire byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteId::Curve25519 => write!(f, "curve25519"),
            SuiteId::P256 => write!(f, "p256"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SUITE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════

/// Long-term signing key
pub trait IdentityKey: Send + Sync {
    /// Suite the key belongs to
    fn suite(&self) -> SuiteId;

    /// Encoded public key, as sent in `Ks` / `Kc`
    fn public_key(&self) -> Vec<u8>;

    /// Raw private key bytes (for key files)
    fn private_key(&self) -> Zeroizing<Vec<u8>>;

    /// Sign a transcript
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Ephemeral key-agreement half, consumed by [`KeyAgreement::agree`]
pub trait KeyAgreement: Send {
    /// Encoded ephemeral public value, as sent in `e` / `f`
    fn public_key(&self) -> Vec<u8>;

    /// Combine with the peer's public value into the raw shared secret `K`
    fn agree(self: Box<Self>, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// Key-agreement and signature strategy for one handshake
pub trait Suite: Send + Sync {
    fn id(&self) -> SuiteId;

    fn name(&self) -> &'static str;

    /// Size of `e` / `f`
    fn ephemeral_len(&self) -> usize;

    /// Size of `Ks` / `Kc`
    fn identity_len(&self) -> usize;

    /// Size of `s` / `sc`
    fn signature_len(&self) -> usize;

    fn generate_identity(&self) -> Result<Box<dyn IdentityKey>>;

    fn load_identity(&self, private_key: &[u8]) -> Result<Box<dyn IdentityKey>>;

    fn generate_ephemeral(&self) -> Result<Box<dyn KeyAgreement>>;

    /// Verify `signature` over `message` under an encoded identity key
    ///
    /// Any malformed key or signature counts as a failed verification.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()>;
}

/// Create the suite for an id
pub fn create_suite(id: SuiteId) -> Box<dyn Suite> {
    match id {
        SuiteId::Curve25519 => Box::new(Curve25519Suite),
        SuiteId::P256 => Box::new(P256Suite),
    }
}
