//! # Curve25519 Suite
//!
//! X25519 ephemeral key agreement with Ed25519 identity signatures.
//!
//! Ed25519 keys are used for:
//! - Long-term identity (`Ks`, `Kc`)
//! - Transcript signatures (`s`, `sc`)
//!
//! X25519 keys are generated fresh for every handshake and consumed by
//! the agreement.

use super::{IdentityKey, KeyAgreement, Suite, SuiteId};
use dac_protocol::{AuthFailure, CryptoError, Result};
use ed25519_dalek::{SecretKey, Signature, Signer, SigningKey, VerifyingKey};
use rand_core::OsRng;
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

/// Size of Ed25519 private key in bytes
pub const ED25519_PRIVATE_KEY_SIZE: usize = 32;

/// Size of Ed25519 public key in bytes
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of Ed25519 signature in bytes
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// Size of X25519 public value in bytes
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// X25519 + Ed25519
#[derive(Debug, Clone, Copy, Default)]
pub struct Curve25519Suite;

impl Suite for Curve25519Suite {
    fn id(&self) -> SuiteId {
        SuiteId::Curve25519
    }

    fn name(&self) -> &'static str {
        "X25519-Ed25519"
    }

    fn ephemeral_len(&self) -> usize {
        X25519_PUBLIC_KEY_SIZE
    }

    fn identity_len(&self) -> usize {
        ED25519_PUBLIC_KEY_SIZE
    }

    fn signature_len(&self) -> usize {
        ED25519_SIGNATURE_SIZE
    }

    fn generate_identity(&self) -> Result<Box<dyn IdentityKey>> {
        Ok(Box::new(Ed25519Identity::generate()))
    }

    fn load_identity(&self, private_key: &[u8]) -> Result<Box<dyn IdentityKey>> {
        Ok(Box::new(Ed25519Identity::from_private_key(private_key)?))
    }

    fn generate_ephemeral(&self) -> Result<Box<dyn KeyAgreement>> {
        Ok(Box::new(X25519Ephemeral::generate()))
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        let key_bytes: [u8; ED25519_PUBLIC_KEY_SIZE] = public_key
            .try_into()
            .map_err(|_| AuthFailure::SignatureInvalid)?;
        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| AuthFailure::SignatureInvalid)?;
        let signature =
            Signature::from_slice(signature).map_err(|_| AuthFailure::SignatureInvalid)?;

        verifying_key
            .verify_strict(message, &signature)
            .map_err(|_| AuthFailure::SignatureInvalid.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IDENTITY
// ═══════════════════════════════════════════════════════════════════════════

/// Ed25519 identity key
pub struct Ed25519Identity {
    signing_key: SigningKey,
}

impl Ed25519Identity {
    /// Generate a new random identity
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Load from a 32-byte seed
    pub fn from_private_key(private_key: &[u8]) -> Result<Self> {
        let secret: SecretKey = private_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: ED25519_PRIVATE_KEY_SIZE,
                got: private_key.len(),
            })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }
}

impl IdentityKey for Ed25519Identity {
    fn suite(&self) -> SuiteId {
        SuiteId::Curve25519
    }

    fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    fn private_key(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_bytes().to_vec())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Identity")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// EPHEMERAL
// ═══════════════════════════════════════════════════════════════════════════

/// X25519 ephemeral key pair for one handshake
pub struct X25519Ephemeral {
    secret: EphemeralSecret,
    public: PublicKey,
}

impl X25519Ephemeral {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }
}

impl KeyAgreement for X25519Ephemeral {
    fn public_key(&self) -> Vec<u8> {
        self.public.to_bytes().to_vec()
    }

    fn agree(self: Box<Self>, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let peer: [u8; X25519_PUBLIC_KEY_SIZE] =
            peer_public
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: X25519_PUBLIC_KEY_SIZE,
                    got: peer_public.len(),
                })?;

        let shared = self.secret.diffie_hellman(&PublicKey::from(peer));

        // Low-order peer points give an all-zero secret
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory.into());
        }

        Ok(Zeroizing::new(shared.as_bytes().to_vec()))
    }
}

impl fmt::Debug for X25519Ephemeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X25519Ephemeral")
            .field("public_key", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}
