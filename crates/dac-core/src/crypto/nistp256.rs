//! # NIST P-256 Suite
//!
//! ECDH over P-256 with ECDSA-P256/SHA-256 identity signatures.
//!
//! - Ephemeral values: SEC1 uncompressed (0x04 || x || y, 65 bytes)
//! - Identity keys: SEC1 compressed (33 bytes)
//! - Signatures: fixed-size `r || s` (64 bytes)
//!
//! Peer points are validated on decode; the identity point is refused.

use super::{IdentityKey, KeyAgreement, Suite, SuiteId};
use dac_protocol::{AuthFailure, CryptoError, Result};
use p256::ecdh::EphemeralSecret;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand_core::OsRng;
use std::fmt;
use zeroize::Zeroizing;

/// P-256 scalar size in bytes
pub const P256_PRIVATE_KEY_SIZE: usize = 32;

/// Compressed SEC1 point size in bytes
pub const P256_COMPRESSED_KEY_SIZE: usize = 33;

/// Uncompressed SEC1 point size in bytes
pub const P256_UNCOMPRESSED_KEY_SIZE: usize = 65;

/// ECDSA-P256 fixed signature size in bytes
pub const P256_SIGNATURE_SIZE: usize = 64;

/// ECDH-P256 + ECDSA-P256
#[derive(Debug, Clone, Copy, Default)]
pub struct P256Suite;

impl Suite for P256Suite {
    fn id(&self) -> SuiteId {
        SuiteId::P256
    }

    fn name(&self) -> &'static str {
        "ECDH-P256-ECDSA"
    }

    fn ephemeral_len(&self) -> usize {
        P256_UNCOMPRESSED_KEY_SIZE
    }

    fn identity_len(&self) -> usize {
        P256_COMPRESSED_KEY_SIZE
    }

    fn signature_len(&self) -> usize {
        P256_SIGNATURE_SIZE
    }

    fn generate_identity(&self) -> Result<Box<dyn IdentityKey>> {
        Ok(Box::new(P256Identity::generate()))
    }

    fn load_identity(&self, private_key: &[u8]) -> Result<Box<dyn IdentityKey>> {
        Ok(Box::new(P256Identity::from_private_key(private_key)?))
    }

    fn generate_ephemeral(&self) -> Result<Box<dyn KeyAgreement>> {
        Ok(Box::new(P256Ephemeral::generate()))
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        if public_key.len() != P256_COMPRESSED_KEY_SIZE {
            return Err(AuthFailure::SignatureInvalid.into());
        }
        let verifying_key =
            VerifyingKey::from_sec1_bytes(public_key).map_err(|_| AuthFailure::SignatureInvalid)?;
        let signature =
            Signature::from_slice(signature).map_err(|_| AuthFailure::SignatureInvalid)?;

        verifying_key
            .verify(message, &signature)
            .map_err(|_| AuthFailure::SignatureInvalid.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IDENTITY
// ═══════════════════════════════════════════════════════════════════════════

/// ECDSA-P256 identity key
pub struct P256Identity {
    signing_key: SigningKey,
}

impl P256Identity {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Load from a 32-byte big-endian scalar
    pub fn from_private_key(private_key: &[u8]) -> Result<Self> {
        if private_key.len() != P256_PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: P256_PRIVATE_KEY_SIZE,
                got: private_key.len(),
            }
            .into());
        }
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { signing_key })
    }
}

impl IdentityKey for P256Identity {
    fn suite(&self) -> SuiteId {
        SuiteId::P256
    }

    fn public_key(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    fn private_key(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_bytes().to_vec())
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl fmt::Debug for P256Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P256Identity")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// EPHEMERAL
// ═══════════════════════════════════════════════════════════════════════════

/// ECDH-P256 ephemeral key pair for one handshake
pub struct P256Ephemeral {
    secret: EphemeralSecret,
    public_bytes: Vec<u8>,
}

impl P256Ephemeral {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public_bytes = secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Self {
            secret,
            public_bytes,
        }
    }
}

impl KeyAgreement for P256Ephemeral {
    fn public_key(&self) -> Vec<u8> {
        self.public_bytes.clone()
    }

    fn agree(self: Box<Self>, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if peer_public.len() != P256_UNCOMPRESSED_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: P256_UNCOMPRESSED_KEY_SIZE,
                got: peer_public.len(),
            }
            .into());
        }
        let peer = PublicKey::from_sec1_bytes(peer_public)
            .map_err(|_| CryptoError::InvalidKey("peer point not on P-256".into()))?;

        let shared = self.secret.diffie_hellman(&peer);
        let bytes = Zeroizing::new(shared.raw_secret_bytes().to_vec());

        if bytes.iter().all(|&b| b == 0) {
            return Err(CryptoError::NonContributory.into());
        }
        Ok(bytes)
    }
}

impl fmt::Debug for P256Ephemeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P256Ephemeral")
            .field("public_key", &hex::encode(&self.public_bytes))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodings() {
        let identity = P256Identity::generate();
        let public = identity.public_key();
        assert_eq!(public.len(), P256_COMPRESSED_KEY_SIZE);
        assert!(public[0] == 0x02 || public[0] == 0x03);

        let eph = P256Ephemeral::generate();
        let public = eph.public_key();
        assert_eq!(public.len(), P256_UNCOMPRESSED_KEY_SIZE);
        assert_eq!(public[0], 0x04);
    }

    #[test]
    fn test_off_curve_peer_rejected() {
        let eph = Box::new(P256Ephemeral::generate());
        let mut bogus = vec![0u8; P256_UNCOMPRESSED_KEY_SIZE];
        bogus[0] = 0x04;
        bogus[64] = 1;
        assert!(eph.agree(&bogus).is_err());
    }

    #[test]
    fn test_signature_fails_for_wrong_message() {
        let identity = P256Identity::generate();
        let sig = identity.sign(b"H").unwrap();
        assert!(P256Suite.verify(&identity.public_key(), b"H", &sig).is_ok());
        assert!(P256Suite.verify(&identity.public_key(), b"Hc", &sig).is_err());
    }

    #[test]
    fn test_uncompressed_identity_refused() {
        let identity = P256Identity::generate();
        let sig = identity.sign(b"H").unwrap();
        let uncompressed = identity
            .signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        assert!(P256Suite.verify(&uncompressed, b"H", &sig).is_err());
    }

    #[test]
    fn test_zero_scalar_rejected() {
        assert!(P256Identity::from_private_key(&[0u8; 32]).is_err());
        assert!(P256Identity::from_private_key(&[1u8; 31]).is_err());
    }
}
