//! # Identity Key Files
//!
//! Persistent long-term identity for a gateway or client, so the same
//! public key survives restarts and can be placed on a peer's allow-list.
//!
//! Key file format:
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ Magic: "DACK" (4 bytes)                    │
//! │ Version: u8                                │
//! │ Suite: u8 (1=curve25519, 2=p256)           │
//! │ Creation Time: u64 (Unix timestamp, LE)    │
//! │ Private Key: [u8; 32]                      │
//! │ Public Key Length: u8                      │
//! │ Public Key: [u8; Public Key Length]        │
//! │ Checksum: [u8; 4] (CRC32, LE)              │
//! └────────────────────────────────────────────┘
//! ```

use super::{create_suite, IdentityKey, SuiteId};
use base64::Engine;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Magic bytes for identity key files
pub const KEY_FILE_MAGIC: &[u8; 4] = b"DACK";

/// Current key file format version
pub const KEY_FILE_VERSION: u8 = 1;

/// Private key size for every supported suite
pub const KEY_FILE_PRIVATE_LEN: usize = 32;

/// Fixed part: magic, version, suite, timestamp, private key, public length
const HEADER_LEN: usize = 4 + 1 + 1 + 8 + KEY_FILE_PRIVATE_LEN + 1;

/// Checksum size
const CHECKSUM_LEN: usize = 4;

/// Error type for key file operations
#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes (not a dac identity key file)")]
    InvalidMagic,

    #[error("Unsupported key file version: expected {expected}, got {got}")]
    UnsupportedVersion { expected: u8, got: u8 },

    #[error("Unknown suite: {0}")]
    UnknownSuite(u8),

    #[error("Checksum mismatch: expected {expected:08x}, got {got:08x}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid key data: {0}")]
    InvalidKeyData(String),

    #[error("File too small: expected {expected} bytes, got {got}")]
    FileTooSmall { expected: usize, got: usize },
}

/// Identity key file container
pub struct KeyFile {
    suite: SuiteId,
    created_at: u64,
    private_key: Zeroizing<Vec<u8>>,
    public_key: Vec<u8>,
}

impl KeyFile {
    /// Wrap an existing identity
    pub fn from_identity(identity: &dyn IdentityKey) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            suite: identity.suite(),
            created_at,
            private_key: identity.private_key(),
            public_key: identity.public_key(),
        }
    }

    /// Generate a new identity for `suite`
    pub fn generate(suite: SuiteId) -> Result<Self, KeyFileError> {
        let identity = create_suite(suite)
            .generate_identity()
            .map_err(|e| KeyFileError::InvalidKeyData(e.to_string()))?;
        Ok(Self::from_identity(identity.as_ref()))
    }

    pub fn suite(&self) -> SuiteId {
        self.suite
    }

    /// Creation timestamp (Unix seconds)
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Load the identity, checking the stored public key matches
    pub fn to_identity(&self) -> Result<Box<dyn IdentityKey>, KeyFileError> {
        let identity = create_suite(self.suite)
            .load_identity(&self.private_key)
            .map_err(|e| KeyFileError::InvalidKeyData(e.to_string()))?;

        if identity.public_key() != self.public_key {
            return Err(KeyFileError::InvalidKeyData(
                "public key does not match private key".to_string(),
            ));
        }
        Ok(identity)
    }

    fn calculate_checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Serialize key file to bytes
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut buf = Zeroizing::new(Vec::with_capacity(
            HEADER_LEN + self.public_key.len() + CHECKSUM_LEN,
        ));

        buf.extend_from_slice(KEY_FILE_MAGIC);
        buf.push(KEY_FILE_VERSION);
        buf.push(self.suite.to_u8());
        buf.extend_from_slice(&self.created_at.to_le_bytes());
        buf.extend_from_slice(&self.private_key);
        buf.push(self.public_key.len() as u8);
        buf.extend_from_slice(&self.public_key);

        let checksum = Self::calculate_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Deserialize key file from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, KeyFileError> {
        if data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(KeyFileError::FileTooSmall {
                expected: HEADER_LEN + CHECKSUM_LEN,
                got: data.len(),
            });
        }

        if &data[0..4] != KEY_FILE_MAGIC {
            return Err(KeyFileError::InvalidMagic);
        }

        let version = data[4];
        if version != KEY_FILE_VERSION {
            return Err(KeyFileError::UnsupportedVersion {
                expected: KEY_FILE_VERSION,
                got: version,
            });
        }

        let suite = SuiteId::from_u8(data[5]).ok_or(KeyFileError::UnknownSuite(data[5]))?;

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&data[6..14]);
        let created_at = u64::from_le_bytes(ts);

        let private_key = Zeroizing::new(data[14..14 + KEY_FILE_PRIVATE_LEN].to_vec());

        let public_len = data[HEADER_LEN - 1] as usize;
        let total = HEADER_LEN + public_len + CHECKSUM_LEN;
        if data.len() < total {
            return Err(KeyFileError::FileTooSmall {
                expected: total,
                got: data.len(),
            });
        }
        let public_key = data[HEADER_LEN..HEADER_LEN + public_len].to_vec();

        let body_len = HEADER_LEN + public_len;
        let mut stored = [0u8; CHECKSUM_LEN];
        stored.copy_from_slice(&data[body_len..total]);
        let stored_checksum = u32::from_le_bytes(stored);
        let calculated_checksum = Self::calculate_checksum(&data[..body_len]);

        if stored_checksum != calculated_checksum {
            return Err(KeyFileError::ChecksumMismatch {
                expected: stored_checksum,
                got: calculated_checksum,
            });
        }

        Ok(Self {
            suite,
            created_at,
            private_key,
            public_key,
        })
    }

    /// Write key file to path
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), KeyFileError> {
        let bytes = self.to_bytes();
        let mut file = File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Read key file from path
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyFileError> {
        let mut file = File::open(path)?;
        let mut data = Zeroizing::new(Vec::new());
        file.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Public key as base64, the form used in `[trust] allowed_keys`
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.public_key)
    }
}

impl fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFile")
            .field("suite", &self.suite)
            .field("created_at", &self.created_at)
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Information about a key file (without exposing private key)
#[derive(Debug, Clone)]
pub struct KeyFileInfo {
    pub suite: SuiteId,
    /// Creation timestamp (Unix seconds)
    pub created_at: u64,
    pub public_key_base64: String,
    pub public_key_hex: String,
}

impl KeyFileInfo {
    pub fn from_keyfile(keyfile: &KeyFile) -> Self {
        Self {
            suite: keyfile.suite,
            created_at: keyfile.created_at,
            public_key_base64: keyfile.public_key_base64(),
            public_key_hex: hex::encode(&keyfile.public_key),
        }
    }
}
