//! # Transcripts and Key Schedule
//!
//! Both transcripts bind the two nonces, one identity key, both ephemeral
//! values and the shared secret, always in the same order:
//!
//! ```text
//! H  = SHA256(Vc || Vs || Ks || e || f || K)
//! Hc = SHA256(Vc || Vs || Kc || e || f || K)
//! ```
//!
//! Six directional keys are derived from `K` and `H`:
//!
//! ```text
//! key(tag) = SHA256(K || H || tag)
//!
//!   A  IV              client → server
//!   B  IV              server → client
//!   C  encryption key  client → server
//!   D  encryption key  server → client
//!   E  integrity key   client → server
//!   F  integrity key   server → client
//! ```
//!
//! Only the first 16 bytes of an IV key are used by AES-CBC.

use super::mac::hmac_sha256;
use super::util::constant_time_compare;
use dac_protocol::{
    Result, BLOCK_LEN, CONFIRMATION_LEN, DERIVED_KEY_LEN, TAG_ENC_CLIENT, TAG_ENC_SERVER,
    TAG_IV_CLIENT, TAG_IV_SERVER, TAG_MAC_CLIENT, TAG_MAC_SERVER, TRANSCRIPT_LEN,
};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Label mixed into the server key confirmation
const CONFIRMATION_LABEL: &[u8] = b"dac server finished";

/// Inputs to one transcript hash
#[derive(Clone, Copy)]
pub struct TranscriptInput<'a> {
    pub client_nonce: &'a [u8],
    pub server_nonce: &'a [u8],
    /// Identity key of the signer (`Ks` for `H`, `Kc` for `Hc`)
    pub identity: &'a [u8],
    pub client_ephemeral: &'a [u8],
    pub server_ephemeral: &'a [u8],
    pub shared_secret: &'a [u8],
}

/// Hash a transcript
pub fn transcript_hash(input: &TranscriptInput<'_>) -> [u8; TRANSCRIPT_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(input.client_nonce);
    hasher.update(input.server_nonce);
    hasher.update(input.identity);
    hasher.update(input.client_ephemeral);
    hasher.update(input.server_ephemeral);
    hasher.update(input.shared_secret);
    hasher.finalize().into()
}

fn derive_key(k: &[u8], h: &[u8], tag: u8) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(k);
    hasher.update(h);
    hasher.update([tag]);
    Zeroizing::new(hasher.finalize().into())
}

// ═══════════════════════════════════════════════════════════════════════════
// KEY SCHEDULE
// ═══════════════════════════════════════════════════════════════════════════

/// Traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ServerToClient,
    ClientToServer,
}

/// Keys protecting one direction
#[derive(Clone, Copy)]
pub struct DirectionKeys<'a> {
    /// First block of the IV key
    pub iv: &'a [u8],
    pub encryption: &'a [u8; DERIVED_KEY_LEN],
    pub integrity: &'a [u8; DERIVED_KEY_LEN],
}

/// The six session keys
///
/// Zeroed on drop. Compared in constant time.
pub struct KeySchedule {
    iv_client: Zeroizing<[u8; DERIVED_KEY_LEN]>,
    iv_server: Zeroizing<[u8; DERIVED_KEY_LEN]>,
    enc_client: Zeroizing<[u8; DERIVED_KEY_LEN]>,
    enc_server: Zeroizing<[u8; DERIVED_KEY_LEN]>,
    mac_client: Zeroizing<[u8; DERIVED_KEY_LEN]>,
    mac_server: Zeroizing<[u8; DERIVED_KEY_LEN]>,
}

impl KeySchedule {
    /// Derive from the shared secret and the server transcript
    pub fn derive(k: &[u8], h: &[u8; TRANSCRIPT_LEN]) -> Self {
        Self {
            iv_client: derive_key(k, h, TAG_IV_CLIENT),
            iv_server: derive_key(k, h, TAG_IV_SERVER),
            enc_client: derive_key(k, h, TAG_ENC_CLIENT),
            enc_server: derive_key(k, h, TAG_ENC_SERVER),
            mac_client: derive_key(k, h, TAG_MAC_CLIENT),
            mac_server: derive_key(k, h, TAG_MAC_SERVER),
        }
    }

    /// Keys for one direction
    pub fn direction(&self, direction: Direction) -> DirectionKeys<'_> {
        let (iv, encryption, integrity) = match direction {
            Direction::ServerToClient => (&*self.iv_server, &*self.enc_server, &*self.mac_server),
            Direction::ClientToServer => (&*self.iv_client, &*self.enc_client, &*self.mac_client),
        };
        DirectionKeys {
            iv: &iv[..BLOCK_LEN],
            encryption,
            integrity,
        }
    }

    /// All six keys in tag order (A..F)
    pub fn keys(&self) -> [&[u8; DERIVED_KEY_LEN]; 6] {
        [
            &*self.iv_client,
            &*self.iv_server,
            &*self.enc_client,
            &*self.enc_server,
            &*self.mac_client,
            &*self.mac_server,
        ]
    }
}

impl PartialEq for KeySchedule {
    fn eq(&self, other: &Self) -> bool {
        self.keys()
            .iter()
            .zip(other.keys().iter())
            .fold(true, |acc, (a, b)| constant_time_compare(&a[..], &b[..]) & acc)
    }
}

impl Eq for KeySchedule {}

impl fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySchedule").finish_non_exhaustive()
    }
}

/// Server key confirmation over both transcripts
pub fn confirmation_tag(
    schedule: &KeySchedule,
    h: &[u8; TRANSCRIPT_LEN],
    hc: &[u8; TRANSCRIPT_LEN],
) -> Result<[u8; CONFIRMATION_LEN]> {
    let keys = schedule.direction(Direction::ServerToClient);
    hmac_sha256(keys.integrity, &[CONFIRMATION_LABEL, &h[..], &hc[..]])
}
