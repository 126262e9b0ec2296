//! # Peer Verification
//!
//! The verifier is the trust anchor of the handshake: after the peer's
//! long-term public key arrives, and before its signature is accepted,
//! the session asks the verifier whether that key may connect at all.
//!
//! [`AcceptAnyPeer`] turns this check off. It exists for bring-up and
//! tests and says so loudly in the log every time it is consulted.

use base64::Engine;
use dac_core::constant_time_compare;
use log::warn;

/// Decides whether a peer identity key is trusted
pub trait PeerVerifier: Send + Sync {
    fn is_trusted(&self, public_key: &[u8]) -> bool;
}

impl<F> PeerVerifier for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn is_trusted(&self, public_key: &[u8]) -> bool {
        self(public_key)
    }
}

/// Fixed set of trusted identity keys
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    keys: Vec<Vec<u8>>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Build from base64-encoded keys
    pub fn from_base64<S: AsRef<str>>(encoded: &[S]) -> Result<Self, base64::DecodeError> {
        let keys = encoded
            .iter()
            .map(|s| base64::engine::general_purpose::STANDARD.decode(s.as_ref().trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }

    pub fn add(&mut self, key: impl Into<Vec<u8>>) {
        self.keys.push(key.into());
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl PeerVerifier for AllowList {
    fn is_trusted(&self, public_key: &[u8]) -> bool {
        // Scan every entry so timing does not reveal the position
        self.keys
            .iter()
            .fold(false, |found, key| constant_time_compare(key, public_key) | found)
    }
}

/// Trusts every peer
///
/// DANGEROUS: with this verifier the handshake authenticates nobody. Any
/// party that completes the key exchange is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyPeer;

impl PeerVerifier for AcceptAnyPeer {
    fn is_trusted(&self, public_key: &[u8]) -> bool {
        warn!(
            "Accepting unverified peer identity {} (peer verification is disabled)",
            hex_prefix(public_key)
        );
        true
    }
}

fn hex_prefix(key: &[u8]) -> String {
    key.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        let mut list = AllowList::new();
        assert!(list.is_empty());
        list.add(vec![1u8; 32]);
        list.add(vec![2u8; 32]);

        assert!(list.is_trusted(&[1u8; 32]));
        assert!(list.is_trusted(&[2u8; 32]));
        assert!(!list.is_trusted(&[3u8; 32]));
        assert!(!list.is_trusted(&[1u8; 31]));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_allow_list_from_base64() {
        let list = AllowList::from_base64(&["AQID", " BAUG "]).unwrap();
        assert!(list.is_trusted(&[1, 2, 3]));
        assert!(list.is_trusted(&[4, 5, 6]));
        assert!(AllowList::from_base64(&["***"]).is_err());
    }

    #[test]
    fn test_closure_verifier() {
        let verifier = |key: &[u8]| key.first() == Some(&0xAA);
        assert!(verifier.is_trusted(&[0xAA, 0]));
        assert!(!verifier.is_trusted(&[0xAB]));
    }

    #[test]
    fn test_accept_any() {
        assert!(AcceptAnyPeer.is_trusted(&[0u8; 32]));
    }
}
