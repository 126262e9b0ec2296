//! # HMAC-SHA256
//!
//! Message authentication over a sequence of input parts, so callers can
//! MAC `counter || length || ciphertext` without concatenating.

use dac_protocol::{CryptoError, Result, MAC_LEN};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn keyed(key: &[u8], parts: &[&[u8]]) -> Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac)
}

/// Compute HMAC-SHA256 over the concatenation of `parts`
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; MAC_LEN]> {
    let tag = keyed(key, parts)?.finalize().into_bytes();
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&tag);
    Ok(out)
}

/// Verify a tag in constant time
pub fn verify_hmac_sha256(key: &[u8], parts: &[&[u8]], tag: &[u8]) -> Result<bool> {
    Ok(keyed(key, parts)?.verify_slice(tag).is_ok())
}
