//! # AES-256-CBC Stream
//!
//! One encryptor and one decryptor per direction. The CBC state is kept
//! across frames: the IV of each frame is the last ciphertext block of the
//! frame before it, starting from the IV in the key schedule.
//!
//! Callers pad to the block size themselves; the cipher never pads.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use dac_protocol::{CryptoError, Result, BLOCK_LEN};
use std::fmt;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Chained AES-256-CBC encryptor
pub struct CbcEncryptor {
    inner: Aes256CbcEnc,
}

impl CbcEncryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let inner = Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Encrypt a block-aligned buffer in place, continuing the chain
    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::NotBlockAligned.into());
        }
        for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
            self.inner.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        Ok(())
    }
}

impl fmt::Debug for CbcEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcEncryptor").finish_non_exhaustive()
    }
}

/// Chained AES-256-CBC decryptor
pub struct CbcDecryptor {
    inner: Aes256CbcDec,
}

impl CbcDecryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let inner = Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Decrypt a block-aligned buffer in place, continuing the chain
    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::NotBlockAligned.into());
        }
        for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
            self.inner.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        Ok(())
    }
}

impl fmt::Debug for CbcDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CbcDecryptor").finish_non_exhaustive()
    }
}
