//! # Handshake Messages
//!
//! Four messages, each an ordered sequence of length-prefixed fields
//! (see [`crate::wire`]):
//!
//! ```text
//! client                                                      server
//!   │ ClientHello     params[version, suite] ‖ e ‖ Vc            │
//!   │ ───────────────────────────────────────────────────────▶   │
//!   │ ServerHello     f ‖ s ‖ Ks ‖ Vs                            │
//!   │ ◀───────────────────────────────────────────────────────   │
//!   │ ClientAuth      Kc ‖ sc                                    │
//!   │ ───────────────────────────────────────────────────────▶   │
//!   │ ServerFinished  confirm                                    │
//!   │ ◀───────────────────────────────────────────────────────   │
//! ```
//!
//! - `e`, `f`: ephemeral key-agreement public values
//! - `Vc`, `Vs`: per-run identity nonces
//! - `Ks`, `Kc`: long-term identity public keys
//! - `s = sign_s(H)`, `sc = sign_c(Hc)`: transcript signatures
//! - `confirm`: HMAC over both transcripts under the server-to-client
//!   integrity key
//!
//! Decoding only checks shape (field count, nonce and tag sizes, global
//! field limit). Exact key and signature sizes depend on the suite and are
//! checked by the state machine.

use crate::constants::{CONFIRMATION_LEN, MAX_FIELD_LEN, NONCE_LEN, PROTOCOL_VERSION};
use crate::error::Result;
use crate::wire::{expect_len, put_field, FieldSource};

/// Identity nonce (`Vc` / `Vs`)
pub type Nonce = [u8; NONCE_LEN];

fn nonce_from(field: &[u8]) -> Result<Nonce> {
    expect_len(field, NONCE_LEN)?;
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(field);
    Ok(nonce)
}

// ═══════════════════════════════════════════════════════════════════════════
// CLIENT HELLO
// ═══════════════════════════════════════════════════════════════════════════

/// First message: client parameters, ephemeral value and nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Protocol version
    pub version: u8,
    /// Suite id (fixes the key-agreement group and signature scheme)
    pub suite: u8,
    /// Client ephemeral public value `e`
    pub ephemeral: Vec<u8>,
    /// Client nonce `Vc`
    pub nonce: Nonce,
}

impl ClientHello {
    pub fn new(suite: u8, ephemeral: Vec<u8>, nonce: Nonce) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            suite,
            ephemeral,
            nonce,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        put_field(&mut buf, &[self.version, self.suite])?;
        put_field(&mut buf, &self.ephemeral)?;
        put_field(&mut buf, &self.nonce)?;
        Ok(buf)
    }

    pub fn decode<S: FieldSource>(src: &mut S) -> Result<Self> {
        let params = src.next_field(MAX_FIELD_LEN)?;
        expect_len(&params, 2)?;
        let ephemeral = src.next_field(MAX_FIELD_LEN)?;
        let nonce = nonce_from(&src.next_field(MAX_FIELD_LEN)?)?;
        Ok(Self {
            version: params[0],
            suite: params[1],
            ephemeral,
            nonce,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SERVER HELLO
// ═══════════════════════════════════════════════════════════════════════════

/// Second message: server ephemeral value, signature over `H`, identity and nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// Server ephemeral public value `f`
    pub ephemeral: Vec<u8>,
    /// `sign_s(H)`
    pub signature: Vec<u8>,
    /// Server identity public key `Ks`
    pub identity: Vec<u8>,
    /// Server nonce `Vs`
    pub nonce: Nonce,
}

impl ServerHello {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        put_field(&mut buf, &self.ephemeral)?;
        put_field(&mut buf, &self.signature)?;
        put_field(&mut buf, &self.identity)?;
        put_field(&mut buf, &self.nonce)?;
        Ok(buf)
    }

    pub fn decode<S: FieldSource>(src: &mut S) -> Result<Self> {
        let ephemeral = src.next_field(MAX_FIELD_LEN)?;
        let signature = src.next_field(MAX_FIELD_LEN)?;
        let identity = src.next_field(MAX_FIELD_LEN)?;
        let nonce = nonce_from(&src.next_field(MAX_FIELD_LEN)?)?;
        Ok(Self {
            ephemeral,
            signature,
            identity,
            nonce,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CLIENT AUTH
// ═══════════════════════════════════════════════════════════════════════════

/// Third message: client identity and signature over `Hc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAuth {
    /// Client identity public key `Kc`
    pub identity: Vec<u8>,
    /// `sign_c(Hc)`
    pub signature: Vec<u8>,
}

impl ClientAuth {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        put_field(&mut buf, &self.identity)?;
        put_field(&mut buf, &self.signature)?;
        Ok(buf)
    }

    pub fn decode<S: FieldSource>(src: &mut S) -> Result<Self> {
        let identity = src.next_field(MAX_FIELD_LEN)?;
        let signature = src.next_field(MAX_FIELD_LEN)?;
        Ok(Self {
            identity,
            signature,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SERVER FINISHED
// ═══════════════════════════════════════════════════════════════════════════

/// Fourth message: server key confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFinished {
    pub confirm: [u8; CONFIRMATION_LEN],
}

impl ServerFinished {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        put_field(&mut buf, &self.confirm)?;
        Ok(buf)
    }

    pub fn decode<S: FieldSource>(src: &mut S) -> Result<Self> {
        let field = src.next_field(CONFIRMATION_LEN)?;
        expect_len(&field, CONFIRMATION_LEN)?;
        let mut confirm = [0u8; CONFIRMATION_LEN];
        confirm.copy_from_slice(&field);
        Ok(Self { confirm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DacError, ProtocolError};
    use crate::wire::FieldCursor;

    #[test]
    fn test_client_hello_layout() {
        let hello = ClientHello::new(1, vec![0xAA; 32], *b"client-000000000");
        let bytes = hello.to_bytes().unwrap();

        // params field
        assert_eq!(&bytes[0..4], &[0, 2, PROTOCOL_VERSION, 1]);
        // e field header
        assert_eq!(&bytes[4..6], &[0, 32]);
        // Vc is last
        assert_eq!(&bytes[bytes.len() - 16..], b"client-000000000");
        assert_eq!(bytes.len(), 4 + 34 + 18);

        let decoded = ClientHello::decode(&mut FieldCursor::new(&bytes)).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn test_server_hello_field_order() {
        let hello = ServerHello {
            ephemeral: vec![1; 32],
            signature: vec![2; 64],
            identity: vec![3; 32],
            nonce: *b"server-000000000",
        };
        let bytes = hello.to_bytes().unwrap();
        assert_eq!(&bytes[0..2], &[0, 32]);
        assert_eq!(bytes[2], 1);
        assert_eq!(&bytes[34..36], &[0, 64]);
        assert_eq!(&bytes[100..102], &[0, 32]);

        let decoded = ServerHello::decode(&mut FieldCursor::new(&bytes)).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn test_short_nonce_rejected() {
        let mut bytes = Vec::new();
        put_field(&mut bytes, &[PROTOCOL_VERSION, 1]).unwrap();
        put_field(&mut bytes, &[0; 32]).unwrap();
        put_field(&mut bytes, &[0; 8]).unwrap();

        let err = ClientHello::decode(&mut FieldCursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            DacError::Protocol(ProtocolError::InvalidFieldLength { expected: 16, got: 8 })
        ));
    }

    #[test]
    fn test_oversize_signature_rejected() {
        let mut bytes = Vec::new();
        put_field(&mut bytes, &[0; 32]).unwrap();
        bytes.extend_from_slice(&[0x40, 0x00]);

        let err = ServerHello::decode(&mut FieldCursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, DacError::Protocol(ProtocolError::FieldTooLarge { .. })));
    }

    #[test]
    fn test_server_finished_exact_size() {
        let finished = ServerFinished { confirm: [9; 32] };
        let bytes = finished.to_bytes().unwrap();
        assert_eq!(bytes.len(), 34);
        assert_eq!(
            ServerFinished::decode(&mut FieldCursor::new(&bytes)).unwrap(),
            finished
        );

        let mut short = Vec::new();
        put_field(&mut short, &[9; 31]).unwrap();
        assert!(ServerFinished::decode(&mut FieldCursor::new(&short)).is_err());
    }
}
