//! # Field Codec
//!
//! Handshake messages are ordered sequences of length-prefixed fields:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (u16 BE)  │ Bytes (Length)           │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! Readers reject a declared length above their limit before allocating
//! or reading the body.

use crate::constants::FIELD_HEADER_LEN;
use crate::error::{ProtocolError, Result};
use crate::transport::Transport;

/// Append one length-prefixed field
pub fn put_field(buf: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let len = u16::try_from(data.len()).map_err(|_| ProtocolError::FieldTooLarge {
        max: u16::MAX as usize,
        got: data.len(),
    })?;
    buf.reserve(FIELD_HEADER_LEN + data.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(())
}

/// Check a decoded field has exactly the expected size
pub fn expect_len(field: &[u8], expected: usize) -> Result<()> {
    if field.len() != expected {
        return Err(ProtocolError::InvalidFieldLength {
            expected,
            got: field.len(),
        }
        .into());
    }
    Ok(())
}

/// Anything handshake fields can be pulled from
pub trait FieldSource {
    /// Next field, refusing bodies longer than `max`
    fn next_field(&mut self, max: usize) -> Result<Vec<u8>>;
}

/// Fields from an in-memory buffer
#[cfg(test)]
#[derive(Debug)]
pub struct FieldCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

#[cfg(test)]
impl<'a> FieldCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

#[cfg(test)]
impl FieldSource for FieldCursor<'_> {
    fn next_field(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.remaining() < FIELD_HEADER_LEN {
            return Err(ProtocolError::UnexpectedMessage("truncated field header".into()).into());
        }
        let len = u16::from_be_bytes([self.data[self.offset], self.data[self.offset + 1]]) as usize;
        self.offset += FIELD_HEADER_LEN;

        if len > max {
            return Err(ProtocolError::FieldTooLarge { max, got: len }.into());
        }
        if self.remaining() < len {
            return Err(ProtocolError::UnexpectedMessage("truncated field body".into()).into());
        }

        let field = self.data[self.offset..self.offset + len].to_vec();
        self.offset += len;
        Ok(field)
    }
}

/// Fields read straight off a transport
pub struct TransportFields<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> TransportFields<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }
}

impl<T: Transport + ?Sized> FieldSource for TransportFields<'_, T> {
    fn next_field(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut header = [0u8; FIELD_HEADER_LEN];
        self.transport.recv_exact(&mut header)?;
        let len = u16::from_be_bytes(header) as usize;

        if len > max {
            return Err(ProtocolError::FieldTooLarge { max, got: len }.into());
        }

        let mut field = vec![0u8; len];
        self.transport.recv_exact(&mut field)?;
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DacError;

    #[test]
    fn test_field_layout() {
        let mut buf = Vec::new();
        put_field(&mut buf, b"abc").unwrap();
        put_field(&mut buf, b"").unwrap();
        assert_eq!(buf, vec![0, 3, b'a', b'b', b'c', 0, 0]);

        let mut cursor = FieldCursor::new(&buf);
        assert_eq!(cursor.next_field(16).unwrap(), b"abc");
        assert!(cursor.next_field(16).unwrap().is_empty());
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_oversize_rejected_before_body() {
        // Declares 0xFFFF bytes but carries none
        let buf = [0xFF, 0xFF];
        let mut cursor = FieldCursor::new(&buf);
        let err = cursor.next_field(512).unwrap_err();
        assert!(matches!(
            err,
            DacError::Protocol(ProtocolError::FieldTooLarge { max: 512, got: 65535 })
        ));
    }

    #[test]
    fn test_oversize_rejected_on_transport() {
        let mut pipe = std::io::Cursor::new(vec![0x10, 0x00]);
        let mut fields = TransportFields::new(&mut pipe);
        assert!(matches!(
            fields.next_field(64),
            Err(DacError::Protocol(ProtocolError::FieldTooLarge { .. }))
        ));
    }

    #[test]
    fn test_truncated() {
        let buf = [0, 4, 1, 2];
        let mut cursor = FieldCursor::new(&buf);
        assert!(cursor.next_field(16).is_err());
    }

    #[test]
    fn test_expect_len() {
        assert!(expect_len(&[0u8; 16], 16).is_ok());
        assert!(matches!(
            expect_len(&[0u8; 15], 16),
            Err(DacError::Protocol(ProtocolError::InvalidFieldLength { expected: 16, got: 15 }))
        ));
    }
}
