//! # Secure Channel
//!
//! Authenticated encryption of application frames after the handshake.
//!
//! ```text
//! ┌────────────┬───────────────────────────────────────────────┬──────────┐
//! │ Len (u16)  │ AES-256-CBC(PayloadLen u16 ‖ Payload ‖ Pad)   │ HMAC(32) │
//! └────────────┴───────────────────────────────────────────────┴──────────┘
//!
//! Len  = ciphertext length + 32
//! HMAC = HMAC-SHA256(integrity key, counter u32 BE ‖ Len ‖ ciphertext)
//! ```
//!
//! Padding is random and brings the plaintext to the next block boundary.
//! The CBC chain continues from frame to frame in each direction.
//!
//! Receiving checks the length prefix before allocating, verifies the MAC
//! before decrypting and checks the inner payload length against the
//! ciphertext size. Any failure is fatal to the channel.

use crate::session::{Limits, Role};
use dac_core::crypto::{
    fill_random, hmac_sha256, verify_hmac_sha256, CbcDecryptor, CbcEncryptor, KeySchedule,
};
use dac_protocol::{
    AuthFailure, PacketCounter, ProtocolError, Result, Transport, BLOCK_LEN, DERIVED_KEY_LEN,
    FRAME_HEADER_LEN, MAC_LEN, MIN_FRAME_LEN, PAYLOAD_HEADER_LEN,
};
use log::trace;
use std::fmt;
use zeroize::Zeroizing;

/// Round up to a whole number of cipher blocks
fn padded_len(payload_len: usize) -> usize {
    (PAYLOAD_HEADER_LEN + payload_len + BLOCK_LEN - 1) / BLOCK_LEN * BLOCK_LEN
}

/// Largest payload that fits a frame of `max_frame_len` bytes
pub fn max_payload_len(max_frame_len: usize) -> usize {
    let ciphertext = max_frame_len.saturating_sub(MAC_LEN) / BLOCK_LEN * BLOCK_LEN;
    ciphertext.saturating_sub(PAYLOAD_HEADER_LEN)
}

/// Frame protection for both directions of one session
pub struct SecureChannel {
    encryptor: CbcEncryptor,
    decryptor: CbcDecryptor,
    send_mac: Zeroizing<[u8; DERIVED_KEY_LEN]>,
    recv_mac: Zeroizing<[u8; DERIVED_KEY_LEN]>,
    send_counter: PacketCounter,
    recv_counter: PacketCounter,
    max_frame_len: usize,
}

impl SecureChannel {
    /// Set up both directions from a fresh key schedule
    pub fn new(schedule: &KeySchedule, role: Role, limits: &Limits) -> Result<Self> {
        let outbound = schedule.direction(role.outbound());
        let inbound = schedule.direction(role.inbound());

        Ok(Self {
            encryptor: CbcEncryptor::new(outbound.encryption, outbound.iv)?,
            decryptor: CbcDecryptor::new(inbound.encryption, inbound.iv)?,
            send_mac: Zeroizing::new(*outbound.integrity),
            recv_mac: Zeroizing::new(*inbound.integrity),
            send_counter: PacketCounter::new(limits.max_frames_per_key),
            recv_counter: PacketCounter::new(limits.max_frames_per_key),
            max_frame_len: limits.max_frame_len,
        })
    }

    /// Protect one payload, returning the wire frame
    pub fn seal(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let counter = self.send_counter.current()?;

        let max = max_payload_len(self.max_frame_len);
        if payload.len() > max {
            return Err(ProtocolError::PayloadTooLarge {
                max,
                got: payload.len(),
            }
            .into());
        }

        let ct_len = padded_len(payload.len());
        let frame_len = ct_len + MAC_LEN;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + frame_len);
        frame.extend_from_slice(&(frame_len as u16).to_be_bytes());
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        frame.extend_from_slice(payload);
        let pad_start = frame.len();
        frame.resize(FRAME_HEADER_LEN + ct_len, 0);
        fill_random(&mut frame[pad_start..]);

        self.encryptor
            .encrypt_in_place(&mut frame[FRAME_HEADER_LEN..])?;

        let mac = hmac_sha256(
            &self.send_mac[..],
            &[&counter.to_be_bytes(), &frame[..FRAME_HEADER_LEN], &frame[FRAME_HEADER_LEN..]],
        )?;
        frame.extend_from_slice(&mac);

        self.send_counter.advance()?;
        trace!("Sealed frame #{} ({} payload bytes)", counter, payload.len());
        Ok(frame)
    }

    /// Seal and write one payload
    pub fn send<T: Transport + ?Sized>(&mut self, transport: &mut T, payload: &[u8]) -> Result<()> {
        let frame = self.seal(payload)?;
        transport.send_all(&frame)?;
        Ok(())
    }

    /// Read, verify and decrypt one frame
    pub fn receive<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Vec<u8>> {
        let counter = self.recv_counter.current()?;

        let mut header = [0u8; FRAME_HEADER_LEN];
        transport.recv_exact(&mut header)?;
        let frame_len = u16::from_be_bytes(header) as usize;
        self.check_frame_len(frame_len)?;

        let mut body = vec![0u8; frame_len];
        transport.recv_exact(&mut body)?;
        let (ciphertext, mac) = body.split_at(frame_len - MAC_LEN);

        let valid = verify_hmac_sha256(
            &self.recv_mac[..],
            &[&counter.to_be_bytes(), &header, ciphertext],
            mac,
        )?;
        if !valid {
            return Err(AuthFailure::MacMismatch.into());
        }

        let mut plaintext = Zeroizing::new(ciphertext.to_vec());
        self.decryptor.decrypt_in_place(&mut plaintext)?;

        let payload_len = u16::from_be_bytes([plaintext[0], plaintext[1]]) as usize;
        if padded_len(payload_len) != plaintext.len() {
            return Err(ProtocolError::CorruptedFrame(format!(
                "payload length {} does not match {} ciphertext bytes",
                payload_len,
                plaintext.len()
            ))
            .into());
        }

        self.recv_counter.advance()?;
        trace!("Opened frame #{} ({} payload bytes)", counter, payload_len);
        Ok(plaintext[PAYLOAD_HEADER_LEN..PAYLOAD_HEADER_LEN + payload_len].to_vec())
    }

    fn check_frame_len(&self, frame_len: usize) -> Result<()> {
        if frame_len < MIN_FRAME_LEN {
            return Err(ProtocolError::FrameTooSmall {
                min: MIN_FRAME_LEN,
                got: frame_len,
            }
            .into());
        }
        if frame_len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                max: self.max_frame_len,
                got: frame_len,
            }
            .into());
        }
        if (frame_len - MAC_LEN) % BLOCK_LEN != 0 {
            return Err(ProtocolError::CorruptedFrame(format!(
                "ciphertext length {} is not block aligned",
                frame_len - MAC_LEN
            ))
            .into());
        }
        Ok(())
    }

    /// Frames sent under the current keys
    pub fn frames_sent(&self) -> u64 {
        self.send_counter.used()
    }

    /// Frames received under the current keys
    pub fn frames_received(&self) -> u64 {
        self.recv_counter.used()
    }
}

impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("send_counter", &self.send_counter)
            .field("recv_counter", &self.recv_counter)
            .field("max_frame_len", &self.max_frame_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dac_protocol::{DacError, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};

    fn pair(limits: Limits) -> (SecureChannel, SecureChannel) {
        let schedule = KeySchedule::derive(&[7u8; 32], &[9u8; 32]);
        let client = SecureChannel::new(&schedule, Role::Client, &limits).unwrap();
        let server = SecureChannel::new(&schedule, Role::Server, &limits).unwrap();
        (client, server)
    }

    #[test]
    fn test_frame_sizes() {
        let (mut client, _) = pair(Limits::default());
        let cases = [(0usize, 50usize), (14, 50), (15, 66), (16, 66), (30, 66), (31, 82)];
        for (payload, wire) in cases {
            let frame = client.seal(&vec![0xAB; payload]).unwrap();
            assert_eq!(frame.len(), wire, "payload {}", payload);
            let declared = u16::from_be_bytes([frame[0], frame[1]]) as usize;
            assert_eq!(declared, wire - FRAME_HEADER_LEN);
        }
    }

    #[test]
    fn test_max_payload_len() {
        assert_eq!(max_payload_len(MAX_FRAME_LEN), MAX_PAYLOAD_LEN);
        assert_eq!(max_payload_len(MIN_FRAME_LEN), BLOCK_LEN - PAYLOAD_HEADER_LEN);
        assert_eq!(max_payload_len(0), 0);
    }

    #[test]
    fn test_both_directions() {
        let (mut client, mut server) = pair(Limits::default());
        let mut wire: Vec<u8> = Vec::new();

        let messages: [&[u8]; 3] = [b"first", b"", &[0x55; 100]];
        for msg in messages {
            wire.extend(client.seal(msg).unwrap());
        }
        let mut cursor = std::io::Cursor::new(wire);
        assert_eq!(server.receive(&mut cursor).unwrap(), b"first");
        assert_eq!(server.receive(&mut cursor).unwrap(), b"");
        assert_eq!(server.receive(&mut cursor).unwrap(), vec![0x55; 100]);

        let reply = server.seal(b"GRANTED").unwrap();
        let mut cursor = std::io::Cursor::new(reply);
        assert_eq!(client.receive(&mut cursor).unwrap(), b"GRANTED");
        assert_eq!(client.frames_received(), 1);
        assert_eq!(server.frames_sent(), 1);
    }

    #[test]
    fn test_own_frames_rejected() {
        // Directions use different keys, so a reflected frame fails its MAC
        let (mut client, _) = pair(Limits::default());
        let frame = client.seal(b"echo").unwrap();
        let mut cursor = std::io::Cursor::new(frame);
        assert!(matches!(
            client.receive(&mut cursor),
            Err(DacError::Authentication(AuthFailure::MacMismatch))
        ));
    }

    #[test]
    fn test_replay_rejected() {
        let (mut client, mut server) = pair(Limits::default());
        let frame = client.seal(b"once").unwrap();
        let mut wire = frame.clone();
        wire.extend_from_slice(&frame);

        let mut cursor = std::io::Cursor::new(wire);
        assert_eq!(server.receive(&mut cursor).unwrap(), b"once");
        assert!(matches!(
            server.receive(&mut cursor),
            Err(DacError::Authentication(AuthFailure::MacMismatch))
        ));
    }

    #[test]
    fn test_bad_length_prefix() {
        let (_, mut server) = pair(Limits::default());

        let mut cursor = std::io::Cursor::new(vec![0x00, 0x10]);
        assert!(matches!(
            server.receive(&mut cursor),
            Err(DacError::Protocol(ProtocolError::FrameTooSmall { .. }))
        ));

        let mut cursor = std::io::Cursor::new(vec![0xFF, 0xFF]);
        assert!(matches!(
            server.receive(&mut cursor),
            Err(DacError::Protocol(ProtocolError::FrameTooLarge { .. }))
        ));

        let mut cursor = std::io::Cursor::new(vec![0x00, 0x31]);
        assert!(matches!(
            server.receive(&mut cursor),
            Err(DacError::Protocol(ProtocolError::CorruptedFrame(_)))
        ));
    }

    #[test]
    fn test_oversized_payload() {
        let limits = Limits {
            max_frame_len: 80,
            ..Limits::default()
        };
        let (mut client, _) = pair(limits);
        assert!(client.seal(&[0u8; 46]).is_ok());
        assert!(matches!(
            client.seal(&[0u8; 47]),
            Err(DacError::Protocol(ProtocolError::PayloadTooLarge { max: 46, got: 47 }))
        ));
    }

    #[test]
    fn test_frame_budget() {
        let limits = Limits {
            max_frames_per_key: 2,
            ..Limits::default()
        };
        let (mut client, _) = pair(limits);
        client.seal(b"1").unwrap();
        client.seal(b"2").unwrap();
        assert!(matches!(client.seal(b"3"), Err(DacError::RekeyRequired)));
    }
}
