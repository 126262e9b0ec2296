//! # Constants
//!
//! Shared constants for the dac handshake and secure framing.

// ═══════════════════════════════════════════════════════════════════════════
// PROTOCOL VERSION
// ═══════════════════════════════════════════════════════════════════════════

/// Current protocol version, sent in the first field of `ClientHello`
///
/// Version 1 carries:
/// - Suite negotiation by id (curve25519 or p256)
/// - 32-bit per-direction packet counters
/// - Server key confirmation after `ClientAuth`
pub const PROTOCOL_VERSION: u8 = 1;

// ═══════════════════════════════════════════════════════════════════════════
// HANDSHAKE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════

/// Identity nonce size (`Vc`, `Vs`) in bytes
pub const NONCE_LEN: usize = 16;

/// Transcript hash size (`H`, `Hc`) in bytes
pub const TRANSCRIPT_LEN: usize = 32;

/// Key confirmation tag size in bytes
pub const CONFIRMATION_LEN: usize = 32;

/// Size of the length prefix in front of every handshake field
pub const FIELD_HEADER_LEN: usize = 2;

/// Largest field any supported suite puts on the wire
///
/// Handshake fields announcing more than this are rejected before the
/// body is read.
pub const MAX_FIELD_LEN: usize = 512;

// ═══════════════════════════════════════════════════════════════════════════
// KEY SCHEDULE
// ═══════════════════════════════════════════════════════════════════════════

/// Size of every derived key in bytes
pub const DERIVED_KEY_LEN: usize = 32;

/// IV, client to server
pub const TAG_IV_CLIENT: u8 = b'A';
/// IV, server to client
pub const TAG_IV_SERVER: u8 = b'B';
/// Encryption key, client to server
pub const TAG_ENC_CLIENT: u8 = b'C';
/// Encryption key, server to client
pub const TAG_ENC_SERVER: u8 = b'D';
/// Integrity key, client to server
pub const TAG_MAC_CLIENT: u8 = b'E';
/// Integrity key, server to client
pub const TAG_MAC_SERVER: u8 = b'F';

// ═══════════════════════════════════════════════════════════════════════════
// FRAMING CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════

/// AES block size in bytes
pub const BLOCK_LEN: usize = 16;

/// HMAC-SHA256 tag size in bytes
pub const MAC_LEN: usize = 32;

/// Frame length prefix size in bytes
pub const FRAME_HEADER_LEN: usize = 2;

/// Inner payload length prefix size in bytes
pub const PAYLOAD_HEADER_LEN: usize = 2;

/// Smallest valid frame body (one cipher block + MAC)
pub const MIN_FRAME_LEN: usize = BLOCK_LEN + MAC_LEN;

/// Largest frame body expressible in the 16-bit length prefix
pub const MAX_FRAME_LEN: usize = 65_535;

/// Default frame body limit
pub const DEFAULT_MAX_FRAME_LEN: usize = 16_384;

/// Largest payload that fits a maximum-size frame
///
/// 65535 - 32 (MAC) rounded down to a block multiple is 65488 bytes of
/// ciphertext, minus the 2-byte inner length.
pub const MAX_PAYLOAD_LEN: usize =
    (MAX_FRAME_LEN - MAC_LEN) / BLOCK_LEN * BLOCK_LEN - PAYLOAD_HEADER_LEN;

// ═══════════════════════════════════════════════════════════════════════════
// COUNTERS
// ═══════════════════════════════════════════════════════════════════════════

/// First counter value after a handshake
pub const COUNTER_START: u32 = 1;

/// Default number of frames per direction before a new handshake is required
pub const DEFAULT_MAX_FRAMES_PER_KEY: u64 = u32::MAX as u64;
