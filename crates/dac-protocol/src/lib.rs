//! # dac-protocol
//!
//! Protocol types and definitions for the dac access gateway.
//!
//! This crate provides:
//! - Protocol constants (version, sizes, key schedule tags)
//! - Error types for all session operations
//! - The transport contract and an in-memory duplex pipe
//! - Handshake message codec
//! - Per-direction packet counters

mod constants;
mod counter;
mod error;
pub mod handshake;
pub mod memory;
pub mod transport;
pub mod wire;

pub use constants::*;
pub use counter::PacketCounter;
pub use error::{AuthFailure, CryptoError, DacError, ProtocolError, Result, TransportError};
pub use handshake::{ClientAuth, ClientHello, Nonce, ServerFinished, ServerHello};
pub use memory::{duplex, MemoryPipe};
pub use transport::{CancelToken, Timeouts, Transport};
