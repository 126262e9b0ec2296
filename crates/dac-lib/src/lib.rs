//! # dac-lib
//!
//! Mutually authenticated sessions for the dac access gateway.
//!
//! ## Features
//!
//! - Four-message handshake with pluggable primitive suites
//! - AES-256-CBC + HMAC-SHA256 framing with per-direction counters
//! - Pluggable peer verification (allow-list, closure, accept-any)
//! - Policy enforcement and information point glue
//! - Thread-per-connection TCP gateway
//!
//! ## Example
//!
//! ```no_run
//! use dac_lib::{AllowList, Session};
//! use std::net::TcpStream;
//! use std::sync::Arc;
//!
//! # fn main() -> dac_lib::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:9998").map_err(dac_lib::TransportError::from_io)?;
//! let trusted = AllowList::from_keys(vec![vec![0u8; 32]]);
//! let mut session = Session::init_client(stream, Arc::new(trusted));
//! session.authenticate()?;
//! session.send(b"ACTUATOR:door:unlock")?;
//! let reply = session.receive()?;
//! session.release();
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod gateway;
pub mod handshake;
pub mod pep;
pub mod pip;
pub mod registry;
pub mod session;
pub mod verify;

pub use channel::SecureChannel;
pub use gateway::{request_access, GatewayServer, SessionSettings, ShutdownHandle};
pub use handshake::AuthStage;
pub use pep::{Decision, PepCallback, PolicyEnforcementPoint, Resolver};
pub use pip::{Attribute, AttributeProvider, PolicyInformationPoint};
pub use registry::{CallbackTable, RegistryError};
pub use session::{Limits, Role, Session, SessionBuilder, SessionStatus};
pub use verify::{AcceptAnyPeer, AllowList, PeerVerifier};

pub use dac_protocol::{CancelToken, DacError, Result, Timeouts, Transport, TransportError};
