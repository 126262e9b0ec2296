//! Gateway client: one authenticated request per connection.

use super::SessionSettings;
use crate::pep::Decision;
use crate::session::Role;
use dac_protocol::{DacError, ProtocolError, Result, TransportError};
use log::debug;
use std::net::{SocketAddr, TcpStream};

/// Connect, authenticate, send `request` and return the gateway's decision
pub fn request_access(
    addr: SocketAddr,
    request: &str,
    settings: &SessionSettings,
) -> Result<Decision> {
    let stream = match settings.timeouts.write {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
        None => TcpStream::connect(addr),
    }
    .map_err(TransportError::from_io)?;
    settings
        .timeouts
        .apply(&stream)
        .map_err(TransportError::from_io)?;
    debug!("Connected to {}", addr);

    let mut session = settings.builder(Role::Client).build(stream);
    let result = session.authenticate().and_then(|_| {
        session.send(request.as_bytes())?;
        let reply = session.receive()?;
        let reply = String::from_utf8_lossy(&reply);
        Decision::parse(&reply).ok_or_else(|| {
            DacError::from(ProtocolError::UnexpectedMessage(format!(
                "unknown decision '{}'",
                reply
            )))
        })
    });
    session.release();
    result
}
