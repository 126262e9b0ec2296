//! End-to-end sessions over in-memory pipes, client and server on two threads.

use dac_core::crypto::{create_suite, IdentityKey, SuiteId};
use dac_lib::{
    AcceptAnyPeer, AllowList, DacError, Role, Session, SessionBuilder, SessionStatus, Transport,
};
use dac_protocol::{duplex, AuthFailure, MemoryPipe, ProtocolError, TransportError};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PIPE_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Pipe end that records what it writes and can flip one bit on the way out
struct Wire {
    inner: MemoryPipe,
    written: usize,
    flip: Option<(usize, u8)>,
    log: Arc<Mutex<Vec<u8>>>,
}

impl Wire {
    fn new(inner: MemoryPipe) -> Self {
        Self {
            inner,
            written: 0,
            flip: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Flip `bit` of the byte at `offset` counted from the next byte written
    fn flip_next(&mut self, offset: usize, bit: u8) {
        self.flip = Some((self.written + offset, bit));
    }
}

impl Read for Wire {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.inner, buf)
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = buf.to_vec();
        if let Some((offset, bit)) = self.flip {
            if offset >= self.written && offset < self.written + data.len() {
                data[offset - self.written] ^= 1 << bit;
            }
        }
        let n = Write::write(&mut self.inner, &data)?;
        self.log.lock().unwrap().extend_from_slice(&data[..n]);
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.inner)
    }
}

fn wires() -> (Wire, Wire) {
    let (a, b) = duplex();
    (
        Wire::new(a.with_read_timeout(PIPE_TIMEOUT)),
        Wire::new(b.with_read_timeout(PIPE_TIMEOUT)),
    )
}

fn identity(suite: SuiteId) -> Arc<dyn IdentityKey> {
    Arc::from(create_suite(suite).generate_identity().unwrap())
}

/// Builders for two peers that trust each other's identity
fn trusted_builders(suite: SuiteId) -> (SessionBuilder, SessionBuilder) {
    let client_id = identity(suite);
    let server_id = identity(suite);
    let client = SessionBuilder::new(
        Role::Client,
        Arc::new(AllowList::from_keys(vec![server_id.public_key()])),
    )
    .suite(suite)
    .identity(client_id.clone());
    let server = SessionBuilder::new(
        Role::Server,
        Arc::new(AllowList::from_keys(vec![client_id.public_key()])),
    )
    .suite(suite)
    .identity(server_id);
    (client, server)
}

type Outcome<T> = (Session<T>, dac_lib::Result<()>);

/// Authenticate both ends; a failing end releases so its peer is not left waiting
fn authenticate_pair<A, B>(mut client: Session<A>, server: Session<B>) -> (Outcome<A>, Outcome<B>)
where
    A: Transport + Send + 'static,
    B: Transport + Send + 'static,
{
    let handle = thread::spawn(move || {
        let mut server = server;
        let result = server.authenticate();
        if result.is_err() {
            server.release();
        }
        (server, result)
    });

    let result = client.authenticate();
    if result.is_err() {
        client.release();
    }
    let server = handle.join().unwrap();
    ((client, result), server)
}

fn connected(suite: SuiteId) -> (Session<Wire>, Session<Wire>) {
    let (client_builder, server_builder) = trusted_builders(suite);
    let (a, b) = wires();
    let ((client, c), (server, s)) =
        authenticate_pair(client_builder.build(a), server_builder.build(b));
    c.unwrap();
    s.unwrap();
    (client, server)
}

// ═══════════════════════════════════════════════════════════════════════════
// HANDSHAKE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_schedules_match_curve25519() {
    let (client, server) = connected(SuiteId::Curve25519);
    assert_eq!(client.status(), SessionStatus::Authenticated);
    assert_eq!(server.status(), SessionStatus::Authenticated);
    assert_eq!(client.key_schedule().unwrap(), server.key_schedule().unwrap());
}

#[test]
fn test_schedules_match_p256() {
    let (client, server) = connected(SuiteId::P256);
    assert_eq!(client.suite(), SuiteId::P256);
    assert_eq!(client.key_schedule().unwrap(), server.key_schedule().unwrap());
}

#[test]
fn test_door_unlock_scenario() {
    let (client_builder, server_builder) = trusted_builders(SuiteId::Curve25519);
    let (a, b) = wires();
    let client = client_builder.fixed_nonce(*b"client-000000000").build(a);
    let server = server_builder.fixed_nonce(*b"server-000000000").build(b);

    let ((mut client, c), (mut server, s)) = authenticate_pair(client, server);
    c.unwrap();
    s.unwrap();

    let handle = thread::spawn(move || {
        let request = server.receive().unwrap();
        assert_eq!(request, b"ACTUATOR:door:unlock");
        server.send(b"GRANTED").unwrap();
        server
    });

    client.send(b"ACTUATOR:door:unlock").unwrap();
    assert_eq!(client.receive().unwrap(), b"GRANTED");

    let mut server = handle.join().unwrap();
    client.release();
    server.release();
    assert_eq!(client.status(), SessionStatus::Released);
    assert_eq!(server.status(), SessionStatus::Released);
}

#[test]
fn test_peer_identities_reported() {
    let client_id = identity(SuiteId::Curve25519);
    let server_id = identity(SuiteId::Curve25519);
    let (a, b) = wires();

    let client = SessionBuilder::new(Role::Client, Arc::new(AcceptAnyPeer))
        .identity(client_id.clone())
        .build(a);
    let server = SessionBuilder::new(Role::Server, Arc::new(AcceptAnyPeer))
        .identity(server_id.clone())
        .build(b);

    let ((client, c), (server, s)) = authenticate_pair(client, server);
    c.unwrap();
    s.unwrap();
    assert_eq!(client.peer_identity(), Some(&server_id.public_key()[..]));
    assert_eq!(server.peer_identity(), Some(&client_id.public_key()[..]));
}

#[test]
fn test_per_run_identity_without_key() {
    let (a, b) = wires();
    let client = Session::init_client(a, Arc::new(AcceptAnyPeer));
    let server = Session::init_server(b, Arc::new(AcceptAnyPeer));
    let ((client, c), (server, s)) = authenticate_pair(client, server);
    c.unwrap();
    s.unwrap();
    assert_eq!(client.peer_identity().map(<[u8]>::len), Some(32));
    assert_eq!(client.key_schedule().unwrap(), server.key_schedule().unwrap());
}

#[test]
fn test_untrusted_server_rejected() {
    let (_, server_builder) = trusted_builders(SuiteId::Curve25519);
    let (a, b) = wires();
    let client = SessionBuilder::new(Role::Client, Arc::new(AllowList::new())).build(a);
    let server = server_builder.build(b);

    let ((client, c), (server, s)) = authenticate_pair(client, server);
    assert!(matches!(
        c,
        Err(DacError::Authentication(AuthFailure::PeerRejected))
    ));
    assert!(s.is_err());
    assert_eq!(client.status(), SessionStatus::Released);
    assert_eq!(server.status(), SessionStatus::Released);
}

#[test]
fn test_untrusted_client_rejected() {
    let server_id = identity(SuiteId::Curve25519);
    let (a, b) = wires();
    let client = SessionBuilder::new(
        Role::Client,
        Arc::new(AllowList::from_keys(vec![server_id.public_key()])),
    )
    .build(a);
    let verifier = |_: &[u8]| false;
    let server = SessionBuilder::new(Role::Server, Arc::new(verifier))
        .identity(server_id)
        .build(b);

    let ((client, c), (server, s)) = authenticate_pair(client, server);
    assert!(matches!(
        s,
        Err(DacError::Authentication(AuthFailure::PeerRejected))
    ));
    assert!(c.is_err());
    assert!(client.key_schedule().is_none());
    assert_eq!(server.status(), SessionStatus::Released);
}

#[test]
fn test_suite_mismatch_rejected() {
    let (a, b) = wires();
    let client = SessionBuilder::new(Role::Client, Arc::new(AcceptAnyPeer))
        .suite(SuiteId::P256)
        .build(a);
    let server = Session::init_server(b, Arc::new(AcceptAnyPeer));

    let ((_, c), (_, s)) = authenticate_pair(client, server);
    assert!(matches!(
        s,
        Err(DacError::Crypto(dac_protocol::CryptoError::UnsupportedSuite(2)))
    ));
    assert!(c.is_err());
}

#[test]
fn test_handshake_read_timeout() {
    let (a, _b) = duplex();
    let mut server = Session::init_server(
        a.with_read_timeout(Duration::from_millis(100)),
        Arc::new(AcceptAnyPeer),
    );
    assert!(matches!(
        server.authenticate(),
        Err(DacError::Transport(TransportError::Timeout))
    ));
    assert_eq!(server.status(), SessionStatus::Failed);
}

// ═══════════════════════════════════════════════════════════════════════════
// BIT FLIPS
// ═══════════════════════════════════════════════════════════════════════════

/// Flip one bit of the handshake in flight and expect both ends to fail
fn assert_flip_fails(client_side: bool, offset: usize, bit: u8) {
    let (client_builder, server_builder) = trusted_builders(SuiteId::Curve25519);
    let (mut a, mut b) = wires();
    if client_side {
        a.flip_next(offset, bit);
    } else {
        b.flip_next(offset, bit);
    }

    let ((client, c), (server, s)) =
        authenticate_pair(client_builder.build(a), server_builder.build(b));
    assert!(c.is_err(), "client accepted flip at {}:{}", offset, bit);
    assert!(s.is_err(), "server accepted flip at {}:{}", offset, bit);
    assert!(client.key_schedule().is_none());
    assert!(server.key_schedule().is_none());
}

#[test]
fn test_client_message_bit_flips() {
    // ClientHello: params 0..4, e 4..38, Vc 38..56; ClientAuth: Kc 56..90, sc 90..156
    let flips = [
        (0, 7),
        (2, 0),
        (3, 1),
        (4, 7),
        (6, 0),
        (20, 3),
        (37, 7),
        (38, 7),
        (40, 0),
        (55, 5),
        (56, 7),
        (58, 0),
        (75, 2),
        (89, 7),
        (90, 7),
        (92, 0),
        (120, 4),
        (155, 7),
    ];
    for (offset, bit) in flips {
        assert_flip_fails(true, offset, bit);
    }
}

#[test]
fn test_server_hello_bit_flips() {
    // ServerHello: f 0..34, s 34..100, Ks 100..134, Vs 134..152
    let flips = [
        (0, 7),
        (2, 0),
        (20, 4),
        (33, 7),
        (34, 7),
        (36, 0),
        (99, 7),
        (100, 7),
        (102, 0),
        (133, 7),
        (134, 7),
        (136, 0),
        (151, 7),
    ];
    for (offset, bit) in flips {
        assert_flip_fails(false, offset, bit);
    }
}

#[test]
fn test_key_confirmation_flip() {
    // ServerFinished confirm starts at 154; the server has already finished
    let (client_builder, server_builder) = trusted_builders(SuiteId::Curve25519);
    let (a, mut b) = wires();
    b.flip_next(160, 0);

    let ((client, c), (_, s)) = authenticate_pair(client_builder.build(a), server_builder.build(b));
    assert!(matches!(
        c,
        Err(DacError::Authentication(AuthFailure::KeyConfirmation))
    ));
    assert!(s.is_ok());
    assert!(client.key_schedule().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// FRAMES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_block_boundary_payloads() {
    let (mut client, server) = connected(SuiteId::Curve25519);
    let sizes = [0usize, 1, 13, 14, 15, 16, 17, 31, 32, 100, 1000];

    let handle = thread::spawn(move || {
        let mut server = server;
        for size in sizes {
            let payload = server.receive().unwrap();
            assert_eq!(payload.len(), size);
            assert!(payload.iter().all(|b| *b == size as u8));
            server.send(&payload).unwrap();
        }
        server
    });

    for size in sizes {
        let payload = vec![size as u8; size];
        client.send(&payload).unwrap();
        assert_eq!(client.receive().unwrap(), payload);
    }
    handle.join().unwrap();
}

#[test]
fn test_max_payload() {
    let (client_builder, server_builder) = trusted_builders(SuiteId::P256);
    let (a, b) = wires();
    let client = client_builder.max_frame_len(dac_protocol::MAX_FRAME_LEN).build(a);
    let server = server_builder.max_frame_len(dac_protocol::MAX_FRAME_LEN).build(b);
    let ((mut client, c), (mut server, s)) = authenticate_pair(client, server);
    c.unwrap();
    s.unwrap();

    let payload = vec![0x5A; dac_protocol::MAX_PAYLOAD_LEN];
    client.send(&payload).unwrap();
    assert_eq!(server.receive().unwrap(), payload);

    assert!(matches!(
        client.send(&vec![0u8; dac_protocol::MAX_PAYLOAD_LEN + 1]),
        Err(DacError::Protocol(ProtocolError::PayloadTooLarge { .. }))
    ));
    assert_eq!(client.status(), SessionStatus::Authenticated);

    // The channel survives the refused payload
    client.send(b"after").unwrap();
    assert_eq!(server.receive().unwrap(), b"after");
    assert_eq!(client.key_schedule().unwrap(), server.key_schedule().unwrap());
}

#[test]
fn test_replayed_frame_rejected() {
    let (mut client, mut server) = connected(SuiteId::Curve25519);
    let log = Arc::clone(&client.transport_mut().unwrap().log);
    let before = log.lock().unwrap().len();

    client.send(b"open").unwrap();
    assert_eq!(server.receive().unwrap(), b"open");

    let frame = log.lock().unwrap()[before..].to_vec();
    Write::write_all(client.transport_mut().unwrap(), &frame).unwrap();

    assert!(matches!(
        server.receive(),
        Err(DacError::Authentication(AuthFailure::MacMismatch))
    ));
    assert_eq!(server.status(), SessionStatus::Failed);
    assert!(matches!(server.receive(), Err(DacError::InvalidState(_))));
}

#[test]
fn test_tampered_ciphertext_rejected() {
    let (mut client, mut server) = connected(SuiteId::Curve25519);
    client.transport_mut().unwrap().flip_next(5, 2);
    client.send(b"ACTUATOR:door:unlock").unwrap();

    assert!(matches!(
        server.receive(),
        Err(DacError::Authentication(AuthFailure::MacMismatch))
    ));
    assert_eq!(server.status(), SessionStatus::Failed);
    assert!(server.key_schedule().is_none());
}

#[test]
fn test_tampered_mac_rejected() {
    let (mut client, mut server) = connected(SuiteId::Curve25519);
    // 2-byte length, 16 bytes ciphertext, then the MAC
    client.transport_mut().unwrap().flip_next(2 + 16 + 31, 7);
    client.send(b"x").unwrap();

    assert!(matches!(
        server.receive(),
        Err(DacError::Authentication(AuthFailure::MacMismatch))
    ));
}

#[test]
fn test_oversized_length_prefix() {
    let (mut client, mut server) = connected(SuiteId::Curve25519);
    Write::write_all(client.transport_mut().unwrap(), &[0xFF, 0xFF]).unwrap();

    assert!(matches!(
        server.receive(),
        Err(DacError::Protocol(ProtocolError::FrameTooLarge { .. }))
    ));
    assert_eq!(server.status(), SessionStatus::Failed);
}

// ═══════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_rekey_after_frame_budget() {
    let (client_builder, server_builder) = trusted_builders(SuiteId::Curve25519);
    let (a, b) = wires();
    let client = client_builder.max_frames_per_key(2).build(a);
    let server = server_builder.max_frames_per_key(2).build(b);
    let ((mut client, c), (mut server, s)) = authenticate_pair(client, server);
    c.unwrap();
    s.unwrap();
    let first_keys = client.key_schedule().unwrap().keys()[2].to_vec();

    client.send(b"1").unwrap();
    client.send(b"2").unwrap();
    assert!(matches!(client.send(b"3"), Err(DacError::RekeyRequired)));
    assert_eq!(client.status(), SessionStatus::RekeyRequired);

    assert_eq!(server.receive().unwrap(), b"1");
    assert_eq!(server.receive().unwrap(), b"2");
    assert!(matches!(server.receive(), Err(DacError::RekeyRequired)));
    assert_eq!(server.status(), SessionStatus::RekeyRequired);

    let ((mut client, c), (mut server, s)) = authenticate_pair(client, server);
    c.unwrap();
    s.unwrap();
    assert_eq!(client.status(), SessionStatus::Authenticated);
    assert_ne!(client.key_schedule().unwrap().keys()[2].to_vec(), first_keys);

    client.send(b"3").unwrap();
    assert_eq!(server.receive().unwrap(), b"3");
}

#[test]
fn test_release_after_failure() {
    let (a, b) = wires();
    drop(b);
    let mut client = Session::init_client(a, Arc::new(AcceptAnyPeer));
    assert!(client.authenticate().is_err());
    assert_eq!(client.status(), SessionStatus::Failed);
    assert!(matches!(client.send(b"x"), Err(DacError::InvalidState(_))));

    client.release();
    client.release();
    assert_eq!(client.status(), SessionStatus::Released);
}

#[test]
fn test_cancel_stops_frames() {
    let (mut client, _server) = connected(SuiteId::Curve25519);
    client.cancel_token().cancel();
    assert!(matches!(client.send(b"x"), Err(DacError::Cancelled)));
    assert_eq!(client.status(), SessionStatus::Failed);
}
