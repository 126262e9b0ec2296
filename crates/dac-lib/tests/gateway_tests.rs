//! Gateway over loopback TCP.

use dac_core::crypto::{create_suite, IdentityKey, SuiteId};
use dac_lib::{
    request_access, AllowList, Decision, GatewayServer, PepCallback, PolicyEnforcementPoint,
    SessionSettings, Timeouts,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn identity(suite: SuiteId) -> Arc<dyn IdentityKey> {
    Arc::from(create_suite(suite).generate_identity().unwrap())
}

fn settings(
    own: &Arc<dyn IdentityKey>,
    peer: &Arc<dyn IdentityKey>,
    suite: SuiteId,
) -> SessionSettings {
    let verifier = AllowList::from_keys(vec![peer.public_key()]);
    let mut settings = SessionSettings::new(Arc::new(verifier));
    settings.suite = suite;
    settings.identity = Some(Arc::clone(own));
    settings.timeouts = Timeouts {
        read: Some(Duration::from_secs(5)),
        write: Some(Duration::from_secs(5)),
    };
    settings
}

fn door_pep() -> Arc<PolicyEnforcementPoint> {
    let pep = PolicyEnforcementPoint::new();
    pep.register_callback(
        PepCallback::Resolver,
        "doors",
        Arc::new(|request: &str| match request {
            "ACTUATOR:door:unlock" => Decision::Grant,
            _ => Decision::Deny,
        }),
    )
    .unwrap();
    Arc::new(pep)
}

type Running = (std::net::SocketAddr, dac_lib::ShutdownHandle, thread::JoinHandle<()>);

fn run_gateway(server: GatewayServer) -> Running {
    let addr = server.local_addr().unwrap();
    let handle = server.shutdown_handle();
    let thread = thread::spawn(move || server.run().unwrap());
    (addr, handle, thread)
}

#[test]
fn test_gateway_decisions() {
    let suite = SuiteId::Curve25519;
    let client_id = identity(suite);
    let server_id = identity(suite);

    let server = GatewayServer::bind(
        "127.0.0.1:0",
        settings(&server_id, &client_id, suite),
        door_pep(),
        4,
    )
    .unwrap();
    let (addr, shutdown, thread) = run_gateway(server);
    let client = settings(&client_id, &server_id, suite);

    assert_eq!(
        request_access(addr, "ACTUATOR:door:unlock", &client).unwrap(),
        Decision::Grant
    );
    assert_eq!(
        request_access(addr, "ACTUATOR:trunk:open", &client).unwrap(),
        Decision::Deny
    );

    shutdown.shutdown();
    thread.join().unwrap();
}

#[test]
fn test_gateway_without_resolver() {
    let suite = SuiteId::P256;
    let client_id = identity(suite);
    let server_id = identity(suite);

    let server = GatewayServer::bind(
        "127.0.0.1:0",
        settings(&server_id, &client_id, suite),
        Arc::new(PolicyEnforcementPoint::new()),
        4,
    )
    .unwrap();
    let (addr, shutdown, thread) = run_gateway(server);

    let client = settings(&client_id, &server_id, suite);
    assert_eq!(
        request_access(addr, "ACTUATOR:door:unlock", &client).unwrap(),
        Decision::Error
    );

    shutdown.shutdown();
    thread.join().unwrap();
}

#[test]
fn test_gateway_rejects_unknown_client() {
    let suite = SuiteId::Curve25519;
    let client_id = identity(suite);
    let server_id = identity(suite);
    let stranger = identity(suite);

    let server = GatewayServer::bind(
        "127.0.0.1:0",
        settings(&server_id, &client_id, suite),
        door_pep(),
        4,
    )
    .unwrap();
    let (addr, shutdown, thread) = run_gateway(server);

    let client = settings(&stranger, &server_id, suite);
    assert!(request_access(addr, "ACTUATOR:door:unlock", &client).is_err());

    shutdown.shutdown();
    thread.join().unwrap();
}
