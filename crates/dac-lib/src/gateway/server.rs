//! Gateway accept loop: one thread and one session per connection.

use super::SessionSettings;
use crate::pep::{Decision, PolicyEnforcementPoint};
use crate::session::{Role, Session};
use dac_protocol::{Result, TransportError};
use log::{debug, error, info, warn};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Accept poll interval while idle
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Stops a running [`GatewayServer`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// TCP listener dispatching authenticated requests to a PEP
pub struct GatewayServer {
    listener: TcpListener,
    settings: SessionSettings,
    pep: Arc<PolicyEnforcementPoint>,
    max_connections: usize,
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl GatewayServer {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        settings: SessionSettings,
        pep: Arc<PolicyEnforcementPoint>,
        max_connections: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            settings,
            pep,
            max_connections: max_connections.max(1),
            running: Arc::new(AtomicBool::new(true)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Stop the accept loop
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Accept connections until shut down
    pub fn run(&self) -> io::Result<()> {
        info!("Gateway listening on {}", self.listener.local_addr()?);

        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Accept failed: {}", e);
                    return Err(e);
                }
            }
        }

        info!("Gateway shutdown");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        if self.active.load(Ordering::SeqCst) >= self.max_connections {
            warn!("Connection limit ({}) reached, dropping {}", self.max_connections, peer);
            return;
        }

        let guard = ActiveGuard::enter(&self.active);
        let settings = self.settings.clone();
        let pep = Arc::clone(&self.pep);

        let spawned = thread::Builder::new()
            .name(format!("dac-{}", peer))
            .spawn(move || {
                let _guard = guard;
                match handle_connection(stream, &settings, &pep) {
                    Ok(decision) => info!("{}: {}", peer, decision),
                    Err(e) if e.is_auth_failure() => warn!("{}: rejected: {}", peer, e),
                    Err(e) => info!("{}: session dropped: {}", peer, e),
                }
            });
        if let Err(e) = spawned {
            error!("Failed to spawn connection thread for {}: {}", peer, e);
        }
    }
}

/// Keeps the active-connection count while a handler runs
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serve one connection: authenticate, read a request, answer with the decision
pub fn handle_connection(
    stream: TcpStream,
    settings: &SessionSettings,
    pep: &PolicyEnforcementPoint,
) -> Result<Decision> {
    stream
        .set_nonblocking(false)
        .map_err(TransportError::from_io)?;
    settings
        .timeouts
        .apply(&stream)
        .map_err(TransportError::from_io)?;

    let mut session = settings.builder(Role::Server).build(stream);
    let result = serve_request(&mut session, pep);
    session.release();
    result
}

fn serve_request(
    session: &mut Session<TcpStream>,
    pep: &PolicyEnforcementPoint,
) -> Result<Decision> {
    session.authenticate()?;

    let request = session.receive()?;
    let decision = match std::str::from_utf8(&request) {
        Ok(request) => {
            debug!("Request: {}", request);
            pep.request_access(request)
        }
        Err(_) => {
            warn!("Request is not valid UTF-8");
            Decision::Error
        }
    };

    session.send(decision.as_str().as_bytes())?;
    Ok(decision)
}
