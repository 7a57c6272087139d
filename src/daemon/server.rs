
use crate::config::GlobalConfig;
use crate::daemon::pidfile::PidFileLock;
use crate::daemon::signals::{Role, SignalCoordinator, SignalEvent};
use crate::daemon::worker::WorkerIsolationManager;
use crate::error::{Result, WardendError};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

/// Configuration for the daemon server
pub struct ServerConfig {
    pub port: u16,
    pub global_config: GlobalConfig,
}

/// The daemon's event loop: accept-wait and signal-wait raced until a
/// terminal signal closes the listener.
///
/// The listener doubles as the role witness: `Some` while this process is
/// the accepting parent, `None` once shutdown started (or in principle in a
/// worker, which never constructs one of these).
pub struct DaemonServer {
    config: ServerConfig,
    listener: Option<TcpListener>,
    signals: SignalCoordinator,
    isolation: WorkerIsolationManager,
    pid_lock: PidFileLock,
    workers_spawned: u64,
}

enum LoopEvent {
    Accepted(std::io::Result<(TcpStream, SocketAddr)>),
    Signal(SignalEvent),
}

impl DaemonServer {
    /// Acquire the single-instance lock, bind the listening socket and
    /// register signal interest.
    ///
    /// The lock comes first: a second instance must exit without binding a
    /// socket or touching the PID file content of the running one.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let pid_lock = PidFileLock::acquire(&config.global_config.pid_file_path())?;

        let listener = bind_listener(
            &config.global_config.server.host,
            config.port,
            config.global_config.server.backlog,
        )?;

        let signals = SignalCoordinator::new(Role::Parent)?;
        let isolation = WorkerIsolationManager::new(&config.global_config.logging.level)?;

        Ok(Self {
            config,
            listener: Some(listener),
            signals,
            isolation,
            pid_lock,
            workers_spawned: 0,
        })
    }

    /// Drive the accept loop until a terminal signal closes the listener.
    ///
    /// In-flight workers are independent processes; nothing here waits for
    /// or terminates them. The loop exits cleanly and the process follows.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            pid = self.pid_lock.pid(),
            addr = ?self.local_addr(),
            "Daemon started"
        );

        loop {
            let event = {
                let listener = match self.listener.as_ref() {
                    Some(listener) => listener,
                    None => break,
                };

                tokio::select! {
                    accepted = listener.accept() => LoopEvent::Accepted(accepted),
                    signal = self.signals.recv() => LoopEvent::Signal(signal),
                }
            };

            match event {
                LoopEvent::Accepted(Ok((stream, peer))) => {
                    debug!(peer = %peer, "Accepted connection");
                    match self.isolation.isolate(stream, peer) {
                        Ok(handle) => {
                            self.workers_spawned += 1;
                            info!(
                                worker_pid = handle.pid,
                                peer = %handle.peer,
                                total = self.workers_spawned,
                                "Isolated connection in worker"
                            );
                        }
                        Err(e) => {
                            // One failed isolation never takes the daemon
                            // down; the connection is dropped and the loop
                            // keeps accepting.
                            warn!(error = %e, code = e.error_code(), "Worker isolation failed");
                        }
                    }
                }
                LoopEvent::Accepted(Err(e)) => {
                    warn!(error = %e, "Accept error, retrying");
                }
                LoopEvent::Signal(SignalEvent::ChildExited) => {
                    let reaped = self.signals.reap_children();
                    debug!(reaped = reaped, "Processed child-termination signal");
                }
                LoopEvent::Signal(event @ (SignalEvent::Terminate | SignalEvent::Interrupt)) => {
                    info!(signal = event.as_str(), "Shutting down accept loop");
                    self.close_listener();
                }
            }
        }

        // Collect any workers that finished while the last signal was being
        // processed; stragglers are re-parented to init when we exit.
        let reaped = self.signals.reap_children();
        info!(
            pid = self.pid_lock.pid(),
            reaped = reaped,
            workers_spawned = self.workers_spawned,
            "Daemon stopped"
        );

        Ok(())
    }

    /// Stop accepting. In-flight workers keep running to their own natural
    /// completion.
    pub fn close_listener(&mut self) {
        if self.listener.take().is_some() {
            self.signals.mark_closed();
            info!("Closed listening socket");
        }
    }

    /// True while this process still owns the listening socket.
    pub fn is_accepting(&self) -> bool {
        self.listener.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn workers_spawned(&self) -> u64 {
        self.workers_spawned
    }

    pub fn pid_file(&self) -> &std::path::Path {
        self.pid_lock.path()
    }
}

/// Bind the wildcard (or configured) interface with the configured backlog.
fn bind_listener(host: &str, port: u16, backlog: u32) -> Result<TcpListener> {
    let ip = IpAddr::from_str(host)
        .map_err(|e| WardendError::Config(format!("Invalid bind address '{host}': {e}")))?;
    let addr = SocketAddr::new(ip, port);

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(|e| WardendError::Resource(format!("Could not create socket: {e}")))?;

    socket
        .set_reuseaddr(true)
        .map_err(|e| WardendError::Resource(format!("Could not set SO_REUSEADDR: {e}")))?;
    socket
        .bind(addr)
        .map_err(|e| WardendError::Resource(format!("Could not bind {addr}: {e}")))?;

    socket
        .listen(backlog)
        .map_err(|e| WardendError::Resource(format!("Could not listen on {addr}: {e}")))
}
