#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_resolves_current_exe() {
        let manager = WorkerIsolationManager::new("info").unwrap();
        assert!(manager.worker_exe().is_absolute());
    }

    #[test]
    fn test_worker_handle_fields() {
        let handle = WorkerHandle {
            pid: 1234,
            peer: "127.0.0.1:9999".parse().unwrap(),
        };
        assert_eq!(handle.pid, 1234);
        assert_eq!(handle.peer.port(), 9999);
    }

    #[test]
    fn test_worker_command_forwards_fd_and_log_level() {
        let manager = WorkerIsolationManager::new("debug").unwrap();
        let command = manager.worker_command(7);

        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy()).collect();
        assert_eq!(args, ["worker-process", "--fd", "7", "--log-level", "debug"]);
        assert_eq!(command.get_program(), manager.worker_exe().as_os_str());
    }
}

use crate::daemon::signals::{Role, SignalCoordinator};
use crate::error::{Result, WardendError};
use crate::session;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::net::TcpStream;
use tracing::{error, info, warn};

/// A spawned worker process, identified by pid. The parent keeps no other
/// handle to it; completion is observed through SIGCHLD reaping.
#[derive(Debug, Clone, Copy)]
pub struct WorkerHandle {
    pub pid: u32,
    pub peer: SocketAddr,
}

/// Converts an accepted connection into an isolated worker process.
///
/// Isolation is spawn/exec of the current executable rather than a bare
/// fork: the worker starts from a fresh process image with its own runtime,
/// so no async bookkeeping crosses the boundary, and everything the parent
/// opened close-on-exec (PID lock, listener) is gone by construction. Only
/// the connection descriptor, made inheritable just before the spawn,
/// crosses over.
pub struct WorkerIsolationManager {
    worker_exe: PathBuf,
    log_level: String,
}

impl WorkerIsolationManager {
    pub fn new(log_level: &str) -> Result<Self> {
        let worker_exe = std::env::current_exe().map_err(|e| {
            WardendError::Resource(format!("Could not resolve current executable: {e}"))
        })?;

        Ok(Self {
            worker_exe,
            log_level: log_level.to_string(),
        })
    }

    /// Hand the accepted connection to a new worker process.
    ///
    /// The spawn is a synchronous operation and briefly stalls the accept
    /// loop; that is accepted. On return the parent no longer holds any
    /// reference to the connection. Spawn failure is an isolation error the
    /// caller logs before continuing to accept.
    pub fn isolate(&self, stream: TcpStream, peer: SocketAddr) -> Result<WorkerHandle> {
        let std_stream = stream.into_std().map_err(|e| {
            WardendError::Isolation(format!("Could not detach connection from runtime: {e}"))
        })?;
        std_stream.set_nonblocking(false).map_err(|e| {
            WardendError::Isolation(format!("Could not restore blocking mode: {e}"))
        })?;

        let fd = std_stream.as_raw_fd();
        clear_cloexec(fd)?;

        let child = self
            .worker_command(fd)
            .spawn()
            .map_err(|e| WardendError::Isolation(format!("Could not spawn worker: {e}")))?;

        let handle = WorkerHandle {
            pid: child.id(),
            peer,
        };

        // Ownership of the connection has transferred; the parent's copy
        // closes here so exactly one side holds a live reference. The child
        // handle itself is dropped unwaited, SIGCHLD reaping collects it.
        drop(std_stream);
        drop(child);

        Ok(handle)
    }

    /// Command line for the internal worker entry. Stdin is nulled; stdout
    /// and stderr stay inherited so worker output lands in the daemon log.
    /// The parent's configured logging level rides along so workers filter
    /// records the same way the daemon does.
    pub fn worker_command(&self, fd: RawFd) -> Command {
        let mut command = Command::new(&self.worker_exe);
        command
            .arg("worker-process")
            .arg("--fd")
            .arg(fd.to_string())
            .arg("--log-level")
            .arg(&self.log_level)
            .stdin(Stdio::null());
        command
    }

    pub fn worker_exe(&self) -> &Path {
        &self.worker_exe
    }
}

/// Clear FD_CLOEXEC so the connection descriptor survives the exec into the
/// worker. Everything else stays close-on-exec.
fn clear_cloexec(fd: RawFd) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(WardendError::Isolation(format!(
            "Could not read descriptor flags: {}",
            std::io::Error::last_os_error()
        )));
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } == -1 {
        return Err(WardendError::Isolation(format!(
            "Could not clear close-on-exec: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Worker-side entry point, reached through the internal `worker-process`
/// subcommand after the exec.
///
/// Rebuilds the connection from the inherited descriptor, installs
/// worker-role signal handling (terminal signals are recorded, never acted
/// on as accept-loop events), runs the session, and exits when it is done.
pub async fn run_worker(fd: RawFd) -> Result<()> {
    let std_stream = unsafe { std::net::TcpStream::from_raw_fd(fd) };
    std_stream.set_nonblocking(true).map_err(|e| {
        WardendError::Resource(format!("Could not prepare inherited connection: {e}"))
    })?;
    let stream = TcpStream::from_std(std_stream).map_err(|e| {
        WardendError::Resource(format!("Could not register inherited connection: {e}"))
    })?;

    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(pid = std::process::id(), peer = %peer, "Worker started");

    let mut signals = SignalCoordinator::new(Role::Worker)?;
    tokio::spawn(async move {
        loop {
            let event = signals.recv().await;
            // Recorded for the session's own benefit; the worker finishes
            // its connection regardless of parent shutdown.
            warn!(signal = event.as_str(), "Worker caught signal");
        }
    });

    let result = session::handle_session(stream).await;

    match &result {
        Ok(()) => info!(pid = std::process::id(), "Worker finished"),
        Err(e) => error!(pid = std::process::id(), error = %e, "Worker session failed"),
    }

    result
}
