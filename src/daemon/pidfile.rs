
use crate::error::{Result, WardendError};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive PID file lock enforcing single-instance operation.
///
/// The descriptor is opened close-on-exec so a spawned worker process never
/// inherits the lock, and the advisory lock itself is released by the kernel
/// when this process exits. Held for the whole daemon lifetime.
pub struct PidFileLock {
    lock: Flock<File>,
    path: PathBuf,
    pid: u32,
}

impl PidFileLock {
    /// Open (or create) the PID file with owner read/write permission, take
    /// a non-blocking exclusive lock, then truncate and record our pid.
    ///
    /// A held lock means another instance is already running and maps to
    /// `WardendError::Lock`; every other failure is `WardendError::Resource`
    /// and fatal at startup.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
            .map_err(|e| {
                WardendError::Resource(format!(
                    "Could not open PID file {}: {e}",
                    path.display()
                ))
            })?;

        let lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => lock,
            Err((_, Errno::EAGAIN | Errno::EACCES)) => {
                return Err(WardendError::Lock(format!(
                    "Could not acquire lock on {}. Another instance could be running already.",
                    path.display()
                )));
            }
            Err((_, errno)) => {
                return Err(WardendError::Resource(format!(
                    "Could not lock PID file {}: {errno}",
                    path.display()
                )));
            }
        };

        let pid = std::process::id();
        let mut this = Self {
            lock,
            path: path.to_path_buf(),
            pid,
        };

        this.write_pid()?;

        debug!(pid = pid, path = %path.display(), "PID file lock acquired");

        Ok(this)
    }

    fn write_pid(&mut self) -> Result<()> {
        self.lock.set_len(0).map_err(|e| {
            WardendError::Resource(format!(
                "Could not truncate PID file {}: {e}",
                self.path.display()
            ))
        })?;

        let contents = format!("{}\n", self.pid);
        self.lock.write_all(contents.as_bytes()).map_err(|e| {
            WardendError::Resource(format!(
                "Could not write pid to PID file {}: {e}",
                self.path.display()
            ))
        })?;
        self.lock.flush().map_err(|e| {
            WardendError::Resource(format!(
                "Could not flush PID file {}: {e}",
                self.path.display()
            ))
        })?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}
