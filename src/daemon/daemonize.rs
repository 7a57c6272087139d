
use crate::config::GlobalConfig;
use crate::error::{Result, WardendError};
use nix::sys::stat::{Mode, umask};
use nix::unistd::{ForkResult, chdir, fork, setsid};
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process;

/// Identity of the detached daemon, recorded once after the second fork.
#[derive(Debug, Clone, Copy)]
pub struct DaemonProcess {
    pub pid: u32,
    pub session_id: i32,
}

/// Detach the process from its controlling terminal (double-fork idiom) and
/// redirect the standard streams.
///
/// Must run before the tokio runtime is built: forking duplicates runtime
/// bookkeeping into a context where it no longer holds, so the runtime is
/// only ever created in the final surviving process.
///
/// Sequence: fork and exit the invoking process (returns control to an
/// interactive shell), become a session leader, change to the configured
/// working directory, clear the umask, fork again so the survivor can never
/// re-acquire a controlling terminal, then point stdin at /dev/null and
/// stdout/stderr at the append-mode log file.
pub fn daemonize(config: &GlobalConfig) -> Result<DaemonProcess> {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => {
            return Err(WardendError::Resource(format!("First fork failed: {e}")));
        }
    }

    let session_id = setsid()
        .map_err(|e| WardendError::Resource(format!("Could not become session leader: {e}")))?;

    chdir(Path::new(&config.daemon.working_dir)).map_err(|e| {
        WardendError::Resource(format!(
            "Could not change working directory to {}: {e}",
            config.daemon.working_dir
        ))
    })?;

    // The file mode creation mask is inherited from the invoker; clear it so
    // the daemon does not restrict permissions on the files it creates.
    umask(Mode::empty());

    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => {
            return Err(WardendError::Resource(format!("Second fork failed: {e}")));
        }
    }

    redirect_standard_streams(&config.log_file_path())?;

    Ok(DaemonProcess {
        pid: process::id(),
        session_id: session_id.as_raw(),
    })
}

/// Open the daemon's append-mode log file, creating parent directories as
/// needed.
pub fn open_daemon_log(log_path: &Path) -> Result<File> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            WardendError::Resource(format!(
                "Could not create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(log_path)
        .map_err(|e| {
            WardendError::Resource(format!(
                "Unable to open log file {}: {e}",
                log_path.display()
            ))
        })
}

fn redirect_standard_streams(log_path: &Path) -> Result<()> {
    let devnull = File::open("/dev/null")
        .map_err(|e| WardendError::Resource(format!("Unable to open /dev/null: {e}")))?;
    let log = open_daemon_log(log_path)?;

    dup_onto(devnull.as_raw_fd(), libc::STDIN_FILENO)?;
    dup_onto(log.as_raw_fd(), libc::STDOUT_FILENO)?;
    dup_onto(log.as_raw_fd(), libc::STDERR_FILENO)?;

    // devnull and log close here; the standard descriptors keep the open
    // file descriptions alive.
    Ok(())
}

fn dup_onto(src: i32, dst: i32) -> Result<()> {
    if unsafe { libc::dup2(src, dst) } == -1 {
        return Err(WardendError::Resource(format!(
            "Unable to redirect descriptor {dst}: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}
