
use crate::error::{Result, WardendError};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::debug;

/// Whether this process still owns the listening socket (parent) or handles
/// exactly one connection (worker). The source of truth for signal routing;
/// kept explicit rather than derived from handle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Parent,
    Worker,
}

/// Lifecycle of the signal subscription.
///
/// `Armed` while a wait is pending, `Handling` between a delivery and the
/// next wait, `Closed` once a terminal signal has shut the accept loop down.
/// Awaiting `recv` again after handling is the explicit rearm; signal
/// delivery is not a standing subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Armed,
    Handling,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Terminate,
    Interrupt,
    ChildExited,
}

impl SignalEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalEvent::Terminate => "SIGTERM",
            SignalEvent::Interrupt => "SIGINT",
            SignalEvent::ChildExited => "SIGCHLD",
        }
    }
}

/// Routes lifecycle signals to role-appropriate handling.
///
/// The parent subscribes to SIGTERM, SIGINT and SIGCHLD; workers spawn no
/// children of their own, so they never register child-termination interest.
pub struct SignalCoordinator {
    role: Role,
    state: SignalState,
    sigterm: Signal,
    sigint: Signal,
    sigchld: Option<Signal>,
}

impl SignalCoordinator {
    pub fn new(role: Role) -> Result<Self> {
        let sigterm = subscribe(SignalKind::terminate(), "SIGTERM")?;
        let sigint = subscribe(SignalKind::interrupt(), "SIGINT")?;
        let sigchld = match role {
            Role::Parent => Some(subscribe(SignalKind::child(), "SIGCHLD")?),
            Role::Worker => None,
        };

        Ok(Self {
            role,
            state: SignalState::Armed,
            sigterm,
            sigint,
            sigchld,
        })
    }

    /// Wait for the next signal delivery. Each call re-arms the wait; a
    /// caller that stops calling this after a terminal signal has, by that
    /// omission, stopped listening.
    pub async fn recv(&mut self) -> SignalEvent {
        self.state = SignalState::Armed;

        let event = if let Some(sigchld) = self.sigchld.as_mut() {
            tokio::select! {
                _ = self.sigterm.recv() => SignalEvent::Terminate,
                _ = self.sigint.recv() => SignalEvent::Interrupt,
                _ = sigchld.recv() => SignalEvent::ChildExited,
            }
        } else {
            tokio::select! {
                _ = self.sigterm.recv() => SignalEvent::Terminate,
                _ = self.sigint.recv() => SignalEvent::Interrupt,
            }
        };

        self.state = SignalState::Handling;
        debug!(signal = event.as_str(), role = ?self.role, "Caught signal");

        event
    }

    /// Reap every immediately-reapable finished child without blocking, so
    /// completed workers never linger as zombies.
    pub fn reap_children(&self) -> usize {
        let mut reaped = 0;
        loop {
            let pid = unsafe { libc::waitpid(-1, std::ptr::null_mut(), libc::WNOHANG) };
            if pid <= 0 {
                // No more finished children (0) or no children at all (-1).
                break;
            }
            debug!(pid = pid, "Reaped finished worker");
            reaped += 1;
        }
        reaped
    }

    /// Terminal signal processed in the parent role; no further rearm.
    pub fn mark_closed(&mut self) {
        self.state = SignalState::Closed;
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn reaps_children(&self) -> bool {
        self.sigchld.is_some()
    }
}

fn subscribe(kind: SignalKind, name: &str) -> Result<Signal> {
    signal(kind)
        .map_err(|e| WardendError::Resource(format!("Could not register {name} handler: {e}")))
}
