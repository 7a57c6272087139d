pub mod daemonize;
pub mod pidfile;
pub mod server;
pub mod signals;
pub mod worker;

pub use daemonize::{DaemonProcess, daemonize};
pub use pidfile::PidFileLock;
pub use server::{DaemonServer, ServerConfig};
pub use signals::{Role, SignalCoordinator, SignalEvent, SignalState};
pub use worker::{WorkerHandle, WorkerIsolationManager, run_worker};
