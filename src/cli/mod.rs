
use crate::config::GlobalConfig;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Command-line surface of the daemon: one required TCP port plus optional
/// overrides. The internal `worker-process` entry is dispatched on raw argv
/// in `main` before clap runs.
#[derive(Parser, Debug)]
#[command(
    name = "wardend",
    version,
    about = "A TCP daemon that isolates every accepted connection in its own worker process"
)]
pub struct CliArgs {
    /// TCP port to listen on
    pub port: u16,

    /// Stay attached to the terminal instead of detaching as a daemon
    #[arg(long)]
    pub foreground: bool,

    /// Path to the global configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the PID lock file path
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Override the daemon log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl CliArgs {
    /// Fold CLI path overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut GlobalConfig) {
        if let Some(pid_file) = &self.pid_file {
            config.daemon.pid_file = Some(pid_file.to_string_lossy().to_string());
        }
        if let Some(log_file) = &self.log_file {
            config.daemon.log_file = Some(log_file.to_string_lossy().to_string());
        }
    }
}
