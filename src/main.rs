use clap::Parser;
use clap::error::ErrorKind;
use std::os::fd::RawFd;
use std::process;
use tracing::{error, info};
use wardend::cli::CliArgs;
use wardend::config::GlobalConfig;
use wardend::daemon::{DaemonServer, ServerConfig, daemonize, run_worker};
use wardend::logging;

fn main() {
    install_panic_hook();

    let args: Vec<String> = std::env::args().collect();

    // Internal entry the accept loop execs for each connection. Dispatched
    // on raw argv so it never shows up in the public CLI surface.
    if args.len() > 1 && args[1] == "worker-process" {
        run_worker_process(args);
        return;
    }

    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version are not usage errors; everything else exits 1
            // with the usage message while the terminal is still attached.
            let _ = e.print();
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => process::exit(0),
                _ => process::exit(1),
            }
        }
    };

    // Fatal conditions are surfaced before detaching wherever possible so an
    // interactive operator still sees them.
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    args.apply_overrides(&mut config);

    if args.foreground {
        if let Err(e) = logging::init_foreground_logging(&config) {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    } else {
        // Detach before any runtime exists; a forked process must never
        // carry live tokio state. After this point reporting goes to the
        // log file only.
        if let Err(e) = daemonize(&config) {
            eprintln!("Failed to detach: {e}");
            process::exit(1);
        }
        if let Err(e) = logging::init_daemon_logging(&config) {
            eprintln!("Failed to initialize daemon logging: {e}");
            process::exit(1);
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            eprintln!("Failed to build runtime: {e}");
            process::exit(1);
        }
    };

    let port = args.port;
    let result = runtime.block_on(async move {
        let server_config = ServerConfig {
            port,
            global_config: config,
        };
        let mut server = DaemonServer::new(server_config).await?;
        server.run().await
    });

    if let Err(e) = result {
        error!(error = %e, code = e.error_code(), "Daemon exited with fatal error");
        eprintln!("{e}");
        process::exit(1);
    }
}

/// Run the worker side of an isolated connection.
fn run_worker_process(args: Vec<String>) {
    let mut fd: Option<RawFd> = None;
    let mut log_level: Option<String> = None;

    // Skip program name and "worker-process"
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--fd" => {
                if i + 1 < args.len() {
                    fd = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    eprintln!("Error: --fd requires a descriptor number");
                    process::exit(1);
                }
            }
            "--log-level" => {
                if i + 1 < args.len() {
                    log_level = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("Error: --log-level requires a level name");
                    process::exit(1);
                }
            }
            _ => {
                eprintln!("Error: Unknown worker argument: {}", args[i]);
                process::exit(1);
            }
        }
    }

    let Some(fd) = fd else {
        eprintln!("Error: worker-process requires --fd");
        process::exit(1);
    };

    // Workers log to inherited stdout, which the parent already pointed at
    // the daemon log file, filtering at the level the parent passed along.
    let mut config = GlobalConfig::default();
    config.logging.file_enabled = false;
    if let Some(level) = log_level {
        config.logging.level = level;
    }
    if let Err(e) = logging::init_worker_logging(&config) {
        eprintln!("Failed to initialize worker logging: {e}");
        process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build worker runtime");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_worker(fd)) {
        error!(error = %e, "Worker exited with error");
        process::exit(1);
    }

    info!("Worker exited");
}

/// Unrecoverable runtime failures exit 1 like every other fatal condition.
/// After detachment stderr already points at the log file, so the message
/// lands there.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "Unrecoverable error");
        eprintln!("Unrecoverable error: {info}");
        process::exit(1);
    }));
}

fn load_config(args: &CliArgs) -> wardend::Result<GlobalConfig> {
    match &args.config {
        Some(path) => GlobalConfig::load_from_path(path),
        None => GlobalConfig::load(),
    }
}
