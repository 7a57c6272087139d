use crate::config::GlobalConfig;
use crate::error::{Result, WardendError};
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, registry::Registry};

static LOGGER_INIT: Once = Once::new();

/// Initialize the logging system for a specific component
fn init_component_logging(
    config: &GlobalConfig,
    component: &str,
    log_to_stdout: bool,
) -> Result<()> {
    let mut init_result = Ok(());

    LOGGER_INIT.call_once(|| {
        init_result = init_component_logging_internal(config, component, log_to_stdout);
    });

    init_result
}

/// Internal logging initialization (only called once)
fn init_component_logging_internal(
    config: &GlobalConfig,
    component: &str,
    log_to_stdout: bool,
) -> Result<()> {
    let log_level = config.logging.level.to_lowercase();

    // Create the log directory if file logging is enabled
    let log_file_path = if config.logging.file_enabled {
        let log_dir = config.log_dir();

        std::fs::create_dir_all(&log_dir).map_err(|e| {
            WardendError::Resource(format!("Failed to create log directory: {e}"))
        })?;

        Some(log_dir.join(format!("{component}.log")))
    } else {
        None
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .map_err(|e| WardendError::Config(format!("Invalid log level '{log_level}': {e}")))?;

    let registry = Registry::default().with(filter);

    if let Some(ref log_path) = log_file_path {
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap(),
            format!("{component}.log"),
        );
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true);

        if log_to_stdout {
            let stdout_layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(false);

            registry.with(file_layer).with(stdout_layer).init();
        } else {
            registry.with(file_layer).init();
        }
    } else if log_to_stdout {
        let stdout_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        registry.with(stdout_layer).init();
    } else {
        return Err(WardendError::Config(
            "File logging must be enabled for components that don't log to stdout".to_string(),
        ));
    }

    info!("{} logging initialized with level: {}", component, log_level);
    if let Some(ref log_path) = log_file_path {
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

/// Initialize logging for the detached daemon. Stdout here is the append-mode
/// log file the detach sequence pointed fd 1 at, so the plain layer doubles
/// as the operational log.
pub fn init_daemon_logging(config: &GlobalConfig) -> Result<()> {
    init_component_logging(config, "wardend", true)?;
    info!("Daemon logging initialized");
    Ok(())
}

/// Initialize logging for foreground runs and CLI-side errors.
pub fn init_foreground_logging(config: &GlobalConfig) -> Result<()> {
    let mut fg_config = config.clone();
    fg_config.logging.file_enabled = false;

    init_component_logging(&fg_config, "wardend", true)?;
    debug!("Foreground logging initialized");
    Ok(())
}

/// Initialize logging for a worker process. Workers inherit the daemon's
/// redirected stdout, so leveled records land in the daemon log file.
pub fn init_worker_logging(config: &GlobalConfig) -> Result<()> {
    init_component_logging(config, "wardend-worker", true)?;
    debug!("Worker logging initialized");
    Ok(())
}
