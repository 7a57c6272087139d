
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardendError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Isolation error: {0}")]
    Isolation(String),

    #[error("Accept error: {0}")]
    Accept(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for WardendError {
    fn from(error: toml::de::Error) -> Self {
        WardendError::Config(error.to_string())
    }
}

impl WardendError {
    /// Fatal errors abort startup with exit code 1. Non-fatal errors are
    /// logged and the accept loop carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WardendError::Config(_)
                | WardendError::Lock(_)
                | WardendError::Resource(_)
                | WardendError::Io(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            WardendError::Config(_) => "CONFIG_ERROR",
            WardendError::Lock(_) => "LOCK_ERROR",
            WardendError::Resource(_) => "RESOURCE_ERROR",
            WardendError::Isolation(_) => "ISOLATION_ERROR",
            WardendError::Accept(_) => "ACCEPT_ERROR",
            WardendError::Connection(_) => "CONNECTION_ERROR",
            WardendError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, WardendError>;
