pub mod cli;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod session;

pub use error::{Result, WardendError};
