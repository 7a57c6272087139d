pub mod global;

pub use global::{GlobalConfig, get_config_dir};
