//! Shared infrastructure for the rover workspace: the error taxonomy,
//! logging setup, and environment-driven configuration.

pub mod config;
pub mod error;
pub mod logging;

pub use config::TransferConfig;
pub use error::{Result, RoverError};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, Redactor};
