//! Configuration for the bucket-copy transfer machinery
//!
//! Loaded from environment variables; covers every knob the copy optimizer
//! and the GCP Data Transfer Service driver expose.

use crate::error::{Result, RoverError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bytes an S3 directory must hold before the managed transfer service is
/// worth its spin-up time. 500 metric megabytes.
pub const DEFAULT_TRANSFER_MIN_BYTES: u64 = 500_000_000;

/// Seconds between transfer-job status polls.
pub const DEFAULT_TRANSFER_POLL_SECS: u64 = 10;

/// Upper bound on status polls before giving up on the managed service and
/// reporting "not copied" to the caller. 360 polls at the default interval
/// is about an hour.
pub const DEFAULT_TRANSFER_MAX_POLLS: u32 = 360;

/// Tuning for cross-cloud copies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Minimum source size in bytes before the managed transfer service is
    /// used at all
    pub min_bytes_to_use: u64,

    /// Interval between transfer-job status polls
    pub poll_interval: Duration,

    /// Maximum number of status polls before falling back
    pub max_polls: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_bytes_to_use: DEFAULT_TRANSFER_MIN_BYTES,
            poll_interval: Duration::from_secs(DEFAULT_TRANSFER_POLL_SECS),
            max_polls: DEFAULT_TRANSFER_MAX_POLLS,
        }
    }
}

impl TransferConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ROVER_GCP_TRANSFER_MIN_BYTES`: size threshold in bytes
    /// - `ROVER_GCP_TRANSFER_POLL_SECS`: seconds between status polls
    /// - `ROVER_GCP_TRANSFER_MAX_POLLS`: poll count bound
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(min_bytes) = std::env::var("ROVER_GCP_TRANSFER_MIN_BYTES") {
            config.min_bytes_to_use = min_bytes.parse().map_err(|_| {
                RoverError::Config(format!(
                    "ROVER_GCP_TRANSFER_MIN_BYTES is not a byte count: {min_bytes:?}"
                ))
            })?;
        }

        if let Ok(poll_secs) = std::env::var("ROVER_GCP_TRANSFER_POLL_SECS") {
            let secs: u64 = poll_secs.parse().map_err(|_| {
                RoverError::Config(format!(
                    "ROVER_GCP_TRANSFER_POLL_SECS is not a number of seconds: {poll_secs:?}"
                ))
            })?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Ok(max_polls) = std::env::var("ROVER_GCP_TRANSFER_MAX_POLLS") {
            config.max_polls = max_polls.parse().map_err(|_| {
                RoverError::Config(format!(
                    "ROVER_GCP_TRANSFER_MAX_POLLS is not a count: {max_polls:?}"
                ))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global and the test harness is
    // parallel; every test that touches ROVER_GCP_TRANSFER_* holds this
    // lock for its whole body, cleanup included.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.min_bytes_to_use, 500_000_000);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_polls, 360);
    }

    #[test]
    fn test_from_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("ROVER_GCP_TRANSFER_MIN_BYTES", "1000");
        std::env::set_var("ROVER_GCP_TRANSFER_POLL_SECS", "1");
        std::env::set_var("ROVER_GCP_TRANSFER_MAX_POLLS", "3");

        let config = TransferConfig::from_env().unwrap();
        assert_eq!(config.min_bytes_to_use, 1000);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_polls, 3);

        std::env::remove_var("ROVER_GCP_TRANSFER_MIN_BYTES");
        std::env::remove_var("ROVER_GCP_TRANSFER_POLL_SECS");
        std::env::remove_var("ROVER_GCP_TRANSFER_MAX_POLLS");
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("ROVER_GCP_TRANSFER_MIN_BYTES", "a lot");
        let result = TransferConfig::from_env();
        std::env::remove_var("ROVER_GCP_TRANSFER_MIN_BYTES");
        assert!(matches!(result, Err(RoverError::Config(_))));
    }
}
