//! Bulk S3-to-local sync through the AWS CLI
//!
//! The CLI parallelizes multi-file downloads far better than a naive
//! per-file loop, so the optimizer shells out to it when it is available.

use crate::base::DirectoryUrl;
use crate::filesystem::FilesystemDirectoryUrl;
use crate::s3::S3DirectoryUrl;
use tokio::process::Command;
use tracing::{info, warn};

/// Run `aws s3 sync` from an S3 directory into a local one. `true` only
/// when the CLI ran and exited cleanly; a missing binary or nonzero exit
/// reads as "no optimized copy happened".
pub async fn sync_via_aws_cli(source: &S3DirectoryUrl, dest: &FilesystemDirectoryUrl) -> bool {
    let dest_path = dest.local_file_path().display().to_string();
    info!(source = source.url(), dest = %dest_path, "Syncing via the AWS CLI");

    let status = Command::new("aws")
        .arg("s3")
        .arg("sync")
        .arg(source.url())
        .arg(&dest_path)
        .env("LC_CTYPE", "en_US.UTF-8")
        .status()
        .await;
    match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(code = ?status.code(), "AWS CLI sync exited nonzero");
            false
        },
        Err(e) => {
            warn!(error = %e, "Could not launch the AWS CLI");
            false
        },
    }
}
