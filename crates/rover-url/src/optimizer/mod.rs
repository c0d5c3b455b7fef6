//! Optimized directory-to-directory copy strategies
//!
//! [`CopyOptimizer::copy`] answers one question: can these two
//! directories be copied by something faster than a per-file byte
//! stream? It returns `true` only when an optimized copy actually ran;
//! on `false` the caller falls back to [`DirectoryUrl::copy_to`]. It
//! never errors for a strategy failure.
//!
//! The temp-location helpers exist because the transfer service needs
//! the source key and destination blob to be identical suffixes within
//! their buckets; staging paths are nudged into alignment before the
//! copy and any borrowed path is purged afterwards.

pub mod awscli;
pub mod gcp_transfer;

use crate::base::DirectoryUrl;
use crate::filesystem::FilesystemDirectoryUrl;
use crate::gcs::GcsDirectoryUrl;
use crate::s3::S3DirectoryUrl;
use futures::future::BoxFuture;
use gcp_transfer::GcpDataTransferService;
use rover_common::Result;
use tracing::{debug, info, warn};

pub struct CopyOptimizer {
    transfer: GcpDataTransferService,
}

impl CopyOptimizer {
    pub fn new(transfer: GcpDataTransferService) -> Self {
        CopyOptimizer { transfer }
    }

    /// Try an optimized copy from `source` to `dest`.
    pub async fn copy(&self, source: &dyn DirectoryUrl, dest: &dyn DirectoryUrl) -> bool {
        if let Some(s3) = source.as_any().downcast_ref::<S3DirectoryUrl>() {
            if let Some(local) = dest.as_any().downcast_ref::<FilesystemDirectoryUrl>() {
                return awscli::sync_via_aws_cli(s3, local).await;
            }
            if let Some(gcs) = dest.as_any().downcast_ref::<GcsDirectoryUrl>() {
                return self.transfer.copy(s3, gcs).await;
            }
        }
        debug!(
            source = source.url(),
            dest = dest.url(),
            "No optimized copy strategy applies"
        );
        false
    }

    /// Hand `f` a pair of temporary staging directories whose paths have
    /// been aligned for an optimized copy where possible. Any directory
    /// swapped in here is purged once `f` returns.
    ///
    /// Same-scheme pairs share a single location; an S3/GCS pair gets
    /// its keys aligned; any other pair passes through unchanged.
    pub async fn optimize_temp_locations<T, F>(
        &self,
        temp_first: &dyn DirectoryUrl,
        temp_second: &dyn DirectoryUrl,
        f: F,
    ) -> Result<T>
    where
        F: for<'a> FnOnce(&'a dyn DirectoryUrl, &'a dyn DirectoryUrl) -> BoxFuture<'a, Result<T>>,
    {
        if temp_first.scheme() == temp_second.scheme() {
            // One location serves both roles.
            return f(temp_first, temp_first).await;
        }
        let (Some(s3), Some(gcs)) = (
            temp_first.as_any().downcast_ref::<S3DirectoryUrl>(),
            temp_second.as_any().downcast_ref::<GcsDirectoryUrl>(),
        ) else {
            debug!(
                first = temp_first.url(),
                second = temp_second.url(),
                "No temp location optimization applies"
            );
            return f(temp_first, temp_second).await;
        };

        let adjusted_first = s3.directory_in_this_bucket(gcs.blob());
        if usable_sibling(&adjusted_first).await {
            info!(
                first = adjusted_first.url(),
                second = temp_second.url(),
                "Aligned staging paths on the source side"
            );
            return run_then_purge(&adjusted_first, |adjusted| f(adjusted, temp_second)).await;
        }
        let adjusted_second = gcs.directory_in_this_bucket(s3.key());
        if usable_sibling(&adjusted_second).await {
            info!(
                first = temp_first.url(),
                second = adjusted_second.url(),
                "Aligned staging paths on the destination side"
            );
            return run_then_purge(&adjusted_second, |adjusted| f(temp_first, adjusted)).await;
        }
        warn!(
            first = temp_first.url(),
            second = temp_second.url(),
            "Could not match paths between the two buckets; an optimized \
             cloud copy will not be possible"
        );
        f(temp_first, temp_second).await
    }

    /// Variant for a fixed source location: only the second (temporary)
    /// location may move.
    pub async fn optimize_temp_second_location<T, F>(
        &self,
        permanent_first: &dyn DirectoryUrl,
        temp_second: &dyn DirectoryUrl,
        f: F,
    ) -> Result<T>
    where
        F: for<'a> FnOnce(&'a dyn DirectoryUrl) -> BoxFuture<'a, Result<T>>,
    {
        let (Some(s3), Some(gcs)) = (
            permanent_first.as_any().downcast_ref::<S3DirectoryUrl>(),
            temp_second.as_any().downcast_ref::<GcsDirectoryUrl>(),
        ) else {
            return f(temp_second).await;
        };
        let adjusted_second = gcs.directory_in_this_bucket(s3.key());
        if usable_sibling(&adjusted_second).await {
            info!(
                second = adjusted_second.url(),
                "Aligned the staging path with the fixed source"
            );
            return run_then_purge(&adjusted_second, |adjusted| f(adjusted)).await;
        }
        warn!(
            first = permanent_first.url(),
            second = temp_second.url(),
            "Could not align the staging path; an optimized cloud copy \
             will not be possible"
        );
        f(temp_second).await
    }
}

/// A candidate directory is usable as a borrowed staging path only when
/// it is empty and a test write round-trips. Probe errors read as
/// "not usable".
async fn usable_sibling(candidate: &dyn DirectoryUrl) -> bool {
    match candidate.empty().await {
        Ok(true) => {},
        Ok(false) => {
            info!(url = candidate.url(), "Candidate directory is not empty");
            return false;
        },
        Err(e) => {
            info!(url = candidate.url(), error = %e, "Could not list candidate directory");
            return false;
        },
    }
    match candidate.writable().await {
        Ok(true) => true,
        Ok(false) => {
            info!(url = candidate.url(), "Candidate directory is not writable");
            false
        },
        Err(e) => {
            info!(url = candidate.url(), error = %e, "Could not probe candidate directory");
            false
        },
    }
}

/// Run `f` against a borrowed staging directory and purge the directory
/// on every exit path. A purge failure is logged, not raised; the
/// closure's outcome is what matters.
async fn run_then_purge<'d, T, D, F>(directory: &'d D, f: F) -> Result<T>
where
    D: DirectoryUrl,
    F: FnOnce(&'d D) -> BoxFuture<'d, Result<T>>,
{
    let outcome = f(directory).await;
    if let Err(e) = directory.purge_directory().await {
        warn!(url = directory.url(), error = %e, "Could not purge borrowed staging directory");
    }
    outcome
}
