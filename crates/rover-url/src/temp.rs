//! Scoped temporary locations
//!
//! Temporary directories and files are closure-scoped: the resource is
//! created under a parent directory, handed to the closure, and purged on
//! every exit path. Slugs are random, so concurrent jobs sharing a parent
//! never collide.

use crate::base::{DirectoryUrl, FileUrl};
use crate::filesystem::FilesystemDirectoryUrl;
use futures::future::BoxFuture;
use rover_common::{Result, RoverError};
use tracing::{debug, warn};

fn random_slug() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("tmp.{}", &id[..8])
}

/// Run `f` with a fresh temporary directory under `parent`, purging the
/// directory afterwards no matter how `f` exits.
pub async fn with_temporary_directory<T, F>(parent: &dyn DirectoryUrl, f: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a dyn DirectoryUrl) -> BoxFuture<'a, Result<T>>,
{
    let temp = parent.directory_in_this_directory(&random_slug());
    // Object stores materialize directories on first write; a local
    // directory has to exist before anything can land in it.
    if let Some(local) = temp.as_any().downcast_ref::<FilesystemDirectoryUrl>() {
        tokio::fs::create_dir_all(local.local_file_path()).await?;
    }
    debug!(url = temp.url(), "Created temporary directory");

    let outcome = f(&*temp).await;

    let purged = temp.purge_directory().await;
    if let Some(local) = temp.as_any().downcast_ref::<FilesystemDirectoryUrl>() {
        let _ = tokio::fs::remove_dir(local.local_file_path()).await;
    }
    match (outcome, purged) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), purged) => {
            if let Err(purge_error) = purged {
                warn!(url = temp.url(), error = %purge_error, "Could not purge temporary directory");
            }
            Err(e)
        },
    }
}

/// Run `f` with a randomly-named file slot under `parent`, deleting the
/// file afterwards if `f` created it.
pub async fn with_temporary_file<T, F>(parent: &dyn DirectoryUrl, f: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a dyn FileUrl) -> BoxFuture<'a, Result<T>>,
{
    let temp = parent.file_in_this_directory(&random_slug());
    debug!(url = temp.url(), "Allocated temporary file slot");

    let outcome = f(&*temp).await;

    match temp.delete().await {
        Ok(()) => {},
        // The closure never wrote it; nothing to clean up.
        Err(RoverError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(RoverError::FileNotFound(_)) => {},
        Err(e) => {
            if outcome.is_ok() {
                return Err(e);
            }
            warn!(url = temp.url(), error = %e, "Could not delete temporary file");
        },
    }
    outcome
}
