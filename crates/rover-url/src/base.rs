//! Scheme-agnostic URL contracts
//!
//! [`FileUrl`] and [`DirectoryUrl`] are the only shapes the rest of the
//! system manipulates; every scheme implements the same contract and
//! callers stay oblivious to where bytes actually live. Default methods
//! express each operation in terms of the primitive ones, so a backend
//! only overrides where it has a faster native path (server-side copy,
//! multipart concatenation).
//!
//! A URL names a directory exactly when it ends in `/`. Listings are
//! non-recursive.

use rover_common::{Result, RoverError};
use serde_json::Value;
use std::any::Any;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Byte stream handed out by [`FileUrl::open`].
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// A URL naming a single file on some scheme.
#[async_trait::async_trait]
pub trait FileUrl: Send + Sync {
    /// The full URL, never ending in `/`.
    fn url(&self) -> &str;

    fn scheme(&self) -> &str;

    /// Final path component, stripped of directory information.
    fn filename(&self) -> String {
        let url = self.url();
        url[url.rfind('/').map_or(0, |i| i + 1)..].to_string()
    }

    fn containing_directory(&self) -> Box<dyn DirectoryUrl>;

    /// Concrete-type escape hatch for scheme-specific fast paths.
    fn as_any(&self) -> &dyn Any;

    /// Open the file for reading. A missing file is
    /// [`RoverError::FileNotFound`].
    async fn open(&self) -> Result<ByteStream>;

    /// Replace the file's contents with everything `reader` yields,
    /// returning the number of bytes written.
    async fn upload_from(&self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<u64>;

    async fn delete(&self) -> Result<()>;

    async fn size(&self) -> Result<u64>;

    /// Rename within the same scheme. Cross-scheme renames fail with
    /// [`RoverError::CrossSchemeRename`].
    async fn rename_to(&self, other: &dyn FileUrl) -> Result<()>;

    async fn exists(&self) -> Result<bool> {
        match self.open().await {
            Ok(_) => Ok(true),
            Err(RoverError::FileNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn download_to(&self, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64> {
        let mut reader = self.open().await?;
        let written = tokio::io::copy(&mut reader, writer).await?;
        writer.flush().await?;
        Ok(written)
    }

    async fn store_string(&self, contents: &str) -> Result<()> {
        let mut reader = std::io::Cursor::new(contents.as_bytes().to_vec());
        self.upload_from(&mut reader).await?;
        Ok(())
    }

    /// The file's contents decoded with `codec`.
    async fn string_contents(&self, codec: &'static encoding_rs::Encoding) -> Result<String> {
        let mut reader = self.open().await?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let (text, _, _) = codec.decode(&bytes);
        Ok(text.into_owned())
    }

    /// The file parsed as JSON; a zero-byte file is `None`.
    async fn json_contents(&self) -> Result<Option<Value>> {
        let contents = self.string_contents(encoding_rs::UTF_8).await?;
        if contents.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Stream-based copy. Backends with a server-side path override this.
    async fn copy_to(&self, other: &dyn FileUrl) -> Result<()> {
        let mut reader = self.open().await?;
        other.upload_from(&mut reader).await?;
        Ok(())
    }

    /// Concatenate the sources into this file, in order. The default
    /// buffers and re-uploads; object stores override with server-side
    /// composition where the sources allow it. Returns the bytes written
    /// when the backend counted them.
    async fn concatenate_from(&self, sources: &[Box<dyn FileUrl>]) -> Result<Option<u64>> {
        concatenate_by_streaming(self, sources).await
    }

    /// Poll until the file exists. Useful against eventually-consistent
    /// stores; the caller owns the overall deadline.
    async fn wait_to_exist(&self, interval: Duration) -> Result<()> {
        loop {
            if self.exists().await? {
                return Ok(());
            }
            info!(url = self.url(), "Waiting for file to appear");
            tokio::time::sleep(interval).await;
        }
    }
}

/// A URL naming a directory on some scheme; always ends in `/`.
#[async_trait::async_trait]
pub trait DirectoryUrl: Send + Sync {
    /// The full URL, always ending in `/`.
    fn url(&self) -> &str;

    fn scheme(&self) -> &str;

    fn file_in_this_directory(&self, name: &str) -> Box<dyn FileUrl>;

    fn directory_in_this_directory(&self, name: &str) -> Box<dyn DirectoryUrl>;

    fn containing_directory(&self) -> Box<dyn DirectoryUrl>;

    /// Final path component of the directory itself.
    fn filename(&self) -> String {
        let trimmed = self.url().trim_end_matches('/');
        trimmed[trimmed.rfind('/').map_or(0, |i| i + 1)..].to_string()
    }

    /// Concrete-type escape hatch for scheme-specific fast paths.
    fn as_any(&self) -> &dyn Any;

    /// Files directly in this directory. Does not recurse.
    async fn files_in_directory(&self) -> Result<Vec<Box<dyn FileUrl>>>;

    /// Immediate subdirectories. Does not recurse.
    async fn directories_in_directory(&self) -> Result<Vec<Box<dyn DirectoryUrl>>>;

    /// Files (not subdirectories) whose name starts with `prefix`,
    /// relative to this directory.
    async fn files_matching_prefix(&self, prefix: &str) -> Result<Vec<Box<dyn FileUrl>>> {
        let files = self.files_in_directory().await?;
        Ok(files
            .into_iter()
            .filter(|f| f.filename().starts_with(prefix))
            .collect())
    }

    /// Delete every descendant of this directory.
    async fn purge_directory(&self) -> Result<()>;

    /// Recursive, entry-by-entry copy into `other`.
    async fn copy_to(&self, other: &dyn DirectoryUrl) -> Result<()> {
        for file in self.files_in_directory().await? {
            let dest = other.file_in_this_directory(&file.filename());
            file.copy_to(&*dest).await?;
        }
        for subdirectory in self.directories_in_directory().await? {
            let dest = other.directory_in_this_directory(&subdirectory.filename());
            subdirectory.copy_to(&*dest).await?;
        }
        Ok(())
    }

    async fn empty(&self) -> Result<bool> {
        Ok(self.files_in_directory().await?.is_empty()
            && self.directories_in_directory().await?.is_empty())
    }

    /// Probe writability with a tiny write, read-back, and delete.
    /// Any failure along the way reads as "not writable".
    async fn writable(&self) -> Result<bool> {
        let name = format!(".write-probe-{}", uuid::Uuid::new_v4());
        let probe = self.file_in_this_directory(&name);
        let round_trip = async {
            probe.store_string("probe").await?;
            let read_back = probe.string_contents(encoding_rs::UTF_8).await?;
            Ok::<bool, RoverError>(read_back == "probe")
        };
        match round_trip.await {
            Ok(matched) => {
                probe.delete().await?;
                Ok(matched)
            },
            Err(e) => {
                debug!(url = self.url(), error = %e, "Write probe failed");
                Ok(false)
            },
        }
    }

    /// Total bytes held beneath this directory.
    async fn size(&self) -> Result<u64> {
        let mut total = 0;
        for file in self.files_in_directory().await? {
            total += file.size().await?;
        }
        for subdirectory in self.directories_in_directory().await? {
            total += subdirectory.size().await?;
        }
        Ok(total)
    }
}

/// Shared fallback for [`FileUrl::concatenate_from`]: pull every source
/// through memory and upload the combined bytes.
pub async fn concatenate_by_streaming(
    dest: &(impl FileUrl + ?Sized),
    sources: &[Box<dyn FileUrl>],
) -> Result<Option<u64>> {
    let mut combined = Vec::new();
    for source in sources {
        let mut reader = source.open().await?;
        reader.read_to_end(&mut combined).await?;
    }
    let mut cursor = std::io::Cursor::new(combined);
    let written = dest.upload_from(&mut cursor).await?;
    Ok(Some(written))
}

/// `true` exactly when the URL names a directory.
pub fn is_directory_url(url: &str) -> bool {
    url.ends_with('/')
}
