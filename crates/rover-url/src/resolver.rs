//! Scheme dispatch from URL strings to concrete backends

use crate::base::{DirectoryUrl, FileUrl};
use crate::filesystem::{FilesystemDirectoryUrl, FilesystemFileUrl};
use crate::gcs::{GcsClient, GcsDirectoryUrl, GcsFileUrl};
use crate::s3::{S3Context, S3DirectoryUrl, S3FileUrl};
use rover_common::{Result, RoverError};
use std::path::Path;

/// Turns URL strings into [`FileUrl`]/[`DirectoryUrl`] values for the
/// schemes it has been given clients for. The local filesystem needs no
/// client and always works; a bare path with no scheme is treated as a
/// local path.
#[derive(Clone, Default)]
pub struct UrlResolver {
    s3: Option<S3Context>,
    gcs: Option<GcsClient>,
}

impl UrlResolver {
    pub fn new() -> Self {
        UrlResolver::default()
    }

    pub fn with_s3(mut self, context: S3Context) -> Self {
        self.s3 = Some(context);
        self
    }

    pub fn with_gcs(mut self, client: GcsClient) -> Self {
        self.gcs = Some(client);
        self
    }

    fn scheme_of(url: &str) -> Option<&str> {
        url.split_once("://").map(|(scheme, _)| scheme)
    }

    /// Resolve a file URL. The URL must not end in `/`.
    pub fn file_url(&self, url: &str) -> Result<Box<dyn FileUrl>> {
        if url.ends_with('/') {
            return Err(RoverError::InvalidUrl(format!(
                "{url} names a directory, not a file"
            )));
        }
        match Self::scheme_of(url) {
            None => Ok(Box::new(FilesystemFileUrl::from_path(Path::new(url))?)),
            Some("file") => Ok(Box::new(FilesystemFileUrl::from_url(url)?)),
            Some("s3") => {
                let context = self.s3_context(url)?;
                Ok(Box::new(S3FileUrl::from_url(url, context)?))
            },
            Some("gs") => {
                let client = self.gcs_client(url)?;
                Ok(Box::new(GcsFileUrl::from_url(url, client)?))
            },
            Some(other) => Err(RoverError::UnknownScheme(other.to_string())),
        }
    }

    /// Resolve a directory URL. The URL must end in `/` (bare local
    /// paths are exempt).
    pub fn directory_url(&self, url: &str) -> Result<Box<dyn DirectoryUrl>> {
        match Self::scheme_of(url) {
            None => Ok(Box::new(FilesystemDirectoryUrl::from_path(Path::new(
                url.trim_end_matches('/'),
            ))?)),
            Some(scheme) => {
                if !url.ends_with('/') {
                    return Err(RoverError::InvalidUrl(format!(
                        "{url} names a file, not a directory"
                    )));
                }
                match scheme {
                    "file" => Ok(Box::new(FilesystemDirectoryUrl::from_url(url)?)),
                    "s3" => {
                        let context = self.s3_context(url)?;
                        Ok(Box::new(S3DirectoryUrl::from_url(url, context)?))
                    },
                    "gs" => {
                        let client = self.gcs_client(url)?;
                        Ok(Box::new(GcsDirectoryUrl::from_url(url, client)?))
                    },
                    other => Err(RoverError::UnknownScheme(other.to_string())),
                }
            },
        }
    }

    fn s3_context(&self, url: &str) -> Result<S3Context> {
        self.s3.clone().ok_or_else(|| {
            RoverError::Config(format!("no AWS client configured for {url}"))
        })
    }

    fn gcs_client(&self, url: &str) -> Result<GcsClient> {
        self.gcs.clone().ok_or_else(|| {
            RoverError::Config(format!("no GCP client configured for {url}"))
        })
    }
}
