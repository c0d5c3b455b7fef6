//! Rover URL Library
//!
//! Scheme-agnostic file and directory URLs over the local filesystem,
//! S3, and Cloud Storage, plus optimized directory-to-directory copy
//! strategies (AWS CLI sync, managed cross-cloud transfer jobs).
//!
//! # Example
//!
//! ```no_run
//! use rover_url::UrlResolver;
//!
//! async fn head(resolver: &UrlResolver) -> rover_common::Result<String> {
//!     let file = resolver.file_url("s3://bucket/dir/part-01.csv")?;
//!     file.string_contents(encoding_rs::UTF_8).await
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod base;
pub mod filesystem;
pub mod gcs;
pub mod optimizer;
pub mod resolver;
pub mod s3;
pub mod temp;

// Re-export commonly used types
pub use base::{DirectoryUrl, FileUrl};
pub use filesystem::{FilesystemDirectoryUrl, FilesystemFileUrl};
pub use gcs::{GcpCredentials, GcsClient, GcsDirectoryUrl, GcsFileUrl};
pub use optimizer::gcp_transfer::GcpDataTransferService;
pub use optimizer::CopyOptimizer;
pub use resolver::UrlResolver;
pub use s3::{S3Context, S3DirectoryUrl, S3FileUrl};
pub use temp::{with_temporary_directory, with_temporary_file};
