//! Records-directory artifacts.
//!
//! A records directory is a storage directory holding data files plus
//! metadata siblings: a `_format_<type>` file describing how the data is
//! encoded, a manifest listing the data files, and optional `_schema.json`
//! and `_schema` files carried through verbatim.
//!
//! # Example
//!
//! ```no_run
//! use rover_records::{RecordsDirectory, RecordsManifest};
//! use rover_url::{DirectoryUrl, FilesystemDirectoryUrl};
//! use std::path::Path;
//!
//! # async fn demo() -> rover_common::Result<()> {
//! let loc = FilesystemDirectoryUrl::from_path(Path::new("/data/out"))?;
//! let directory = RecordsDirectory::new(Box::new(loc));
//! let mut manifest = RecordsManifest::new();
//! let mut part = tokio::fs::File::open("/data/in/part-01.csv").await?;
//! let length = directory.save_data("part-01.csv", &mut part).await?;
//! manifest.push(
//!     directory.location().file_in_this_directory("part-01.csv").url(),
//!     length,
//! );
//! directory.save_preliminary_manifest(Some(manifest)).await?;
//! directory.finalize_manifest().await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod directory;
pub mod format;
pub mod manifest;
pub mod schema;

pub use directory::RecordsDirectory;
pub use format::{RecordsFormat, RecordsFormatFile};
pub use manifest::{EntryMeta, ManifestEntry, RecordsManifest};
pub use schema::{RecordsSchemaJsonFile, RecordsSchemaSqlFile};
