//! A records directory: data files, one format file, a manifest, and
//! optional schema files, all behind one [`DirectoryUrl`].

use crate::format::{RecordsFormat, RecordsFormatFile};
use crate::manifest::RecordsManifest;
use crate::schema::{RecordsSchemaJsonFile, RecordsSchemaSqlFile};
use rover_common::{Result, RoverError};
use rover_url::{DirectoryUrl, FileUrl};
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::{info, warn};

const PRELIMINARY_MANIFEST: &str = "manifest";
const FINAL_MANIFEST: &str = "_manifest";

/// How often `finalize_manifest` polls an eventually-consistent store
/// for the renamed manifest.
const MANIFEST_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct RecordsDirectory {
    loc: Box<dyn DirectoryUrl>,
}

impl RecordsDirectory {
    pub fn new(loc: Box<dyn DirectoryUrl>) -> Self {
        RecordsDirectory { loc }
    }

    pub fn location(&self) -> &dyn DirectoryUrl {
        &*self.loc
    }

    pub async fn save_format(&self, format: &RecordsFormat) -> Result<()> {
        RecordsFormatFile::new(&*self.loc).save(format).await
    }

    pub async fn load_format(&self) -> Result<RecordsFormat> {
        RecordsFormatFile::new(&*self.loc).load().await
    }

    pub async fn save_schema_json(&self, schema_json: &str) -> Result<()> {
        RecordsSchemaJsonFile::new(&*self.loc).save(schema_json).await
    }

    pub async fn load_schema_json(&self) -> Result<Option<String>> {
        RecordsSchemaJsonFile::new(&*self.loc).load().await
    }

    pub async fn save_schema_sql(&self, schema_sql: &str) -> Result<()> {
        RecordsSchemaSqlFile::new(&*self.loc).save(schema_sql).await
    }

    pub async fn load_schema_sql(&self) -> Result<Option<String>> {
        RecordsSchemaSqlFile::new(&*self.loc).load().await
    }

    /// Upload one data file into the directory, returning its length for
    /// the caller's manifest.
    pub async fn save_data(
        &self,
        target_name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64> {
        let target = self.loc.file_in_this_directory(target_name);
        info!(url = target.url(), "Uploading data file");
        target.upload_from(reader).await
    }

    /// Write the preliminary manifest. With `None` the manifest is built
    /// by listing the directory, which risks capturing stray files;
    /// prefer passing the entries you actually wrote.
    pub async fn save_preliminary_manifest(
        &self,
        manifest: Option<RecordsManifest>,
    ) -> Result<()> {
        let manifest = match manifest {
            Some(manifest) => manifest,
            None => {
                warn!(url = self.loc.url(), "Building manifest by listing directory contents");
                let mut built = RecordsManifest::new();
                for file in self.loc.files_in_directory().await? {
                    let name = file.filename();
                    if name.starts_with('_') || name == PRELIMINARY_MANIFEST {
                        continue;
                    }
                    built.push(file.url(), file.size().await?);
                }
                built
            },
        };
        let manifest_loc = self.loc.file_in_this_directory(PRELIMINARY_MANIFEST);
        info!(url = manifest_loc.url(), "Storing manifest");
        manifest_loc
            .store_string(&serde_json::to_string(&manifest)?)
            .await
    }

    /// Promote the preliminary manifest to `_manifest`, which marks the
    /// directory complete for readers.
    pub async fn finalize_manifest(&self) -> Result<()> {
        let preliminary = self.loc.file_in_this_directory(PRELIMINARY_MANIFEST);
        let finalized = self.loc.file_in_this_directory(FINAL_MANIFEST);
        if finalized.exists().await? {
            info!(url = finalized.url(), "Replacing an existing finalized manifest");
            finalized.delete().await?;
        }
        preliminary.rename_to(&*finalized).await?;
        finalized.wait_to_exist(MANIFEST_POLL_INTERVAL).await
    }

    /// The directory's manifest, preferring the finalized one.
    pub async fn manifest(&self) -> Result<RecordsManifest> {
        let finalized = self.loc.file_in_this_directory(FINAL_MANIFEST);
        let contents = match finalized.json_contents().await {
            Ok(contents) => contents,
            Err(RoverError::FileNotFound(_)) => {
                self.loc
                    .file_in_this_directory(PRELIMINARY_MANIFEST)
                    .json_contents()
                    .await?
            },
            Err(e) => return Err(e),
        };
        let Some(contents) = contents else {
            return Err(RoverError::Config(format!(
                "manifest in {} is empty",
                self.loc.url()
            )));
        };
        Ok(serde_json::from_value(contents)?)
    }

    /// Collapse the directory's data files into a single output file.
    /// Multi-file directories concatenate, which only works for
    /// headerless delimited data.
    pub async fn save_to_url(&self, output: &dyn FileUrl) -> Result<()> {
        let manifest = self.manifest().await?;
        let filenames: Vec<String> = manifest
            .entry_urls()
            .iter()
            .map(|url| filename_of_url(url))
            .collect();

        if let [only] = filenames.as_slice() {
            return self
                .loc
                .file_in_this_directory(only)
                .copy_to(output)
                .await;
        }

        let format = self.load_format().await?;
        let RecordsFormat::Delimited { hints, .. } = &format else {
            return Err(RoverError::Config(format!(
                "cannot concatenate {} data files",
                format.format_type()
            )));
        };
        if hints.header_row.unwrap_or(true) {
            return Err(RoverError::Config(
                "cannot concatenate delimited files that carry a header row".to_string(),
            ));
        }
        let sources: Vec<Box<dyn FileUrl>> = filenames
            .iter()
            .map(|name| self.loc.file_in_this_directory(name))
            .collect();
        info!(from = self.loc.url(), to = output.url(), "Concatenating data files");
        output.concatenate_from(&sources).await?;
        Ok(())
    }

    /// Copy the whole directory and rebuild the manifest so its entries
    /// point at the new location.
    pub async fn copy_to(&self, new_loc: Box<dyn DirectoryUrl>) -> Result<RecordsDirectory> {
        info!(from = self.loc.url(), to = new_loc.url(), "Copying records directory");
        self.loc.copy_to(&*new_loc).await?;

        let new_directory = RecordsDirectory::new(new_loc);
        let old_manifest = self.manifest().await?;
        let mut rebuilt = RecordsManifest::new();
        for old_url in old_manifest.entry_urls() {
            let new_file = new_directory
                .loc
                .file_in_this_directory(&filename_of_url(old_url));
            let length = new_file.size().await?;
            rebuilt.push(new_file.url(), length);
        }
        new_directory
            .save_preliminary_manifest(Some(rebuilt))
            .await?;

        let was_finalized = self
            .loc
            .file_in_this_directory(FINAL_MANIFEST)
            .exists()
            .await?;
        if was_finalized {
            new_directory.finalize_manifest().await?;
        }
        Ok(new_directory)
    }
}

fn filename_of_url(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    path[path.rfind('/').map_or(0, |i| i + 1)..].to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rover_delimited::PartialHints;
    use rover_url::FilesystemDirectoryUrl;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn records_dir(tmp: &TempDir) -> RecordsDirectory {
        RecordsDirectory::new(Box::new(
            FilesystemDirectoryUrl::from_path(tmp.path()).unwrap(),
        ))
    }

    fn headerless_format() -> RecordsFormat {
        RecordsFormat::Delimited {
            variant: "bluelabs".to_string(),
            hints: PartialHints {
                header_row: Some(false),
                ..Default::default()
            },
        }
    }

    async fn write_directory(directory: &RecordsDirectory) -> RecordsManifest {
        let mut manifest = RecordsManifest::new();
        for (name, contents) in [("part-01.csv", "1,a\n"), ("part-02.csv", "2,b\n")] {
            let mut reader = Cursor::new(contents.as_bytes().to_vec());
            let length = directory.save_data(name, &mut reader).await.unwrap();
            let url = directory.location().file_in_this_directory(name);
            manifest.push(url.url(), length);
        }
        manifest
    }

    #[tokio::test]
    async fn test_full_write_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let directory = records_dir(&tmp);

        let manifest = write_directory(&directory).await;
        directory
            .save_preliminary_manifest(Some(manifest.clone()))
            .await
            .unwrap();
        directory.save_format(&headerless_format()).await.unwrap();
        directory.save_schema_json("{\"fields\": {}}").await.unwrap();
        directory.finalize_manifest().await.unwrap();

        assert_eq!(directory.manifest().await.unwrap(), manifest);
        assert_eq!(directory.load_format().await.unwrap(), headerless_format());
        assert_eq!(
            directory.load_schema_json().await.unwrap().as_deref(),
            Some("{\"fields\": {}}")
        );
    }

    #[tokio::test]
    async fn test_manifest_from_listing_skips_metadata_files() {
        let tmp = TempDir::new().unwrap();
        let directory = records_dir(&tmp);
        write_directory(&directory).await;
        directory.save_format(&headerless_format()).await.unwrap();

        directory.save_preliminary_manifest(None).await.unwrap();
        let manifest = directory.manifest().await.unwrap();
        let mut names: Vec<String> = manifest
            .entry_urls()
            .iter()
            .map(|u| filename_of_url(u))
            .collect();
        names.sort();
        assert_eq!(names, vec!["part-01.csv", "part-02.csv"]);
    }

    #[tokio::test]
    async fn test_save_to_url_concatenates_headerless_parts() {
        let tmp = TempDir::new().unwrap();
        let directory = records_dir(&tmp);
        let manifest = write_directory(&directory).await;
        directory
            .save_preliminary_manifest(Some(manifest))
            .await
            .unwrap();
        directory.save_format(&headerless_format()).await.unwrap();

        let out_tmp = TempDir::new().unwrap();
        let out_dir = FilesystemDirectoryUrl::from_path(out_tmp.path()).unwrap();
        let output = out_dir.file_in_this_directory("combined.csv");
        directory.save_to_url(&*output).await.unwrap();

        assert_eq!(
            output.string_contents(encoding_rs::UTF_8).await.unwrap(),
            "1,a\n2,b\n"
        );
    }

    #[tokio::test]
    async fn test_save_to_url_refuses_headered_concatenation() {
        let tmp = TempDir::new().unwrap();
        let directory = records_dir(&tmp);
        let manifest = write_directory(&directory).await;
        directory
            .save_preliminary_manifest(Some(manifest))
            .await
            .unwrap();
        directory
            .save_format(&RecordsFormat::Delimited {
                variant: "csv".to_string(),
                hints: PartialHints {
                    header_row: Some(true),
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        let out_tmp = TempDir::new().unwrap();
        let out_dir = FilesystemDirectoryUrl::from_path(out_tmp.path()).unwrap();
        let output = out_dir.file_in_this_directory("combined.csv");
        assert!(matches!(
            directory.save_to_url(&*output).await,
            Err(RoverError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_copy_to_rewrites_manifest_urls() {
        let tmp = TempDir::new().unwrap();
        let directory = records_dir(&tmp);
        let manifest = write_directory(&directory).await;
        directory
            .save_preliminary_manifest(Some(manifest))
            .await
            .unwrap();
        directory.save_format(&headerless_format()).await.unwrap();
        directory.finalize_manifest().await.unwrap();

        let dest_tmp = TempDir::new().unwrap();
        let copied = directory
            .copy_to(Box::new(
                FilesystemDirectoryUrl::from_path(dest_tmp.path()).unwrap(),
            ))
            .await
            .unwrap();

        let new_manifest = copied.manifest().await.unwrap();
        assert_eq!(new_manifest.entries.len(), 2);
        for entry in &new_manifest.entries {
            assert!(
                entry.url.starts_with(copied.location().url()),
                "{} should live under the new location",
                entry.url
            );
        }
    }
}
