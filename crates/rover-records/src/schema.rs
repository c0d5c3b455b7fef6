//! Schema file pass-through
//!
//! The records schema travels in two sibling files: `_schema.json`
//! (records-schema JSON) and `_schema` (SQL DDL text). Both are opaque
//! strings here; drivers interpret them.

use rover_common::{Result, RoverError};
use rover_url::DirectoryUrl;
use tracing::info;

pub struct RecordsSchemaJsonFile<'a> {
    records_loc: &'a dyn DirectoryUrl,
}

impl<'a> RecordsSchemaJsonFile<'a> {
    pub fn new(records_loc: &'a dyn DirectoryUrl) -> Self {
        RecordsSchemaJsonFile { records_loc }
    }

    pub async fn load(&self) -> Result<Option<String>> {
        load_optional(self.records_loc, "_schema.json").await
    }

    pub async fn save(&self, schema_json: &str) -> Result<()> {
        let loc = self.records_loc.file_in_this_directory("_schema.json");
        info!(url = loc.url(), "Storing records schema");
        loc.store_string(schema_json).await
    }
}

pub struct RecordsSchemaSqlFile<'a> {
    records_loc: &'a dyn DirectoryUrl,
}

impl<'a> RecordsSchemaSqlFile<'a> {
    pub fn new(records_loc: &'a dyn DirectoryUrl) -> Self {
        RecordsSchemaSqlFile { records_loc }
    }

    pub async fn load(&self) -> Result<Option<String>> {
        load_optional(self.records_loc, "_schema").await
    }

    pub async fn save(&self, schema_sql: &str) -> Result<()> {
        let loc = self.records_loc.file_in_this_directory("_schema");
        info!(url = loc.url(), "Storing schema SQL");
        loc.store_string(schema_sql).await
    }
}

async fn load_optional(records_loc: &dyn DirectoryUrl, name: &str) -> Result<Option<String>> {
    let loc = records_loc.file_in_this_directory(name);
    match loc.string_contents(encoding_rs::UTF_8).await {
        Ok(contents) => Ok(Some(contents)),
        Err(RoverError::FileNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rover_url::FilesystemDirectoryUrl;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_schema_files_round_trip_and_absent_is_none() {
        let tmp = TempDir::new().unwrap();
        let dir = FilesystemDirectoryUrl::from_path(tmp.path()).unwrap();

        assert_eq!(RecordsSchemaJsonFile::new(&dir).load().await.unwrap(), None);
        assert_eq!(RecordsSchemaSqlFile::new(&dir).load().await.unwrap(), None);

        RecordsSchemaJsonFile::new(&dir)
            .save("{\"fields\": {}}")
            .await
            .unwrap();
        RecordsSchemaSqlFile::new(&dir)
            .save("CREATE TABLE t (a int);")
            .await
            .unwrap();

        assert_eq!(
            RecordsSchemaJsonFile::new(&dir).load().await.unwrap(),
            Some("{\"fields\": {}}".to_string())
        );
        assert_eq!(
            RecordsSchemaSqlFile::new(&dir).load().await.unwrap(),
            Some("CREATE TABLE t (a int);".to_string())
        );
    }
}
