//! The records-directory manifest
//!
//! A JSON index of every data file in the directory, in insertion order.
//! A preliminary manifest lives at `manifest` while the directory is
//! being written; finalizing renames it to `_manifest`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub content_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    pub mandatory: bool,
    pub meta: EntryMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsManifest {
    pub entries: Vec<ManifestEntry>,
}

impl RecordsManifest {
    pub fn new() -> Self {
        RecordsManifest::default()
    }

    pub fn push(&mut self, url: &str, content_length: u64) {
        self.entries.push(ManifestEntry {
            url: url.to_string(),
            mandatory: true,
            meta: EntryMeta { content_length },
        });
    }

    pub fn entry_urls(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.url.as_str()).collect()
    }

    pub fn total_content_length(&self) -> u64 {
        self.entries.iter().map(|e| e.meta.content_length).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_survives_serialization() {
        let mut manifest = RecordsManifest::new();
        manifest.push("s3://b/d/part-02.csv", 20);
        manifest.push("s3://b/d/part-01.csv", 10);

        let wire = serde_json::to_string(&manifest).unwrap();
        let back: RecordsManifest = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, manifest);
        assert_eq!(
            back.entry_urls(),
            vec!["s3://b/d/part-02.csv", "s3://b/d/part-01.csv"]
        );
        assert_eq!(back.total_content_length(), 30);
    }

    #[test]
    fn test_wire_shape() {
        let mut manifest = RecordsManifest::new();
        manifest.push("file:///tmp/d/part-01.csv", 42);
        let wire: serde_json::Value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "entries": [{
                    "url": "file:///tmp/d/part-01.csv",
                    "mandatory": true,
                    "meta": {"content_length": 42}
                }]
            })
        );
    }
}
