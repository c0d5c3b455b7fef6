//! Records formats and the `_format_<type>` file
//!
//! A records directory carries exactly one format file whose name tells
//! you the format type. Delimited formats keep a JSON body naming the
//! variant and any hint overrides; parquet and avro bodies are empty by
//! contract.

use rover_common::{Result, RoverError};
use rover_delimited::PartialHints;
use rover_url::DirectoryUrl;
use serde_json::{json, Value};
use tracing::info;

const FORMAT_FILE_PREFIX: &str = "_format_";

#[derive(Debug, Clone, PartialEq)]
pub enum RecordsFormat {
    Delimited {
        variant: String,
        hints: PartialHints,
    },
    Parquet,
    Avro,
}

impl RecordsFormat {
    pub fn format_type(&self) -> &'static str {
        match self {
            RecordsFormat::Delimited { .. } => "delimited",
            RecordsFormat::Parquet => "parquet",
            RecordsFormat::Avro => "avro",
        }
    }

    /// The format file's body. Only delimited formats carry one.
    fn body(&self) -> Result<String> {
        match self {
            RecordsFormat::Delimited { variant, hints } => {
                let body = json!({
                    "variant": variant,
                    "hints": Value::Object(hints.to_untyped()),
                });
                Ok(serde_json::to_string(&body)?)
            },
            RecordsFormat::Parquet | RecordsFormat::Avro => Ok(String::new()),
        }
    }
}

/// Reader/writer for the `_format_*` file inside one records directory.
pub struct RecordsFormatFile<'a> {
    records_loc: &'a dyn DirectoryUrl,
}

impl<'a> RecordsFormatFile<'a> {
    pub fn new(records_loc: &'a dyn DirectoryUrl) -> Self {
        RecordsFormatFile { records_loc }
    }

    /// Load the directory's format. Exactly one `_format_*` file must be
    /// present.
    pub async fn load(&self) -> Result<RecordsFormat> {
        let matching = self
            .records_loc
            .files_matching_prefix(FORMAT_FILE_PREFIX)
            .await?;
        let [format_loc] = matching.as_slice() else {
            return Err(RoverError::FileNotFound(format!(
                "{}{FORMAT_FILE_PREFIX}*",
                self.records_loc.url()
            )));
        };
        let format_type = format_loc.filename()[FORMAT_FILE_PREFIX.len()..].to_string();
        match format_type.as_str() {
            "delimited" => {
                let Some(data) = format_loc.json_contents().await? else {
                    return Err(RoverError::DetailedFormatRequired(
                        format_loc.url().to_string(),
                    ));
                };
                let Some(variant) = data.get("variant").and_then(|v| v.as_str()) else {
                    return Err(RoverError::MissingVariant(format_loc.url().to_string()));
                };
                let hints = match data.get("hints") {
                    Some(raw) => serde_json::from_value(raw.clone())?,
                    None => PartialHints::default(),
                };
                Ok(RecordsFormat::Delimited {
                    variant: variant.to_string(),
                    hints,
                })
            },
            "parquet" => Ok(RecordsFormat::Parquet),
            "avro" => Ok(RecordsFormat::Avro),
            other => Err(RoverError::Config(format!(
                "format type {other} is not supported"
            ))),
        }
    }

    pub async fn save(&self, format: &RecordsFormat) -> Result<()> {
        let file_loc = self
            .records_loc
            .file_in_this_directory(&format!("{FORMAT_FILE_PREFIX}{}", format.format_type()));
        info!(url = file_loc.url(), "Storing format info");
        file_loc.store_string(&format.body()?).await
    }
}
