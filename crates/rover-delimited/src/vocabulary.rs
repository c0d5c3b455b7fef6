//! The hint registry (defaults, descriptions, JSON Schema)
//!
//! One entry per [`HintName`], sealed at compile time. Everything a
//! front-end needs to present or validate a hint bag comes from here:
//! the default, the human description, the legal values, and a
//! JSON-Schema-style document for config parsers.

use crate::types::{
    Compression, DateFormat, DateTimeFormat, DateTimeFormatTz, Encoding, Escape, HintName,
    Quoting, TimeOnlyFormat,
};
use serde_json::{json, Value};

const QUOTING_DESCRIPTION: &str = "How quotes are applied to individual fields. \
     all: quote all fields. \
     minimal: quote only fields that contain ambiguous characters (the \
     delimiter, the escape character, or a line terminator). \
     nonnumeric: quote all non-numeric fields. \
     null: never quote fields.";

impl HintName {
    /// The value assumed when the hint is absent. Defaults are total:
    /// every hint has one, so validation can always produce a complete
    /// record.
    pub fn default_value(&self) -> Value {
        match self {
            HintName::HeaderRow => json!(true),
            HintName::FieldDelimiter => json!(","),
            HintName::Compression => Value::Null,
            HintName::RecordTerminator => json!("\n"),
            HintName::Quoting => json!(Quoting::Minimal),
            HintName::Quotechar => json!("\""),
            HintName::Doublequote => json!(false),
            HintName::Escape => json!(Escape::Backslash),
            HintName::Encoding => json!(Encoding::Utf8),
            HintName::DateFormat => json!(DateFormat::YyyyMmDd),
            HintName::TimeOnlyFormat => json!(TimeOnlyFormat::Hh24MiSs),
            HintName::DateTimeFormatTz => json!(DateTimeFormatTz::YyyyMmDdHh24MiSsOf),
            HintName::DateTimeFormat => json!(DateTimeFormat::YyyyMmDdHh24MiSs),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            HintName::HeaderRow => {
                "Whether the first record of the file is a row of column names"
            },
            HintName::FieldDelimiter => "Character used between fields (default is comma)",
            HintName::Compression => "Compression type of the file",
            HintName::RecordTerminator => "String used to close out individual records",
            HintName::Quoting => QUOTING_DESCRIPTION,
            HintName::Quotechar => "Character used to quote fields",
            HintName::Doublequote => {
                "Whether quotes inside quoted fields are represented by doubling the quote character"
            },
            HintName::Escape => "Character used to escape strings",
            HintName::Encoding => "Text encoding of the file",
            HintName::DateFormat => "Rendering of date-only fields",
            HintName::TimeOnlyFormat => "Rendering of time-only fields",
            HintName::DateTimeFormatTz => "Rendering of timezone-aware timestamp fields",
            HintName::DateTimeFormat => "Rendering of timezone-naive timestamp fields",
        }
    }

    /// Legal values for literal hints, as wire values; `None` for hints
    /// that accept any string. A `Value::Null` entry marks a hint whose
    /// domain includes "none".
    pub fn legal_values(&self) -> Option<Vec<Value>> {
        fn wire<T: serde::Serialize>(all: &[T]) -> Vec<Value> {
            all.iter().map(|v| json!(v)).collect()
        }

        match self {
            HintName::HeaderRow | HintName::Doublequote => Some(vec![json!(true), json!(false)]),
            HintName::FieldDelimiter | HintName::Quotechar | HintName::RecordTerminator => None,
            HintName::Compression => {
                let mut values = wire(Compression::ALL);
                values.push(Value::Null);
                Some(values)
            },
            HintName::Quoting => {
                let mut values = wire(Quoting::ALL);
                values.push(Value::Null);
                Some(values)
            },
            HintName::Escape => {
                let mut values = wire(Escape::ALL);
                values.push(Value::Null);
                Some(values)
            },
            HintName::Encoding => Some(wire(Encoding::ALL)),
            HintName::DateFormat => Some(wire(DateFormat::ALL)),
            HintName::TimeOnlyFormat => Some(wire(TimeOnlyFormat::ALL)),
            HintName::DateTimeFormatTz => Some(wire(DateTimeFormatTz::ALL)),
            HintName::DateTimeFormat => Some(wire(DateTimeFormat::ALL)),
        }
    }

    /// JSON-Schema-style document: `type`, optional `enum`, `description`,
    /// `default`.
    pub fn json_schema(&self) -> Value {
        let json_type: Value = match self {
            HintName::HeaderRow | HintName::Doublequote => json!("boolean"),
            HintName::Compression | HintName::Quoting | HintName::Escape => {
                json!(["string", "null"])
            },
            _ => json!("string"),
        };

        let mut doc = serde_json::Map::new();
        doc.insert("type".to_string(), json_type);
        if let Some(values) = self.legal_values() {
            doc.insert("enum".to_string(), Value::Array(values));
        }
        doc.insert("description".to_string(), json!(self.description()));
        doc.insert("default".to_string(), self.default_value());
        Value::Object(doc)
    }

    /// True when `value` lies in this hint's domain.
    pub fn accepts(&self, value: &Value) -> bool {
        match self.legal_values() {
            None => value.is_string(),
            Some(legal) => legal.contains(value),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_hint_has_a_default_in_its_domain() {
        for hint in HintName::ALL {
            assert!(
                hint.accepts(&hint.default_value()),
                "default for {} is outside its own domain",
                hint
            );
        }
    }

    #[test]
    fn test_schema_shape() {
        let schema = HintName::Compression.json_schema();
        assert_eq!(schema["type"], json!(["string", "null"]));
        assert_eq!(schema["enum"], json!(["GZIP", "BZIP", "LZO", null]));
        assert_eq!(schema["default"], Value::Null);
        assert!(schema["description"].as_str().unwrap().contains("Compression"));

        let schema = HintName::FieldDelimiter.json_schema();
        assert_eq!(schema["type"], json!("string"));
        assert!(schema.get("enum").is_none());
        assert_eq!(schema["default"], json!(","));
    }

    #[test]
    fn test_boolean_hints() {
        let schema = HintName::HeaderRow.json_schema();
        assert_eq!(schema["type"], json!("boolean"));
        assert_eq!(schema["default"], json!(true));
        assert!(HintName::HeaderRow.accepts(&json!(false)));
        assert!(!HintName::HeaderRow.accepts(&json!("true")));
    }

    #[test]
    fn test_accepts_rejects_out_of_domain() {
        assert!(HintName::Encoding.accepts(&json!("UTF8")));
        assert!(!HintName::Encoding.accepts(&json!("KOI8R")));
        assert!(HintName::Quoting.accepts(&Value::Null));
        assert!(!HintName::Encoding.accepts(&Value::Null));
        assert!(HintName::FieldDelimiter.accepts(&json!("|")));
        assert!(!HintName::FieldDelimiter.accepts(&json!(4)));
    }
}
