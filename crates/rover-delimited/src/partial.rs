//! Partially-known hints
//!
//! A [`PartialHints`] carries only recognized hint names with values of the
//! right shape, but need not be complete. It is what the sniffer consumes
//! and produces, and what records format files carry on the wire.

use crate::types::{
    Compression, DateFormat, DateTimeFormat, DateTimeFormatTz, Encoding, Escape, HintName,
    Quoting, TimeOnlyFormat, UntypedHints,
};
use rover_common::{Result, RoverError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Distinguishes `"compression": null` (explicitly none) from the key being
/// absent. Serde folds both into `None` by default; this keeps the outer
/// `Option` for presence and the inner one for the value.
fn double_option<'de, T, D>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// A bag of recognized, well-shaped, possibly-incomplete hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialHints {
    #[serde(rename = "header-row", skip_serializing_if = "Option::is_none")]
    pub header_row: Option<bool>,

    #[serde(rename = "field-delimiter", skip_serializing_if = "Option::is_none")]
    pub field_delimiter: Option<String>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub compression: Option<Option<Compression>>,

    #[serde(rename = "record-terminator", skip_serializing_if = "Option::is_none")]
    pub record_terminator: Option<String>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub quoting: Option<Option<Quoting>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotechar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub doublequote: Option<bool>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub escape: Option<Option<Escape>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dateformat: Option<DateFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeonlyformat: Option<TimeOnlyFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetimeformattz: Option<DateTimeFormatTz>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetimeformat: Option<DateTimeFormat>,
}

impl PartialHints {
    /// Convert an untyped hint bag. An unrecognized name is a programmer
    /// error and fails fast with [`RoverError::UnknownHint`]; a recognized
    /// name with an undecodable value fails with
    /// [`RoverError::UnsupportedHintValue`].
    pub fn from_untyped(untyped: &UntypedHints) -> Result<PartialHints> {
        for name in untyped.keys() {
            if HintName::from_wire(name).is_none() {
                return Err(RoverError::UnknownHint(name.clone()));
            }
        }
        serde_json::from_value(Value::Object(untyped.clone())).map_err(|e| {
            // serde points at the offending key in its message; find the
            // first value that fails its domain check for a precise tag.
            for (name, value) in untyped {
                if let Some(hint) = HintName::from_wire(name) {
                    if !hint.accepts(value) {
                        return RoverError::UnsupportedHintValue {
                            name: name.clone(),
                            value: value.to_string(),
                        };
                    }
                }
            }
            RoverError::Json(e)
        })
    }

    /// The untyped (wire) form.
    pub fn to_untyped(&self) -> UntypedHints {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct of options serializes to an object or not at all.
            _ => UntypedHints::new(),
        }
    }

    /// Whether a hint is present (explicit none counts as present).
    pub fn contains(&self, name: HintName) -> bool {
        match name {
            HintName::HeaderRow => self.header_row.is_some(),
            HintName::FieldDelimiter => self.field_delimiter.is_some(),
            HintName::Compression => self.compression.is_some(),
            HintName::RecordTerminator => self.record_terminator.is_some(),
            HintName::Quoting => self.quoting.is_some(),
            HintName::Quotechar => self.quotechar.is_some(),
            HintName::Doublequote => self.doublequote.is_some(),
            HintName::Escape => self.escape.is_some(),
            HintName::Encoding => self.encoding.is_some(),
            HintName::DateFormat => self.dateformat.is_some(),
            HintName::TimeOnlyFormat => self.timeonlyformat.is_some(),
            HintName::DateTimeFormatTz => self.datetimeformattz.is_some(),
            HintName::DateTimeFormat => self.datetimeformat.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        HintName::ALL.iter().all(|name| !self.contains(*name))
    }

    /// Combine two partial bags; every hint present in `self` wins, and
    /// `weaker` fills the gaps. This is the sniffer's precedence primitive.
    pub fn merged_over(&self, weaker: &PartialHints) -> PartialHints {
        PartialHints {
            header_row: self.header_row.or(weaker.header_row),
            field_delimiter: self
                .field_delimiter
                .clone()
                .or_else(|| weaker.field_delimiter.clone()),
            compression: self.compression.or(weaker.compression),
            record_terminator: self
                .record_terminator
                .clone()
                .or_else(|| weaker.record_terminator.clone()),
            quoting: self.quoting.or(weaker.quoting),
            quotechar: self.quotechar.clone().or_else(|| weaker.quotechar.clone()),
            doublequote: self.doublequote.or(weaker.doublequote),
            escape: self.escape.or(weaker.escape),
            encoding: self.encoding.or(weaker.encoding),
            dateformat: self.dateformat.or(weaker.dateformat),
            timeonlyformat: self.timeonlyformat.or(weaker.timeonlyformat),
            datetimeformattz: self.datetimeformattz.or(weaker.datetimeformattz),
            datetimeformat: self.datetimeformat.or(weaker.datetimeformat),
        }
    }

    /// True when every hint present in `other` is present in `self` with
    /// the same value.
    pub fn contains_all_of(&self, other: &PartialHints) -> bool {
        &other.merged_over(self) == self
    }
}

impl std::fmt::Display for PartialHints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn untyped(value: Value) -> UntypedHints {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_from_untyped_accepts_recognized_names() {
        let hints = PartialHints::from_untyped(&untyped(json!({
            "field-delimiter": "|",
            "header-row": false,
            "compression": "GZIP",
        })))
        .unwrap();
        assert_eq!(hints.field_delimiter.as_deref(), Some("|"));
        assert_eq!(hints.header_row, Some(false));
        assert_eq!(hints.compression, Some(Some(Compression::Gzip)));
    }

    #[test]
    fn test_from_untyped_rejects_unknown_name() {
        let result = PartialHints::from_untyped(&untyped(json!({"fluffiness": 11})));
        assert!(matches!(result, Err(RoverError::UnknownHint(name)) if name == "fluffiness"));
    }

    #[test]
    fn test_from_untyped_rejects_out_of_domain_value() {
        let result = PartialHints::from_untyped(&untyped(json!({"encoding": "KOI8R"})));
        match result {
            Err(RoverError::UnsupportedHintValue { name, value }) => {
                assert_eq!(name, "encoding");
                assert_eq!(value, "\"KOI8R\"");
            },
            other => panic!("expected UnsupportedHintValue, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_null_is_distinct_from_absent() {
        let explicit = PartialHints::from_untyped(&untyped(json!({"compression": null}))).unwrap();
        assert_eq!(explicit.compression, Some(None));
        assert!(explicit.contains(HintName::Compression));

        let absent = PartialHints::from_untyped(&untyped(json!({}))).unwrap();
        assert_eq!(absent.compression, None);
        assert!(!absent.contains(HintName::Compression));
    }

    #[test]
    fn test_wire_round_trip_preserves_explicit_null() {
        let hints = PartialHints {
            compression: Some(None),
            quoting: Some(Some(Quoting::All)),
            ..Default::default()
        };
        let wire = hints.to_untyped();
        assert_eq!(wire.get("compression"), Some(&Value::Null));
        assert_eq!(wire.get("quoting"), Some(&json!("all")));
        assert_eq!(PartialHints::from_untyped(&wire).unwrap(), hints);
    }

    #[test]
    fn test_merged_over_prefers_self() {
        let strong = PartialHints {
            field_delimiter: Some("|".to_string()),
            ..Default::default()
        };
        let weak = PartialHints {
            field_delimiter: Some(",".to_string()),
            header_row: Some(true),
            ..Default::default()
        };
        let merged = strong.merged_over(&weak);
        assert_eq!(merged.field_delimiter.as_deref(), Some("|"));
        assert_eq!(merged.header_row, Some(true));
        assert!(merged.contains_all_of(&strong));
    }
}
