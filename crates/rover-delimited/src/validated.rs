//! Fully-validated hints
//!
//! [`ValidatedHints`] is the only shape a driver-specific code path ever
//! consumes: every field populated, every value inside its domain. The
//! strictness flag decides whether an out-of-domain input is an error or a
//! logged substitution; lax mode never substitutes silently.

use crate::types::{
    Compression, DateFormat, DateTimeFormat, DateTimeFormatTz, Encoding, Escape, HintName,
    Quoting, TimeOnlyFormat, UntypedHints,
};
use rover_common::{Result, RoverError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// An immutable, complete, in-domain hint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedHints {
    pub header_row: bool,
    pub field_delimiter: String,
    pub compression: Option<Compression>,
    pub record_terminator: String,
    pub quoting: Option<Quoting>,
    pub quotechar: String,
    pub doublequote: bool,
    pub escape: Option<Escape>,
    pub encoding: Encoding,
    pub dateformat: DateFormat,
    pub timeonlyformat: TimeOnlyFormat,
    pub datetimeformattz: DateTimeFormatTz,
    pub datetimeformat: DateTimeFormat,
}

impl Default for ValidatedHints {
    /// The all-defaults record: what `validate` returns for an empty bag.
    fn default() -> Self {
        ValidatedHints {
            header_row: true,
            field_delimiter: ",".to_string(),
            compression: None,
            record_terminator: "\n".to_string(),
            quoting: Some(Quoting::Minimal),
            quotechar: "\"".to_string(),
            doublequote: false,
            escape: Some(Escape::Backslash),
            encoding: Encoding::Utf8,
            dateformat: DateFormat::YyyyMmDd,
            timeonlyformat: TimeOnlyFormat::Hh24MiSs,
            datetimeformattz: DateTimeFormatTz::YyyyMmDdHh24MiSsOf,
            datetimeformat: DateTimeFormat::YyyyMmDdHh24MiSs,
        }
    }
}

impl ValidatedHints {
    /// Validate an untyped bag into a complete record.
    ///
    /// Each recognized hint is coerced if present and defaulted if absent.
    /// A present value outside its domain either fails
    /// ([`RoverError::UnsupportedHintValue`], when `strict`) or is replaced
    /// by the default after a warning.
    pub fn validate(untyped: &UntypedHints, strict: bool) -> Result<ValidatedHints> {
        let mut out = ValidatedHints::default();

        for name in HintName::ALL {
            let Some(value) = untyped.get(name.as_str()) else {
                continue;
            };
            if !name.accepts(value) {
                cant_handle_hint(strict, name.as_str(), untyped)?;
                continue;
            }
            // In-domain by the check above, so the typed parse cannot fail.
            out.set_from_wire(*name, value)?;
        }
        Ok(out)
    }

    fn set_from_wire(&mut self, name: HintName, value: &Value) -> Result<()> {
        fn typed<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T> {
            serde_json::from_value(value.clone()).map_err(RoverError::Json)
        }

        match name {
            HintName::HeaderRow => self.header_row = typed(value)?,
            HintName::FieldDelimiter => self.field_delimiter = typed(value)?,
            HintName::Compression => self.compression = typed(value)?,
            HintName::RecordTerminator => self.record_terminator = typed(value)?,
            HintName::Quoting => self.quoting = typed(value)?,
            HintName::Quotechar => self.quotechar = typed(value)?,
            HintName::Doublequote => self.doublequote = typed(value)?,
            HintName::Escape => self.escape = typed(value)?,
            HintName::Encoding => self.encoding = typed(value)?,
            HintName::DateFormat => self.dateformat = typed(value)?,
            HintName::TimeOnlyFormat => self.timeonlyformat = typed(value)?,
            HintName::DateTimeFormatTz => self.datetimeformattz = typed(value)?,
            HintName::DateTimeFormat => self.datetimeformat = typed(value)?,
        }
        Ok(())
    }

    /// The wire value of one field, mostly useful to report residual hints
    /// a driver did not consume.
    pub fn field_for(&self, name: HintName) -> Value {
        match name {
            HintName::HeaderRow => Value::Bool(self.header_row),
            HintName::FieldDelimiter => Value::String(self.field_delimiter.clone()),
            HintName::Compression => wire_option(&self.compression),
            HintName::RecordTerminator => Value::String(self.record_terminator.clone()),
            HintName::Quoting => wire_option(&self.quoting),
            HintName::Quotechar => Value::String(self.quotechar.clone()),
            HintName::Doublequote => Value::Bool(self.doublequote),
            HintName::Escape => wire_option(&self.escape),
            HintName::Encoding => wire_enum(&self.encoding),
            HintName::DateFormat => wire_enum(&self.dateformat),
            HintName::TimeOnlyFormat => wire_enum(&self.timeonlyformat),
            HintName::DateTimeFormatTz => wire_enum(&self.datetimeformattz),
            HintName::DateTimeFormat => wire_enum(&self.datetimeformat),
        }
    }
}

fn wire_enum<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn wire_option<T: Serialize>(value: &Option<T>) -> Value {
    match value {
        Some(v) => wire_enum(v),
        None => Value::Null,
    }
}

/// Driver-side escape hatch: a hint value is legal but has no equivalent in
/// the target engine. Strict mode fails; lax mode warns and lets the driver
/// ignore it.
pub fn cant_handle_hint(strict: bool, name: &str, hints: &UntypedHints) -> Result<()> {
    let value = hints
        .get(name)
        .cloned()
        .unwrap_or(Value::Null);
    if strict {
        Err(RoverError::UnsupportedHintValue {
            name: name.to_string(),
            value: value.to_string(),
        })
    } else {
        warn!(hint = name, value = %value, "Ignoring hint and substituting its default");
        Ok(())
    }
}

/// Called after a driver has consumed every hint it understands, with the
/// residual names. Strict mode fails; lax mode warns.
pub fn complain_on_unhandled_hints(
    strict: bool,
    unhandled: &[&str],
    hints: &UntypedHints,
) -> Result<()> {
    if unhandled.is_empty() {
        return Ok(());
    }
    let bindings: Vec<String> = unhandled
        .iter()
        .map(|name| {
            let value = hints.get(*name).cloned().unwrap_or(Value::Null);
            format!("{name}={value}")
        })
        .collect();
    let bindings = bindings.join(", ");
    if strict {
        Err(RoverError::UnhandledHints(bindings))
    } else {
        warn!("Did not understand these hints: {bindings}");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn untyped(value: Value) -> UntypedHints {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_empty_bag_yields_defaults() {
        let hints = ValidatedHints::validate(&UntypedHints::new(), true).unwrap();
        assert_eq!(hints, ValidatedHints::default());
        assert_eq!(hints.field_delimiter, ",");
        assert_eq!(hints.quoting, Some(Quoting::Minimal));
        assert_eq!(hints.compression, None);
    }

    #[test]
    fn test_every_legal_value_round_trips_strictly() {
        for name in HintName::ALL {
            let Some(legal) = name.legal_values() else {
                continue;
            };
            for value in legal {
                let mut bag = UntypedHints::new();
                bag.insert(name.as_str().to_string(), value.clone());
                let validated = ValidatedHints::validate(&bag, true).unwrap();
                assert_eq!(
                    validated.field_for(*name),
                    value,
                    "{name} did not round-trip {value}"
                );
            }
        }
    }

    #[test]
    fn test_lax_mode_substitutes_default_for_bad_value() {
        let bag = untyped(json!({"encoding": "KOI8R"}));
        let hints = ValidatedHints::validate(&bag, false).unwrap();
        assert_eq!(hints.encoding, Encoding::Utf8);
    }

    #[test]
    fn test_strict_mode_rejects_bad_value() {
        let bag = untyped(json!({"encoding": "KOI8R"}));
        let result = ValidatedHints::validate(&bag, true);
        assert!(matches!(
            result,
            Err(RoverError::UnsupportedHintValue { name, .. }) if name == "encoding"
        ));
    }

    #[test]
    fn test_boolean_hint_rejects_stringly_bool() {
        let bag = untyped(json!({"header-row": "true"}));
        assert!(ValidatedHints::validate(&bag, true).is_err());
        let lax = ValidatedHints::validate(&bag, false).unwrap();
        assert!(lax.header_row);
    }

    #[test]
    fn test_explicit_none_values_validate() {
        let bag = untyped(json!({"compression": null, "quoting": null, "escape": null}));
        let hints = ValidatedHints::validate(&bag, true).unwrap();
        assert_eq!(hints.compression, None);
        assert_eq!(hints.quoting, None);
        assert_eq!(hints.escape, None);
    }

    #[test]
    fn test_unhandled_hints_strict() {
        let bag = untyped(json!({"field-delimiter": "|"}));
        let result = complain_on_unhandled_hints(true, &["field-delimiter"], &bag);
        assert!(matches!(
            result,
            Err(RoverError::UnhandledHints(msg)) if msg == "field-delimiter=\"|\""
        ));
    }

    #[test]
    fn test_unhandled_hints_lax_and_empty() {
        let bag = untyped(json!({"field-delimiter": "|"}));
        complain_on_unhandled_hints(false, &["field-delimiter"], &bag).unwrap();
        complain_on_unhandled_hints(true, &[], &bag).unwrap();
    }

    proptest! {
        // Any string at all is legal for the free-string hints, and
        // validation must hand it back untouched.
        #[test]
        fn prop_string_hints_accept_arbitrary_strings(s in ".*") {
            let mut bag = UntypedHints::new();
            bag.insert("field-delimiter".to_string(), json!(s.clone()));
            bag.insert("quotechar".to_string(), json!(s.clone()));
            bag.insert("record-terminator".to_string(), json!(s.clone()));
            let hints = ValidatedHints::validate(&bag, true).unwrap();
            prop_assert_eq!(&hints.field_delimiter, &s);
            prop_assert_eq!(&hints.quotechar, &s);
            prop_assert_eq!(&hints.record_terminator, &s);
        }
    }
}
