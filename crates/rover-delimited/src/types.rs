//! The closed vocabulary of delimited-format hints
//!
//! Every property of a delimited byte stream that rover understands is
//! named here, with its legal values spelled exactly as they appear on the
//! wire (records format files, sniffer output, CLI overrides). The enums
//! are sealed; drivers that map hints to engine options get exhaustiveness
//! checking from the compiler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An untyped hint bag straight from configuration or a format file.
/// No guarantees about names or value shapes.
pub type UntypedHints = serde_json::Map<String, Value>;

macro_rules! literal_hint_values {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl $name {
            /// Every legal value, in vocabulary order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self { $($name::$variant => $wire,)+ }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

literal_hint_values! {
    /// How the byte stream is compressed. The hint also admits "none",
    /// which is modeled as `Option::None` wherever a `Compression` is
    /// carried.
    Compression {
        Gzip => "GZIP",
        Bzip => "BZIP",
        Lzo => "LZO",
    }
}

literal_hint_values! {
    /// Which fields are wrapped in the quote character. "none" (quoting
    /// disabled entirely) is modeled as `Option::None`.
    Quoting {
        All => "all",
        Minimal => "minimal",
        Nonnumeric => "nonnumeric",
    }
}

literal_hint_values! {
    /// The escape discipline; only backslash escaping exists in the wild
    /// for this family of formats. "none" is `Option::None`.
    Escape {
        Backslash => "\\",
    }
}

literal_hint_values! {
    /// Character encoding of the decompressed stream.
    Encoding {
        Utf8 => "UTF8",
        Utf16 => "UTF16",
        Utf16Le => "UTF16LE",
        Utf16Be => "UTF16BE",
        Utf16Bom => "UTF16BOM",
        Utf8Bom => "UTF8BOM",
        Latin1 => "LATIN1",
        Cp1252 => "CP1252",
    }
}

literal_hint_values! {
    /// Rendering of date-only fields.
    DateFormat {
        YyyyMmDd => "YYYY-MM-DD",
        MmDdYyyy => "MM-DD-YYYY",
        DdMmYyyy => "DD-MM-YYYY",
        MmDdYy => "MM/DD/YY",
    }
}

literal_hint_values! {
    /// Rendering of time-only fields.
    TimeOnlyFormat {
        Hh12MiAm => "HH12:MI AM",
        Hh24MiSs => "HH24:MI:SS",
    }
}

literal_hint_values! {
    /// Rendering of timezone-naive timestamp fields.
    DateTimeFormat {
        YyyyMmDdHh24MiSs => "YYYY-MM-DD HH24:MI:SS",
        YyyyMmDdHhMiSs => "YYYY-MM-DD HH:MI:SS",
        YyyyMmDdHh12MiAm => "YYYY-MM-DD HH12:MI AM",
        MmDdYyHh24Mi => "MM/DD/YY HH24:MI",
    }
}

literal_hint_values! {
    /// Rendering of timezone-aware timestamp fields.
    DateTimeFormatTz {
        YyyyMmDdHhMiSsOf => "YYYY-MM-DD HH:MI:SSOF",
        YyyyMmDdHhMiSs => "YYYY-MM-DD HH:MI:SS",
        YyyyMmDdHh24MiSsOf => "YYYY-MM-DD HH24:MI:SSOF",
        MmDdYyHh24Mi => "MM/DD/YY HH24:MI",
    }
}

literal_hint_values! {
    /// The name of each recognized hint, kebab-cased as it appears in
    /// format files. This is the whole registry; there is no runtime
    /// extension.
    HintName {
        HeaderRow => "header-row",
        FieldDelimiter => "field-delimiter",
        Compression => "compression",
        RecordTerminator => "record-terminator",
        Quoting => "quoting",
        Quotechar => "quotechar",
        Doublequote => "doublequote",
        Escape => "escape",
        Encoding => "encoding",
        DateFormat => "dateformat",
        TimeOnlyFormat => "timeonlyformat",
        DateTimeFormatTz => "datetimeformattz",
        DateTimeFormat => "datetimeformat",
    }
}

impl HintName {
    /// Look a hint up by its wire name.
    pub fn from_wire(name: &str) -> Option<HintName> {
        HintName::ALL.iter().copied().find(|h| h.as_str() == name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_thirteen_hints() {
        assert_eq!(HintName::ALL.len(), 13);
    }

    #[test]
    fn test_wire_names_round_trip() {
        for hint in HintName::ALL {
            assert_eq!(HintName::from_wire(hint.as_str()), Some(*hint));
        }
        assert_eq!(HintName::from_wire("no-such-hint"), None);
    }

    #[test]
    fn test_serde_spellings_match_wire_form() {
        let value = serde_json::to_value(Compression::Gzip).unwrap();
        assert_eq!(value, serde_json::json!("GZIP"));
        let value = serde_json::to_value(Escape::Backslash).unwrap();
        assert_eq!(value, serde_json::json!("\\"));
        let value = serde_json::to_value(DateTimeFormatTz::YyyyMmDdHhMiSsOf).unwrap();
        assert_eq!(value, serde_json::json!("YYYY-MM-DD HH:MI:SSOF"));
    }

    #[test]
    fn test_enum_parse_rejects_unknown() {
        let result: Result<Encoding, _> = serde_json::from_value(serde_json::json!("KOI8R"));
        assert!(result.is_err());
    }
}
