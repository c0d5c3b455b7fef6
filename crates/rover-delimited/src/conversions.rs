//! Mappings between hint values and the encodings/format strings other
//! layers speak: `encoding_rs` codecs for decoding sampled bytes, and
//! chrono-style strftime patterns for the temporal hints.

use crate::types::{DateFormat, DateTimeFormat, DateTimeFormatTz, Encoding, TimeOnlyFormat};

impl Encoding {
    /// The `encoding_rs` codec used to decode a stream carrying this hint.
    ///
    /// `encoding_rs` has no standalone ISO-8859-1 table; windows-1252 is
    /// its ASCII-compatible superset and decodes LATIN1 data identically
    /// for every byte that matters here. BOM-bearing variants rely on
    /// `Encoding::decode`'s BOM sniffing.
    pub fn codec(&self) -> &'static encoding_rs::Encoding {
        match self {
            Encoding::Utf8 | Encoding::Utf8Bom => encoding_rs::UTF_8,
            Encoding::Utf16 | Encoding::Utf16Bom | Encoding::Utf16Le => encoding_rs::UTF_16LE,
            Encoding::Utf16Be => encoding_rs::UTF_16BE,
            Encoding::Latin1 | Encoding::Cp1252 => encoding_rs::WINDOWS_1252,
        }
    }
}

/// Translate one of the temporal hint spellings into a chrono strftime
/// pattern, for drivers that parse or render sample values.
///
/// `HH` with no 12/24 marker follows the presence of an AM/PM marker, the
/// same way the spellings are used in warehouse date-style options.
pub fn to_chrono_format(hint: &str) -> String {
    let hour_specifier = if hint.contains("AM") { "%I" } else { "%H" };
    hint.replace("YYYY", "%Y")
        .replace("YY", "%y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH24", "%H")
        .replace("HH12", "%I")
        .replace("HH", hour_specifier)
        .replace("MI", "%M")
        .replace("SS", "%S")
        .replace("OF", "%:z")
        .replace("AM", "%p")
}

impl DateFormat {
    pub fn chrono_format(&self) -> String {
        to_chrono_format(self.as_str())
    }
}

impl TimeOnlyFormat {
    pub fn chrono_format(&self) -> String {
        to_chrono_format(self.as_str())
    }
}

impl DateTimeFormat {
    pub fn chrono_format(&self) -> String {
        to_chrono_format(self.as_str())
    }
}

impl DateTimeFormatTz {
    pub fn chrono_format(&self) -> String {
        to_chrono_format(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_date_formats() {
        assert_eq!(DateFormat::YyyyMmDd.chrono_format(), "%Y-%m-%d");
        assert_eq!(DateFormat::MmDdYy.chrono_format(), "%m/%d/%y");
        assert_eq!(DateFormat::DdMmYyyy.chrono_format(), "%d-%m-%Y");
    }

    #[test]
    fn test_time_formats() {
        assert_eq!(TimeOnlyFormat::Hh24MiSs.chrono_format(), "%H:%M:%S");
        assert_eq!(TimeOnlyFormat::Hh12MiAm.chrono_format(), "%I:%M %p");
    }

    #[test]
    fn test_datetime_formats() {
        assert_eq!(
            DateTimeFormatTz::YyyyMmDdHh24MiSsOf.chrono_format(),
            "%Y-%m-%d %H:%M:%S%:z"
        );
        assert_eq!(
            DateTimeFormat::YyyyMmDdHh12MiAm.chrono_format(),
            "%Y-%m-%d %I:%M %p"
        );
    }

    #[test]
    fn test_codecs() {
        assert_eq!(Encoding::Utf8.codec(), encoding_rs::UTF_8);
        assert_eq!(Encoding::Latin1.codec(), encoding_rs::WINDOWS_1252);
        assert_eq!(Encoding::Utf16Be.codec(), encoding_rs::UTF_16BE);
    }
}
