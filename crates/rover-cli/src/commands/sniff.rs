//! `rover sniff` - infer the format of a local delimited file

use anyhow::{bail, Context, Result};
use rover_delimited::{sniff_hints, PartialHints};
use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;
use tracing::debug;

pub fn run(path: &Path, hint_args: &[String]) -> Result<()> {
    let initial = parse_hint_args(hint_args)?;
    debug!(path = %path.display(), initial = %initial, "Sniffing");

    let mut file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let hints = sniff_hints(&mut file, &initial)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&Value::Object(hints.to_untyped()))?
    );
    Ok(())
}

/// Parse repeated `name=value` arguments into initial hints. Values are
/// JSON where they parse as JSON, bare strings otherwise.
fn parse_hint_args(args: &[String]) -> Result<PartialHints> {
    let mut untyped = Map::new();
    for arg in args {
        let Some((name, raw)) = arg.split_once('=') else {
            bail!("hint {arg:?} is not in name=value form");
        };
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        untyped.insert(name.to_string(), value);
    }
    Ok(PartialHints::from_untyped(&untyped)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hint_args_types_values() {
        let hints = parse_hint_args(&[
            "field-delimiter=|".to_string(),
            "header-row=false".to_string(),
        ])
        .unwrap();
        assert_eq!(hints.field_delimiter.as_deref(), Some("|"));
        assert_eq!(hints.header_row, Some(false));
    }

    #[test]
    fn test_parse_hint_args_rejects_bare_name() {
        assert!(parse_hint_args(&["header-row".to_string()]).is_err());
    }

    #[test]
    fn test_parse_hint_args_rejects_unknown_hint() {
        assert!(parse_hint_args(&["fluffiness=11".to_string()]).is_err());
    }
}
