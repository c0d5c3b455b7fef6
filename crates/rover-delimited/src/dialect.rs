//! CSV dialect probing
//!
//! Given a decoded, newline-normalized text sample, guess the quote
//! character, quote doubling, field delimiter, and whether the first row is
//! a header. The approach follows the classic two-stage sniffer: when the
//! sample contains quoted fields, the characters hugging the quotes give
//! away the delimiter; otherwise a per-line frequency vote does.
//!
//! The probe guesses or declines; it never errors. A sample it cannot make
//! sense of yields `None` and the caller moves on without dialect hints.

use std::collections::HashMap;
use tracing::debug;

/// Delimiters worth considering, in preference order for ties.
const PREFERRED_DELIMITERS: &[char] = &[',', '\t', ';', '|', ':', ' '];

/// Quote characters seen in the wild.
const QUOTE_CANDIDATES: &[char] = &['"', '\''];

/// How many sample lines feed the frequency and header votes.
const MAX_VOTING_LINES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffedDialect {
    pub field_delimiter: char,
    pub quotechar: Option<char>,
    pub doublequote: bool,
    pub header_row: bool,
}

/// Probe a sample whose record terminators have been normalized to `\n`.
pub fn sniff_dialect(sample: &str) -> Option<SniffedDialect> {
    if sample.trim().is_empty() {
        return None;
    }

    let (quotechar, doublequote, delimiter_by_quotes) = guess_quote_and_delimiter(sample);
    let field_delimiter = match delimiter_by_quotes {
        Some(delim) => delim,
        None => guess_delimiter_by_frequency(sample)?,
    };

    let header_row = has_header(sample, field_delimiter, quotechar, doublequote);
    let dialect = SniffedDialect {
        field_delimiter,
        quotechar,
        doublequote,
        header_row,
    };
    debug!(?dialect, "Dialect sniffed");
    Some(dialect)
}

/// Stage one: if the sample has quoted fields, the delimiter is whatever
/// character keeps showing up immediately outside the quotes, and a quote
/// pair inside a quoted field means doubling.
fn guess_quote_and_delimiter(sample: &str) -> (Option<char>, bool, Option<char>) {
    let mut best: Option<(char, usize)> = None;

    for &quote in QUOTE_CANDIDATES {
        let count = sample.matches(quote).count();
        if count >= 2 && best.map_or(true, |(_, c)| count > c) {
            best = Some((quote, count));
        }
    }
    let Some((quote, _)) = best else {
        return (None, false, None);
    };

    // Walk quoted spans, tallying the character just before an opening
    // quote and just after a closing one.
    let mut adjacent: HashMap<char, usize> = HashMap::new();
    let mut doublequote = false;
    let chars: Vec<char> = sample.chars().collect();
    let mut i = 0;
    let mut previous: Option<char> = None;
    while i < chars.len() {
        if chars[i] == quote {
            if let Some(p) = previous {
                if p != '\n' {
                    *adjacent.entry(p).or_insert(0) += 1;
                }
            }
            // Scan to the closing quote, noting doubled quotes inside.
            let mut j = i + 1;
            while j < chars.len() {
                if chars[j] == quote {
                    if j + 1 < chars.len() && chars[j + 1] == quote {
                        doublequote = true;
                        j += 2;
                        continue;
                    }
                    break;
                }
                j += 1;
            }
            if j + 1 < chars.len() && chars[j + 1] != '\n' {
                *adjacent.entry(chars[j + 1]).or_insert(0) += 1;
            }
            previous = chars.get(j).copied();
            i = j + 1;
        } else {
            previous = Some(chars[i]);
            i += 1;
        }
    }

    let delimiter = adjacent
        .into_iter()
        .filter(|(c, _)| PREFERRED_DELIMITERS.contains(c))
        .max_by_key(|(_, count)| *count)
        .map(|(c, _)| c);
    (Some(quote), doublequote, delimiter)
}

/// Stage two: for each candidate delimiter, ask how consistently it
/// appears per line. A delimiter that shows up the same nonzero number of
/// times on (nearly) every line wins; ties break by preference order.
fn guess_delimiter_by_frequency(sample: &str) -> Option<char> {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.is_empty())
        .take(MAX_VOTING_LINES)
        .collect();
    if lines.is_empty() {
        return None;
    }

    let mut scored: Vec<(char, f64)> = Vec::new();
    for &candidate in PREFERRED_DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| l.matches(candidate).count())
            .collect();

        let mut frequency: HashMap<usize, usize> = HashMap::new();
        for &count in &counts {
            *frequency.entry(count).or_insert(0) += 1;
        }
        let (&mode, &mode_lines) = frequency
            .iter()
            .max_by_key(|(_, lines)| **lines)
            .unwrap_or((&0, &0));
        if mode == 0 {
            continue;
        }
        scored.push((candidate, mode_lines as f64 / lines.len() as f64));
    }

    // Demand near-total consistency before trusting a candidate.
    let mut threshold = 1.0;
    while threshold >= 0.9 {
        for &candidate in PREFERRED_DELIMITERS {
            if let Some(&(_, consistency)) =
                scored.iter().find(|(c, _)| *c == candidate)
            {
                if consistency >= threshold {
                    return Some(candidate);
                }
            }
        }
        threshold -= 0.01;
    }
    None
}

/// Vote on whether the first row is a header by comparing it with the body
/// column by column: where the body is numeric or has a stable width, a
/// first row that breaks the pattern looks like a label.
fn has_header(sample: &str, delimiter: char, quotechar: Option<char>, doublequote: bool) -> bool {
    let mut delimiter_buf = [0u8; 4];
    let delimiter_bytes = delimiter.encode_utf8(&mut delimiter_buf).as_bytes();
    if delimiter_bytes.len() != 1 {
        return false;
    }

    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(delimiter_bytes[0])
        .double_quote(doublequote)
        .flexible(true)
        .has_headers(false);
    match quotechar {
        Some(q) if q.is_ascii() => {
            builder.quote(q as u8);
        },
        _ => {
            builder.quoting(false);
        },
    }

    let mut reader = builder.from_reader(sample.as_bytes());
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records().take(MAX_VOTING_LINES) {
        match record {
            Ok(r) => rows.push(r.iter().map(|f| f.to_string()).collect()),
            Err(_) => return false,
        }
    }
    if rows.len() < 2 {
        return false;
    }

    let header = &rows[0];
    let body = &rows[1..];
    let mut votes: i32 = 0;

    for (column, header_field) in header.iter().enumerate() {
        let fields: Vec<&str> = body
            .iter()
            .filter_map(|row| row.get(column))
            .map(|s| s.as_str())
            .collect();
        if fields.is_empty() {
            continue;
        }

        if fields.iter().all(|f| f.parse::<f64>().is_ok()) {
            // Numeric body; a non-numeric first row votes header.
            if header_field.parse::<f64>().is_err() {
                votes += 1;
            } else {
                votes -= 1;
            }
        } else {
            // Fall back to field width.
            let width = fields[0].chars().count();
            if fields.iter().all(|f| f.chars().count() == width) {
                if header_field.chars().count() != width {
                    votes += 1;
                } else {
                    votes -= 1;
                }
            }
        }
    }

    votes > 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_comma_csv_with_header() {
        let dialect = sniff_dialect("name,age,city\nalice,34,anchorage\nbob,29,boston\n").unwrap();
        assert_eq!(dialect.field_delimiter, ',');
        assert!(dialect.header_row);
        assert!(!dialect.doublequote);
    }

    #[test]
    fn test_numeric_body_header_vote() {
        let dialect = sniff_dialect("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(dialect.field_delimiter, ',');
        assert!(dialect.header_row);
    }

    #[test]
    fn test_headerless_numeric_rows() {
        let dialect = sniff_dialect("1,2,3\n4,5,6\n7,8,9\n").unwrap();
        assert_eq!(dialect.field_delimiter, ',');
        assert!(!dialect.header_row);
    }

    #[test]
    fn test_pipe_delimiter() {
        let dialect = sniff_dialect("a|b\n1|2\n3|4\n").unwrap();
        assert_eq!(dialect.field_delimiter, '|');
    }

    #[test]
    fn test_tab_delimiter() {
        let dialect = sniff_dialect("a\tb\n1\t2\n").unwrap();
        assert_eq!(dialect.field_delimiter, '\t');
    }

    #[test]
    fn test_quoted_fields_reveal_quote_and_delimiter() {
        let sample = "\"name\";\"notes\"\n\"alice\";\"likes; semicolons\"\n\"bob\";\"plain\"\n";
        let dialect = sniff_dialect(sample).unwrap();
        assert_eq!(dialect.quotechar, Some('"'));
        assert_eq!(dialect.field_delimiter, ';');
    }

    #[test]
    fn test_doubled_quote_detected() {
        let sample = "a,b\n\"say \"\"hi\"\" now\",2\n\"plain\",3\n";
        let dialect = sniff_dialect(sample).unwrap();
        assert!(dialect.doublequote);
        assert_eq!(dialect.quotechar, Some('"'));
        assert_eq!(dialect.field_delimiter, ',');
    }

    #[test]
    fn test_single_column_sample_declines() {
        assert_eq!(sniff_dialect("justonefield\nanother\n"), None);
        assert_eq!(sniff_dialect(""), None);
    }
}
