//! Hint inference from a sample of bytes
//!
//! `sniff_hints` reconstructs a [`PartialHints`] from a rewindable byte
//! stream plus whatever the caller already knows. Inference runs in a
//! fixed order, each step feeding the next: compression, then encoding,
//! then the record terminator, then the CSV dialect, then a quoting trial
//! parse. A hint the caller supplied short-circuits its step and always
//! survives into the output verbatim.
//!
//! Probe failures are soft: the sniffer logs and returns what it has
//! rather than erroring. Only a stream that cannot be rewound at all, or
//! more than one stream, is refused.

use crate::dialect::sniff_dialect;
use crate::partial::PartialHints;
use crate::stream::{sniff_compression, with_rewound, with_rewound_decompressed};
use crate::types::{Compression, Encoding, Quoting};
use rover_common::{Result, RoverError};
use std::io::{Read, Seek};
use tracing::{debug, info, warn};

/// Sample budget for the text probes, in characters, and for the byte
/// probes, in bytes.
const HINT_INFERENCE_SAMPLING_SIZE: usize = 1024;

/// Chunk size fed to the encoding detector.
const DETECTOR_CHUNK_SIZE: usize = 512;

/// Cap on bytes fed to the encoding detector for one stream.
const DETECTOR_BUDGET_BYTES: usize = 64 * 1024;

/// Terminators the dialect probe can normalize; anything else makes the
/// probe decline rather than guess.
const STANDARD_TERMINATORS: &[&str] = &["\n", "\r\n", "\r"];

/// A rewindable byte stream eligible for sniffing.
pub trait ByteStream: Read + Seek {}
impl<T: Read + Seek> ByteStream for T {}

/// Sniff hints from exactly one stream; more than one fails with
/// [`RoverError::MultiFileSniffNotSupported`].
pub fn sniff_hints_from_streams(
    streams: &mut [&mut dyn ByteStream],
    initial: &PartialHints,
) -> Result<PartialHints> {
    match streams {
        [stream] => sniff_hints(stream, initial),
        _ => Err(RoverError::MultiFileSniffNotSupported),
    }
}

/// Infer a richer [`PartialHints`] from a stream sample.
///
/// Every key in `initial` is preserved verbatim; inference only fills
/// gaps. The stream's position is restored before returning.
pub fn sniff_hints<R: Read + Seek>(stream: &mut R, initial: &PartialHints) -> Result<PartialHints> {
    // Rewindability gate: a stream we cannot rewind we also must not
    // consume, or the caller could never use it afterwards.
    with_rewound(stream, |_| Ok(()))?;

    // Compression and encoding come first; they gate every byte-to-text
    // conversion below.
    let effective_compression = match initial.compression {
        Some(compression) => compression,
        None => sniff_compression(stream)?,
    };

    let sniffed_encoding = match initial.encoding {
        Some(encoding) => Some(encoding),
        None => match sniff_encoding_hint(stream) {
            Ok(encoding) => encoding,
            Err(e) => {
                warn!(error = %e, "Could not sniff encoding");
                None
            },
        },
    };
    // If guessing was inconclusive, read subsequent samples as UTF8.
    let effective_encoding = sniffed_encoding.unwrap_or(Encoding::Utf8);

    let record_terminator = match initial.record_terminator.clone() {
        Some(terminator) => Some(terminator),
        None => {
            match infer_newline_format(stream, effective_encoding, effective_compression) {
                Ok(terminator) => terminator,
                Err(e) => {
                    warn!(error = %e, "Could not infer record terminator");
                    None
                },
            }
        },
    };

    let dialect_hints = match sniff_dialect_hints(
        stream,
        record_terminator.as_deref(),
        effective_encoding,
        effective_compression,
    ) {
        Ok(hints) => hints,
        Err(e) => {
            warn!(error = %e, "Could not sniff CSV dialect");
            PartialHints::default()
        },
    };

    // The quoting trial parses with everything learned so far; an initial
    // quoting hint skips the trial entirely.
    let quoting_hints = if initial.quoting.is_some() {
        PartialHints::default()
    } else {
        let streaming_hints = initial.merged_over(&dialect_hints);
        sniff_quoting(
            stream,
            &streaming_hints,
            effective_encoding,
            effective_compression,
        )
    };

    let inferred = PartialHints {
        compression: Some(effective_compression),
        encoding: Some(effective_encoding),
        record_terminator,
        ..Default::default()
    };
    let out = initial
        .merged_over(&dialect_hints)
        .merged_over(&quoting_hints)
        .merged_over(&inferred);
    info!(hints = %out, "Inferred hints from combined sources");
    Ok(out)
}

/// Detect the character encoding from a byte sample: BOMs first, then an
/// all-ASCII shortcut, then the statistical detector. `None` means the
/// detector had no confident answer.
fn sniff_encoding_hint<R: Read + Seek>(stream: &mut R) -> Result<Option<Encoding>> {
    with_rewound(stream, |rewound| {
        let mut detector = chardetng::EncodingDetector::new();
        let mut head: Vec<u8> = Vec::new();
        let mut all_ascii = true;
        let mut total = 0usize;
        let mut chunk = vec![0u8; DETECTOR_CHUNK_SIZE];

        loop {
            let n = rewound.read(&mut chunk)?;
            if n == 0 {
                detector.feed(&[], true);
                break;
            }
            if head.len() < 4 {
                head.extend_from_slice(&chunk[..n.min(4 - head.len())]);
            }
            all_ascii = all_ascii && chunk[..n].iter().all(u8::is_ascii);
            detector.feed(&chunk[..n], false);
            total += n;
            if total >= DETECTOR_BUDGET_BYTES {
                break;
            }
        }

        if head.starts_with(&[0xef, 0xbb, 0xbf]) {
            return Ok(Some(Encoding::Utf8Bom));
        }
        if head.starts_with(&[0xff, 0xfe]) || head.starts_with(&[0xfe, 0xff]) {
            return Ok(Some(Encoding::Utf16));
        }
        if total == 0 {
            return Ok(None);
        }
        if all_ascii {
            // The detector would shrug ASCII into windows-1252; every
            // ASCII stream is equally valid UTF8, which is what the
            // vocabulary defaults to anyway.
            return Ok(Some(Encoding::Utf8));
        }

        let guessed = detector.guess(None, true);
        let hint = if guessed == encoding_rs::UTF_8 {
            Some(Encoding::Utf8)
        } else if guessed == encoding_rs::WINDOWS_1252 {
            Some(Encoding::Cp1252)
        } else if guessed == encoding_rs::UTF_16LE || guessed == encoding_rs::UTF_16BE {
            Some(Encoding::Utf16)
        } else {
            warn!(encoding = guessed.name(), "Got unrecognized encoding from sniffing");
            None
        };
        Ok(hint)
    })
}

/// Read the first line of decoded text and report which newline closed it.
fn infer_newline_format<R: Read + Seek>(
    stream: &mut R,
    encoding: Encoding,
    compression: Option<Compression>,
) -> Result<Option<String>> {
    let sample = read_decoded_sample(stream, encoding, compression)?;
    let mut chars = sample.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                let terminator = if chars.peek() == Some(&'\n') {
                    "\r\n"
                } else {
                    "\r"
                };
                info!(terminator = ?terminator, "Inferred record terminator");
                return Ok(Some(terminator.to_string()));
            },
            '\n' => {
                info!(terminator = ?"\n", "Inferred record terminator");
                return Ok(Some("\n".to_string()));
            },
            _ => {},
        }
    }
    warn!("Could not determine newline format of file");
    Ok(None)
}

/// Run the dialect probe over a normalized text sample. Declines (empty
/// hints) for non-standard terminators and for samples it cannot read.
fn sniff_dialect_hints<R: Read + Seek>(
    stream: &mut R,
    record_terminator: Option<&str>,
    encoding: Encoding,
    compression: Option<Compression>,
) -> Result<PartialHints> {
    if let Some(terminator) = record_terminator {
        if !STANDARD_TERMINATORS.contains(&terminator) {
            info!(
                terminator = ?terminator,
                "Unable to infer dialect of a file with non-standard newlines"
            );
            return Ok(PartialHints::default());
        }
    }

    let sample = read_decoded_sample(stream, encoding, compression)?;
    let sample: String = sample.chars().take(HINT_INFERENCE_SAMPLING_SIZE).collect();
    let sample = sample.replace("\r\n", "\n").replace('\r', "\n");

    let Some(dialect) = sniff_dialect(&sample) else {
        info!("Dialect probe inconclusive; potential single-field file");
        return Ok(PartialHints::default());
    };

    let mut hints = PartialHints {
        doublequote: Some(dialect.doublequote),
        field_delimiter: Some(dialect.field_delimiter.to_string()),
        header_row: Some(dialect.header_row),
        ..Default::default()
    };
    if let Some(quote) = dialect.quotechar {
        hints.quotechar = Some(quote.to_string());
    }
    debug!(hints = %hints, "Dialect sniffed");
    Ok(hints)
}

/// Decide the quoting hint by trial parse: minimal first, then none.
/// Returns empty hints when neither parse works or the dialect is not
/// expressible to the parser.
fn sniff_quoting<R: Read + Seek>(
    stream: &mut R,
    streaming_hints: &PartialHints,
    encoding: Encoding,
    compression: Option<Compression>,
) -> PartialHints {
    let delimiter = streaming_hints
        .field_delimiter
        .clone()
        .unwrap_or_else(|| ",".to_string());
    let quotechar = streaming_hints
        .quotechar
        .clone()
        .unwrap_or_else(|| "\"".to_string());
    let (delimiter_byte, quote_byte) = match (single_ascii(&delimiter), single_ascii(&quotechar)) {
        (Some(d), Some(q)) => (d, q),
        _ => {
            info!("Dialect not expressible to the trial parser; skipping quoting inference");
            return PartialHints::default();
        },
    };
    let doublequote = streaming_hints.doublequote.unwrap_or(false);

    for quoting in [Some(Quoting::Minimal), None] {
        debug!(quoting = ?quoting, "Attempting trial parse");
        let parsed = attempt_parse(
            stream,
            delimiter_byte,
            quote_byte,
            doublequote,
            quoting.is_some(),
            encoding,
            compression,
        );
        match parsed {
            Ok(()) => {
                return PartialHints {
                    quoting: Some(quoting),
                    ..Default::default()
                };
            },
            Err(e) => {
                info!(quoting = ?quoting, error = %e, "Trial parse failed");
            },
        }
    }
    PartialHints::default()
}

fn attempt_parse<R: Read + Seek>(
    stream: &mut R,
    delimiter: u8,
    quote: u8,
    doublequote: bool,
    quoting: bool,
    encoding: Encoding,
    compression: Option<Compression>,
) -> Result<()> {
    with_rewound_decompressed(stream, compression, |decompressed| {
        let mut bytes = Vec::new();
        decompressed.read_to_end(&mut bytes)?;
        let (text, _, _) = encoding.codec().decode(&bytes);

        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(delimiter)
            .double_quote(doublequote)
            .flexible(false)
            .has_headers(false);
        if quoting {
            builder.quote(quote);
        } else {
            builder.quoting(false);
        }
        let mut reader = builder.from_reader(text.as_bytes());
        for record in reader.records() {
            record.map_err(|e| {
                RoverError::Config(format!("trial parse failed: {e}"))
            })?;
        }
        Ok(())
    })
}

fn single_ascii(s: &str) -> Option<u8> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Some(*b),
        _ => None,
    }
}

/// Pull a decoded text sample from the (possibly compressed) stream.
fn read_decoded_sample<R: Read + Seek>(
    stream: &mut R,
    encoding: Encoding,
    compression: Option<Compression>,
) -> Result<String> {
    with_rewound_decompressed(stream, compression, |decompressed| {
        // Four bytes per char covers the worst case of the encodings in
        // the vocabulary.
        let budget = HINT_INFERENCE_SAMPLING_SIZE * 4;
        let mut bytes = vec![0u8; budget];
        let mut filled = 0;
        while filled < budget {
            let n = decompressed.read(&mut bytes[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let (text, _, _) = encoding.codec().decode(&bytes[..filled]);
        Ok(text.into_owned())
    })
}
