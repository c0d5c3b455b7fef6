//! Rover Delimited Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! The hint model for delimited ("CSV-ish") records, and the sniffer that
//! infers hints from samples of real files.
//!
//! # Overview
//!
//! A *hint* is one named, constrained fact about how a delimited file is
//! put together (its delimiter, quoting style, encoding, and so on). Hints
//! travel in three shapes:
//!
//! - **Untyped**: a raw JSON object, as read from a format file or a job
//!   definition
//! - **Partial**: typed but sparse, every field optional
//!   ([`PartialHints`])
//! - **Validated**: typed and complete, every field populated and
//!   in-domain ([`ValidatedHints`])
//!
//! # Example
//!
//! ```no_run
//! use rover_delimited::{sniff_hints, PartialHints};
//! use std::fs::File;
//!
//! fn describe(path: &str) -> rover_common::Result<()> {
//!     let mut file = File::open(path)?;
//!     let hints = sniff_hints(&mut file, &PartialHints::default())?;
//!     println!("{hints}");
//!     Ok(())
//! }
//! ```

pub mod conversions;
pub mod dialect;
pub mod partial;
pub mod sniff;
pub mod stream;
pub mod types;
pub mod validated;
pub mod vocabulary;

// Re-export commonly used types
pub use partial::PartialHints;
pub use sniff::{sniff_hints, sniff_hints_from_streams, ByteStream};
pub use stream::{
    sniff_compression, sniff_compression_from_extension, with_rewound, with_rewound_decompressed,
};
pub use types::{
    Compression, DateFormat, DateTimeFormat, DateTimeFormatTz, Encoding, Escape, HintName,
    Quoting, TimeOnlyFormat, UntypedHints,
};
pub use validated::{cant_handle_hint, complain_on_unhandled_hints, ValidatedHints};
