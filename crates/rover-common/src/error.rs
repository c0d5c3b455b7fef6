//! Error types for rover
//!
//! Every failure mode that crosses a crate boundary is a tagged variant
//! here, never a bare string, so callers can match on what actually went
//! wrong and drivers can decide whether to fall back or propagate.

use thiserror::Error;

/// Result type alias for rover operations
pub type Result<T> = std::result::Result<T, RoverError>;

/// Main error type for rover
#[derive(Error, Debug)]
pub enum RoverError {
    /// A hint value was present but outside the hint's legal domain, and
    /// the caller asked for strict validation.
    #[error("Unsupported value for hint {name}: {value}. Pass strict=false to substitute the default instead.")]
    UnsupportedHintValue { name: String, value: String },

    /// A driver finished consuming hints but left some unhandled, and the
    /// caller asked for strict validation.
    #[error("These hints were not handled: {0}. Pass strict=false to ignore them instead.")]
    UnhandledHints(String),

    /// A hint name that is not part of the closed vocabulary. Unknown names
    /// are a programmer error, not user input.
    #[error("Unknown hint name: {0}")]
    UnknownHint(String),

    /// The stream does not permit rewinding, so it cannot be sniffed or
    /// re-read without consuming it.
    #[error("Stream is not rewindable")]
    NotSeekable,

    /// The stream was already closed before use.
    #[error("Stream is already closed")]
    StreamClosed,

    /// No decompressor is available for this compression kind.
    #[error("No decompressor available for {0} compression")]
    UnsupportedCompression(String),

    /// Hint sniffing was asked to work across multiple streams at once.
    #[error("Cannot sniff hints from multiple files; please provide hints")]
    MultiFileSniffNotSupported,

    /// The backing object for a file URL does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A rename was requested between two different URL schemes.
    #[error("Cannot rename across schemes: {from} -> {to}")]
    CrossSchemeRename { from: String, to: String },

    /// A `_format_delimited` file was present but empty.
    #[error("Detailed format information must be provided in {0} for type delimited")]
    DetailedFormatRequired(String),

    /// A delimited format file lacked its variant field.
    #[error("variant not specified in {0}")]
    MissingVariant(String),

    /// A URL could not be parsed or did not have the expected shape.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL scheme has no registered backend in this process.
    #[error("No backend registered for scheme {0:?}. Configure the matching client when building the resolver.")]
    UnknownScheme(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),
}
