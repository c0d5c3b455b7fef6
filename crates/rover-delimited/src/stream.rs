//! Rewindable views over byte streams
//!
//! Sniffing has to read a stream without consuming it: every probe runs
//! against a rewound view and the caller's position is restored on every
//! exit path, success or error.

use crate::types::Compression;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use rover_common::{Result, RoverError};
use std::io::{Read, Seek, SeekFrom};
use url::Url;

/// Magic prefixes, longest first. gzip with deflate, and bzip2.
const MAGIC_GZIP: &[u8] = &[0x1f, 0x8b, 0x08];
const MAGIC_BZIP: &[u8] = &[0x42, 0x5a, 0x68];

/// Run `f` against the stream rewound to its start, restoring the original
/// position afterwards no matter how `f` exits.
///
/// Fails with [`RoverError::StreamClosed`] when the current position cannot
/// even be read, and [`RoverError::NotSeekable`] when the stream refuses to
/// rewind.
pub fn with_rewound<R, T, F>(stream: &mut R, f: F) -> Result<T>
where
    R: Read + Seek,
    F: FnOnce(&mut R) -> Result<T>,
{
    let original_position = stream
        .stream_position()
        .map_err(|_| RoverError::StreamClosed)?;
    stream
        .seek(SeekFrom::Start(0))
        .map_err(|_| RoverError::NotSeekable)?;

    let outcome = f(stream);

    let restored = stream.seek(SeekFrom::Start(original_position));
    match (outcome, restored) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(_)) => Err(RoverError::NotSeekable),
        // The probe's own error wins over a restore failure.
        (Err(e), _) => Err(e),
    }
}

/// Like [`with_rewound`], but hands `f` a decompressed reader matching the
/// compression hint. LZO has no decompressor and fails with
/// [`RoverError::UnsupportedCompression`].
pub fn with_rewound_decompressed<R, T, F>(
    stream: &mut R,
    compression: Option<Compression>,
    f: F,
) -> Result<T>
where
    R: Read + Seek,
    F: FnOnce(&mut dyn Read) -> Result<T>,
{
    with_rewound(stream, |raw| match compression {
        None => f(raw),
        Some(Compression::Gzip) => f(&mut GzDecoder::new(raw)),
        Some(Compression::Bzip) => f(&mut BzDecoder::new(raw)),
        Some(Compression::Lzo) => Err(RoverError::UnsupportedCompression(
            Compression::Lzo.to_string(),
        )),
    })
}

/// Probe the stream's first bytes for a compression magic number.
/// Returns `None` when neither gzip nor bzip2 is recognized.
pub fn sniff_compression<R: Read + Seek>(stream: &mut R) -> Result<Option<Compression>> {
    with_rewound(stream, |rewound| {
        let max_len = MAGIC_GZIP.len().max(MAGIC_BZIP.len());
        let mut file_start = vec![0u8; max_len];
        let mut filled = 0;
        while filled < max_len {
            let n = rewound.read(&mut file_start[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let file_start = &file_start[..filled];

        if file_start.starts_with(MAGIC_GZIP) {
            Ok(Some(Compression::Gzip))
        } else if file_start.starts_with(MAGIC_BZIP) {
            Ok(Some(Compression::Bzip))
        } else {
            Ok(None)
        }
    })
}

/// Guess compression from a URL's file extension alone: `.gz`, `.bz2`,
/// `.lzo`, case-insensitive. Useful before any bytes have been fetched.
pub fn sniff_compression_from_extension(url: &str) -> Option<Compression> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Bare paths are fine too.
        Err(_) => url.to_string(),
    };
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("gz") => Some(Compression::Gzip),
        Some("bz2") => Some(Compression::Bzip),
        Some("lzo") => Some(Compression::Lzo),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    pub(crate) fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    pub(crate) fn bzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_rewound_restores_position() {
        let mut stream = Cursor::new(b"abcdef".to_vec());
        stream.seek(SeekFrom::Start(4)).unwrap();

        let first = with_rewound(&mut stream, |s| {
            let mut buf = [0u8; 3];
            s.read_exact(&mut buf)?;
            Ok(buf)
        })
        .unwrap();

        assert_eq!(&first, b"abc");
        assert_eq!(stream.stream_position().unwrap(), 4);
    }

    #[test]
    fn test_rewound_restores_position_on_probe_error() {
        let mut stream = Cursor::new(b"abcdef".to_vec());
        stream.seek(SeekFrom::Start(2)).unwrap();

        let result: Result<()> = with_rewound(&mut stream, |_| Err(RoverError::NotSeekable));

        assert!(result.is_err());
        assert_eq!(stream.stream_position().unwrap(), 2);
    }

    #[test]
    fn test_sniff_compression_gzip() {
        let mut stream = Cursor::new(gzip_bytes(b"a,b\n1,2\n"));
        assert_eq!(
            sniff_compression(&mut stream).unwrap(),
            Some(Compression::Gzip)
        );
    }

    #[test]
    fn test_sniff_compression_bzip() {
        let mut stream = Cursor::new(bzip_bytes(b"a,b\n1,2\n"));
        assert_eq!(
            sniff_compression(&mut stream).unwrap(),
            Some(Compression::Bzip)
        );
    }

    #[test]
    fn test_sniff_compression_plain_and_short() {
        let mut stream = Cursor::new(b"a,b\n1,2\n".to_vec());
        assert_eq!(sniff_compression(&mut stream).unwrap(), None);

        let mut tiny = Cursor::new(b"a".to_vec());
        assert_eq!(sniff_compression(&mut tiny).unwrap(), None);
    }

    #[test]
    fn test_decompressed_round_trip() {
        let mut stream = Cursor::new(gzip_bytes(b"hello"));
        let contents = with_rewound_decompressed(&mut stream, Some(Compression::Gzip), |r| {
            let mut out = String::new();
            r.read_to_string(&mut out)?;
            Ok(out)
        })
        .unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn test_lzo_is_unsupported() {
        let mut stream = Cursor::new(b"whatever".to_vec());
        let result =
            with_rewound_decompressed(&mut stream, Some(Compression::Lzo), |_| Ok(()));
        assert!(matches!(
            result,
            Err(RoverError::UnsupportedCompression(kind)) if kind == "LZO"
        ));
    }

    #[test]
    fn test_extension_sniffing() {
        assert_eq!(
            sniff_compression_from_extension("s3://bucket/dir/part-01.csv.gz"),
            Some(Compression::Gzip)
        );
        assert_eq!(
            sniff_compression_from_extension("/tmp/data.BZ2"),
            Some(Compression::Bzip)
        );
        assert_eq!(
            sniff_compression_from_extension("file:///tmp/data.lzo"),
            Some(Compression::Lzo)
        );
        assert_eq!(sniff_compression_from_extension("plain.csv"), None);
        assert_eq!(sniff_compression_from_extension("no-extension"), None);
    }
}
