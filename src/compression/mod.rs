// src/compression/mod.rs
//! Compression layers around tar streams
//!
//! The layer is chosen from the archive's declared type. Before decoding, the
//! first bytes are checked against the layer's magic number so that a
//! mislabeled download fails with a clear message instead of a decoder error
//! halfway through the unpack.

use crate::error::{Error, Result};
use std::fmt;
use std::io::{BufRead, BufReader, Read};

/// Compression wrapped around a tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TarCompression {
    Plain,
    Gzip,
    Xz,
    Zstd,
}

impl TarCompression {
    /// Leading bytes every stream of this kind starts with
    pub const fn magic(&self) -> &'static [u8] {
        match self {
            Self::Plain => &[],
            Self::Gzip => &[0x1f, 0x8b],
            Self::Xz => &[0xfd, b'7', b'z', b'X', b'Z', 0x00],
            Self::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
        }
    }

    /// Guess the layer from the start of a stream
    pub fn sniff(head: &[u8]) -> Self {
        [Self::Gzip, Self::Xz, Self::Zstd]
            .into_iter()
            .find(|c| head.starts_with(c.magic()))
            .unwrap_or(Self::Plain)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plain => "uncompressed",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for TarCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check the magic number of `reader` and wrap it in the matching decoder
pub fn decoder<'a, R: Read + 'a>(reader: R, compression: TarCompression) -> Result<Box<dyn Read + 'a>> {
    let mut reader = BufReader::new(reader);
    let head = reader.fill_buf()?;
    let found = TarCompression::sniff(head);
    if compression != TarCompression::Plain && found != compression {
        return Err(Error::UnsupportedFormat(format!(
            "archive declared as {} but its data looks {}",
            compression, found
        )));
    }

    Ok(match compression {
        TarCompression::Plain => Box::new(reader),
        TarCompression::Gzip => Box::new(flate2::bufread::GzDecoder::new(reader)),
        TarCompression::Xz => Box::new(xz2::bufread::XzDecoder::new(reader)),
        TarCompression::Zstd => Box::new(
            zstd::Decoder::with_buffer(reader)
                .map_err(|e| Error::ParseError(format!("zstd stream: {e}")))?,
        ),
    })
}
