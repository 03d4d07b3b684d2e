//! Value Codec
//!
//! Frames every stored value with a one-byte tag so compressed and raw
//! values can live side by side in the same environment.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

const TAG_RAW: u8 = 0;
const TAG_GZIP: u8 = 1;

// == Value Codec ==
/// Encodes values on write and decodes them on read.
///
/// Decoding follows the tag of the stored value, not the current setting,
/// so toggling compression between runs keeps older values readable.
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec {
    compress: bool,
}

impl ValueCodec {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    /// Wraps a value for storage.
    pub fn encode(&self, value: &[u8]) -> io::Result<Vec<u8>> {
        if !self.compress {
            let mut framed = Vec::with_capacity(value.len() + 1);
            framed.push(TAG_RAW);
            framed.extend_from_slice(value);
            return Ok(framed);
        }

        let mut encoder = GzEncoder::new(vec![TAG_GZIP], Compression::default());
        encoder.write_all(value)?;
        encoder.finish()
    }

    /// Unwraps a stored value.
    pub fn decode(&self, stored: &[u8]) -> io::Result<Vec<u8>> {
        match stored.split_first() {
            Some((&TAG_RAW, body)) => Ok(body.to_vec()),
            Some((&TAG_GZIP, body)) => {
                let mut decoder = GzDecoder::new(body);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            Some((tag, _)) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown value frame tag {}", tag),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "empty stored value",
            )),
        }
    }
}
