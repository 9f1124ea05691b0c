//! Compression utilities for resource slots.
//!
//! Compressed slots hold a zlib stream (deflate with the two-byte zlib
//! header and Adler-32 trailer) using a 1 KiB window. A slot is compressed
//! whenever its logical size differs from its packed size.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compress, Compression};

use crate::{Error, Result};

/// Deflate window size as a power of two. Game readers refuse larger windows.
pub const WINDOW_BITS: u8 = 10;

/// Inflate a packed slot into exactly `expected_size` bytes.
///
/// Output beyond `expected_size` is not buffered; a stream that inflates to
/// any other length is rejected.
pub fn decompress_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected_size);
    ZlibDecoder::new(data)
        .take(expected_size as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| Error::DecompressionFailed(e.to_string()))?;

    if output.len() > expected_size {
        return Err(Error::DecompressionFailed(format!(
            "stream inflates past the expected {} bytes",
            expected_size
        )));
    }
    if output.len() < expected_size {
        return Err(Error::DecompressionFailed(format!(
            "inflated size mismatch: expected {}, got {}",
            expected_size,
            output.len()
        )));
    }
    Ok(output)
}

/// Deflate a logical payload for a compressed slot.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new_with_compress(
        Vec::with_capacity(data.len() / 2),
        Compress::new_with_window_bits(Compression::default(), true, WINDOW_BITS),
    );
    encoder
        .write_all(data)
        .map_err(|e| Error::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::CompressionFailed(e.to_string()))
}
