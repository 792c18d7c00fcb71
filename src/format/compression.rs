//! Strip and tile (de)compression.
//!
//! Deflate (8) and Adobe Deflate (32946) both store a zlib stream; they only
//! differ in the code written to the Compression tag. LZW (5) uses MSB-first
//! codes with the early code-size switch TIFF writers expect.

use std::io::{Read, Write};

use weezl::{BitOrder, LzwStatus};

use crate::error::TiffError;

use super::tiff::Compression;

/// Default zlib level used when writing Deflate strips.
pub const DEFAULT_DEFLATE_LEVEL: u32 = 6;

/// Decompress one strip or tile.
///
/// Decoding stops once `expected_len + 1` bytes are produced, so a stream
/// that inflates far past its chunk is never fully materialized. The caller
/// checks the length of the decoded data.
pub fn decompress(
    compression: Compression,
    data: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, TiffError> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Deflate | Compression::AdobeDeflate => {
            let limit = (expected_len as u64).saturating_add(1);
            let mut decoder = flate2::read::ZlibDecoder::new(data).take(limit);
            let mut result = Vec::with_capacity(expected_len);
            decoder
                .read_to_end(&mut result)
                .map_err(|e| TiffError::Decompression(e.to_string()))?;
            Ok(result)
        }
        Compression::Lzw => decompress_lzw(data, expected_len),
        other => Err(TiffError::UnsupportedCompression(other.name().to_string())),
    }
}

/// Compress one strip.
pub fn compress(compression: Compression, data: &[u8]) -> Result<Vec<u8>, TiffError> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Deflate | Compression::AdobeDeflate => {
            let mut encoder = flate2::write::ZlibEncoder::new(
                Vec::new(),
                flate2::Compression::new(DEFAULT_DEFLATE_LEVEL),
            );
            encoder
                .write_all(data)
                .map_err(|e| TiffError::Compression(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| TiffError::Compression(e.to_string()))
        }
        Compression::Lzw => weezl::encode::Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .encode(data)
            .map_err(|e| TiffError::Compression(e.to_string())),
        other => Err(TiffError::UnsupportedCompression(other.name().to_string())),
    }
}

/// Decode an LZW chunk into at most `expected_len + 1` bytes.
///
/// Many writers omit the end-of-information code, so running out of input
/// ends the chunk as well.
fn decompress_lzw(data: &[u8], expected_len: usize) -> Result<Vec<u8>, TiffError> {
    let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
    let mut result = vec![0u8; expected_len.saturating_add(1)];
    let mut input = data;
    let mut filled = 0;

    while filled < result.len() {
        let step = decoder.decode_bytes(input, &mut result[filled..]);
        filled += step.consumed_out;
        input = &input[step.consumed_in..];
        match step
            .status
            .map_err(|e| TiffError::Decompression(e.to_string()))?
        {
            LzwStatus::Ok => {}
            LzwStatus::Done | LzwStatus::NoProgress => break,
        }
    }

    result.truncate(filled);
    Ok(result)
}
