//! TIFF tag value reading.
//!
//! This module provides functionality to read tag values from TIFF files.
//! Values can be stored either inline in the IFD entry (for small values)
//! or at an offset in the file (for larger values like arrays and the
//! OME-XML description).
//!
//! Array values (StripOffsets, TileByteCounts, ...) are fetched with a single
//! range read each.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::{FieldType, TiffTag};

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file.
///
/// This struct combines a RangeReader with TIFF header information to
/// read values respecting the file's byte order and format.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, fetches the bytes from the file.
    pub fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        if entry.field_type.is_none() {
            return Err(TiffError::UnknownFieldType(entry.field_type_raw));
        }
        let size = entry
            .value_byte_size()
            .and_then(|size| usize::try_from(size).ok())
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("value count {} is too large", entry.count),
            })?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(&entry.value_offset_bytes[..size]))
        } else {
            let offset = entry.value_offset(self.header.byte_order);
            let bytes = self.reader.read_exact_at(offset, size)?;
            Ok(bytes)
        }
    }

    /// Read a single u32 value from an entry.
    ///
    /// Handles both Short and Long field types, converting as needed.
    pub fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32(self.header.byte_order) {
            return Ok(value);
        }

        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        let tag = tag_name(entry);
        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag,
                message: format!("expected count 1, got {}", entry.count),
            });
        }

        Err(TiffError::InvalidTagValue {
            tag,
            message: format!("expected Short or Long, got {:?}", field_type),
        })
    }

    /// Read a single u32 value of a tag that may hold one value per sample.
    ///
    /// Every value must be identical (e.g. BitsPerSample = 16,16,16); the
    /// common value is returned.
    pub fn read_uniform_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        let values = self.read_u64_array(entry)?;
        let first = *values.first().ok_or(TiffError::InvalidTagValue {
            tag: tag_name(entry),
            message: "empty value".to_string(),
        })?;
        if values.iter().any(|&v| v != first) {
            return Err(TiffError::UnsupportedSampleLayout(format!(
                "{} differs between samples: {:?}",
                tag_name(entry),
                values
            )));
        }
        u32::try_from(first).map_err(|_| TiffError::InvalidTagValue {
            tag: tag_name(entry),
            message: format!("value {} does not fit in 32 bits", first),
        })
    }

    /// Read an array of u64 values from an entry.
    ///
    /// This is the primary method for reading StripOffsets, StripByteCounts,
    /// TileOffsets and TileByteCounts. The entire array is fetched in one read.
    ///
    /// Handles Short, Long, and Long8 field types, converting all to u64.
    pub fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        let count = entry.count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let width = match field_type {
            FieldType::Short | FieldType::Long | FieldType::Long8 => field_type.size_in_bytes(),
            _ => {
                return Err(TiffError::InvalidTagValue {
                    tag: tag_name(entry),
                    message: format!(
                        "expected Short, Long, or Long8 for array, got {:?}",
                        field_type
                    ),
                });
            }
        };

        let bytes = self.read_bytes(entry)?;
        let byte_order = self.header.byte_order;

        let values = bytes
            .chunks_exact(width)
            .take(count)
            .map(|chunk| match field_type {
                FieldType::Short => byte_order.read_u16(chunk) as u64,
                FieldType::Long => byte_order.read_u32(chunk) as u64,
                _ => byte_order.read_u64(chunk),
            })
            .collect();

        Ok(values)
    }

    /// Read a string value from an entry (ASCII type).
    ///
    /// The string is expected to be null-terminated. The null terminator
    /// is stripped from the result.
    pub fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        // Some writers store the description as UNDEFINED or BYTE
        if !matches!(
            field_type,
            FieldType::Ascii | FieldType::Byte | FieldType::Undefined
        ) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry)?;

        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let s = String::from_utf8_lossy(&bytes[..end]).into_owned();

        Ok(s)
    }
}

fn tag_name(entry: &IfdEntry) -> &'static str {
    entry.tag().map(TiffTag::name).unwrap_or("unknown")
}

// =============================================================================
// Tests
// =============================================================================
