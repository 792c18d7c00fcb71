//! TIFF and BigTIFF encoding.
//!
//! [`TiffWriter`] appends pages to a seekable sink. Each page is laid out as
//! its strip data, then any tag values too large to sit inline, then the IFD
//! itself; the previous next-IFD pointer is patched once the IFD position is
//! known. Files are always written little-endian.
//!
//! ```text
//! header | strips(page 0) | values(page 0) | IFD(page 0) | strips(page 1) | ...
//! ```

use std::io::{Seek, SeekFrom, Write};

use tracing::trace;

use crate::error::{IoError, TiffError};

use super::parser::{ByteOrder, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::tags::{
    Compression, FieldType, SampleFormat, TiffTag, PHOTOMETRIC_MIN_IS_BLACK,
    PLANAR_CONFIG_CHUNKY,
};

// =============================================================================
// Page description
// =============================================================================

/// One page to append: an already compressed plane and its description.
#[derive(Debug, Clone)]
pub struct PageData<'a> {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Bits per sample
    pub bits_per_sample: u16,

    /// Interpretation of the samples
    pub sample_format: SampleFormat,

    /// Compression the strips were encoded with
    pub compression: Compression,

    /// Rows in every strip but possibly the last
    pub rows_per_strip: u32,

    /// Encoded strips, top to bottom
    pub strips: Vec<Vec<u8>>,

    /// ImageDescription to store on this page
    pub description: Option<&'a str>,
}

// =============================================================================
// Tag values
// =============================================================================

/// A tag value ready for encoding.
#[derive(Debug, Clone)]
enum TagValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Long8(Vec<u64>),
    Ascii(Vec<u8>),
}

impl TagValue {
    fn field_type(&self) -> FieldType {
        match self {
            TagValue::Short(_) => FieldType::Short,
            TagValue::Long(_) => FieldType::Long,
            TagValue::Long8(_) => FieldType::Long8,
            TagValue::Ascii(_) => FieldType::Ascii,
        }
    }

    fn count(&self) -> u64 {
        match self {
            TagValue::Short(v) => v.len() as u64,
            TagValue::Long(v) => v.len() as u64,
            TagValue::Long8(v) => v.len() as u64,
            TagValue::Ascii(v) => v.len() as u64,
        }
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TagValue::Short(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Long(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Long8(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TagValue::Ascii(v) => v.clone(),
        }
    }
}

// =============================================================================
// TiffWriter
// =============================================================================

/// Streaming writer for little-endian TIFF or BigTIFF files.
pub struct TiffWriter<W: Write + Seek> {
    sink: W,

    /// Name used in I/O error messages
    identifier: String,

    /// Write BigTIFF (64-bit offsets)
    bigtiff: bool,

    /// Position of the pointer to patch with the next IFD offset
    next_ifd_pointer: u64,

    /// Current end of the written data
    end: u64,

    pages_written: usize,
}

impl<W: Write + Seek> TiffWriter<W> {
    /// Start a file by writing its header.
    pub fn new(sink: W, bigtiff: bool, identifier: impl Into<String>) -> Result<Self, TiffError> {
        let mut writer = TiffWriter {
            sink,
            identifier: identifier.into(),
            bigtiff,
            next_ifd_pointer: 0,
            end: 0,
            pages_written: 0,
        };

        let mut header = Vec::with_capacity(BIGTIFF_HEADER_SIZE);
        header.extend_from_slice(&ByteOrder::LittleEndian.marker());
        if bigtiff {
            header.extend_from_slice(&43u16.to_le_bytes());
            header.extend_from_slice(&8u16.to_le_bytes());
            header.extend_from_slice(&0u16.to_le_bytes());
            header.extend_from_slice(&0u64.to_le_bytes());
            writer.next_ifd_pointer = 8;
        } else {
            header.extend_from_slice(&42u16.to_le_bytes());
            header.extend_from_slice(&0u32.to_le_bytes());
            writer.next_ifd_pointer = 4;
        }
        debug_assert_eq!(
            header.len(),
            if bigtiff { BIGTIFF_HEADER_SIZE } else { TIFF_HEADER_SIZE }
        );

        writer.seek_to(0)?;
        writer.write_bytes(&header)?;
        Ok(writer)
    }

    /// Whether 64-bit offsets are written.
    pub fn is_bigtiff(&self) -> bool {
        self.bigtiff
    }

    /// Number of pages appended so far.
    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    /// Append one page.
    pub fn write_page(&mut self, page: &PageData<'_>) -> Result<(), TiffError> {
        // Strip data
        let mut strip_offsets = Vec::with_capacity(page.strips.len());
        let mut strip_byte_counts = Vec::with_capacity(page.strips.len());
        for strip in &page.strips {
            self.align()?;
            strip_offsets.push(self.end);
            strip_byte_counts.push(strip.len() as u64);
            self.write_bytes(strip)?;
        }

        let mut tags: Vec<(TiffTag, TagValue)> = vec![
            (TiffTag::ImageWidth, TagValue::Long(vec![page.width])),
            (TiffTag::ImageLength, TagValue::Long(vec![page.height])),
            (
                TiffTag::BitsPerSample,
                TagValue::Short(vec![page.bits_per_sample]),
            ),
            (
                TiffTag::Compression,
                TagValue::Short(vec![page.compression.as_u16()]),
            ),
            (
                TiffTag::PhotometricInterpretation,
                TagValue::Short(vec![PHOTOMETRIC_MIN_IS_BLACK]),
            ),
            (TiffTag::StripOffsets, self.offset_value(strip_offsets)?),
            (TiffTag::SamplesPerPixel, TagValue::Short(vec![1])),
            (TiffTag::RowsPerStrip, TagValue::Long(vec![page.rows_per_strip])),
            (
                TiffTag::StripByteCounts,
                self.offset_value(strip_byte_counts)?,
            ),
            (
                TiffTag::PlanarConfiguration,
                TagValue::Short(vec![PLANAR_CONFIG_CHUNKY]),
            ),
            (
                TiffTag::SampleFormat,
                TagValue::Short(vec![page.sample_format.as_u16()]),
            ),
        ];
        if let Some(description) = page.description {
            let mut bytes = description.as_bytes().to_vec();
            bytes.push(0);
            tags.push((TiffTag::ImageDescription, TagValue::Ascii(bytes)));
        }
        tags.sort_by_key(|(tag, _)| tag.as_u16());

        // Values that do not fit in the entry
        let inline_size = if self.bigtiff {
            FieldType::INLINE_THRESHOLD_BIGTIFF
        } else {
            FieldType::INLINE_THRESHOLD_TIFF
        };
        let mut encoded = Vec::with_capacity(tags.len());
        for (tag, value) in &tags {
            let bytes = value.to_le_bytes();
            let field = if bytes.len() <= inline_size {
                let mut inline = bytes;
                inline.resize(inline_size, 0);
                inline
            } else {
                self.align()?;
                let offset = self.end;
                self.write_bytes(&bytes)?;
                self.encode_offset(offset)?
            };
            encoded.push((*tag, value.field_type(), value.count(), field));
        }

        // The IFD
        self.align()?;
        let ifd_offset = self.end;
        let mut ifd = Vec::new();
        if self.bigtiff {
            ifd.extend_from_slice(&(encoded.len() as u64).to_le_bytes());
        } else {
            ifd.extend_from_slice(&(encoded.len() as u16).to_le_bytes());
        }
        for (tag, field_type, count, field) in &encoded {
            ifd.extend_from_slice(&tag.as_u16().to_le_bytes());
            ifd.extend_from_slice(&field_type.as_u16().to_le_bytes());
            if self.bigtiff {
                ifd.extend_from_slice(&count.to_le_bytes());
            } else {
                ifd.extend_from_slice(&(*count as u32).to_le_bytes());
            }
            ifd.extend_from_slice(field);
        }
        let next_pointer = ifd_offset + ifd.len() as u64;
        ifd.extend_from_slice(&self.encode_offset(0)?);
        self.write_bytes(&ifd)?;

        // Link the new IFD into the chain
        let link = self.encode_offset(ifd_offset)?;
        let end = self.end;
        self.seek_to(self.next_ifd_pointer)?;
        self.sink.write_all(&link).map_err(|e| self.write_error(e))?;
        self.seek_to(end)?;
        self.next_ifd_pointer = next_pointer;

        trace!(
            page = self.pages_written,
            ifd_offset,
            strips = page.strips.len(),
            "wrote page"
        );
        self.pages_written += 1;
        Ok(())
    }

    /// Flush and return the sink.
    pub fn finish(mut self) -> Result<W, TiffError> {
        self.sink.flush().map_err(|e| self.write_error(e))?;
        Ok(self.sink)
    }

    /// Offsets and byte counts as SHORT/LONG for TIFF or LONG8 for BigTIFF.
    fn offset_value(&self, values: Vec<u64>) -> Result<TagValue, TiffError> {
        if self.bigtiff {
            return Ok(TagValue::Long8(values));
        }
        values
            .into_iter()
            .map(|v| u32::try_from(v).map_err(|_| TiffError::OffsetOverflow(v)))
            .collect::<Result<Vec<_>, _>>()
            .map(TagValue::Long)
    }

    fn encode_offset(&self, offset: u64) -> Result<Vec<u8>, TiffError> {
        if self.bigtiff {
            Ok(offset.to_le_bytes().to_vec())
        } else {
            let offset = u32::try_from(offset).map_err(|_| TiffError::OffsetOverflow(offset))?;
            Ok(offset.to_le_bytes().to_vec())
        }
    }

    /// Pad to a word boundary.
    fn align(&mut self) -> Result<(), TiffError> {
        if self.end % 2 == 1 {
            self.write_bytes(&[0])?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TiffError> {
        self.sink.write_all(bytes).map_err(|e| self.write_error(e))?;
        self.end += bytes.len() as u64;
        Ok(())
    }

    fn seek_to(&mut self, position: u64) -> Result<(), TiffError> {
        self.sink
            .seek(SeekFrom::Start(position))
            .map_err(|e| self.write_error(e))?;
        Ok(())
    }

    fn write_error(&self, error: std::io::Error) -> TiffError {
        TiffError::Io(IoError::Write {
            path: self.identifier.clone(),
            message: error.to_string(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
