//! Format detection for OME-TIFF files.
//!
//! A file is an OME-TIFF when it is a TIFF (or BigTIFF) whose first page
//! carries an ImageDescription containing an `<OME` root element. Any other
//! TIFF is reported as plain TIFF; everything else fails header parsing.

use crate::error::TiffError;
use crate::io::RangeReader;

use super::tiff::{
    ByteOrder, Ifd, TiffHeader, TiffTag, ValueReader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
};

// =============================================================================
// FileFormat
// =============================================================================

/// Detected file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// TIFF with an OME-XML document in the first ImageDescription
    OmeTiff,

    /// Any other TIFF or BigTIFF
    PlainTiff,
}

impl FileFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            FileFormat::OmeTiff => "OME-TIFF",
            FileFormat::PlainTiff => "TIFF",
        }
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Marker for an OME-XML root element.
const OME_MARKER: &[u8] = b"<OME";

/// Detect the format of a file.
///
/// Only the header and the first IFD are read.
///
/// # Format Detection Logic
///
/// 1. Read initial bytes and verify TIFF/BigTIFF magic
/// 2. Parse the first IFD to access ImageDescription tag
/// 3. If ImageDescription contains `<OME`, classify as OME-TIFF
/// 4. Otherwise, classify as plain TIFF
pub fn detect_format<R: RangeReader>(reader: &R) -> Result<FileFormat, TiffError> {
    let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
    let header_bytes = reader.read_exact_at(0, header_len)?;
    let header = TiffHeader::parse(&header_bytes, reader.size())?;

    // Read first IFD entry count
    let count_size = header.ifd_count_size();
    let count_bytes = reader.read_exact_at(header.first_ifd_offset, count_size)?;

    let entry_count = header.read_entry_count(&count_bytes);

    // Read the full IFD
    let ifd_size = Ifd::calculate_size(entry_count, &header)
        .ok_or(TiffError::InvalidIfdOffset(header.first_ifd_offset))?;
    let ifd_bytes = reader.read_exact_at(header.first_ifd_offset, ifd_size)?;
    let ifd = Ifd::parse(&ifd_bytes, &header)?;

    let values = ValueReader::new(reader, &header);
    if let Some(entry) = ifd.get_entry_by_tag(TiffTag::ImageDescription) {
        let description = values.read_bytes(entry)?;
        if contains_ome_marker(&description) {
            return Ok(FileFormat::OmeTiff);
        }
    }

    Ok(FileFormat::PlainTiff)
}

/// Check if a description contains an OME-XML root element.
pub fn contains_ome_marker(data: &[u8]) -> bool {
    data.windows(OME_MARKER.len())
        .any(|window| window == OME_MARKER)
}

/// Check if bytes represent a valid TIFF header.
///
/// This is a quick check that can be used before attempting full parsing.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let Some(byte_order) = ByteOrder::from_marker([bytes[0], bytes[1]]) else {
        return false;
    };
    let version = byte_order.read_u16(&bytes[2..4]);
    version == 42 || version == 43
}

// =============================================================================
// Tests
// =============================================================================
