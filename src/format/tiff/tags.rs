//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary for TIFF parsing, including:
//! - Field types that determine how values are encoded
//! - Tag IDs that identify metadata fields
//!
//! The definitions support both classic TIFF and BigTIFF formats.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TiffError;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Each field type has a specific size in bytes, which is critical for:
/// - Determining if a value fits inline in an IFD entry
/// - Reading arrays of values correctly
///
/// Note: We only define types that carry the tags we read or write. TIFF
/// supports additional types (RATIONAL, FLOAT, etc.) whose entries are kept
/// but never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer (1 byte)
    Byte = 1,

    /// 8-bit ASCII character (1 byte)
    Ascii = 2,

    /// Unsigned 16-bit integer (2 bytes)
    Short = 3,

    /// Unsigned 32-bit integer (4 bytes)
    Long = 4,

    /// Unsigned 64-bit integer (8 bytes) - BigTIFF only
    Long8 = 16,

    /// Undefined byte data (1 byte per element)
    Undefined = 7,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    ///
    /// This is essential for:
    /// - Calculating total array sizes
    /// - Determining inline vs offset storage
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte => 1,
            FieldType::Ascii => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Long8 => 8,
            FieldType::Undefined => 1,
        }
    }

    /// Get the numeric type code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unsupported or unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Maximum bytes that can be stored inline in a classic TIFF IFD entry.
    ///
    /// In classic TIFF, the value/offset field is 4 bytes.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// Maximum bytes that can be stored inline in a BigTIFF IFD entry.
    ///
    /// In BigTIFF, the value/offset field is 8 bytes.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Check if a value with this type and count fits inline in a TIFF entry.
    ///
    /// # Arguments
    /// * `count` - Number of values
    /// * `is_bigtiff` - Whether this is a BigTIFF file
    ///
    /// # Returns
    /// `true` if the total value size fits in the inline value field.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF as u64
        } else {
            Self::INLINE_THRESHOLD_TIFF as u64
        };
        (self.size_in_bytes() as u64)
            .checked_mul(count)
            .is_some_and(|total_size| total_size <= threshold)
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs relevant to OME-TIFF reading and writing.
///
/// Tags are 16-bit identifiers that describe the type of metadata in an IFD entry.
/// We define only the tags needed for:
/// - Basic image structure (dimensions, sample layout)
/// - Strip and tile access (offsets, byte counts, sizes)
/// - Compression and predictor
/// - The OME-XML document (ImageDescription)
///
/// Tags not listed here are ignored during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    /// Kind of data in the subfile (reduced resolution, page, mask)
    NewSubfileType = 254,

    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Bits per sample (8, 16, 32 or 64)
    BitsPerSample = 258,

    /// Compression scheme used
    Compression = 259,

    /// Photometric interpretation (always MinIsBlack for OME-TIFF planes)
    PhotometricInterpretation = 262,

    /// Description string (holds the OME-XML document on the first page)
    ImageDescription = 270,

    /// Number of components per pixel
    SamplesPerPixel = 277,

    /// How components are organized (chunky vs planar)
    PlanarConfiguration = 284,

    /// Name of the software that wrote the file
    Software = 305,

    /// Differencing applied before compression
    Predictor = 317,

    /// Interpretation of each sample (unsigned, signed, float)
    SampleFormat = 339,

    // -------------------------------------------------------------------------
    // Strip Organization
    // -------------------------------------------------------------------------
    /// Byte offsets of strips
    StripOffsets = 273,

    /// Row count per strip
    RowsPerStrip = 278,

    /// Byte counts of strips
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    /// Width of each tile in pixels
    TileWidth = 322,

    /// Height (length) of each tile in pixels
    TileLength = 323,

    /// Byte offsets of each tile in the file
    TileOffsets = 324,

    /// Byte counts of each tile
    TileByteCounts = 325,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for unrecognized tags. Unknown tags are not an error;
    /// they are simply ignored during parsing.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(TiffTag::NewSubfileType),
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            270 => Some(TiffTag::ImageDescription),
            273 => Some(TiffTag::StripOffsets),
            277 => Some(TiffTag::SamplesPerPixel),
            278 => Some(TiffTag::RowsPerStrip),
            279 => Some(TiffTag::StripByteCounts),
            284 => Some(TiffTag::PlanarConfiguration),
            305 => Some(TiffTag::Software),
            317 => Some(TiffTag::Predictor),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            339 => Some(TiffTag::SampleFormat),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Tag name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::NewSubfileType => "NewSubfileType",
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::Software => "Software",
            TiffTag::Predictor => "Predictor",
            TiffTag::SampleFormat => "SampleFormat",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::RowsPerStrip => "RowsPerStrip",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
        }
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
///
/// Uncompressed, LZW and the two Deflate flavours are supported for both
/// reading and writing. The other schemes are recognized so that they can be
/// reported by name.
///
/// In configuration the scheme is named in snake case (`"none"`, `"lzw"`,
/// `"deflate"`, `"adobe_deflate"`); `"zlib"` is accepted as an alias for Deflate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Compression {
    /// No compression
    #[default]
    None = 1,

    /// LZW compression, MSB-first codes with the TIFF early size switch
    Lzw = 5,

    /// JPEG compression (not supported)
    Jpeg = 7,

    /// Deflate/zlib compression
    #[serde(alias = "zlib")]
    Deflate = 8,

    /// PackBits run-length compression (not supported)
    PackBits = 32773,

    /// Adobe Deflate, same stream format as Deflate with the legacy code
    AdobeDeflate = 32946,
}

impl Compression {
    /// Create a Compression from its numeric value.
    ///
    /// Returns `None` for unrecognized compression values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32773 => Some(Compression::PackBits),
            32946 => Some(Compression::AdobeDeflate),
            _ => None,
        }
    }

    /// Get the numeric TIFF code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if this compression scheme is supported.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            Compression::None
                | Compression::Lzw
                | Compression::Deflate
                | Compression::AdobeDeflate
        )
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Lzw => "LZW",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::PackBits => "PackBits",
            Compression::AdobeDeflate => "Adobe Deflate",
        }
    }
}

impl FromStr for Compression {
    type Err = TiffError;

    /// Parse a compression name as used in configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "deflate" | "zlib" => Ok(Compression::Deflate),
            "adobe_deflate" => Ok(Compression::AdobeDeflate),
            "lzw" => Ok(Compression::Lzw),
            "jpeg" => Ok(Compression::Jpeg),
            "packbits" => Ok(Compression::PackBits),
            _ => Err(TiffError::UnsupportedCompression(s.to_string())),
        }
    }
}

// =============================================================================
// Sample Format Values
// =============================================================================

/// SampleFormat tag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SampleFormat {
    /// Unsigned integer data (the default when the tag is absent)
    Uint = 1,

    /// Two's complement signed integer data
    Int = 2,

    /// IEEE floating point data
    Float = 3,
}

impl SampleFormat {
    /// Create a SampleFormat from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(SampleFormat::Uint),
            2 => Some(SampleFormat::Int),
            3 => Some(SampleFormat::Float),
            _ => None,
        }
    }

    /// Get the numeric tag value.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// PhotometricInterpretation value for grayscale planes where 0 is black.
pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;

/// PlanarConfiguration value for interleaved (chunky) samples.
pub const PLANAR_CONFIG_CHUNKY: u16 = 1;

/// Predictor value meaning no differencing.
pub const PREDICTOR_NONE: u16 = 1;

// =============================================================================
// Tests
// =============================================================================
