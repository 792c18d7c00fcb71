//! Configuration for writing files and editing metadata.
//!
//! Both structs are plain serde types with defaults for every field, so they
//! can be built in code or loaded from any serde format.
//!
//! # Example
//!
//! ```
//! use ome_tiff::config::{BigTiffMode, WriteOptions};
//! use ome_tiff::Compression;
//!
//! let options: WriteOptions =
//!     serde_json::from_str(r#"{ "compression": "zlib", "bigtiff": "always" }"#).unwrap();
//! assert_eq!(options.compression, Compression::Deflate);
//! assert_eq!(options.bigtiff, BigTiffMode::Always);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{OmeTiffError, Result, TiffError};
use crate::format::tiff::Compression;
use crate::ome::{DimensionOrder, PixelType};

// =============================================================================
// Default Values
// =============================================================================

/// Target size of one uncompressed strip when `rows_per_strip` is not set.
pub const DEFAULT_STRIP_BYTES: usize = 64 * 1024;

/// Largest estimated file size written as classic TIFF in [`BigTiffMode::Auto`].
///
/// Leaves 32 MiB of the 4 GiB offset range for IFDs and metadata.
pub const CLASSIC_TIFF_LIMIT: u64 = (1 << 32) - (1 << 25);

// =============================================================================
// WriteOptions
// =============================================================================

/// When to write a BigTIFF instead of a classic TIFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BigTiffMode {
    /// BigTIFF only when the estimated size exceeds [`CLASSIC_TIFF_LIMIT`]
    #[default]
    Auto,

    /// Always BigTIFF
    Always,

    /// Always classic TIFF; writing fails if offsets overflow
    Never,
}

impl BigTiffMode {
    /// Whether a file of `estimated_size` bytes is written as BigTIFF.
    pub fn use_bigtiff(self, estimated_size: u64) -> bool {
        match self {
            BigTiffMode::Auto => estimated_size > CLASSIC_TIFF_LIMIT,
            BigTiffMode::Always => true,
            BigTiffMode::Never => false,
        }
    }
}

/// Options for [`write_ometiff`](crate::write_ometiff).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteOptions {
    /// Strip compression
    pub compression: Compression,

    /// Container variant
    pub bigtiff: BigTiffMode,

    /// Rows per strip; strips of about [`DEFAULT_STRIP_BYTES`] when unset
    pub rows_per_strip: Option<u32>,
}

impl WriteOptions {
    /// Validate the options.
    ///
    /// Returns an error if the compression cannot be written or the strip
    /// height is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.compression.is_supported() {
            let name = self.compression.name().to_string();
            return Err(TiffError::UnsupportedCompression(name).into());
        }
        if self.rows_per_strip == Some(0) {
            return Err(OmeTiffError::InvalidOptions(
                "rows_per_strip must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Rows per strip for planes of `height` rows of `row_bytes` bytes.
    pub fn strip_rows(&self, height: u32, row_bytes: usize) -> u32 {
        let rows = match self.rows_per_strip {
            Some(rows) => rows,
            None => (DEFAULT_STRIP_BYTES / row_bytes.max(1)).max(1) as u32,
        };
        rows.clamp(1, height.max(1))
    }
}

// =============================================================================
// MetadataOverrides
// =============================================================================

/// Values to apply to the first image of an OME-XML document.
///
/// Only fields that are `Some` are applied; `Some("")` sets an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataOverrides {
    // =========================================================================
    // Image
    // =========================================================================
    pub image_id: Option<String>,
    pub image_name: Option<String>,
    pub acquisition_date: Option<String>,

    // =========================================================================
    // Pixels
    // =========================================================================
    pub dimension_order: Option<DimensionOrder>,
    pub pixel_type: Option<PixelType>,
    pub size_t: Option<u32>,
    pub size_z: Option<u32>,
    pub size_c: Option<u32>,
    pub size_x: Option<u32>,
    pub size_y: Option<u32>,

    // =========================================================================
    // First Channel
    // =========================================================================
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub channel_samples_per_pixel: Option<u32>,
}

impl MetadataOverrides {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        *self == MetadataOverrides::default()
    }

    /// Whether any Channel attribute is overridden.
    pub fn touches_channel(&self) -> bool {
        self.channel_id.is_some()
            || self.channel_name.is_some()
            || self.channel_samples_per_pixel.is_some()
    }

    /// Check that every overridden size is positive.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("SizeT", self.size_t),
            ("SizeZ", self.size_z),
            ("SizeC", self.size_c),
            ("SizeX", self.size_x),
            ("SizeY", self.size_y),
            ("SamplesPerPixel", self.channel_samples_per_pixel),
        ];
        for (name, value) in sizes {
            if value == Some(0) {
                return Err(OmeTiffError::Shape(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
