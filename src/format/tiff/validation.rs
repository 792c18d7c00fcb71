//! Page validation for OME-TIFF decoding.
//!
//! This module checks that a page is inside the subset of TIFF that the
//! plane decoder handles. Unsupported pages are rejected before any strip
//! or tile is fetched.
//!
//! # Supported Subset
//!
//! - **Samples**: one sample per pixel, 8/16/32/64 bits, uint/int/float
//! - **Organization**: strips or tiles
//! - **Compression**: None, Deflate or Adobe Deflate
//! - **Predictor**: none
//! - **Format**: Standard TIFF or BigTIFF, either byte order

use tracing::warn;

use crate::error::TiffError;

use super::page::TiffPage;
use super::tags::{Compression, TiffTag, PREDICTOR_NONE};

// =============================================================================
// Validation Result
// =============================================================================

/// Result of validating a page for decoding.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the page can be decoded
    pub is_valid: bool,

    /// List of validation errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// List of validation warnings (non-fatal issues)
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Create a successful validation result.
    pub fn ok() -> Self {
        ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    /// Add a warning to the result.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Convert to a TiffError if invalid.
    ///
    /// Warnings are logged. Returns the first error as a TiffError, or
    /// Ok(()) if valid.
    pub fn into_result(self) -> Result<(), TiffError> {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// A specific validation error.
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Unsupported compression scheme
    UnsupportedCompression {
        /// Index of the page with unsupported compression
        page_index: usize,
        /// Human-readable compression name
        compression_name: String,
    },

    /// Differencing predictor present
    UnsupportedPredictor {
        /// Index of the page
        page_index: usize,
        /// The predictor value found
        predictor: u16,
    },

    /// Several samples per pixel or an unknown sample encoding
    UnsupportedSampleLayout {
        /// Index of the page
        page_index: usize,
        /// Description of the problem
        message: String,
    },

    /// Missing strip or tile location tags
    MissingDataTags {
        /// Index of the page missing tags
        page_index: usize,
        /// Which tags are missing
        missing_tags: Vec<&'static str>,
    },

    /// Invalid tile or strip dimensions
    InvalidChunkDimensions {
        /// Index of the page
        page_index: usize,
        /// Description of the problem
        message: String,
    },
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::UnsupportedCompression {
                compression_name, ..
            } => TiffError::UnsupportedCompression(compression_name),
            ValidationError::UnsupportedPredictor { predictor, .. } => {
                TiffError::UnsupportedPredictor(predictor)
            }
            ValidationError::UnsupportedSampleLayout {
                page_index,
                message,
            } => TiffError::UnsupportedSampleLayout(format!("page {}: {}", page_index, message)),
            ValidationError::MissingDataTags { missing_tags, .. } => {
                TiffError::MissingTag(missing_tags.first().copied().unwrap_or("StripOffsets"))
            }
            ValidationError::InvalidChunkDimensions {
                page_index,
                message,
            } => TiffError::InvalidTagValue {
                tag: "TileWidth/TileLength",
                message: format!("page {}: {}", page_index, message),
            },
        }
    }
}

// =============================================================================
// Page Validation
// =============================================================================

/// Validate a single page for decoding.
///
/// This checks that the page:
/// - Holds one sample per pixel in a pixel type OME can name
/// - Uses a supported compression and no predictor
/// - Has the strip or tile tags its organization needs
pub fn validate_page(page: &TiffPage) -> ValidationResult {
    let mut result = ValidationResult::ok();
    let page_index = page.page_index;

    if page.samples_per_pixel != 1 {
        result.add_error(ValidationError::UnsupportedSampleLayout {
            page_index,
            message: format!("{} samples per pixel", page.samples_per_pixel),
        });
        return result; // No point checking further
    }

    if page.pixel_type().is_none() {
        result.add_error(ValidationError::UnsupportedSampleLayout {
            page_index,
            message: format!(
                "{}-bit {:?} samples",
                page.bits_per_sample, page.sample_format
            ),
        });
    }

    if let Err(error) = check_compression(page.compression, page_index) {
        result.add_error(error);
    }

    if page.predictor != PREDICTOR_NONE {
        result.add_error(ValidationError::UnsupportedPredictor {
            page_index,
            predictor: page.predictor,
        });
    }

    let required: [TiffTag; 2] = if page.tiles.is_some() {
        [TiffTag::TileOffsets, TiffTag::TileByteCounts]
    } else {
        [TiffTag::StripOffsets, TiffTag::StripByteCounts]
    };
    let missing_tags: Vec<&'static str> = required
        .iter()
        .filter(|tag| !page.ifd.has_tag(**tag))
        .map(|tag| tag.name())
        .collect();
    if !missing_tags.is_empty() {
        result.add_error(ValidationError::MissingDataTags {
            page_index,
            missing_tags,
        });
    }

    match page.tiles {
        Some(tiles) if tiles.tile_width == 0 || tiles.tile_height == 0 => {
            result.add_error(ValidationError::InvalidChunkDimensions {
                page_index,
                message: "tile dimensions cannot be zero".to_string(),
            });
        }
        Some(tiles) if tiles.tile_width % 16 != 0 || tiles.tile_height % 16 != 0 => {
            result.add_warning(format!(
                "page {}: tile dimensions ({}x{}) are not multiples of 16",
                page_index, tiles.tile_width, tiles.tile_height
            ));
        }
        Some(_) => {}
        None if page.rows_per_strip == 0 => {
            result.add_error(ValidationError::InvalidChunkDimensions {
                page_index,
                message: "RowsPerStrip cannot be zero".to_string(),
            });
        }
        None => {}
    }

    result
}

// =============================================================================
// Quick validation functions
// =============================================================================

/// Check that a raw Compression tag value can be decoded.
pub fn check_compression(value: u16, page_index: usize) -> Result<(), ValidationError> {
    match Compression::from_u16(value) {
        Some(compression) if compression.is_supported() => Ok(()),
        Some(compression) => Err(ValidationError::UnsupportedCompression {
            page_index,
            compression_name: compression.name().to_string(),
        }),
        None => Err(ValidationError::UnsupportedCompression {
            page_index,
            compression_name: format!("Unknown ({})", value),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
