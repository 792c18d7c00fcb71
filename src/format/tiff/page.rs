//! TIFF pages and plane decoding.
//!
//! Every IFD in the main chain of an OME-TIFF file is one page holding one
//! (Y, X) plane. A page is described from the tags that are stored inline,
//! so listing pages costs one read per IFD; strip or tile offsets are only
//! fetched when the plane is decoded.
//!
//! # Data Organization
//!
//! - **Strips**: groups of `RowsPerStrip` full rows, the last strip may be short.
//! - **Tiles**: fixed `TileWidth` x `TileLength` blocks. Edge tiles are stored
//!   padded to the full tile size and are cropped while assembling the plane.

use tracing::trace;

use crate::error::TiffError;
use crate::format::compression::decompress;
use crate::io::RangeReader;
use crate::ome::PixelType;

use super::parser::Ifd;
use super::tags::{Compression, SampleFormat, TiffTag, PLANAR_CONFIG_CHUNKY, PREDICTOR_NONE};
use super::validation::validate_page;
use super::values::ValueReader;

// =============================================================================
// TiffPage
// =============================================================================

/// Tiling of a page, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,
}

/// One page (IFD) of a TIFF file.
#[derive(Debug, Clone)]
pub struct TiffPage {
    /// Index of this page in the IFD chain
    pub page_index: usize,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Bits per sample
    pub bits_per_sample: u16,

    /// Interpretation of the samples
    pub sample_format: SampleFormat,

    /// Samples per pixel (1 for OME-TIFF planes)
    pub samples_per_pixel: u16,

    /// Chunky (1) or planar (2) sample organization
    pub planar_configuration: u16,

    /// Raw compression code
    pub compression: u16,

    /// Raw predictor code
    pub predictor: u16,

    /// Rows per strip, `height` if the tag is absent
    pub rows_per_strip: u32,

    /// Tile geometry for tiled pages, `None` for striped pages
    pub tiles: Option<TileGeometry>,

    /// The parsed IFD for this page
    pub ifd: Ifd,
}

impl TiffPage {
    /// Describe a page from its IFD.
    ///
    /// # Errors
    /// - `MissingTag` if ImageWidth or ImageLength is absent
    /// - `InvalidTagValue` if a sample tag has an unexpected value
    pub fn from_ifd<R: RangeReader>(
        ifd: Ifd,
        page_index: usize,
        values: &ValueReader<'_, R>,
    ) -> Result<Self, TiffError> {
        let byte_order = values.byte_order();

        let width = ifd
            .image_width(byte_order)
            .ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = ifd
            .image_height(byte_order)
            .ok_or(TiffError::MissingTag("ImageLength"))?;

        // BitsPerSample and SampleFormat hold one value per sample
        let bits_per_sample = match ifd.get_entry_by_tag(TiffTag::BitsPerSample) {
            Some(entry) => values.read_uniform_u32(entry)? as u16,
            None => 1,
        };
        let sample_format_raw = match ifd.get_entry_by_tag(TiffTag::SampleFormat) {
            Some(entry) => values.read_uniform_u32(entry)? as u16,
            None => SampleFormat::Uint.as_u16(),
        };
        let sample_format =
            SampleFormat::from_u16(sample_format_raw).ok_or_else(|| {
                TiffError::UnsupportedSampleLayout(format!(
                    "page {}: SampleFormat {}",
                    page_index, sample_format_raw
                ))
            })?;

        let small = |tag: TiffTag, default: u16| {
            ifd.get_u32(tag, byte_order)
                .map(|v| v as u16)
                .unwrap_or(default)
        };
        let samples_per_pixel = small(TiffTag::SamplesPerPixel, 1);
        let planar_configuration = small(TiffTag::PlanarConfiguration, PLANAR_CONFIG_CHUNKY);
        let compression = small(TiffTag::Compression, Compression::None.as_u16());
        let predictor = small(TiffTag::Predictor, PREDICTOR_NONE);

        let rows_per_strip = ifd
            .get_u32(TiffTag::RowsPerStrip, byte_order)
            .map(|rows| rows.min(height))
            .unwrap_or(height);

        let tiles = match (ifd.tile_width(byte_order), ifd.tile_height(byte_order)) {
            (Some(tile_width), Some(tile_height)) if ifd.is_tiled() => Some(TileGeometry {
                tile_width,
                tile_height,
            }),
            _ => None,
        };

        Ok(TiffPage {
            page_index,
            width,
            height,
            bits_per_sample,
            sample_format,
            samples_per_pixel,
            planar_configuration,
            compression,
            predictor,
            rows_per_strip,
            tiles,
            ifd,
        })
    }

    /// The OME pixel type of the samples, if they have one.
    pub fn pixel_type(&self) -> Option<PixelType> {
        PixelType::from_tiff(self.bits_per_sample, self.sample_format)
    }

    /// Size in bytes of the decoded plane.
    pub fn plane_byte_len(&self) -> usize {
        self.width as usize * self.height as usize * (self.bits_per_sample as usize / 8)
    }

    /// Number of tiles across and down, `None` for striped pages.
    pub fn tile_count(&self) -> Option<(u32, u32)> {
        self.tiles.map(|t| {
            (
                self.width.div_ceil(t.tile_width),
                self.height.div_ceil(t.tile_height),
            )
        })
    }

    /// Decode the plane of this page.
    ///
    /// Returns `width * height` samples as raw bytes in the file's byte order.
    pub fn read_plane<R: RangeReader>(
        &self,
        reader: &R,
        values: &ValueReader<'_, R>,
    ) -> Result<Vec<u8>, TiffError> {
        validate_page(self).into_result()?;

        // validate_page rejected every unsupported code
        let compression =
            Compression::from_u16(self.compression).unwrap_or(Compression::None);

        let (offsets_tag, counts_tag) = if self.tiles.is_some() {
            (TiffTag::TileOffsets, TiffTag::TileByteCounts)
        } else {
            (TiffTag::StripOffsets, TiffTag::StripByteCounts)
        };
        let offsets = self.read_array(values, offsets_tag)?;
        let byte_counts = self.read_array(values, counts_tag)?;

        let expected_chunks = self.chunk_count();
        if offsets.len() < expected_chunks || byte_counts.len() < expected_chunks {
            return Err(TiffError::InvalidTagValue {
                tag: offsets_tag.name(),
                message: format!(
                    "page {}: expected {} chunks, found {} offsets and {} byte counts",
                    self.page_index,
                    expected_chunks,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        trace!(
            page = self.page_index,
            chunks = expected_chunks,
            compression = compression.name(),
            "decoding plane"
        );

        let mut plane = vec![0u8; self.plane_byte_len()];
        for chunk in 0..expected_chunks {
            let raw = reader.read_exact_at(offsets[chunk], byte_counts[chunk] as usize)?;
            let expected = self.chunk_byte_len(chunk);
            let decoded = decompress(compression, &raw, expected)?;
            if decoded.len() < expected {
                return Err(TiffError::Decompression(format!(
                    "page {} chunk {}: expected {} bytes, got {}",
                    self.page_index,
                    chunk,
                    expected,
                    decoded.len()
                )));
            }
            self.place_chunk(chunk, &decoded, &mut plane);
        }

        Ok(plane)
    }

    fn read_array<R: RangeReader>(
        &self,
        values: &ValueReader<'_, R>,
        tag: TiffTag,
    ) -> Result<Vec<u64>, TiffError> {
        let entry = self
            .ifd
            .get_entry_by_tag(tag)
            .ok_or(TiffError::MissingTag(tag.name()))?;
        values.read_u64_array(entry)
    }

    fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Number of strips or tiles that make up the plane.
    fn chunk_count(&self) -> usize {
        match self.tile_count() {
            Some((across, down)) => across as usize * down as usize,
            None => self.height.div_ceil(self.rows_per_strip.max(1)) as usize,
        }
    }

    /// Decoded size of one strip or tile.
    fn chunk_byte_len(&self, chunk: usize) -> usize {
        let row_len = self.width as usize * self.bytes_per_sample();
        match self.tiles {
            Some(t) => t.tile_width as usize * t.tile_height as usize * self.bytes_per_sample(),
            None => {
                let rows_per_strip = self.rows_per_strip.max(1) as usize;
                let first_row = chunk * rows_per_strip;
                let rows = rows_per_strip.min(self.height as usize - first_row);
                rows * row_len
            }
        }
    }

    /// Copy a decoded strip or tile into its place in the plane.
    fn place_chunk(&self, chunk: usize, decoded: &[u8], plane: &mut [u8]) {
        let bps = self.bytes_per_sample();
        let row_len = self.width as usize * bps;

        match (self.tiles, self.tile_count()) {
            (Some(t), Some((across, _))) => {
                let tile_x = chunk % across as usize;
                let tile_y = chunk / across as usize;
                let x0 = tile_x * t.tile_width as usize;
                let y0 = tile_y * t.tile_height as usize;
                let cols = (t.tile_width as usize).min(self.width as usize - x0);
                let rows = (t.tile_height as usize).min(self.height as usize - y0);
                let tile_row_len = t.tile_width as usize * bps;

                for r in 0..rows {
                    let src = r * tile_row_len;
                    let dst = (y0 + r) * row_len + x0 * bps;
                    plane[dst..dst + cols * bps].copy_from_slice(&decoded[src..src + cols * bps]);
                }
            }
            _ => {
                let start = chunk * self.rows_per_strip.max(1) as usize * row_len;
                let len = self.chunk_byte_len(chunk);
                plane[start..start + len].copy_from_slice(&decoded[..len]);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
