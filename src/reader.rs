//! OME-TIFF reading.
//!
//! [`OmeTiffFile`] parses the TIFF page chain and the OME-XML of a file once
//! on open. Series are decoded on demand: the pages of series `i` are the
//! `SizeZ * SizeC * SizeT` pages following the pages of every earlier series,
//! and each series is normalized with its own `Pixels` descriptor.

use std::path::Path;

use tracing::{debug, trace, warn};

use crate::array::OmeArray;
use crate::error::{OmeTiffError, Result, TiffError};
use crate::format::contains_ome_marker;
use crate::format::tiff::{TiffContainer, TiffPage};
use crate::io::{FileRangeReader, RangeReader};
use crate::ome::{Dim, OmeDocument, PixelType, Pixels};

// =============================================================================
// OmeTiffFile
// =============================================================================

/// An open OME-TIFF file.
///
/// The underlying reader is owned by the handle and released when the handle
/// is closed or dropped.
#[derive(Debug)]
pub struct OmeTiffFile<R: RangeReader = FileRangeReader> {
    reader: R,

    /// Header and page chain
    container: TiffContainer,

    /// The OME-XML exactly as stored in the first ImageDescription
    ome_xml: String,

    /// Parsed view of `ome_xml`
    document: OmeDocument,
}

impl OmeTiffFile<FileRangeReader> {
    /// Open an OME-TIFF file on disk.
    ///
    /// # Errors
    /// - `Io` if the file is missing or unreadable
    /// - `Tiff` if the container is malformed
    /// - `Metadata` if the first page carries no parsable OME-XML
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = FileRangeReader::open(path)?;
        Self::from_reader(reader)
    }
}

impl<R: RangeReader> OmeTiffFile<R> {
    /// Open an OME-TIFF from any range reader.
    pub fn from_reader(reader: R) -> Result<Self> {
        let container = TiffContainer::parse(&reader)?;

        let ome_xml = container.image_description(&reader)?.ok_or_else(|| {
            OmeTiffError::Metadata(format!(
                "{}: first page has no ImageDescription",
                reader.identifier()
            ))
        })?;
        if !contains_ome_marker(ome_xml.as_bytes()) {
            return Err(OmeTiffError::Metadata(format!(
                "{}: ImageDescription is not an OME document",
                reader.identifier()
            )));
        }

        let document = OmeDocument::parse(&ome_xml)?;
        if document.images.is_empty() {
            return Err(OmeTiffError::Metadata(format!(
                "{}: OME document has no Image",
                reader.identifier()
            )));
        }

        debug!(
            file = %reader.identifier(),
            pages = container.page_count(),
            series = document.series_count(),
            bigtiff = container.header.is_bigtiff,
            byte_order = ?container.header.byte_order,
            "opened OME-TIFF"
        );

        Ok(OmeTiffFile {
            reader,
            container,
            ome_xml,
            document,
        })
    }

    /// Close the file.
    pub fn close(self) {
        trace!(file = %self.reader.identifier(), "closing OME-TIFF");
    }

    /// Whether the file describes more than one image.
    pub fn is_multi_series(&self) -> bool {
        self.document.series_count() > 1
    }

    /// Number of images (series) in the file.
    pub fn series_count(&self) -> usize {
        self.document.series_count()
    }

    /// Number of TIFF pages in the main IFD chain.
    pub fn page_count(&self) -> usize {
        self.container.page_count()
    }

    /// The OME-XML string as stored in the file.
    pub fn ome_xml(&self) -> &str {
        &self.ome_xml
    }

    /// The parsed OME document.
    pub fn metadata(&self) -> &OmeDocument {
        &self.document
    }

    // =========================================================================
    // Pixel data
    // =========================================================================

    /// Read the first series together with the file's OME-XML.
    pub fn read(&self) -> Result<(OmeArray, String)> {
        let array = self.read_series(0)?;
        Ok((array, self.ome_xml.clone()))
    }

    /// Read every series in document order together with the OME-XML.
    ///
    /// Fails as a whole if any series fails.
    pub fn read_all_series(&self) -> Result<(Vec<OmeArray>, String)> {
        let arrays = (0..self.series_count())
            .map(|index| self.read_series(index))
            .collect::<Result<Vec<_>>>()?;
        Ok((arrays, self.ome_xml.clone()))
    }

    /// Read one series as a canonical (T, Z, C, Y, X) array.
    ///
    /// # Errors
    /// - `Metadata` if `index` is out of range or the file has too few pages
    /// - `UnsupportedDimensionOrder` if the descriptor's order is unknown
    /// - `Shape` if a page does not match the declared plane size
    /// - `Tiff` if a page cannot be decoded
    pub fn read_series(&self, index: usize) -> Result<OmeArray> {
        let image = self.document.image(index).ok_or_else(|| {
            OmeTiffError::Metadata(format!(
                "series {} out of range, file has {}",
                index,
                self.series_count()
            ))
        })?;
        let pixels = &image.pixels;

        // Fail on the order before touching any pixel
        let order = pixels.dimension_order()?;
        check_sizes(pixels)?;

        let first_page: usize = self.document.images[..index]
            .iter()
            .map(|image| image.pixels.plane_count())
            .sum();
        let plane_count = pixels.plane_count();
        let pages = self
            .container
            .pages
            .get(first_page..first_page + plane_count)
            .ok_or_else(|| {
                OmeTiffError::Metadata(format!(
                    "series {} needs pages {}..{} but the file has {}",
                    index,
                    first_page,
                    first_page + plane_count,
                    self.container.page_count()
                ))
            })?;

        let pixel_type = series_pixel_type(pages, pixels)?;
        let values = self.container.value_reader(&self.reader);

        let mut bytes = Vec::with_capacity(plane_count * pages[0].plane_byte_len());
        for page in pages {
            if page.width != pixels.size_x || page.height != pixels.size_y {
                return Err(OmeTiffError::Shape(format!(
                    "page {} is {}x{}, series {} declares {}x{}",
                    page.page_index, page.width, page.height, index, pixels.size_x, pixels.size_y
                )));
            }
            trace!(page = page.page_index, series = index, "decoding page");
            bytes.extend_from_slice(&page.read_plane(&self.reader, &values)?);
        }

        let shape = raw_shape(pixels, order.outer_to_inner());
        let raw = OmeArray::from_raw_bytes(pixel_type, &shape, &bytes, values.byte_order())?;
        let array = raw.normalize(
            pixels.size_c as usize,
            pixels.size_z as usize,
            pixels.size_t as usize,
            order,
        )?;

        debug!(
            series = index,
            first_page,
            pages = plane_count,
            order = %order,
            pixel_type = %pixel_type,
            shape = ?array.shape(),
            "decoded series"
        );

        Ok(array)
    }
}

/// Reject descriptors with an empty axis.
fn check_sizes(pixels: &Pixels) -> Result<()> {
    let sizes = [
        ("SizeX", pixels.size_x),
        ("SizeY", pixels.size_y),
        ("SizeZ", pixels.size_z),
        ("SizeC", pixels.size_c),
        ("SizeT", pixels.size_t),
    ];
    for (name, value) in sizes {
        if value == 0 {
            return Err(OmeTiffError::Shape(format!(
                "{} of {} must be positive",
                name, pixels.id
            )));
        }
    }
    Ok(())
}

/// The pixel type shared by every page of a series.
///
/// The TIFF sample encoding wins over the descriptor's `Type`.
fn series_pixel_type(pages: &[TiffPage], pixels: &Pixels) -> Result<PixelType> {
    let first = &pages[0];
    let pixel_type = first.pixel_type().ok_or_else(|| {
        TiffError::UnsupportedSampleLayout(format!(
            "page {}: {}-bit {:?} samples",
            first.page_index, first.bits_per_sample, first.sample_format
        ))
    })?;

    if let Some(page) = pages.iter().find(|p| p.pixel_type() != Some(pixel_type)) {
        return Err(TiffError::UnsupportedSampleLayout(format!(
            "page {} has {}-bit {:?} samples, page {} is {}",
            page.page_index, page.bits_per_sample, page.sample_format, first.page_index, pixel_type
        ))
        .into());
    }

    if let Some(declared) = pixels.pixel_type() {
        if declared != pixel_type {
            warn!(
                pixels = %pixels.id,
                declared = %declared,
                stored = %pixel_type,
                "OME Type disagrees with the TIFF sample format, using the TIFF sample format"
            );
        }
    }

    Ok(pixel_type)
}

/// Shape of the concatenated pages: every non-trivial dimension in storage
/// order from slowest to fastest, then (Y, X).
fn raw_shape(pixels: &Pixels, outer_to_inner: [Dim; 3]) -> Vec<usize> {
    let mut shape: Vec<usize> = outer_to_inner
        .into_iter()
        .map(|dim| match dim {
            Dim::C => pixels.size_c as usize,
            Dim::Z => pixels.size_z as usize,
            Dim::T => pixels.size_t as usize,
        })
        .filter(|&size| size > 1)
        .collect();
    shape.extend([pixels.size_y as usize, pixels.size_x as usize]);
    shape
}

/// Read the first series of an OME-TIFF file and its OME-XML.
///
/// Opens the file, reads series 0 and closes it again.
pub fn read_ometiff(path: impl AsRef<Path>) -> Result<(OmeArray, String)> {
    let file = OmeTiffFile::open(path)?;
    let result = file.read();
    file.close();
    result
}

// =============================================================================
// Tests
// =============================================================================
