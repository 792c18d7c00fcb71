//! OME-TIFF writing.
//!
//! A canonical (T, Z, C, Y, X) array is written as one striped page per
//! plane, T outermost and C fastest, which is the layout `XYCZT` describes.
//! The OME-XML is stored as the ImageDescription of the first page.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::array::OmeArray;
use crate::config::WriteOptions;
use crate::error::{IoError, OmeTiffError, Result};
use crate::format::compression::compress;
use crate::format::contains_ome_marker;
use crate::format::tiff::{PageData, TiffWriter};
use crate::ome::synthesize_metadata;

/// Bytes of header and IFD assumed per page when sizing the file.
const PAGE_OVERHEAD: u64 = 512;

/// Write a canonical array to an OME-TIFF file.
///
/// The file is created or truncated. Without `xml`, a descriptor is
/// synthesized from the array.
///
/// # Errors
/// - `Shape` if the array is not 5-D or has an empty axis
/// - `Tiff(UnsupportedCompression)` or `InvalidOptions` for bad options
/// - `Io` if the file cannot be written
pub fn write_ometiff(
    path: impl AsRef<Path>,
    array: &OmeArray,
    xml: Option<&str>,
    options: &WriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let identifier = path.display().to_string();

    let file = File::create(path).map_err(|e| IoError::Write {
        path: identifier.clone(),
        message: e.to_string(),
    })?;
    let sink = write_pages(BufWriter::new(file), array, xml, options, &identifier)?;
    sink.into_inner().map_err(|e| IoError::Write {
        path: identifier,
        message: e.error().to_string(),
    })?;
    Ok(())
}

/// Write a canonical array as OME-TIFF into any seekable sink.
///
/// Returns the sink once the last page is linked.
pub fn write_ometiff_to<W: Write + Seek>(
    sink: W,
    array: &OmeArray,
    xml: Option<&str>,
    options: &WriteOptions,
) -> Result<W> {
    write_pages(sink, array, xml, options, "<stream>")
}

fn write_pages<W: Write + Seek>(
    sink: W,
    array: &OmeArray,
    xml: Option<&str>,
    options: &WriteOptions,
    identifier: &str,
) -> Result<W> {
    options.validate()?;

    let [size_t, size_z, size_c, size_y, size_x] = array.canonical_shape()?;
    if [size_t, size_z, size_c, size_y, size_x].contains(&0) {
        return Err(OmeTiffError::Shape(format!(
            "every extent must be positive, got {:?}",
            array.shape()
        )));
    }
    let (width, height) = match (u32::try_from(size_x), u32::try_from(size_y)) {
        (Ok(width), Ok(height)) => (width, height),
        _ => {
            return Err(OmeTiffError::Shape(format!(
                "plane {}x{} exceeds the TIFF size range",
                size_x, size_y
            )))
        }
    };

    let xml = match xml {
        Some(xml) => {
            if !contains_ome_marker(xml.as_bytes()) {
                warn!(file = %identifier, "writing a description without an OME element");
            }
            xml.to_string()
        }
        None => synthesize_metadata(array)?,
    };

    let pixel_type = array.pixel_type();
    let row_bytes = size_x * pixel_type.bytes_per_sample();
    let rows_per_strip = options.strip_rows(height, row_bytes);
    let strip_bytes = rows_per_strip as usize * row_bytes;

    let plane_count = (size_t * size_z * size_c) as u64;
    let plane_bytes = (row_bytes * size_y) as u64;
    let estimated = plane_count * (plane_bytes + PAGE_OVERHEAD) + xml.len() as u64;
    let bigtiff = options.bigtiff.use_bigtiff(estimated);

    let mut writer = TiffWriter::new(sink, bigtiff, identifier)?;
    for t in 0..size_t {
        for z in 0..size_z {
            for c in 0..size_c {
                let description = (writer.pages_written() == 0).then_some(xml.as_str());
                let plane = array.plane_le_bytes(t, z, c);
                let strips = plane
                    .chunks(strip_bytes)
                    .map(|strip| compress(options.compression, strip))
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                writer.write_page(&PageData {
                    width,
                    height,
                    bits_per_sample: pixel_type.bits_per_sample(),
                    sample_format: pixel_type.sample_format(),
                    compression: options.compression,
                    rows_per_strip,
                    strips,
                    description,
                })?;
            }
        }
    }

    debug!(
        file = %identifier,
        pages = writer.pages_written(),
        bigtiff,
        compression = options.compression.name(),
        shape = ?array.shape(),
        pixel_type = %pixel_type,
        "wrote OME-TIFF"
    );

    Ok(writer.finish()?)
}

// =============================================================================
// Tests
// =============================================================================
