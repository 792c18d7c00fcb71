//! OME-XML for arrays written without caller-supplied metadata.

use tracing::debug;

use crate::array::OmeArray;
use crate::error::{OmeTiffError, Result};

use super::model::{Channel, Image, OmeDocument, Pixels, TiffData};
use super::DimensionOrder;

/// Build the OME document describing a canonical array as written to disk.
///
/// Planes are listed in the order the writer stores them: T outermost, then
/// Z, then C, which is what `XYCZT` declares.
pub fn synthesize_document(array: &OmeArray) -> Result<OmeDocument> {
    let [size_t, size_z, size_c, size_y, size_x] = array.canonical_shape()?;
    let extents = [size_t, size_z, size_c, size_y, size_x];
    if extents.iter().any(|&n| n == 0) {
        return Err(OmeTiffError::Shape(format!(
            "every extent must be positive, got {:?}",
            extents
        )));
    }
    let to_u32 = |n: usize| {
        u32::try_from(n)
            .map_err(|_| OmeTiffError::Shape(format!("extent {} exceeds the OME size range", n)))
    };

    let channels = (0..size_c)
        .map(|c| Channel {
            id: format!("Channel:0:{}", c),
            name: Some(format!("C:{}", c)),
            samples_per_pixel: Some(1),
        })
        .collect();

    let mut tiff_data = Vec::with_capacity(size_t * size_z * size_c);
    let mut ifd = 0u32;
    for t in 0..size_t {
        for z in 0..size_z {
            for c in 0..size_c {
                tiff_data.push(TiffData {
                    ifd: Some(ifd),
                    first_t: Some(to_u32(t)?),
                    first_z: Some(to_u32(z)?),
                    first_c: Some(to_u32(c)?),
                    plane_count: Some(1),
                });
                ifd += 1;
            }
        }
    }

    let pixels = Pixels {
        id: "Pixels:0".to_string(),
        dimension_order: DimensionOrder::XYCZT.as_str().to_string(),
        pixel_type: array.pixel_type().as_str().to_string(),
        size_x: to_u32(size_x)?,
        size_y: to_u32(size_y)?,
        size_z: to_u32(size_z)?,
        size_c: to_u32(size_c)?,
        size_t: to_u32(size_t)?,
        big_endian: Some(false),
        channels,
        tiff_data,
    };

    Ok(OmeDocument {
        images: vec![Image {
            id: "Image:0".to_string(),
            name: Some("IMAGE".to_string()),
            acquisition_date: None,
            pixels,
        }],
    })
}

/// Build the OME-XML string describing a canonical array.
///
/// # Errors
/// `Shape` if the array is not 5-D or has an empty axis.
pub fn synthesize_metadata(array: &OmeArray) -> Result<String> {
    let document = synthesize_document(array)?;
    debug!(
        shape = ?array.shape(),
        pixel_type = %array.pixel_type(),
        "synthesized OME-XML"
    );
    document.to_xml()
}
