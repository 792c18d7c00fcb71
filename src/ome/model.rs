//! Minimal typed view of an OME-XML document.
//!
//! Only the parts needed to read and write pixel data are modelled: every
//! `Image` with its `AcquisitionDate`, its `Pixels` descriptor, the `Channel`
//! and `TiffData` children of the descriptor. Everything else in the document
//! is skipped when parsing; the source XML string is kept by the caller
//! when it has to be round-tripped.

use quick_xml::events::attributes::Attributes;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{OmeTiffError, Result};

use super::{DimensionOrder, PixelType};

/// OME-XML namespace written by this crate.
pub const OME_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";

/// Location of the schema matching [`OME_NAMESPACE`].
pub const OME_SCHEMA_LOCATION: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06 \
     http://www.openmicroscopy.org/Schemas/OME/2016-06/ome.xsd";

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

// =============================================================================
// Model
// =============================================================================

/// An OME document: the ordered list of images it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OmeDocument {
    pub images: Vec<Image>,
}

/// One `Image` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub name: Option<String>,
    pub acquisition_date: Option<String>,
    pub pixels: Pixels,
}

/// The `Pixels` descriptor of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixels {
    pub id: String,

    /// Raw `DimensionOrder` attribute; see [`Pixels::dimension_order`].
    pub dimension_order: String,

    /// Raw `Type` attribute; see [`Pixels::pixel_type`].
    pub pixel_type: String,

    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub size_c: u32,
    pub size_t: u32,
    pub big_endian: Option<bool>,
    pub channels: Vec<Channel>,
    pub tiff_data: Vec<TiffData>,
}

/// One `Channel` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
    pub samples_per_pixel: Option<u32>,
}

/// One `TiffData` element: a run of planes stored in consecutive IFDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TiffData {
    pub ifd: Option<u32>,
    pub first_z: Option<u32>,
    pub first_t: Option<u32>,
    pub first_c: Option<u32>,
    pub plane_count: Option<u32>,
}

impl Pixels {
    /// The declared storage order.
    ///
    /// # Errors
    /// `UnsupportedDimensionOrder` for anything but the six OME orders.
    pub fn dimension_order(&self) -> Result<DimensionOrder> {
        self.dimension_order.parse()
    }

    /// The declared element type, if it is one this crate handles.
    pub fn pixel_type(&self) -> Option<PixelType> {
        self.pixel_type.parse().ok()
    }

    /// Number of planes (TIFF pages) the image occupies.
    pub fn plane_count(&self) -> usize {
        self.size_z as usize * self.size_c as usize * self.size_t as usize
    }
}

impl OmeDocument {
    /// Number of images (series).
    pub fn series_count(&self) -> usize {
        self.images.len()
    }

    /// Image at `index`.
    pub fn image(&self, index: usize) -> Option<&Image> {
        self.images.get(index)
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    /// Parse an OME-XML document.
    ///
    /// # Errors
    /// `Metadata` if the XML is malformed, the root is not `OME`, or an image
    /// lacks its `Pixels` or a required attribute.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);

        let mut document = OmeDocument::default();
        let mut depth = 0usize;
        let mut saw_root = false;

        let mut image: Option<PartialImage> = None;
        let mut in_acquisition_date = false;

        loop {
            let event = reader.read_event()?;
            let is_empty = matches!(event, Event::Empty(_));
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = e.local_name();
                    let name = name.as_ref();
                    if depth == 0 {
                        if name != b"OME" {
                            return Err(OmeTiffError::Metadata(format!(
                                "root element is <{}>, expected <OME>",
                                String::from_utf8_lossy(e.name().as_ref())
                            )));
                        }
                        saw_root = true;
                    } else if depth == 1 && name == b"Image" {
                        image = Some(PartialImage {
                            id: required(e.attributes(), "ID", "Image")?,
                            name: optional(e.attributes(), "Name")?,
                            acquisition_date: None,
                            pixels: None,
                            depth,
                        });
                        if is_empty {
                            finish_image(&mut document, image.take())?;
                        }
                    } else if let Some(partial) = image.as_mut() {
                        let image_depth = partial.depth;
                        let pixels = &mut partial.pixels;
                        match name {
                            b"AcquisitionDate" if depth == image_depth + 1 => {
                                partial.acquisition_date = Some(String::new());
                                in_acquisition_date = !is_empty;
                            }
                            b"Pixels" if depth == image_depth + 1 && pixels.is_none() => {
                                *pixels = Some(parse_pixels(e)?);
                            }
                            b"Channel" if depth == image_depth + 2 => {
                                if let Some(p) = pixels.as_mut() {
                                    p.channels.push(Channel {
                                        id: required(e.attributes(), "ID", "Channel")?,
                                        name: optional(e.attributes(), "Name")?,
                                        samples_per_pixel: optional_u32(
                                            e.attributes(),
                                            "SamplesPerPixel",
                                        )?,
                                    });
                                }
                            }
                            b"TiffData" if depth == image_depth + 2 => {
                                if let Some(p) = pixels.as_mut() {
                                    p.tiff_data.push(TiffData {
                                        ifd: optional_u32(e.attributes(), "IFD")?,
                                        first_z: optional_u32(e.attributes(), "FirstZ")?,
                                        first_t: optional_u32(e.attributes(), "FirstT")?,
                                        first_c: optional_u32(e.attributes(), "FirstC")?,
                                        plane_count: optional_u32(
                                            e.attributes(),
                                            "PlaneCount",
                                        )?,
                                    });
                                }
                            }
                            _ => {}
                        }
                    }
                    if !is_empty {
                        depth += 1;
                    }
                }
                Event::Text(ref t) if in_acquisition_date => {
                    if let Some(date) = image.as_mut().and_then(|i| i.acquisition_date.as_mut()) {
                        date.push_str(&t.unescape()?);
                    }
                }
                Event::End(ref e) => {
                    depth = depth.saturating_sub(1);
                    let name = e.local_name();
                    if name.as_ref() == b"AcquisitionDate" {
                        in_acquisition_date = false;
                    }
                    let closes_image = image.as_ref().is_some_and(|i| i.depth == depth);
                    if closes_image && name.as_ref() == b"Image" {
                        finish_image(&mut document, image.take())?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth != 0 {
            return Err(OmeTiffError::Metadata(
                "document ends inside an unclosed element".to_string(),
            ));
        }
        if !saw_root {
            return Err(OmeTiffError::Metadata(
                "document has no <OME> root element".to_string(),
            ));
        }

        Ok(document)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize the document as OME-XML in the 2016-06 namespace.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write(
            &mut writer,
            Event::Start(BytesStart::new("OME").with_attributes([
                ("xmlns", OME_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", OME_SCHEMA_LOCATION),
            ])),
        )?;

        for image in &self.images {
            let mut start = BytesStart::new("Image");
            start.push_attribute(("ID", image.id.as_str()));
            if let Some(name) = &image.name {
                start.push_attribute(("Name", name.as_str()));
            }
            write(&mut writer, Event::Start(start))?;

            if let Some(date) = &image.acquisition_date {
                write(&mut writer, Event::Start(BytesStart::new("AcquisitionDate")))?;
                write(&mut writer, Event::Text(BytesText::new(date)))?;
                write(&mut writer, Event::End(BytesEnd::new("AcquisitionDate")))?;
            }

            write_pixels(&mut writer, &image.pixels)?;
            write(&mut writer, Event::End(BytesEnd::new("Image")))?;
        }

        write(&mut writer, Event::End(BytesEnd::new("OME")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| OmeTiffError::Metadata(format!("serialized XML is not UTF-8: {}", e)))
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// An `Image` whose end tag has not been seen yet.
struct PartialImage {
    id: String,
    name: Option<String>,
    acquisition_date: Option<String>,
    pixels: Option<Pixels>,
    depth: usize,
}

fn finish_image(document: &mut OmeDocument, image: Option<PartialImage>) -> Result<()> {
    let Some(image) = image else {
        return Ok(());
    };
    let pixels = image.pixels.ok_or_else(|| {
        OmeTiffError::Metadata(format!("Image {:?} has no Pixels element", image.id))
    })?;
    document.images.push(Image {
        id: image.id,
        name: image.name,
        acquisition_date: image.acquisition_date,
        pixels,
    });
    Ok(())
}

fn parse_pixels(e: &BytesStart<'_>) -> Result<Pixels> {
    let size = |key: &str| -> Result<u32> {
        optional_u32(e.attributes(), key)?
            .ok_or_else(|| OmeTiffError::Metadata(format!("Pixels is missing {}", key)))
    };

    Ok(Pixels {
        id: required(e.attributes(), "ID", "Pixels")?,
        dimension_order: required(e.attributes(), "DimensionOrder", "Pixels")?,
        pixel_type: required(e.attributes(), "Type", "Pixels")?,
        size_x: size("SizeX")?,
        size_y: size("SizeY")?,
        size_z: size("SizeZ")?,
        size_c: size("SizeC")?,
        size_t: size("SizeT")?,
        big_endian: optional(e.attributes(), "BigEndian")?.map(|v| v == "true" || v == "1"),
        channels: Vec::new(),
        tiff_data: Vec::new(),
    })
}

/// Unescaped value of the attribute whose local name is `key`.
fn optional(attributes: Attributes<'_>, key: &str) -> Result<Option<String>> {
    for attribute in attributes {
        let attribute = attribute?;
        if attribute.key.local_name().as_ref() == key.as_bytes() {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required(attributes: Attributes<'_>, key: &str, element: &str) -> Result<String> {
    optional(attributes, key)?
        .ok_or_else(|| OmeTiffError::Metadata(format!("{} is missing {}", element, key)))
}

fn optional_u32(attributes: Attributes<'_>, key: &str) -> Result<Option<u32>> {
    optional(attributes, key)?
        .map(|value| {
            value.trim().parse::<u32>().map_err(|_| {
                OmeTiffError::Metadata(format!("{}={:?} is not a non-negative integer", key, value))
            })
        })
        .transpose()
}

// =============================================================================
// Serialization helpers
// =============================================================================

fn write<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| OmeTiffError::Metadata(format!("failed to serialize OME-XML: {}", e)))
}

fn write_pixels<W: std::io::Write>(writer: &mut Writer<W>, pixels: &Pixels) -> Result<()> {
    let sizes = [
        ("SizeT", pixels.size_t),
        ("SizeZ", pixels.size_z),
        ("SizeC", pixels.size_c),
        ("SizeY", pixels.size_y),
        ("SizeX", pixels.size_x),
    ];

    let mut start = BytesStart::new("Pixels");
    start.push_attribute(("ID", pixels.id.as_str()));
    start.push_attribute(("DimensionOrder", pixels.dimension_order.as_str()));
    start.push_attribute(("Type", pixels.pixel_type.as_str()));
    for (key, value) in sizes {
        start.push_attribute((key, value.to_string().as_str()));
    }
    if let Some(big_endian) = pixels.big_endian {
        start.push_attribute(("BigEndian", if big_endian { "true" } else { "false" }));
    }

    if pixels.channels.is_empty() && pixels.tiff_data.is_empty() {
        return write(writer, Event::Empty(start));
    }
    write(writer, Event::Start(start))?;

    for channel in &pixels.channels {
        let mut element = BytesStart::new("Channel");
        element.push_attribute(("ID", channel.id.as_str()));
        if let Some(name) = &channel.name {
            element.push_attribute(("Name", name.as_str()));
        }
        if let Some(samples) = channel.samples_per_pixel {
            element.push_attribute(("SamplesPerPixel", samples.to_string().as_str()));
        }
        write(writer, Event::Empty(element))?;
    }

    for data in &pixels.tiff_data {
        let mut element = BytesStart::new("TiffData");
        let fields = [
            ("IFD", data.ifd),
            ("FirstT", data.first_t),
            ("FirstZ", data.first_z),
            ("FirstC", data.first_c),
            ("PlaneCount", data.plane_count),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                element.push_attribute((key, value.to_string().as_str()));
            }
        }
        write(writer, Event::Empty(element))?;
    }

    write(writer, Event::End(BytesEnd::new("Pixels")))
}

// =============================================================================
// Tests
// =============================================================================
