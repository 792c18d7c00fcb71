//! In-place editing of OME-XML documents.
//!
//! Overrides are applied to the first `Image`, its `Pixels` and the first
//! `Channel` of those `Pixels`. The document is streamed once with quick-xml
//! and copied through byte for byte; only the start tags that receive a new
//! attribute value are re-serialized, and the text of `AcquisitionDate` is
//! replaced or a new `AcquisitionDate` element is inserted.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::config::MetadataOverrides;
use crate::error::{OmeTiffError, Result};

use super::model::OmeDocument;

/// Attribute overrides for one element, keyed by local attribute name.
type AttributeEdits = Vec<(&'static str, String)>;

/// Apply `overrides` to an OME-XML document.
///
/// Every byte outside the edited tags is preserved: other attributes,
/// whitespace, comments and the other images.
///
/// # Errors
/// - `Shape` if an overridden size is zero
/// - `Metadata` if the XML is malformed, has no Image/Pixels, or a Channel
///   attribute is overridden but the first image has no Channel
pub fn update_metadata(xml: &str, overrides: &MetadataOverrides) -> Result<String> {
    overrides.validate()?;

    let document = OmeDocument::parse(xml)?;
    let image = document
        .images
        .first()
        .ok_or_else(|| OmeTiffError::Metadata("document has no Image element".to_string()))?;
    if overrides.touches_channel() && image.pixels.channels.is_empty() {
        return Err(OmeTiffError::Metadata(format!(
            "Image {:?} has no Channel to update",
            image.id
        )));
    }
    if overrides.is_empty() {
        return Ok(xml.to_string());
    }

    let image_edits = image_edits(overrides);
    let pixels_edits = pixels_edits(overrides);
    let channel_edits = channel_edits(overrides);
    let date = overrides.acquisition_date.as_deref();
    let insert_date = date.is_some() && image.acquisition_date.is_none();

    let mut out = Splicer::new(xml);
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;

    // Depth of the first Image while inside it
    let mut image_depth: Option<usize> = None;
    let mut image_done = false;
    let mut pixels_seen = false;
    let mut channel_seen = false;
    let mut replacing_date = false;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let local = e.local_name();
                let local = local.as_ref();

                match image_depth {
                    None if depth == 1 && local == b"Image" && !image_done => {
                        image_depth = Some(depth);
                        if !image_edits.is_empty() {
                            out.replace(start, end, &rebuild_tag(e, &image_edits, is_empty)?);
                        }
                        if let (true, Some(value)) = (insert_date, date) {
                            let name = format!("{}AcquisitionDate", prefix_of(e));
                            out.replace(
                                end,
                                end,
                                &format!("<{name}>{}</{name}>", escape(value)),
                            );
                        }
                    }
                    Some(image_level) => match local {
                        b"AcquisitionDate" if depth == image_level + 1 => {
                            if let Some(value) = date {
                                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                                if is_empty {
                                    out.replace(
                                        start,
                                        end,
                                        &format!("<{name}>{}</{name}>", escape(value)),
                                    );
                                } else {
                                    out.replace(end, end, &escape(value));
                                    replacing_date = true;
                                }
                            }
                        }
                        b"Pixels" if depth == image_level + 1 && !pixels_seen => {
                            pixels_seen = true;
                            if !pixels_edits.is_empty() {
                                out.replace(start, end, &rebuild_tag(e, &pixels_edits, is_empty)?);
                            }
                        }
                        b"Channel" if depth == image_level + 2 && pixels_seen && !channel_seen => {
                            channel_seen = true;
                            if !channel_edits.is_empty() {
                                out.replace(
                                    start,
                                    end,
                                    &rebuild_tag(e, &channel_edits, is_empty)?,
                                );
                            }
                        }
                        _ => {}
                    },
                    None => {}
                }

                if !is_empty {
                    depth += 1;
                }
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                if replacing_date && e.local_name().as_ref() == b"AcquisitionDate" {
                    // Drop the old text between the start and end tags
                    out.skip_to(start);
                    replacing_date = false;
                }
                if image_depth == Some(depth) && e.local_name().as_ref() == b"Image" {
                    image_depth = None;
                    image_done = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(
        image = %image.id,
        edited_bytes = out.replaced_bytes,
        "updated OME-XML"
    );

    Ok(out.finish())
}

fn image_edits(overrides: &MetadataOverrides) -> AttributeEdits {
    let mut edits = Vec::new();
    if let Some(id) = &overrides.image_id {
        edits.push(("ID", id.clone()));
    }
    if let Some(name) = &overrides.image_name {
        edits.push(("Name", name.clone()));
    }
    edits
}

fn pixels_edits(overrides: &MetadataOverrides) -> AttributeEdits {
    let mut edits = Vec::new();
    if let Some(order) = overrides.dimension_order {
        edits.push(("DimensionOrder", order.as_str().to_string()));
    }
    if let Some(pixel_type) = overrides.pixel_type {
        edits.push(("Type", pixel_type.as_str().to_string()));
    }
    let sizes = [
        ("SizeT", overrides.size_t),
        ("SizeZ", overrides.size_z),
        ("SizeC", overrides.size_c),
        ("SizeX", overrides.size_x),
        ("SizeY", overrides.size_y),
    ];
    for (key, value) in sizes {
        if let Some(value) = value {
            edits.push((key, value.to_string()));
        }
    }
    edits
}

fn channel_edits(overrides: &MetadataOverrides) -> AttributeEdits {
    let mut edits = Vec::new();
    if let Some(id) = &overrides.channel_id {
        edits.push(("ID", id.clone()));
    }
    if let Some(name) = &overrides.channel_name {
        edits.push(("Name", name.clone()));
    }
    if let Some(samples) = overrides.channel_samples_per_pixel {
        edits.push(("SamplesPerPixel", samples.to_string()));
    }
    edits
}

/// Namespace prefix of an element name, including the colon.
fn prefix_of(e: &BytesStart<'_>) -> String {
    let name = e.name();
    match name.prefix() {
        Some(prefix) => format!("{}:", String::from_utf8_lossy(prefix.as_ref())),
        None => String::new(),
    }
}

/// Re-serialize a start tag with some attribute values replaced.
///
/// Attributes keep their order and raw (escaped) values; overridden ones get
/// the new escaped value, and overrides for absent attributes are appended.
fn rebuild_tag(e: &BytesStart<'_>, edits: &[(&'static str, String)], empty: bool) -> Result<String> {
    let mut tag = String::from("<");
    tag.push_str(&String::from_utf8_lossy(e.name().as_ref()));

    let mut applied = vec![false; edits.len()];
    for attribute in e.attributes() {
        let attribute = attribute?;
        tag.push(' ');
        tag.push_str(&String::from_utf8_lossy(attribute.key.as_ref()));
        tag.push_str("=\"");

        let local = attribute.key.local_name();
        match edits.iter().position(|(key, _)| key.as_bytes() == local.as_ref()) {
            Some(i) => {
                applied[i] = true;
                tag.push_str(&escape(edits[i].1.as_str()));
            }
            None => {
                let raw = String::from_utf8_lossy(&attribute.value);
                tag.push_str(&raw.replace('"', "&quot;"));
            }
        }
        tag.push('"');
    }

    for ((key, value), done) in edits.iter().zip(applied) {
        if !done {
            tag.push_str(&format!(" {}=\"{}\"", key, escape(value.as_str())));
        }
    }

    tag.push_str(if empty { "/>" } else { ">" });
    Ok(tag)
}

/// Copies the source document through, replacing selected byte ranges.
struct Splicer<'a> {
    source: &'a str,
    out: String,
    copied: usize,
    replaced_bytes: usize,
}

impl<'a> Splicer<'a> {
    fn new(source: &'a str) -> Self {
        Splicer {
            source,
            out: String::with_capacity(source.len() + 128),
            copied: 0,
            replaced_bytes: 0,
        }
    }

    /// Emit everything up to `start`, then `replacement` instead of `start..end`.
    fn replace(&mut self, start: usize, end: usize, replacement: &str) {
        self.out.push_str(&self.source[self.copied..start]);
        self.out.push_str(replacement);
        self.copied = end;
        self.replaced_bytes += end - start;
    }

    /// Drop the source bytes between the last copy point and `position`.
    fn skip_to(&mut self, position: usize) {
        self.replaced_bytes += position - self.copied;
        self.copied = position;
    }

    fn finish(mut self) -> String {
        self.out.push_str(&self.source[self.copied..]);
        self.out
    }
}

// =============================================================================
// Tests
// =============================================================================
