//! Test utilities for integration tests.
//!
//! This module provides a hand-rolled TIFF builder, independent of the
//! crate's own writer, plus helpers for OME-XML and coded pixel stacks.

#![allow(dead_code)]

use std::io::Write;

use ndarray::Array5;

use ome_tiff::ome::Dim;
use ome_tiff::{Compression, DimensionOrder};

// =============================================================================
// Logging
// =============================================================================

/// Install a test-writer subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Samples
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Pixel samples of one plane, row-major.
#[derive(Clone, Debug)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Samples {
    /// (BitsPerSample, SampleFormat)
    fn encoding(&self) -> (u16, u16) {
        match self {
            Samples::U8(_) => (8, 1),
            Samples::U16(_) => (16, 1),
            Samples::I16(_) => (16, 2),
            Samples::U32(_) => (32, 1),
            Samples::F32(_) => (32, 3),
            Samples::F64(_) => (64, 3),
        }
    }

    fn sample_size(&self) -> usize {
        self.encoding().0 as usize / 8
    }

    fn to_bytes(&self, order: ByteOrderType) -> Vec<u8> {
        macro_rules! encode {
            ($values:expr) => {
                $values
                    .iter()
                    .flat_map(|v| match order {
                        ByteOrderType::LittleEndian => v.to_le_bytes().to_vec(),
                        ByteOrderType::BigEndian => v.to_be_bytes().to_vec(),
                    })
                    .collect()
            };
        }
        match self {
            Samples::U8(v) => v.clone(),
            Samples::U16(v) => encode!(v),
            Samples::I16(v) => encode!(v),
            Samples::U32(v) => encode!(v),
            Samples::F32(v) => encode!(v),
            Samples::F64(v) => encode!(v),
        }
    }
}

// =============================================================================
// TIFF File Builder
// =============================================================================

/// How pages store their pixel data.
#[derive(Clone, Copy, Debug)]
pub enum Layout {
    Strips { rows_per_strip: u32 },
    Tiles { width: u32, height: u32 },
}

struct PagePlan {
    width: u32,
    height: u32,
    samples: Samples,
    description: Option<String>,
}

/// A tag value to encode in the builder's byte order.
enum Value {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Long8(Vec<u64>),
    Ascii(Vec<u8>),
}

impl Value {
    fn type_and_count(&self) -> (u16, u64) {
        match self {
            Value::Short(v) => (3, v.len() as u64),
            Value::Long(v) => (4, v.len() as u64),
            Value::Long8(v) => (16, v.len() as u64),
            Value::Ascii(v) => (2, v.len() as u64),
        }
    }
}

/// Builder for creating test TIFF files.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    is_bigtiff: bool,
    layout: Layout,
    compression: Compression,
    pages: Vec<PagePlan>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            is_bigtiff: false,
            layout: Layout::Strips { rows_per_strip: 4 },
            compression: Compression::None,
            pages: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, is_bigtiff: bool) -> Self {
        self.is_bigtiff = is_bigtiff;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Compression code to declare. Only None and the Deflate variants are
    /// actually encoded; other codes store raw data under a foreign tag value.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn add_page(mut self, width: u32, height: u32, samples: Samples) -> Self {
        self.pages.push(PagePlan {
            width,
            height,
            samples,
            description: None,
        });
        self
    }

    /// Set the ImageDescription of the first page.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        if let Some(first) = self.pages.first_mut() {
            first.description = Some(description.into());
        }
        self
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let mut data = Vec::new();

        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        if self.is_bigtiff {
            self.push_u16(&mut data, 43);
            self.push_u16(&mut data, 8);
            self.push_u16(&mut data, 0);
        } else {
            self.push_u16(&mut data, 42);
        }

        // Pointer to the first IFD, patched once it is written
        let mut next_pointer = data.len();
        self.push_offset(&mut data, 0);

        for page in &self.pages {
            let (ifd_offset, pointer) = self.write_page(&mut data, page);

            let encoded = self.encode_offset(ifd_offset);
            data[next_pointer..next_pointer + encoded.len()].copy_from_slice(&encoded);
            next_pointer = pointer;
        }

        data
    }

    /// Write one page's data, values and IFD.
    ///
    /// Returns the IFD offset and the position of its next-IFD pointer.
    fn write_page(&self, data: &mut Vec<u8>, page: &PagePlan) -> (u64, usize) {
        let (bits, format) = page.samples.encoding();
        let sample_size = page.samples.sample_size();
        let plane = page.samples.to_bytes(self.byte_order);
        let row_bytes = page.width as usize * sample_size;

        // Chunks in TIFF order
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        match self.layout {
            Layout::Strips { rows_per_strip } => {
                for strip in plane.chunks(rows_per_strip as usize * row_bytes) {
                    chunks.push(strip.to_vec());
                }
            }
            Layout::Tiles { width, height } => {
                let tile_row_bytes = width as usize * sample_size;
                for ty in 0..page.height.div_ceil(height) {
                    for tx in 0..page.width.div_ceil(width) {
                        // Edge tiles are padded to the full tile size
                        let mut tile = vec![0u8; tile_row_bytes * height as usize];
                        for row in 0..height {
                            let y = ty * height + row;
                            if y >= page.height {
                                break;
                            }
                            let x0 = (tx * width) as usize;
                            let columns = (width as usize).min(page.width as usize - x0);
                            let src = y as usize * row_bytes + x0 * sample_size;
                            let dst = row as usize * tile_row_bytes;
                            tile[dst..dst + columns * sample_size]
                                .copy_from_slice(&plane[src..src + columns * sample_size]);
                        }
                        chunks.push(tile);
                    }
                }
            }
        }

        let mut offsets = Vec::with_capacity(chunks.len());
        let mut counts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let encoded = self.compress(&chunk);
            align(data);
            offsets.push(data.len() as u64);
            counts.push(encoded.len() as u64);
            data.extend_from_slice(&encoded);
        }

        let mut entries: Vec<(u16, Value)> = vec![
            (256, Value::Long(vec![page.width])),
            (257, Value::Long(vec![page.height])),
            (258, Value::Short(vec![bits])),
            (259, Value::Short(vec![self.compression.as_u16()])),
            (262, Value::Short(vec![1])),
            (277, Value::Short(vec![1])),
            (284, Value::Short(vec![1])),
            (339, Value::Short(vec![format])),
        ];
        let (offsets_tag, counts_tag) = match self.layout {
            Layout::Strips { rows_per_strip } => {
                entries.push((278, Value::Long(vec![rows_per_strip])));
                (273, 279)
            }
            Layout::Tiles { width, height } => {
                entries.push((322, Value::Long(vec![width])));
                entries.push((323, Value::Long(vec![height])));
                (324, 325)
            }
        };
        entries.push((offsets_tag, self.offset_array(offsets)));
        entries.push((counts_tag, self.offset_array(counts)));
        if let Some(description) = &page.description {
            let mut bytes = description.as_bytes().to_vec();
            bytes.push(0);
            entries.push((270, Value::Ascii(bytes)));
        }
        entries.sort_by_key(|(tag, _)| *tag);

        // Out-of-line values
        let inline_size = if self.is_bigtiff { 8 } else { 4 };
        let mut fields = Vec::with_capacity(entries.len());
        for (tag, value) in &entries {
            let bytes = self.encode_value(value);
            let field = if bytes.len() <= inline_size {
                let mut inline = bytes;
                inline.resize(inline_size, 0);
                inline
            } else {
                align(data);
                let offset = data.len() as u64;
                data.extend_from_slice(&bytes);
                self.encode_offset(offset)
            };
            fields.push((*tag, value.type_and_count(), field));
        }

        align(data);
        let ifd_offset = data.len() as u64;
        if self.is_bigtiff {
            self.push_u64(data, fields.len() as u64);
        } else {
            self.push_u16(data, fields.len() as u16);
        }
        for (tag, (field_type, count), field) in fields {
            self.push_u16(data, tag);
            self.push_u16(data, field_type);
            if self.is_bigtiff {
                self.push_u64(data, count);
            } else {
                self.push_u32(data, count as u32);
            }
            data.extend_from_slice(&field);
        }
        let pointer = data.len();
        self.push_offset(data, 0);

        (ifd_offset, pointer)
    }

    fn compress(&self, chunk: &[u8]) -> Vec<u8> {
        match self.compression {
            Compression::Deflate | Compression::AdobeDeflate => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
                encoder.write_all(chunk).unwrap();
                encoder.finish().unwrap()
            }
            Compression::Lzw => {
                weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                    .encode(chunk)
                    .unwrap()
            }
            _ => chunk.to_vec(),
        }
    }

    fn offset_array(&self, values: Vec<u64>) -> Value {
        if self.is_bigtiff {
            Value::Long8(values)
        } else {
            Value::Long(values.into_iter().map(|v| v as u32).collect())
        }
    }

    fn encode_value(&self, value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        match value {
            Value::Short(v) => v.iter().for_each(|x| self.push_u16(&mut out, *x)),
            Value::Long(v) => v.iter().for_each(|x| self.push_u32(&mut out, *x)),
            Value::Long8(v) => v.iter().for_each(|x| self.push_u64(&mut out, *x)),
            Value::Ascii(v) => out.extend_from_slice(v),
        }
        out
    }

    fn encode_offset(&self, offset: u64) -> Vec<u8> {
        let mut out = Vec::new();
        self.push_offset(&mut out, offset);
        out
    }

    fn push_offset(&self, data: &mut Vec<u8>, offset: u64) {
        if self.is_bigtiff {
            self.push_u64(data, offset);
        } else {
            self.push_u32(data, offset as u32);
        }
    }

    fn push_u16(&self, data: &mut Vec<u8>, value: u16) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend(&value.to_be_bytes()),
        }
    }

    fn push_u32(&self, data: &mut Vec<u8>, value: u32) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend(&value.to_be_bytes()),
        }
    }

    fn push_u64(&self, data: &mut Vec<u8>, value: u64) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend(&value.to_be_bytes()),
        }
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn align(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

// =============================================================================
// OME-XML
// =============================================================================

/// One `Image` element; `sizes` is `[X, Y, Z, C, T]`.
pub fn ome_image(index: usize, order: &str, pixel_type: &str, sizes: [usize; 5]) -> String {
    let [x, y, z, c, t] = sizes;
    let channels: String = (0..c)
        .map(|i| format!(r#"<Channel ID="Channel:{index}:{i}" SamplesPerPixel="1"/>"#))
        .collect();
    format!(
        r#"<Image ID="Image:{index}" Name="series {index}"><Pixels ID="Pixels:{index}" DimensionOrder="{order}" Type="{pixel_type}" SizeX="{x}" SizeY="{y}" SizeZ="{z}" SizeC="{c}" SizeT="{t}">{channels}</Pixels></Image>"#
    )
}

/// An OME document holding the given `Image` elements.
pub fn ome_document(images: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">{}</OME>"#,
        images.concat()
    )
}

// =============================================================================
// Coded stacks
// =============================================================================

/// Pixel value encoding its own canonical position.
///
/// Planes are numbered in canonical (t, z, c) order; Y and X must be below 16
/// and the stack must hold fewer than 256 planes.
pub fn code(plane: usize, y: usize, x: usize) -> u16 {
    (plane * 256 + y * 16 + x) as u16
}

/// The canonical array a coded file of these sizes decodes to.
pub fn coded_canonical(size_t: usize, size_z: usize, size_c: usize, y: usize, x: usize) -> Array5<u16> {
    Array5::from_shape_fn((size_t, size_z, size_c, y, x), |(t, z, c, y, x)| {
        code((t * size_z + z) * size_c + c, y, x)
    })
}

/// (t, z, c) of each page in storage order for `order`.
pub fn storage_order(
    order: DimensionOrder,
    size_c: usize,
    size_z: usize,
    size_t: usize,
) -> Vec<(usize, usize, usize)> {
    let size_of = |dim: Dim| match dim {
        Dim::C => size_c,
        Dim::Z => size_z,
        Dim::T => size_t,
    };
    let [outer, middle, inner] = order.outer_to_inner();

    let mut planes = Vec::new();
    for a in 0..size_of(outer) {
        for b in 0..size_of(middle) {
            for i in 0..size_of(inner) {
                let (mut t, mut z, mut c) = (0, 0, 0);
                for (dim, index) in [(outer, a), (middle, b), (inner, i)] {
                    match dim {
                        Dim::C => c = index,
                        Dim::Z => z = index,
                        Dim::T => t = index,
                    }
                }
                planes.push((t, z, c));
            }
        }
    }
    planes
}

/// Add the pages of a coded u16 stack to `builder` in storage order.
pub fn add_coded_pages(
    mut builder: TiffBuilder,
    order: DimensionOrder,
    sizes: [usize; 5],
) -> TiffBuilder {
    let [x, y, z, c, t] = sizes;
    for (pt, pz, pc) in storage_order(order, c, z, t) {
        let plane = (pt * z + pz) * c + pc;
        let samples = (0..y)
            .flat_map(|row| (0..x).map(move |col| code(plane, row, col)))
            .collect();
        builder = builder.add_page(x as u32, y as u32, Samples::U16(samples));
    }
    builder
}

/// A complete single-series coded OME-TIFF.
pub fn coded_ome_tiff(builder: TiffBuilder, order: DimensionOrder, sizes: [usize; 5]) -> Vec<u8> {
    let xml = ome_document(&[ome_image(0, order.as_str(), "uint16", sizes)]);
    add_coded_pages(builder, order, sizes)
        .with_description(xml)
        .build()
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Check if data starts with TIFF magic bytes.
pub fn is_tiff_magic(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    (data[0] == b'I' && data[1] == b'I' && data[2] == 42 && data[3] == 0)
        || (data[0] == b'M' && data[1] == b'M' && data[2] == 0 && data[3] == 42)
}

/// Check if data starts with BigTIFF magic bytes.
pub fn is_bigtiff_magic(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }

    if data[0] == b'I' && data[1] == b'I' {
        u16::from_le_bytes([data[2], data[3]]) == 43
    } else if data[0] == b'M' && data[1] == b'M' {
        u16::from_be_bytes([data[2], data[3]]) == 43
    } else {
        false
    }
}
