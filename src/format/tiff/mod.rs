//! TIFF container for OME-TIFF files.
//!
//! This module handles parsing and writing of TIFF and BigTIFF files, the
//! container OME-TIFF stores its planes and metadata in.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. The parser handles both transparently.
//!
//! - **IFD (Image File Directory)**: Contains metadata and pointers to image data.
//!   OME-TIFF stores one two-dimensional plane per IFD ("page").
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod container;
mod page;
mod parser;
mod tags;
mod validation;
mod values;
mod writer;

pub use container::TiffContainer;
pub use page::{TiffPage, TileGeometry};
pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use tags::{
    Compression, FieldType, SampleFormat, TiffTag, PHOTOMETRIC_MIN_IS_BLACK,
    PLANAR_CONFIG_CHUNKY, PREDICTOR_NONE,
};
pub use validation::{validate_page, ValidationError, ValidationResult};
pub use values::ValueReader;
pub use writer::{PageData, TiffWriter};
