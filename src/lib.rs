//! # ome-tiff
//!
//! Reading and writing of OME-TIFF files: TIFF containers whose first page
//! carries an OME-XML document describing the pixel data.
//!
//! Every array handed to or returned from this crate is canonical: five axes
//! in (T, Z, C, Y, X) order, whatever `DimensionOrder` the file stores its
//! planes in.
//!
//! ## Features
//!
//! - **All six dimension orders**: pages are normalized with an explicit
//!   recipe per order, including files that elide axes of extent 1
//! - **Multi-series files**: every OME `Image` is read with its own descriptor
//! - **Classic TIFF and BigTIFF**: either byte order, strips or tiles, no
//!   compression, LZW or Deflate
//! - **Metadata editing**: targeted OME-XML edits that leave every other byte
//!   of the document alone
//!
//! ## Architecture
//!
//! - [`io`] - Range reads over files and in-memory buffers
//! - [`mod@format`] - TIFF container parsing, writing and compression
//! - [`ome`] - OME-XML model, synthesis and editing
//! - [`mod@normalize`] - Storage order to canonical order
//! - [`reader`] / [`writer`] - The file-level API
//! - [`processing`] - Slice-wise transforms over canonical arrays
//! - [`config`] - Write options and metadata overrides
//!
//! ## Example
//!
//! ```rust,no_run
//! use ndarray::Array5;
//! use ome_tiff::{read_ometiff, write_ometiff, OmeArray, WriteOptions};
//!
//! fn main() -> ome_tiff::Result<()> {
//!     let array: OmeArray = Array5::<u16>::zeros((1, 4, 2, 256, 256)).into();
//!     write_ometiff("stack.ome.tif", &array, None, &WriteOptions::default())?;
//!
//!     let (read, xml) = read_ometiff("stack.ome.tif")?;
//!     assert_eq!(read, array);
//!     assert!(xml.contains("XYCZT"));
//!     Ok(())
//! }
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod normalize;
pub mod ome;
pub mod processing;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use array::{OmeArray, Pixel};
pub use config::{BigTiffMode, MetadataOverrides, WriteOptions};
pub use error::{IoError, OmeTiffError, Result, TiffError};
pub use format::tiff::Compression;
pub use format::{detect_format, FileFormat};
pub use io::{BytesRangeReader, FileRangeReader, RangeReader};
pub use normalize::normalize;
pub use ome::{
    synthesize_metadata, update_metadata, DimensionOrder, OmeDocument, PixelType,
};
pub use processing::{
    apply_2d_transform, apply_3d_transform_channels, apply_3d_transform_zstack,
};
pub use reader::{read_ometiff, OmeTiffFile};
pub use writer::{write_ometiff, write_ometiff_to};
