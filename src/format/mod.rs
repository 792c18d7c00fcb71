//! File format layer: the TIFF container, strip compression and detection.
//!
//! # Format Detection
//!
//! Use [`detect::detect_format`] to tell an OME-TIFF from a plain TIFF
//! without parsing the whole IFD chain.

pub mod compression;
pub mod detect;
pub mod tiff;

pub use detect::{contains_ome_marker, detect_format, is_tiff_header, FileFormat};
