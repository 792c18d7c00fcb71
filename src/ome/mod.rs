//! OME metadata: the vocabulary, the XML model, synthesis and editing.
//!
//! - [`model`] parses and serializes the parts of OME-XML that describe pixels
//! - [`synthesize`] builds a descriptor for a canonical array
//! - [`editor`] applies [`MetadataOverrides`](crate::MetadataOverrides) to an
//!   existing document while preserving everything else

mod dimension_order;
pub mod editor;
pub mod model;
mod pixel_type;
pub mod synthesize;

pub use dimension_order::{Dim, DimensionOrder};
pub use editor::update_metadata;
pub use model::{Channel, Image, OmeDocument, Pixels, TiffData, OME_NAMESPACE};
pub use pixel_type::PixelType;
pub use synthesize::{synthesize_document, synthesize_metadata};
