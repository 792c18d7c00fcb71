use thiserror::Error;

/// I/O errors that can occur when reading or writing a file
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Reading from the underlying file failed
    #[error("Read error on {path}: {message}")]
    Read { path: String, message: String },

    /// Creating or writing the output file failed
    #[error("Write error on {path}: {message}")]
    Write { path: String, message: String },
}

/// Errors that can occur when parsing, decoding or encoding TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or back into the chain)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// Unsupported predictor (only 1 = none is handled)
    #[error("Unsupported predictor: {0}")]
    UnsupportedPredictor(u16),

    /// Sample layout this crate cannot decode (RGB, bit depth, sample format)
    #[error("Unsupported sample layout: {0}")]
    UnsupportedSampleLayout(String),

    /// Strip or tile data could not be decompressed
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Strip data could not be compressed
    #[error("Compression failed: {0}")]
    Compression(String),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// Classic TIFF offsets are 32-bit
    #[error("Offset {0} does not fit in a classic TIFF; write a BigTIFF instead")]
    OffsetOverflow(u64),
}

/// Top-level error for every OME-TIFF operation
#[derive(Debug, Clone, Error)]
pub enum OmeTiffError {
    /// File missing, unreadable or unwritable
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF container is malformed or uses an encoding that is not supported
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Embedded OME-XML is absent, unparsable or inconsistent with the file
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Array rank or extents do not fit the operation
    #[error("Shape error: {0}")]
    Shape(String),

    /// DimensionOrder outside the six recognized permutations
    #[error("Unsupported dimension order: {0:?}")]
    UnsupportedDimensionOrder(String),

    /// Write options that cannot be honoured
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl From<quick_xml::Error> for OmeTiffError {
    fn from(error: quick_xml::Error) -> Self {
        OmeTiffError::Metadata(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for OmeTiffError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        OmeTiffError::Metadata(error.to_string())
    }
}

/// Convenience alias used throughout the crate
pub type Result<T, E = OmeTiffError> = std::result::Result<T, E>;
