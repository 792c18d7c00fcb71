//! OME `PixelType` vocabulary and its TIFF sample encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OmeTiffError;
use crate::format::tiff::SampleFormat;

/// Element kind of a pixel array, named as in the OME `Pixels/@Type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Float,
    Double,
}

impl PixelType {
    /// Every supported pixel type.
    pub const ALL: [PixelType; 8] = [
        PixelType::Int8,
        PixelType::Int16,
        PixelType::Int32,
        PixelType::Uint8,
        PixelType::Uint16,
        PixelType::Uint32,
        PixelType::Float,
        PixelType::Double,
    ];

    /// The OME-XML attribute value.
    pub const fn as_str(self) -> &'static str {
        match self {
            PixelType::Int8 => "int8",
            PixelType::Int16 => "int16",
            PixelType::Int32 => "int32",
            PixelType::Uint8 => "uint8",
            PixelType::Uint16 => "uint16",
            PixelType::Uint32 => "uint32",
            PixelType::Float => "float",
            PixelType::Double => "double",
        }
    }

    /// Size of one sample in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            PixelType::Int8 | PixelType::Uint8 => 1,
            PixelType::Int16 | PixelType::Uint16 => 2,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float => 4,
            PixelType::Double => 8,
        }
    }

    /// Value of the TIFF BitsPerSample tag.
    pub const fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    /// Value of the TIFF SampleFormat tag.
    pub const fn sample_format(self) -> SampleFormat {
        match self {
            PixelType::Int8 | PixelType::Int16 | PixelType::Int32 => SampleFormat::Int,
            PixelType::Uint8 | PixelType::Uint16 | PixelType::Uint32 => SampleFormat::Uint,
            PixelType::Float | PixelType::Double => SampleFormat::Float,
        }
    }

    /// Map a TIFF sample encoding to a pixel type.
    ///
    /// Returns `None` for combinations without an OME equivalent
    /// (e.g. 64-bit integers or 16-bit floats).
    pub fn from_tiff(bits_per_sample: u16, sample_format: SampleFormat) -> Option<Self> {
        match (sample_format, bits_per_sample) {
            (SampleFormat::Uint, 8) => Some(PixelType::Uint8),
            (SampleFormat::Uint, 16) => Some(PixelType::Uint16),
            (SampleFormat::Uint, 32) => Some(PixelType::Uint32),
            (SampleFormat::Int, 8) => Some(PixelType::Int8),
            (SampleFormat::Int, 16) => Some(PixelType::Int16),
            (SampleFormat::Int, 32) => Some(PixelType::Int32),
            (SampleFormat::Float, 32) => Some(PixelType::Float),
            (SampleFormat::Float, 64) => Some(PixelType::Double),
            _ => None,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelType {
    type Err = OmeTiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| OmeTiffError::Metadata(format!("unknown pixel type {:?}", s)))
    }
}
