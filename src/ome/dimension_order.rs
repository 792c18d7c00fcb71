//! The six OME `DimensionOrder` values.
//!
//! X and Y are always the two fastest-varying axes; the remaining three
//! letters give the order in which C, Z and T vary from fastest to slowest.
//! `XYCZT` therefore stores planes with C varying fastest and T slowest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OmeTiffError;

/// A non-spatial dimension of an OME image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    /// Channel
    C,
    /// Focal plane
    Z,
    /// Time point
    T,
}

/// Declared storage order of the planes of an OME image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionOrder {
    XYCZT,
    XYZCT,
    XYCTZ,
    XYZTC,
    XYTZC,
    XYTCZ,
}

impl DimensionOrder {
    /// Every recognized order.
    pub const ALL: [DimensionOrder; 6] = [
        DimensionOrder::XYCZT,
        DimensionOrder::XYZCT,
        DimensionOrder::XYCTZ,
        DimensionOrder::XYZTC,
        DimensionOrder::XYTZC,
        DimensionOrder::XYTCZ,
    ];

    /// The OME-XML attribute value.
    pub const fn as_str(self) -> &'static str {
        match self {
            DimensionOrder::XYCZT => "XYCZT",
            DimensionOrder::XYZCT => "XYZCT",
            DimensionOrder::XYCTZ => "XYCTZ",
            DimensionOrder::XYZTC => "XYZTC",
            DimensionOrder::XYTZC => "XYTZC",
            DimensionOrder::XYTCZ => "XYTCZ",
        }
    }

    /// Non-spatial dimensions from slowest to fastest varying.
    ///
    /// This is the axis order of a raw page stack, before the (Y, X) axes.
    pub const fn outer_to_inner(self) -> [Dim; 3] {
        match self {
            DimensionOrder::XYCZT => [Dim::T, Dim::Z, Dim::C],
            DimensionOrder::XYZCT => [Dim::T, Dim::C, Dim::Z],
            DimensionOrder::XYCTZ => [Dim::Z, Dim::T, Dim::C],
            DimensionOrder::XYZTC => [Dim::C, Dim::T, Dim::Z],
            DimensionOrder::XYTZC => [Dim::C, Dim::Z, Dim::T],
            DimensionOrder::XYTCZ => [Dim::Z, Dim::C, Dim::T],
        }
    }
}

impl fmt::Display for DimensionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionOrder {
    type Err = OmeTiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "XYCZT" => Ok(DimensionOrder::XYCZT),
            "XYZCT" => Ok(DimensionOrder::XYZCT),
            "XYCTZ" => Ok(DimensionOrder::XYCTZ),
            "XYZTC" => Ok(DimensionOrder::XYZTC),
            "XYTZC" => Ok(DimensionOrder::XYTZC),
            "XYTCZ" => Ok(DimensionOrder::XYTCZ),
            other => Err(OmeTiffError::UnsupportedDimensionOrder(other.to_string())),
        }
    }
}
