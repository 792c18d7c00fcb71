//! Dynamically typed pixel arrays.
//!
//! [`OmeArray`] holds an `ndarray::ArrayD` of one of the eight OME pixel
//! types. Arrays handed to or returned from the public API are canonical:
//! five axes in (T, Z, C, Y, X) order.
//!
//! The [`Pixel`] trait ties each Rust element type to its [`PixelType`] and
//! its TIFF byte encoding, so generic code can be written once and
//! dispatched over the variants.

use ndarray::{Array, Array5, ArrayD, ArrayViewD, Dimension, IxDyn};

use crate::error::{OmeTiffError, Result};
use crate::format::tiff::ByteOrder;
use crate::normalize::normalize;
use crate::ome::{DimensionOrder, PixelType};

// =============================================================================
// Pixel
// =============================================================================

/// An element type that can be stored in an OME-TIFF plane.
pub trait Pixel: Copy + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// The OME name of this element type.
    const PIXEL_TYPE: PixelType;

    /// Decode one sample from `bytes` (at least `size_of::<Self>()` long).
    fn from_bytes(bytes: &[u8], byte_order: ByteOrder) -> Self;

    /// Append the little-endian encoding of this sample.
    fn extend_le_bytes(self, out: &mut Vec<u8>);

    /// Wrap a typed array.
    fn wrap(array: ArrayD<Self>) -> OmeArray;

    /// Borrow the typed array, if `array` holds this element type.
    fn view(array: &OmeArray) -> Option<ArrayViewD<'_, Self>>;

    /// Take the typed array, if `array` holds this element type.
    fn take(array: OmeArray) -> Option<ArrayD<Self>>;
}

macro_rules! impl_pixel {
    ($t:ty, $variant:ident) => {
        impl Pixel for $t {
            const PIXEL_TYPE: PixelType = PixelType::$variant;

            #[inline]
            fn from_bytes(bytes: &[u8], byte_order: ByteOrder) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                match byte_order {
                    ByteOrder::LittleEndian => <$t>::from_le_bytes(buf),
                    ByteOrder::BigEndian => <$t>::from_be_bytes(buf),
                }
            }

            #[inline]
            fn extend_le_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn wrap(array: ArrayD<Self>) -> OmeArray {
                OmeArray::$variant(array)
            }

            fn view(array: &OmeArray) -> Option<ArrayViewD<'_, Self>> {
                match array {
                    OmeArray::$variant(a) => Some(a.view()),
                    _ => None,
                }
            }

            fn take(array: OmeArray) -> Option<ArrayD<Self>> {
                match array {
                    OmeArray::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

impl_pixel!(u8, Uint8);
impl_pixel!(u16, Uint16);
impl_pixel!(u32, Uint32);
impl_pixel!(i8, Int8);
impl_pixel!(i16, Int16);
impl_pixel!(i32, Int32);
impl_pixel!(f32, Float);
impl_pixel!(f64, Double);

// =============================================================================
// OmeArray
// =============================================================================

/// A dense pixel array of any OME element type.
#[derive(Debug, Clone, PartialEq)]
pub enum OmeArray {
    Uint8(ArrayD<u8>),
    Uint16(ArrayD<u16>),
    Uint32(ArrayD<u32>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
}

/// Run `$body` with `$a` bound to the typed array inside `$array`.
macro_rules! with_array {
    ($array:expr, $a:ident => $body:expr) => {
        match $array {
            OmeArray::Uint8($a) => $body,
            OmeArray::Uint16($a) => $body,
            OmeArray::Uint32($a) => $body,
            OmeArray::Int8($a) => $body,
            OmeArray::Int16($a) => $body,
            OmeArray::Int32($a) => $body,
            OmeArray::Float($a) => $body,
            OmeArray::Double($a) => $body,
        }
    };
}
pub(crate) use with_array;

impl OmeArray {
    /// Element type of the array.
    pub fn pixel_type(&self) -> PixelType {
        match self {
            OmeArray::Uint8(_) => PixelType::Uint8,
            OmeArray::Uint16(_) => PixelType::Uint16,
            OmeArray::Uint32(_) => PixelType::Uint32,
            OmeArray::Int8(_) => PixelType::Int8,
            OmeArray::Int16(_) => PixelType::Int16,
            OmeArray::Int32(_) => PixelType::Int32,
            OmeArray::Float(_) => PixelType::Float,
            OmeArray::Double(_) => PixelType::Double,
        }
    }

    /// Extent of every axis.
    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the typed array.
    pub fn as_array<T: Pixel>(&self) -> Option<ArrayViewD<'_, T>> {
        T::view(self)
    }

    /// Take the typed array.
    pub fn into_array<T: Pixel>(self) -> Option<ArrayD<T>> {
        T::take(self)
    }

    /// Take the array as a typed canonical 5-D array.
    pub fn into_array5<T: Pixel>(self) -> Option<Array5<T>> {
        T::take(self).and_then(|a| a.into_dimensionality().ok())
    }

    /// Build an array from samples stored contiguously in row-major order.
    ///
    /// # Errors
    /// `Shape` if `bytes` does not hold exactly `shape.product()` samples.
    pub fn from_raw_bytes(
        pixel_type: PixelType,
        shape: &[usize],
        bytes: &[u8],
        byte_order: ByteOrder,
    ) -> Result<Self> {
        match pixel_type {
            PixelType::Uint8 => decode::<u8>(shape, bytes, byte_order),
            PixelType::Uint16 => decode::<u16>(shape, bytes, byte_order),
            PixelType::Uint32 => decode::<u32>(shape, bytes, byte_order),
            PixelType::Int8 => decode::<i8>(shape, bytes, byte_order),
            PixelType::Int16 => decode::<i16>(shape, bytes, byte_order),
            PixelType::Int32 => decode::<i32>(shape, bytes, byte_order),
            PixelType::Float => decode::<f32>(shape, bytes, byte_order),
            PixelType::Double => decode::<f64>(shape, bytes, byte_order),
        }
    }

    /// Reorder a raw page stack into canonical (T, Z, C, Y, X) order.
    ///
    /// See [`normalize`](crate::normalize::normalize).
    pub fn normalize(
        self,
        size_c: usize,
        size_z: usize,
        size_t: usize,
        order: DimensionOrder,
    ) -> Result<Self> {
        with_array!(self, a => normalize(a, size_c, size_z, size_t, order).map(OmeArray::from))
    }

    /// The canonical 5-D shape, or a `Shape` error for any other rank.
    pub fn canonical_shape(&self) -> Result<[usize; 5]> {
        let shape = self.shape();
        <[usize; 5]>::try_from(shape).map_err(|_| {
            OmeTiffError::Shape(format!(
                "expected a 5-D (T, Z, C, Y, X) array, got shape {:?}",
                shape
            ))
        })
    }

    /// Little-endian bytes of the (Y, X) plane at (t, z, c).
    ///
    /// The array must be canonical and the index in bounds.
    pub fn plane_le_bytes(&self, t: usize, z: usize, c: usize) -> Vec<u8> {
        with_array!(self, a => plane_bytes(a, t, z, c))
    }
}

fn decode<T: Pixel>(shape: &[usize], bytes: &[u8], byte_order: ByteOrder) -> Result<OmeArray> {
    let size = std::mem::size_of::<T>();
    let count: usize = shape.iter().product();
    if bytes.len() != count * size {
        return Err(OmeTiffError::Shape(format!(
            "{} bytes of {} data cannot fill shape {:?}",
            bytes.len(),
            T::PIXEL_TYPE,
            shape
        )));
    }

    let samples: Vec<T> = bytes
        .chunks_exact(size)
        .map(|chunk| T::from_bytes(chunk, byte_order))
        .collect();
    let array = ArrayD::from_shape_vec(IxDyn(shape), samples)
        .map_err(|e| OmeTiffError::Shape(e.to_string()))?;
    Ok(T::wrap(array))
}

fn plane_bytes<T: Pixel>(array: &ArrayD<T>, t: usize, z: usize, c: usize) -> Vec<u8> {
    let plane = array.slice(ndarray::s![t, z, c, .., ..]);
    let mut out = Vec::with_capacity(plane.len() * std::mem::size_of::<T>());
    for &value in plane.iter() {
        value.extend_le_bytes(&mut out);
    }
    out
}

impl<T: Pixel, D: Dimension> From<Array<T, D>> for OmeArray {
    fn from(array: Array<T, D>) -> Self {
        T::wrap(array.into_dyn())
    }
}

// =============================================================================
// Tests
// =============================================================================
