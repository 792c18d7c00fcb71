//! Slice-wise transforms over canonical (T, Z, C, Y, X) arrays.
//!
//! Each helper hands the caller one slice at a time and reassembles the
//! results in place. The element type may change; the slice shape may not.

use ndarray::{s, Array2, Array3, Array5, ArrayView2, ArrayView3};

use crate::error::{OmeTiffError, Result};

/// Apply `f` to every (Y, X) plane.
///
/// # Errors
/// `Shape` if `f` returns a plane of a different shape.
pub fn apply_2d_transform<A, B, F>(array: &Array5<A>, mut f: F) -> Result<Array5<B>>
where
    B: Clone,
    F: FnMut(ArrayView2<'_, A>) -> Array2<B>,
{
    let (size_t, size_z, size_c, size_y, size_x) = array.dim();

    let mut planes = Vec::with_capacity(size_t * size_z * size_c);
    for t in 0..size_t {
        for z in 0..size_z {
            for c in 0..size_c {
                let plane = f(array.slice(s![t, z, c, .., ..]));
                check_slice_shape(plane.shape(), &[size_y, size_x], "plane")?;
                planes.push(plane);
            }
        }
    }

    Ok(Array5::from_shape_fn(array.raw_dim(), |(t, z, c, y, x)| {
        planes[(t * size_z + z) * size_c + c][[y, x]].clone()
    }))
}

/// Apply `f` to every (Z, Y, X) stack, once per (t, c).
///
/// # Errors
/// `Shape` if `f` returns a stack of a different shape.
pub fn apply_3d_transform_zstack<A, B, F>(array: &Array5<A>, mut f: F) -> Result<Array5<B>>
where
    B: Clone,
    F: FnMut(ArrayView3<'_, A>) -> Array3<B>,
{
    let (size_t, size_z, size_c, size_y, size_x) = array.dim();

    let mut stacks = Vec::with_capacity(size_t * size_c);
    for t in 0..size_t {
        for c in 0..size_c {
            let stack = f(array.slice(s![t, .., c, .., ..]));
            check_slice_shape(stack.shape(), &[size_z, size_y, size_x], "z-stack")?;
            stacks.push(stack);
        }
    }

    Ok(Array5::from_shape_fn(array.raw_dim(), |(t, z, c, y, x)| {
        stacks[t * size_c + c][[z, y, x]].clone()
    }))
}

/// Apply `f` to every (C, Y, X) stack, once per (t, z).
///
/// # Errors
/// `Shape` if `f` returns a stack of a different shape.
pub fn apply_3d_transform_channels<A, B, F>(array: &Array5<A>, mut f: F) -> Result<Array5<B>>
where
    B: Clone,
    F: FnMut(ArrayView3<'_, A>) -> Array3<B>,
{
    let (size_t, size_z, size_c, size_y, size_x) = array.dim();

    let mut stacks = Vec::with_capacity(size_t * size_z);
    for t in 0..size_t {
        for z in 0..size_z {
            let stack = f(array.slice(s![t, z, .., .., ..]));
            check_slice_shape(stack.shape(), &[size_c, size_y, size_x], "channel stack")?;
            stacks.push(stack);
        }
    }

    Ok(Array5::from_shape_fn(array.raw_dim(), |(t, z, c, y, x)| {
        stacks[t * size_z + z][[c, y, x]].clone()
    }))
}

fn check_slice_shape(actual: &[usize], expected: &[usize], what: &str) -> Result<()> {
    if actual != expected {
        return Err(OmeTiffError::Shape(format!(
            "transformed {} has shape {:?}, expected {:?}",
            what, actual, expected
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
