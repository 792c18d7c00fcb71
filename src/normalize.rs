//! Reordering of raw page stacks into canonical (T, Z, C, Y, X) arrays.
//!
//! A raw stack holds the decoded pages of one series in file order. Its
//! leading axes follow the declared `DimensionOrder` from slowest to fastest
//! varying, and axes of extent 1 are elided. Normalizing first re-inserts the
//! elided axes, counting from the end, then moves the axes into place with a
//! fixed recipe per order:
//!
//! | order | inserted at -3, -4, -5 | moves after insertion |
//! |-------|------------------------|-----------------------|
//! | XYCZT | C, Z, T                | none                  |
//! | XYZCT | Z, C, T                | 1 -> 2                |
//! | XYCTZ | C, T, Z                | 0 -> 1                |
//! | XYZTC | Z, T, C                | 0 -> 2                |
//! | XYTZC | T, Z, C                | 0 -> 2, 0 -> 1        |
//! | XYTCZ | T, C, Z                | 1 -> 2, 0 -> 1        |

use ndarray::{Array5, ArrayD, Axis, Ix5};
use tracing::trace;

use crate::error::{OmeTiffError, Result};
use crate::ome::DimensionOrder;

/// Axis inserted when a dimension has extent 1, as (extent, position from the end).
type Insertion = (usize, usize);

/// Insertions and axis moves for one order.
struct Recipe {
    insertions: [Insertion; 3],
    moves: &'static [(usize, usize)],
}

fn recipe(order: DimensionOrder, size_c: usize, size_z: usize, size_t: usize) -> Recipe {
    match order {
        DimensionOrder::XYCZT => Recipe {
            insertions: [(size_c, 3), (size_z, 4), (size_t, 5)],
            moves: &[],
        },
        DimensionOrder::XYZCT => Recipe {
            insertions: [(size_z, 3), (size_c, 4), (size_t, 5)],
            moves: &[(1, 2)],
        },
        DimensionOrder::XYCTZ => Recipe {
            insertions: [(size_c, 3), (size_t, 4), (size_z, 5)],
            moves: &[(0, 1)],
        },
        DimensionOrder::XYZTC => Recipe {
            insertions: [(size_z, 3), (size_t, 4), (size_c, 5)],
            moves: &[(0, 2)],
        },
        DimensionOrder::XYTZC => Recipe {
            insertions: [(size_t, 3), (size_z, 4), (size_c, 5)],
            moves: &[(0, 2), (0, 1)],
        },
        DimensionOrder::XYTCZ => Recipe {
            insertions: [(size_t, 3), (size_c, 4), (size_z, 5)],
            moves: &[(1, 2), (0, 1)],
        },
    }
}

/// Axis permutation that moves axis `src` to position `dst` of a 5-D array.
fn move_axis(src: usize, dst: usize) -> [usize; 5] {
    let mut order: Vec<usize> = (0..5).filter(|&i| i != src).collect();
    order.insert(dst, src);
    let mut out = [0; 5];
    out.copy_from_slice(&order);
    out
}

/// Reorder a raw page stack into a canonical (T, Z, C, Y, X) array.
///
/// `raw` must end in the (Y, X) axes and carry one leading axis for each of
/// C, Z and T whose size is greater than 1, in storage order.
///
/// # Errors
/// `Shape` if `raw` cannot become `(size_t, size_z, size_c, Y, X)`.
pub fn normalize<T: Clone>(
    raw: ArrayD<T>,
    size_c: usize,
    size_z: usize,
    size_t: usize,
    order: DimensionOrder,
) -> Result<Array5<T>> {
    let raw_shape = raw.shape().to_vec();
    let shape_error = |reason: &str| {
        OmeTiffError::Shape(format!(
            "cannot normalize raw shape {:?} to (T={}, Z={}, C={}, Y, X) for {}: {}",
            raw_shape, size_t, size_z, size_c, order, reason
        ))
    };

    if raw.ndim() < 2 || raw.ndim() > 5 {
        return Err(shape_error("expected 2 to 5 axes"));
    }
    let (height, width) = (raw_shape[raw.ndim() - 2], raw_shape[raw.ndim() - 1]);

    let recipe = recipe(order, size_c, size_z, size_t);

    let mut array = raw;
    for (extent, from_end) in recipe.insertions {
        if extent != 1 {
            continue;
        }
        let position = (array.ndim() + 1)
            .checked_sub(from_end)
            .ok_or_else(|| shape_error("too few axes"))?;
        array = array.insert_axis(Axis(position));
    }

    if array.ndim() != 5 {
        return Err(shape_error("axis count does not match the declared sizes"));
    }
    for &(src, dst) in recipe.moves {
        array = array.permuted_axes(move_axis(src, dst).to_vec());
    }

    if array.shape() != [size_t, size_z, size_c, height, width] {
        return Err(shape_error("extents do not match the declared sizes"));
    }

    trace!(order = %order, shape = ?array.shape(), "normalized raw stack");

    array
        .as_standard_layout()
        .into_owned()
        .into_dimensionality::<Ix5>()
        .map_err(|e| shape_error(&e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
