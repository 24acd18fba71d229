// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors, broadcasting and reshape resolution.

use crate::TensorError;
use std::fmt;

/// Describes the dimensionality of a [`crate::Tensor`].
///
/// Shapes are row-major: the last dimension varies fastest. A rank-0
/// shape describes a scalar and holds one element; any zero-sized
/// dimension makes the shape empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), 24);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape (matrix).
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements.
    ///
    /// For a scalar shape (rank 0), returns 1. Saturates at `usize::MAX`
    /// when the product overflows; use [`Shape::checked_num_elements`]
    /// where the difference matters.
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Returns the total number of elements, or `None` on overflow.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Computes the memory footprint in bytes for a given [`crate::DType`].
    pub fn size_bytes(&self, dtype: crate::DType) -> usize {
        self.num_elements().saturating_mul(dtype.size_bytes())
    }

    /// Computes row-major (C-order) strides for this shape.
    ///
    /// The stride for dimension `i` is the number of elements to skip
    /// in the flat buffer to advance one step along that dimension.
    pub fn strides(&self) -> Vec<usize> {
        let rank = self.dims.len();
        if rank == 0 {
            return vec![];
        }
        let mut strides = vec![0usize; rank];
        strides[rank - 1] = 1;
        for i in (0..rank - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Converts a multi-index into a flat row-major offset.
    ///
    /// Returns `None` if the index has the wrong rank or any coordinate
    /// is not smaller than its dimension.
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut offset = 0;
        for (&i, &d) in index.iter().zip(&self.dims) {
            if i >= d {
                return None;
            }
            offset = offset * d + i;
        }
        Some(offset)
    }

    /// Converts a flat row-major offset back into a multi-index.
    pub fn unravel(&self, mut flat: usize) -> Vec<usize> {
        let mut index = vec![0; self.dims.len()];
        for (slot, &d) in index.iter_mut().zip(&self.dims).rev() {
            if d > 0 {
                *slot = flat % d;
                flat /= d;
            }
        }
        index
    }

    /// Normalises a possibly negative axis against this shape's rank.
    pub fn normalize_axis(&self, op: &'static str, axis: i64) -> Result<usize, TensorError> {
        let rank = self.rank() as i64;
        let resolved = if axis < 0 { axis + rank } else { axis };
        if resolved < 0 || resolved >= rank {
            return Err(TensorError::InvalidAxis {
                op,
                axis,
                rank: self.rank(),
            });
        }
        Ok(resolved as usize)
    }

    /// Computes the broadcast result of two shapes.
    ///
    /// The shorter shape is padded with leading 1s; every aligned pair
    /// must be equal or contain a 1, and the output takes the non-1 side.
    ///
    /// # Errors
    /// Returns [`TensorError::ShapeMismatch`] naming both shapes when
    /// they cannot be broadcast together.
    pub fn broadcast(lhs: &Shape, rhs: &Shape) -> Result<Shape, TensorError> {
        let rank = lhs.rank().max(rhs.rank());
        let mut dims = Vec::with_capacity(rank);
        for axis in 0..rank {
            let a = lhs.aligned_dim(axis, rank);
            let b = rhs.aligned_dim(axis, rank);
            let d = if a == b || b == 1 {
                a
            } else if a == 1 {
                b
            } else {
                return Err(TensorError::ShapeMismatch {
                    op: "broadcast",
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                });
            };
            dims.push(d);
        }
        Ok(Shape::new(dims))
    }

    /// Returns the dimension at `axis` after left-padding to `rank` with 1s.
    pub(crate) fn aligned_dim(&self, axis: usize, rank: usize) -> usize {
        let pad = rank - self.rank();
        if axis < pad {
            1
        } else {
            self.dims[axis - pad]
        }
    }

    /// Resolves reshape dimensions for a tensor of `total` elements.
    ///
    /// At most one entry may be `-1`; it is replaced by
    /// `total / product(others)`. The caller still has to check that the
    /// resolved shape holds exactly `total` elements.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::resolve(&[-1, 3], 6).unwrap();
    /// assert_eq!(s.dims(), &[2, 3]);
    /// ```
    pub fn resolve(dims: &[i64], total: usize) -> Result<Shape, TensorError> {
        let mut inferred = None;
        let mut known = 1usize;
        let mut out = Vec::with_capacity(dims.len());
        for (i, &d) in dims.iter().enumerate() {
            match d {
                -1 => {
                    if inferred.replace(i).is_some() {
                        return Err(TensorError::InvalidReshape {
                            detail: "more than one dimension is -1".into(),
                        });
                    }
                    out.push(1);
                }
                d if d < 0 => {
                    return Err(TensorError::InvalidReshape {
                        detail: format!("negative dimension {d} at position {i}"),
                    });
                }
                d => {
                    known = known.checked_mul(d as usize).ok_or_else(|| TensorError::InvalidReshape {
                        detail: format!("element count of {dims:?} overflows"),
                    })?;
                    out.push(d as usize);
                }
            }
        }
        if let Some(i) = inferred {
            if known == 0 || total % known != 0 {
                return Err(TensorError::InvalidReshape {
                    detail: format!(
                        "cannot infer dimension {i}: {total} elements do not divide by {known}"
                    ),
                });
            }
            out[i] = total / known;
        }
        Ok(Shape::new(out))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

/// Convenience: `Shape::from(vec![2, 3])`.
impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

/// Convenience: `Shape::from(&[2, 3][..])`.
impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims.to_vec())
    }
}
