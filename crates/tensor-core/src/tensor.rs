// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core typed tensor.

use crate::storage::AlignedBuffer;
use crate::{DType, Element, Shape, TensorError};
use rand::Rng;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Default relative tolerance for [`Tensor::is_close`].
pub const DEFAULT_RTOL: f64 = 0.01;

/// An owned, n-dimensional tensor of `T` stored in row-major order.
///
/// The buffer is alignment-padded (see [`crate::MEMORY_ALIGNMENT`]) and
/// always holds exactly `shape.num_elements()` logical elements.
/// `Clone` is a deep copy; sharing happens one level up, through the
/// `Arc` held by [`crate::TensorValue`].
#[derive(Clone)]
pub struct Tensor<T: Element> {
    shape: Shape,
    data: AlignedBuffer<T>,
}

impl<T: Element> Tensor<T> {
    /// Creates a zero-filled tensor.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Shape, Tensor};
    /// let t = Tensor::<f32>::zeros(Shape::matrix(2, 3)).unwrap();
    /// assert_eq!(t.len(), 6);
    /// assert!(t.as_slice().iter().all(|&x| x == 0.0));
    /// ```
    pub fn zeros(shape: impl Into<Shape>) -> Result<Self, TensorError> {
        let shape = shape.into();
        let data = AlignedBuffer::zeroed(element_count(&shape)?)?;
        Ok(Self { shape, data })
    }

    /// Creates a tensor filled with `value`.
    pub fn full(shape: impl Into<Shape>, value: T) -> Result<Self, TensorError> {
        let mut t = Self::zeros(shape)?;
        t.fill(value);
        Ok(t)
    }

    /// Creates a tensor from row-major data.
    ///
    /// # Errors
    /// Returns [`TensorError::BufferSizeMismatch`] if `data.len()` differs
    /// from the shape's element count.
    pub fn from_vec(shape: impl Into<Shape>, data: Vec<T>) -> Result<Self, TensorError> {
        Self::from_slice(shape, &data)
    }

    /// Creates a tensor by copying row-major data.
    pub fn from_slice(shape: impl Into<Shape>, data: &[T]) -> Result<Self, TensorError> {
        let shape = shape.into();
        let expected = element_count(&shape)?;
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data: AlignedBuffer::from_slice(data)?,
        })
    }

    /// Creates a rank-0 tensor holding one value.
    pub fn scalar(value: T) -> Result<Self, TensorError> {
        Self::from_slice(Shape::scalar(), &[value])
    }

    /// Creates a tensor with elements drawn uniformly from `[low, high)`.
    pub fn random_uniform<R: Rng + ?Sized>(
        shape: impl Into<Shape>,
        low: T,
        high: T,
        rng: &mut R,
    ) -> Result<Self, TensorError> {
        if !(low < high) {
            return Err(TensorError::InvalidArgument {
                op: "random_uniform",
                detail: format!("empty range [{low}, {high})"),
            });
        }
        let mut t = Self::zeros(shape)?;
        for x in t.as_mut_slice() {
            *x = rng.gen_range(low..high);
        }
        Ok(t)
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Shorthand for `self.shape().dims()`.
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Logical size in bytes (padding excluded).
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(T::DTYPE)
    }

    pub fn as_slice(&self) -> &[T] {
        self.data.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data.as_mut_slice()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// Reads the element at a flat row-major offset.
    pub fn get(&self, flat: usize) -> Result<T, TensorError> {
        self.as_slice()
            .get(flat)
            .copied()
            .ok_or_else(|| self.out_of_range(vec![flat]))
    }

    /// Writes the element at a flat row-major offset.
    pub fn set(&mut self, flat: usize, value: T) -> Result<(), TensorError> {
        let err = self.out_of_range(vec![flat]);
        let slot = self.as_mut_slice().get_mut(flat).ok_or(err)?;
        *slot = value;
        Ok(())
    }

    /// Converts a multi-index to a flat offset, bounds-checking every coordinate.
    pub fn offset_of(&self, index: &[usize]) -> Result<usize, TensorError> {
        self.shape
            .offset(index)
            .ok_or_else(|| self.out_of_range(index.to_vec()))
    }

    /// Reads the element at a multi-index.
    pub fn at(&self, index: &[usize]) -> Result<T, TensorError> {
        let flat = self.offset_of(index)?;
        Ok(self.as_slice()[flat])
    }

    /// Writes the element at a multi-index.
    pub fn set_at(&mut self, index: &[usize], value: T) -> Result<(), TensorError> {
        let flat = self.offset_of(index)?;
        self.as_mut_slice()[flat] = value;
        Ok(())
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    /// Changes the shape without touching the data.
    ///
    /// One entry may be `-1`, in which case it is inferred from the
    /// element count.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Tensor;
    /// let mut t = Tensor::from_vec([6], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
    /// t.reshape(&[-1, 3]).unwrap();
    /// assert_eq!(t.dims(), &[2, 3]);
    /// ```
    pub fn reshape(&mut self, dims: &[i64]) -> Result<(), TensorError> {
        let target = Shape::resolve(dims, self.len())?;
        self.reshape_to(target)
    }

    /// Changes the shape to an explicit target with the same element count.
    pub fn reshape_to(&mut self, target: impl Into<Shape>) -> Result<(), TensorError> {
        let target = target.into();
        if target.checked_num_elements() != Some(self.len()) {
            return Err(TensorError::ReshapeMismatch {
                from: self.shape.clone(),
                to: target,
            });
        }
        self.shape = target;
        Ok(())
    }

    /// Tolerance-based comparison used by numeric tests.
    ///
    /// Shapes must match exactly; each pair must satisfy
    /// `|a - b| <= |rtol * b|`.
    pub fn is_close(&self, other: &Self, rtol: f64) -> bool {
        self.shape == other.shape
            && self.as_slice().iter().zip(other.as_slice()).all(|(&a, &b)| {
                let (a, b) = (a.to_f64(), b.to_f64());
                a == b || (a - b).abs() <= (rtol * b).abs()
            })
    }

    fn out_of_range(&self, index: Vec<usize>) -> TensorError {
        TensorError::IndexOutOfRange {
            index,
            shape: self.shape.clone(),
        }
    }
}

/// Element count of `shape`; an overflowing product can never be allocated.
fn element_count(shape: &Shape) -> Result<usize, TensorError> {
    shape
        .checked_num_elements()
        .ok_or(TensorError::OutOfMemory { bytes: usize::MAX })
}

impl<T: Element> PartialEq for Tensor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.as_slice() == other.as_slice()
    }
}

impl<T: Element> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.shape)
            .field("data", &self.as_slice())
            .finish()
    }
}

impl<T: Element> serde::Serialize for Tensor<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Tensor", 2)?;
        state.serialize_field("shape", &self.shape)?;
        state.serialize_field("data", self.as_slice())?;
        state.end()
    }
}

/// Deserialization re-validates that `data` matches `shape`.
impl<'de, T: Element> serde::Deserialize<'de> for Tensor<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw<T> {
            shape: Shape,
            data: Vec<T>,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        Tensor::from_vec(raw.shape, raw.data).map_err(serde::de::Error::custom)
    }
}

/// Unchecked-by-`Result` flat access; panics when out of range.
impl<T: Element> Index<usize> for Tensor<T> {
    type Output = T;

    fn index(&self, flat: usize) -> &T {
        &self.as_slice()[flat]
    }
}

impl<T: Element> IndexMut<usize> for Tensor<T> {
    fn index_mut(&mut self, flat: usize) -> &mut T {
        &mut self.as_mut_slice()[flat]
    }
}

/// Multi-index access; panics when any coordinate is out of range.
impl<T: Element> Index<&[usize]> for Tensor<T> {
    type Output = T;

    fn index(&self, index: &[usize]) -> &T {
        match self.shape.offset(index) {
            Some(flat) => &self.as_slice()[flat],
            None => panic!("index {index:?} out of range for shape {}", self.shape),
        }
    }
}

impl<T: Element> IndexMut<&[usize]> for Tensor<T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut T {
        match self.shape.offset(index) {
            Some(flat) => &mut self.as_mut_slice()[flat],
            None => panic!("index {index:?} out of range for shape {}", self.shape),
        }
    }
}
