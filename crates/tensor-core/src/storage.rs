// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Alignment-padded element storage.
//!
//! [`AlignedBuffer`] owns a heap block whose start is aligned to
//! [`MEMORY_ALIGNMENT`] and whose byte length is rounded up to a multiple
//! of it, so a vectorised kernel may load a full lane past the last
//! logical element without leaving the allocation. The padding is
//! zero-filled and never exposed through the slice accessors.

use crate::{Element, TensorError};
use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Byte alignment (and padding granule) of every tensor buffer.
pub const MEMORY_ALIGNMENT: usize = 64;

/// Rounds `bytes` up to the next multiple of [`MEMORY_ALIGNMENT`].
pub(crate) fn padded_size(bytes: usize) -> Option<usize> {
    bytes
        .checked_add(MEMORY_ALIGNMENT - 1)
        .map(|b| b / MEMORY_ALIGNMENT * MEMORY_ALIGNMENT)
}

/// An owned, zero-initialised, aligned buffer of `len` elements.
pub struct AlignedBuffer<T: Element> {
    ptr: NonNull<T>,
    len: usize,
    capacity_bytes: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> AlignedBuffer<T> {
    /// Allocates `len` zeroed elements.
    ///
    /// # Errors
    /// Returns [`TensorError::OutOfMemory`] if the size overflows or the
    /// allocator refuses the request.
    pub fn zeroed(len: usize) -> Result<Self, TensorError> {
        let layout = Self::layout_for(len)?;
        if layout.size() == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len,
                capacity_bytes: 0,
                _marker: PhantomData,
            });
        }
        // SAFETY: the layout has a non-zero size. An all-zero bit pattern
        // is a valid value for every `Element` type.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<T>()).ok_or(TensorError::OutOfMemory {
            bytes: layout.size(),
        })?;
        Ok(Self {
            ptr,
            len,
            capacity_bytes: layout.size(),
            _marker: PhantomData,
        })
    }

    /// Allocates a buffer holding a copy of `data`.
    pub fn from_slice(data: &[T]) -> Result<Self, TensorError> {
        let mut buffer = Self::zeroed(data.len())?;
        buffer.as_mut_slice().copy_from_slice(data);
        Ok(buffer)
    }

    fn layout_for(len: usize) -> Result<Layout, TensorError> {
        let oom = || TensorError::OutOfMemory { bytes: usize::MAX };
        let bytes = len.checked_mul(std::mem::size_of::<T>()).ok_or_else(oom)?;
        let padded = padded_size(bytes).ok_or_else(oom)?;
        Layout::from_size_align(padded, MEMORY_ALIGNMENT)
            .map_err(|_| TensorError::OutOfMemory { bytes: padded })
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the underlying allocation including padding.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is valid for `len` initialised elements (or dangling
        // with len 0 when nothing was allocated).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Element> Clone for AlignedBuffer<T> {
    fn clone(&self) -> Self {
        match Self::from_slice(self.as_slice()) {
            Ok(buffer) => buffer,
            Err(_) => match Self::layout_for(self.len) {
                Ok(layout) => alloc::handle_alloc_error(layout),
                Err(_) => panic!("capacity overflow cloning {} elements", self.len),
            },
        }
    }
}

impl<T: Element> Drop for AlignedBuffer<T> {
    fn drop(&mut self) {
        if self.capacity_bytes > 0 {
            // SAFETY: this exact layout was used for the allocation.
            unsafe {
                let layout = Layout::from_size_align_unchecked(self.capacity_bytes, MEMORY_ALIGNMENT);
                alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), layout);
            }
        }
    }
}

// SAFETY: the buffer uniquely owns its allocation and `T` is Send + Sync.
unsafe impl<T: Element> Send for AlignedBuffer<T> {}
unsafe impl<T: Element> Sync for AlignedBuffer<T> {}

impl<T: Element> std::fmt::Debug for AlignedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .field("capacity_bytes", &self.capacity_bytes)
            .finish()
    }
}
