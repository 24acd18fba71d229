// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The symbol table: named tensors shared between nodes.
//!
//! Entries are [`TensorValue`]s, which hold their tensor behind an `Arc`.
//! Cloning a table is therefore cheap, and a node that writes into an
//! output still shared with another table gets a private copy on first
//! write (`Arc::make_mut`). This is what lets every inference run work on
//! its own copy of the model's table without deep-copying initializers.

use crate::NodeError;
use std::collections::HashMap;
use std::sync::Arc;
use tensor_core::{DType, Element, Shape, Tensor, TensorValue};

/// Mapping from tensor name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    entries: HashMap<String, TensorValue>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&TensorValue> {
        self.entries.get(name)
    }

    /// Binds `name`, returning the previous value if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TensorValue>) -> Option<TensorValue> {
        self.entries.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<TensorValue> {
        self.entries.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Looks up an input, failing with [`NodeError::MissingInput`].
    ///
    /// The returned value is a cheap handle clone so the caller can go on
    /// to borrow the table mutably for its outputs.
    pub fn input(&self, op: &'static str, key: &str) -> Result<TensorValue, NodeError> {
        self.entries.get(key).cloned().ok_or_else(|| NodeError::MissingInput {
            op,
            key: key.to_string(),
        })
    }

    /// Fails with [`NodeError::OutputTypeMismatch`] if `key` is bound to
    /// a tensor of another element type. Nodes with several outputs call
    /// this for all of them before writing any.
    pub fn check_output(&self, op: &'static str, key: &str, dtype: DType) -> Result<(), NodeError> {
        match self.entries.get(key) {
            Some(existing) if existing.dtype() != dtype => Err(NodeError::OutputTypeMismatch {
                op,
                key: key.to_string(),
                expected: dtype,
                actual: existing.dtype(),
            }),
            _ => Ok(()),
        }
    }

    /// Binds or allocates the output `key` as a `Tensor<T>` of `shape`.
    ///
    /// - absent: a zero tensor of `shape` is inserted;
    /// - present with another element type: [`NodeError::OutputTypeMismatch`];
    /// - present with type `T` and `shape`: the existing buffer is reused,
    ///   copied first if another table still shares it;
    /// - present with type `T` but another shape: rebound to a fresh zero
    ///   tensor of `shape`.
    ///
    /// Kernels overwrite every element, so the initial contents do not
    /// matter.
    pub fn output<T: Element>(&mut self, op: &'static str, key: &str, shape: &Shape) -> Result<&mut Tensor<T>, NodeError> {
        self.check_output(op, key, T::DTYPE)?;

        let reusable = self.entries.get(key).is_some_and(|v| v.shape() == shape);
        if !reusable {
            let fresh = Tensor::<T>::zeros(shape.clone()).map_err(NodeError::tensor(op))?;
            self.entries.insert(key.to_string(), T::into_value(Arc::new(fresh)));
        }

        let slot = self.entries.get_mut(key).and_then(T::from_value_mut).ok_or_else(|| {
            NodeError::MissingInput {
                op,
                key: key.to_string(),
            }
        })?;
        Ok(Arc::make_mut(slot))
    }

    /// Moves every entry of `other` into `self`, overwriting on collision.
    pub fn merge(&mut self, other: SymbolTable) {
        self.entries.extend(other.entries);
    }
}

impl<K: Into<String>, V: Into<TensorValue>> FromIterator<(K, V)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for SymbolTable {
    type Item = (String, TensorValue);
    type IntoIter = std::collections::hash_map::IntoIter<String, TensorValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<HashMap<String, TensorValue>> for SymbolTable {
    fn from(entries: HashMap<String, TensorValue>) -> Self {
        Self { entries }
    }
}
