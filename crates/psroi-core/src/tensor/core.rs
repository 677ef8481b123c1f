//! Core Tensor Structure and Properties

use crate::Shape;
use scirs2_core::ndarray::ArrayD;

/// Dense row-major tensor backed by an `ndarray` array.
///
/// Tensors are always stored in standard (C-contiguous) layout, so
/// [`Tensor::as_slice`] succeeds for every tensor built through the
/// constructors in this module.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub(in crate::tensor) storage: ArrayD<T>,
    pub(in crate::tensor) shape: Shape,
}

impl<T> Tensor<T> {
    /// Get the shape of the tensor
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Get the value at a specific index
    pub fn get(&self, index: &[usize]) -> Option<T>
    where
        T: Clone,
    {
        if index.len() != self.storage.ndim() {
            return None;
        }
        self.storage.get(index).cloned()
    }

    /// Get the underlying data as a flat row-major slice
    pub fn as_slice(&self) -> Option<&[T]> {
        self.storage.as_slice()
    }

    /// Copy the elements out in row-major order
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.storage.iter().cloned().collect()
    }

    /// Get the total number of elements
    pub fn numel(&self) -> usize {
        self.shape.size()
    }

    /// Check if tensor is empty (has no elements)
    pub fn is_empty(&self) -> bool {
        self.shape.size() == 0
    }
}
