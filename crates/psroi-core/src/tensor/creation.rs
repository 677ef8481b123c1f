//! Tensor Creation and Construction

use super::core::Tensor;
use crate::{Result, Shape, TensorError};
use scirs2_core::ndarray::{ArrayD, IxDyn};
use scirs2_core::numeric::Zero;

impl<T: Clone> Tensor<T> {
    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self
    where
        T: Zero,
    {
        Self {
            storage: ArrayD::zeros(IxDyn(shape)),
            shape: Shape::from_slice(shape),
        }
    }

    /// Create a tensor filled with a single value
    pub fn full(shape: &[usize], value: T) -> Self {
        Self {
            storage: ArrayD::from_elem(IxDyn(shape), value),
            shape: Shape::from_slice(shape),
        }
    }

    /// Create a tensor from a row-major data vector with the given shape
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let total_elements: usize = shape.iter().product();
        if data.len() != total_elements {
            return Err(TensorError::invalid_shape(
                "tensor_creation",
                &format!(
                    "data length {} does not match {} elements",
                    data.len(),
                    total_elements
                ),
                shape,
            ));
        }

        let array = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Ok(Self {
            storage: array,
            shape: Shape::from_slice(shape),
        })
    }

    /// Create a tensor from an existing ndarray, copying into standard layout if needed
    pub fn from_array(array: ArrayD<T>) -> Self {
        let storage = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        let shape = Shape::from_slice(storage.shape());
        Self { storage, shape }
    }
}
