//! Forward-pass state needed to replay a PS-RoI backward pass

use psroi_core::{Result, Shape, Tensor, TensorError};

/// Immutable record of a PS-RoI forward call.
///
/// Holds exactly what the backward pass needs and nothing more: the packed
/// region list, the channel mapping produced by the forward pass and the shape
/// of the input feature map. The record cannot be modified after the forward
/// pass has produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedContext<T> {
    rois: Tensor<T>,
    channel_mapping: Tensor<usize>,
    input_shape: [usize; 4],
}

impl<T> SavedContext<T> {
    pub(crate) fn new(
        rois: Tensor<T>,
        channel_mapping: Tensor<usize>,
        input_shape: &Shape,
    ) -> Result<Self> {
        let input_shape = input_shape.as_nchw().ok_or_else(|| {
            TensorError::invalid_shape(
                "saved_context",
                "input must be 4-D [N, C, H, W]",
                input_shape.dims(),
            )
        })?;
        Ok(Self {
            rois,
            channel_mapping,
            input_shape,
        })
    }

    /// Packed `[K, 5]` region list used by the forward pass
    pub fn rois(&self) -> &Tensor<T> {
        &self.rois
    }

    pub fn channel_mapping(&self) -> &Tensor<usize> {
        &self.channel_mapping
    }

    /// `[N, C, H, W]` of the forward input
    pub fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    pub fn num_rois(&self) -> usize {
        self.rois.shape().dims().first().copied().unwrap_or(0)
    }
}
