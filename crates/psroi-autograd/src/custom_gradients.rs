use crate::context::SavedContext;
use psroi_core::{Result, Tensor};

/// A differentiable region operator with an explicit record/replay contract.
///
/// `forward` returns the output together with the [`SavedContext`] that
/// `backward` consumes. Only the input feature map receives a gradient; the
/// region list and the operator parameters are not differentiable.
pub trait RoiGradientFunction<T> {
    /// Forward pass over a packed `[K, 5]` region list
    fn forward(
        &self,
        input: &Tensor<T>,
        rois: &Tensor<T>,
    ) -> Result<(Tensor<T>, SavedContext<T>)>;

    /// Gradient of the input feature map for the given output gradient
    fn backward(&self, grad_output: &Tensor<T>, ctx: &SavedContext<T>) -> Result<Tensor<T>>;

    /// Name of the operation for debugging
    fn name(&self) -> &str;
}
