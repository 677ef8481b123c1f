//! Finite-difference validation of [`RoiGradientFunction`] implementations
//!
//! The scalar loss is a fixed weighted sum of the operator output,
//! `L(x) = sum_i w_i * f(x)_i`, so its analytical input gradient is exactly
//! `backward(w)`. The weights are a deterministic, non-uniform pattern so that
//! errors in the channel routing cannot cancel out.

use crate::custom_gradients::RoiGradientFunction;
use psroi_core::numerical_gradient::{
    GradientCheckConfig, GradientCheckResult, NumericalGradientChecker,
};
use psroi_core::{Result, Tensor, TensorError};
use scirs2_core::numeric::{Float, FromPrimitive};

/// Deterministic loss weights in `[-1, 1]` for an output of the given shape
pub fn loss_weights<T>(shape: &[usize]) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive,
{
    let n: usize = shape.iter().product();
    let weights = (0..n)
        .map(|i| {
            let w = ((i * 7 + 3) % 11) as f64 / 5.0 - 1.0;
            T::from_f64(w).ok_or_else(|| {
                TensorError::invalid_argument_op("loss_weights", "weight is not representable")
            })
        })
        .collect::<Result<Vec<T>>>()?;
    Tensor::from_vec(weights, shape)
}

fn weighted_sum<T: Float>(output: &Tensor<T>, weights: &Tensor<T>) -> T {
    output
        .to_vec()
        .into_iter()
        .zip(weights.to_vec())
        .fold(T::zero(), |acc, (o, w)| acc + o * w)
}

/// Check `function.backward` against finite differences of its forward pass
/// for the given input and packed region list.
pub fn check_roi_gradient<T, F>(
    function: &F,
    input: &Tensor<T>,
    rois: &Tensor<T>,
    config: &GradientCheckConfig,
) -> Result<GradientCheckResult>
where
    T: Float + FromPrimitive,
    F: RoiGradientFunction<T>,
{
    let (output, ctx) = function.forward(input, rois)?;
    let weights = loss_weights::<T>(output.shape().dims())?;

    let checker = NumericalGradientChecker::new(config.clone());
    let result = checker.check(
        input,
        |x| {
            let (out, _) = function.forward(x, rois)?;
            Ok(weighted_sum(&out, &weights))
        },
        |_| function.backward(&weights, &ctx),
    )?;

    if !result.is_ok() {
        tracing::warn!(
            operation = function.name(),
            failures = result.num_failures,
            max_relative_error = result.max_relative_error,
            "gradient check failed"
        );
    }
    Ok(result)
}
