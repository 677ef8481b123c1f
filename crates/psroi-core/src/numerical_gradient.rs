//! Finite-difference gradient checks.
//!
//! Validates backward passes by comparing the analytical input gradient of a
//! scalar loss against finite differences of that loss:
//!
//! ```text
//! dL/dx_i ≈ [L(x + ε e_i) - L(x - ε e_i)] / (2ε)
//! ```
//!
//! # Example
//!
//! ```rust
//! use psroi_core::numerical_gradient::{check_gradients, GradientCheckConfig};
//! use psroi_core::{Result, Tensor};
//!
//! // L(x) = sum(x^2), dL/dx = 2x
//! fn loss(x: &Tensor<f64>) -> Result<f64> {
//!     Ok(x.to_vec().iter().map(|v| v * v).sum())
//! }
//!
//! fn grad(x: &Tensor<f64>) -> Result<Tensor<f64>> {
//!     Tensor::from_vec(x.to_vec().iter().map(|v| 2.0 * v).collect(), x.shape().dims())
//! }
//!
//! let x = Tensor::from_vec(vec![1.0, -2.0, 3.0], &[3]).unwrap();
//! let result = check_gradients(&x, loss, grad, &GradientCheckConfig::default()).unwrap();
//! assert!(result.is_ok());
//! ```

use crate::{Result, Tensor, TensorError};
use scirs2_core::numeric::{Float, FromPrimitive};
use std::marker::PhantomData;

/// Step size, tolerances and sampling for a finite-difference check
#[derive(Debug, Clone)]
pub struct GradientCheckConfig {
    /// Perturbation applied to one element at a time
    pub epsilon: f64,
    /// Accepted `|num - ana| / |ana|`
    pub rtol: f64,
    /// Accepted `|num - ana|`; an element passes if either tolerance holds
    pub atol: f64,
    /// Record the indices of failing elements
    pub check_elementwise: bool,
    /// Two-sided difference instead of `L(x + ε) - L(x)`
    pub use_central_difference: bool,
    /// Maximum number of elements to check, evenly strided over the input
    pub max_samples: Option<usize>,
}

impl Default for GradientCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            check_elementwise: false,
            use_central_difference: true,
            max_samples: None,
        }
    }
}

impl GradientCheckConfig {
    /// Small step, tight tolerances, every failing index recorded
    pub fn strict() -> Self {
        Self {
            epsilon: 1e-6,
            rtol: 1e-4,
            atol: 1e-6,
            check_elementwise: true,
            use_central_difference: true,
            max_samples: None,
        }
    }

    /// For `f32` inputs, where a 1e-5 step drowns in rounding
    pub fn relaxed() -> Self {
        Self {
            epsilon: 1e-4,
            rtol: 1e-2,
            atol: 1e-4,
            check_elementwise: false,
            use_central_difference: true,
            max_samples: Some(100),
        }
    }

    /// One-sided differences on at most 50 elements
    pub fn fast() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            check_elementwise: false,
            use_central_difference: false,
            max_samples: Some(50),
        }
    }

    /// Flat indices to check for an input of `len` elements
    fn sample_indices(&self, len: usize) -> Vec<usize> {
        match self.max_samples {
            Some(max) if max > 0 && max < len => {
                let stride = len as f64 / max as f64;
                (0..max).map(|i| (i as f64 * stride) as usize).collect()
            }
            _ => (0..len).collect(),
        }
    }
}

/// Outcome of a finite-difference check
#[derive(Debug, Clone)]
pub struct GradientCheckResult {
    pub passed: bool,
    pub max_relative_error: f64,
    pub max_absolute_error: f64,
    pub num_elements_checked: usize,
    pub num_failures: usize,
    /// Flat indices of failed elements (if check_elementwise is true)
    pub failed_indices: Vec<usize>,
    /// Set when `passed` is false
    pub error_message: Option<String>,
}

impl GradientCheckResult {
    pub fn is_ok(&self) -> bool {
        self.passed
    }

    /// Failed elements as a percentage of those checked
    pub fn failure_rate(&self) -> f64 {
        if self.num_elements_checked == 0 {
            0.0
        } else {
            (self.num_failures as f64 / self.num_elements_checked as f64) * 100.0
        }
    }

    /// Multi-line report suitable for assertion messages
    pub fn summary(&self) -> String {
        if self.passed {
            format!(
                "Gradient check passed\n\
                 Elements checked: {}\n\
                 Max relative error: {:.2e}\n\
                 Max absolute error: {:.2e}",
                self.num_elements_checked, self.max_relative_error, self.max_absolute_error
            )
        } else {
            format!(
                "Gradient check FAILED\n\
                 Elements checked: {}\n\
                 Failures: {} ({:.2}%)\n\
                 Max relative error: {:.2e}\n\
                 Max absolute error: {:.2e}\n\
                 {}",
                self.num_elements_checked,
                self.num_failures,
                self.failure_rate(),
                self.max_relative_error,
                self.max_absolute_error,
                self.error_message.as_deref().unwrap_or("")
            )
        }
    }
}

/// Numerical gradient checker for scalar losses
pub struct NumericalGradientChecker<T> {
    config: GradientCheckConfig,
    _phantom: PhantomData<T>,
}

impl<T> NumericalGradientChecker<T>
where
    T: Float + FromPrimitive,
{
    pub fn new(config: GradientCheckConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    pub fn config(&self) -> &GradientCheckConfig {
        &self.config
    }

    /// Finite-difference derivative of `loss` with respect to each listed
    /// flat element of `input`.
    pub fn numerical_gradient_at<F>(
        &self,
        input: &Tensor<T>,
        indices: &[usize],
        loss: F,
    ) -> Result<Vec<f64>>
    where
        F: Fn(&Tensor<T>) -> Result<T>,
    {
        let dims = input.shape().dims();
        let base = input.to_vec();
        let epsilon = T::from_f64(self.config.epsilon).ok_or_else(|| {
            TensorError::invalid_argument_op("numerical_gradient", "epsilon is not representable")
        })?;
        // the step actually taken after rounding to T
        let step = epsilon.to_f64().unwrap_or(self.config.epsilon);

        let evaluate = |index: usize, delta: T| -> Result<f64> {
            let mut data = base.clone();
            data[index] = data[index] + delta;
            let value = loss(&Tensor::from_vec(data, dims)?)?;
            Ok(value.to_f64().unwrap_or(f64::NAN))
        };

        let f_x = if self.config.use_central_difference {
            None
        } else {
            Some(loss(input)?.to_f64().unwrap_or(f64::NAN))
        };

        indices
            .iter()
            .map(|&index| {
                if index >= base.len() {
                    return Err(TensorError::invalid_argument_op(
                        "numerical_gradient",
                        &format!("index {index} out of range for {} elements", base.len()),
                    ));
                }
                match f_x {
                    None => {
                        let f_plus = evaluate(index, epsilon)?;
                        let f_minus = evaluate(index, -epsilon)?;
                        Ok((f_plus - f_minus) / (2.0 * step))
                    }
                    Some(f_x) => Ok((evaluate(index, epsilon)? - f_x) / step),
                }
            })
            .collect()
    }

    /// Finite-difference gradient of `loss` over every element of `input`
    pub fn compute_numerical_gradient<F>(&self, input: &Tensor<T>, loss: F) -> Result<Tensor<T>>
    where
        F: Fn(&Tensor<T>) -> Result<T>,
    {
        let indices: Vec<usize> = (0..input.numel()).collect();
        let gradient = self
            .numerical_gradient_at(input, &indices, loss)?
            .into_iter()
            .map(|g| T::from_f64(g).unwrap_or_else(T::nan))
            .collect();
        Tensor::from_vec(gradient, input.shape().dims())
    }

    /// Element-wise comparison of two full gradients
    pub fn compare_gradients(
        &self,
        numerical: &Tensor<T>,
        analytical: &Tensor<T>,
    ) -> Result<GradientCheckResult> {
        if numerical.shape() != analytical.shape() {
            return Err(TensorError::shape_mismatch(
                "compare_gradients",
                &numerical.shape().to_string(),
                &analytical.shape().to_string(),
            ));
        }
        let numerical: Vec<f64> = numerical
            .to_vec()
            .iter()
            .map(|v| v.to_f64().unwrap_or(f64::NAN))
            .collect();
        let indices: Vec<usize> = (0..numerical.len()).collect();
        Ok(self.compare_at(&indices, &numerical, &analytical.to_vec()))
    }

    fn compare_at(
        &self,
        indices: &[usize],
        numerical: &[f64],
        analytical: &[T],
    ) -> GradientCheckResult {
        let (rtol, atol) = (self.config.rtol, self.config.atol);

        let mut worst_rel = 0.0f64;
        let mut worst_abs = 0.0f64;
        let mut num_failures = 0;
        let mut failed = Vec::new();

        for (&index, &numeric) in indices.iter().zip(numerical) {
            let analytic = analytical[index].to_f64().unwrap_or(f64::NAN);

            let abs_err = (numeric - analytic).abs();
            let rel_err = if analytic.abs() > 1e-10 {
                abs_err / analytic.abs()
            } else {
                abs_err
            };

            worst_rel = worst_rel.max(rel_err);
            worst_abs = worst_abs.max(abs_err);

            // NaN errors never satisfy the tolerance
            if !(rel_err <= rtol || abs_err <= atol) {
                num_failures += 1;
                if self.config.check_elementwise {
                    failed.push(index);
                }
            }
        }

        let passed = num_failures == 0;
        let error_message = (!passed).then(|| {
            format!(
                "{} of {} gradient elements outside rtol={} / atol={}",
                num_failures,
                indices.len(),
                rtol,
                atol
            )
        });

        GradientCheckResult {
            passed,
            max_relative_error: worst_rel,
            max_absolute_error: worst_abs,
            num_elements_checked: indices.len(),
            num_failures,
            failed_indices: failed,
            error_message,
        }
    }

    /// Full gradient check: finite differences of `loss` against `gradient(input)`
    pub fn check<F, G>(
        &self,
        input: &Tensor<T>,
        loss: F,
        gradient: G,
    ) -> Result<GradientCheckResult>
    where
        F: Fn(&Tensor<T>) -> Result<T>,
        G: Fn(&Tensor<T>) -> Result<Tensor<T>>,
    {
        let analytical = gradient(input)?;
        if analytical.shape() != input.shape() {
            return Err(TensorError::shape_mismatch(
                "gradient_check",
                &input.shape().to_string(),
                &analytical.shape().to_string(),
            ));
        }

        let indices = self.config.sample_indices(input.numel());
        let numerical = self.numerical_gradient_at(input, &indices, loss)?;
        let result = self.compare_at(&indices, &numerical, &analytical.to_vec());
        tracing::debug!(
            checked = result.num_elements_checked,
            failures = result.num_failures,
            max_relative_error = result.max_relative_error,
            "gradient check"
        );
        Ok(result)
    }
}

/// Convenience function for quick gradient checking
pub fn check_gradients<T, F, G>(
    input: &Tensor<T>,
    loss: F,
    gradient: G,
    config: &GradientCheckConfig,
) -> Result<GradientCheckResult>
where
    T: Float + FromPrimitive,
    F: Fn(&Tensor<T>) -> Result<T>,
    G: Fn(&Tensor<T>) -> Result<Tensor<T>>,
{
    let checker = NumericalGradientChecker::new(config.clone());
    checker.check(input, loss, gradient)
}

/// Convenience function with default configuration
pub fn quick_check_gradients<T, F, G>(
    input: &Tensor<T>,
    loss: F,
    gradient: G,
) -> Result<GradientCheckResult>
where
    T: Float + FromPrimitive,
    F: Fn(&Tensor<T>) -> Result<T>,
    G: Fn(&Tensor<T>) -> Result<Tensor<T>>,
{
    check_gradients(input, loss, gradient, &GradientCheckConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic_loss(x: &Tensor<f64>) -> Result<f64> {
        Ok(x.to_vec().iter().map(|v| v * v * v).sum())
    }

    fn cubic_grad(x: &Tensor<f64>) -> Result<Tensor<f64>> {
        Tensor::from_vec(
            x.to_vec().iter().map(|v| 3.0 * v * v).collect(),
            x.shape().dims(),
        )
    }

    #[test]
    fn test_config_presets() {
        let strict = GradientCheckConfig::strict();
        assert!(strict.rtol < GradientCheckConfig::default().rtol);
        assert!(strict.check_elementwise);
        assert!(!GradientCheckConfig::fast().use_central_difference);
        assert_eq!(GradientCheckConfig::relaxed().max_samples, Some(100));
    }

    #[test]
    fn test_sample_indices_are_strided() {
        let config = GradientCheckConfig {
            max_samples: Some(4),
            ..Default::default()
        };
        assert_eq!(config.sample_indices(10), vec![0, 2, 5, 7]);
        assert_eq!(config.sample_indices(3), vec![0, 1, 2]);
    }

    #[test]
    fn test_correct_gradient_passes() {
        let x = Tensor::from_vec(vec![0.5, -1.0, 2.0, 1.5], &[2, 2]).unwrap();
        let result = quick_check_gradients(&x, cubic_loss, cubic_grad).unwrap();
        assert!(result.is_ok(), "{}", result.summary());
        assert_eq!(result.num_elements_checked, 4);
    }

    #[test]
    fn test_wrong_gradient_fails() {
        let x = Tensor::from_vec(vec![0.5, -1.0, 2.0], &[3]).unwrap();
        let wrong = |x: &Tensor<f64>| {
            Tensor::from_vec(x.to_vec().iter().map(|v| 2.0 * v).collect(), x.shape().dims())
        };
        let result =
            check_gradients(&x, cubic_loss, wrong, &GradientCheckConfig::strict()).unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.failed_indices.len(), result.num_failures);
        assert!(result.summary().contains("FAILED"));
    }

    #[test]
    fn test_compute_numerical_gradient() {
        let checker = NumericalGradientChecker::<f64>::new(GradientCheckConfig::default());
        let x = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let numerical = checker.compute_numerical_gradient(&x, cubic_loss).unwrap();
        let analytical = cubic_grad(&x).unwrap();
        assert!(checker.compare_gradients(&numerical, &analytical).unwrap().is_ok());
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let checker = NumericalGradientChecker::<f64>::new(GradientCheckConfig::default());
        let a = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let b = Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        assert!(checker.compare_gradients(&a, &b).is_err());
    }
}
