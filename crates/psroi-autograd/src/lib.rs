//! # PS-RoI Automatic Differentiation
//!
//! Differentiable wrappers around the PS-RoI kernels of `psroi-core`.
//!
//! A forward call returns the output together with a [`SavedContext`]: the
//! region list, the channel mapping and the input shape. The matching backward
//! call consumes that context and returns the gradient of the input feature
//! map. Nothing else is differentiated.
//!
//! ```rust
//! use psroi_autograd::{PsRoiAlignFunction, RoiGradientFunction};
//! use psroi_core::{PsRoiAlignConfig, Tensor};
//!
//! # fn main() -> psroi_core::Result<()> {
//! let function = PsRoiAlignFunction::new(PsRoiAlignConfig::adaptive(2, 0.5))?;
//! let input = Tensor::<f32>::full(&[1, 8, 6, 6], 1.0);
//! let rois = Tensor::from_vec(vec![0.0, 0.0, 0.0, 10.0, 10.0], &[1, 5])?;
//!
//! let (output, ctx) = function.forward(&input, &rois)?;
//! let grad_output = Tensor::full(output.shape().dims(), 1.0);
//! let grad_input = function.backward(&grad_output, &ctx)?;
//! assert_eq!(grad_input.shape().dims(), &[1, 8, 6, 6]);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

pub mod context;
pub mod custom_gradients;
pub mod numerical_checker;
pub mod ps_roi;

pub use context::SavedContext;
pub use custom_gradients::RoiGradientFunction;
pub use numerical_checker::{check_roi_gradient, loss_weights};
pub use ps_roi::{ps_roi_align, ps_roi_pool, PsRoiAlignFunction, PsRoiPoolFunction};
