//! Position-sensitive RoI pooling and alignment on CPU
//!
//! Forward and backward kernels for the PS-RoI Pool and PS-RoI Align operators
//! used by R-FCN style detection heads, together with the tensor, error,
//! configuration and gradient-checking types they are built on.
//!
//! ```rust
//! use psroi_core::{ps_roi_pool_forward, Tensor};
//!
//! let input = Tensor::<f32>::full(&[1, 4, 4, 4], 1.0);
//! let rois = Tensor::from_vec(vec![0.0, 0.0, 0.0, 4.0, 4.0], &[1, 5]).unwrap();
//! let (output, mapping) = ps_roi_pool_forward(&input, &rois, 1.0, 2, 2).unwrap();
//! assert_eq!(output.shape().dims(), &[1, 1, 2, 2]);
//! assert_eq!(mapping.as_slice().unwrap(), &[0, 1, 2, 3]);
//! ```

#![allow(clippy::result_large_err)]

pub mod config;
pub mod error;
pub mod kernel;
pub mod numerical_gradient;
pub mod ops;
pub mod shape;
pub mod tensor;

pub use config::{
    OutputSize, PsRoiAlignConfig, PsRoiPoolConfig, ADAPTIVE_SAMPLING, DEFAULT_SPATIAL_SCALE,
};
pub use error::{ErrorContext, Result, TensorError};
pub use kernel::{init_kernel_handle, kernel_handle, KernelConfig, KernelHandle};
pub use numerical_gradient::{
    check_gradients, quick_check_gradients, GradientCheckConfig, GradientCheckResult,
    NumericalGradientChecker,
};
pub use ops::{
    convert_boxes_to_roi_format, ps_roi_align_backward, ps_roi_align_forward,
    ps_roi_pool_backward, ps_roi_pool_forward, RoiInput,
};
pub use shape::Shape;
pub use tensor::Tensor;
