//! # PS-RoI Neural Network Layers
//!
//! Layer wrappers around the PS-RoI operators for R-FCN style detection heads.
//!
//! ```rust
//! use psroi_core::Tensor;
//! use psroi_neural::PSROIAlign2D;
//!
//! # fn main() -> psroi_core::Result<()> {
//! // 21 classes, 3x3 bins, stride-16 features
//! let layer = PSROIAlign2D::auto_sampling(3, 1.0 / 16.0);
//! let features = Tensor::<f32>::zeros(&[1, 21 * 9, 32, 32]);
//! let boxes = vec![Tensor::from_vec(vec![16.0, 16.0, 200.0, 160.0], &[1, 4])?];
//!
//! let scores = layer.forward(&features, &boxes)?;
//! assert_eq!(scores.shape().dims(), &[1, 21, 3, 3]);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

pub mod layers;

pub use layers::{PSROIAlign2D, PSROIPool2D};
