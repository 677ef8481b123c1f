//! Tensor Module
//!
//! A dense, CPU-resident, row-major tensor used to carry feature maps,
//! region lists, channel mappings and gradients in and out of the kernels.
//!
//! - **core**: tensor structure and property accessors
//! - **creation**: constructors

pub mod core;
pub mod creation;

pub use self::core::Tensor;
