//! Operator configuration
//!
//! Immutable parameters of the two PS-RoI operators. These are the only values
//! besides the tensors themselves that the forward and backward passes need.

use crate::{Result, TensorError};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Default mapping from image coordinates to feature-map coordinates
pub const DEFAULT_SPATIAL_SCALE: f32 = 1.0;
/// Default sampling ratio; any value `<= 0` selects the adaptive grid
pub const ADAPTIVE_SAMPLING: i32 = -1;

/// Pooled output size as `(height, width)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct OutputSize {
    pub height: usize,
    pub width: usize,
}

impl OutputSize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    /// Number of bins per region, i.e. the input channel group size
    pub fn bins(&self) -> usize {
        self.height * self.width
    }

    pub fn validate(&self, operation: &str) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            return Err(TensorError::invalid_argument_op(
                operation,
                &format!(
                    "pooled size must be positive, got ({}, {})",
                    self.height, self.width
                ),
            ));
        }
        Ok(())
    }
}

impl From<usize> for OutputSize {
    fn from(size: usize) -> Self {
        Self::square(size)
    }
}

impl From<(usize, usize)> for OutputSize {
    fn from((height, width): (usize, usize)) -> Self {
        Self::new(height, width)
    }
}

impl std::fmt::Display for OutputSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.height, self.width)
    }
}

pub(crate) fn validate_spatial_scale(operation: &str, spatial_scale: f32) -> Result<()> {
    if !spatial_scale.is_finite() || spatial_scale <= 0.0 {
        return Err(TensorError::invalid_argument_op(
            operation,
            &format!("spatial_scale must be positive and finite, got {spatial_scale}"),
        ));
    }
    Ok(())
}

/// Configuration of a PS-RoI Pool operator
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PsRoiPoolConfig {
    pub output_size: OutputSize,
    pub spatial_scale: f32,
}

impl PsRoiPoolConfig {
    pub fn new(output_size: impl Into<OutputSize>, spatial_scale: f32) -> Self {
        Self {
            output_size: output_size.into(),
            spatial_scale,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.output_size.validate("ps_roi_pool")?;
        validate_spatial_scale("ps_roi_pool", self.spatial_scale)
    }
}

/// Configuration of a PS-RoI Align operator
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PsRoiAlignConfig {
    pub output_size: OutputSize,
    pub spatial_scale: f32,
    pub sampling_ratio: i32,
}

impl PsRoiAlignConfig {
    pub fn new(
        output_size: impl Into<OutputSize>,
        spatial_scale: f32,
        sampling_ratio: i32,
    ) -> Self {
        Self {
            output_size: output_size.into(),
            spatial_scale,
            sampling_ratio,
        }
    }

    /// Adaptive sampling grid (`sampling_ratio = -1`)
    pub fn adaptive(output_size: impl Into<OutputSize>, spatial_scale: f32) -> Self {
        Self::new(output_size, spatial_scale, ADAPTIVE_SAMPLING)
    }

    pub fn validate(&self) -> Result<()> {
        self.output_size.validate("ps_roi_align")?;
        validate_spatial_scale("ps_roi_align", self.spatial_scale)
    }
}
