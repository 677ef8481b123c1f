//! Position-sensitive RoI operators (R-FCN)
//!
//! This module provides:
//! - PS-RoI Pool: mean over the integer pixel window of each bin
//! - PS-RoI Align: mean of bilinear samples on a regular grid inside each bin
//! - Backward passes for both, replaying the forward geometry
//! - Conversion of per-image box lists into the packed `[K, 5]` region format
//!
//! Output channel `c` at bin `(ph, pw)` always reads input channel
//! `(c * pooled_height + ph) * pooled_width + pw`; the forward passes return
//! that mapping so the backward passes can route gradients without recomputing it.

pub mod align;
pub mod boxes;
pub mod geometry;
mod parallel;
mod plan;
pub mod pool;

pub use align::{ps_roi_align_backward, ps_roi_align_forward};
pub use boxes::{convert_boxes_to_roi_format, RoiInput};
pub use geometry::{MIN_REGION_SIZE, ROI_ROW_LEN};
pub use pool::{ps_roi_pool_backward, ps_roi_pool_forward};

use scirs2_core::numeric::{Float, FromPrimitive};

/// Convert an `f64` accumulator back to the element type
#[inline]
pub(crate) fn to_scalar<T: Float + FromPrimitive>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}
