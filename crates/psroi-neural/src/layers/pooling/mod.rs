//! Pooling layers for region-based detection heads

pub mod ps_roi;

pub use ps_roi::{PSROIAlign2D, PSROIPool2D};
