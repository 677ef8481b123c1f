use psroi_autograd::{PsRoiAlignFunction, PsRoiPoolFunction, RoiGradientFunction, SavedContext};
use psroi_core::{
    OutputSize, PsRoiAlignConfig, PsRoiPoolConfig, Result, RoiInput, Tensor,
    ADAPTIVE_SAMPLING, DEFAULT_SPATIAL_SCALE,
};
use scirs2_core::numeric::{Float, FromPrimitive};
use std::fmt;

/// Position-Sensitive ROI Pooling Layer
/// Used in R-FCN detection heads; every output bin averages its own channel group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PSROIPool2D {
    config: PsRoiPoolConfig,
}

impl PSROIPool2D {
    pub fn new(output_size: impl Into<OutputSize>, spatial_scale: f32) -> Self {
        Self {
            config: PsRoiPoolConfig::new(output_size, spatial_scale),
        }
    }

    /// Square pooled size constructor
    pub fn square(size: usize, spatial_scale: f32) -> Self {
        Self::new(size, spatial_scale)
    }

    pub fn output_size(&self) -> OutputSize {
        self.config.output_size
    }

    pub fn spatial_scale(&self) -> f32 {
        self.config.spatial_scale
    }

    fn function(&self) -> Result<PsRoiPoolFunction> {
        PsRoiPoolFunction::new(self.config)
    }

    pub fn forward<'a, T, R>(&self, feature_maps: &Tensor<T>, rois: R) -> Result<Tensor<T>>
    where
        T: Float + FromPrimitive + Send + Sync + 'static,
        R: Into<RoiInput<'a, T>>,
    {
        self.forward_with_context(feature_maps, rois)
            .map(|(output, _)| output)
    }

    /// Forward pass that also returns the context needed by [`backward`](Self::backward)
    pub fn forward_with_context<'a, T, R>(
        &self,
        feature_maps: &Tensor<T>,
        rois: R,
    ) -> Result<(Tensor<T>, SavedContext<T>)>
    where
        T: Float + FromPrimitive + Send + Sync + 'static,
        R: Into<RoiInput<'a, T>>,
    {
        let rois = rois.into().to_rois()?;
        self.function()?.forward(feature_maps, &*rois)
    }

    pub fn backward<T>(&self, grad_output: &Tensor<T>, ctx: &SavedContext<T>) -> Result<Tensor<T>>
    where
        T: Float + FromPrimitive + Send + Sync + 'static,
    {
        self.function()?.backward(grad_output, ctx)
    }
}

impl Default for PSROIPool2D {
    fn default() -> Self {
        Self::square(7, DEFAULT_SPATIAL_SCALE)
    }
}

impl fmt::Display for PSROIPool2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PSROIPool2D(output_size={}, spatial_scale={:?})",
            self.config.output_size, self.config.spatial_scale
        )
    }
}

/// Position-Sensitive ROI Align Layer
/// Bilinear sampling instead of pixel snapping for better localisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PSROIAlign2D {
    config: PsRoiAlignConfig,
}

impl PSROIAlign2D {
    pub fn new(
        output_size: impl Into<OutputSize>,
        spatial_scale: f32,
        sampling_ratio: i32,
    ) -> Self {
        Self {
            config: PsRoiAlignConfig::new(output_size, spatial_scale, sampling_ratio),
        }
    }

    /// Square pooled size constructor
    pub fn square(size: usize, spatial_scale: f32, sampling_ratio: i32) -> Self {
        Self::new(size, spatial_scale, sampling_ratio)
    }

    /// Auto sampling ratio constructor (sampling_ratio = -1 means adaptive)
    pub fn auto_sampling(output_size: impl Into<OutputSize>, spatial_scale: f32) -> Self {
        Self::new(output_size, spatial_scale, ADAPTIVE_SAMPLING)
    }

    pub fn output_size(&self) -> OutputSize {
        self.config.output_size
    }

    pub fn spatial_scale(&self) -> f32 {
        self.config.spatial_scale
    }

    pub fn sampling_ratio(&self) -> i32 {
        self.config.sampling_ratio
    }

    fn function(&self) -> Result<PsRoiAlignFunction> {
        PsRoiAlignFunction::new(self.config)
    }

    pub fn forward<'a, T, R>(&self, feature_maps: &Tensor<T>, rois: R) -> Result<Tensor<T>>
    where
        T: Float + FromPrimitive + Send + Sync + 'static,
        R: Into<RoiInput<'a, T>>,
    {
        self.forward_with_context(feature_maps, rois)
            .map(|(output, _)| output)
    }

    /// Forward pass that also returns the context needed by [`backward`](Self::backward)
    pub fn forward_with_context<'a, T, R>(
        &self,
        feature_maps: &Tensor<T>,
        rois: R,
    ) -> Result<(Tensor<T>, SavedContext<T>)>
    where
        T: Float + FromPrimitive + Send + Sync + 'static,
        R: Into<RoiInput<'a, T>>,
    {
        let rois = rois.into().to_rois()?;
        self.function()?.forward(feature_maps, &*rois)
    }

    pub fn backward<T>(&self, grad_output: &Tensor<T>, ctx: &SavedContext<T>) -> Result<Tensor<T>>
    where
        T: Float + FromPrimitive + Send + Sync + 'static,
    {
        self.function()?.backward(grad_output, ctx)
    }
}

impl Default for PSROIAlign2D {
    fn default() -> Self {
        Self::auto_sampling(7, DEFAULT_SPATIAL_SCALE)
    }
}

impl fmt::Display for PSROIAlign2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PSROIAlign2D(output_size={}, spatial_scale={:?}, sampling_ratio={})",
            self.config.output_size, self.config.spatial_scale, self.config.sampling_ratio
        )
    }
}
