//! Differentiable PS-RoI Pool and PS-RoI Align

use crate::context::SavedContext;
use crate::custom_gradients::RoiGradientFunction;
use psroi_core::{
    ps_roi_align_backward, ps_roi_align_forward, ps_roi_pool_backward, ps_roi_pool_forward,
    OutputSize, PsRoiAlignConfig, PsRoiPoolConfig, Result, RoiInput, Tensor,
};
use scirs2_core::numeric::{Float, FromPrimitive};

/// PS-RoI Pool as a [`RoiGradientFunction`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsRoiPoolFunction {
    config: PsRoiPoolConfig,
}

impl PsRoiPoolFunction {
    pub fn new(config: PsRoiPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PsRoiPoolConfig {
        &self.config
    }
}

impl<T> RoiGradientFunction<T> for PsRoiPoolFunction
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    fn forward(
        &self,
        input: &Tensor<T>,
        rois: &Tensor<T>,
    ) -> Result<(Tensor<T>, SavedContext<T>)> {
        let OutputSize { height, width } = self.config.output_size;
        let (output, mapping) =
            ps_roi_pool_forward(input, rois, self.config.spatial_scale, height, width)?;
        let ctx = SavedContext::new(rois.clone(), mapping, input.shape())?;
        Ok((output, ctx))
    }

    fn backward(&self, grad_output: &Tensor<T>, ctx: &SavedContext<T>) -> Result<Tensor<T>> {
        let OutputSize { height, width } = self.config.output_size;
        let [batch, channels, in_h, in_w] = ctx.input_shape();
        ps_roi_pool_backward(
            grad_output,
            ctx.rois(),
            ctx.channel_mapping(),
            self.config.spatial_scale,
            height,
            width,
            batch,
            channels,
            in_h,
            in_w,
        )
    }

    fn name(&self) -> &str {
        "PsRoiPool"
    }
}

/// PS-RoI Align as a [`RoiGradientFunction`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsRoiAlignFunction {
    config: PsRoiAlignConfig,
}

impl PsRoiAlignFunction {
    pub fn new(config: PsRoiAlignConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PsRoiAlignConfig {
        &self.config
    }
}

impl<T> RoiGradientFunction<T> for PsRoiAlignFunction
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    fn forward(
        &self,
        input: &Tensor<T>,
        rois: &Tensor<T>,
    ) -> Result<(Tensor<T>, SavedContext<T>)> {
        let OutputSize { height, width } = self.config.output_size;
        let (output, mapping) = ps_roi_align_forward(
            input,
            rois,
            self.config.spatial_scale,
            height,
            width,
            self.config.sampling_ratio,
        )?;
        let ctx = SavedContext::new(rois.clone(), mapping, input.shape())?;
        Ok((output, ctx))
    }

    fn backward(&self, grad_output: &Tensor<T>, ctx: &SavedContext<T>) -> Result<Tensor<T>> {
        let OutputSize { height, width } = self.config.output_size;
        let [batch, channels, in_h, in_w] = ctx.input_shape();
        ps_roi_align_backward(
            grad_output,
            ctx.rois(),
            ctx.channel_mapping(),
            self.config.spatial_scale,
            height,
            width,
            self.config.sampling_ratio,
            batch,
            channels,
            in_h,
            in_w,
        )
    }

    fn name(&self) -> &str {
        "PsRoiAlign"
    }
}

/// Position-sensitive RoI pooling.
///
/// `rois` is either a packed `[K, 5]` tensor or a slice of per-image `[K_i, 4]`
/// box tensors. Returns the output only; use [`PsRoiPoolFunction`] when the
/// backward pass is needed.
pub fn ps_roi_pool<'a, T, R>(
    input: &Tensor<T>,
    rois: R,
    output_size: impl Into<OutputSize>,
    spatial_scale: f32,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
    R: Into<RoiInput<'a, T>>,
{
    let rois = rois.into().to_rois()?;
    let function = PsRoiPoolFunction::new(PsRoiPoolConfig::new(output_size, spatial_scale))?;
    let (output, _) = function.forward(input, &*rois)?;
    Ok(output)
}

/// Position-sensitive RoI align.
///
/// `sampling_ratio <= 0` selects the adaptive sampling grid.
pub fn ps_roi_align<'a, T, R>(
    input: &Tensor<T>,
    rois: R,
    output_size: impl Into<OutputSize>,
    spatial_scale: f32,
    sampling_ratio: i32,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
    R: Into<RoiInput<'a, T>>,
{
    let rois = rois.into().to_rois()?;
    let function = PsRoiAlignFunction::new(PsRoiAlignConfig::new(
        output_size,
        spatial_scale,
        sampling_ratio,
    ))?;
    let (output, _) = function.forward(input, &*rois)?;
    Ok(output)
}
