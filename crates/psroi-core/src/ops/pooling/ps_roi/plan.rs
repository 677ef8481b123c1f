//! Argument validation shared by the PS-RoI kernels.
//!
//! Every check happens here, before any output is allocated, so a kernel call
//! either fails without side effects or runs to completion.

use super::geometry::{normalize_regions, output_channels, ScaledRegion};
use crate::config::{validate_spatial_scale, OutputSize};
use crate::error::ErrorContext;
use crate::{Result, Tensor, TensorError};
use scirs2_core::numeric::Float;

/// `[N, C, H, W]` extents of a feature map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FeatureDims {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl FeatureDims {
    pub fn plane_size(&self) -> usize {
        self.height * self.width
    }

    pub fn num_planes(&self) -> usize {
        self.batch * self.channels
    }

    pub fn dims(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }
}

/// Validated inputs of a forward pass
pub(crate) struct ForwardPlan<'a, T> {
    pub input: &'a [T],
    pub dims: FeatureDims,
    pub output_size: OutputSize,
    pub output_channels: usize,
    pub regions: Vec<ScaledRegion>,
}

impl<T> ForwardPlan<'_, T> {
    /// Output elements per region: `C_out * PH * PW`
    pub fn region_len(&self) -> usize {
        self.output_channels * self.output_size.bins()
    }

    pub fn output_dims(&self) -> [usize; 4] {
        [
            self.regions.len(),
            self.output_channels,
            self.output_size.height,
            self.output_size.width,
        ]
    }

    /// Input plane `(batch, channel)` as a flat `H * W` slice
    pub fn plane(&self, batch: usize, channel: usize) -> &[T] {
        let size = self.dims.plane_size();
        let start = (batch * self.dims.channels + channel) * size;
        &self.input[start..start + size]
    }
}

/// Validated inputs of a backward pass
pub(crate) struct BackwardPlan<'a, T> {
    pub grad_output: &'a [T],
    pub channel_mapping: &'a [usize],
    pub dims: FeatureDims,
    pub output_size: OutputSize,
    pub output_channels: usize,
    pub regions: Vec<ScaledRegion>,
}

impl<T> BackwardPlan<'_, T> {
    pub fn region_len(&self) -> usize {
        self.output_channels * self.output_size.bins()
    }

    /// Decompose a flat output index into `(region, ph, pw)`
    pub fn locate(&self, element: usize) -> (usize, usize, usize) {
        let region = element / self.region_len();
        let bin = element % self.output_size.bins();
        (region, bin / self.output_size.width, bin % self.output_size.width)
    }

    /// Destination plane of every output element, read from the saved mapping
    pub fn target_planes(&self) -> Vec<usize> {
        let region_len = self.region_len();
        self.channel_mapping
            .iter()
            .enumerate()
            .map(|(element, &channel)| {
                self.regions[element / region_len].batch_index * self.dims.channels + channel
            })
            .collect()
    }
}

pub(crate) fn prepare_forward<'a, T: Float>(
    operation: &str,
    input: &'a Tensor<T>,
    rois: &Tensor<T>,
    spatial_scale: f32,
    output_size: OutputSize,
) -> Result<ForwardPlan<'a, T>> {
    let attach = |err: TensorError| {
        err.with_context(
            ErrorContext::new()
                .with_input_shape(input.shape().dims())
                .with_input_shape(rois.shape().dims())
                .with_metadata("pooled_size", output_size.to_string())
                .with_metadata("spatial_scale", spatial_scale.to_string()),
        )
    };

    output_size.validate(operation).map_err(attach)?;
    validate_spatial_scale(operation, spatial_scale).map_err(attach)?;

    let [batch, channels, height, width] = input.shape().as_nchw().ok_or_else(|| {
        attach(TensorError::invalid_shape(
            operation,
            "input must be 4-D [N, C, H, W]",
            input.shape().dims(),
        ))
    })?;
    let output_channels = output_channels(operation, channels, output_size).map_err(attach)?;
    let regions = normalize_regions(operation, rois, spatial_scale, batch).map_err(attach)?;
    let data = input.as_slice().ok_or_else(|| {
        attach(TensorError::invalid_argument_op(
            operation,
            "input tensor is not contiguous",
        ))
    })?;

    Ok(ForwardPlan {
        input: data,
        dims: FeatureDims {
            batch,
            channels,
            height,
            width,
        },
        output_size,
        output_channels,
        regions,
    })
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn prepare_backward<'a, T: Float>(
    operation: &str,
    grad_output: &'a Tensor<T>,
    rois: &Tensor<T>,
    channel_mapping: &'a Tensor<usize>,
    spatial_scale: f32,
    output_size: OutputSize,
    input_dims: [usize; 4],
) -> Result<BackwardPlan<'a, T>> {
    let attach = |err: TensorError| {
        err.with_context(
            ErrorContext::new()
                .with_input_shape(grad_output.shape().dims())
                .with_input_shape(rois.shape().dims())
                .with_input_shape(channel_mapping.shape().dims())
                .with_output_shape(&input_dims)
                .with_metadata("pooled_size", output_size.to_string())
                .with_metadata("spatial_scale", spatial_scale.to_string()),
        )
    };

    output_size.validate(operation).map_err(attach)?;
    validate_spatial_scale(operation, spatial_scale).map_err(attach)?;

    let [batch, channels, height, width] = input_dims;
    let output_channels = output_channels(operation, channels, output_size).map_err(attach)?;
    let regions = normalize_regions(operation, rois, spatial_scale, batch).map_err(attach)?;

    let expected = [
        regions.len(),
        output_channels,
        output_size.height,
        output_size.width,
    ];
    for (name, got) in [
        ("grad_output", grad_output.shape().dims()),
        ("channel_mapping", channel_mapping.shape().dims()),
    ] {
        if got != expected.as_slice() {
            return Err(attach(TensorError::shape_mismatch(
                operation,
                &format!("{name} of shape {expected:?}"),
                &format!("{got:?}"),
            )));
        }
    }

    let grad_data = grad_output.as_slice().ok_or_else(|| {
        attach(TensorError::invalid_argument_op(
            operation,
            "grad_output tensor is not contiguous",
        ))
    })?;
    let mapping_data = channel_mapping.as_slice().ok_or_else(|| {
        attach(TensorError::invalid_argument_op(
            operation,
            "channel_mapping tensor is not contiguous",
        ))
    })?;
    if let Some(bad) = mapping_data.iter().find(|&&c| c >= channels) {
        return Err(attach(TensorError::invalid_argument_op(
            operation,
            &format!("channel_mapping value {bad} out of range for {channels} input channels"),
        )));
    }

    Ok(BackwardPlan {
        grad_output: grad_data,
        channel_mapping: mapping_data,
        dims: FeatureDims {
            batch,
            channels,
            height,
            width,
        },
        output_size,
        output_channels,
        regions,
    })
}
