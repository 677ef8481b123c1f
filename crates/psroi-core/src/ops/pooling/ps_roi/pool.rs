//! PS-RoI Pool (R-FCN)
//!
//! Each output bin is the average of the input pixels covered by the bin,
//! read from the input channel assigned to that bin's position.

use super::geometry::{input_channel, pool_window};
use super::parallel::{forward_by_region, scatter_by_plane};
use super::plan::{prepare_backward, prepare_forward};
use super::to_scalar;
use crate::config::OutputSize;
use crate::kernel::kernel_handle;
use crate::{Result, Tensor};
use scirs2_core::numeric::{Float, FromPrimitive};

/// Position-sensitive RoI pooling forward pass.
///
/// * `input` - feature map `[N, C, H, W]`, `C` divisible by `pooled_height * pooled_width`
/// * `rois` - regions `[K, 5]` as `(batch_index, x1, y1, x2, y2)` in image coordinates
/// * `spatial_scale` - factor mapping image coordinates onto the feature map
///
/// Returns the pooled output `[K, C / (pooled_height * pooled_width), pooled_height, pooled_width]`
/// and the channel mapping of the same shape, which [`ps_roi_pool_backward`] needs.
pub fn ps_roi_pool_forward<T>(
    input: &Tensor<T>,
    rois: &Tensor<T>,
    spatial_scale: f32,
    pooled_height: usize,
    pooled_width: usize,
) -> Result<(Tensor<T>, Tensor<usize>)>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    const OP: &str = "ps_roi_pool_forward";
    let output_size = OutputSize::new(pooled_height, pooled_width);
    let plan = prepare_forward(OP, input, rois, spatial_scale, output_size)?;
    tracing::debug!(
        input = %input.shape(),
        num_rois = plan.regions.len(),
        pooled = %output_size,
        spatial_scale,
        "ps_roi_pool forward"
    );

    let regions = &plan.regions;
    let dims = plan.dims;

    let (output, mapping) = forward_by_region(
        kernel_handle(),
        regions.len(),
        plan.region_len(),
        |k, out, map| {
            let region = &regions[k];
            for c in 0..plan.output_channels {
                for ph in 0..output_size.height {
                    for pw in 0..output_size.width {
                        let local = (c * output_size.height + ph) * output_size.width + pw;
                        let channel = input_channel(c, ph, pw, output_size);
                        map[local] = channel;

                        let window =
                            pool_window(region, ph, pw, output_size, dims.height, dims.width);
                        if window.is_empty() {
                            out[local] = T::zero();
                            continue;
                        }

                        let plane = plan.plane(region.batch_index, channel);
                        let sum = window
                            .offsets(dims.width)
                            .fold(T::zero(), |acc, offset| acc + plane[offset]);
                        out[local] = sum / to_scalar::<T>(window.area() as f64);
                    }
                }
            }
        },
    );

    let output_dims = plan.output_dims();
    Ok((
        Tensor::from_vec(output, &output_dims)?,
        Tensor::from_vec(mapping, &output_dims)?,
    ))
}

/// Position-sensitive RoI pooling backward pass.
///
/// Replays the forward windows and spreads each incoming gradient evenly over
/// the pixels of its bin, into the input channel recorded in `channel_mapping`.
/// Contributions from overlapping regions are summed.
///
/// Returns the input gradient of shape `[batch_size, channels, height, width]`.
#[allow(clippy::too_many_arguments)]
pub fn ps_roi_pool_backward<T>(
    grad_output: &Tensor<T>,
    rois: &Tensor<T>,
    channel_mapping: &Tensor<usize>,
    spatial_scale: f32,
    pooled_height: usize,
    pooled_width: usize,
    batch_size: usize,
    channels: usize,
    height: usize,
    width: usize,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    const OP: &str = "ps_roi_pool_backward";
    let output_size = OutputSize::new(pooled_height, pooled_width);
    let plan = prepare_backward(
        OP,
        grad_output,
        rois,
        channel_mapping,
        spatial_scale,
        output_size,
        [batch_size, channels, height, width],
    )?;
    tracing::debug!(
        grad_output = %grad_output.shape(),
        input = ?plan.dims.dims(),
        pooled = %output_size,
        spatial_scale,
        "ps_roi_pool backward"
    );

    let regions = &plan.regions;
    let dims = plan.dims;
    let targets = plan.target_planes();

    let grad_input = scatter_by_plane(
        kernel_handle(),
        dims.num_planes(),
        dims.plane_size(),
        &targets,
        |element, plane: &mut [T]| {
            let (k, ph, pw) = plan.locate(element);
            let window = pool_window(&regions[k], ph, pw, output_size, dims.height, dims.width);
            if window.is_empty() {
                return;
            }
            let share = plan.grad_output[element] / to_scalar::<T>(window.area() as f64);
            for offset in window.offsets(dims.width) {
                plane[offset] = plane[offset] + share;
            }
        },
    );

    Tensor::from_vec(grad_input, &dims.dims())
}
