//! PS-RoI Align
//!
//! Like PS-RoI Pool, but the region keeps its fractional corners and every bin
//! is the mean of bilinearly interpolated samples taken on a regular grid.

use super::geometry::{bilinear_taps, bin_sample_points, input_channel, SamplingGrid};
use super::parallel::{forward_by_region, scatter_by_plane};
use super::plan::{prepare_backward, prepare_forward};
use super::to_scalar;
use crate::config::OutputSize;
use crate::kernel::kernel_handle;
use crate::{Result, Tensor};
use scirs2_core::numeric::{Float, FromPrimitive};

/// Position-sensitive RoI align forward pass.
///
/// `sampling_ratio > 0` fixes a `sampling_ratio x sampling_ratio` grid per bin;
/// any other value picks `ceil(bin_h) x ceil(bin_w)` per region.
///
/// Returns the aligned output `[K, C / (pooled_height * pooled_width), pooled_height, pooled_width]`
/// and the channel mapping of the same shape.
pub fn ps_roi_align_forward<T>(
    input: &Tensor<T>,
    rois: &Tensor<T>,
    spatial_scale: f32,
    pooled_height: usize,
    pooled_width: usize,
    sampling_ratio: i32,
) -> Result<(Tensor<T>, Tensor<usize>)>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    const OP: &str = "ps_roi_align_forward";
    let output_size = OutputSize::new(pooled_height, pooled_width);
    let plan = prepare_forward(OP, input, rois, spatial_scale, output_size)?;
    tracing::debug!(
        input = %input.shape(),
        num_rois = plan.regions.len(),
        pooled = %output_size,
        spatial_scale,
        sampling_ratio,
        "ps_roi_align forward"
    );

    let dims = plan.dims;
    let (output, mapping) = forward_by_region(
        kernel_handle(),
        plan.regions.len(),
        plan.region_len(),
        |k, out, map| {
            let region = &plan.regions[k];
            let grid = SamplingGrid::for_region(sampling_ratio, region, output_size);
            let count = grid.count() as f64;

            for c in 0..plan.output_channels {
                for ph in 0..output_size.height {
                    for pw in 0..output_size.width {
                        let local = (c * output_size.height + ph) * output_size.width + pw;
                        let channel = input_channel(c, ph, pw, output_size);
                        map[local] = channel;

                        let plane = plan.plane(region.batch_index, channel);
                        let sum: f64 = bin_sample_points(region, ph, pw, output_size, grid)
                            .flat_map(|(y, x)| bilinear_taps(y, x, dims.height, dims.width))
                            .map(|tap| {
                                tap.weight * plane[tap.offset(dims.width)].to_f64().unwrap_or(0.0)
                            })
                            .sum();
                        out[local] = to_scalar(sum / count);
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

/// Position-sensitive RoI align backward pass.
///
/// Replays the forward sample grid and hands each sample's share of the
/// incoming gradient to its in-bounds bilinear neighbours.
#[allow(clippy::too_many_arguments)]
pub fn ps_roi_align_backward<T>(
    grad_output: &Tensor<T>,
    rois: &Tensor<T>,
    channel_mapping: &Tensor<usize>,
    spatial_scale: f32,
    pooled_height: usize,
    pooled_width: usize,
    sampling_ratio: i32,
    batch_size: usize,
    channels: usize,
    height: usize,
    width: usize,
) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive + Send + Sync + 'static,
{
    const OP: &str = "ps_roi_align_backward";
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
        sampling_ratio,
        "ps_roi_align backward"
    );

    let dims = plan.dims;
    let grids: Vec<SamplingGrid> = plan
        .regions
        .iter()
        .map(|region| SamplingGrid::for_region(sampling_ratio, region, output_size))
        .collect();
    let targets = plan.target_planes();

    let grad_input = scatter_by_plane(
        kernel_handle(),
        dims.num_planes(),
        dims.plane_size(),
        &targets,
        |element, plane: &mut [T]| {
            let (k, ph, pw) = plan.locate(element);
            let grid = grids[k];
            let share =
                plan.grad_output[element].to_f64().unwrap_or(0.0) / grid.count() as f64;
            for (y, x) in bin_sample_points(&plan.regions[k], ph, pw, output_size, grid) {
                for tap in bilinear_taps(y, x, dims.height, dims.width) {
                    let offset = tap.offset(dims.width);
                    plane[offset] = plane[offset] + to_scalar::<T>(share * tap.weight);
                }
            }
        },
    );

    Tensor::from_vec(grad_input, &dims.dims())
}
