//! Region, bin and sample geometry shared by PS-RoI Pool and PS-RoI Align.
//!
//! Everything here is computed in `f64` regardless of the tensor element type,
//! so the forward pass and the replayed backward pass always derive identical
//! windows and sample points.

use crate::config::OutputSize;
use crate::{Result, Tensor, TensorError};
use scirs2_core::numeric::Float;

/// Minimum width/height of a region in feature-map units
pub const MIN_REGION_SIZE: f64 = 1.0;

/// Number of values per row of a region list: `(batch_index, x1, y1, x2, y2)`
pub const ROI_ROW_LEN: usize = 5;

/// A region mapped into feature-map coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledRegion {
    pub batch_index: usize,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl ScaledRegion {
    /// Width clamped to [`MIN_REGION_SIZE`]
    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(MIN_REGION_SIZE)
    }

    /// Height clamped to [`MIN_REGION_SIZE`]
    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(MIN_REGION_SIZE)
    }

    /// `(bin_height, bin_width)` for the given pooled size
    pub fn bin_size(&self, output_size: OutputSize) -> (f64, f64) {
        (
            self.height() / output_size.height as f64,
            self.width() / output_size.width as f64,
        )
    }
}

/// Map one `(batch_index, x1, y1, x2, y2)` row into feature-map space.
pub fn normalize_region<T: Float>(
    operation: &str,
    roi_index: usize,
    row: &[T],
    spatial_scale: f32,
    batch_size: usize,
) -> Result<ScaledRegion> {
    if row.len() != ROI_ROW_LEN {
        return Err(TensorError::invalid_shape(
            operation,
            "each roi must have 5 values (batch_index, x1, y1, x2, y2)",
            &[row.len()],
        ));
    }

    let raw_batch = row[0].to_f64().unwrap_or(f64::NAN);
    if !raw_batch.is_finite()
        || raw_batch.fract() != 0.0
        || raw_batch < 0.0
        || raw_batch >= batch_size as f64
    {
        return Err(TensorError::invalid_batch_index(
            operation, roi_index, raw_batch, batch_size,
        ));
    }

    let mut coords = [0.0f64; 4];
    for (dst, src) in coords.iter_mut().zip(&row[1..]) {
        let value = src.to_f64().unwrap_or(f64::NAN);
        if !value.is_finite() {
            return Err(TensorError::invalid_argument_op(
                operation,
                &format!("roi {roi_index} has a non-finite coordinate"),
            ));
        }
        *dst = value * f64::from(spatial_scale);
    }

    Ok(ScaledRegion {
        batch_index: raw_batch as usize,
        x1: coords[0],
        y1: coords[1],
        x2: coords[2],
        y2: coords[3],
    })
}

/// Validate a `[K, 5]` region list and map every row into feature-map space.
pub fn normalize_regions<T: Float>(
    operation: &str,
    rois: &Tensor<T>,
    spatial_scale: f32,
    batch_size: usize,
) -> Result<Vec<ScaledRegion>> {
    let dims = rois.shape().dims();
    if dims.len() != 2 || dims[1] != ROI_ROW_LEN {
        return Err(TensorError::invalid_shape(
            operation,
            "rois must be [num_rois, 5]",
            dims,
        ));
    }
    let data = rois.as_slice().ok_or_else(|| {
        TensorError::invalid_argument_op(operation, "rois tensor is not contiguous")
    })?;

    data.chunks_exact(ROI_ROW_LEN)
        .enumerate()
        .map(|(k, row)| normalize_region(operation, k, row, spatial_scale, batch_size))
        .collect()
}

/// Number of output channels for `channels` input channels, which must split
/// evenly into one group per pooled bin.
pub fn output_channels(operation: &str, channels: usize, output_size: OutputSize) -> Result<usize> {
    let bins = output_size.bins();
    if bins == 0 || channels % bins != 0 {
        return Err(TensorError::shape_mismatch(
            operation,
            &format!(
                "input channels divisible by pooled_height * pooled_width = {bins}"
            ),
            &format!("{channels} channels"),
        ));
    }
    Ok(channels / bins)
}

/// Input channel read by output channel `c` at bin `(ph, pw)`.
#[inline]
pub fn input_channel(c: usize, ph: usize, pw: usize, output_size: OutputSize) -> usize {
    (c * output_size.height + ph) * output_size.width + pw
}

/// Half-open integer pixel window `[h_start, h_end) x [w_start, w_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub h_start: usize,
    pub h_end: usize,
    pub w_start: usize,
    pub w_end: usize,
}

impl PixelWindow {
    pub fn is_empty(&self) -> bool {
        self.h_end <= self.h_start || self.w_end <= self.w_start
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.h_end - self.h_start) * (self.w_end - self.w_start)
        }
    }

    /// Flat `y * width + x` offsets of every covered pixel, row-major
    pub fn offsets(&self, width: usize) -> impl Iterator<Item = usize> + '_ {
        let (w_start, w_end) = (self.w_start, self.w_end);
        (self.h_start..self.h_end)
            .flat_map(move |y| (w_start..w_end).map(move |x| y * width + x))
    }
}

fn clamp_to_extent(value: f64, extent: usize) -> usize {
    if value <= 0.0 {
        0
    } else if value >= extent as f64 {
        extent
    } else {
        value as usize
    }
}

/// Pixel window of bin `(ph, pw)`: floor the start, ceil the end, clamp to the map.
pub fn pool_window(
    region: &ScaledRegion,
    ph: usize,
    pw: usize,
    output_size: OutputSize,
    height: usize,
    width: usize,
) -> PixelWindow {
    let (bin_h, bin_w) = region.bin_size(output_size);
    PixelWindow {
        h_start: clamp_to_extent((region.y1 + ph as f64 * bin_h).floor(), height),
        h_end: clamp_to_extent((region.y1 + (ph + 1) as f64 * bin_h).ceil(), height),
        w_start: clamp_to_extent((region.x1 + pw as f64 * bin_w).floor(), width),
        w_end: clamp_to_extent((region.x1 + (pw + 1) as f64 * bin_w).ceil(), width),
    }
}

/// Sampling grid used by PS-RoI Align inside one bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingGrid {
    pub grid_h: usize,
    pub grid_w: usize,
}

impl SamplingGrid {
    /// `sampling_ratio x sampling_ratio` when positive, otherwise
    /// `ceil(bin_h) x ceil(bin_w)`, never smaller than 1x1.
    pub fn new(sampling_ratio: i32, bin_h: f64, bin_w: f64) -> Self {
        let adaptive = |extent: f64| (extent.ceil() as usize).max(1);
        if sampling_ratio > 0 {
            Self {
                grid_h: sampling_ratio as usize,
                grid_w: sampling_ratio as usize,
            }
        } else {
            Self {
                grid_h: adaptive(bin_h),
                grid_w: adaptive(bin_w),
            }
        }
    }

    pub fn for_region(sampling_ratio: i32, region: &ScaledRegion, output_size: OutputSize) -> Self {
        let (bin_h, bin_w) = region.bin_size(output_size);
        Self::new(sampling_ratio, bin_h, bin_w)
    }

    pub fn count(&self) -> usize {
        self.grid_h * self.grid_w
    }
}

/// Sample points `(y, x)` of bin `(ph, pw)`, centred in each grid cell
pub fn bin_sample_points(
    region: &ScaledRegion,
    ph: usize,
    pw: usize,
    output_size: OutputSize,
    grid: SamplingGrid,
) -> impl Iterator<Item = (f64, f64)> {
    let (bin_h, bin_w) = region.bin_size(output_size);
    let y0 = region.y1 + ph as f64 * bin_h;
    let x0 = region.x1 + pw as f64 * bin_w;
    let step_h = bin_h / grid.grid_h as f64;
    let step_w = bin_w / grid.grid_w as f64;

    (0..grid.grid_h).flat_map(move |iy| {
        let y = y0 + (iy as f64 + 0.5) * step_h;
        (0..grid.grid_w).map(move |ix| (y, x0 + (ix as f64 + 0.5) * step_w))
    })
}

/// One in-bounds neighbour of a bilinear sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearTap {
    pub y: usize,
    pub x: usize,
    pub weight: f64,
}

impl BilinearTap {
    pub fn offset(&self, width: usize) -> usize {
        self.y * width + self.x
    }
}

/// In-bounds neighbours of `(y, x)` with their bilinear weights.
///
/// Neighbours outside `[0, height) x [0, width)` are dropped, which is the same
/// as reading zero there: the remaining taps keep their ordinary weights.
pub fn bilinear_taps(
    y: f64,
    x: f64,
    height: usize,
    width: usize,
) -> impl Iterator<Item = BilinearTap> {
    let y_low = y.floor();
    let x_low = x.floor();
    let ly = y - y_low;
    let lx = x - x_low;
    let hy = 1.0 - ly;
    let hx = 1.0 - lx;

    let corners = [
        (y_low, x_low, hy * hx),
        (y_low, x_low + 1.0, hy * lx),
        (y_low + 1.0, x_low, ly * hx),
        (y_low + 1.0, x_low + 1.0, ly * lx),
    ];

    corners.into_iter().filter_map(move |(cy, cx, weight)| {
        let inside = cy >= 0.0 && cx >= 0.0 && cy < height as f64 && cx < width as f64;
        inside.then(|| BilinearTap {
            y: cy as usize,
            x: cx as usize,
            weight,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn region(x1: f64, y1: f64, x2: f64, y2: f64) -> ScaledRegion {
        ScaledRegion {
            batch_index: 0,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn test_normalize_region_scales_coordinates() {
        let r = normalize_region("test", 0, &[1.0f32, 8.0, 4.0, 16.0, 12.0], 0.25, 2).unwrap();
        assert_eq!(r.batch_index, 1);
        assert_eq!((r.x1, r.y1, r.x2, r.y2), (2.0, 1.0, 4.0, 3.0));
    }

    #[test]
    fn test_normalize_region_rejects_bad_batch() {
        assert!(normalize_region("test", 0, &[2.0f32, 0.0, 0.0, 1.0, 1.0], 1.0, 2).is_err());
        assert!(normalize_region("test", 0, &[-1.0f32, 0.0, 0.0, 1.0, 1.0], 1.0, 2).is_err());
        assert!(normalize_region("test", 0, &[0.5f32, 0.0, 0.0, 1.0, 1.0], 1.0, 2).is_err());
        assert!(normalize_region("test", 0, &[f32::NAN, 0.0, 0.0, 1.0, 1.0], 1.0, 2).is_err());
    }

    #[test]
    fn test_normalize_region_rejects_non_finite_coordinates() {
        let err = normalize_region("test", 4, &[0.0f64, 0.0, f64::INFINITY, 1.0, 1.0], 1.0, 1)
            .unwrap_err();
        assert!(matches!(err, TensorError::InvalidArgument { .. }));
    }

    #[test]
    fn test_degenerate_region_is_clamped() {
        let r = region(3.0, 3.0, 3.0, 3.0);
        assert_eq!(r.width(), MIN_REGION_SIZE);
        assert_eq!(r.height(), MIN_REGION_SIZE);
        let inverted = region(5.0, 5.0, 2.0, 2.0);
        assert_eq!(inverted.width(), MIN_REGION_SIZE);
    }

    #[test]
    fn test_pool_window_uses_fractional_corners() {
        // (0.5, 0.5)-(3.5, 3.5): floor 0.5 -> 0, ceil 3.5 -> 4
        let r = region(0.5, 0.5, 3.5, 3.5);
        let window = pool_window(&r, 0, 0, OutputSize::new(1, 1), 4, 4);
        assert_eq!(
            (window.h_start, window.h_end, window.w_start, window.w_end),
            (0, 4, 0, 4)
        );

        // a sub-pixel region still spans the pixels its clamped extent touches
        let thin = region(1.2, 1.4, 1.6, 1.4);
        let window = pool_window(&thin, 0, 0, OutputSize::new(1, 1), 4, 4);
        assert_eq!(
            (window.h_start, window.h_end, window.w_start, window.w_end),
            (1, 3, 1, 3)
        );
    }

    #[test]
    fn test_channel_mapping_is_position_sensitive() {
        let size = OutputSize::new(2, 3);
        let mut seen = Vec::new();
        for c in 0..2 {
            for ph in 0..2 {
                for pw in 0..3 {
                    seen.push(input_channel(c, ph, pw, size));
                }
            }
        }
        assert_eq!(seen, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_output_channels_requires_divisibility() {
        assert_eq!(output_channels("test", 18, OutputSize::new(3, 3)).unwrap(), 2);
        let err = output_channels("test", 10, OutputSize::new(3, 3)).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_pool_window_floor_ceil_and_clamp() {
        let r = region(0.0, 0.0, 5.0, 5.0);
        let size = OutputSize::new(2, 2);
        // bins are 2.5 wide: [0, 2.5) -> [0, 3), [2.5, 5) -> [2, 5)
        let first = pool_window(&r, 0, 0, size, 4, 4);
        assert_eq!((first.h_start, first.h_end), (0, 3));
        let last = pool_window(&r, 1, 1, size, 4, 4);
        assert_eq!((last.h_start, last.h_end, last.w_start, last.w_end), (2, 4, 2, 4));
        assert_eq!(last.area(), 4);
    }

    #[test]
    fn test_pool_window_outside_map_is_empty() {
        let r = region(10.0, 10.0, 12.0, 12.0);
        let window = pool_window(&r, 0, 0, OutputSize::new(2, 2), 4, 4);
        assert!(window.is_empty());
        assert_eq!(window.area(), 0);
        assert_eq!(window.offsets(4).count(), 0);
    }

    #[test]
    fn test_window_offsets() {
        let window = PixelWindow {
            h_start: 1,
            h_end: 3,
            w_start: 2,
            w_end: 4,
        };
        assert_eq!(window.offsets(5).collect::<Vec<_>>(), vec![7, 8, 12, 13]);
    }

    #[test]
    fn test_sampling_grid() {
        assert_eq!(SamplingGrid::new(2, 7.3, 0.2), SamplingGrid { grid_h: 2, grid_w: 2 });
        assert_eq!(SamplingGrid::new(-1, 2.5, 3.0), SamplingGrid { grid_h: 3, grid_w: 3 });
        assert_eq!(SamplingGrid::new(-1, 2.5, 1.5), SamplingGrid { grid_h: 3, grid_w: 2 });
        assert_eq!(SamplingGrid::new(0, 0.25, 0.5), SamplingGrid { grid_h: 1, grid_w: 1 });
    }

    #[test]
    fn test_sample_points_are_cell_centres() {
        let r = region(0.0, 0.0, 4.0, 4.0);
        let grid = SamplingGrid { grid_h: 2, grid_w: 2 };
        let points: Vec<_> = bin_sample_points(&r, 1, 0, OutputSize::new(2, 2), grid).collect();
        assert_eq!(points, vec![(2.5, 0.5), (2.5, 1.5), (3.5, 0.5), (3.5, 1.5)]);
    }

    #[test]
    fn test_bilinear_weights_sum_to_one_inside() {
        let taps: Vec<_> = bilinear_taps(1.25, 2.5, 4, 4).collect();
        assert_eq!(taps.len(), 4);
        let total: f64 = taps.iter().map(|t| t.weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        assert_relative_eq!(taps[0].weight, 0.75 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bilinear_out_of_bounds_neighbours_are_dropped() {
        // bottom-right corner: only (3, 3) is inside
        let taps: Vec<_> = bilinear_taps(3.5, 3.5, 4, 4).collect();
        assert_eq!(taps.len(), 1);
        assert_eq!((taps[0].y, taps[0].x), (3, 3));
        assert_relative_eq!(taps[0].weight, 0.25, epsilon = 1e-12);

        // above the map: the lower row survives with its ordinary weight
        let taps: Vec<_> = bilinear_taps(-0.25, 1.0, 4, 4).collect();
        let total: f64 = taps.iter().map(|t| t.weight).sum();
        assert_relative_eq!(total, 0.75, epsilon = 1e-12);
    }
}
