//! Work distribution for the PS-RoI kernels.
//!
//! Forward passes split the output by region: every region owns a disjoint
//! chunk of the output and channel-mapping buffers.
//!
//! Backward passes cannot split by region because regions overlap. Every
//! output element, however, scatters into exactly one `(batch, input_channel)`
//! plane of the input gradient. Output elements are bucketed by destination
//! plane and each plane is accumulated by a single worker, in ascending output
//! order, so the result is race-free and identical from run to run.

use crate::kernel::KernelHandle;
use rayon::prelude::*;
use scirs2_core::numeric::Zero;

/// Allocate `num_regions * region_len` outputs and fill them region by region.
pub(crate) fn forward_by_region<T, F>(
    handle: &KernelHandle,
    num_regions: usize,
    region_len: usize,
    fill_region: F,
) -> (Vec<T>, Vec<usize>)
where
    T: Zero + Copy + Send + Sync,
    F: Fn(usize, &mut [T], &mut [usize]) + Send + Sync,
{
    let total = num_regions * region_len;
    let mut output = vec![T::zero(); total];
    let mut mapping = vec![0usize; total];
    if total == 0 {
        return (output, mapping);
    }

    if handle.should_parallelize(total) {
        tracing::trace!(total, threads = handle.num_threads(), "parallel forward");
        handle.install(|| {
            output
                .par_chunks_mut(region_len)
                .zip(mapping.par_chunks_mut(region_len))
                .enumerate()
                .for_each(|(k, (out, map))| fill_region(k, out, map));
        });
    } else {
        output
            .chunks_mut(region_len)
            .zip(mapping.chunks_mut(region_len))
            .enumerate()
            .for_each(|(k, (out, map))| fill_region(k, out, map));
    }

    (output, mapping)
}

/// Bucket output elements by destination plane (counting sort).
///
/// Returns `(offsets, order)` where the output elements targeting plane `p`
/// are `order[offsets[p]..offsets[p + 1]]`, ascending.
fn bucket_by_plane(targets: &[usize], num_planes: usize) -> (Vec<usize>, Vec<usize>) {
    let mut offsets = vec![0usize; num_planes + 1];
    for &plane in targets {
        offsets[plane + 1] += 1;
    }
    for p in 0..num_planes {
        offsets[p + 1] += offsets[p];
    }

    let mut cursor = offsets[..num_planes].to_vec();
    let mut order = vec![0usize; targets.len()];
    for (element, &plane) in targets.iter().enumerate() {
        order[cursor[plane]] = element;
        cursor[plane] += 1;
    }
    (offsets, order)
}

/// Zero-initialise a `num_planes * plane_size` gradient buffer and accumulate
/// every output element into its destination plane.
///
/// `targets[i]` is the plane output element `i` scatters into and must be
/// `< num_planes`. `scatter(i, plane)` adds element `i`'s contribution to the
/// plane buffer.
pub(crate) fn scatter_by_plane<T, F>(
    handle: &KernelHandle,
    num_planes: usize,
    plane_size: usize,
    targets: &[usize],
    scatter: F,
) -> Vec<T>
where
    T: Zero + Copy + Send + Sync,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    let mut grad = vec![T::zero(); num_planes * plane_size];
    if grad.is_empty() || targets.is_empty() {
        return grad;
    }

    let (offsets, order) = bucket_by_plane(targets, num_planes);
    let accumulate = |(plane, buf): (usize, &mut [T])| {
        for &element in &order[offsets[plane]..offsets[plane + 1]] {
            scatter(element, buf);
        }
    };

    if handle.should_parallelize(targets.len()) {
        tracing::trace!(
            elements = targets.len(),
            planes = num_planes,
            "parallel gradient scatter"
        );
        handle.install(|| {
            grad.par_chunks_mut(plane_size)
                .enumerate()
                .for_each(accumulate)
        });
    } else {
        grad.chunks_mut(plane_size).enumerate().for_each(accumulate);
    }

    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{kernel_handle, KernelConfig, KernelHandle};

    #[test]
    fn test_bucket_by_plane_is_stable() {
        let (offsets, order) = bucket_by_plane(&[2, 0, 2, 1, 0], 3);
        assert_eq!(offsets, vec![0, 2, 3, 5]);
        assert_eq!(order, vec![1, 4, 3, 0, 2]);
    }

    #[test]
    fn test_forward_by_region_chunks() {
        let (out, map) = forward_by_region::<f32, _>(kernel_handle(), 3, 2, |k, out, map| {
            for (i, (o, m)) in out.iter_mut().zip(map.iter_mut()).enumerate() {
                *o = (k * 10 + i) as f32;
                *m = i;
            }
        });
        assert_eq!(out, vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0]);
        assert_eq!(map, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_forward_by_region_empty() {
        let (out, map) = forward_by_region::<f64, _>(kernel_handle(), 0, 4, |_, _, _| {
            unreachable!("no regions to fill")
        });
        assert!(out.is_empty() && map.is_empty());
    }

    #[test]
    fn test_scatter_accumulates_overlapping_contributions() {
        // four output elements, three of them hit plane 1 cell 0
        let targets = [1, 1, 0, 1];
        let run = |handle: &KernelHandle| {
            scatter_by_plane::<f64, _>(handle, 2, 2, &targets, |element, plane| {
                plane[0] += (element + 1) as f64;
                plane[1] += 0.5;
            })
        };
        let expected = vec![3.0, 0.5, 1.0 + 2.0 + 4.0, 1.5];
        assert_eq!(run(kernel_handle()), expected);
        assert_eq!(run(&KernelHandle::new(KernelConfig::parallel())), expected);
        assert_eq!(run(&KernelHandle::new(KernelConfig::sequential())), expected);
    }
}
