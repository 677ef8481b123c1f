//! Region list formats accepted by the PS-RoI operators.

use super::geometry::ROI_ROW_LEN;
use crate::{Result, Tensor, TensorError};
use scirs2_core::numeric::{Float, FromPrimitive};
use std::borrow::Cow;

const BOX_ROW_LEN: usize = 4;

/// Concatenate per-image `[K_i, 4]` boxes `(x1, y1, x2, y2)` into a single
/// `[sum K_i, 5]` region list, prefixing every row with its image index.
pub fn convert_boxes_to_roi_format<T>(boxes: &[Tensor<T>]) -> Result<Tensor<T>>
where
    T: Float + FromPrimitive,
{
    const OP: &str = "convert_boxes_to_roi_format";
    let mut rows = Vec::new();

    for (image, per_image) in boxes.iter().enumerate() {
        let dims = per_image.shape().dims();
        if dims.len() != 2 || dims[1] != BOX_ROW_LEN {
            return Err(TensorError::invalid_shape(
                OP,
                &format!("boxes for image {image} must be [num_boxes, 4]"),
                dims,
            ));
        }
        let data = per_image.as_slice().ok_or_else(|| {
            TensorError::invalid_argument_op(OP, "boxes tensor is not contiguous")
        })?;
        let index = T::from_usize(image).ok_or_else(|| {
            TensorError::invalid_argument_op(
                OP,
                &format!("image index {image} is not representable in the element type"),
            )
        })?;

        rows.reserve(data.len() / BOX_ROW_LEN * ROI_ROW_LEN);
        for coords in data.chunks_exact(BOX_ROW_LEN) {
            rows.push(index);
            rows.extend_from_slice(coords);
        }
    }

    let num_rois = rows.len() / ROI_ROW_LEN;
    Tensor::from_vec(rows, &[num_rois, ROI_ROW_LEN])
}

/// Regions passed to the functional and layer APIs: either an already packed
/// `[K, 5]` tensor or one `[K_i, 4]` box tensor per image.
#[derive(Debug, Clone, Copy)]
pub enum RoiInput<'a, T> {
    Packed(&'a Tensor<T>),
    PerImage(&'a [Tensor<T>]),
}

impl<'a, T> RoiInput<'a, T>
where
    T: Float + FromPrimitive,
{
    /// The packed `[K, 5]` form, borrowed when no conversion is needed
    pub fn to_rois(&self) -> Result<Cow<'a, Tensor<T>>> {
        match *self {
            RoiInput::Packed(rois) => Ok(Cow::Borrowed(rois)),
            RoiInput::PerImage(boxes) => convert_boxes_to_roi_format(boxes).map(Cow::Owned),
        }
    }
}

impl<'a, T> From<&'a Tensor<T>> for RoiInput<'a, T> {
    fn from(rois: &'a Tensor<T>) -> Self {
        RoiInput::Packed(rois)
    }
}

impl<'a, T> From<&'a [Tensor<T>]> for RoiInput<'a, T> {
    fn from(boxes: &'a [Tensor<T>]) -> Self {
        RoiInput::PerImage(boxes)
    }
}

impl<'a, T> From<&'a Vec<Tensor<T>>> for RoiInput<'a, T> {
    fn from(boxes: &'a Vec<Tensor<T>>) -> Self {
        RoiInput::PerImage(boxes.as_slice())
    }
}
