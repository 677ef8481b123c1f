pub mod pooling;

pub use pooling::{
    convert_boxes_to_roi_format, ps_roi_align_backward, ps_roi_align_forward,
    ps_roi_pool_backward, ps_roi_pool_forward, RoiInput,
};
