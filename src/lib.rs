//! detpost turns raw region-classifier outputs into per-class detections.
//!
//! The crate covers the post-processing side of a Fast R-CNN style detector:
//! scale pyramids and RoI projection on the way into the network, RoI
//! deduplication, box-delta inversion and clipping, per-class greedy NMS, and
//! a cross-class cap per image on the way out. The network and the dataset are
//! supplied by the caller through the [`Network`] and [`Dataset`] traits.
//! Optional features add parallel dataset passes (`rayon`), SIMD NMS
//! (`simd`), image loading (`image-io`), and spans/events (`tracing`).

pub mod aggregate;
pub mod bbox;
pub mod config;
pub mod dataset;
pub mod dedup;
pub mod detect;
pub mod image;
pub mod net;
pub mod nms;
pub mod roi;
pub mod tensor;
mod trace;
pub mod util;

#[cfg(feature = "image-io")]
pub use image::io;

pub use aggregate::{cap_per_image, DatasetResults, Detection, DetectionSet};
pub use bbox::{bbox_transform_inv, BBox, ClassBoxes};
pub use config::TestConfig;
pub use dataset::{detect_dataset, test_net, Dataset};
#[cfg(feature = "rayon")]
pub use dataset::{detect_dataset_par, test_net_par};
pub use dedup::DedupPlan;
pub use detect::{detect_image, im_detect, postprocess, RawDetections};
pub use image::pyramid::{ImageBlob, PyramidConfig, ScalePyramid};
pub use image::Image;
pub use net::{ImInfo, Network, NetworkInputs, NetworkOutputs, RoiInput};
pub use nms::nms;
pub use roi::{project_rois, ProjectedRoi, RegionProposal};
pub use tensor::Matrix;
pub use util::{DetPostError, DetPostResult};
