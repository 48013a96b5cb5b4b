//! Color masking, clustering and description
//!
//! This module finds colored pixels, estimates how many hue families they
//! form, clusters them, and reports each cluster's dominant color.

pub mod describe;
pub mod hsv;
pub mod peaks;
pub mod segmentation;

pub use describe::{ClusterDescriber, DominantColor};
pub use hsv::{ColorMask, HsvPlanes};
pub use peaks::estimate_cluster_count;
pub use segmentation::{ColorSegmenter, LabelMap};
