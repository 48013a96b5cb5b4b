//! Shape cleanup and length measurement
//!
//! This module turns a raw cluster mask into clean shapes and measures how
//! long those shapes are in pixels.

pub mod cleanup;
pub mod length;
pub mod skeleton;

pub use cleanup::ShapeCleaner;
pub use length::{LengthMeasurement, LengthMeasurer};
#[cfg(feature = "ximgproc")]
pub use skeleton::OpenCvThinning;
pub use skeleton::{Skeletonizer, ZhangSuenThinning};
