//! Pixel-to-meter calibration
//!
//! This module converts pixel measurements into meters using a dark
//! reference object of known length, and can guess where that object is
//! when no region is given.

pub mod reference;
pub mod scale;

pub use reference::locate_reference_region;
pub use scale::{ReferenceRegion, ScaleCalibrator};
