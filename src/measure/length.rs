//! Pixel length of the shapes in a cleaned cluster mask
//!
//! The mask is re-binarized with Otsu's threshold and opened once more, then
//! measured by one of two strategies:
//!
//! - **Skeleton**: thin to one pixel and count the pixels of every
//!   8-connected skeleton component. Suits curved or branching shapes.
//! - **Box**: longer side of the minimum-area rectangle around every external
//!   contour of at least `min_area`. Suits straight shapes.

use std::sync::Arc;

use opencv::{
    core::{Mat, Point, Vector, CV_32S},
    imgproc::{
        connected_components, contour_area_def, find_contours_def, min_area_rect, threshold,
        CHAIN_APPROX_SIMPLE, MORPH_OPEN, RETR_EXTERNAL, THRESH_BINARY, THRESH_OTSU,
    },
    prelude::*,
};

use crate::config::MeasureMethod;
use crate::constants::morphology::{DEFAULT_MIN_AREA, OPEN_KERNEL};
use crate::measure::cleanup::{morph, rect_kernel};
use crate::measure::skeleton::Skeletonizer;
use crate::{AnalysisError, Result};

type VectorOfPoint = Vector<Point>;

/// Lengths found in one mask
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LengthMeasurement {
    /// Per-component lengths in pixels
    pub lengths: Vec<f64>,
    /// Sum of `lengths`
    pub total_px: f64,
    /// Skeleton strategy requested without a thinning backend
    pub degraded: bool,
}

impl LengthMeasurement {
    fn from_lengths(lengths: Vec<f64>) -> Self {
        let total_px = lengths.iter().sum();
        Self {
            lengths,
            total_px,
            degraded: false,
        }
    }

    fn degraded() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }
}

/// Measures shape lengths with a configurable strategy
pub struct LengthMeasurer {
    method: MeasureMethod,
    min_area: f64,
    skeletonizer: Option<Arc<dyn Skeletonizer>>,
}

impl LengthMeasurer {
    pub fn new(method: MeasureMethod, skeletonizer: Option<Arc<dyn Skeletonizer>>) -> Self {
        Self {
            method,
            min_area: DEFAULT_MIN_AREA,
            skeletonizer,
        }
    }

    /// Minimum contour area for the box strategy
    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    /// Measure every shape in `mask` (non-zero = foreground)
    pub fn measure(&self, mask: &Mat) -> Result<LengthMeasurement> {
        let binary = prepare(mask)?;

        match self.method {
            MeasureMethod::Skeleton => match &self.skeletonizer {
                Some(skeletonizer) => {
                    let skeleton = skeletonizer.skeletonize(&binary)?;
                    Ok(LengthMeasurement::from_lengths(component_sizes(&skeleton)?))
                }
                None => Ok(LengthMeasurement::degraded()),
            },
            MeasureMethod::Box => Ok(LengthMeasurement::from_lengths(box_lengths(
                &binary,
                self.min_area,
            )?)),
        }
    }
}

/// Otsu binarization followed by a 3x3 opening
fn prepare(mask: &Mat) -> Result<Mat> {
    let mut binary = Mat::default();
    threshold(mask, &mut binary, 0.0, 255.0, THRESH_BINARY | THRESH_OTSU)
        .map_err(|e| AnalysisError::opencv("Otsu threshold", e))?;

    morph(&binary, MORPH_OPEN, &rect_kernel(OPEN_KERNEL)?, "Opening")
}

/// Pixel count of every 8-connected component, in label order
fn component_sizes(skeleton: &Mat) -> Result<Vec<f64>> {
    let mut labels = Mat::default();
    let count = connected_components(skeleton, &mut labels, 8, CV_32S)
        .map_err(|e| AnalysisError::opencv("Connected components", e))?;

    // Label 0 is the background
    let mut sizes = vec![0usize; count.max(1) as usize];
    let labels = labels
        .data_typed::<i32>()
        .map_err(|e| AnalysisError::opencv("Label access", e))?;
    for &label in labels {
        if let Some(size) = sizes.get_mut(label as usize) {
            *size += 1;
        }
    }

    Ok(sizes.into_iter().skip(1).map(|size| size as f64).collect())
}

/// Longer minimum-area-rectangle side of every sufficiently large contour
fn box_lengths(binary: &Mat, min_area: f64) -> Result<Vec<f64>> {
    let mut contours = Vector::<VectorOfPoint>::new();
    find_contours_def(binary, &mut contours, RETR_EXTERNAL, CHAIN_APPROX_SIMPLE)
        .map_err(|e| AnalysisError::opencv("Contour detection", e))?;

    let mut lengths = Vec::new();
    for contour in contours.iter() {
        let area = contour_area_def(&contour)
            .map_err(|e| AnalysisError::opencv("Area calculation", e))?;
        if area < min_area {
            continue;
        }

        let rotated = min_area_rect(&contour)
            .map_err(|e| AnalysisError::opencv("Minimum area rectangle", e))?;
        lengths.push(rotated.size.width.max(rotated.size.height) as f64);
    }

    Ok(lengths)
}
