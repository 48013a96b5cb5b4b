//! Pixel-to-meter calibration from a dark reference object
//!
//! The reference region is expected to contain one predominantly dark object
//! (a black line or bar) whose real length is known. Its pixel length is the
//! longer side of the minimum-area rectangle around the largest dark contour.

use std::fmt;
use std::str::FromStr;

use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Vector},
    imgproc::{
        contour_area_def, cvt_color_def, find_contours_def, min_area_rect, CHAIN_APPROX_SIMPLE,
        COLOR_BGR2HSV, RETR_EXTERNAL,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::constants::calibration::DARK_VALUE_MAX;
use crate::{AnalysisError, Result};

type VectorOfPoint = Vector<Point>;

/// Axis-aligned reference rectangle; `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRegion {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl ReferenceRegion {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Clip to an image of `width` x `height`; `None` when nothing remains
    pub fn clip(&self, width: i32, height: i32) -> Option<Rect> {
        let x1 = self.x1.clamp(0, width);
        let y1 = self.y1.clamp(0, height);
        let x2 = self.x2.clamp(0, width);
        let y2 = self.y2.clamp(0, height);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }
}

impl FromStr for ReferenceRegion {
    type Err = AnalysisError;

    /// Parse `"x1,y1,x2,y2"`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AnalysisError::invalid_parameter("ref_roi_xyxy", s);

        let values = s
            .split(',')
            .map(|v| v.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        match values.as_slice() {
            &[x1, y1, x2, y2] => Ok(Self::new(x1, y1, x2, y2)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ReferenceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Computes meters-per-pixel from a reference object
pub struct ScaleCalibrator {
    dark_value_max: f64,
}

impl Default for ScaleCalibrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScaleCalibrator {
    /// Create a calibrator with the default darkness bound
    pub fn new() -> Self {
        Self {
            dark_value_max: DARK_VALUE_MAX,
        }
    }

    /// Meters per pixel for `image` given the reference region and its length.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `reference_length_m` is not a positive number
    /// - `EmptyReferenceRegion` if the region is empty after clipping
    /// - `ReferenceNotFound` if no dark contour exists in the region
    /// - `DegenerateReference` if the reference measures zero pixels
    pub fn calibrate(
        &self,
        image: &Mat,
        region: ReferenceRegion,
        reference_length_m: f64,
    ) -> Result<f64> {
        if !reference_length_m.is_finite() || reference_length_m <= 0.0 {
            return Err(AnalysisError::invalid_parameter(
                "reference_length_m",
                reference_length_m,
            ));
        }

        let pixel_length = self.reference_pixel_length(image, region)?;
        let m_per_px = reference_length_m / pixel_length;

        log::debug!(
            "reference {} measures {:.2} px -> {:.6} m/px",
            region,
            pixel_length,
            m_per_px
        );

        Ok(m_per_px)
    }

    /// Pixel length of the largest dark object inside the region
    pub fn reference_pixel_length(&self, image: &Mat, region: ReferenceRegion) -> Result<f64> {
        let rect = region
            .clip(image.cols(), image.rows())
            .ok_or(AnalysisError::EmptyReferenceRegion {
                x1: region.x1,
                y1: region.y1,
                x2: region.x2,
                y2: region.y2,
            })?;

        let crop = Mat::roi(image, rect)
            .and_then(|roi| roi.try_clone())
            .map_err(|e| AnalysisError::opencv("Reference crop", e))?;

        let dark = dark_mask(&crop, self.dark_value_max)?;
        let contour = largest_contour(&dark)?.ok_or(AnalysisError::ReferenceNotFound)?;

        let rotated = min_area_rect(&contour)
            .map_err(|e| AnalysisError::opencv("Minimum area rectangle", e))?;
        let pixel_length = rotated.size.width.max(rotated.size.height) as f64;

        if pixel_length <= 0.0 {
            return Err(AnalysisError::DegenerateReference { pixel_length });
        }

        Ok(pixel_length)
    }
}

/// Binary mask (0/255) of pixels with HSV value at or below `value_max`
pub fn dark_mask(image: &Mat, value_max: f64) -> Result<Mat> {
    let mut hsv = Mat::default();
    cvt_color_def(image, &mut hsv, COLOR_BGR2HSV)
        .map_err(|e| AnalysisError::opencv("HSV conversion", e))?;

    let mut mask = Mat::default();
    core::in_range(
        &hsv,
        &Scalar::new(0.0, 0.0, 0.0, 0.0),
        &Scalar::new(179.0, 255.0, value_max, 0.0),
        &mut mask,
    )
    .map_err(|e| AnalysisError::opencv("Dark mask", e))?;

    Ok(mask)
}

/// External contour of maximum area, if any contour exists
pub fn largest_contour(mask: &Mat) -> Result<Option<VectorOfPoint>> {
    let mut contours = Vector::<VectorOfPoint>::new();
    find_contours_def(mask, &mut contours, RETR_EXTERNAL, CHAIN_APPROX_SIMPLE)
        .map_err(|e| AnalysisError::opencv("Contour detection", e))?;

    let mut best: Option<(f64, VectorOfPoint)> = None;
    for contour in contours.iter() {
        let area = contour_area_def(&contour)
            .map_err(|e| AnalysisError::opencv("Area calculation", e))?;
        if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
            best = Some((area, contour));
        }
    }

    Ok(best.map(|(_, contour)| contour))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::CV_8UC3;
    use opencv::imgproc::{rectangle, FILLED, LINE_8};

    /// White `(width, height)` canvas with one black bar
    fn canvas_with_bar(size: (i32, i32), bar: Rect) -> Mat {
        let mut image =
            Mat::new_rows_cols_with_default(size.1, size.0, CV_8UC3, Scalar::all(255.0)).unwrap();
        rectangle(&mut image, bar, Scalar::all(0.0), FILLED, LINE_8, 0).unwrap();
        image
    }

    #[test]
    fn test_region_parsing() {
        let region: ReferenceRegion = " 10, 20,110 ,40".parse().unwrap();
        assert_eq!(region, ReferenceRegion::new(10, 20, 110, 40));
        assert_eq!(region.to_string(), "10,20,110,40");

        assert!("10,20,30".parse::<ReferenceRegion>().is_err());
        assert!("a,b,c,d".parse::<ReferenceRegion>().is_err());
    }

    #[test]
    fn test_region_clipping() {
        assert_eq!(
            ReferenceRegion::new(-5, -5, 10, 10).clip(100, 50),
            Some(Rect::new(0, 0, 10, 10))
        );
        assert_eq!(
            ReferenceRegion::new(90, 40, 200, 200).clip(100, 50),
            Some(Rect::new(90, 40, 10, 10))
        );
        assert_eq!(ReferenceRegion::new(200, 0, 300, 10).clip(100, 50), None);
        assert_eq!(ReferenceRegion::new(10, 10, 10, 30).clip(100, 50), None);
        assert_eq!(ReferenceRegion::new(30, 10, 10, 30).clip(100, 50), None);
    }

    #[test]
    fn test_scale_from_bar() {
        // 101 pixel columns -> 100 px between the extreme pixel centers
        let image = canvas_with_bar((300, 100), Rect::new(50, 40, 101, 5));
        let calibrator = ScaleCalibrator::new();

        let m_per_px = calibrator
            .calibrate(&image, ReferenceRegion::new(0, 0, 300, 100), 5.0)
            .unwrap();
        assert!((m_per_px - 0.05).abs() < 1e-9);

        let again = calibrator
            .calibrate(&image, ReferenceRegion::new(0, 0, 300, 100), 5.0)
            .unwrap();
        assert_eq!(m_per_px, again);
    }

    #[test]
    fn test_vertical_bar_uses_longer_side() {
        let image = canvas_with_bar((100, 200), Rect::new(40, 20, 6, 81));

        let pixels = ScaleCalibrator::new()
            .reference_pixel_length(&image, ReferenceRegion::new(0, 0, 100, 200))
            .unwrap();
        assert!((pixels - 80.0).abs() < 1e-6);
    }

    #[test]
    fn test_largest_dark_object_wins() {
        let mut image = canvas_with_bar((300, 100), Rect::new(10, 10, 41, 4));
        let long = Rect::new(60, 60, 151, 4);
        rectangle(&mut image, long, Scalar::all(0.0), FILLED, LINE_8, 0).unwrap();

        let pixels = ScaleCalibrator::new()
            .reference_pixel_length(&image, ReferenceRegion::new(0, 0, 300, 100))
            .unwrap();
        assert!((pixels - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_region_outside_image() {
        let image = canvas_with_bar((100, 50), Rect::new(10, 10, 20, 3));
        let err = ScaleCalibrator::new()
            .calibrate(&image, ReferenceRegion::new(500, 500, 600, 600), 5.0)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyReferenceRegion { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::CalibrationFailure);
    }

    #[test]
    fn test_region_without_dark_object() {
        let image = canvas_with_bar((100, 50), Rect::new(10, 10, 20, 3));
        let err = ScaleCalibrator::new()
            .calibrate(&image, ReferenceRegion::new(50, 20, 100, 50), 5.0)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ReferenceNotFound));
    }

    #[test]
    fn test_single_pixel_reference_is_degenerate() {
        let image = canvas_with_bar((100, 50), Rect::new(10, 10, 1, 1));
        let err = ScaleCalibrator::new()
            .calibrate(&image, ReferenceRegion::new(0, 0, 100, 50), 5.0)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateReference { .. }));
    }

    #[test]
    fn test_invalid_reference_length() {
        let image = canvas_with_bar((100, 50), Rect::new(10, 10, 20, 3));
        for length in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = ScaleCalibrator::new()
                .calibrate(&image, ReferenceRegion::new(0, 0, 100, 50), length)
                .unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
        }
    }
}
