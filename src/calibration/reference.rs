//! Heuristic placement of the reference region
//!
//! Used when a caller has no reference rectangle: the whole image is searched
//! for dark blobs, first strictly and then with a looser value bound. The
//! largest blob's bounding box, padded a little, becomes the region. With no
//! dark pixels at all, a shallow strip near the bottom center is assumed.

use opencv::{core::Mat, imgproc::bounding_rect, prelude::*};

use crate::calibration::scale::{dark_mask, largest_contour, ReferenceRegion};
use crate::constants::calibration::{DARK_VALUE_MAX, DARK_VALUE_MAX_LOOSE};
use crate::{AnalysisError, Result};

/// Locate a plausible reference region in a BGR image
pub fn locate_reference_region(image: &Mat) -> Result<ReferenceRegion> {
    let (width, height) = (image.cols(), image.rows());
    if width <= 0 || height <= 0 {
        return Err(AnalysisError::InvalidImage {
            reason: "image is empty".to_string(),
        });
    }

    for value_max in [DARK_VALUE_MAX, DARK_VALUE_MAX_LOOSE] {
        let mask = dark_mask(image, value_max)?;
        if let Some(contour) = largest_contour(&mask)? {
            let rect = bounding_rect(&contour)
                .map_err(|e| AnalysisError::opencv("Bounding rectangle", e))?;

            let pad_x = 5.max(percent(width, 2));
            let pad_y = 3.max(percent(height, 2));
            let region = ReferenceRegion::new(
                (rect.x - pad_x).max(0),
                (rect.y - pad_y).max(0),
                (rect.x + rect.width + pad_x).min(width),
                (rect.y + rect.height + pad_y).min(height),
            );

            log::debug!("dark object found at V <= {}: region {}", value_max, region);
            return Ok(region);
        }
    }

    let region = bottom_center_strip(width, height);
    log::warn!("no dark object found, assuming reference in {}", region);
    Ok(region)
}

/// Shallow strip across the bottom center of a `width` x `height` image
pub fn bottom_center_strip(width: i32, height: i32) -> ReferenceRegion {
    let strip_height = 10.max(percent(height, 3));
    let strip_width = 50.max(percent(width, 40));

    let x1 = ((width - strip_width) / 2).max(0);
    let y1 = (height - strip_height - percent(height, 2)).max(0);

    ReferenceRegion::new(
        x1,
        y1,
        (x1 + strip_width).min(width),
        (y1 + strip_height).min(height),
    )
}

fn percent(extent: i32, pct: i32) -> i32 {
    extent * pct / 100
}
