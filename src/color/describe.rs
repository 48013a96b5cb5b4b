//! Dominant color of a cluster
//!
//! The representative color is the per-channel median of the image pixels
//! under the cluster mask. The median ignores the few specular highlights
//! that would pull a mean towards white.

use opencv::{core::Mat, prelude::*};
use palette::Srgb;

use crate::constants::output::EMPTY_CLUSTER_HEX;
use crate::{raster, AnalysisError, Result};

/// Representative color of one cluster
#[derive(Debug, Clone, PartialEq)]
pub struct DominantColor {
    /// Median color in sRGB (8-bit)
    pub srgb: Srgb<u8>,
    /// Number of pixels the median was taken over
    pub pixel_count: usize,
}

impl DominantColor {
    /// Color reported for a cluster without pixels
    pub fn empty() -> Self {
        Self {
            srgb: Srgb::new(0, 0, 0),
            pixel_count: 0,
        }
    }

    /// Uppercase `#RRGGBB`
    pub fn hex(&self) -> String {
        if self.pixel_count == 0 {
            return EMPTY_CLUSTER_HEX.to_string();
        }
        srgb_to_hex(self.srgb)
    }
}

/// Extracts the dominant color of masked image regions
pub struct ClusterDescriber;

impl ClusterDescriber {
    /// Median color of `image` (BGR) under `mask` (non-zero = selected).
    ///
    /// An empty mask is not an error: it yields black with zero pixels.
    pub fn describe(image: &Mat, mask: &Mat) -> Result<DominantColor> {
        if image.rows() != mask.rows() || image.cols() != mask.cols() {
            return Err(AnalysisError::InvalidImage {
                reason: format!(
                    "mask {}x{} does not match image {}x{}",
                    mask.cols(),
                    mask.rows(),
                    image.cols(),
                    image.rows()
                ),
            });
        }

        let pixels = raster::mat_to_pixels(image)?;
        let selected = raster::mat_to_plane(mask)?;

        let mut histograms = [[0usize; 256]; 3];
        let mut count = 0usize;
        for (pixel, _) in pixels.iter().zip(&selected).filter(|(_, &m)| m > 0) {
            for (hist, &channel) in histograms.iter_mut().zip(pixel) {
                hist[channel as usize] += 1;
            }
            count += 1;
        }

        if count == 0 {
            return Ok(DominantColor::empty());
        }

        // BGR -> RGB
        let [b, g, r] = histograms.map(|hist| quantize(histogram_median(&hist, count)));

        Ok(DominantColor {
            srgb: Srgb::new(r, g, b),
            pixel_count: count,
        })
    }
}

/// Median of `count` samples summarized by a 256-bucket histogram.
///
/// An even count averages the two middle samples.
pub fn histogram_median(hist: &[usize; 256], count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }

    let nth = |n: usize| -> usize {
        let mut seen = 0usize;
        for (value, &bucket) in hist.iter().enumerate() {
            seen += bucket;
            if seen > n {
                return value;
            }
        }
        255
    };

    if count % 2 == 1 {
        nth(count / 2) as f64
    } else {
        (nth(count / 2 - 1) + nth(count / 2)) as f64 / 2.0
    }
}

/// Round half to even and clamp into a byte
fn quantize(value: f64) -> u8 {
    value.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Convert sRGB to hexadecimal color string (e.g. "#FF0000")
pub fn srgb_to_hex(srgb: Srgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", srgb.red, srgb.green, srgb.blue)
}
