//! HSV planes and the colored-pixel mask

use opencv::{
    core::Mat,
    imgproc::{cvt_color_def, COLOR_BGR2HSV},
    prelude::*,
};

use crate::{raster, AnalysisError, Result};

/// Hue, saturation and value planes of one image.
///
/// Hue uses OpenCV's half-resolution wheel: values in [0, 180).
#[derive(Debug, Clone, PartialEq)]
pub struct HsvPlanes {
    pub width: usize,
    pub height: usize,
    pub hue: Vec<u8>,
    pub saturation: Vec<u8>,
    pub value: Vec<u8>,
}

impl HsvPlanes {
    /// Convert a BGR image to separated HSV planes
    pub fn from_bgr(image: &Mat) -> Result<Self> {
        let mut hsv = Mat::default();
        cvt_color_def(image, &mut hsv, COLOR_BGR2HSV)
            .map_err(|e| AnalysisError::opencv("HSV conversion", e))?;

        let pixels = raster::mat_to_pixels(&hsv)?;
        let mut planes = Self {
            width: image.cols() as usize,
            height: image.rows() as usize,
            hue: Vec::with_capacity(pixels.len()),
            saturation: Vec::with_capacity(pixels.len()),
            value: Vec::with_capacity(pixels.len()),
        };
        for [h, s, v] in pixels {
            planes.hue.push(h);
            planes.saturation.push(s);
            planes.value.push(v);
        }

        Ok(planes)
    }

    /// Number of pixels per plane
    pub fn len(&self) -> usize {
        self.hue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hue.is_empty()
    }

    /// Mark pixels with `S > s_thr` and `V > v_thr` as colored
    pub fn color_mask(&self, s_thr: u8, v_thr: u8) -> ColorMask {
        let bits = self
            .saturation
            .iter()
            .zip(&self.value)
            .map(|(&s, &v)| s > s_thr && v > v_thr)
            .collect();

        ColorMask {
            width: self.width,
            height: self.height,
            bits,
        }
    }
}

/// Boolean grid of pixels considered colored.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMask {
    pub width: usize,
    pub height: usize,
    pub bits: Vec<bool>,
}

impl ColorMask {
    /// Number of colored pixels
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&on| on).count()
    }

    /// Row-major indices of colored pixels
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| on.then_some(i))
    }
}
