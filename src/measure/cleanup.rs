//! Morphological cleanup of per-cluster masks
//!
//! Speckles are removed with a small opening, then gaps along thin
//! horizontal and vertical shapes are bridged with two elongated closings.

use opencv::{
    core::{Mat, Size},
    imgproc::{get_structuring_element_def, morphology_ex_def, MORPH_CLOSE, MORPH_OPEN, MORPH_RECT},
};

use crate::constants::morphology::{CLOSE_KERNEL_HORIZONTAL, CLOSE_KERNEL_VERTICAL, OPEN_KERNEL};
use crate::{AnalysisError, Result};

/// Removes noise and bridges gaps in binary cluster masks
pub struct ShapeCleaner {
    open_kernel: Mat,
    close_horizontal: Mat,
    close_vertical: Mat,
}

impl ShapeCleaner {
    /// Create a cleaner with the standard kernels
    pub fn new() -> Result<Self> {
        Self::with_kernels(OPEN_KERNEL, CLOSE_KERNEL_HORIZONTAL, CLOSE_KERNEL_VERTICAL)
    }

    /// Create a cleaner with custom `(width, height)` rectangle kernels
    pub fn with_kernels(
        open: (i32, i32),
        horizontal: (i32, i32),
        vertical: (i32, i32),
    ) -> Result<Self> {
        Ok(Self {
            open_kernel: rect_kernel(open)?,
            close_horizontal: rect_kernel(horizontal)?,
            close_vertical: rect_kernel(vertical)?,
        })
    }

    /// Open, close horizontally, then close vertically
    pub fn clean(&self, mask: &Mat) -> Result<Mat> {
        let opened = morph(mask, MORPH_OPEN, &self.open_kernel, "Opening")?;
        let closed = morph(&opened, MORPH_CLOSE, &self.close_horizontal, "Horizontal closing")?;
        morph(&closed, MORPH_CLOSE, &self.close_vertical, "Vertical closing")
    }
}

/// Rectangular structuring element of `(width, height)`
pub fn rect_kernel((width, height): (i32, i32)) -> Result<Mat> {
    get_structuring_element_def(MORPH_RECT, Size::new(width, height))
        .map_err(|e| AnalysisError::opencv("Kernel creation", e))
}

/// Single morphology pass with the default anchor and border
pub fn morph(src: &Mat, op: i32, kernel: &Mat, operation: &str) -> Result<Mat> {
    let mut dst = Mat::default();
    morphology_ex_def(src, &mut dst, op, kernel).map_err(|e| AnalysisError::opencv(operation, e))?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster;

    fn grid(width: usize, height: usize, on: impl Fn(usize, usize) -> bool) -> Mat {
        let bits: Vec<bool> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| on(x, y))
            .collect();
        raster::bits_to_mask(width, height, &bits).unwrap()
    }

    fn count(mask: &Mat) -> usize {
        raster::mat_to_plane(mask).unwrap().iter().filter(|&&v| v > 0).count()
    }

    #[test]
    fn test_speckle_removed() {
        let mask = grid(40, 40, |x, y| x == 20 && y == 20);
        let cleaned = ShapeCleaner::new().unwrap().clean(&mask).unwrap();
        assert_eq!(count(&cleaned), 0);
    }

    #[test]
    fn test_horizontal_gap_bridged() {
        // Two 5-px tall bars separated by a 10 px gap, clear of the border
        let mask = grid(120, 60, |x, y| {
            (28..33).contains(&y) && ((20..50).contains(&x) || (60..90).contains(&x))
        });
        let cleaned = ShapeCleaner::new().unwrap().clean(&mask).unwrap();

        let plane = raster::mat_to_plane(&cleaned).unwrap();
        assert!((50..60).all(|x| plane[30 * 120 + x] == 255));
        assert_eq!(count(&cleaned), 70 * 5);
    }

    #[test]
    fn test_solid_rectangle_unchanged() {
        let mask = grid(80, 80, |x, y| (20..60).contains(&x) && (30..40).contains(&y));
        let cleaned = ShapeCleaner::new().unwrap().clean(&mask).unwrap();
        assert_eq!(raster::mat_to_plane(&cleaned).unwrap(), raster::mat_to_plane(&mask).unwrap());
    }
}
