//! One-pixel-wide skeletons of binary masks
//!
//! Thinning is a pluggable capability: [`ZhangSuenThinning`] is always
//! available, [`OpenCvThinning`] delegates to `ximgproc` when the crate is
//! built with the `ximgproc` feature.

use opencv::{core::Mat, prelude::*};

use crate::{raster, Result};

/// Reduces a binary mask (non-zero = foreground) to a 0/255 skeleton
pub trait Skeletonizer: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    fn skeletonize(&self, mask: &Mat) -> Result<Mat>;
}

/// Zhang–Suen parallel thinning in plain Rust
#[derive(Debug, Default, Clone, Copy)]
pub struct ZhangSuenThinning;

impl Skeletonizer for ZhangSuenThinning {
    fn name(&self) -> &'static str {
        "zhang-suen"
    }

    fn skeletonize(&self, mask: &Mat) -> Result<Mat> {
        let width = mask.cols() as usize;
        let height = mask.rows() as usize;
        let mut bits: Vec<bool> = raster::mat_to_plane(mask)?.iter().map(|&v| v > 0).collect();

        zhang_suen(&mut bits, width, height);

        raster::bits_to_mask(width, height, &bits)
    }
}

/// Thin `bits` in place until no pixel can be removed
pub fn zhang_suen(bits: &mut [bool], width: usize, height: usize) {
    let mut removable = Vec::new();
    loop {
        let mut changed = false;
        for first_pass in [true, false] {
            removable.clear();
            for y in 0..height {
                for x in 0..width {
                    if bits[y * width + x] && can_remove(bits, width, height, x, y, first_pass) {
                        removable.push(y * width + x);
                    }
                }
            }
            for &i in &removable {
                bits[i] = false;
            }
            changed |= !removable.is_empty();
        }
        if !changed {
            break;
        }
    }
}

/// Neighbors P2..P9, clockwise from north; outside the grid is background
fn neighbors(bits: &[bool], width: usize, height: usize, x: usize, y: usize) -> [bool; 8] {
    let at = |dx: isize, dy: isize| -> bool {
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
            return false;
        }
        bits[ny as usize * width + nx as usize]
    };

    [
        at(0, -1),
        at(1, -1),
        at(1, 0),
        at(1, 1),
        at(0, 1),
        at(-1, 1),
        at(-1, 0),
        at(-1, -1),
    ]
}

fn can_remove(
    bits: &[bool],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    first_pass: bool,
) -> bool {
    let p = neighbors(bits, width, height, x, y);
    let [p2, _, p4, _, p6, _, p8, _] = p;

    let filled = p.iter().filter(|&&on| on).count();
    if !(2..=6).contains(&filled) {
        return false;
    }

    // 0 -> 1 transitions around the ring
    let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }

    if first_pass {
        !(p2 && p4 && p6) && !(p4 && p6 && p8)
    } else {
        !(p2 && p4 && p8) && !(p2 && p6 && p8)
    }
}

/// `cv::ximgproc::thinning` with the Zhang–Suen variant
#[cfg(feature = "ximgproc")]
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvThinning;

#[cfg(feature = "ximgproc")]
impl Skeletonizer for OpenCvThinning {
    fn name(&self) -> &'static str {
        "opencv-ximgproc"
    }

    fn skeletonize(&self, mask: &Mat) -> Result<Mat> {
        use opencv::ximgproc::{thinning, THINNING_ZHANGSUEN};

        let mut skeleton = Mat::default();
        thinning(mask, &mut skeleton, THINNING_ZHANGSUEN)
            .map_err(|e| crate::AnalysisError::opencv("Thinning", e))?;
        Ok(skeleton)
    }
}
