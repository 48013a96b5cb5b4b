//! Cluster-count estimation from the hue histogram
//!
//! Counts dominant hues as local maxima of a 180-bucket histogram over the
//! colored pixels, then folds the result into the automatic cluster range.
//!
//! The wraparound check only compares the lowest and highest accepted peak
//! and resolves a conflict by dropping one of them; the dropped peak's pixels
//! are not credited to the survivor.

use crate::color::hsv::ColorMask;
use crate::constants::peaks::{
    AUTO_MAX_CLUSTERS, AUTO_MIN_CLUSTERS, FALLBACK_CLUSTERS, HUE_BINS, MIN_HEIGHT_FLOOR,
    MIN_HEIGHT_FRACTION,
};

/// Circular hue histogram restricted to colored pixels
pub type HueHistogram = [u32; HUE_BINS];

/// Build the hue histogram of masked pixels.
///
/// Hue values outside [0, 180) and mask bits past the end of `hue` are
/// ignored.
pub fn hue_histogram(hue: &[u8], mask: &ColorMask) -> HueHistogram {
    let mut hist = [0u32; HUE_BINS];
    for i in mask.indices() {
        let Some(&h) = hue.get(i) else { break };
        if let Some(bucket) = hist.get_mut(h as usize) {
            *bucket += 1;
        }
    }
    hist
}

/// Minimum peak height for a histogram over `colored` pixels
pub fn min_peak_height(colored: usize) -> u32 {
    let fraction = (MIN_HEIGHT_FRACTION * colored as f64) as u32;
    fraction.max(MIN_HEIGHT_FLOOR)
}

/// Locate separated local maxima in a hue histogram.
///
/// Buckets are scanned in ascending order, the first and last bucket are
/// never peaks, and a candidate within `min_dist` of an accepted peak is
/// dropped. Returned indices are ascending.
pub fn find_peaks(hist: &[u32], min_height: u32, min_dist: usize) -> Vec<usize> {
    let mut peaks: Vec<usize> = Vec::new();

    for i in 1..hist.len().saturating_sub(1) {
        let is_peak = hist[i] >= hist[i - 1] && hist[i] >= hist[i + 1] && hist[i] >= min_height;
        if is_peak && peaks.iter().all(|&p| i.abs_diff(p) >= min_dist) {
            peaks.push(i);
        }
    }

    if let (Some(&lowest), Some(&highest)) = (peaks.first(), peaks.last()) {
        if peaks.len() >= 2 && (lowest + HUE_BINS) - highest < min_dist {
            if hist[lowest] >= hist[highest] {
                peaks.pop();
            } else {
                peaks.remove(0);
            }
        }
    }

    peaks
}

/// Clamp a raw peak count into the automatic cluster range.
///
/// Fewer than two peaks means the histogram carries no usable structure and
/// the fixed fallback is used instead.
pub fn resolve_peak_count(raw: usize) -> usize {
    let k = if raw < 2 { FALLBACK_CLUSTERS } else { raw };
    k.clamp(AUTO_MIN_CLUSTERS, AUTO_MAX_CLUSTERS)
}

/// Estimate the number of hue clusters among colored pixels.
///
/// Returns 0 when the mask selects nothing, otherwise a value in [5, 12].
pub fn estimate_cluster_count(hue: &[u8], mask: &ColorMask, min_dist: usize) -> usize {
    let colored = mask.count();
    if colored == 0 {
        return 0;
    }

    let hist = hue_histogram(hue, mask);
    let peaks = find_peaks(&hist, min_peak_height(colored), min_dist);
    let k = resolve_peak_count(peaks.len());

    log::debug!(
        "hue peaks {:?} over {} colored pixels -> k = {}",
        peaks,
        colored,
        k
    );

    k
}
