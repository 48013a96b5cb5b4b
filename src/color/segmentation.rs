//! Hue-weighted K-means segmentation of colored pixels
//!
//! Hue is mapped onto the unit circle so that 0° and 360° coincide, then
//! scaled so that hue differences dominate saturation and value:
//!
//! ```text
//! [3·cos θ, 3·sin θ, 0.5·S/255, 0.5·V/255],  θ = H / 180 · 2π
//! ```
//!
//! Clustering uses OpenCV's K-means with k-means++ seeding and several
//! restarts, keeping the most compact run.

use opencv::{
    core::{self, Mat, TermCriteria},
    prelude::*,
};

use crate::color::hsv::{ColorMask, HsvPlanes};
use crate::constants::segmentation::{
    ATTEMPTS, EPSILON, HUE_WEIGHT, MAX_ITERATIONS, SATURATION_WEIGHT, UNASSIGNED, VALUE_WEIGHT,
};
use crate::{raster, AnalysisError, Result};

/// Per-pixel cluster assignment.
///
/// Colored pixels hold an index in `[0, k)`; every other pixel holds
/// [`UNASSIGNED`].
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    pub width: usize,
    pub height: usize,
    pub k: usize,
    pub labels: Vec<i32>,
}

impl LabelMap {
    /// Boolean membership grid for one cluster
    pub fn cluster_bits(&self, index: usize) -> Vec<bool> {
        let index = index as i32;
        self.labels.iter().map(|&label| label == index).collect()
    }

    /// Binary `Mat` (0/255) selecting one cluster
    pub fn cluster_mask(&self, index: usize) -> Result<Mat> {
        raster::bits_to_mask(self.width, self.height, &self.cluster_bits(index))
    }

    /// Pixel count of every cluster, indexed by cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.k];
        for &label in &self.labels {
            if label >= 0 {
                if let Some(size) = sizes.get_mut(label as usize) {
                    *size += 1;
                }
            }
        }
        sizes
    }
}

/// K-means segmenter over the weighted hue circle
pub struct ColorSegmenter {
    attempts: i32,
    max_iterations: i32,
    epsilon: f64,
    rng_seed: Option<i32>,
}

impl Default for ColorSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorSegmenter {
    /// Create a segmenter with default clustering parameters
    pub fn new() -> Self {
        Self {
            attempts: ATTEMPTS,
            max_iterations: MAX_ITERATIONS,
            epsilon: EPSILON,
            rng_seed: None,
        }
    }

    /// Reseed the thread's OpenCV RNG before every run
    pub fn with_seed(mut self, seed: Option<i32>) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Assign every colored pixel to one of `k` clusters.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::NoColoredPixels` (via the caller's thresholds)
    /// when the mask is empty and `InsufficientColoredPixels` when there are
    /// fewer colored pixels than clusters.
    pub fn segment(
        &self,
        hsv: &HsvPlanes,
        mask: &ColorMask,
        k: usize,
        thresholds: (u8, u8),
    ) -> Result<LabelMap> {
        let indices: Vec<usize> = mask.indices().collect();
        if indices.is_empty() {
            return Err(AnalysisError::NoColoredPixels {
                s_thr: thresholds.0,
                v_thr: thresholds.1,
            });
        }
        if indices.len() < k {
            return Err(AnalysisError::InsufficientColoredPixels {
                pixels: indices.len(),
                clusters: k,
            });
        }

        let features: Vec<[f32; 4]> = indices
            .iter()
            .map(|&i| weighted_features(hsv.hue[i], hsv.saturation[i], hsv.value[i]))
            .collect();

        let assignments = self.run_kmeans(&features, k)?;

        let mut labels = vec![UNASSIGNED; hsv.len()];
        for (&pixel, &label) in indices.iter().zip(&assignments) {
            labels[pixel] = label;
        }

        Ok(LabelMap {
            width: hsv.width,
            height: hsv.height,
            k,
            labels,
        })
    }

    fn run_kmeans(&self, features: &[[f32; 4]], k: usize) -> Result<Vec<i32>> {
        let data = Mat::from_slice_2d(features)
            .map_err(|e| AnalysisError::opencv("Feature matrix", e))?;

        let criteria = TermCriteria::new(
            core::TermCriteria_EPS + core::TermCriteria_MAX_ITER,
            self.max_iterations,
            self.epsilon,
        )
        .map_err(|e| AnalysisError::opencv("Termination criteria", e))?;

        if let Some(seed) = self.rng_seed {
            core::set_rng_seed(seed).map_err(|e| AnalysisError::opencv("RNG seed", e))?;
        }

        let mut labels = Mat::default();
        let mut centers = Mat::default();
        let compactness = core::kmeans(
            &data,
            k as i32,
            &mut labels,
            criteria,
            self.attempts,
            core::KMEANS_PP_CENTERS,
            &mut centers,
        )
        .map_err(|e| AnalysisError::opencv("K-means clustering", e))?;

        log::debug!(
            "k-means over {} pixels, k = {}, compactness = {:.3}",
            features.len(),
            k,
            compactness
        );

        let labels = labels
            .data_typed::<i32>()
            .map_err(|e| AnalysisError::opencv("Label access", e))?;

        Ok(labels.to_vec())
    }
}

/// Feature vector of one pixel: hue circle, saturation, value, all weighted
pub fn weighted_features(hue: u8, saturation: u8, value: u8) -> [f32; 4] {
    let theta = (hue as f32 / 180.0) * std::f32::consts::TAU;
    [
        HUE_WEIGHT * theta.cos(),
        HUE_WEIGHT * theta.sin(),
        SATURATION_WEIGHT * (saturation as f32 / 255.0),
        VALUE_WEIGHT * (value as f32 / 255.0),
    ]
}
