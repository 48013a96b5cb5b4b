//! End-to-end length analysis
//!
//! One call runs: load image → calibrate scale → color mask → resolve K →
//! segment → per cluster clean, measure and describe → assemble.
//!
//! [`Analyzer::analyze_with_fallback`] adds one retry: when the configured
//! strategy measured nothing at all, the clusters are measured again with
//! the fallback strategy and the result records which one produced it.

use std::sync::Arc;

use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::calibration::{ReferenceRegion, ScaleCalibrator};
use crate::color::{
    estimate_cluster_count, ClusterDescriber, ColorSegmenter, HsvPlanes, LabelMap,
};
use crate::config::{AnalysisConfig, ClusterCount, MeasureMethod, OutputMode};
use crate::image_loader::{validate_bgr, ImageSource};
use crate::measure::{LengthMeasurer, ShapeCleaner, Skeletonizer, ZhangSuenThinning};
use crate::{AnalysisError, Result};

/// Length and color of one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// 0-based cluster index; serialized 1-based as `cluster_id`
    #[serde(rename = "cluster_id", with = "one_based")]
    pub index: usize,
    /// Summed length of the cluster's shapes in meters
    pub sum_length_m: f64,
    /// Dominant color as uppercase `#RRGGBB`
    pub dominant_hex: String,
}

impl ClusterRecord {
    /// 1-based identifier as reported to callers
    pub fn cluster_id(&self) -> usize {
        self.index + 1
    }
}

/// Outcome of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Calibration scale in meters per pixel
    pub m_per_px: f64,
    /// Number of clusters used
    pub k: usize,
    /// Strategy that produced the lengths
    pub measure: MeasureMethod,
    /// One record per cluster, ascending by index
    pub clusters: Vec<ClusterRecord>,
    /// Set when a zero-length result was measured again with this strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_measure: Option<MeasureMethod>,
}

impl AnalysisResult {
    /// Sum of all cluster lengths in meters
    pub fn total_length_m(&self) -> f64 {
        self.clusters.iter().map(|c| c.sum_length_m).sum()
    }

    /// Encode as JSON; `indent` 0 gives the compact form
    pub fn to_json(&self, indent: usize) -> Result<String> {
        if indent == 0 {
            return Ok(serde_json::to_string(self)?);
        }

        let indent = " ".repeat(indent);
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Result in the shape selected by [`OutputMode`]
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutput {
    Structured(AnalysisResult),
    Serialized(String),
}

impl AnalysisOutput {
    /// Structured view, decoding the JSON form if needed
    pub fn into_result(self) -> Result<AnalysisResult> {
        match self {
            AnalysisOutput::Structured(result) => Ok(result),
            AnalysisOutput::Serialized(json) => AnalysisResult::from_json(&json),
        }
    }
}

/// Calibrated and segmented image, ready to be measured
struct Segmentation {
    m_per_px: f64,
    labels: LabelMap,
}

/// One measurement pass over every cluster
struct Attempt {
    result: AnalysisResult,
    /// At least one cluster could not be measured with the requested strategy
    degraded: bool,
}

/// Runs the analysis pipeline with one configuration.
///
/// Holds no per-call state, so one analyzer can serve many threads.
pub struct Analyzer {
    config: AnalysisConfig,
    skeletonizer: Option<Arc<dyn Skeletonizer>>,
}

impl Analyzer {
    /// Create an analyzer using the built-in Zhang–Suen thinning
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            skeletonizer: Some(Arc::new(ZhangSuenThinning)),
        }
    }

    /// Replace the thinning backend
    pub fn with_skeletonizer(mut self, skeletonizer: Arc<dyn Skeletonizer>) -> Self {
        self.skeletonizer = Some(skeletonizer);
        self
    }

    /// Drop the thinning backend; skeleton measurements come back empty
    pub fn without_skeletonizer(mut self) -> Self {
        self.skeletonizer = None;
        self
    }

    /// Analyze an image source with the configured strategy
    pub fn analyze(
        &self,
        source: &ImageSource,
        reference: ReferenceRegion,
        reference_length_m: f64,
    ) -> Result<AnalysisOutput> {
        let image = source.load()?;
        let result = self.analyze_image(&image, reference, reference_length_m)?;
        self.render(result)
    }

    /// Like [`Analyzer::analyze`], with one retry when nothing was measured
    pub fn analyze_with_fallback(
        &self,
        source: &ImageSource,
        reference: ReferenceRegion,
        reference_length_m: f64,
    ) -> Result<AnalysisOutput> {
        let image = source.load()?;
        let result = self.analyze_image_with_fallback(&image, reference, reference_length_m)?;
        self.render(result)
    }

    /// Analyze a decoded BGR image with the configured strategy
    pub fn analyze_image(
        &self,
        image: &Mat,
        reference: ReferenceRegion,
        reference_length_m: f64,
    ) -> Result<AnalysisResult> {
        let segmentation = self.segment(image, reference, reference_length_m)?;
        let attempt = self.assemble(image, &segmentation, self.config.measure)?;
        log_summary(&attempt.result);
        Ok(attempt.result)
    }

    /// Analyze a decoded BGR image, retrying a zero-length result once
    pub fn analyze_image_with_fallback(
        &self,
        image: &Mat,
        reference: ReferenceRegion,
        reference_length_m: f64,
    ) -> Result<AnalysisResult> {
        let segmentation = self.segment(image, reference, reference_length_m)?;
        let Attempt {
            result: first,
            degraded,
        } = self.assemble(image, &segmentation, self.config.measure)?;

        let fallback = match first.measure.fallback() {
            Some(fallback) if degraded || first.total_length_m() <= 0.0 => fallback,
            _ => {
                log_summary(&first);
                return Ok(first);
            }
        };

        let reason = if degraded { "is unavailable" } else { "found no length" };
        log::warn!("{} measurement {}, retrying with {}", first.measure, reason, fallback);

        match self.assemble(image, &segmentation, fallback) {
            Ok(Attempt {
                result: mut retried,
                ..
            }) => {
                retried.fallback_measure = Some(fallback);
                log_summary(&retried);
                Ok(retried)
            }
            Err(e) => {
                log::warn!("{} retry failed: {}", fallback, e);
                log_summary(&first);
                Ok(first)
            }
        }
    }

    /// Calibrate, mask, resolve K and cluster
    fn segment(
        &self,
        image: &Mat,
        reference: ReferenceRegion,
        reference_length_m: f64,
    ) -> Result<Segmentation> {
        validate_bgr(image)?;
        if !self.config.min_area.is_finite() || self.config.min_area < 0.0 {
            return Err(AnalysisError::invalid_parameter("min_area", self.config.min_area));
        }

        let m_per_px = ScaleCalibrator::new().calibrate(image, reference, reference_length_m)?;

        let hsv = HsvPlanes::from_bgr(image)?;
        let mask = hsv.color_mask(self.config.s_thr, self.config.v_thr);
        let thresholds = (self.config.s_thr, self.config.v_thr);

        let k = match self.config.k {
            ClusterCount::Fixed(requested) => ClusterCount::clamp_explicit(requested),
            ClusterCount::Auto => {
                match estimate_cluster_count(&hsv.hue, &mask, self.config.min_dist) {
                    0 => {
                        return Err(AnalysisError::NoColoredPixels {
                            s_thr: thresholds.0,
                            v_thr: thresholds.1,
                        })
                    }
                    k => k,
                }
            }
        };

        log::debug!(
            "{} of {} pixels colored, k = {} ({})",
            mask.count(),
            hsv.len(),
            k,
            self.config.k
        );

        let labels = ColorSegmenter::new()
            .with_seed(self.config.rng_seed)
            .segment(&hsv, &mask, k, thresholds)?;
        log::debug!("cluster sizes {:?}", labels.cluster_sizes());

        Ok(Segmentation { m_per_px, labels })
    }

    /// Clean, measure and describe every cluster
    fn assemble(
        &self,
        image: &Mat,
        segmentation: &Segmentation,
        measure: MeasureMethod,
    ) -> Result<Attempt> {
        if measure == MeasureMethod::Skeleton {
            match &self.skeletonizer {
                Some(skeletonizer) => log::debug!("thinning with {}", skeletonizer.name()),
                None => log::warn!("skeleton measurement requested without a thinning backend"),
            }
        }

        let cleaner = ShapeCleaner::new()?;
        let measurer = LengthMeasurer::new(measure, self.skeletonizer.clone())
            .with_min_area(self.config.min_area);

        let labels = &segmentation.labels;
        let mut clusters = Vec::with_capacity(labels.k);
        let mut degraded = false;
        for index in 0..labels.k {
            let cleaned = cleaner.clean(&labels.cluster_mask(index)?)?;
            let measurement = measurer.measure(&cleaned)?;
            let color = ClusterDescriber::describe(image, &cleaned)?;
            degraded |= measurement.degraded;

            log::debug!(
                "cluster {}: {} shapes, {:.1} px, {}",
                index + 1,
                measurement.lengths.len(),
                measurement.total_px,
                color.hex()
            );

            clusters.push(ClusterRecord {
                index,
                sum_length_m: measurement.total_px * segmentation.m_per_px,
                dominant_hex: color.hex(),
            });
        }

        Ok(Attempt {
            result: AnalysisResult {
                m_per_px: segmentation.m_per_px,
                k: labels.k,
                measure,
                clusters,
                fallback_measure: None,
            },
            degraded,
        })
    }

    fn render(&self, result: AnalysisResult) -> Result<AnalysisOutput> {
        match self.config.output_mode {
            OutputMode::Structured => Ok(AnalysisOutput::Structured(result)),
            OutputMode::Serialized => Ok(AnalysisOutput::Serialized(
                result.to_json(self.config.json_indent)?,
            )),
        }
    }
}

fn log_summary(result: &AnalysisResult) {
    log::info!(
        "{} clusters measured by {}: {:.3} m total at {:.6} m/px",
        result.k,
        result.measure,
        result.total_length_m(),
        result.m_per_px
    );
}

/// Analyze an image source with `config`
pub fn analyze(
    source: &ImageSource,
    reference: ReferenceRegion,
    reference_length_m: f64,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput> {
    Analyzer::new(config.clone()).analyze(source, reference, reference_length_m)
}

/// Analyze an image source with `config`, retrying a zero-length result once
pub fn analyze_with_fallback(
    source: &ImageSource,
    reference: ReferenceRegion,
    reference_length_m: f64,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput> {
    Analyzer::new(config.clone()).analyze_with_fallback(source, reference, reference_length_m)
}

mod one_based {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(index: &usize, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*index as u64 + 1)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        let id = u64::deserialize(deserializer)?;
        id.checked_sub(1)
            .map(|index| index as usize)
            .ok_or_else(|| D::Error::custom("cluster_id starts at 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Scalar, CV_8UC3};
    use opencv::imgproc::{rectangle, FILLED, LINE_8};
    use opencv::prelude::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// White canvas, 101 px black reference bar, red and blue stripes
    fn scene() -> Mat {
        let mut image =
            Mat::new_rows_cols_with_default(300, 400, CV_8UC3, Scalar::all(255.0)).unwrap();
        let mut fill = |rect: Rect, bgr: (f64, f64, f64)| {
            rectangle(&mut image, rect, Scalar::new(bgr.0, bgr.1, bgr.2, 0.0), FILLED, LINE_8, 0)
                .unwrap();
        };
        fill(Rect::new(100, 250, 101, 6), (0.0, 0.0, 0.0));
        fill(Rect::new(50, 60, 201, 40), (0.0, 0.0, 255.0));
        fill(Rect::new(50, 150, 151, 30), (255.0, 0.0, 0.0));
        image
    }

    fn reference() -> ReferenceRegion {
        ReferenceRegion::new(80, 230, 230, 280)
    }

    fn box_config() -> AnalysisConfig {
        AnalysisConfig {
            k: ClusterCount::Fixed(2),
            measure: MeasureMethod::Box,
            ..AnalysisConfig::default()
        }
    }

    fn record<'a>(result: &'a AnalysisResult, hex: &str) -> &'a ClusterRecord {
        result
            .clusters
            .iter()
            .find(|c| c.dominant_hex == hex)
            .unwrap_or_else(|| panic!("no {} cluster in {:?}", hex, result.clusters))
    }

    /// Thinning backend that never finds a skeleton
    struct BlankThinning;

    impl Skeletonizer for BlankThinning {
        fn name(&self) -> &'static str {
            "blank"
        }

        fn skeletonize(&self, mask: &Mat) -> Result<Mat> {
            let (width, height) = (mask.cols() as usize, mask.rows() as usize);
            crate::raster::bits_to_mask(width, height, &vec![false; width * height])
        }
    }

    /// Thinning backend that keeps a fixed 200 px line on row 80, x in
    /// 50..250, wherever the mask covers it
    struct FixedLineThinning;

    impl Skeletonizer for FixedLineThinning {
        fn name(&self) -> &'static str {
            "fixed-line"
        }

        fn skeletonize(&self, mask: &Mat) -> Result<Mat> {
            let (width, height) = (mask.cols() as usize, mask.rows() as usize);
            let plane = crate::raster::mat_to_plane(mask)?;
            let bits: Vec<bool> = plane
                .iter()
                .enumerate()
                .map(|(i, &v)| v > 0 && i / width == 80 && (50..250).contains(&(i % width)))
                .collect();
            crate::raster::bits_to_mask(width, height, &bits)
        }
    }

    #[test]
    fn test_box_lengths_and_colors() {
        init_logger();
        let result = Analyzer::new(box_config())
            .analyze_image(&scene(), reference(), 5.0)
            .unwrap();

        assert!((result.m_per_px - 0.05).abs() < 1e-9);
        assert_eq!(result.k, 2);
        assert_eq!(result.measure, MeasureMethod::Box);
        assert_eq!(result.fallback_measure, None);
        assert_eq!(
            result.clusters.iter().map(|c| c.cluster_id()).collect::<Vec<_>>(),
            vec![1, 2]
        );

        assert!((record(&result, "#FF0000").sum_length_m - 10.0).abs() < 0.1);
        assert!((record(&result, "#0000FF").sum_length_m - 7.5).abs() < 0.1);
    }

    #[test]
    fn test_skeleton_measures_something() {
        init_logger();
        let config = AnalysisConfig {
            measure: MeasureMethod::Skeleton,
            ..box_config()
        };
        let result = Analyzer::new(config)
            .analyze_image_with_fallback(&scene(), reference(), 5.0)
            .unwrap();

        assert_eq!(result.measure, MeasureMethod::Skeleton);
        assert_eq!(result.fallback_measure, None);
        assert!(result.clusters.iter().all(|c| c.sum_length_m > 0.0));

        // Thinning a 201x40 bar pulls both ends in by about half its height,
        // so the skeleton is well short of the box length of 10 m
        let red = record(&result, "#FF0000").sum_length_m;
        assert!((7.5..9.0).contains(&red), "red skeleton length {}", red);
    }

    #[test]
    fn test_skeleton_pixels_convert_to_meters() {
        init_logger();
        let config = box_config().with_measure(MeasureMethod::Skeleton);
        let result = Analyzer::new(config)
            .with_skeletonizer(Arc::new(FixedLineThinning))
            .analyze_image_with_fallback(&scene(), reference(), 5.0)
            .unwrap();

        assert_eq!(result.measure, MeasureMethod::Skeleton);
        assert_eq!(result.fallback_measure, None);
        assert!((result.m_per_px - 0.05).abs() < 1e-9);
        // 200 skeleton pixels at 0.05 m/px
        assert!((record(&result, "#FF0000").sum_length_m - 10.0).abs() < 1e-9);
        assert_eq!(record(&result, "#0000FF").sum_length_m, 0.0);
        assert!((result.total_length_m() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_backend_falls_back_to_box() {
        let config = box_config().with_measure(MeasureMethod::Skeleton);
        let analyzer = Analyzer::new(config).without_skeletonizer();

        let attempt = analyzer
            .assemble(
                &scene(),
                &analyzer.segment(&scene(), reference(), 5.0).unwrap(),
                MeasureMethod::Skeleton,
            )
            .unwrap();
        assert!(attempt.degraded);
        assert_eq!(attempt.result.total_length_m(), 0.0);

        let result = analyzer
            .analyze_image_with_fallback(&scene(), reference(), 5.0)
            .unwrap();
        assert_eq!(result.fallback_measure, Some(MeasureMethod::Box));
        assert!((record(&result, "#0000FF").sum_length_m - 7.5).abs() < 0.1);
    }

    #[test]
    fn test_fallback_after_empty_skeleton() {
        init_logger();
        let config = box_config().with_measure(MeasureMethod::Skeleton);

        let without = Analyzer::new(config.clone()).without_skeletonizer();
        let result = without.analyze_image(&scene(), reference(), 5.0).unwrap();
        assert_eq!(result.total_length_m(), 0.0);

        let blank = Analyzer::new(config).with_skeletonizer(Arc::new(BlankThinning));
        for analyzer in [without, blank] {
            let result = analyzer
                .analyze_image_with_fallback(&scene(), reference(), 5.0)
                .unwrap();
            assert_eq!(result.measure, MeasureMethod::Box);
            assert_eq!(result.fallback_measure, Some(MeasureMethod::Box));
            assert!((record(&result, "#FF0000").sum_length_m - 10.0).abs() < 0.1);
        }
    }

    #[test]
    fn test_box_is_not_retried() {
        let mut image = scene();
        let white = Scalar::all(255.0);
        rectangle(&mut image, Rect::new(0, 0, 400, 200), white, FILLED, LINE_8, 0).unwrap();
        // Colored specks too small to survive cleanup
        let red = Scalar::new(0.0, 0.0, 255.0, 0.0);
        for x in [20, 60, 100, 140] {
            rectangle(&mut image, Rect::new(x, 100, 1, 1), red, FILLED, LINE_8, 0).unwrap();
        }

        let result = Analyzer::new(box_config())
            .analyze_image_with_fallback(&image, reference(), 5.0)
            .unwrap();
        assert_eq!(result.total_length_m(), 0.0);
        assert_eq!(result.fallback_measure, None);
        assert!(result.clusters.iter().all(|c| c.dominant_hex == "#000000"));
    }

    #[test]
    fn test_explicit_k_is_clamped() {
        let config = AnalysisConfig {
            k: ClusterCount::Fixed(1),
            ..box_config()
        };
        let result = Analyzer::new(config).analyze_image(&scene(), reference(), 5.0).unwrap();
        assert_eq!(result.k, 2);
        assert_eq!(result.clusters.len(), 2);
    }

    #[test]
    fn test_auto_k_in_range() {
        let config = AnalysisConfig {
            k: ClusterCount::Auto,
            ..box_config()
        };
        let result = Analyzer::new(config).analyze_image(&scene(), reference(), 5.0).unwrap();
        assert!((5..=12).contains(&result.k));
        assert_eq!(result.clusters.len(), result.k);
        assert!(result.clusters.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn test_gray_image_fails_segmentation() {
        let mut image =
            Mat::new_rows_cols_with_default(300, 400, CV_8UC3, Scalar::all(180.0)).unwrap();
        let bar = Rect::new(100, 250, 101, 6);
        rectangle(&mut image, bar, Scalar::all(0.0), FILLED, LINE_8, 0).unwrap();

        for k in [ClusterCount::Auto, ClusterCount::Fixed(3)] {
            let config = AnalysisConfig { k, ..box_config() };
            let err = Analyzer::new(config).analyze_image(&image, reference(), 5.0).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::SegmentationFailure);
        }
    }

    #[test]
    fn test_negative_min_area_rejected() {
        let config = AnalysisConfig {
            min_area: -1.0,
            ..box_config()
        };
        let err = Analyzer::new(config).analyze_image(&scene(), reference(), 5.0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_serialized_output() {
        let config = AnalysisConfig {
            output_mode: OutputMode::Serialized,
            json_indent: 0,
            ..box_config()
        };
        let output = Analyzer::new(config)
            .analyze(&ImageSource::Buffer(scene()), reference(), 5.0)
            .unwrap();

        let json = match &output {
            AnalysisOutput::Serialized(json) => json.clone(),
            other => panic!("expected JSON, got {:?}", other),
        };
        assert!(!json.contains('\n'));
        assert!(json.starts_with("{\"m_per_px\":"));
        assert!(!json.contains("fallback_measure"));

        let result = output.into_result().unwrap();
        assert_eq!(result.k, 2);
    }

    #[test]
    fn test_json_shape() {
        let result = AnalysisResult {
            m_per_px: 0.05,
            k: 2,
            measure: MeasureMethod::Skeleton,
            clusters: vec![
                ClusterRecord {
                    index: 0,
                    sum_length_m: 1.5,
                    dominant_hex: "#FF0000".to_string(),
                },
                ClusterRecord {
                    index: 1,
                    sum_length_m: 0.0,
                    dominant_hex: "#000000".to_string(),
                },
            ],
            fallback_measure: Some(MeasureMethod::Box),
        };

        let value: serde_json::Value = serde_json::from_str(&result.to_json(2).unwrap()).unwrap();
        assert_eq!(value["measure"], "skeleton");
        assert_eq!(value["fallback_measure"], "box");
        assert_eq!(value["clusters"][0]["cluster_id"], 1);
        assert_eq!(value["clusters"][1]["cluster_id"], 2);
        assert_eq!(value["clusters"][1]["dominant_hex"], "#000000");

        let pretty = result.to_json(4).unwrap();
        assert!(pretty.contains("\n    \"k\": 2"));
        assert_eq!(AnalysisResult::from_json(&pretty).unwrap(), result);
    }

    #[test]
    fn test_zero_cluster_id_rejected() {
        let json = r##"{"m_per_px":1.0,"k":1,"measure":"box","clusters":[
            {"cluster_id":0,"sum_length_m":0.0,"dominant_hex":"#000000"}]}"##;
        assert!(AnalysisResult::from_json(json).is_err());
    }

    #[test]
    fn test_analyzer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analyzer>();
    }
}
