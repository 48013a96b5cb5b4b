//! Configuration structures for the scan_lengths analysis pipeline.
//!
//! Every tunable option of an analysis call lives in [`AnalysisConfig`].
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use scan_lengths::AnalysisConfig;
//! use std::path::Path;
//!
//! // Load from file
//! let config = AnalysisConfig::from_json_file(Path::new("config.json"))?;
//!
//! // Or use defaults
//! let config = AnalysisConfig::default();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Every field has a default, so a partial file such as
//! `{"k": 6, "measure": "box"}` is valid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{color_mask, morphology, output, peaks, segmentation};
use crate::error::AnalysisError;

/// Complete option bundle for one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Cluster count: an explicit integer or `"auto"`
    pub k: ClusterCount,

    /// Saturation threshold of the color mask (exclusive)
    pub s_thr: u8,

    /// Value threshold of the color mask (exclusive)
    pub v_thr: u8,

    /// Minimum hue-bucket separation between histogram peaks
    pub min_dist: usize,

    /// Length measurement strategy
    pub measure: MeasureMethod,

    /// Minimum contour area accepted by the box strategy (pixels²)
    pub min_area: f64,

    /// Return the result as a struct or as a JSON string
    pub output_mode: OutputMode,

    /// Indentation of serialized output; 0 gives compact JSON
    pub json_indent: usize,

    /// Seed for the clustering RNG; `None` leaves the thread RNG untouched
    pub rng_seed: Option<i32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            k: ClusterCount::Auto,
            s_thr: color_mask::DEFAULT_S_THRESHOLD,
            v_thr: color_mask::DEFAULT_V_THRESHOLD,
            min_dist: peaks::DEFAULT_MIN_DISTANCE,
            measure: MeasureMethod::Skeleton,
            min_area: morphology::DEFAULT_MIN_AREA,
            output_mode: OutputMode::Structured,
            json_indent: output::DEFAULT_JSON_INDENT,
            rng_seed: Some(segmentation::DEFAULT_RNG_SEED),
        }
    }
}

impl AnalysisConfig {
    /// Same configuration with a different measurement strategy
    pub fn with_measure(&self, measure: MeasureMethod) -> Self {
        Self {
            measure,
            ..self.clone()
        }
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Requested number of color clusters.
///
/// Serialized as the string `"auto"` or as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ClusterCountRepr", into = "ClusterCountRepr")]
pub enum ClusterCount {
    /// Estimate from the hue histogram, clamped to [5, 12]
    #[default]
    Auto,
    /// Caller-supplied count, clamped to [2, 24]
    Fixed(i64),
}

impl ClusterCount {
    /// Clamp an explicit count into the accepted range
    pub fn clamp_explicit(requested: i64) -> usize {
        requested.clamp(
            segmentation::EXPLICIT_MIN_CLUSTERS as i64,
            segmentation::EXPLICIT_MAX_CLUSTERS as i64,
        ) as usize
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ClusterCountRepr {
    Fixed(i64),
    Named(String),
}

impl TryFrom<ClusterCountRepr> for ClusterCount {
    type Error = String;

    fn try_from(repr: ClusterCountRepr) -> Result<Self, Self::Error> {
        match repr {
            ClusterCountRepr::Fixed(k) => Ok(ClusterCount::Fixed(k)),
            ClusterCountRepr::Named(name) => name.parse().map_err(|e: AnalysisError| e.to_string()),
        }
    }
}

impl From<ClusterCount> for ClusterCountRepr {
    fn from(count: ClusterCount) -> Self {
        match count {
            ClusterCount::Auto => ClusterCountRepr::Named("auto".to_string()),
            ClusterCount::Fixed(k) => ClusterCountRepr::Fixed(k),
        }
    }
}

impl FromStr for ClusterCount {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(ClusterCount::Auto);
        }
        trimmed
            .parse::<i64>()
            .map(ClusterCount::Fixed)
            .map_err(|_| AnalysisError::invalid_parameter("k", s))
    }
}

impl fmt::Display for ClusterCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterCount::Auto => f.write_str("auto"),
            ClusterCount::Fixed(k) => write!(f, "{}", k),
        }
    }
}

/// Length measurement strategy for cleaned cluster masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureMethod {
    /// Pixel count of each 8-connected skeleton component
    Skeleton,
    /// Longer side of each contour's minimum-area rectangle
    Box,
}

impl MeasureMethod {
    /// Strategy to retry with when this one measured nothing
    pub fn fallback(&self) -> Option<MeasureMethod> {
        match self {
            MeasureMethod::Skeleton => Some(MeasureMethod::Box),
            MeasureMethod::Box => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureMethod::Skeleton => "skeleton",
            MeasureMethod::Box => "box",
        }
    }
}

impl FromStr for MeasureMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skeleton" => Ok(MeasureMethod::Skeleton),
            "box" => Ok(MeasureMethod::Box),
            _ => Err(AnalysisError::invalid_parameter("measure", s)),
        }
    }
}

impl fmt::Display for MeasureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the value returned by [`crate::analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Return an [`crate::AnalysisResult`]
    #[default]
    Structured,
    /// Return the result encoded as JSON
    Serialized,
}
