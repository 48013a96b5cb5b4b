//! # Scan Lengths
//!
//! A Rust crate for measuring the length of colored features (lines, cracks,
//! markings) in photographs.
//!
//! This library turns one photo into per-color length totals by:
//! - Calibrating pixels to meters from a dark reference object of known length
//! - Masking colored pixels and estimating how many hue families they form
//! - Clustering colored pixels with hue-weighted K-means
//! - Cleaning each cluster and measuring its shapes (skeleton or bounding box)
//! - Reporting each cluster's total length and dominant color
//!
//! ## Example
//!
//! ```rust,no_run
//! use scan_lengths::{analyze, AnalysisConfig, ImageSource, ReferenceRegion};
//! use std::path::PathBuf;
//!
//! let source = ImageSource::File(PathBuf::from("photo.jpg"));
//! let reference: ReferenceRegion = "120,900,620,940".parse()?;
//! let output = analyze(&source, reference, 5.0, &AnalysisConfig::default())?;
//!
//! for cluster in output.into_result()?.clusters {
//!     let id = cluster.cluster_id();
//!     println!("#{} {:.2} m {}", id, cluster.sum_length_m, cluster.dominant_hex);
//! }
//! # Ok::<(), scan_lengths::AnalysisError>(())
//! ```

pub mod calibration;
pub mod color;
pub mod config;
pub mod constants;
pub mod error;
pub mod image_loader;
pub mod measure;
pub mod pipeline;
pub mod raster;

pub use calibration::{locate_reference_region, ReferenceRegion, ScaleCalibrator};
pub use config::{AnalysisConfig, ClusterCount, MeasureMethod, OutputMode};
pub use error::{AnalysisError, ErrorKind, Result};
pub use image_loader::ImageSource;
pub use measure::{LengthMeasurement, Skeletonizer, ZhangSuenThinning};
pub use pipeline::{
    analyze, analyze_with_fallback, AnalysisOutput, AnalysisResult, Analyzer, ClusterRecord,
};
