//! Tuning constants for length analysis
//!
//! Defaults for the color mask, cluster-count estimation, clustering and
//! morphology. Per-call overrides live in [`crate::config::AnalysisConfig`].

/// Color mask thresholds (OpenCV HSV, S and V in [0, 255])
pub mod color_mask {
    /// Minimum saturation (exclusive) for a pixel to count as colored
    pub const DEFAULT_S_THRESHOLD: u8 = 60;

    /// Minimum value (exclusive) for a pixel to count as colored
    pub const DEFAULT_V_THRESHOLD: u8 = 40;
}

/// Hue histogram peak estimation
pub mod peaks {
    /// Number of hue buckets (half-resolution hue wheel)
    pub const HUE_BINS: usize = 180;

    /// Default minimum separation between accepted peaks, in buckets
    pub const DEFAULT_MIN_DISTANCE: usize = 8;

    /// Minimum peak height as a fraction of colored pixels
    pub const MIN_HEIGHT_FRACTION: f64 = 0.01;

    /// Absolute floor on the minimum peak height
    pub const MIN_HEIGHT_FLOOR: u32 = 20;

    /// Cluster count used when fewer than two peaks are found
    pub const FALLBACK_CLUSTERS: usize = 5;

    /// Bounds for an automatically estimated cluster count
    pub const AUTO_MIN_CLUSTERS: usize = 5;
    pub const AUTO_MAX_CLUSTERS: usize = 12;
}

/// K-means clustering over the weighted hue circle
pub mod segmentation {
    /// Bounds for a caller-supplied cluster count
    pub const EXPLICIT_MIN_CLUSTERS: usize = 2;
    pub const EXPLICIT_MAX_CLUSTERS: usize = 24;

    /// Weight of each hue-circle coordinate
    pub const HUE_WEIGHT: f32 = 3.0;

    /// Weight of normalized saturation
    pub const SATURATION_WEIGHT: f32 = 0.5;

    /// Weight of normalized value
    pub const VALUE_WEIGHT: f32 = 0.5;

    /// Iteration cap per attempt
    pub const MAX_ITERATIONS: i32 = 60;

    /// Centroid movement at which an attempt is considered converged
    pub const EPSILON: f64 = 1e-3;

    /// Random restarts; the most compact run wins
    pub const ATTEMPTS: i32 = 10;

    /// Default seed for the clustering RNG
    pub const DEFAULT_RNG_SEED: i32 = 12345;

    /// Label assigned to pixels outside the color mask
    pub const UNASSIGNED: i32 = -1;
}

/// Reference calibration
pub mod calibration {
    /// Upper bound on HSV value for reference pixels
    pub const DARK_VALUE_MAX: f64 = 50.0;

    /// Looser value bound used by the whole-image reference search
    pub const DARK_VALUE_MAX_LOOSE: f64 = 80.0;

    /// Default physical length of the reference line in meters
    pub const DEFAULT_REFERENCE_LENGTH_M: f64 = 5.0;
}

/// Morphological cleanup and length measurement
pub mod morphology {
    /// Speckle-removal opening kernel (width, height)
    pub const OPEN_KERNEL: (i32, i32) = (3, 3);

    /// Horizontal gap-bridging closing kernel (width, height)
    pub const CLOSE_KERNEL_HORIZONTAL: (i32, i32) = (25, 3);

    /// Vertical gap-bridging closing kernel (width, height)
    pub const CLOSE_KERNEL_VERTICAL: (i32, i32) = (3, 25);

    /// Minimum contour area accepted by the box strategy
    pub const DEFAULT_MIN_AREA: f64 = 30.0;
}

/// Output formatting
pub mod output {
    /// Default indentation of serialized results
    pub const DEFAULT_JSON_INDENT: usize = 2;

    /// Color reported for clusters with no pixels
    pub const EMPTY_CLUSTER_HEX: &str = "#000000";
}
