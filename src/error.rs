//! Error types for the scan_lengths library

use thiserror::Error;

/// Result type alias for scan_lengths operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Coarse failure classes surfaced to callers.
///
/// The service boundary maps each kind to a different user correction:
/// a bad input file, a missing reference, or a photo without color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreadable image, wrong channel layout, or invalid parameter
    InvalidInput,
    /// Reference region empty, reference missing, or degenerate reference
    CalibrationFailure,
    /// No colored pixels to cluster
    SegmentationFailure,
    /// Internal image-processing or serialization failure
    Processing,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::CalibrationFailure => "CalibrationFailure",
            ErrorKind::SegmentationFailure => "SegmentationFailure",
            ErrorKind::Processing => "Processing",
        };
        f.write_str(name)
    }
}

/// Comprehensive error types for length analysis operations
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Image file could not be loaded or decoded
    #[error("Failed to load image: {message}")]
    ImageLoadError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Decoded image does not have the expected layout
    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Reference rectangle is empty after clipping to the image
    #[error("Reference region ({x1},{y1})-({x2},{y2}) is empty or outside the image")]
    EmptyReferenceRegion { x1: i32, y1: i32, x2: i32, y2: i32 },

    /// No dark object inside the reference region
    #[error("No dark reference object found in the reference region")]
    ReferenceNotFound,

    /// Dark reference measured with zero pixel length
    #[error("Reference object has degenerate pixel length {pixel_length}")]
    DegenerateReference { pixel_length: f64 },

    /// Color mask selected no pixels
    #[error("No colored pixels found (saturation > {s_thr}, value > {v_thr})")]
    NoColoredPixels { s_thr: u8, v_thr: u8 },

    /// Fewer colored pixels than requested clusters
    #[error("Only {pixels} colored pixels available for {clusters} clusters")]
    InsufficientColoredPixels { pixels: usize, clusters: usize },

    /// OpenCV operation failed
    #[error("OpenCV error: {operation}")]
    OpenCvError {
        operation: String,
        #[source]
        source: Option<opencv::Error>,
    },

    /// Result could not be encoded as JSON
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AnalysisError {
    /// Create an image load error with context
    pub fn image_load<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageLoadError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an OpenCV error with context
    pub fn opencv(operation: impl Into<String>, source: opencv::Error) -> Self {
        Self::OpenCvError {
            operation: operation.into(),
            source: Some(source),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Classify this error for the caller
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::ImageLoadError { .. }
            | AnalysisError::InvalidImage { .. }
            | AnalysisError::InvalidParameter { .. } => ErrorKind::InvalidInput,
            AnalysisError::EmptyReferenceRegion { .. }
            | AnalysisError::ReferenceNotFound
            | AnalysisError::DegenerateReference { .. } => ErrorKind::CalibrationFailure,
            AnalysisError::NoColoredPixels { .. }
            | AnalysisError::InsufficientColoredPixels { .. } => ErrorKind::SegmentationFailure,
            AnalysisError::OpenCvError { .. } | AnalysisError::SerializationError(_) => {
                ErrorKind::Processing
            }
        }
    }

    /// Check if the user can fix this by adjusting the photo or parameters
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CalibrationFailure | ErrorKind::SegmentationFailure
        )
    }

    /// Get user-friendly error description for application display
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::InvalidInput => {
                "Could not read the image. Please check the file format and try again.".to_string()
            }
            ErrorKind::CalibrationFailure => concat!(
                "Could not find the black reference line. Please check the reference region ",
                "and make sure the line is clearly visible."
            )
            .to_string(),
            ErrorKind::SegmentationFailure => concat!(
                "No colored features were found. ",
                "Try lowering the saturation or value thresholds."
            )
            .to_string(),
            ErrorKind::Processing => {
                "Length analysis failed. Please try with a different image.".to_string()
            }
        }
    }
}
