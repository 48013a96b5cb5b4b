//! Image input resolution
//!
//! Callers hand the pipeline an [`ImageSource`]: a file on disk, an encoded
//! upload still in memory, or an already decoded BGR `Mat`. The source is
//! resolved once at the pipeline entry into a private BGR copy, so the
//! caller's buffer is never touched by later stages.
//!
//! ## Supported Formats
//!
//! Files and encoded bytes are decoded with the `image` crate (JPEG, PNG,
//! GIF, WebP, TIFF, BMP, and the other formats it enables).

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use opencv::{
    core::{Mat, Scalar, CV_8U, CV_8UC3},
    prelude::*,
};

use crate::error::{AnalysisError, Result};

/// Where the pixels of an analysis come from.
#[derive(Debug)]
pub enum ImageSource {
    /// Image file on disk
    File(PathBuf),
    /// Encoded image bytes (e.g. an HTTP upload)
    Encoded(Vec<u8>),
    /// Decoded 3-channel 8-bit image in BGR order
    Buffer(Mat),
}

impl ImageSource {
    /// Decode into a BGR `Mat` owned by the caller.
    pub fn load(&self) -> Result<Mat> {
        match self {
            ImageSource::File(path) => load_image(path),
            ImageSource::Encoded(bytes) => decode_image(bytes),
            ImageSource::Buffer(mat) => {
                validate_bgr(mat)?;
                mat.try_clone()
                    .map_err(|e| AnalysisError::opencv("Image copy", e))
            }
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::File(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::File(path.to_path_buf())
    }
}

impl From<Mat> for ImageSource {
    fn from(mat: Mat) -> Self {
        ImageSource::Buffer(mat)
    }
}

/// Load an image from disk and convert to OpenCV Mat (BGR format)
///
/// # Errors
///
/// Returns `AnalysisError::ImageLoadError` if the file cannot be opened or
/// decoded.
pub fn load_image(path: &Path) -> Result<Mat> {
    let reader = ImageReader::open(path).map_err(|e| {
        AnalysisError::image_load(format!("Failed to open image file: {}", path.display()), e)
    })?;

    let reader = reader.with_guessed_format().map_err(|e| {
        AnalysisError::image_load(format!("Failed to read image file: {}", path.display()), e)
    })?;

    let img: DynamicImage = reader.decode().map_err(|e| {
        AnalysisError::image_load(format!("Failed to decode image: {}", path.display()), e)
    })?;

    dynamic_to_bgr_mat(&img)
}

/// Decode an in-memory encoded image into a BGR Mat
pub fn decode_image(bytes: &[u8]) -> Result<Mat> {
    if bytes.is_empty() {
        return Err(AnalysisError::InvalidImage {
            reason: "empty image buffer".into(),
        });
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| AnalysisError::image_load("Failed to decode image bytes", e))?;

    dynamic_to_bgr_mat(&img)
}

/// Check that a Mat is a non-empty 3-channel 8-bit image
pub fn validate_bgr(mat: &Mat) -> Result<()> {
    if mat.empty() {
        return Err(AnalysisError::InvalidImage {
            reason: "image is empty".into(),
        });
    }
    if mat.channels() != 3 {
        return Err(AnalysisError::InvalidImage {
            reason: format!("expected 3 channels, found {}", mat.channels()),
        });
    }
    if mat.depth() != CV_8U {
        return Err(AnalysisError::InvalidImage {
            reason: format!("expected 8-bit channels, found depth {}", mat.depth()),
        });
    }
    Ok(())
}

fn dynamic_to_bgr_mat(img: &DynamicImage) -> Result<Mat> {
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();
    rgb_to_bgr_mat(rgb_img.as_raw(), width as i32, height as i32)
}

/// Convert RGB byte buffer to OpenCV BGR Mat
pub fn rgb_to_bgr_mat(rgb_data: &[u8], width: i32, height: i32) -> Result<Mat> {
    let expected = (width.max(0) as usize) * (height.max(0) as usize) * 3;
    if width <= 0 || height <= 0 || rgb_data.len() != expected {
        return Err(AnalysisError::InvalidImage {
            reason: format!(
                "RGB buffer of {} bytes does not match {}x{}",
                rgb_data.len(),
                width,
                height
            ),
        });
    }

    let mut mat = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))
        .map_err(|e| AnalysisError::opencv("Image allocation", e))?;

    let bgr = mat
        .data_bytes_mut()
        .map_err(|e| AnalysisError::opencv("Image access", e))?;

    // BGR order for OpenCV
    for (dst, src) in bgr.chunks_exact_mut(3).zip(rgb_data.chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }

    Ok(mat)
}
