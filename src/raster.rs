//! Conversions between OpenCV matrices and plain pixel buffers

use opencv::{
    core::{Mat, Scalar, Vec3b, CV_8UC1},
    prelude::*,
};

use crate::{AnalysisError, Result};

/// Build a single-channel 8-bit `Mat` from row-major bytes.
pub fn plane_to_mat(width: usize, height: usize, data: &[u8]) -> Result<Mat> {
    if data.len() != width * height {
        return Err(AnalysisError::InvalidImage {
            reason: format!(
                "plane has {} bytes, expected {}x{}",
                data.len(),
                width,
                height
            ),
        });
    }

    let (rows, cols) = (height as i32, width as i32);
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(0.0))
        .map_err(|e| AnalysisError::opencv("Plane allocation", e))?;
    mat.data_typed_mut::<u8>()
        .map_err(|e| AnalysisError::opencv("Plane access", e))?
        .copy_from_slice(data);

    Ok(mat)
}

/// Copy a single-channel 8-bit `Mat` into row-major bytes.
pub fn mat_to_plane(mat: &Mat) -> Result<Vec<u8>> {
    if mat.is_continuous() {
        return mat
            .data_typed::<u8>()
            .map(|data| data.to_vec())
            .map_err(|e| AnalysisError::opencv("Plane access", e));
    }

    let owned = mat
        .try_clone()
        .map_err(|e| AnalysisError::opencv("Plane copy", e))?;
    owned
        .data_typed::<u8>()
        .map(|data| data.to_vec())
        .map_err(|e| AnalysisError::opencv("Plane access", e))
}

/// Copy a three-channel 8-bit `Mat` into row-major pixel triples.
pub fn mat_to_pixels(mat: &Mat) -> Result<Vec<[u8; 3]>> {
    let owned;
    let source = if mat.is_continuous() {
        mat
    } else {
        owned = mat
            .try_clone()
            .map_err(|e| AnalysisError::opencv("Pixel copy", e))?;
        &owned
    };

    let pixels = source
        .data_typed::<Vec3b>()
        .map_err(|e| AnalysisError::opencv("Pixel access", e))?;

    Ok(pixels.iter().map(|p| [p[0], p[1], p[2]]).collect())
}

/// Binary plane (0 or 255) from a boolean grid.
pub fn bits_to_mask(width: usize, height: usize, bits: &[bool]) -> Result<Mat> {
    let bytes: Vec<u8> = bits.iter().map(|&on| if on { 255 } else { 0 }).collect();
    plane_to_mat(width, height, &bytes)
}
