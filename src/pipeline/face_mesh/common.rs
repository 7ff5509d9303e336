use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Landmark};

pub const INPUT_SIZE: u32 = 192;

/// Enlargement applied to the landmark bounding box when tracking.
const TRACKING_ROI_SCALE: f32 = 1.5;

/// Square crop of the frame fed to the landmark model, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionOfInterest {
    pub left: f32,
    pub top: f32,
    pub side: f32,
}

impl RegionOfInterest {
    /// Largest square centered in the frame.
    pub fn centered(width: u32, height: u32) -> Self {
        let side = width.min(height) as f32;
        Self {
            left: (width as f32 - side) / 2.0,
            top: (height as f32 - side) / 2.0,
            side,
        }
    }

    /// Square around the previous face, clamped to stay inside the frame.
    pub fn around_landmarks(landmarks: &[Landmark], width: u32, height: u32) -> Option<Self> {
        let first = landmarks.first()?;
        let (mut min_x, mut min_y) = first.to_pixel(width, height);
        let (mut max_x, mut max_y) = (min_x, min_y);
        for landmark in &landmarks[1..] {
            let (x, y) = landmark.to_pixel(width, height);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let frame_side = width.min(height) as f32;
        let side = ((max_x - min_x).max(max_y - min_y) * TRACKING_ROI_SCALE).clamp(1.0, frame_side);
        let cx = (min_x + max_x) / 2.0;
        let cy = (min_y + max_y) / 2.0;
        Some(Self {
            left: (cx - side / 2.0).clamp(0.0, width as f32 - side),
            top: (cy - side / 2.0).clamp(0.0, height as f32 - side),
            side,
        })
    }
}

/// Crops `roi` out of the frame and resizes it into a normalized NHWC tensor.
pub fn prepare_crop(frame: &Frame, roi: &RegionOfInterest) -> Result<Array4<f32>> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(INPUT_SIZE, INPUT_SIZE, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear))
        .crop(
            roi.left as f64,
            roi.top as f64,
            roi.side as f64,
            roi.side as f64,
        );
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("face crop resize failed")?;
    let resized = dst_image.into_vec();

    let normalized: Vec<f32> = resized
        .par_chunks_exact(4)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();

    Array4::<f32>::from_shape_vec(
        (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
        normalized,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    if flat.is_empty() || flat.len() % 3 != 0 {
        return Err(anyhow!(
            "unexpected landmarks length {}, need a non-empty multiple of 3",
            flat.len()
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}

/// Maps model-space coordinates back to frame-normalized landmarks.
pub fn project_landmarks(
    raw: &[[f32; 3]],
    roi: &RegionOfInterest,
    width: u32,
    height: u32,
) -> Vec<Landmark> {
    let scale = roi.side / INPUT_SIZE as f32;
    raw.iter()
        .map(|[x, y, z]| {
            Landmark::new(
                (roi.left + x * scale) / width as f32,
                (roi.top + y * scale) / height as f32,
                z * scale / width as f32,
            )
        })
        .collect()
}

pub fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}
