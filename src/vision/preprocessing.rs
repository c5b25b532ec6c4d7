// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the acne classifier and detector

use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Square input size of the classifier
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// Square input size of the detector
pub const DETECTOR_INPUT_SIZE: u32 = 640;

/// Letterbox padding value (YOLO convention)
const PAD_VALUE: u8 = 114;

/// Preprocess an image for the classifier
///
/// Steps:
/// 1. Resize (no aspect preservation) to 224x224 with nearest-neighbour sampling
/// 2. Convert to RGB
/// 3. Scale to [0, 1]
/// 4. Lay out as NHWC tensor [1, 224, 224, 3]
pub fn preprocess_for_classifier(image: &DynamicImage) -> Array4<f32> {
    let size = CLASSIFIER_INPUT_SIZE;
    let rgb = image
        .resize_exact(size, size, FilterType::Nearest)
        .to_rgb8();

    let mut tensor = Array4::zeros((1, size as usize, size as usize, 3));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
        }
    }

    tensor
}

/// Geometry of a letterboxed image, used to map boxes back to the source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Source image width
    pub orig_w: u32,
    /// Source image height
    pub orig_h: u32,
    /// Resize factor applied to the source
    pub scale: f32,
    /// Horizontal padding on the left
    pub pad_x: f32,
    /// Vertical padding on the top
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point from model input space back to source pixels, clamped to the image
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = ((x - self.pad_x) / self.scale).clamp(0.0, self.orig_w as f32);
        let sy = ((y - self.pad_y) / self.scale).clamp(0.0, self.orig_h as f32);
        (sx, sy)
    }
}

/// Preprocess an image for the detector
///
/// The image is scaled to fit 640x640 with its aspect ratio preserved, centered on a
/// gray canvas, scaled to [0, 1] and laid out as NCHW [1, 3, 640, 640].
pub fn preprocess_for_detector(image: &DynamicImage) -> (Array4<f32>, Letterbox) {
    let size = DETECTOR_INPUT_SIZE;
    let (canvas, letterbox) = letterbox(image, size);

    let mut tensor = Array4::zeros((1, 3, size as usize, size as usize));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, letterbox)
}

/// Resize with aspect ratio preservation and padding to a square canvas
pub fn letterbox(image: &DynamicImage, target_size: u32) -> (RgbImage, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();
    let mut canvas = RgbImage::from_pixel(target_size, target_size, Rgb([PAD_VALUE; 3]));

    if orig_w == 0 || orig_h == 0 {
        return (
            canvas,
            Letterbox {
                orig_w,
                orig_h,
                scale: 1.0,
                pad_x: 0.0,
                pad_y: 0.0,
            },
        );
    }

    let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let offset_x = (target_size - new_w) / 2;
    let offset_y = (target_size - new_h) / 2;
    image::imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    (
        canvas,
        Letterbox {
            orig_w,
            orig_h,
            scale,
            pad_x: offset_x as f32,
            pad_y: offset_y as f32,
        },
    )
}
