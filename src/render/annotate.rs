// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Draws detection boxes and confidence labels onto the source image

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::RenderError;
use crate::acquisition::TempArtifact;
use crate::analysis::Detection;
use crate::vision::load_image_file;

const BOX_COLOR: Rgb<u8> = Rgb([255, 56, 56]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const FONT_SCALE: f32 = 18.0;
const BOX_THICKNESS: i32 = 2;
const LABEL_PADDING: i32 = 3;
// Used when no font is loaded and text size cannot be measured
const FALLBACK_CHAR_WIDTH: i32 = 9;
const FALLBACK_TEXT_HEIGHT: i32 = 14;

const FILL_ALPHA: f32 = 0.25;
const MAX_CORNER_RADIUS: f32 = 10.0;
const ARC_SEGMENTS: usize = 8;

const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// How each detection box is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxStyle {
    /// Straight outline
    Plain,
    /// Rounded outline over a semi-transparent fill
    Decorative,
}

impl FromStr for BoxStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(BoxStyle::Plain),
            "decorative" => Ok(BoxStyle::Decorative),
            other => Err(format!("unknown box style '{}', expected plain or decorative", other)),
        }
    }
}

/// Renders annotated copies of source images
pub struct AnnotationRenderer {
    style: BoxStyle,
    /// Label font; label text is skipped when `None`
    font: Option<FontVec>,
}

impl std::fmt::Debug for AnnotationRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationRenderer")
            .field("style", &self.style)
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl AnnotationRenderer {
    /// Create a renderer with an explicit font (or none)
    pub fn new(style: BoxStyle, font: Option<FontVec>) -> Self {
        Self { style, font }
    }

    /// Load the configured font, falling back to common system fonts
    pub fn with_font_search(style: BoxStyle, font_path: Option<&Path>) -> Self {
        let configured = font_path.map(Path::to_path_buf);
        let candidates = configured
            .iter()
            .cloned()
            .chain(SYSTEM_FONT_PATHS.iter().map(|p| PathBuf::from(*p)));

        for path in candidates {
            match std::fs::read(&path).map(FontVec::try_from_vec) {
                Ok(Ok(font)) => {
                    info!("Loaded annotation font: {}", path.display());
                    return Self::new(style, Some(font));
                }
                Ok(Err(_)) => warn!("Failed to parse font file: {}", path.display()),
                Err(_) if configured.as_deref() == Some(path.as_path()) => {
                    warn!("Annotation font not readable: {}", path.display())
                }
                Err(_) => {}
            }
        }

        debug!("No font found, label text will be skipped");
        Self::new(style, None)
    }

    pub fn style(&self) -> BoxStyle {
        self.style
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw all detections onto a copy of `image`
    pub fn render(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        canvas
    }

    /// Load `source`, draw the detections, and encode the result as a JPEG temp artifact
    pub fn render_file(
        &self,
        source: &Path,
        detections: &[Detection],
        temp_dir: &Path,
        request_id: Uuid,
    ) -> Result<TempArtifact, RenderError> {
        let (image, _info) = load_image_file(source)?;
        let annotated = self.render(&image.to_rgb8(), detections);

        let artifact = TempArtifact::create(temp_dir, request_id, "annotated", "jpg")?;
        DynamicImage::ImageRgb8(annotated)
            .save_with_format(artifact.path(), ImageFormat::Jpeg)
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        debug!(
            "Annotated {} detections into {}",
            detections.len(),
            artifact.path().display()
        );
        Ok(artifact)
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let (w, h) = (image.width() as i32, image.height() as i32);
        if w == 0 || h == 0 {
            return;
        }

        let x1 = (detection.x1.floor() as i32).clamp(0, w - 1);
        let y1 = (detection.y1.floor() as i32).clamp(0, h - 1);
        let x2 = (detection.x2.ceil() as i32).clamp(0, w - 1);
        let y2 = (detection.y2.ceil() as i32).clamp(0, h - 1);
        if x1 >= x2 || y1 >= y2 {
            return;
        }

        match self.style {
            BoxStyle::Plain => draw_plain_box(image, x1, y1, x2, y2),
            BoxStyle::Decorative => {
                blend_fill(image, x1, y1, x2, y2, BOX_COLOR, FILL_ALPHA);
                draw_rounded_box(image, x1, y1, x2, y2);
            }
        }

        self.draw_label(image, x1, y1, detection.confidence);
    }

    fn draw_label(&self, image: &mut RgbImage, x1: i32, y1: i32, confidence: f32) {
        let label = format!("{:.2}", confidence);
        let scale = PxScale::from(FONT_SCALE);

        let (text_w, text_h) = match &self.font {
            Some(font) => {
                let (tw, th) = text_size(scale, font, &label);
                (tw as i32, th as i32)
            }
            None => (label.len() as i32 * FALLBACK_CHAR_WIDTH, FALLBACK_TEXT_HEIGHT),
        };
        let label_w = text_w + 2 * LABEL_PADDING;
        let label_h = text_h + 2 * LABEL_PADDING;

        let (label_x, label_y) = label_position(
            x1,
            y1,
            label_w,
            label_h,
            image.width() as i32,
            image.height() as i32,
        );

        let visible_w = label_w.min(image.width() as i32 - label_x);
        let visible_h = label_h.min(image.height() as i32 - label_y);
        if visible_w <= 0 || visible_h <= 0 {
            return;
        }

        let rect = Rect::at(label_x, label_y).of_size(visible_w as u32, visible_h as u32);
        draw_filled_rect_mut(image, rect, BOX_COLOR);

        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                TEXT_COLOR,
                label_x + LABEL_PADDING,
                label_y + LABEL_PADDING,
                scale,
                font,
                &label,
            );
        }
    }
}

/// Top-left corner of a label for a box whose top-left corner is (`x1`, `y1`)
///
/// The label sits directly above the box. When it would cross the top edge of the
/// image it moves inside the box, just below the box's top edge. It is shifted left
/// when it would run past the right edge, but never starts left of the image.
pub fn label_position(x1: i32, y1: i32, label_w: i32, label_h: i32, img_w: i32, img_h: i32) -> (i32, i32) {
    let y = if y1 - label_h >= 0 {
        y1 - label_h
    } else {
        y1.min((img_h - label_h).max(0))
    };
    let x = x1.min(img_w - label_w).max(0);
    (x, y)
}

fn draw_plain_box(image: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32) {
    for t in 0..BOX_THICKNESS {
        let width = x2 - x1 - 2 * t + 1;
        let height = y2 - y1 - 2 * t + 1;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(x1 + t, y1 + t).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}

fn draw_rounded_box(image: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32) {
    for t in 0..BOX_THICKNESS {
        let (l, tp, r, b) = (
            (x1 + t) as f32,
            (y1 + t) as f32,
            (x2 - t) as f32,
            (y2 - t) as f32,
        );
        if r <= l || b <= tp {
            break;
        }
        let radius = MAX_CORNER_RADIUS.min((r - l) / 4.0).min((b - tp) / 4.0);

        // Straight edges between the corner arcs
        draw_line_segment_mut(image, (l + radius, tp), (r - radius, tp), BOX_COLOR);
        draw_line_segment_mut(image, (l + radius, b), (r - radius, b), BOX_COLOR);
        draw_line_segment_mut(image, (l, tp + radius), (l, b - radius), BOX_COLOR);
        draw_line_segment_mut(image, (r, tp + radius), (r, b - radius), BOX_COLOR);

        // Corner arcs: (center, start angle) going counter-clockwise in screen space
        let corners = [
            ((l + radius, tp + radius), std::f32::consts::PI),
            ((r - radius, tp + radius), 1.5 * std::f32::consts::PI),
            ((r - radius, b - radius), 0.0),
            ((l + radius, b - radius), 0.5 * std::f32::consts::PI),
        ];
        for ((cx, cy), start) in corners {
            draw_arc(image, cx, cy, radius, start);
        }
    }
}

fn draw_arc(image: &mut RgbImage, cx: f32, cy: f32, radius: f32, start: f32) {
    let step = std::f32::consts::FRAC_PI_2 / ARC_SEGMENTS as f32;
    let point = |angle: f32| (cx + radius * angle.cos(), cy + radius * angle.sin());
    for i in 0..ARC_SEGMENTS {
        let a0 = start + step * i as f32;
        let a1 = a0 + step;
        draw_line_segment_mut(image, point(a0), point(a1), BOX_COLOR);
    }
}

/// Alpha-blend `color` over the inclusive box region
fn blend_fill(image: &mut RgbImage, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb<u8>, alpha: f32) {
    for y in y1.max(0)..=y2.min(image.height() as i32 - 1) {
        for x in x1.max(0)..=x2.min(image.width() as i32 - 1) {
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let blended = pixel[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha;
                pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
