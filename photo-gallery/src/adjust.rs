use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{GalleryError, GalleryResult};

/// Editor adjustments applied on top of the source image.
///
/// Percentages follow CSS filter functions: `100` leaves the channel alone,
/// `0` removes it, `200` doubles it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentParams {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Degrees, accumulated in steps of 90
    pub rotation: i32,
    pub grayscale: bool,
    pub sepia: bool,
}

impl Default for AdjustmentParams {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            rotation: 0,
            grayscale: false,
            sepia: false,
        }
    }
}

impl AdjustmentParams {
    /// Rotation as shown to the user; keeps the sign of the accumulated value
    pub fn display_rotation(&self) -> i32 {
        self.rotation % 360
    }

    /// Number of clockwise quarter turns in `0..4`
    pub fn quarter_turns(&self) -> u8 {
        (self.rotation.div_euclid(90).rem_euclid(4)) as u8
    }

    /// Applies a partial update, rotating by a quarter turn when requested
    pub fn apply(&mut self, update: &AdjustmentUpdate) {
        if let Some(v) = update.brightness {
            self.brightness = v.max(0.0);
        }
        if let Some(v) = update.contrast {
            self.contrast = v.max(0.0);
        }
        if let Some(v) = update.saturation {
            self.saturation = v.max(0.0);
        }
        if let Some(v) = update.grayscale {
            self.grayscale = v;
        }
        if let Some(v) = update.sepia {
            self.sepia = v;
        }
        match update.rotate {
            Some(RotateDirection::Clockwise) => self.rotation += 90,
            Some(RotateDirection::CounterClockwise) => self.rotation -= 90,
            None => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

/// Partial change of [`AdjustmentParams`]; `None` fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentUpdate {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub grayscale: Option<bool>,
    pub sepia: Option<bool>,
    pub rotate: Option<RotateDirection>,
}

impl AdjustmentUpdate {
    pub fn brightness(value: f32) -> Self {
        Self {
            brightness: Some(value),
            ..Default::default()
        }
    }

    pub fn contrast(value: f32) -> Self {
        Self {
            contrast: Some(value),
            ..Default::default()
        }
    }

    pub fn saturation(value: f32) -> Self {
        Self {
            saturation: Some(value),
            ..Default::default()
        }
    }

    pub fn grayscale(on: bool) -> Self {
        Self {
            grayscale: Some(on),
            ..Default::default()
        }
    }

    pub fn sepia(on: bool) -> Self {
        Self {
            sepia: Some(on),
            ..Default::default()
        }
    }

    pub fn rotate(direction: RotateDirection) -> Self {
        Self {
            rotate: Some(direction),
            ..Default::default()
        }
    }
}

type Matrix = [[f32; 3]; 3];

const GRAYSCALE: Matrix = [
    [0.2126, 0.7152, 0.0722],
    [0.2126, 0.7152, 0.0722],
    [0.2126, 0.7152, 0.0722],
];

const SEPIA: Matrix = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

fn saturate_matrix(s: f32) -> Matrix {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn apply_matrix(m: &Matrix, [r, g, b]: [f32; 3]) -> [f32; 3] {
    [
        (m[0][0] * r + m[0][1] * g + m[0][2] * b).clamp(0.0, 1.0),
        (m[1][0] * r + m[1][1] * g + m[1][2] * b).clamp(0.0, 1.0),
        (m[2][0] * r + m[2][1] * g + m[2][2] * b).clamp(0.0, 1.0),
    ]
}

/// Colour stages in order: brightness, contrast, saturate, grayscale, sepia.
/// Each stage clamps to `[0, 1]` like the CSS filter chain.
fn adjust_pixel(rgb: [f32; 3], params: &AdjustmentParams, saturate: &Matrix) -> [f32; 3] {
    let brightness = params.brightness / 100.0;
    let contrast = params.contrast / 100.0;

    let mut c = rgb.map(|v| (v * brightness).clamp(0.0, 1.0));
    c = c.map(|v| ((v - 0.5) * contrast + 0.5).clamp(0.0, 1.0));
    c = apply_matrix(saturate, c);
    if params.grayscale {
        c = apply_matrix(&GRAYSCALE, c);
    }
    if params.sepia {
        c = apply_matrix(&SEPIA, c);
    }
    c
}

/// Renders `source` with `params`: quarter-turn rotation about the centre
/// first, then the colour stages. Alpha is kept. Used for preview and export.
pub fn render_adjustments(source: &DynamicImage, params: &AdjustmentParams) -> RgbaImage {
    let rgba = source.to_rgba8();
    let mut out = match params.quarter_turns() {
        1 => imageops::rotate90(&rgba),
        2 => imageops::rotate180(&rgba),
        3 => imageops::rotate270(&rgba),
        _ => rgba,
    };

    let color_neutral = params.brightness == 100.0
        && params.contrast == 100.0
        && params.saturation == 100.0
        && !params.grayscale
        && !params.sepia;
    if color_neutral {
        return out;
    }

    let saturate = saturate_matrix(params.saturation / 100.0);
    for pixel in out.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let adjusted = adjust_pixel(
            [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0],
            params,
            &saturate,
        );
        let [r, g, b] = adjusted.map(|v| (v * 255.0).round() as u8);
        pixel.0 = [r, g, b, a];
    }
    out
}

/// Decodes fetched image bytes
pub fn decode_image(bytes: &[u8]) -> GalleryResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(GalleryError::Render("Image data is empty".to_string()));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Encodes a render as JPEG; alpha is dropped
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> GalleryResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder.encode_image(&rgb)?;
    }

    log::debug!(
        "Encoded {}x{} JPEG ({} bytes, quality {})",
        rgb.width(),
        rgb.height(),
        buffer.get_ref().len(),
        quality
    );
    Ok(buffer.into_inner())
}
