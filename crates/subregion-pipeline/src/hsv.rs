//! Image decoding and RGB to HSV conversion.
//!
//! Produces [`HsvImage`]s in the 8-bit half-degree convention the color
//! table is written for: hue in `[0, 180)`, saturation and value in
//! `[0, 255]`.

use crate::types::{Hsv, HsvImage, PipelineError, RgbImage};

/// Convert one RGB pixel to HSV.
#[must_use]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let degrees = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * ((gf - bf) / delta)
    } else if max == gf {
        60.0 * ((bf - rf) / delta) + 120.0
    } else {
        60.0 * ((rf - gf) / delta) + 240.0
    };
    let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };

    let s = if max == 0.0 { 0.0 } else { delta / max * 255.0 };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let h = ((degrees / 2.0).round() as u8) % 180;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let s = s.round() as u8;
    Hsv::new(h, s, r.max(g).max(b))
}

impl HsvImage {
    /// Convert an RGB raster to HSV.
    #[must_use]
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        Self::from_fn(rgb.width(), rgb.height(), |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            rgb_to_hsv(r, g, b)
        })
    }
}

/// Decode raw image bytes and convert them to HSV.
///
/// Supports PNG, JPEG, BMP, and WebP (whatever the `image` crate was
/// built with). Alpha is discarded.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::MalformedImage`] if the decoded image has
/// zero width or height.
pub fn decode_hsv(bytes: &[u8]) -> Result<HsvImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(PipelineError::MalformedImage(format!(
            "decoded image has zero area ({}x{})",
            rgb.width(),
            rgb.height()
        )));
    }
    Ok(HsvImage::from_rgb(&rgb))
}
