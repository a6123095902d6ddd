//! Binary masks from color membership.
//!
//! Masks are `GrayImage`s holding only `0` and [`FOREGROUND`], always with
//! the dimensions of the image they were built from.

use image::{GrayImage, Luma};

use crate::color::ColorName;
use crate::types::HsvImage;

/// Value of a selected mask pixel.
pub const FOREGROUND: u8 = 255;

/// Mark every pixel of `image` that falls in any range of any of `colors`.
///
/// Membership is a per-pixel union, so a pixel matching several colors is
/// still exactly [`FOREGROUND`]. An empty `colors` slice yields an
/// all-zero mask.
#[must_use = "returns the color mask"]
pub fn build_mask(image: &HsvImage, colors: &[ColorName]) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let px = image.pixel(x, y);
        if colors.iter().any(|c| c.contains(px)) {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Force every nonzero pixel to [`FOREGROUND`].
#[must_use = "returns the binarized mask"]
pub fn binarize(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] > 0 {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Number of nonzero pixels.
#[must_use]
pub fn count_nonzero(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}
