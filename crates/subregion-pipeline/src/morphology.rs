//! Erosion and dilation with a 3x3 square structuring element.
//!
//! Wraps [`imageproc::morphology`] with the `L∞` norm at radius one,
//! which is exactly the full 3x3 kernel. Multi-pass operations run one
//! radius-one pass per iteration. Pixels beyond the image edge never
//! count as background, so erosion does not eat in from the border.

use image::GrayImage;
use imageproc::distance_transform::Norm;

/// Erode `mask` `iterations` times.
#[must_use = "returns the eroded mask"]
pub fn erode(mask: &GrayImage, iterations: u32) -> GrayImage {
    (0..iterations).fold(mask.clone(), |m, _| {
        imageproc::morphology::erode(&m, Norm::LInf, 1)
    })
}

/// Dilate `mask` `iterations` times.
#[must_use = "returns the dilated mask"]
pub fn dilate(mask: &GrayImage, iterations: u32) -> GrayImage {
    (0..iterations).fold(mask.clone(), |m, _| {
        imageproc::morphology::dilate(&m, Norm::LInf, 1)
    })
}

/// Erode `pre_erode_iters` times, then dilate `dilate_iters` times.
#[must_use = "returns the cleaned-up mask"]
pub fn morph(mask: &GrayImage, pre_erode_iters: u32, dilate_iters: u32) -> GrayImage {
    dilate(&erode(mask, pre_erode_iters), dilate_iters)
}
