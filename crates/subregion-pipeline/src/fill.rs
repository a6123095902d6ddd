//! Hole filling.
//!
//! Interior gaps of each blob are closed while the outer silhouette is
//! left as is. Holes are the background regions (4-connected) that never
//! reach the image edge; anything nested inside a hole is absorbed too,
//! just as drawing every outer border as a solid polygon would.

use image::GrayImage;

use crate::components::Components;
use crate::mask::binarize;

/// Fill every interior hole of every blob in `mask`.
///
/// Nonzero input pixels count as foreground. The output holds only
/// `0` and [`crate::mask::FOREGROUND`] and has the input's dimensions.
#[must_use = "returns the filled mask"]
pub fn fill_holes(mask: &GrayImage) -> GrayImage {
    let binary = binarize(mask);
    Components::label(&binary).solid_mask(|_| true)
}
