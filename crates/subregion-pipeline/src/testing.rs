//! Helpers shared by unit tests.

use image::{GrayImage, Luma};

use crate::mask::FOREGROUND;

/// Parse a mask from rows of `#` (foreground) and `.` (background).
pub(crate) fn mask_from_rows(rows: &[&str]) -> GrayImage {
    let height = u32::try_from(rows.len()).unwrap_or(0);
    let width = u32::try_from(rows.first().map_or(0, |r| r.len())).unwrap_or(0);
    GrayImage::from_fn(width, height, |x, y| {
        if rows[y as usize].as_bytes()[x as usize] == b'#' {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// A `width x height` mask with one solid rectangle set.
pub(crate) fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if (x0..x0 + w).contains(&x) && (y0..y0 + h).contains(&y) {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Deterministic pseudo-random mask (xorshift), roughly `density` percent set.
pub(crate) fn noise_mask(width: u32, height: u32, seed: u64, density: u64) -> GrayImage {
    let mut state = seed.max(1);
    GrayImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        if state % 100 < density {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}
