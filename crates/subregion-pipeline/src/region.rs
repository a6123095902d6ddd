//! Per-region outputs for the surrounding application: summary figures
//! for a detection run and masked pixel extraction for export.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::fill::fill_holes;
use crate::mask::FOREGROUND;
use crate::types::{Blob, Contour, HsvImage, PipelineError, Rect};

/// Sample value marking pixels outside a region's contour.
pub const OUTSIDE: i16 = -1;

/// Count and area statistics over a set of blobs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionSummary {
    /// Number of blobs.
    pub count: usize,
    /// Smallest blob area.
    pub min_area: f64,
    /// Largest blob area.
    pub max_area: f64,
    /// Mean blob area.
    pub mean_area: f64,
}

impl RegionSummary {
    /// Summarize `blobs`. All figures are zero for an empty slice.
    #[must_use]
    pub fn from_blobs(blobs: &[Blob]) -> Self {
        if blobs.is_empty() {
            return Self::default();
        }
        let areas = blobs.iter().map(|b| b.area);
        let min_area = areas.clone().fold(f64::INFINITY, f64::min);
        let max_area = areas.clone().fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let mean_area = areas.sum::<f64>() / blobs.len() as f64;
        Self {
            count: blobs.len(),
            min_area,
            max_area,
            mean_area,
        }
    }
}

/// HSV samples of one region, widened to `i16` so that pixels outside the
/// region's contour can hold [`OUTSIDE`] in every channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedRegion {
    /// Where the region sits in the source image.
    pub origin: Rect,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major `h, s, v` triples.
    pub data: Vec<i16>,
}

impl MaskedRegion {
    /// Samples at `(x, y)`, relative to [`origin`](Self::origin).
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[i16; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Number of pixels inside the contour.
    #[must_use]
    pub fn inside_count(&self) -> usize {
        self.data
            .chunks_exact(3)
            .filter(|px| px[0] != OUTSIDE)
            .count()
    }
}

/// Cut `blob` out of `source`: its bounding rectangle, with pixels
/// outside the filled contour set to [`OUTSIDE`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidRegion`] if the blob's bounding
/// rectangle does not fit inside `source`.
pub fn extract_region(source: &HsvImage, blob: &Blob) -> Result<MaskedRegion, PipelineError> {
    let rect = blob.bounding_rect;
    let crop = source.crop(rect)?;
    let inside = contour_fill(&blob.contour, rect);

    let data = crop
        .pixels()
        .zip(inside)
        .flat_map(|(px, keep)| {
            if keep {
                [i16::from(px.h), i16::from(px.s), i16::from(px.v)]
            } else {
                [OUTSIDE; 3]
            }
        })
        .collect();

    Ok(MaskedRegion {
        origin: rect,
        width: crop.width(),
        height: crop.height(),
        data,
    })
}

/// Pixels of `rect` covered by the solid region bounded by `contour`,
/// row-major.
///
/// The contour points are drawn into a mask the size of `rect` and that
/// border's holes are filled, which gives back exactly the blob's solid
/// pixels.
fn contour_fill(contour: &Contour, rect: Rect) -> Vec<bool> {
    let width = u32::try_from(rect.width).unwrap_or(0);
    let height = u32::try_from(rect.height).unwrap_or(0);
    let mut border = GrayImage::new(width, height);
    for p in contour.points() {
        if let (Ok(x), Ok(y)) = (u32::try_from(p.x - rect.x), u32::try_from(p.y - rect.y))
            && x < width
            && y < height
        {
            border.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }
    fill_holes(&border).pixels().map(|p| p.0[0] != 0).collect()
}
