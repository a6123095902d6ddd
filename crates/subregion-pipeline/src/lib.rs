//! subregion-pipeline: HSV region matching (sans-IO).
//!
//! Given an HSV image and a user-drawn sample rectangle, finds every
//! region of the image that shares the sample's distinguishing colors
//! and has a comparable size:
//! crop -> classify -> mask -> morphology -> fill -> size filter.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! images and returns structured data; decoding files and drawing
//! rectangles belong to the caller.

pub mod blob;
pub mod color;
pub(crate) mod components;
pub mod diagnostics;
pub mod fill;
pub mod hsv;
pub mod mask;
pub mod morphology;
pub mod pipeline;
pub mod profile;
pub mod region;
pub mod types;

#[cfg(test)]
mod testing;

pub use blob::{filter_by_size, filter_largest_blob, find_blobs};
pub use color::{COLOR_TABLE, ColorName, HsvRange, classify};
pub use diagnostics::{Clock, PipelineDiagnostics, detect_with_diagnostics};
pub use fill::fill_holes;
pub use hsv::decode_hsv;
pub use mask::{build_mask, count_nonzero};
pub use morphology::morph;
pub use pipeline::{Pipeline, PipelineStage};
pub use profile::{ColorProfile, dominant, feature_colors, profile};
pub use region::{MaskedRegion, RegionSummary, extract_region};
pub use types::{
    Blob, Contour, DetectConfig, Dimensions, GrayImage, Hsv, HsvImage, PipelineError,
    PipelineResult, Point, Rect, RgbImage, StagedResult,
};

/// Find the regions of `source` that resemble the sample under
/// `sample_rect`.
///
/// # Pipeline steps
///
/// 1. Crop the sample from the source
/// 2. Resolve background colors (explicit, or the source's dominant color)
/// 3. Pick the sample's feature colors
/// 4. Build feature masks of source and sample
/// 5. Erode and dilate both masks
/// 6. Fill holes in both masks
/// 7. Derive the blob size window from the sample's feature area
/// 8. Keep the source blobs inside the window
///
/// A sample with no feature colors, or a source with no blob in the
/// window, is not an error: the result has an all-zero mask and no blobs.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid and
/// [`PipelineError::InvalidRegion`] if `sample_rect` is empty or not
/// inside `source`.
pub fn detect(
    source: &HsvImage,
    sample_rect: Rect,
    config: &DetectConfig,
) -> Result<PipelineResult, PipelineError> {
    detect_staged(source, sample_rect, config).map(StagedResult::into_result)
}

/// Like [`detect`], but keeps every intermediate mask and selection.
///
/// # Errors
///
/// Same as [`detect`].
pub fn detect_staged(
    source: &HsvImage,
    sample_rect: Rect,
    config: &DetectConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(source, sample_rect, config.clone())
        .crop()?
        .classify()
        .build_masks()
        .morph()
        .fill()
        .filter()
        .into_result())
}
