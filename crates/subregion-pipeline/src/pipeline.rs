//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::detect`] which runs the whole detection in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use subregion_pipeline::{DetectConfig, HsvImage, Pipeline, PipelineError, Rect};
//! # fn run(source: &HsvImage) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(source, Rect::new(10, 10, 32, 32), DetectConfig::default())
//!     .crop()?
//!     .classify()
//!     .build_masks()
//!     .morph()
//!     .fill()
//!     .filter()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying every previously computed intermediate. Only
//! [`Pending::crop`] can fail; later stages are infallible because a
//! sample without feature colors simply yields empty masks.

use crate::color::ColorName;
use crate::diagnostics::StageMetrics;
use crate::mask::count_nonzero;
use crate::profile::ColorProfile;
use crate::types::{
    Blob, DetectConfig, Dimensions, GrayImage, HsvImage, PipelineError, Rect, StagedResult,
};

/// Entry point for the type-state pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline over `source` with the sample rectangle and
    /// config.
    ///
    /// No processing is performed. Call [`.crop()`](Pending::crop) to
    /// begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(source: &HsvImage, sample_rect: Rect, config: DetectConfig) -> Pending<'_> {
        Pending {
            source,
            sample_rect,
            config,
        }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .crop() to continue"]
pub struct Pending<'a> {
    source: &'a HsvImage,
    sample_rect: Rect,
    config: DetectConfig,
}

impl<'a> Pending<'a> {
    /// The source image.
    #[must_use]
    pub const fn source(&self) -> &'a HsvImage {
        self.source
    }

    /// The requested sample rectangle.
    #[must_use]
    pub const fn sample_rect(&self) -> Rect {
        self.sample_rect
    }

    /// The detection config.
    #[must_use]
    pub const fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Validate the config and crop the sample region.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config fails
    /// [`DetectConfig::validate`], and [`PipelineError::InvalidRegion`]
    /// if the sample rectangle is empty or not inside the source.
    pub fn crop(self) -> Result<Cropped<'a>, PipelineError> {
        self.config.validate()?;
        let sample = self.source.crop(self.sample_rect)?;
        log::debug!(
            "cropped {}x{} sample at ({}, {})",
            sample.width(),
            sample.height(),
            self.sample_rect.x,
            self.sample_rect.y,
        );
        Ok(Cropped {
            source: self.source,
            sample_rect: self.sample_rect,
            config: self.config,
            sample,
        })
    }
}

// ───────────────────────── Stage 1: Cropped ──────────────────────────

/// Pipeline state after cropping the sample region.
#[must_use = "pipeline stages are consumed by advancing, call .classify() to continue"]
pub struct Cropped<'a> {
    source: &'a HsvImage,
    sample_rect: Rect,
    config: DetectConfig,
    sample: HsvImage,
}

impl<'a> Cropped<'a> {
    /// The sample pixels.
    #[must_use]
    pub const fn sample(&self) -> &HsvImage {
        &self.sample
    }

    /// Resolve background colors and pick the sample's feature colors.
    ///
    /// With no explicit background, the dominant color of the whole
    /// source image is used.
    pub fn classify(self) -> Classified<'a> {
        let background_colors = if self.config.background_colors.is_empty() {
            let inferred = crate::profile::dominant(&crate::profile::profile(self.source));
            log::debug!("inferred background color: {inferred}");
            vec![inferred]
        } else {
            self.config.background_colors.clone()
        };

        let sample_profile = crate::profile::profile(&self.sample);
        let feature_colors = crate::profile::feature_colors(
            &sample_profile,
            &background_colors,
            self.config.prevalence,
        );
        if feature_colors.is_empty() {
            log::debug!("sample has no feature colors outside the background");
        } else {
            log::debug!("feature colors: {feature_colors:?}");
        }

        Classified {
            cropped: self,
            background_colors,
            sample_profile,
            feature_colors,
        }
    }
}

// ───────────────────────── Stage 2: Classified ───────────────────────

/// Pipeline state after choosing background and feature colors.
#[must_use = "pipeline stages are consumed by advancing, call .build_masks() to continue"]
pub struct Classified<'a> {
    cropped: Cropped<'a>,
    background_colors: Vec<ColorName>,
    sample_profile: ColorProfile,
    feature_colors: Vec<ColorName>,
}

impl<'a> Classified<'a> {
    /// Background colors in effect, explicit or inferred.
    #[must_use]
    pub fn background_colors(&self) -> &[ColorName] {
        &self.background_colors
    }

    /// Per-color pixel counts of the sample.
    #[must_use]
    pub const fn sample_profile(&self) -> &ColorProfile {
        &self.sample_profile
    }

    /// Colors to search for. Empty when the sample is all background.
    #[must_use]
    pub fn feature_colors(&self) -> &[ColorName] {
        &self.feature_colors
    }

    /// Build the feature-color masks of the source and the sample.
    pub fn build_masks(self) -> Masked<'a> {
        let source_mask = crate::mask::build_mask(self.cropped.source, &self.feature_colors);
        let sample_mask = crate::mask::build_mask(&self.cropped.sample, &self.feature_colors);
        let counts = PixelCounts::of(&source_mask, &sample_mask);
        log::debug!(
            "feature masks: {} source px, {} sample px",
            counts.source,
            counts.sample,
        );
        Masked {
            classified: self,
            source_mask,
            sample_mask,
            counts,
        }
    }
}

// ───────────────────────── Stage 3: Masked ───────────────────────────

/// Foreground pixel counts of a source/sample mask pair.
#[derive(Debug, Clone, Copy)]
struct PixelCounts {
    source: u64,
    sample: u64,
}

impl PixelCounts {
    fn of(source: &GrayImage, sample: &GrayImage) -> Self {
        Self {
            source: count_nonzero(source),
            sample: count_nonzero(sample),
        }
    }
}

/// Pipeline state after color classification into binary masks.
#[must_use = "pipeline stages are consumed by advancing, call .morph() to continue"]
pub struct Masked<'a> {
    classified: Classified<'a>,
    source_mask: GrayImage,
    sample_mask: GrayImage,
    counts: PixelCounts,
}

impl<'a> Masked<'a> {
    /// Source mask straight after classification.
    #[must_use]
    pub const fn source_mask(&self) -> &GrayImage {
        &self.source_mask
    }

    /// Sample mask straight after classification.
    #[must_use]
    pub const fn sample_mask(&self) -> &GrayImage {
        &self.sample_mask
    }

    /// Erode then dilate both masks with the same iteration counts.
    pub fn morph(self) -> Morphed<'a> {
        let config = &self.classified.cropped.config;
        let (erode, dilate) = (config.pre_erode_iters, config.dilate_iters);
        let source_morphed = crate::morphology::morph(&self.source_mask, erode, dilate);
        let sample_morphed = crate::morphology::morph(&self.sample_mask, erode, dilate);
        let counts = PixelCounts::of(&source_morphed, &sample_morphed);
        log::debug!(
            "morphology (erode {erode}, dilate {dilate}): {} source px, {} sample px",
            counts.source,
            counts.sample,
        );
        Morphed {
            masked: self,
            source_morphed,
            sample_morphed,
            counts,
        }
    }
}

// ───────────────────────── Stage 4: Morphed ──────────────────────────

/// Pipeline state after erosion and dilation.
#[must_use = "pipeline stages are consumed by advancing, call .fill() to continue"]
pub struct Morphed<'a> {
    masked: Masked<'a>,
    source_morphed: GrayImage,
    sample_morphed: GrayImage,
    counts: PixelCounts,
}

impl<'a> Morphed<'a> {
    /// Source mask after morphology.
    #[must_use]
    pub const fn source_morphed(&self) -> &GrayImage {
        &self.source_morphed
    }

    /// Sample mask after morphology.
    #[must_use]
    pub const fn sample_morphed(&self) -> &GrayImage {
        &self.sample_morphed
    }

    /// Fill holes in both masks, measure the feature area and derive the
    /// blob size window from it.
    ///
    /// When `largest_sample_blob` is set, the sample mask is first
    /// reduced to its largest blob.
    pub fn fill(self) -> Filled<'a> {
        let source_filled = crate::fill::fill_holes(&self.source_morphed);
        let mut sample_filled = crate::fill::fill_holes(&self.sample_morphed);
        let config = &self.masked.classified.cropped.config;
        if config.largest_sample_blob {
            sample_filled = crate::blob::filter_largest_blob(&sample_filled);
        }

        let counts = PixelCounts::of(&source_filled, &sample_filled);
        let feature_area = counts.sample;
        let min_pixels = scale_area(feature_area, config.min_area_ratio);
        let max_pixels = scale_area(feature_area, config.max_area_ratio);
        log::debug!("feature area {feature_area} px, blob size window [{min_pixels}, {max_pixels}]");

        Filled {
            morphed: self,
            source_filled,
            sample_filled,
            counts,
            min_pixels,
            max_pixels,
        }
    }
}

/// `floor(area * ratio)`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scale_area(area: u64, ratio: f64) -> u64 {
    (area as f64 * ratio).floor() as u64
}

// ───────────────────────── Stage 5: Filled ───────────────────────────

/// Pipeline state after hole filling.
#[must_use = "pipeline stages are consumed by advancing, call .filter() to continue"]
pub struct Filled<'a> {
    morphed: Morphed<'a>,
    source_filled: GrayImage,
    sample_filled: GrayImage,
    counts: PixelCounts,
    min_pixels: u64,
    max_pixels: u64,
}

impl<'a> Filled<'a> {
    /// Source mask after hole filling.
    #[must_use]
    pub const fn source_filled(&self) -> &GrayImage {
        &self.source_filled
    }

    /// Sample mask after hole filling.
    #[must_use]
    pub const fn sample_filled(&self) -> &GrayImage {
        &self.sample_filled
    }

    /// Foreground pixel count of the filled sample mask.
    #[must_use]
    pub const fn feature_area(&self) -> u64 {
        self.counts.sample
    }

    /// Inclusive `(min, max)` blob area window.
    #[must_use]
    pub const fn size_window(&self) -> (u64, u64) {
        (self.min_pixels, self.max_pixels)
    }

    /// Keep the source blobs whose area lies in the size window.
    pub fn filter(self) -> Filtered<'a> {
        let (mask, blobs) =
            crate::blob::filter_by_size(&self.source_filled, self.min_pixels, self.max_pixels);
        let mask_pixels = count_nonzero(&mask);
        log::debug!("kept {} blobs ({mask_pixels} px)", blobs.len());
        Filtered {
            filled: self,
            mask,
            blobs,
            mask_pixels,
        }
    }
}

// ───────────────────────── Stage 6: Filtered ─────────────────────────

/// Pipeline state after blob size filtering. This is the final stage.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Filtered<'a> {
    filled: Filled<'a>,
    mask: GrayImage,
    blobs: Vec<Blob>,
    mask_pixels: u64,
}

impl Filtered<'_> {
    /// The size-filtered source mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Kept blobs in discovery order.
    #[must_use]
    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let Filled {
            morphed,
            source_filled,
            sample_filled,
            counts,
            min_pixels,
            max_pixels,
        } = self.filled;
        let Morphed {
            masked,
            source_morphed,
            sample_morphed,
            ..
        } = morphed;
        let Masked {
            classified,
            source_mask,
            sample_mask,
            ..
        } = masked;
        let Classified {
            cropped,
            background_colors,
            sample_profile,
            feature_colors,
        } = classified;

        StagedResult {
            dimensions: cropped.source.dimensions(),
            sample: cropped.sample,
            background_colors,
            sample_profile,
            feature_colors,
            source_mask,
            sample_mask,
            source_morphed,
            sample_morphed,
            source_filled,
            sample_filled,
            feature_area: counts.sample,
            min_pixels,
            max_pixels,
            mask: self.mask,
            blobs: self.blobs,
        }
    }
}

// ──────────────────────────── PipelineStage ──────────────────────────

/// Common interface over every pipeline state.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"crop"`, `"fill"`).
    const NAME: &'static str;

    /// Zero-based index of this stage (`0` for [`Pending`] through `6`
    /// for [`Filtered`]).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the crop stage has not yet run and
    /// fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

/// Number of pipeline stages, [`Pending`] included.
pub const STAGE_COUNT: usize = 7;

impl PipelineStage for Pending<'_> {
    const NAME: &'static str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        let Dimensions { width, height } = self.source.dimensions();
        StageMetrics::Source {
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        }
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.crop()?.complete()
    }
}

impl PipelineStage for Cropped<'_> {
    const NAME: &'static str = "crop";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Crop {
            x: self.sample_rect.x,
            y: self.sample_rect.y,
            width: self.sample.width(),
            height: self.sample.height(),
            pixel_count: u64::from(self.sample.width()) * u64::from(self.sample.height()),
        }
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.classify().complete()
    }
}

impl PipelineStage for Classified<'_> {
    const NAME: &'static str = "classify";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Classify {
            background_colors: self.background_colors.clone(),
            feature_colors: self.feature_colors.clone(),
            inferred_background: self.cropped.config.background_colors.is_empty(),
        }
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.build_masks().complete()
    }
}

impl PipelineStage for Masked<'_> {
    const NAME: &'static str = "mask";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Mask {
            source_pixels: self.counts.source,
            sample_pixels: self.counts.sample,
        }
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.morph().complete()
    }
}

impl PipelineStage for Morphed<'_> {
    const NAME: &'static str = "morphology";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        let config = &self.masked.classified.cropped.config;
        StageMetrics::Morphology {
            pre_erode_iters: config.pre_erode_iters,
            dilate_iters: config.dilate_iters,
            source_pixels: self.counts.source,
            sample_pixels: self.counts.sample,
        }
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.fill().complete()
    }
}

impl PipelineStage for Filled<'_> {
    const NAME: &'static str = "fill";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Fill {
            source_pixels: self.counts.source,
            sample_pixels: self.counts.sample,
            largest_sample_blob: self.morphed.masked.classified.cropped.config.largest_sample_blob,
        }
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.filter().complete()
    }
}

impl PipelineStage for Filtered<'_> {
    const NAME: &'static str = "filter";
    const INDEX: usize = 6;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Filter {
            feature_area: self.filled.counts.sample,
            min_pixels: self.filled.min_pixels,
            max_pixels: self.filled.max_pixels,
            blob_count: self.blobs.len(),
            mask_pixels: self.mask_pixels,
        }
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Hsv;

    const RED: Hsv = Hsv::new(10, 200, 200);
    const BLUE: Hsv = Hsv::new(120, 200, 200);

    /// 40x30 blue image with a 6x6 red square at (5, 5) and a 10x10 red
    /// square at (20, 12).
    fn two_squares() -> HsvImage {
        HsvImage::from_fn(40, 30, |x, y| {
            let small = (5..11).contains(&x) && (5..11).contains(&y);
            let large = (20..30).contains(&x) && (12..22).contains(&y);
            if small || large { RED } else { BLUE }
        })
    }

    fn exact_config() -> DetectConfig {
        DetectConfig {
            background_colors: vec![ColorName::Blue],
            dilate_iters: 0,
            ..DetectConfig::default()
        }
    }

    #[test]
    fn stages_advance_to_result() {
        let source = two_squares();
        let filled = Pipeline::new(&source, Rect::new(18, 10, 14, 14), exact_config())
            .crop()
            .unwrap()
            .classify()
            .build_masks()
            .morph()
            .fill();
        assert_eq!(filled.feature_area(), 100);
        assert_eq!(filled.size_window(), (50, 200));

        let filtered = filled.filter();
        // Areas: 6x6 -> 25 (dropped), 10x10 -> 81 (kept).
        assert_eq!(filtered.blobs().len(), 1);
        assert_eq!(filtered.blobs()[0].bounding_rect, Rect::new(20, 12, 10, 10));

        let staged = filtered.into_result();
        assert_eq!(staged.feature_colors, vec![ColorName::Red]);
        assert_eq!(staged.dimensions, Dimensions { width: 40, height: 30 });
        assert_eq!(count_nonzero(&staged.mask), 100);
    }

    #[test]
    fn crop_rejects_bad_rect_and_config() {
        let source = two_squares();
        let result = Pipeline::new(&source, Rect::new(0, 0, 0, 5), exact_config()).crop();
        assert!(matches!(result, Err(PipelineError::InvalidRegion(_))));

        let config = DetectConfig {
            min_area_ratio: 3.0,
            ..exact_config()
        };
        let result = Pipeline::new(&source, Rect::new(0, 0, 5, 5), config).crop();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn classify_infers_dominant_background() {
        let source = two_squares();
        let config = DetectConfig {
            background_colors: Vec::new(),
            ..exact_config()
        };
        let classified = Pipeline::new(&source, Rect::new(18, 10, 14, 14), config)
            .crop()
            .unwrap()
            .classify();
        assert_eq!(classified.background_colors(), &[ColorName::Blue]);
        assert_eq!(classified.feature_colors(), &[ColorName::Red]);
        assert!(matches!(
            classified.metrics(),
            StageMetrics::Classify {
                inferred_background: true,
                ..
            }
        ));
    }

    #[test]
    fn largest_sample_blob_shrinks_feature_area() {
        let source = two_squares();
        let rect = Rect::new(0, 0, 40, 30);
        let config = DetectConfig {
            largest_sample_blob: true,
            ..exact_config()
        };
        let filled = Pipeline::new(&source, rect, config)
            .crop()
            .unwrap()
            .classify()
            .build_masks()
            .morph()
            .fill();
        assert_eq!(filled.feature_area(), 100);

        let all = Pipeline::new(&source, rect, exact_config()).complete().unwrap();
        assert_eq!(all.feature_area, 136);
    }

    #[test]
    fn largest_sample_blob_filling_the_whole_sample() {
        let source = two_squares();
        let config = DetectConfig {
            largest_sample_blob: true,
            ..exact_config()
        };
        let filled = Pipeline::new(&source, Rect::new(20, 12, 10, 10), config)
            .crop()
            .unwrap()
            .classify()
            .build_masks()
            .morph()
            .fill();
        assert_eq!(filled.feature_area(), 100);
        assert_eq!(filled.size_window(), (50, 200));
        assert_eq!(filled.filter().blobs().len(), 1);
    }

    #[test]
    fn every_stage_mask_matches_source_dimensions() {
        let source = two_squares();
        let staged = Pipeline::new(&source, Rect::new(2, 2, 12, 12), DetectConfig::default())
            .complete()
            .unwrap();
        for mask in [
            &staged.source_mask,
            &staged.source_morphed,
            &staged.source_filled,
            &staged.mask,
        ] {
            assert_eq!(mask.dimensions(), (40, 30));
        }
        for mask in [
            &staged.sample_mask,
            &staged.sample_morphed,
            &staged.sample_filled,
        ] {
            assert_eq!(mask.dimensions(), (12, 12));
        }
    }

    #[test]
    fn stage_indices_are_sequential() {
        assert_eq!(<Pending<'_> as PipelineStage>::INDEX, 0);
        assert_eq!(<Cropped<'_> as PipelineStage>::INDEX, 1);
        assert_eq!(<Classified<'_> as PipelineStage>::INDEX, 2);
        assert_eq!(<Masked<'_> as PipelineStage>::INDEX, 3);
        assert_eq!(<Morphed<'_> as PipelineStage>::INDEX, 4);
        assert_eq!(<Filled<'_> as PipelineStage>::INDEX, 5);
        assert_eq!(<Filtered<'_> as PipelineStage>::INDEX, STAGE_COUNT - 1);
        assert_eq!(<Filtered<'_> as PipelineStage>::NAME, "filter");
    }
}
