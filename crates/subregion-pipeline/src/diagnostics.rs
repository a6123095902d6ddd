//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation for parameter tuning.
//! [`detect_with_diagnostics`] collects them alongside the staged result.
//!
//! Time is read through the [`Clock`] trait so the library never touches
//! a platform clock itself; the caller supplies one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::ColorName;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{DetectConfig, HsvImage, PipelineError, Rect, StagedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: validating the config and cropping the sample.
    pub crop: StageDiagnostics,
    /// Stage 2: background inference and feature color selection.
    pub classify: StageDiagnostics,
    /// Stage 3: feature color masks.
    pub mask: StageDiagnostics,
    /// Stage 4: erosion and dilation.
    pub morphology: StageDiagnostics,
    /// Stage 5: hole filling and size window.
    pub fill: StageDiagnostics,
    /// Stage 6: blob size filtering.
    pub filter: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// The untouched source image.
    Source {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// `width * height`.
        pixel_count: u64,
    },
    /// Sample cropping.
    Crop {
        /// Left edge of the sample.
        x: i32,
        /// Top edge of the sample.
        y: i32,
        /// Sample width in pixels.
        width: u32,
        /// Sample height in pixels.
        height: u32,
        /// `width * height`.
        pixel_count: u64,
    },
    /// Color selection.
    Classify {
        /// Background colors in effect.
        background_colors: Vec<ColorName>,
        /// Selected feature colors.
        feature_colors: Vec<ColorName>,
        /// Whether the background was inferred from the source.
        inferred_background: bool,
    },
    /// Feature color masks.
    Mask {
        /// Foreground pixels in the source mask.
        source_pixels: u64,
        /// Foreground pixels in the sample mask.
        sample_pixels: u64,
    },
    /// Erosion and dilation.
    Morphology {
        /// Erosion passes.
        pre_erode_iters: u32,
        /// Dilation passes.
        dilate_iters: u32,
        /// Foreground pixels in the source mask afterwards.
        source_pixels: u64,
        /// Foreground pixels in the sample mask afterwards.
        sample_pixels: u64,
    },
    /// Hole filling.
    Fill {
        /// Foreground pixels in the source mask afterwards.
        source_pixels: u64,
        /// Foreground pixels in the sample mask afterwards.
        sample_pixels: u64,
        /// Whether the sample was reduced to its largest blob.
        largest_sample_blob: bool,
    },
    /// Blob size filtering.
    Filter {
        /// Feature area the window was derived from.
        feature_area: u64,
        /// Inclusive lower area bound.
        min_pixels: u64,
        /// Inclusive upper area bound.
        max_pixels: u64,
        /// Blobs kept.
        blob_count: usize,
        /// Foreground pixels in the final mask.
        mask_pixels: u64,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Selected feature colors.
    pub feature_colors: Vec<ColorName>,
    /// Foreground pixel count of the sample mask.
    pub feature_area: u64,
    /// Blobs kept.
    pub blob_count: usize,
}

impl PipelineDiagnostics {
    /// The stages in pipeline order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Crop", &self.crop),
            ("Classify", &self.classify),
            ("Mask", &self.mask),
            ("Morphology", &self.morphology),
            ("Fill", &self.fill),
            ("Filter", &self.filter),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Feature colors: {}  |  Feature area: {} px  |  Blobs: {}",
            format_colors(&self.summary.feature_colors),
            self.summary.feature_area,
            self.summary.blob_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_colors(colors: &[ColorName]) -> String {
    if colors.is_empty() {
        return "none".to_string();
    }
    colors
        .iter()
        .copied()
        .map(ColorName::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Source {
            width,
            height,
            pixel_count,
        } => format!("{width}x{height} ({pixel_count} px)"),
        StageMetrics::Crop {
            x,
            y,
            width,
            height,
            ..
        } => format!("{width}x{height} at ({x}, {y})"),
        StageMetrics::Classify {
            background_colors,
            feature_colors,
            inferred_background,
        } => {
            let how = if *inferred_background {
                "inferred"
            } else {
                "given"
            };
            format!(
                "background={} ({how}) features={}",
                format_colors(background_colors),
                format_colors(feature_colors),
            )
        }
        StageMetrics::Mask {
            source_pixels,
            sample_pixels,
        } => format!("source={source_pixels} sample={sample_pixels} px"),
        StageMetrics::Morphology {
            pre_erode_iters,
            dilate_iters,
            source_pixels,
            sample_pixels,
        } => format!(
            "erode={pre_erode_iters} dilate={dilate_iters} source={source_pixels} sample={sample_pixels} px"
        ),
        StageMetrics::Fill {
            source_pixels,
            sample_pixels,
            largest_sample_blob,
        } => {
            let largest = if *largest_sample_blob {
                " (largest sample blob)"
            } else {
                ""
            };
            format!("source={source_pixels} sample={sample_pixels} px{largest}")
        }
        StageMetrics::Filter {
            feature_area,
            min_pixels,
            max_pixels,
            blob_count,
            mask_pixels,
        } => format!(
            "area={feature_area} window=[{min_pixels}, {max_pixels}] blobs={blob_count} ({mask_pixels} px)"
        ),
    }
}

/// Time one stage transition.
fn timed<C: Clock, S: PipelineStage>(clock: &C, advance: impl FnOnce() -> S) -> (S, StageDiagnostics) {
    let start = clock.now();
    let stage = advance();
    let duration = clock.elapsed(&start);
    let metrics = stage.metrics();
    (stage, StageDiagnostics { duration, metrics })
}

/// Run the staged pipeline, timing every stage.
///
/// # Errors
///
/// Returns the same errors as [`Pending::crop`](crate::pipeline::Pending::crop).
pub fn detect_with_diagnostics<C: Clock>(
    source: &HsvImage,
    sample_rect: Rect,
    config: &DetectConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let crop_start = clock.now();
    let cropped = Pipeline::new(source, sample_rect, config.clone()).crop()?;
    let crop = StageDiagnostics {
        duration: clock.elapsed(&crop_start),
        metrics: cropped.metrics(),
    };

    let (classified, classify) = timed(clock, || cropped.classify());
    let (masked, mask) = timed(clock, || classified.build_masks());
    let (morphed, morphology) = timed(clock, || masked.morph());
    let (filled, fill) = timed(clock, || morphed.fill());
    let (filtered, filter) = timed(clock, || filled.filter());
    let staged = filtered.into_result();

    let total_duration = clock.elapsed(&start);
    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: u64::from(staged.dimensions.width) * u64::from(staged.dimensions.height),
        feature_colors: staged.feature_colors.clone(),
        feature_area: staged.feature_area,
        blob_count: staged.blobs.len(),
    };

    let diagnostics = PipelineDiagnostics {
        crop,
        classify,
        mask,
        morphology,
        fill,
        filter,
        total_duration,
        summary,
    };
    Ok((staged, diagnostics))
}
