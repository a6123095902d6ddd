//! Shared types for the subregion detection pipeline.

use serde::{Deserialize, Serialize};

use crate::color::ColorName;

/// Re-export `GrayImage` so downstream crates can reference masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can hand over decoded
/// rasters without depending on `image` directly.
pub use image::RgbImage;

/// Largest hue byte accepted in an [`HsvImage`].
pub const MAX_HUE: u8 = 180;

/// A single HSV pixel using the 8-bit half-degree hue convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue in `[0, 180]`.
    pub h: u8,
    /// Saturation in `[0, 255]`.
    pub s: u8,
    /// Value in `[0, 255]`.
    pub v: u8,
}

impl Hsv {
    /// Create a new HSV pixel.
    #[must_use]
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// An image whose three channels hold hue, saturation and value.
///
/// Construction validates every hue byte against [`MAX_HUE`], so all
/// downstream stages may assume in-range pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsvImage(RgbImage);

impl HsvImage {
    /// Wrap an interleaved `h, s, v` byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedImage`] if either dimension is
    /// zero, the buffer length is not `width * height * 3`, or any hue
    /// byte exceeds [`MAX_HUE`].
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::MalformedImage(format!(
                "image has zero area ({width}x{height})"
            )));
        }
        let expected = u64::from(width) * u64::from(height) * 3;
        if data.len() as u64 != expected {
            return Err(PipelineError::MalformedImage(format!(
                "expected {expected} bytes for a {width}x{height} HSV image, got {}",
                data.len()
            )));
        }
        if let Some(i) = data.iter().step_by(3).position(|&h| h > MAX_HUE) {
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            return Err(PipelineError::MalformedImage(format!(
                "hue {} at ({}, {}) exceeds {MAX_HUE}",
                data[i * 3],
                index % width,
                index / width,
            )));
        }
        RgbImage::from_raw(width, height, data)
            .map(Self)
            .ok_or_else(|| PipelineError::MalformedImage("buffer too small".to_owned()))
    }

    /// Build an image by evaluating `f` at every coordinate.
    ///
    /// `f` must only produce hues up to [`MAX_HUE`]. Outside callers go
    /// through [`from_raw`](Self::from_raw), which rejects bad hues.
    #[must_use]
    pub(crate) fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Hsv) -> Self {
        Self(RgbImage::from_fn(width, height, |x, y| {
            let px = f(x, y);
            debug_assert!(px.h <= MAX_HUE, "hue {} out of range", px.h);
            image::Rgb([px.h, px.s, px.v])
        }))
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// The pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Hsv {
        let [h, s, v] = self.0.get_pixel(x, y).0;
        Hsv { h, s, v }
    }

    /// Iterate pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Hsv> + '_ {
        self.0.pixels().map(|p| Hsv::new(p.0[0], p.0[1], p.0[2]))
    }

    /// The interleaved `h, s, v` bytes.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    /// Copy out the pixels covered by `rect`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidRegion`] if `rect` is empty or
    /// reaches outside the image.
    pub fn crop(&self, rect: Rect) -> Result<Self, PipelineError> {
        let (x, y, width, height) = rect.checked_within(self.dimensions())?;
        Ok(Self::from_fn(width, height, |cx, cy| {
            self.pixel(x + cx, y + cy)
        }))
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// An axis-aligned rectangle in image pixel coordinates.
///
/// Signed so that a rectangle drawn "backwards" can be represented and
/// rejected rather than silently normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two drag corners, `(x1, y1)` being where
    /// the drag started. The corners are not reordered.
    #[must_use]
    pub const fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// One past the right edge.
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// One past the bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Number of pixels covered (zero for degenerate rectangles).
    #[must_use]
    pub fn area(&self) -> u64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        u64::from(self.width.unsigned_abs()) * u64::from(self.height.unsigned_abs())
    }

    /// Whether the point lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Validate against image bounds, returning `(x, y, width, height)`
    /// as unsigned values.
    fn checked_within(&self, dims: Dimensions) -> Result<(u32, u32, u32, u32), PipelineError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(PipelineError::InvalidRegion(format!(
                "sample rectangle must have positive size, got {}x{}",
                self.width, self.height
            )));
        }
        let fits = self.x >= 0
            && self.y >= 0
            && i64::from(self.x) + i64::from(self.width) <= i64::from(dims.width)
            && i64::from(self.y) + i64::from(self.height) <= i64::from(dims.height);
        if !fits {
            return Err(PipelineError::InvalidRegion(format!(
                "rectangle {}x{} at ({}, {}) extends beyond the {}x{} image",
                self.width, self.height, self.x, self.y, dims.width, dims.height
            )));
        }
        Ok((
            self.x.unsigned_abs(),
            self.y.unsigned_abs(),
            self.width.unsigned_abs(),
            self.height.unsigned_abs(),
        ))
    }
}

/// A 2D point on the integer pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Closed polygon tracing the outer border of one mask component.
///
/// The last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a new contour from a vector of border points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Enclosed polygon area via the shoelace formula.
    ///
    /// Vertices sit on pixel centres, so a solid `w x h` rectangle has
    /// area `(w - 1) * (h - 1)` and single-pixel or one-pixel-wide
    /// components have area zero.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.0.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.0[i];
                let b = self.0[(i + 1) % n];
                i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let area = twice.unsigned_abs() as f64 / 2.0;
        area
    }

    /// Smallest upright rectangle containing every point.
    ///
    /// An empty contour yields a zero-sized rectangle at the origin.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        let Some(first) = self.0.first() else {
            return Rect::new(0, 0, 0, 0);
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.0[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }
}

/// A connected mask component with its measured geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    /// Outer border of the component.
    pub contour: Contour,
    /// Polygon area of [`contour`](Self::contour), in square pixels.
    pub area: f64,
    /// Bounding rectangle of the contour.
    pub bounding_rect: Rect,
}

impl Blob {
    /// Measure a blob from its outer contour.
    #[must_use]
    pub fn from_contour(contour: Contour) -> Self {
        let area = contour.area();
        let bounding_rect = contour.bounding_rect();
        Self {
            contour,
            area,
            bounding_rect,
        }
    }
}

/// Configuration for region detection.
///
/// All parameters have defaults matching interactive use; each default is
/// also an associated constant so front ends can share them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Colors to exclude from matching. Empty means "use the dominant
    /// color of the source image".
    pub background_colors: Vec<ColorName>,

    /// Erosion passes applied to both masks before dilation.
    pub pre_erode_iters: u32,

    /// Dilation passes applied to both masks after erosion.
    pub dilate_iters: u32,

    /// Smallest accepted blob area as a fraction of the sample's feature area.
    pub min_area_ratio: f64,

    /// Largest accepted blob area as a fraction of the sample's feature area.
    pub max_area_ratio: f64,

    /// Fraction of non-background sample pixels a color must exceed to
    /// count as a feature color.
    pub prevalence: f64,

    /// Reduce the sample mask to its largest blob before measuring the
    /// feature area.
    pub largest_sample_blob: bool,
}

impl DetectConfig {
    /// Default erosion passes.
    pub const DEFAULT_PRE_ERODE_ITERS: u32 = 0;
    /// Default dilation passes.
    pub const DEFAULT_DILATE_ITERS: u32 = 2;
    /// Default lower area ratio.
    pub const DEFAULT_MIN_AREA_RATIO: f64 = 0.5;
    /// Default upper area ratio.
    pub const DEFAULT_MAX_AREA_RATIO: f64 = 2.0;
    /// Default prevalence threshold.
    pub const DEFAULT_PREVALENCE: f64 = 0.1;

    /// Check the numeric invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if an area ratio is
    /// negative or non-finite, `min_area_ratio > max_area_ratio`, or
    /// `prevalence` lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("min_area_ratio", self.min_area_ratio),
            ("max_area_ratio", self.max_area_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.min_area_ratio > self.max_area_ratio {
            return Err(PipelineError::InvalidConfig(format!(
                "min_area_ratio ({}) exceeds max_area_ratio ({})",
                self.min_area_ratio, self.max_area_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.prevalence) {
            return Err(PipelineError::InvalidConfig(format!(
                "prevalence must lie in [0, 1], got {}",
                self.prevalence
            )));
        }
        Ok(())
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            background_colors: Vec::new(),
            pre_erode_iters: Self::DEFAULT_PRE_ERODE_ITERS,
            dilate_iters: Self::DEFAULT_DILATE_ITERS,
            min_area_ratio: Self::DEFAULT_MIN_AREA_RATIO,
            max_area_ratio: Self::DEFAULT_MAX_AREA_RATIO,
            prevalence: Self::DEFAULT_PREVALENCE,
            largest_sample_blob: false,
        }
    }
}

/// Result of a detection run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Binary mask (0 or 255) with the source image's dimensions.
    pub mask: GrayImage,
    /// Kept blobs, in the order their components were discovered by a
    /// row-major scan.
    pub blobs: Vec<Blob>,
}

/// Result of a detection run with every intermediate preserved.
///
/// Does not derive `PartialEq` because `GrayImage` comparisons walk
/// whole buffers; compare the fields of interest instead.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Sample pixels cropped from the source.
    pub sample: HsvImage,
    /// Background colors used (explicit or inferred).
    pub background_colors: Vec<ColorName>,
    /// Color profile of the sample.
    pub sample_profile: crate::profile::ColorProfile,
    /// Feature colors selected from the sample profile.
    pub feature_colors: Vec<ColorName>,
    /// Source mask straight after color classification.
    pub source_mask: GrayImage,
    /// Sample mask straight after color classification.
    pub sample_mask: GrayImage,
    /// Source mask after erosion and dilation.
    pub source_morphed: GrayImage,
    /// Sample mask after erosion and dilation.
    pub sample_morphed: GrayImage,
    /// Source mask after hole filling.
    pub source_filled: GrayImage,
    /// Sample mask after hole filling (and largest-blob reduction when enabled).
    pub sample_filled: GrayImage,
    /// Foreground pixel count of the final sample mask.
    pub feature_area: u64,
    /// Inclusive blob area window.
    pub min_pixels: u64,
    /// Inclusive blob area window.
    pub max_pixels: u64,
    /// Size-filtered source mask.
    pub mask: GrayImage,
    /// Kept blobs.
    pub blobs: Vec<Blob>,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Drop the intermediates and keep the final mask and blobs.
    #[must_use]
    pub fn into_result(self) -> PipelineResult {
        PipelineResult {
            mask: self.mask,
            blobs: self.blobs,
        }
    }
}

/// Errors that can occur during detection.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The sample rectangle is empty or outside the source image.
    #[error("invalid sample region: {0}")]
    InvalidRegion(String),

    /// The HSV pixel grid is structurally wrong or out of range.
    #[error("malformed HSV image: {0}")]
    MalformedImage(String),

    /// Detection configuration is invalid.
    #[error("invalid detection configuration: {0}")]
    InvalidConfig(String),

    /// A color name is not one of the table entries.
    #[error("unknown color name: {0:?}")]
    UnknownColor(String),

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- HsvImage tests ---

    #[test]
    fn from_raw_rejects_wrong_length() {
        let result = HsvImage::from_raw(2, 2, vec![0; 11]);
        assert!(matches!(result, Err(PipelineError::MalformedImage(_))));
    }

    #[test]
    fn from_raw_rejects_zero_area() {
        let result = HsvImage::from_raw(0, 4, Vec::new());
        assert!(matches!(result, Err(PipelineError::MalformedImage(_))));
    }

    #[test]
    fn from_raw_rejects_hue_above_range() {
        let mut data = vec![0; 2 * 2 * 3];
        data[9] = 181;
        let err = HsvImage::from_raw(2, 2, data).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("181"), "unexpected message: {msg}");
        assert!(msg.contains("(1, 1)"), "unexpected message: {msg}");
    }

    #[test]
    fn from_raw_accepts_hue_at_limit() {
        let image = HsvImage::from_raw(1, 1, vec![180, 255, 255]).unwrap();
        assert_eq!(image.pixel(0, 0), Hsv::new(180, 255, 255));
    }

    #[test]
    fn crop_copies_pixels() {
        let image = HsvImage::from_fn(5, 4, |x, y| Hsv::new(u8::try_from(x * 10 + y).unwrap(), 0, 0));
        let crop = image.crop(Rect::new(1, 2, 3, 2)).unwrap();
        assert_eq!(crop.dimensions(), Dimensions { width: 3, height: 2 });
        assert_eq!(crop.pixel(0, 0).h, 12);
        assert_eq!(crop.pixel(2, 1).h, 33);
    }

    #[test]
    fn crop_rejects_empty_rect() {
        let image = HsvImage::from_fn(5, 5, |_, _| Hsv::new(0, 0, 0));
        for rect in [Rect::new(1, 1, 0, 3), Rect::new(1, 1, 3, 0), Rect::new(4, 4, -2, 2)] {
            assert!(matches!(
                image.crop(rect),
                Err(PipelineError::InvalidRegion(_))
            ));
        }
    }

    #[test]
    fn crop_rejects_out_of_bounds() {
        let image = HsvImage::from_fn(5, 5, |_, _| Hsv::new(0, 0, 0));
        for rect in [Rect::new(3, 0, 3, 1), Rect::new(-1, 0, 2, 2), Rect::new(0, 4, 1, 2)] {
            assert!(matches!(
                image.crop(rect),
                Err(PipelineError::InvalidRegion(_))
            ));
        }
    }

    // --- Rect tests ---

    #[test]
    fn from_corners_keeps_drag_direction() {
        assert_eq!(Rect::from_corners(2, 3, 7, 9), Rect::new(2, 3, 5, 6));
        assert_eq!(Rect::from_corners(7, 9, 2, 3), Rect::new(7, 9, -5, -6));
        assert_eq!(Rect::from_corners(7, 9, 2, 3).area(), 0);
    }

    // --- Contour tests ---

    fn square_border(x0: i32, y0: i32, size: i32) -> Contour {
        let mut points = Vec::new();
        for x in x0..x0 + size {
            points.push(Point::new(x, y0));
        }
        for y in y0 + 1..y0 + size {
            points.push(Point::new(x0 + size - 1, y));
        }
        for x in (x0..x0 + size - 1).rev() {
            points.push(Point::new(x, y0 + size - 1));
        }
        for y in (y0 + 1..y0 + size - 1).rev() {
            points.push(Point::new(x0, y));
        }
        Contour::new(points)
    }

    #[test]
    fn square_contour_area_uses_pixel_centres() {
        let contour = square_border(3, 4, 10);
        assert!((contour.area() - 81.0).abs() < f64::EPSILON);
    }

    #[test]
    fn degenerate_contours_have_zero_area() {
        assert!(Contour::new(Vec::new()).area().abs() < f64::EPSILON);
        assert!(Contour::new(vec![Point::new(1, 1)]).area().abs() < f64::EPSILON);
        let line = Contour::new(vec![Point::new(0, 0), Point::new(1, 0), Point::new(2, 0)]);
        assert!(line.area().abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_rect_contains_contour() {
        let contour = square_border(3, 4, 10);
        let rect = contour.bounding_rect();
        assert_eq!(rect, Rect::new(3, 4, 10, 10));
        for p in contour.points() {
            assert!(rect.contains(p.x, p.y));
        }
    }

    // --- DetectConfig tests ---

    #[test]
    fn default_config_is_valid() {
        assert!(DetectConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_area_window_is_rejected() {
        let config = DetectConfig {
            min_area_ratio: 3.0,
            max_area_ratio: 2.0,
            ..DetectConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn non_finite_ratio_is_rejected() {
        let config = DetectConfig {
            max_area_ratio: f64::NAN,
            ..DetectConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn prevalence_out_of_range_is_rejected() {
        let config = DetectConfig {
            prevalence: 1.5,
            ..DetectConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_json_fills_missing_fields_with_defaults() {
        let config: DetectConfig =
            serde_json::from_str(r#"{"background_colors":["blue","white"],"dilate_iters":4}"#)
                .unwrap();
        assert_eq!(
            config.background_colors,
            vec![ColorName::Blue, ColorName::White]
        );
        assert_eq!(config.dilate_iters, 4);
        assert_eq!(config.pre_erode_iters, DetectConfig::DEFAULT_PRE_ERODE_ITERS);
        assert!((config.min_area_ratio - DetectConfig::DEFAULT_MIN_AREA_RATIO).abs() < f64::EPSILON);
    }
}
