//! Color profiles and the color selections derived from them.
//!
//! A [`ColorProfile`] counts how many pixels of an image fall into each
//! table color. [`dominant`] picks the background when none is given and
//! [`feature_colors`] picks the colors that characterize a sample.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::color::ColorName;
use crate::types::HsvImage;

/// Pixel counts per table color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorProfile {
    counts: [u64; ColorName::COUNT],
}

impl ColorProfile {
    /// Build a profile from counts in table order.
    #[must_use]
    pub const fn from_counts(counts: [u64; ColorName::COUNT]) -> Self {
        Self { counts }
    }

    /// Pixel count for `color`.
    #[must_use]
    pub const fn count(&self, color: ColorName) -> u64 {
        self.counts[color.index()]
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `(color, count)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ColorName, u64)> + '_ {
        ColorName::ALL.into_iter().map(|c| (c, self.count(c)))
    }

    /// Each color's share of the profiled pixels, in percent.
    ///
    /// All zeros for an empty profile.
    #[must_use]
    pub fn percentages(&self) -> [(ColorName, f64); ColorName::COUNT] {
        let total = self.total();
        ColorName::ALL.map(|c| {
            #[allow(clippy::cast_precision_loss)]
            let pct = if total == 0 {
                0.0
            } else {
                self.count(c) as f64 / total as f64 * 100.0
            };
            (c, pct)
        })
    }
}

impl Index<ColorName> for ColorProfile {
    type Output = u64;

    fn index(&self, color: ColorName) -> &u64 {
        &self.counts[color.index()]
    }
}

/// Count the pixels of `image` falling into each table color.
///
/// Counts are summed over every range of a color; ranges of one color are
/// disjoint, so each pixel is counted once.
#[must_use = "returns the color profile"]
pub fn profile(image: &HsvImage) -> ColorProfile {
    let mut counts = [0u64; ColorName::COUNT];
    for px in image.pixels() {
        for color in ColorName::ALL {
            let hits = color.ranges().iter().filter(|r| r.contains(px)).count();
            counts[color.index()] += hits as u64;
        }
    }
    ColorProfile { counts }
}

/// The color with the highest count.
///
/// Ties go to the color that comes first in table order, so an empty
/// profile yields [`ColorName::Red`].
#[must_use]
pub fn dominant(profile: &ColorProfile) -> ColorName {
    let mut best = ColorName::ALL[0];
    for (color, count) in profile.iter().skip(1) {
        if count > profile.count(best) {
            best = color;
        }
    }
    best
}

/// Colors prevalent among the non-background pixels of `profile`.
///
/// A color outside `background` qualifies when its count exceeds
/// `prevalence` times the non-background total. Returns an empty vector
/// when every pixel is background. Output is in table order.
#[must_use]
pub fn feature_colors(
    profile: &ColorProfile,
    background: &[ColorName],
    prevalence: f64,
) -> Vec<ColorName> {
    let background_total: u64 = ColorName::ALL
        .into_iter()
        .filter(|c| background.contains(c))
        .map(|c| profile.count(c))
        .sum();
    let total = profile.total() - background_total;
    if total == 0 {
        return Vec::new();
    }

    #[allow(clippy::cast_precision_loss)]
    let threshold = prevalence * total as f64;
    profile
        .iter()
        .filter(|(c, _)| !background.contains(c))
        .filter(|&(_, count)| {
            #[allow(clippy::cast_precision_loss)]
            let count = count as f64;
            count > threshold
        })
        .map(|(c, _)| c)
        .collect()
}
