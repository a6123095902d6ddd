//! The fixed HSV color classification table.
//!
//! Nine named colors, each covering one or two inclusive HSV boxes. Six
//! chromatic bands split the hue axis with no gaps and require
//! `S >= 39, V >= 64`; three monochrome bands split the rest of the cube
//! by value. Every `(h, s, v)` with `h <= 180` lands in exactly one color,
//! which is what lets profile percentages sum to 100.
//!
//! Table order is significant: it is the iteration order for profiles
//! and the tie-break order for [`crate::profile::dominant`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Hsv, PipelineError};

/// An inclusive box in HSV space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    /// Lower `(h, s, v)` bound.
    pub lower: Hsv,
    /// Upper `(h, s, v)` bound.
    pub upper: Hsv,
}

impl HsvRange {
    /// Create a range from `[h, s, v]` bounds.
    #[must_use]
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self {
            lower: Hsv::new(lower[0], lower[1], lower[2]),
            upper: Hsv::new(upper[0], upper[1], upper[2]),
        }
    }

    /// Whether `px` lies inside the box, bounds included.
    #[must_use]
    pub const fn contains(&self, px: Hsv) -> bool {
        px.h >= self.lower.h
            && px.h <= self.upper.h
            && px.s >= self.lower.s
            && px.s <= self.upper.s
            && px.v >= self.lower.v
            && px.v <= self.upper.v
    }
}

/// One of the nine classification colors, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorName {
    Red,
    Yellow,
    Green,
    Cyan,
    Blue,
    Violet,
    Black,
    Gray,
    White,
}

impl ColorName {
    /// Number of colors in the table.
    pub const COUNT: usize = 9;

    /// All colors in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Red,
        Self::Yellow,
        Self::Green,
        Self::Cyan,
        Self::Blue,
        Self::Violet,
        Self::Black,
        Self::Gray,
        Self::White,
    ];

    /// Position in [`ALL`](Self::ALL).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase name as used in configs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Cyan => "cyan",
            Self::Blue => "blue",
            Self::Violet => "violet",
            Self::Black => "black",
            Self::Gray => "gray",
            Self::White => "white",
        }
    }

    /// The HSV boxes this color covers.
    #[must_use]
    pub fn ranges(self) -> &'static [HsvRange] {
        COLOR_TABLE[self.index()].ranges
    }

    /// Whether `px` falls in any of this color's boxes.
    #[must_use]
    pub fn contains(self, px: Hsv) -> bool {
        self.ranges().iter().any(|r| r.contains(px))
    }
}

impl fmt::Display for ColorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorName {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PipelineError::UnknownColor(s.to_owned()))
    }
}

/// A named color and the HSV boxes it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorDefinition {
    /// Table entry name.
    pub name: ColorName,
    /// One or two inclusive boxes (red wraps the hue axis).
    pub ranges: &'static [HsvRange],
}

const CHROMA_S: u8 = 39;
const CHROMA_V: u8 = 64;

const fn chromatic(h_lo: u8, h_hi: u8) -> HsvRange {
    HsvRange::new([h_lo, CHROMA_S, CHROMA_V], [h_hi, 255, 255])
}

/// The process-wide color table, in declaration order.
pub static COLOR_TABLE: [ColorDefinition; ColorName::COUNT] = [
    ColorDefinition {
        name: ColorName::Red,
        ranges: &[chromatic(0, 20), chromatic(161, 180)],
    },
    ColorDefinition {
        name: ColorName::Yellow,
        ranges: &[chromatic(21, 40)],
    },
    ColorDefinition {
        name: ColorName::Green,
        ranges: &[chromatic(41, 80)],
    },
    ColorDefinition {
        name: ColorName::Cyan,
        ranges: &[chromatic(81, 100)],
    },
    ColorDefinition {
        name: ColorName::Blue,
        ranges: &[chromatic(101, 140)],
    },
    ColorDefinition {
        name: ColorName::Violet,
        ranges: &[chromatic(141, 160)],
    },
    ColorDefinition {
        name: ColorName::Black,
        ranges: &[HsvRange::new([0, 0, 0], [180, 255, 63])],
    },
    ColorDefinition {
        name: ColorName::Gray,
        ranges: &[HsvRange::new([0, 0, 64], [180, 38, 228])],
    },
    ColorDefinition {
        name: ColorName::White,
        ranges: &[HsvRange::new([0, 0, 229], [180, 38, 255])],
    },
];

/// The color `px` belongs to.
///
/// Returns `None` only for hues above 180, which [`crate::HsvImage`]
/// never contains.
#[must_use]
pub fn classify(px: Hsv) -> Option<ColorName> {
    ColorName::ALL.into_iter().find(|c| c.contains(px))
}
