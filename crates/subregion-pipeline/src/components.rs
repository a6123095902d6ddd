//! Connected-component topology of a binary mask.
//!
//! Foreground is labelled with 8-connectivity and background with
//! 4-connectivity, the dual pairing under which every foreground
//! component has exactly one outer border. Background regions that do
//! not touch the image edge are holes. Each hole is owned by the
//! component directly enclosing it, and each component nested inside a
//! hole points back at that hole, giving the same two-level tree a
//! border-following contour hierarchy describes.
//!
//! Parent links are found from the first pixel of each region in
//! row-major order: the pixel directly above it always belongs to the
//! enclosing region of the opposite kind.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::mask::FOREGROUND;

type Labels = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Labelled foreground components and background regions of a mask.
pub(crate) struct Components {
    fg: Labels,
    bg: Labels,
    /// Indexed by background label.
    enclosed: Vec<bool>,
    /// Indexed by background label; the component enclosing a hole.
    bg_owner: Vec<u32>,
    /// Indexed by foreground label; the hole a component sits in.
    fg_parent: Vec<Option<u32>>,
}

impl Components {
    /// Label a binary (0 / [`FOREGROUND`]) mask.
    pub(crate) fn label(mask: &GrayImage) -> Self {
        let (width, height) = mask.dimensions();
        let fg = connected_components(mask, Connectivity::Eight, Luma([0u8]));
        let inverted = GrayImage::from_fn(width, height, |x, y| {
            if mask.get_pixel(x, y).0[0] == 0 {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        });
        let bg = connected_components(&inverted, Connectivity::Four, Luma([0u8]));

        let fg_count = max_label(&fg) as usize + 1;
        let bg_count = max_label(&bg) as usize + 1;

        let mut enclosed = vec![true; bg_count];
        enclosed[0] = false;
        let (last_x, last_y) = (width.saturating_sub(1), height.saturating_sub(1));
        for x in 0..width {
            enclosed[bg.get_pixel(x, 0).0[0] as usize] = false;
            enclosed[bg.get_pixel(x, last_y).0[0] as usize] = false;
        }
        for y in 0..height {
            enclosed[bg.get_pixel(0, y).0[0] as usize] = false;
            enclosed[bg.get_pixel(last_x, y).0[0] as usize] = false;
        }

        let fg_first = first_pixels(&fg, fg_count);
        let bg_first = first_pixels(&bg, bg_count);

        let fg_parent = fg_first
            .iter()
            .map(|first| {
                let &(x, y) = first.as_ref()?;
                if y == 0 {
                    return None;
                }
                let above = bg.get_pixel(x, y - 1).0[0];
                enclosed[above as usize].then_some(above)
            })
            .collect();

        let bg_owner = bg_first
            .iter()
            .zip(&enclosed)
            .map(|(first, &is_hole)| match *first {
                Some((x, y)) if is_hole && y > 0 => fg.get_pixel(x, y - 1).0[0],
                _ => 0,
            })
            .collect();

        Self {
            fg,
            bg,
            enclosed,
            bg_owner,
            fg_parent,
        }
    }

    /// Foreground label at `(x, y)`, or `0` for background.
    pub(crate) fn fg_label(&self, x: u32, y: u32) -> u32 {
        self.fg.get_pixel(x, y).0[0]
    }

    /// Number of foreground labels, background label `0` included.
    pub(crate) fn fg_count(&self) -> usize {
        self.fg_parent.len()
    }

    /// Redraw the mask with only the components selected by `keep`,
    /// each drawn solid: the component, its holes, and anything nested
    /// in those holes.
    pub(crate) fn solid_mask(&self, keep: impl Fn(u32) -> bool) -> GrayImage {
        let covered = self.resolve_covered(keep);
        let (width, height) = self.fg.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            let label = self.fg_label(x, y);
            let inside = if label != 0 {
                covered[label as usize]
            } else {
                let region = self.bg.get_pixel(x, y).0[0] as usize;
                self.enclosed[region] && covered[self.bg_owner[region] as usize]
            };
            if inside { Luma([FOREGROUND]) } else { Luma([0]) }
        })
    }

    /// For every component, whether it or any enclosing component is kept.
    fn resolve_covered(&self, keep: impl Fn(u32) -> bool) -> Vec<bool> {
        let mut covered: Vec<Option<bool>> = vec![None; self.fg_count()];
        covered[0] = Some(false);
        let mut chain: Vec<u32> = Vec::new();

        for start in self.fg_labels() {
            let mut label = start;
            // Walk outwards until a resolved or kept ancestor is found.
            let base = loop {
                if let Some(known) = covered[label as usize] {
                    break known;
                }
                chain.push(label);
                if keep(label) {
                    break true;
                }
                match self.fg_parent[label as usize] {
                    Some(hole) => label = self.bg_owner[hole as usize],
                    None => break false,
                }
            };
            for l in chain.drain(..) {
                covered[l as usize] = Some(base);
            }
        }

        covered.into_iter().map(|c| c.unwrap_or(false)).collect()
    }

    /// Every foreground label, excluding background `0`.
    fn fg_labels(&self) -> std::ops::Range<u32> {
        let count = u32::try_from(self.fg_count()).unwrap_or(u32::MAX);
        1..count
    }
}

fn max_label(labels: &Labels) -> u32 {
    labels.pixels().map(|p| p.0[0]).max().unwrap_or(0)
}

/// Row-major first pixel of each label.
fn first_pixels(labels: &Labels, count: usize) -> Vec<Option<(u32, u32)>> {
    let mut first = vec![None; count];
    for (x, y, p) in labels.enumerate_pixels() {
        let slot = &mut first[p.0[0] as usize];
        if slot.is_none() {
            *slot = Some((x, y));
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::count_nonzero;
    use crate::testing::mask_from_rows;

    #[test]
    fn keep_all_fills_holes() {
        let mask = mask_from_rows(&[
            ".......", //
            ".#####.", //
            ".#...#.", //
            ".#...#.", //
            ".#####.", //
            ".......", //
        ]);
        let solid = Components::label(&mask).solid_mask(|_| true);
        assert_eq!(count_nonzero(&solid), 20);
    }

    #[test]
    fn diagonal_gap_does_not_open_a_hole() {
        // The background inside touches the outside only diagonally,
        // which does not connect under 4-connectivity.
        let mask = mask_from_rows(&[
            ".....", //
            ".###.", //
            ".#.#.", //
            "..##.", //
            ".....", //
        ]);
        let solid = Components::label(&mask).solid_mask(|_| true);
        assert_eq!(solid.get_pixel(2, 2).0[0], FOREGROUND);
    }

    #[test]
    fn nested_component_follows_its_encloser() {
        let mask = mask_from_rows(&[
            ".........", //
            ".#######.", //
            ".#.....#.", //
            ".#..#..#.", //
            ".#.....#.", //
            ".#######.", //
            ".........", //
        ]);
        let components = Components::label(&mask);
        let ring = components.fg_label(1, 1);
        let island = components.fg_label(4, 3);
        assert_ne!(ring, island);

        // Dropping the island while keeping the ring still covers it.
        let ring_only = components.solid_mask(|l| l == ring);
        assert_eq!(count_nonzero(&ring_only), 35);

        // Keeping only the island draws just the island.
        let island_only = components.solid_mask(|l| l == island);
        assert_eq!(count_nonzero(&island_only), 1);
        assert_eq!(island_only.get_pixel(4, 3).0[0], FOREGROUND);
    }

    #[test]
    fn components_touching_border_have_no_parent() {
        let mask = mask_from_rows(&[
            "##...", //
            "##...", //
            ".....", //
        ]);
        let components = Components::label(&mask);
        let label = components.fg_label(0, 0) as usize;
        assert_eq!(components.fg_parent[label], None);
        assert_eq!(count_nonzero(&components.solid_mask(|_| false)), 0);
    }
}
