//! Blob extraction and size filtering.
//!
//! Blobs are traced with Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`]; only outer borders become
//! blobs, in the order a row-major scan discovers them. A blob's area is
//! the polygon area of its contour, not its pixel count.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};

use crate::components::Components;
use crate::mask::binarize;
use crate::types::{Blob, Contour, Point};

/// A traced blob together with its component label.
struct Traced {
    label: u32,
    blob: Blob,
}

/// Trace every blob of a binary mask.
///
/// `find_contours` reports the border of a component touching column 0
/// as a hole, so tracing runs on a copy framed by one background pixel
/// and the points are shifted back afterwards.
fn trace(binary: &GrayImage, components: &Components) -> Vec<Traced> {
    let (width, height) = binary.dimensions();
    let mut framed = GrayImage::new(width + 2, height + 2);
    image::imageops::replace(&mut framed, binary, 1, 1);

    let mut seen = vec![false; components.fg_count()];
    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|c| {
            let first = c.points.first()?;
            let label = components.fg_label(
                u32::try_from(first.x - 1).ok()?,
                u32::try_from(first.y - 1).ok()?,
            );
            let slot = seen.get_mut(label as usize)?;
            if label == 0 || *slot {
                return None;
            }
            *slot = true;
            let points = c.points.iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect();
            Some(Traced {
                label,
                blob: Blob::from_contour(Contour::new(points)),
            })
        })
        .collect()
}

/// Every blob of `mask`, in discovery order.
#[must_use = "returns the traced blobs"]
pub fn find_blobs(mask: &GrayImage) -> Vec<Blob> {
    let binary = binarize(mask);
    let components = Components::label(&binary);
    trace(&binary, &components)
        .into_iter()
        .map(|t| t.blob)
        .collect()
}

/// Keep the blobs whose area lies in `[min_pixels, max_pixels]`.
///
/// Kept blobs are redrawn solid; all others are erased. Both bounds are
/// inclusive. Returns the filtered mask and the kept blobs in discovery
/// order.
#[must_use = "returns the filtered mask and kept blobs"]
pub fn filter_by_size(mask: &GrayImage, min_pixels: u64, max_pixels: u64) -> (GrayImage, Vec<Blob>) {
    let binary = binarize(mask);
    let components = Components::label(&binary);
    let traced = trace(&binary, &components);

    #[allow(clippy::cast_precision_loss)]
    let (min, max) = (min_pixels as f64, max_pixels as f64);
    let mut kept_labels = vec![false; components.fg_count()];
    let mut kept = Vec::new();
    for Traced { label, blob } in traced {
        if (min..=max).contains(&blob.area) {
            log::trace!("keeping blob at {:?} (area {})", blob.bounding_rect, blob.area);
            kept_labels[label as usize] = true;
            kept.push(blob);
        } else {
            log::trace!("dropping blob at {:?} (area {})", blob.bounding_rect, blob.area);
        }
    }

    let filtered = components.solid_mask(|label| kept_labels[label as usize]);
    (filtered, kept)
}

/// Keep only the blob with the largest area, drawn solid.
///
/// Ties go to the blob discovered first. A mask without any blobs yields
/// an all-zero mask.
#[must_use = "returns the mask reduced to its largest blob"]
pub fn filter_largest_blob(mask: &GrayImage) -> GrayImage {
    let binary = binarize(mask);
    let components = Components::label(&binary);
    let largest = trace(&binary, &components)
        .into_iter()
        .reduce(|best, t| if t.blob.area > best.blob.area { t } else { best })
        .map(|t| t.label);
    components.solid_mask(|label| Some(label) == largest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;
    use imageproc::region_labelling::{Connectivity, connected_components};

    use super::*;
    use crate::fill::fill_holes;
    use crate::mask::{FOREGROUND, count_nonzero};
    use crate::types::Rect;
    use crate::testing::{mask_from_rows, noise_mask, rect_mask};

    /// Paint solid `w x h` rectangles (polygon area `(w-1)(h-1)`) on one mask.
    fn rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for &(x0, y0, w, h) in rects {
            let r = rect_mask(width, height, x0, y0, w, h);
            for (dst, src) in mask.pixels_mut().zip(r.pixels()) {
                dst.0[0] |= src.0[0];
            }
        }
        mask
    }

    #[test]
    fn empty_mask_has_no_blobs() {
        assert!(find_blobs(&GrayImage::new(10, 10)).is_empty());
        let (mask, blobs) = filter_by_size(&GrayImage::new(10, 10), 0, 100);
        assert!(blobs.is_empty());
        assert_eq!(count_nonzero(&mask), 0);
    }

    #[test]
    fn rectangle_blob_geometry() {
        let blobs = find_blobs(&rect_mask(30, 30, 5, 7, 10, 4));
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];
        assert!((blob.area - 27.0).abs() < f64::EPSILON);
        assert_eq!(blob.bounding_rect, Rect::new(5, 7, 10, 4));
        for p in blob.contour.points() {
            assert!(blob.bounding_rect.contains(p.x, p.y));
        }
    }

    #[test]
    fn blobs_are_in_row_major_discovery_order() {
        let mask = rects(40, 40, &[(25, 2, 5, 5), (2, 10, 5, 5), (15, 30, 5, 5)]);
        let tops: Vec<(i32, i32)> = find_blobs(&mask)
            .iter()
            .map(|b| (b.bounding_rect.x, b.bounding_rect.y))
            .collect();
        assert_eq!(tops, vec![(25, 2), (2, 10), (15, 30)]);
    }

    #[test]
    fn ring_is_one_blob() {
        let mask = mask_from_rows(&[
            ".......", //
            ".#####.", //
            ".#...#.", //
            ".#####.", //
            ".......", //
        ]);
        let blobs = find_blobs(&mask);
        assert_eq!(blobs.len(), 1);
        assert!((blobs[0].area - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn size_window_bounds_are_inclusive() {
        // Areas: 8x8 -> 49, 11x6 -> 50, 21x11 -> 200, 4x68 -> 201.
        let mask = rects(
            120,
            100,
            &[(2, 2, 8, 8), (20, 2, 11, 6), (40, 2, 21, 11), (80, 2, 4, 68)],
        );
        let (filtered, kept) = filter_by_size(&mask, 50, 200);
        let areas: Vec<f64> = kept.iter().map(|b| b.area).collect();
        assert_eq!(areas, vec![50.0, 200.0]);
        assert_eq!(count_nonzero(&filtered), 11 * 6 + 21 * 11);
        assert_eq!(filtered.get_pixel(2, 2).0[0], 0);
        assert_eq!(filtered.get_pixel(80, 50).0[0], 0);
        assert_eq!(filtered.get_pixel(20, 2).0[0], FOREGROUND);
    }

    #[test]
    fn kept_blob_is_redrawn_solid() {
        let mask = mask_from_rows(&[
            ".......", //
            ".#####.", //
            ".#...#.", //
            ".#####.", //
            ".......", //
        ]);
        let (filtered, kept) = filter_by_size(&mask, 0, 100);
        assert_eq!(kept.len(), 1);
        assert_eq!(count_nonzero(&filtered), 15);
    }

    #[test]
    fn dropping_encloser_keeps_nested_blob() {
        let mask = mask_from_rows(&[
            "...........", //
            ".#########.", //
            ".#.......#.", //
            ".#.##....#.", //
            ".#.##....#.", //
            ".#.......#.", //
            ".#########.", //
            "...........", //
        ]);
        // Ring area 8 * 5 = 40, island area 1.
        let (filtered, kept) = filter_by_size(&mask, 1, 10);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].area - 1.0).abs() < f64::EPSILON);
        assert_eq!(count_nonzero(&filtered), 4);
    }

    #[test]
    fn filtered_mask_matches_input_dimensions() {
        let mask = noise_mask(33, 21, 3, 30);
        let (filtered, _) = filter_by_size(&mask, 2, 40);
        assert_eq!(filtered.dimensions(), mask.dimensions());
    }

    #[test]
    fn blobs_touching_every_edge_are_found() {
        // Left, top, right, bottom, and the two opposite corners.
        let placed = [
            (0, 10, 5, 5),
            (12, 0, 5, 5),
            (35, 12, 5, 5),
            (15, 25, 5, 5),
            (0, 0, 4, 4),
            (36, 26, 4, 4),
        ];
        let mask = rects(40, 30, &placed);
        let mut found: Vec<Rect> = find_blobs(&mask).iter().map(|b| b.bounding_rect).collect();
        found.sort_by_key(|r| (r.x, r.y));
        let mut expected: Vec<Rect> = placed
            .iter()
            .map(|&(x, y, w, h)| {
                let c = |v: u32| i32::try_from(v).unwrap();
                Rect::new(c(x), c(y), c(w), c(h))
            })
            .collect();
        expected.sort_by_key(|r| (r.x, r.y));
        assert_eq!(found, expected);
    }

    #[test]
    fn left_edge_blob_geometry() {
        let blobs = find_blobs(&rect_mask(20, 20, 0, 5, 6, 4));
        assert_eq!(blobs.len(), 1);
        assert!((blobs[0].area - 15.0).abs() < f64::EPSILON);
        assert_eq!(blobs[0].bounding_rect, Rect::new(0, 5, 6, 4));
        assert!(blobs[0].contour.points().iter().all(|p| p.x >= 0 && p.y >= 0));
    }

    #[test]
    fn edge_blobs_survive_size_filter() {
        let mask = rects(40, 30, &[(0, 0, 6, 6), (34, 10, 6, 6), (10, 24, 6, 6)]);
        let (filtered, kept) = filter_by_size(&mask, 25, 25);
        assert_eq!(kept.len(), 3);
        assert_eq!(filtered, mask);
    }

    #[test]
    fn whole_image_blob_is_found() {
        let mask = rect_mask(6, 4, 0, 0, 6, 4);
        let blobs = find_blobs(&mask);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].bounding_rect, Rect::new(0, 0, 6, 4));
        assert_eq!(filter_largest_blob(&mask), mask);
    }

    #[test]
    fn one_blob_per_filled_component() {
        for seed in 1..40 {
            let filled = fill_holes(&noise_mask(37, 23, seed, 35));
            let components = connected_components(&filled, Connectivity::Eight, Luma([0u8]));
            let count = components.pixels().map(|p| p.0[0]).max().unwrap_or(0);
            assert_eq!(find_blobs(&filled).len(), count as usize, "seed={seed}");
        }
    }

    #[test]
    fn largest_blob_on_left_edge() {
        let mask = rects(30, 20, &[(0, 3, 10, 10), (20, 3, 4, 4)]);
        assert_eq!(filter_largest_blob(&mask), rect_mask(30, 20, 0, 3, 10, 10));
    }

    #[test]
    fn largest_blob_wins() {
        let mask = rects(60, 30, &[(2, 2, 5, 5), (20, 2, 12, 9), (40, 2, 6, 6)]);
        let largest = filter_largest_blob(&mask);
        assert_eq!(largest, rect_mask(60, 30, 20, 2, 12, 9));
    }

    #[test]
    fn largest_blob_tie_goes_to_first() {
        let mask = rects(40, 20, &[(2, 2, 5, 5), (20, 2, 5, 5)]);
        assert_eq!(filter_largest_blob(&mask), rect_mask(40, 20, 2, 2, 5, 5));
    }

    #[test]
    fn largest_blob_of_empty_mask_is_empty() {
        assert_eq!(count_nonzero(&filter_largest_blob(&GrayImage::new(8, 8))), 0);
    }
}
