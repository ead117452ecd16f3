use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::{debug, instrument};

use crate::error::{Result, ScanError};

/// How the second page is placed relative to the first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Orientation {
    /// Side by side, second page on the right
    #[default]
    Horizontal,
    /// Stacked, second page below
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    pub orientation: Orientation,
    /// Pixels along the merge axis where the pages are cross-faded
    pub overlap: u32,
}

/// Scale `img` so its height (horizontal) or width (vertical) equals `extent`
fn match_extent(img: &RgbImage, extent: u32, orientation: Orientation) -> RgbImage {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = match orientation {
        Orientation::Horizontal if h != extent => {
            (((w as f64 * extent as f64 / h as f64) as u32).max(1), extent)
        }
        Orientation::Vertical if w != extent => {
            (extent, ((h as f64 * extent as f64 / w as f64) as u32).max(1))
        }
        _ => return img.clone(),
    };
    debug!(from = ?(w, h), to = ?(new_w, new_h), "Rescaling page to match");
    imageops::resize(img, new_w, new_h, FilterType::Lanczos3)
}

fn blend(a: &Rgb<u8>, b: &Rgb<u8>, alpha: f64) -> Rgb<u8> {
    let mix = |c: usize| ((1.0 - alpha) * a[c] as f64 + alpha * b[c] as f64).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

/// Join two pages into one image.
///
/// The smaller page along the cross axis is rescaled (aspect ratio kept) so
/// both share a height when placed side by side, or a width when stacked.
/// Inside the overlap band the first page fades linearly into the second.
#[instrument(skip(first, second))]
pub fn merge_pages(first: &RgbImage, second: &RgbImage, options: MergeOptions) -> Result<RgbImage> {
    if first.width() == 0 || first.height() == 0 || second.width() == 0 || second.height() == 0 {
        return Err(ScanError::InvalidInput("cannot merge an empty image".into()));
    }

    let orientation = options.orientation;
    let cross = |img: &RgbImage| match orientation {
        Orientation::Horizontal => img.height(),
        Orientation::Vertical => img.width(),
    };
    let extent = cross(first).max(cross(second));
    let first = match_extent(first, extent, orientation);
    let second = match_extent(second, extent, orientation);

    let along = |img: &RgbImage| match orientation {
        Orientation::Horizontal => img.width(),
        Orientation::Vertical => img.height(),
    };
    let (len1, len2) = (along(&first), along(&second));
    let overlap = options.overlap;
    if overlap >= len1 || overlap >= len2 {
        return Err(ScanError::InvalidInput(format!(
            "overlap of {overlap} px must be smaller than both pages ({len1} and {len2} px)"
        )));
    }

    let offset = len1 - overlap;
    let total = len1 + len2 - overlap;
    let (out_w, out_h) = match orientation {
        Orientation::Horizontal => (total, extent),
        Orientation::Vertical => (extent, total),
    };

    let merged = RgbImage::from_fn(out_w, out_h, |x, y| {
        let (pos, cross_pos) = match orientation {
            Orientation::Horizontal => (x, y),
            Orientation::Vertical => (y, x),
        };
        let at = |img: &RgbImage, p: u32| match orientation {
            Orientation::Horizontal => *img.get_pixel(p, cross_pos),
            Orientation::Vertical => *img.get_pixel(cross_pos, p),
        };

        if pos < offset {
            at(&first, pos)
        } else if pos < len1 {
            let i = pos - offset;
            let alpha = i as f64 / overlap as f64;
            blend(&at(&first, pos), &at(&second, i), alpha)
        } else {
            at(&second, pos - offset)
        }
    });

    debug!(width = out_w, height = out_h, overlap, "Pages merged");
    Ok(merged)
}
