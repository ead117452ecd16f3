use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;
use tracing::{debug, info, instrument, warn};

use crate::contour::{approximate_closed, bounding_size, Outline};
use crate::enhance::{equalize_luminance, sigma_for_kernel};
use crate::geometry::{CornerSet, Point};

/// Tunable thresholds of the page-boundary detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Width the image is resized to before analysis (aspect ratio kept)
    pub working_width: u32,
    /// Gaussian blur kernel size (odd)
    pub blur_kernel: u32,
    /// Canny hysteresis thresholds
    pub canny_low: f32,
    pub canny_high: f32,
    /// CLAHE clip limit applied to Lab luminance before edge detection
    pub contrast_clip: Option<f32>,
    /// Square kernel size for closing gaps in the edge map
    pub closing_kernel: Option<u32>,
    /// Minimum contour area as a fraction of the working image area
    pub min_area_fraction: f64,
    /// Accepted bounding-box width/height ratio, both ends exclusive
    pub aspect_range: (f64, f64),
    /// How many of the largest contours are examined
    pub candidate_count: usize,
    /// Polygon tolerance as a fraction of the contour perimeter
    pub epsilon_fraction: f64,
}

impl DetectorConfig {
    /// Plain grayscale pipeline
    pub fn basic() -> Self {
        Self {
            working_width: 500,
            blur_kernel: 5,
            canny_low: 75.0,
            canny_high: 200.0,
            contrast_clip: None,
            closing_kernel: None,
            min_area_fraction: 0.2,
            aspect_range: (0.5, 2.0),
            candidate_count: 5,
            epsilon_fraction: 0.02,
        }
    }

    /// Contrast-normalized pipeline for unevenly lit photos
    pub fn enhanced() -> Self {
        Self {
            working_width: 800,
            blur_kernel: 5,
            canny_low: 75.0,
            canny_high: 200.0,
            contrast_clip: Some(3.0),
            closing_kernel: Some(5),
            min_area_fraction: 0.1,
            aspect_range: (0.4, 2.5),
            candidate_count: 10,
            epsilon_fraction: 0.02,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorPreset::default().config()
    }
}

/// Named detector settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DetectorPreset {
    /// 500 px working width, no contrast step
    Basic,
    /// 800 px working width, luminance CLAHE and edge closing
    #[default]
    Enhanced,
}

impl DetectorPreset {
    pub fn config(self) -> DetectorConfig {
        match self {
            DetectorPreset::Basic => DetectorConfig::basic(),
            DetectorPreset::Enhanced => DetectorConfig::enhanced(),
        }
    }
}

/// Outcome of a detection run
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Page corners in source-image coordinates
    pub corners: CornerSet,
    /// False when no contour passed and the image bounds were returned
    pub found: bool,
}

/// Convert to grayscale with BT.601 weights
fn to_grayscale(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let luma = (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64)
            .round()
            .min(255.0) as u8;
        gray.put_pixel(x, y, Luma([luma]));
    }

    gray
}

/// Edge map of the working image, ready for contour tracing
fn edge_map(working: &RgbImage, config: &DetectorConfig) -> GrayImage {
    let gray = match config.contrast_clip {
        Some(clip) => to_grayscale(&equalize_luminance(working, clip)),
        None => to_grayscale(working),
    };

    let blurred = gaussian_blur_f32(&gray, sigma_for_kernel(config.blur_kernel));
    let edges = canny(&blurred, config.canny_low, config.canny_high);

    match config.closing_kernel.map(|k| k / 2).filter(|&r| r > 0) {
        Some(radius) => close(&edges, Norm::LInf, radius.min(u8::MAX as u32) as u8),
        None => edges,
    }
}

/// Traced borders sorted by enclosed area, largest first (stable on ties)
pub fn rank_outlines(contours: &[Contour<i32>]) -> Vec<Outline> {
    let mut outlines: Vec<Outline> = contours.iter().map(Outline::from_contour).collect();
    outlines.sort_by(|a, b| b.area.total_cmp(&a.area));
    outlines
}

/// First of the top candidates that looks like a page.
///
/// Candidates are visited in the given order and the scan stops at the first
/// one that simplifies to four vertices, encloses more than the minimum area
/// fraction of `frame_area`, and has a bounding box inside the aspect band.
pub fn first_document_quad(
    outlines: &[Outline],
    config: &DetectorConfig,
    frame_area: f64,
) -> Option<[Point; 4]> {
    let min_area = config.min_area_fraction * frame_area;
    let (min_aspect, max_aspect) = config.aspect_range;

    for (rank, outline) in outlines.iter().take(config.candidate_count).enumerate() {
        let epsilon = config.epsilon_fraction * outline.perimeter();
        if epsilon <= 0.0 {
            continue;
        }

        let approx = approximate_closed(&outline.points, epsilon);
        if approx.len() != 4 {
            debug!(rank, vertices = approx.len(), "Candidate rejected: not a quadrilateral");
            continue;
        }
        if outline.area <= min_area {
            debug!(rank, area = outline.area, min_area, "Candidate rejected: too small");
            continue;
        }

        let (w, h) = bounding_size(&approx);
        let aspect = w / h;
        if !(min_aspect < aspect && aspect < max_aspect) {
            debug!(rank, aspect, "Candidate rejected: aspect ratio out of range");
            continue;
        }

        debug!(rank, area = outline.area, aspect, "Candidate accepted");
        return Some([approx[0], approx[1], approx[2], approx[3]]);
    }

    None
}

/// Find the page boundary, falling back to the image bounds.
///
/// Never fails: anything that prevents a confident match (empty image, no
/// edges, no plausible quadrilateral) yields the image's own corners with
/// `found` set to false.
#[instrument(skip(img, config), fields(width = img.width(), height = img.height()))]
pub fn detect_document(img: &RgbImage, config: &DetectorConfig) -> Detection {
    let (width, height) = img.dimensions();
    let fallback = Detection {
        corners: CornerSet::image_bounds(width, height),
        found: false,
    };

    if width == 0 || height == 0 || config.working_width == 0 {
        warn!("Nothing to analyse; using image bounds");
        return fallback;
    }

    let ratio = width as f64 / config.working_width as f64;
    let working_height = (height as f64 / ratio) as u32;
    if working_height == 0 {
        warn!(ratio, "Working image would be empty; using image bounds");
        return fallback;
    }

    let working = imageops::resize(img, config.working_width, working_height, FilterType::Triangle);
    let edges = edge_map(&working, config);

    let contours = find_contours::<i32>(&edges);
    let outlines = rank_outlines(&contours);
    debug!(contours = outlines.len(), "Traced edge contours");

    let frame_area = config.working_width as f64 * working_height as f64;
    match first_document_quad(&outlines, config, frame_area) {
        Some(quad) => {
            let corners = CornerSet::from_unordered(quad.map(|p| p.scaled(ratio)));
            info!(corners = ?corners.points(), "Document boundary detected");
            Detection {
                corners,
                found: true,
            }
        }
        None => {
            info!("No document boundary found; using image bounds");
            fallback
        }
    }
}

/// Best-guess page corners with the default preset
pub fn detect_document_corners(img: &RgbImage) -> CornerSet {
    detect_document(img, &DetectorConfig::default()).corners
}

/// Best-guess page corners with explicit settings
pub fn detect_document_corners_with(img: &RgbImage, config: &DetectorConfig) -> CornerSet {
    detect_document(img, config).corners
}
