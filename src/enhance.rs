//! Readability filters for scanned pages.
//!
//! Local-contrast equalization works on the L channel of CIE Lab so the page
//! colours are left alone; everything else operates on the RGB image directly.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use palette::{IntoColor, Lab, Srgb};
use tracing::{debug, info, instrument};

/// Tile grid used for every contrast-limited equalization
pub const CLAHE_TILES: u32 = 8;

/// Clip limit for [`enhance_readability`]
pub const READABILITY_CLIP_LIMIT: f32 = 2.0;

/// Blur kernel for [`enhance_readability`]
pub const READABILITY_BLUR_KERNEL: u32 = 7;

/// Clip limit for [`boost_contrast`]
pub const CONTRAST_CLIP_LIMIT: f32 = 3.0;

/// Processing step a page can go through before it is saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PageFilter {
    /// Local contrast on luminance plus a mild blur
    #[default]
    Readability,
    /// Stronger local contrast, no blur
    Contrast,
    /// 3x3 sharpening kernel
    Sharpen,
    /// Black and white by local mean threshold
    Binarize,
    /// 3x3 median per channel
    Denoise,
}

/// Run one filter, returning a new image
pub fn apply_filter(img: &RgbImage, filter: PageFilter) -> RgbImage {
    match filter {
        PageFilter::Readability => enhance_readability(img),
        PageFilter::Contrast => boost_contrast(img),
        PageFilter::Sharpen => sharpen(img),
        PageFilter::Binarize => binarize(img, 5, 2),
        PageFilter::Denoise => denoise(img),
    }
}

/// Gaussian sigma equivalent to an odd box of `kernel` pixels
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    let k = kernel.max(1) as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// Improve local contrast and suppress noise without touching geometry.
///
/// Lab luminance is equalized with CLAHE (clip 2.0, 8x8 tiles), the chroma
/// channels are passed through, and the recombined image gets a light blur.
#[instrument(skip(img), fields(width = img.width(), height = img.height()))]
pub fn enhance_readability(img: &RgbImage) -> RgbImage {
    let equalized = equalize_luminance(img, READABILITY_CLIP_LIMIT);
    let sigma = sigma_for_kernel(READABILITY_BLUR_KERNEL);
    debug!(sigma, "Denoising equalized page");
    gaussian_blur_f32(&equalized, sigma)
}

/// CLAHE on luminance only, without the denoising blur
#[instrument(skip(img), fields(width = img.width(), height = img.height()))]
pub fn boost_contrast(img: &RgbImage) -> RgbImage {
    equalize_luminance(img, CONTRAST_CLIP_LIMIT)
}

/// Equalize the Lab L channel with the given clip limit and rebuild the RGB image
pub fn equalize_luminance(img: &RgbImage, clip_limit: f32) -> RgbImage {
    let (lightness, chroma) = split_lab(img);
    let equalized = clahe(&lightness, CLAHE_TILES, CLAHE_TILES, clip_limit);
    merge_lab(&equalized, &chroma)
}

/// Split into an 8-bit lightness plane and the untouched (a, b) chroma pairs
fn split_lab(img: &RgbImage) -> (GrayImage, Vec<(f32, f32)>) {
    let (width, height) = img.dimensions();
    let mut lightness = GrayImage::new(width, height);
    let mut chroma = Vec::with_capacity((width * height) as usize);

    for (x, y, pixel) in img.enumerate_pixels() {
        let lab = to_lab(pixel);
        let l = (lab.l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8;
        lightness.put_pixel(x, y, Luma([l]));
        chroma.push((lab.a, lab.b));
    }

    (lightness, chroma)
}

fn merge_lab(lightness: &GrayImage, chroma: &[(f32, f32)]) -> RgbImage {
    let (width, height) = lightness.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let (a, b) = chroma[(y * width + x) as usize];
        let l = lightness.get_pixel(x, y)[0] as f32 * 100.0 / 255.0;
        from_lab(Lab::new(l, a, b))
    })
}

pub(crate) fn to_lab(pixel: &Rgb<u8>) -> Lab {
    Srgb::new(pixel[0], pixel[1], pixel[2])
        .into_format::<f32>()
        .into_color()
}

fn from_lab(lab: Lab) -> Rgb<u8> {
    let srgb: Srgb = lab.into_color();
    let rgb: Srgb<u8> = srgb.into_format();
    Rgb([rgb.red, rgb.green, rgb.blue])
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is cut into a `tiles_x` by `tiles_y` grid; each tile's histogram
/// is clipped at `clip_limit` times the uniform bin height, the excess is
/// spread over all bins, and the cumulative histogram becomes that tile's
/// lookup table. Pixels blend the tables of the four nearest tile centres.
/// Images with fewer pixels than tiles along either axis come back unchanged.
pub fn clahe(gray: &GrayImage, tiles_x: u32, tiles_y: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if tiles_x == 0 || tiles_y == 0 || w < tiles_x || h < tiles_y {
        return gray.clone();
    }
    let tile_w = w / tiles_x;
    let tile_h = h / tiles_y;

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = if tx == tiles_x - 1 { w } else { x0 + tile_w };
            let y1 = if ty == tiles_y - 1 { h } else { y0 + tile_h };
            let area = (x1 - x0) * (y1 - y0);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let per_bin = excess / 256;
            for bin in hist.iter_mut() {
                *bin += per_bin;
            }
            // Leftover counts go to evenly spaced bins across the range
            let mut residual = (excess % 256) as usize;
            if residual > 0 {
                let step = (256 / residual).max(1);
                let mut i = 0;
                while i < 256 && residual > 0 {
                    hist[i] += 1;
                    i += step;
                    residual -= 1;
                }
            }

            let scale = 255.0 / area as f32;
            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let mut cumulative = 0u32;
            for (value, count) in hist.iter().enumerate() {
                cumulative += count;
                lut[value] = (cumulative as f32 * scale).round().min(255.0) as u8;
            }
        }
    }

    let max_tx = tiles_x as i64 - 1;
    let max_ty = tiles_y as i64 - 1;
    GrayImage::from_fn(w, h, |x, y| {
        let value = gray.get_pixel(x, y)[0] as usize;

        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = (fx.floor() as i64).clamp(0, max_tx) as u32;
        let tx1 = (fx.floor() as i64 + 1).clamp(0, max_tx) as u32;
        let ty0 = (fy.floor() as i64).clamp(0, max_ty) as u32;
        let ty1 = (fy.floor() as i64 + 1).clamp(0, max_ty) as u32;
        let ax = (fx - fx.floor()).clamp(0.0, 1.0);
        let ay = (fy - fy.floor()).clamp(0.0, 1.0);

        let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][value] as f32;
        let top = at(tx0, ty0) * (1.0 - ax) + at(tx1, ty0) * ax;
        let bottom = at(tx0, ty1) * (1.0 - ax) + at(tx1, ty1) * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// Emphasize strokes with a 3x3 high-boost kernel
#[instrument(skip(img), fields(width = img.width(), height = img.height()))]
pub fn sharpen(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let sample = |x: i64, y: i64| -> Rgb<u8> {
        let x = x.clamp(0, width as i64 - 1) as u32;
        let y = y.clamp(0, height as i64 - 1) as u32;
        *img.get_pixel(x, y)
    };

    RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let mut acc = [0i32; 3];
        for dy in -1..=1 {
            for dx in -1..=1 {
                let weight = if dx == 0 && dy == 0 { 9 } else { -1 };
                let p = sample(x + dx, y + dy);
                for c in 0..3 {
                    acc[c] += weight * p[c] as i32;
                }
            }
        }
        Rgb(acc.map(|v| v.clamp(0, 255) as u8))
    })
}

/// Black-and-white page by adaptive threshold.
///
/// A pixel turns white when it is brighter than the mean of its
/// `(2 * block_radius + 1)` square neighbourhood minus `c`. The window is
/// cropped at the image border and the mean taken over what remains.
#[instrument(skip(img), fields(width = img.width(), height = img.height()))]
pub fn binarize(img: &RgbImage, block_radius: u32, c: i32) -> RgbImage {
    let gray = image::imageops::grayscale(img);
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return RgbImage::new(width, height);
    }
    let sums = integral_image::<_, u64>(&gray);

    RgbImage::from_fn(width, height, |x, y| {
        let left = x.saturating_sub(block_radius);
        let top = y.saturating_sub(block_radius);
        let right = x.saturating_add(block_radius).min(width - 1);
        let bottom = y.saturating_add(block_radius).min(height - 1);

        let [sum] = sum_image_pixels(&sums, left, top, right, bottom);
        let count = (right - left + 1) as f64 * (bottom - top + 1) as f64;
        let threshold = sum as f64 / count - c as f64;

        let v = if gray.get_pixel(x, y)[0] as f64 > threshold { 255 } else { 0 };
        Rgb([v, v, v])
    })
}

/// Remove speckle with a 3x3 median
#[instrument(skip(img), fields(width = img.width(), height = img.height()))]
pub fn denoise(img: &RgbImage) -> RgbImage {
    info!("Applying median denoise");
    median_filter(img, 1, 1)
}
