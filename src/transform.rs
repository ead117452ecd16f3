use image::{imageops, Rgb, RgbImage};
use tracing::{debug, instrument};

use crate::error::{Result, ScanError};
use crate::geometry::{order_points, CornerSet, Homography, Point};

/// Quarter-turn direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Rotation {
    /// Counter-clockwise
    Left,
    /// Clockwise
    Right,
}

/// Rotate by 90 degrees, swapping width and height
pub fn rotate(img: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::Left => imageops::rotate270(img),
        Rotation::Right => imageops::rotate90(img),
    }
}

/// Size of the head-on rectangle for a quadrilateral.
///
/// Width is the longer of the top and bottom edges, height the longer of the
/// left and right edges, both truncated to whole pixels.
pub fn target_size(corners: &CornerSet) -> Result<(u32, u32)> {
    let area = corners.area();
    if area < 1.0 {
        return Err(ScanError::GeometryFailure(format!(
            "quadrilateral is degenerate (area {area:.3})"
        )));
    }

    let width = corners.max_width().trunc();
    let height = corners.max_height().trunc();
    if width < 1.0 || height < 1.0 {
        return Err(ScanError::GeometryFailure(format!(
            "target rectangle has no area ({width}x{height})"
        )));
    }

    Ok((width as u32, height as u32))
}

/// Bilinear sample with edge clamping
fn bilinear_interpolate(img: &RgbImage, x: f64, y: f64) -> [f64; 3] {
    let (width, height) = img.dimensions();
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let x_frac = x - x.floor();
    let y_frac = y - y.floor();

    let get_pixel = |px: i64, py: i64| -> [f64; 3] {
        let px = px.clamp(0, width as i64 - 1) as u32;
        let py = py.clamp(0, height as i64 - 1) as u32;
        let p = img.get_pixel(px, py);
        [p[0] as f64, p[1] as f64, p[2] as f64]
    };

    let p00 = get_pixel(x0, y0);
    let p10 = get_pixel(x0 + 1, y0);
    let p01 = get_pixel(x0, y0 + 1);
    let p11 = get_pixel(x0 + 1, y0 + 1);

    let mut result = [0.0; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - x_frac) + p10[c] * x_frac;
        let bottom = p01[c] * (1.0 - x_frac) + p11[c] * x_frac;
        result[c] = top * (1.0 - y_frac) + bottom * y_frac;
    }

    result
}

/// Resample `img` into a `width` x `height` canvas through `forward` by inverse mapping.
///
/// Destination pixels whose source falls outside the image are black.
pub fn apply_homography(
    img: &RgbImage,
    forward: &Homography,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let inverse = forward
        .inverse()
        .ok_or_else(|| ScanError::GeometryFailure("transform is not invertible".into()))?;

    let (src_width, src_height) = img.dimensions();
    let max_x = src_width as f64 - 1.0;
    let max_y = src_height as f64 - 1.0;

    let mut output = RgbImage::new(width, height);
    for (out_x, out_y, pixel) in output.enumerate_pixels_mut() {
        let src = inverse.apply(Point::new(out_x as f64, out_y as f64));
        if src.x.is_finite()
            && src.y.is_finite()
            && src.x >= -0.5
            && src.x <= max_x + 0.5
            && src.y >= -0.5
            && src.y <= max_y + 0.5
        {
            let v = bilinear_interpolate(img, src.x, src.y);
            *pixel = Rgb([
                v[0].round().clamp(0.0, 255.0) as u8,
                v[1].round().clamp(0.0, 255.0) as u8,
                v[2].round().clamp(0.0, 255.0) as u8,
            ]);
        }
    }

    Ok(output)
}

/// Unwarp the quadrilateral spanned by `points` into a head-on rectangle.
///
/// The points may be in any order. Degenerate quadrilaterals (collinear
/// points, zero-size edges) are rejected with [`ScanError::GeometryFailure`].
#[instrument(skip(img, points), fields(width = img.width(), height = img.height()))]
pub fn warp_quadrilateral(img: &RgbImage, points: &[Point]) -> Result<RgbImage> {
    let corners = order_points(points)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ScanError::InvalidInput("source image is empty".into()));
    }

    let (width, height) = target_size(&corners)?;
    let right = width as f64 - 1.0;
    let bottom = height as f64 - 1.0;
    let destination = [
        Point::new(0.0, 0.0),
        Point::new(right, 0.0),
        Point::new(right, bottom),
        Point::new(0.0, bottom),
    ];

    let homography = Homography::from_quads(corners.points(), &destination).ok_or_else(|| {
        ScanError::GeometryFailure("corners do not define a perspective transform".into())
    })?;

    let m = homography.matrix();
    debug!(
        width,
        height,
        "Homography: [{:.4}, {:.4}, {:.4}; {:.4}, {:.4}, {:.4}; {:.6}, {:.6}, 1]",
        m[(0, 0)],
        m[(0, 1)],
        m[(0, 2)],
        m[(1, 0)],
        m[(1, 1)],
        m[(1, 2)],
        m[(2, 0)],
        m[(2, 1)],
    );

    apply_homography(img, &homography, width, height)
}
