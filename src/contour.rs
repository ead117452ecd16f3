//! Polygon measurements over traced contours.
//!
//! `imageproc::contours::find_contours` yields the raw border pixels; the
//! helpers here measure them and reduce them to polygons for the corner
//! detector.

use imageproc::contours::Contour;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point as PixelPoint;

use crate::geometry::{polygon_area, Point};

/// A traced border converted to floating-point coordinates
#[derive(Debug, Clone)]
pub struct Outline {
    pub points: Vec<Point>,
    /// Enclosed area of the raw border
    pub area: f64,
}

impl Outline {
    pub fn from_contour(contour: &Contour<i32>) -> Self {
        let points: Vec<Point> = contour
            .points
            .iter()
            .map(|p| Point::new(p.x as f64, p.y as f64))
            .collect();
        let area = polygon_area(&points);
        Self { points, area }
    }

    pub fn perimeter(&self) -> f64 {
        closed_perimeter(&self.points)
    }
}

/// Length of a closed curve, including the segment back to the start
pub fn closed_perimeter(points: &[Point]) -> f64 {
    arc_length(&to_pixel_points(points), true)
}

fn to_pixel_points(points: &[Point]) -> Vec<PixelPoint<f64>> {
    points.iter().map(|p| PixelPoint::new(p.x, p.y)).collect()
}

/// Axis-aligned pixel bounding box as (width, height), inclusive of both ends
pub fn bounding_size(points: &[Point]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    (
        (max_x - min_x).floor() + 1.0,
        (max_y - min_y).floor() + 1.0,
    )
}

/// Simplify a closed curve with Douglas-Peucker.
///
/// The curve is first split at two mutually distant points so the result
/// does not depend on where the tracer happened to start; each half is then
/// simplified as an open chain. Returned vertices keep the curve's winding.
/// A non-positive `epsilon` returns the curve unchanged.
pub fn approximate_closed(points: &[Point], epsilon: f64) -> Vec<Point> {
    let n = points.len();
    if n <= 3 || epsilon.is_nan() || epsilon <= 0.0 {
        return points.to_vec();
    }

    let far_from = |from: usize| -> usize {
        let origin = points[from];
        let mut best = from;
        let mut best_dist = -1.0;
        for (i, p) in points.iter().enumerate() {
            let d = p.distance(&origin);
            if d > best_dist {
                best = i;
                best_dist = d;
            }
        }
        best
    };

    let b = far_from(0);
    let a = far_from(b);
    if a == b {
        return vec![points[a]];
    }

    let (start, end) = if a < b { (a, b) } else { (b, a) };

    // Two chains sharing their endpoints: start..=end and end..=start (wrapping)
    let first: Vec<Point> = points[start..=end].to_vec();
    let second: Vec<Point> = points[end..]
        .iter()
        .chain(points[..=start].iter())
        .copied()
        .collect();

    let mut result = simplify_open(&first, epsilon);
    result.pop();
    let mut tail = simplify_open(&second, epsilon);
    tail.pop();
    result.append(&mut tail);
    result
}

/// Douglas-Peucker on an open chain; both endpoints are always kept
fn simplify_open(chain: &[Point], epsilon: f64) -> Vec<Point> {
    approximate_polygon_dp(&to_pixel_points(chain), epsilon, false)
        .into_iter()
        .map(|p| Point::new(p.x, p.y))
        .collect()
}
