use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::error::{Result, ScanError};

/// A position in image-pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Named slot in a [`CornerSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }
}

/// Four page corners in canonical order: top-left, top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerSet([Point; 4]);

impl CornerSet {
    /// Label four arbitrary points by coordinate sum and difference.
    ///
    /// The smallest `x + y` is top-left and the largest bottom-right; the
    /// smallest `y - x` is top-right and the largest bottom-left. Ties go to
    /// the earliest point in input order.
    ///
    /// This is reliable for convex, roughly axis-aligned quadrilaterals. A
    /// quadrilateral rotated close to 45° or a self-intersecting one can have
    /// the same point win two labels; callers that accept such shapes must
    /// validate the result themselves.
    pub fn from_unordered(points: [Point; 4]) -> Self {
        let sum = |p: &Point| p.x + p.y;
        let diff = |p: &Point| p.y - p.x;

        let top_left = extreme_by(&points, sum, |a, b| a < b);
        let bottom_right = extreme_by(&points, sum, |a, b| a > b);
        let top_right = extreme_by(&points, diff, |a, b| a < b);
        let bottom_left = extreme_by(&points, diff, |a, b| a > b);

        Self([top_left, top_right, bottom_right, bottom_left])
    }

    /// The image's own corners, used as the no-op selection
    pub fn image_bounds(width: u32, height: u32) -> Self {
        let right = (width as f64 - 1.0).max(0.0);
        let bottom = (height as f64 - 1.0).max(0.0);
        Self([
            Point::new(0.0, 0.0),
            Point::new(right, 0.0),
            Point::new(right, bottom),
            Point::new(0.0, bottom),
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn get(&self, corner: Corner) -> Point {
        self.0[corner.index()]
    }

    /// Replace one corner without re-ordering
    pub fn set(&mut self, corner: Corner, point: Point) {
        self.0[corner.index()] = point;
    }

    pub fn top_left(&self) -> Point {
        self.get(Corner::TopLeft)
    }

    pub fn top_right(&self) -> Point {
        self.get(Corner::TopRight)
    }

    pub fn bottom_right(&self) -> Point {
        self.get(Corner::BottomRight)
    }

    pub fn bottom_left(&self) -> Point {
        self.get(Corner::BottomLeft)
    }

    /// Longest of the top and bottom edges
    pub fn max_width(&self) -> f64 {
        let bottom = self.bottom_right().distance(&self.bottom_left());
        let top = self.top_right().distance(&self.top_left());
        bottom.max(top)
    }

    /// Longest of the left and right edges
    pub fn max_height(&self) -> f64 {
        let right = self.top_right().distance(&self.bottom_right());
        let left = self.top_left().distance(&self.bottom_left());
        right.max(left)
    }

    /// Enclosed area of the quadrilateral
    pub fn area(&self) -> f64 {
        polygon_area(&self.0)
    }
}

fn extreme_by(
    points: &[Point; 4],
    key: impl Fn(&Point) -> f64,
    better: impl Fn(f64, f64) -> bool,
) -> Point {
    let mut best = points[0];
    let mut best_key = key(&best);
    for p in &points[1..] {
        let k = key(p);
        if better(k, best_key) {
            best = *p;
            best_key = k;
        }
    }
    best
}

/// Order exactly four points as top-left, top-right, bottom-right, bottom-left
pub fn order_points(points: &[Point]) -> Result<CornerSet> {
    let quad: [Point; 4] = points.try_into().map_err(|_| {
        ScanError::InvalidInput(format!("expected 4 points, got {}", points.len()))
    })?;
    Ok(CornerSet::from_unordered(quad))
}

/// Absolute area of a simple polygon (shoelace formula)
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    (twice * 0.5).abs()
}

/// Projective transform between two planar quadrilaterals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    /// Solve the homography that maps each `src[i]` onto `dst[i]`.
    ///
    /// Returns `None` when the correspondences do not determine a unique
    /// invertible transform (three or more collinear points).
    pub fn from_quads(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let r = i * 2;
            a[(r, 0)] = s.x;
            a[(r, 1)] = s.y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -d.x * s.x;
            a[(r, 7)] = -d.x * s.y;
            b[r] = d.x;

            a[(r + 1, 3)] = s.x;
            a[(r + 1, 4)] = s.y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -d.y * s.x;
            a[(r + 1, 7)] = -d.y * s.y;
            b[r + 1] = d.y;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            h[0], h[1], h[2],
            h[3], h[4], h[5],
            h[6], h[7], 1.0,
        );

        // Reject near-singular solutions
        let det = matrix.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }

        Some(Self(matrix))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Map a point through the transform
    pub fn apply(&self, point: Point) -> Point {
        let p = self.0 * Vector3::new(point.x, point.y, 1.0);
        Point::new(p.x / p.z, p.y / p.z)
    }
}
