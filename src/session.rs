use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, instrument};

use crate::detection::{detect_document, Detection, DetectorConfig};
use crate::enhance::{apply_filter, enhance_readability, PageFilter};
use crate::error::Result;
use crate::geometry::{Corner, CornerSet, Point};
use crate::io::load_image;
use crate::transform::{rotate, warp_quadrilateral, Rotation};

/// One page being edited: the image, where it came from, and its corner selection.
///
/// The core operations stay free functions; the session only keeps the state
/// that ties them together between user actions.
#[derive(Debug, Clone)]
pub struct EditSession {
    source: Option<PathBuf>,
    image: RgbImage,
    corners: CornerSet,
}

impl EditSession {
    /// Start from an image already in memory, selecting the whole frame
    pub fn from_image(image: RgbImage) -> Self {
        let corners = CornerSet::image_bounds(image.width(), image.height());
        Self {
            source: None,
            image,
            corners,
        }
    }

    /// Load a page from disk, optionally running the readability filter first
    #[instrument(skip_all, fields(path = %path.as_ref().display(), enhance_on_load))]
    pub fn open(path: impl AsRef<Path>, enhance_on_load: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut image = load_image(path)?;
        if enhance_on_load {
            image = enhance_readability(&image);
        }
        info!(width = image.width(), height = image.height(), "Page loaded");

        let mut session = Self::from_image(image);
        session.source = Some(path.to_path_buf());
        Ok(session)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn corners(&self) -> &CornerSet {
        &self.corners
    }

    /// Replace the selection with the detector's best guess
    pub fn detect_corners(&mut self, config: &DetectorConfig) -> Detection {
        let detection = detect_document(&self.image, config);
        self.corners = detection.corners;
        detection
    }

    /// Replace the whole selection, e.g. with [`order_points`] output
    ///
    /// [`order_points`]: crate::geometry::order_points
    pub fn set_corners(&mut self, corners: CornerSet) {
        self.corners = corners;
    }

    /// Move one handle, keeping it inside the image
    pub fn set_corner(&mut self, corner: Corner, point: Point) {
        let max_x = (self.image.width() as f64 - 1.0).max(0.0);
        let max_y = (self.image.height() as f64 - 1.0).max(0.0);
        let clamped = Point::new(point.x.clamp(0.0, max_x), point.y.clamp(0.0, max_y));
        debug!(?corner, x = clamped.x, y = clamped.y, "Corner moved");
        self.corners.set(corner, clamped);
    }

    /// Select the whole frame again
    pub fn reset_corners(&mut self) {
        self.corners = CornerSet::image_bounds(self.image.width(), self.image.height());
    }

    /// Quarter-turn the page; the selection resets to the new frame
    pub fn rotate(&mut self, rotation: Rotation) {
        self.image = rotate(&self.image, rotation);
        self.reset_corners();
    }

    /// Replace the page with a filtered copy; the selection is kept
    pub fn apply_filter(&mut self, filter: PageFilter) {
        self.image = apply_filter(&self.image, filter);
    }

    /// Perspective-corrected view of the current selection
    pub fn deskewed(&self) -> Result<RgbImage> {
        warp_quadrilateral(&self.image, self.corners.points())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::order_points;
    use image::Rgb;

    fn page() -> RgbImage {
        RgbImage::from_fn(60, 40, |x, y| Rgb([x as u8 * 4, y as u8 * 6, 90]))
    }

    #[test]
    fn test_new_session_selects_frame() {
        let session = EditSession::from_image(page());
        assert_eq!(session.corners(), &CornerSet::image_bounds(60, 40));
        assert!(session.source().is_none());
    }

    #[test]
    fn test_set_corner_clamps() {
        let mut session = EditSession::from_image(page());
        session.set_corner(Corner::BottomRight, Point::new(500.0, -3.0));
        assert_eq!(session.corners().bottom_right(), Point::new(59.0, 0.0));
    }

    #[test]
    fn test_rotate_resets_corners() {
        let mut session = EditSession::from_image(page());
        session.set_corner(Corner::TopLeft, Point::new(10.0, 10.0));
        session.rotate(Rotation::Right);
        assert_eq!(session.image().dimensions(), (40, 60));
        assert_eq!(session.corners(), &CornerSet::image_bounds(40, 60));
    }

    #[test]
    fn test_full_frame_deskew_keeps_size() {
        let session = EditSession::from_image(page());
        let out = session.deskewed().unwrap();
        assert_eq!(out.dimensions(), (59, 39));
    }

    #[test]
    fn test_manual_selection_deskew() {
        let mut session = EditSession::from_image(page());
        session.set_corner(Corner::TopLeft, Point::new(10.0, 5.0));
        session.set_corner(Corner::TopRight, Point::new(50.0, 5.0));
        session.set_corner(Corner::BottomRight, Point::new(50.0, 35.0));
        session.set_corner(Corner::BottomLeft, Point::new(10.0, 35.0));
        assert_eq!(session.deskewed().unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn test_set_corners_drives_deskew() {
        let mut session = EditSession::from_image(page());
        let picked = order_points(&[
            Point::new(50.0, 35.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 35.0),
            Point::new(50.0, 5.0),
        ])
        .unwrap();
        session.set_corners(picked);

        assert_eq!(session.corners().get(Corner::TopRight), Point::new(50.0, 5.0));
        assert_eq!(session.deskewed().unwrap().dimensions(), (40, 30));

        session.reset_corners();
        assert_eq!(session.corners(), &CornerSet::image_bounds(60, 40));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EditSession::open(dir.path().join("nope.jpg"), false).is_err());
    }

    #[test]
    fn test_open_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        page().save(&path).unwrap();

        let session = EditSession::open(&path, true).unwrap();
        assert_eq!(session.source(), Some(path.as_path()));
        assert_eq!(session.image().dimensions(), (60, 40));
    }
}
