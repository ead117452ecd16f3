pub mod cli;
pub mod contour;
pub mod detection;
pub mod enhance;
pub mod error;
pub mod geometry;
pub mod io;
pub mod merge;
pub mod session;
pub mod transform;

pub use cli::Cli;
pub use detection::{
    detect_document, detect_document_corners, detect_document_corners_with, Detection,
    DetectorConfig, DetectorPreset,
};
pub use enhance::{apply_filter, enhance_readability, PageFilter};
pub use error::{Result, ScanError};
pub use geometry::{order_points, Corner, CornerSet, Homography, Point};
pub use io::{load_image, save_image};
pub use merge::{merge_pages, MergeOptions, Orientation};
pub use session::EditSession;
pub use transform::{rotate, warp_quadrilateral, Rotation};
