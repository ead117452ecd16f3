use std::path::Path;

use image::{ImageReader, RgbImage};
use tracing::{debug, instrument};

use crate::error::{Result, ScanError};

/// Open and decode any supported raster format as 8-bit RGB
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let decode_failure = |source| ScanError::DecodeFailure {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)
        .map_err(|err| decode_failure(image::ImageError::IoError(err)))?
        .with_guessed_format()
        .map_err(|err| decode_failure(image::ImageError::IoError(err)))?
        .decode()
        .map_err(decode_failure)?;

    debug!(width = img.width(), height = img.height(), "Image decoded");
    Ok(img.to_rgb8())
}

/// Encode an image, choosing the format from the file extension
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_image(img: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| ScanError::EncodeFailure {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(err),
        })?;
    }

    img.save(path).map_err(|source| ScanError::EncodeFailure {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(width = img.width(), height = img.height(), "Image written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_round_trip_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("page.png");
        let img = RgbImage::from_fn(16, 9, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 77]));

        save_image(&img, &path).unwrap();
        assert_eq!(load_image(&path).unwrap(), img);
    }

    #[test]
    fn test_missing_file_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, ScanError::DecodeFailure { .. }));
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(matches!(
            load_image(&path),
            Err(ScanError::DecodeFailure { .. })
        ));
    }
}
