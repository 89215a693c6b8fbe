//! Metadata stripping by pixel re-encode.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::OutputConfig;
use crate::exif::container;
use crate::pipeline::{ImageKind, Transformation, destination_for};

/// Re-save the pixels of `path` with no metadata block to a `purified_`
/// destination and return its path.
///
/// The orientation tag goes with everything else, so viewers show the
/// pixels in stored order afterwards. The output is encoded in the format
/// its extension names.
pub fn strip_exif(path: &Path, output: &OutputConfig) -> Result<PathBuf> {
    let dest = destination_for(path, Transformation::Purify, output.output_dir.as_deref())?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (img, detected) = container::decode_pixels(&bytes)?;
    let format = ImageKind::output_format(&dest, detected);
    let encoded = container::encode_pixels(&img, format, output)?;
    container::write_atomic(&dest, &encoded)?;
    log::info!("Stripped metadata: {}", dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::{TagRegistry, fixtures, read_exif};
    use tempfile::TempDir;

    #[test]
    fn strip_png_without_block() {
        let dir = TempDir::new().unwrap();
        let src = fixtures::write(dir.path(), "p.png", &fixtures::png_bytes(9, 6));

        let dest = strip_exif(&src, &OutputConfig::default()).unwrap();
        assert_eq!(dest, dir.path().join("purified_p.png"));

        let out = std::fs::read(&dest).unwrap();
        assert_eq!(container::read_block(&out).unwrap(), None);
        let (before, _) = container::decode_pixels(&std::fs::read(&src).unwrap()).unwrap();
        let (after, _) = container::decode_pixels(&out).unwrap();
        assert_eq!(before.to_rgb8().as_raw(), after.to_rgb8().as_raw());
    }

    #[test]
    fn strip_jpeg_drops_block() {
        let dir = TempDir::new().unwrap();
        let bytes = fixtures::with_block(fixtures::jpeg_bytes(16, 16), &fixtures::camera_block());
        let src = fixtures::write(dir.path(), "c.jpg", &bytes);

        let dest = strip_exif(&src, &OutputConfig::default()).unwrap();
        assert!(read_exif(&dest, TagRegistry::standard()).is_empty());
        let (img, _) = container::decode_pixels(&std::fs::read(&dest).unwrap()).unwrap();
        assert_eq!((img.width(), img.height()), (16, 16));
    }

    #[test]
    fn strip_webp_drops_block_and_keeps_pixels() {
        let dir = TempDir::new().unwrap();
        let block = fixtures::camera_block().serialize().unwrap();
        let original = fixtures::webp_bytes(10, 6);
        let bytes = fixtures::webp_with_exif_chunk(original.clone(), &block, false);
        let src = fixtures::write(dir.path(), "c.webp", &bytes);

        let dest = strip_exif(&src, &OutputConfig::default()).unwrap();
        assert_eq!(dest, dir.path().join("purified_c.webp"));
        let out = std::fs::read(&dest).unwrap();
        assert_eq!(container::read_block(&out).unwrap(), None);
        let (before, _) = container::decode_pixels(&original).unwrap();
        let (after, format) = container::decode_pixels(&out).unwrap();
        assert_eq!(format, image::ImageFormat::WebP);
        assert_eq!(before.to_rgb8().as_raw(), after.to_rgb8().as_raw());
    }

    #[test]
    fn strip_webp_keeps_alpha() {
        let dir = TempDir::new().unwrap();
        let src = fixtures::write(dir.path(), "a.webp", &fixtures::webp_rgba_bytes(5, 5, 40));

        let dest = strip_exif(&src, &OutputConfig::default()).unwrap();
        let (img, _) = container::decode_pixels(&std::fs::read(&dest).unwrap()).unwrap();
        assert!(img.to_rgba8().pixels().all(|p| p[3] == 40));
    }

    #[test]
    fn strip_encodes_by_extension() {
        let dir = TempDir::new().unwrap();
        // PNG bytes behind a .jpg name
        let src = fixtures::write(dir.path(), "odd.jpg", &fixtures::png_bytes(8, 8));

        let dest = strip_exif(&src, &OutputConfig::default()).unwrap();
        let (_, format) = container::decode_pixels(&std::fs::read(&dest).unwrap()).unwrap();
        assert_eq!(format, image::ImageFormat::Jpeg);
    }

    #[test]
    fn strip_is_idempotent_on_name() {
        let dir = TempDir::new().unwrap();
        let src = fixtures::write(dir.path(), "p.png", &fixtures::png_bytes(4, 4));
        let first = strip_exif(&src, &OutputConfig::default()).unwrap();
        let second = strip_exif(&first, &OutputConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn strip_garbage_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let src = fixtures::write(dir.path(), "bad.jpg", b"nope");
        assert!(strip_exif(&src, &OutputConfig::default()).is_err());
        assert!(!dir.path().join("purified_bad.jpg").exists());
    }
}
