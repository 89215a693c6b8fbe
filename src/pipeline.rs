use anyhow::{Context, Result};
use image::ImageFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Container format of an input file, determined by its extension.
///
/// # Example
///
/// ```rust
/// use exif_studio::pipeline::ImageKind;
/// use std::path::Path;
///
/// assert_eq!(ImageKind::from_path(Path::new("photo.JPG")), Some(ImageKind::Jpeg));
/// assert_eq!(ImageKind::from_path(Path::new("scan.tiff")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// JPEG: metadata in an APP1 segment
    Jpeg,
    /// PNG: metadata in an eXIf chunk
    Png,
    /// WebP: metadata in an EXIF RIFF chunk
    WebP,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
        }
    }

    /// Format to re-encode into when writing `dest`: the one its
    /// extension names, else the `detected` format of the source bytes.
    pub fn output_format(dest: &Path, detected: ImageFormat) -> ImageFormat {
        Self::from_path(dest).map_or(detected, Self::image_format)
    }
}

/// What produced an artifact. Each kind prefixes the file name with its
/// marker, see [`destination_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    /// Tag edits and deletions (`formatted_`).
    Format,
    /// Template filtering (`optimized_`).
    Optimize,
    /// Metadata stripping (`purified_`).
    Purify,
    /// Text watermark (`watermarked_`).
    Watermark,
}

impl Transformation {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Format => "formatted_",
            Self::Optimize => "optimized_",
            Self::Purify => "purified_",
            Self::Watermark => "watermarked_",
        }
    }
}

/// Destination path for transforming `source`.
///
/// The file name gets the transformation's marker prepended, unless it
/// already starts with it: then the source itself is the destination, so
/// repeated edits overwrite one artifact instead of growing the name.
/// With `output_dir` the file goes there instead of next to the source.
///
/// ```rust
/// use exif_studio::pipeline::{destination_for, Transformation};
/// use std::path::Path;
///
/// let dest = destination_for(Path::new("up/a.jpg"), Transformation::Format, None).unwrap();
/// assert_eq!(dest, Path::new("up/formatted_a.jpg"));
///
/// let again = destination_for(&dest, Transformation::Format, None).unwrap();
/// assert_eq!(again, dest);
/// ```
pub fn destination_for(
    source: &Path,
    transformation: Transformation,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", source.display()))?;
    let marker = transformation.marker();
    let name = if file_name.starts_with(marker) {
        file_name.to_string()
    } else {
        format!("{marker}{file_name}")
    };
    let dir = match output_dir {
        Some(dir) => dir,
        None => source.parent().unwrap_or(Path::new("")),
    };
    Ok(dir.join(name))
}

/// Expand `paths` into the images to process.
///
/// A file is taken when [`ImageKind::from_path`] recognises it. A directory
/// is walked recursively (following symlinks) in file-name order. A file
/// reached more than once is listed at its first position only.
///
/// ```rust,no_run
/// use exif_studio::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[PathBuf::from("photo.jpg"), PathBuf::from("./photos/")]);
/// println!("{} image(s)", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .flat_map(|path| expand(path))
        .filter(|image| seen.insert(image.clone()))
        .collect()
}

fn expand(path: &Path) -> Vec<PathBuf> {
    if path.is_dir() {
        return WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| {
                entry
                    .map_err(|e| log::warn!("Skipping unreadable entry: {e}"))
                    .ok()
            })
            .map(walkdir::DirEntry::into_path)
            .filter(|p| p.is_file() && ImageKind::from_path(p).is_some())
            .collect();
    }
    if !path.is_file() {
        log::warn!("Path does not exist: {}", path.display());
        return Vec::new();
    }
    if ImageKind::from_path(path).is_none() {
        log::warn!("Skipping unsupported file: {}", path.display());
        return Vec::new();
    }
    vec![path.to_path_buf()]
}
