//! Locating, replacing and re-encoding around the metadata block inside
//! JPEG, PNG and WebP containers.

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use img_parts::jpeg::Jpeg;
use img_parts::riff::{RiffChunk, RiffContent};
use img_parts::webp::{CHUNK_ALPH, CHUNK_EXIF, CHUNK_VP8L, CHUNK_VP8X, WebP};
use img_parts::{Bytes, DynImage, ImageEXIF};
use jpeg_encoder::{ColorType, Encoder};
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::config::OutputConfig;

/// Marker some writers keep in front of the TIFF header (always present in
/// a JPEG APP1 segment, optional in PNG/WebP chunks).
const EXIF_PREFIX: &[u8] = b"Exif\0\0";

/// Largest APP1 payload: 65535 minus the two length bytes.
const JPEG_APP1_MAX: usize = 65533;

// VP8X feature flags (first payload byte).
const VP8X_ALPHA: u8 = 0x10;
const VP8X_EXIF: u8 = 0x08;
const VP8X_LEN: usize = 10;

/// alpha_is_used bit of the 32-bit VP8L header word.
const VP8L_ALPHA_BIT: u32 = 1 << 28;

fn parse_container(bytes: Bytes) -> Result<DynImage> {
    DynImage::from_bytes(bytes)
        .map_err(|e| anyhow::anyhow!("Failed to parse image container: {e}"))?
        .context("Unsupported image container (expected JPEG, PNG or WebP)")
}

/// Raw TIFF-structured metadata block of an image, without any
/// `Exif\0\0` prefix. `Ok(None)` when the container carries no block.
pub fn read_block(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let image = parse_container(Bytes::copy_from_slice(bytes))?;
    let raw = match &image {
        // The chunk holds a bare TIFF header per the WebP container
        // format, but some writers add the JPEG-style prefix.
        DynImage::WebP(webp) => webp.chunk_by_id(CHUNK_EXIF).and_then(|c| c.content().data().cloned()),
        other => other.exif(),
    };
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.strip_prefix(EXIF_PREFIX).unwrap_or(&raw[..]);
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(raw.to_vec()))
}

/// Return the container with its metadata block replaced (`Some`) or
/// removed (`None`). Every other segment or chunk is carried over as is.
///
/// WebP blocks are stored without the `Exif\0\0` prefix.
pub fn replace_block(bytes: Vec<u8>, block: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut image = parse_container(Bytes::from(bytes))?;
    match &mut image {
        DynImage::Jpeg(jpeg) => set_jpeg_block(jpeg, block)?,
        DynImage::WebP(webp) => set_webp_block(webp, block)?,
        other => other.set_exif(block.map(Bytes::copy_from_slice)),
    }
    Ok(image.encoder().bytes().to_vec())
}

fn set_webp_block(webp: &mut WebP, block: Option<&[u8]>) -> Result<()> {
    webp.remove_chunks_by_id(CHUNK_EXIF);
    if let Some(block) = block {
        let chunk = RiffChunk::new(CHUNK_EXIF, RiffContent::Data(Bytes::copy_from_slice(block)));
        webp.chunks_mut().push(chunk);
    }
    sync_vp8x(webp)
}

/// Bring the VP8X header in line with the EXIF chunk. A simple file that
/// gains a block is promoted to the extended layout, carrying over the
/// alpha flag of its lossless bitstream.
fn sync_vp8x(webp: &mut WebP) -> Result<()> {
    let has_exif = webp.has_chunk(CHUNK_EXIF);

    if let Some(pos) = webp.chunks().iter().position(|c| c.id() == CHUNK_VP8X) {
        let mut data = webp.chunks()[pos]
            .content()
            .data()
            .filter(|d| d.len() >= VP8X_LEN)
            .context("Malformed VP8X chunk")?
            .to_vec();
        if has_exif {
            data[0] |= VP8X_EXIF;
        } else {
            data[0] &= !VP8X_EXIF;
        }
        if webp.has_chunk(CHUNK_ALPH) || vp8l_has_alpha(webp) {
            data[0] |= VP8X_ALPHA;
        }
        webp.chunks_mut()[pos] = RiffChunk::new(CHUNK_VP8X, RiffContent::Data(Bytes::from(data)));
        return Ok(());
    }
    if !has_exif {
        return Ok(());
    }

    let (w, h) = webp.dimensions().context("Failed to read WebP canvas size")?;
    let (Some(w), Some(h)) = (w.checked_sub(1), h.checked_sub(1)) else {
        anyhow::bail!("WebP canvas has a zero dimension");
    };
    let mut flags = VP8X_EXIF;
    if vp8l_has_alpha(webp) {
        flags |= VP8X_ALPHA;
    }
    let mut data = vec![flags, 0, 0, 0];
    data.extend_from_slice(&w.to_le_bytes()[..3]);
    data.extend_from_slice(&h.to_le_bytes()[..3]);
    webp.chunks_mut()
        .insert(0, RiffChunk::new(CHUNK_VP8X, RiffContent::Data(Bytes::from(data))));
    Ok(())
}

fn vp8l_has_alpha(webp: &WebP) -> bool {
    webp.chunk_by_id(CHUNK_VP8L)
        .and_then(|c| c.content().data())
        .and_then(|d| d.get(1..5))
        .map(|h| u32::from_le_bytes([h[0], h[1], h[2], h[3]]) & VP8L_ALPHA_BIT != 0)
        .unwrap_or(false)
}

fn set_jpeg_block(jpeg: &mut Jpeg, block: Option<&[u8]>) -> Result<()> {
    if let Some(block) = block {
        let needed = EXIF_PREFIX.len() + block.len();
        if needed > JPEG_APP1_MAX {
            anyhow::bail!(
                "Metadata block is {needed} bytes, a JPEG APP1 segment holds at most {JPEG_APP1_MAX}"
            );
        }
    }

    let orig_pos = find_exif_segment_pos(jpeg);
    jpeg.set_exif(block.map(Bytes::copy_from_slice));

    // set_exif() inserts at a fixed index, possibly after an XMP APP1.
    // Put the segment back where the old one was.
    if let Some(new_pos) = find_exif_segment_pos(jpeg) {
        let target = orig_pos.unwrap_or(1).min(new_pos);
        if target != new_pos {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(new_pos);
            segments.insert(target, seg);
        }
    }
    Ok(())
}

fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}

/// Decode the pixels of a supported container.
pub fn decode_pixels(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
    let format = image::guess_format(bytes).context("Failed to detect image format")?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
        anyhow::bail!("Unsupported image format: {format:?}");
    }
    let img = image::load_from_memory_with_format(bytes, format)
        .context("Failed to decode image pixels")?;
    Ok((img, format))
}

/// Encode pixels into a fresh container carrying no metadata block.
///
/// JPEG honours `quality` and `subsampling`; PNG and WebP are lossless.
pub fn encode_pixels(img: &DynamicImage, format: ImageFormat, output: &OutputConfig) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            let (w, h) = match (u16::try_from(w), u16::try_from(h)) {
                (Ok(w), Ok(h)) => (w, h),
                _ => anyhow::bail!("Image {w}x{h} exceeds the JPEG dimension limit"),
            };
            let mut encoder = Encoder::new(&mut buf, output.quality);
            encoder.set_sampling_factor(output.subsampling.sampling_factor());
            encoder
                .encode(rgb.as_raw(), w, h, ColorType::Rgb)
                .map_err(|e| anyhow::anyhow!("Failed to encode JPEG: {e}"))?;
        }
        ImageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .context("Failed to encode PNG")?;
        }
        ImageFormat::WebP => {
            // The WebP encoder only takes 8-bit RGB(A).
            let img = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)
                .context("Failed to encode WebP")?;
        }
        other => anyhow::bail!("Unsupported output format: {other:?}"),
    }
    Ok(buf)
}

/// Write `bytes` to `dest` through a temp file in the same directory, so a
/// failure never leaves a partial file at `dest`.
///
/// The result gets the mode of the file it replaces, or the mode a plain
/// create would give (`0o666` minus the umask) when `dest` is new.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let mut tmp = temp_file_in(dir).context("Failed to create temp file")?;
    if let Ok(meta) = std::fs::metadata(dest) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("Failed to copy permissions of {}", dest.display()))?;
    }
    tmp.write_all(bytes).context("Failed to write image data")?;
    tmp.persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(())
}

#[cfg(unix)]
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    use std::os::unix::fs::PermissionsExt;
    tempfile::Builder::new()
        .permissions(std::fs::Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

#[cfg(not(unix))]
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    NamedTempFile::new_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Subsampling;
    use crate::exif::fixtures;
    use tempfile::TempDir;

    #[test]
    fn jpeg_without_block_reads_none() {
        let jpeg = fixtures::jpeg_bytes(16, 16);
        assert_eq!(read_block(&jpeg).unwrap(), None);
    }

    #[test]
    fn jpeg_block_replace_and_read() {
        let block = fixtures::camera_block().serialize().unwrap();
        let jpeg = replace_block(fixtures::jpeg_bytes(16, 16), Some(&block)).unwrap();
        assert_eq!(read_block(&jpeg).unwrap().as_deref(), Some(&block[..]));

        let removed = replace_block(jpeg, None).unwrap();
        assert_eq!(read_block(&removed).unwrap(), None);
    }

    #[test]
    fn png_block_replace_and_read() {
        let block = fixtures::camera_block().serialize().unwrap();
        let png = replace_block(fixtures::png_bytes(8, 8), Some(&block)).unwrap();
        assert_eq!(read_block(&png).unwrap().as_deref(), Some(&block[..]));
    }

    fn webp_chunk(bytes: &[u8], id: [u8; 4]) -> Option<Vec<u8>> {
        let webp = WebP::from_bytes(Bytes::copy_from_slice(bytes)).unwrap();
        webp.chunk_by_id(id).and_then(|c| c.content().data()).map(|d| d.to_vec())
    }

    #[test]
    fn webp_bare_exif_chunk_is_read() {
        let block = fixtures::camera_block().serialize().unwrap();
        let webp = fixtures::webp_with_exif_chunk(fixtures::webp_bytes(8, 8), &block, false);
        assert_eq!(read_block(&webp).unwrap().as_deref(), Some(&block[..]));
    }

    #[test]
    fn webp_prefixed_exif_chunk_is_read() {
        let block = fixtures::camera_block().serialize().unwrap();
        let webp = fixtures::webp_with_exif_chunk(fixtures::webp_bytes(8, 8), &block, true);
        assert_eq!(read_block(&webp).unwrap().as_deref(), Some(&block[..]));
    }

    #[test]
    fn webp_block_is_stored_bare_and_flagged() {
        let block = fixtures::camera_block().serialize().unwrap();
        let webp = replace_block(fixtures::webp_bytes(8, 8), Some(&block)).unwrap();
        assert_eq!(webp_chunk(&webp, CHUNK_EXIF), Some(block.clone()));
        let vp8x = webp_chunk(&webp, CHUNK_VP8X).unwrap();
        assert_eq!(vp8x[0] & VP8X_EXIF, VP8X_EXIF);
        assert_eq!(vp8x[0] & VP8X_ALPHA, 0);
        assert_eq!(&vp8x[4..10], &[7, 0, 0, 7, 0, 0]);
        assert_eq!(read_block(&webp).unwrap().as_deref(), Some(&block[..]));

        let removed = replace_block(webp, None).unwrap();
        assert_eq!(read_block(&removed).unwrap(), None);
        assert_eq!(webp_chunk(&removed, CHUNK_VP8X).unwrap()[0] & VP8X_EXIF, 0);
    }

    #[test]
    fn webp_prefixed_chunk_is_replaced_not_duplicated() {
        let block = fixtures::camera_block().serialize().unwrap();
        let webp = fixtures::webp_with_exif_chunk(fixtures::webp_bytes(8, 8), &block, true);
        let rewritten = replace_block(webp, Some(&block)).unwrap();
        let parsed = WebP::from_bytes(Bytes::from(rewritten)).unwrap();
        assert_eq!(parsed.chunks_by_id(CHUNK_EXIF).count(), 1);
        assert_eq!(parsed.chunks_by_id(CHUNK_VP8X).count(), 1);
    }

    #[test]
    fn webp_alpha_survives_block_insert() {
        let original = fixtures::webp_rgba_bytes(6, 4, 100);
        let block = fixtures::camera_block().serialize().unwrap();
        let with_block = replace_block(original.clone(), Some(&block)).unwrap();
        let vp8x = webp_chunk(&with_block, CHUNK_VP8X).unwrap();
        assert_eq!(vp8x[0] & VP8X_ALPHA, VP8X_ALPHA);

        let (a, _) = decode_pixels(&original).unwrap();
        let (b, format) = decode_pixels(&with_block).unwrap();
        assert_eq!(format, ImageFormat::WebP);
        assert!(b.color().has_alpha());
        assert_eq!(a.to_rgba8().as_raw(), b.to_rgba8().as_raw());
        assert!(b.to_rgba8().pixels().all(|p| p[3] == 100));
    }

    #[test]
    fn webp_opaque_pixels_survive_block_insert() {
        let original = fixtures::webp_bytes(9, 5);
        let block = fixtures::camera_block().serialize().unwrap();
        let with_block = replace_block(original.clone(), Some(&block)).unwrap();

        let (a, _) = decode_pixels(&original).unwrap();
        let (b, _) = decode_pixels(&with_block).unwrap();
        assert_eq!(a.to_rgb8().as_raw(), b.to_rgb8().as_raw());
    }

    #[test]
    fn replacing_block_keeps_pixels() {
        let original = fixtures::jpeg_bytes(16, 16);
        let block = fixtures::camera_block().serialize().unwrap();
        let with_block = replace_block(original.clone(), Some(&block)).unwrap();

        let (a, _) = decode_pixels(&original).unwrap();
        let (b, _) = decode_pixels(&with_block).unwrap();
        assert_eq!(a.to_rgb8().as_raw(), b.to_rgb8().as_raw());
    }

    #[test]
    fn oversized_jpeg_block_rejected() {
        let block = vec![0u8; JPEG_APP1_MAX];
        let err = replace_block(fixtures::jpeg_bytes(8, 8), Some(&block)).unwrap_err();
        assert!(err.to_string().contains("APP1"));
    }

    #[test]
    fn unknown_container_rejected() {
        assert!(read_block(b"definitely not an image").is_err());
        assert!(decode_pixels(b"definitely not an image").is_err());
    }

    #[test]
    fn encoded_jpeg_has_requested_size_and_no_block() {
        let (img, format) = decode_pixels(&fixtures::jpeg_bytes(20, 10)).unwrap();
        for subsampling in [Subsampling::S444, Subsampling::S422, Subsampling::S420] {
            let output = OutputConfig { quality: 90, subsampling, output_dir: None };
            let bytes = encode_pixels(&img, format, &output).unwrap();
            let (back, back_format) = decode_pixels(&bytes).unwrap();
            assert_eq!(back_format, ImageFormat::Jpeg);
            assert_eq!((back.width(), back.height()), (20, 10));
            assert_eq!(read_block(&bytes).unwrap(), None);
        }
    }

    #[test]
    fn png_encode_is_lossless() {
        let png = fixtures::png_bytes(5, 7);
        let (img, format) = decode_pixels(&png).unwrap();
        let bytes = encode_pixels(&img, format, &OutputConfig::default()).unwrap();
        let (back, _) = decode_pixels(&bytes).unwrap();
        assert_eq!(img.to_rgb8().as_raw(), back.to_rgb8().as_raw());
    }

    #[test]
    fn atomic_write_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out").join("a.bin");
        write_atomic(&dest, b"one").unwrap();
        write_atomic(&dest, b"two").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"two");
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_uses_regular_file_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain.bin");
        std::fs::write(&plain, b"x").unwrap();
        let dest = dir.path().join("atomic.bin");
        write_atomic(&dest, b"x").unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dest), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_keeps_mode_of_replaced_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a.bin");
        std::fs::write(&dest, b"one").unwrap();
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&dest, b"two").unwrap();
        assert_eq!(std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o640);
    }
}
