//! In-memory test images.

use exif::Value;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use img_parts::Bytes;
use img_parts::riff::{RiffChunk, RiffContent};
use img_parts::webp::{CHUNK_EXIF, CHUNK_VP8X, WebP};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::block::{self, ExifBlock, Thumbnail};
use super::container;

fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| Rgb([(x * 13 % 256) as u8, (y * 29 % 256) as u8, 128]))
}

pub fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    gradient(w, h)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    gradient(w, h)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Opaque lossless WebP (simple VP8L layout).
pub fn webp_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    gradient(w, h)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP)
        .unwrap();
    buf
}

/// Lossless WebP whose every pixel has the given alpha.
pub fn webp_rgba_bytes(w: u32, h: u32, alpha: u8) -> Vec<u8> {
    let img = RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x * 13 % 256) as u8, (y * 29 % 256) as u8, 128, alpha])
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::WebP).unwrap();
    buf
}

/// Promote a simple opaque WebP to VP8X and append an EXIF chunk holding
/// `tiff`, with or without the `Exif\0\0` prefix, the way other tools
/// lay it out.
pub fn webp_with_exif_chunk(webp: Vec<u8>, tiff: &[u8], prefixed: bool) -> Vec<u8> {
    let mut image = WebP::from_bytes(Bytes::from(webp)).unwrap();
    let (w, h) = image.dimensions().unwrap();
    let mut vp8x = vec![0x08, 0, 0, 0];
    vp8x.extend_from_slice(&(w - 1).to_le_bytes()[..3]);
    vp8x.extend_from_slice(&(h - 1).to_le_bytes()[..3]);

    let mut payload = Vec::new();
    if prefixed {
        payload.extend_from_slice(b"Exif\0\0");
    }
    payload.extend_from_slice(tiff);

    let chunks = image.chunks_mut();
    chunks.insert(0, RiffChunk::new(CHUNK_VP8X, RiffContent::Data(Bytes::from(vp8x))));
    chunks.push(RiffChunk::new(CHUNK_EXIF, RiffContent::Data(Bytes::from(payload))));
    image.encoder().bytes().to_vec()
}

/// Make "X", Model "Y", a body serial number and a thumbnail.
pub fn camera_block() -> ExifBlock {
    let mut block = ExifBlock::default();
    block.primary.insert(0x010F, block::ascii("X"));
    block.primary.insert(0x0110, block::ascii("Y"));
    block.primary.insert(0x0112, Value::Short(vec![1]));
    block.exif.insert(0xA431, block::ascii("SN-0042"));
    block.exif.insert(0x8827, Value::Short(vec![200]));
    block.thumbnail_ifd.insert(0x0103, Value::Short(vec![6]));
    block.thumbnail = Some(Thumbnail::Jpeg(jpeg_bytes(4, 4)));
    block
}

pub fn with_block(container: Vec<u8>, block: &ExifBlock) -> Vec<u8> {
    container::replace_block(container, Some(&block.serialize().unwrap())).unwrap()
}

pub fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
