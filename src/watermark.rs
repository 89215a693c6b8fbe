//! Text watermarks that keep the source's metadata block.

use ab_glyph::{Font, FontVec, OutlinedGlyph, PxScale, Rect, ScaleFont, point};
use anyhow::{Context, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{Config, OutputConfig};
use crate::exif::container;
use crate::pipeline::{ImageKind, Transformation, destination_for};

/// Font height relative to image height.
const FONT_SCALE: f32 = 0.05;
const MIN_FONT_PX: f32 = 10.0;
/// Edge padding relative to image width.
const PADDING_SCALE: f32 = 0.02;

/// Where the text block is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::Center,
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }

    /// Top-left corner of a `text_w` x `text_h` block inside a
    /// `width` x `height` image.
    fn anchor(self, width: f32, height: f32, text_w: f32, text_h: f32, padding: f32) -> (f32, f32) {
        match self {
            Self::Center => ((width - text_w) / 2.0, (height - text_h) / 2.0),
            Self::TopLeft => (padding, padding),
            Self::TopRight => (width - text_w - padding, padding),
            Self::BottomLeft => (padding, height - text_h - padding),
            Self::BottomRight => (width - text_w - padding, height - text_h - padding),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown position {s:?} (expected one of {})", names.join(", "))
            })
    }
}

/// Draw `text` onto the image at `path` and write a `watermarked_` copy.
///
/// The source's metadata block is captured before decoding and attached
/// to the output unchanged. Uses `config.watermark.font_path`; a missing
/// or unreadable font is an error.
pub fn apply_watermark(
    path: &Path,
    text: &str,
    position: Position,
    opacity: f32,
    config: &Config,
) -> Result<PathBuf> {
    let font_path = config
        .watermark
        .font_path
        .as_deref()
        .context("No watermark font configured (set watermark.font_path)")?;
    let font = load_font(font_path)?;
    watermark_with_font(path, text, position, opacity, &font, &config.output)
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read font {}", path.display()))?;
    FontVec::try_from_vec(data)
        .map_err(|e| anyhow::anyhow!("Invalid font file {}: {e}", path.display()))
}

/// [`apply_watermark`] with an already loaded font.
pub fn watermark_with_font(
    path: &Path,
    text: &str,
    position: Position,
    opacity: f32,
    font: &FontVec,
    output: &OutputConfig,
) -> Result<PathBuf> {
    if !(0.0..=1.0).contains(&opacity) {
        anyhow::bail!("Opacity must be between 0.0 and 1.0, got {opacity}");
    }
    let dest = destination_for(path, Transformation::Watermark, output.output_dir.as_deref())?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let block = container::read_block(&bytes)?;
    let (img, detected) = container::decode_pixels(&bytes)?;
    let format = ImageKind::output_format(&dest, detected);

    let mut canvas = img.to_rgba8();
    draw_text(&mut canvas, font, text, position, opacity);
    let marked = match img.color().has_alpha() {
        true => DynamicImage::ImageRgba8(canvas),
        false => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
    };

    let mut encoded = container::encode_pixels(&marked, format, output)?;
    if let Some(raw) = block {
        encoded = container::replace_block(encoded, Some(&raw))?;
    }
    container::write_atomic(&dest, &encoded)?;
    log::info!("Watermarked: {}", dest.display());
    Ok(dest)
}

/// Rasterise `text` in white, scaled to the image height, and blend it in.
fn draw_text(canvas: &mut RgbaImage, font: &FontVec, text: &str, position: Position, opacity: f32) {
    let (width, height) = canvas.dimensions();
    let size = (height as f32 * FONT_SCALE).floor().max(MIN_FONT_PX);
    let scaled = font.as_scaled(PxScale::from(size));

    let mut caret = point(0.0, scaled.ascent());
    let mut last = None;
    let mut outlined: Vec<OutlinedGlyph> = Vec::new();
    for c in text.chars().filter(|c| !c.is_control()) {
        let mut glyph = scaled.scaled_glyph(c);
        if let Some(prev) = last {
            caret.x += scaled.kern(prev, glyph.id);
        }
        glyph.position = caret;
        last = Some(glyph.id);
        caret.x += scaled.h_advance(glyph.id);
        if let Some(g) = font.outline_glyph(glyph) {
            outlined.push(g);
        }
    }

    let Some(bounds) = outlined.iter().map(|g| g.px_bounds()).reduce(union) else {
        return;
    };
    let padding = (width as f32 * PADDING_SCALE).floor();
    let (x, y) = position.anchor(width as f32, height as f32, bounds.width(), bounds.height(), padding);
    let (dx, dy) = (x - bounds.min.x, y - bounds.min.y);

    for glyph in &outlined {
        let b = glyph.px_bounds();
        let (ox, oy) = ((b.min.x + dx).round() as i64, (b.min.y + dy).round() as i64);
        glyph.draw(|gx, gy, coverage| {
            let (px, py) = (ox + gx as i64, oy + gy as i64);
            if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                return;
            }
            blend_white(canvas.get_pixel_mut(px as u32, py as u32), coverage * opacity);
        });
    }
}

fn union(a: Rect, b: Rect) -> Rect {
    Rect {
        min: point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
        max: point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
    }
}

/// Source-over composite of white at `alpha` onto `px`.
fn blend_white(px: &mut Rgba<u8>, alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    for c in &mut px.0[..3] {
        *c = (*c as f32 * (1.0 - a) + 255.0 * a).round() as u8;
    }
    let base = px.0[3] as f32 / 255.0;
    px.0[3] = ((a + base * (1.0 - a)) * 255.0).round() as u8;
}
