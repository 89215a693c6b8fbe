use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use super::block::{ExifBlock, Ifd};
use super::container;
use super::gps;
use super::tag::{TAG_USER_COMMENT, TagGroup, TagRegistry};
use exif::Value;

// Windows XP* tags (0th IFD) hold NUL-terminated UTF-16LE in BYTE arrays.
const TAG_XP_TITLE: u16 = 0x9C9B;
const TAG_XP_SUBJECT: u16 = 0x9C9F;

/// One decoded value, shaped for display and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewValue {
    Text(String),
    Integer(i64),
    Integers(Vec<i64>),
    /// `(numerator, denominator)` pairs, e.g. a GPS DMS triple.
    Rationals(Vec<(i64, i64)>),
    Floats(Vec<f64>),
}

impl ViewValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_rationals(&self) -> Option<&[(i64, i64)]> {
        match self {
            Self::Rationals(v) => Some(v),
            _ => None,
        }
    }

    fn from_ints(v: impl IntoIterator<Item = i64>) -> Self {
        let v: Vec<i64> = v.into_iter().collect();
        match v.as_slice() {
            [single] => Self::Integer(*single),
            _ => Self::Integers(v),
        }
    }
}

impl fmt::Display for ViewValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Integers(v) => {
                let parts: Vec<String> = v.iter().map(|n| n.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
            Self::Rationals(v) => {
                let parts: Vec<String> = v.iter().map(|(n, d)| format!("{n}/{d}")).collect();
                f.write_str(&parts.join(", "))
            }
            Self::Floats(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/// Name-keyed, display-ready view of an image's metadata.
///
/// Tags the registry does not know are keyed by their decimal id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExifView {
    #[serde(rename = "0th")]
    pub image: BTreeMap<String, ViewValue>,
    #[serde(rename = "Exif")]
    pub exif: BTreeMap<String, ViewValue>,
    #[serde(rename = "GPS")]
    pub gps: BTreeMap<String, ViewValue>,
    #[serde(rename = "Interop")]
    pub interop: BTreeMap<String, ViewValue>,
    #[serde(rename = "1st")]
    pub thumbnail_ifd: BTreeMap<String, ViewValue>,
    /// Whether the `1st` IFD carries thumbnail image data.
    pub has_thumbnail: bool,
}

impl ExifView {
    pub fn from_block(block: &ExifBlock, registry: &TagRegistry) -> Self {
        let mut view = ExifView {
            has_thumbnail: block.thumbnail.is_some(),
            ..Default::default()
        };
        for ifd in Ifd::ALL {
            let group = ifd.tag_group();
            let section = view.section_mut(ifd);
            for (&id, value) in block.ifd(ifd) {
                let name = registry
                    .lookup_name(group, id)
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string());
                section.insert(name, view_value(group, id, value));
            }
        }
        view
    }

    pub fn section(&self, ifd: Ifd) -> &BTreeMap<String, ViewValue> {
        match ifd {
            Ifd::Primary => &self.image,
            Ifd::Exif => &self.exif,
            Ifd::Gps => &self.gps,
            Ifd::Interop => &self.interop,
            Ifd::Thumbnail => &self.thumbnail_ifd,
        }
    }

    fn section_mut(&mut self, ifd: Ifd) -> &mut BTreeMap<String, ViewValue> {
        match ifd {
            Ifd::Primary => &mut self.image,
            Ifd::Exif => &mut self.exif,
            Ifd::Gps => &mut self.gps,
            Ifd::Interop => &mut self.interop,
            Ifd::Thumbnail => &mut self.thumbnail_ifd,
        }
    }

    /// Look a tag up by name in the 0th, Exif, GPS and Interop sections.
    pub fn get(&self, name: &str) -> Option<&ViewValue> {
        [Ifd::Primary, Ifd::Exif, Ifd::Gps, Ifd::Interop]
            .into_iter()
            .find_map(|ifd| self.section(ifd).get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        Ifd::ALL.iter().all(|&i| self.section(i).is_empty()) && !self.has_thumbnail
    }

    /// Signed decimal `(latitude, longitude)` from the GPS section.
    ///
    /// A reference other than `N` (resp. `E`) negates the value.
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        let lat = self.gps.get("GPSLatitude")?.as_rationals()?;
        let lat = gps::dms_to_degrees(lat)?;
        let lat_ref = self.gps.get("GPSLatitudeRef")?.as_text()?;
        let lon = self.gps.get("GPSLongitude")?.as_rationals()?;
        let lon = gps::dms_to_degrees(lon)?;
        let lon_ref = self.gps.get("GPSLongitudeRef")?.as_text()?;

        let lat = if lat_ref == "N" { lat } else { -lat };
        let lon = if lon_ref == "E" { lon } else { -lon };
        Some((lat, lon))
    }
}

fn view_value(group: TagGroup, id: u16, value: &Value) -> ViewValue {
    match value {
        Value::Ascii(parts) => {
            let parts: Vec<String> = parts
                .iter()
                .map(|p| decode_text(p))
                .filter(|p| !p.is_empty())
                .collect();
            ViewValue::Text(parts.join(", "))
        }
        Value::Undefined(b, _) if group == TagGroup::Exif && id == TAG_USER_COMMENT => {
            ViewValue::Text(decode_user_comment(b))
        }
        Value::Undefined(b, _) => ViewValue::Text(decode_text(b)),
        Value::Byte(b) if group == TagGroup::Image && (TAG_XP_TITLE..=TAG_XP_SUBJECT).contains(&id) => {
            ViewValue::Text(decode_utf16le(b))
        }
        Value::Byte(v) => ViewValue::from_ints(v.iter().map(|&x| x as i64)),
        Value::SByte(v) => ViewValue::from_ints(v.iter().map(|&x| x as i64)),
        Value::Short(v) => ViewValue::from_ints(v.iter().map(|&x| x as i64)),
        Value::SShort(v) => ViewValue::from_ints(v.iter().map(|&x| x as i64)),
        Value::Long(v) => ViewValue::from_ints(v.iter().map(|&x| x as i64)),
        Value::SLong(v) => ViewValue::from_ints(v.iter().map(|&x| x as i64)),
        Value::Rational(v) => {
            ViewValue::Rationals(v.iter().map(|r| (r.num as i64, r.denom as i64)).collect())
        }
        Value::SRational(v) => {
            ViewValue::Rationals(v.iter().map(|r| (r.num as i64, r.denom as i64)).collect())
        }
        Value::Float(v) => ViewValue::Floats(v.iter().map(|&x| x as f64).collect()),
        Value::Double(v) => ViewValue::Floats(v.clone()),
        Value::Unknown(typ, count, _) => ViewValue::Text(format!("<type {typ}, {count} values>")),
    }
}

/// UTF-8 text with trailing NULs trimmed, or a `b'..'` escaped rendering
/// of the raw bytes when they are not valid UTF-8.
fn decode_text(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    match std::str::from_utf8(&bytes[..end]) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let escaped: String = bytes
                .iter()
                .flat_map(|&b| std::ascii::escape_default(b))
                .map(char::from)
                .collect();
            format!("b'{escaped}'")
        }
    }
}

/// UserComment starts with an 8-byte character-code header.
fn decode_user_comment(bytes: &[u8]) -> String {
    match bytes.split_at_checked(8) {
        Some((b"ASCII\0\0\0", rest)) | Some((b"\0\0\0\0\0\0\0\0", rest)) => decode_text(rest),
        Some((b"UNICODE\0", rest)) => decode_utf16le(rest),
        _ => decode_text(bytes),
    }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

/// Decode the metadata block of a file. `Ok(None)` when the file has none.
pub fn load_block(path: &Path) -> Result<Option<ExifBlock>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match container::read_block(&bytes)? {
        Some(raw) => Ok(Some(ExifBlock::parse(&raw).context("Failed to parse metadata block")?)),
        None => Ok(None),
    }
}

/// Read the metadata of an image as a name-keyed view.
///
/// Never fails: a missing, corrupt or unsupported block yields an empty
/// view and a debug log line.
pub fn read_exif(path: &Path, registry: &TagRegistry) -> ExifView {
    match load_block(path) {
        Ok(Some(block)) => ExifView::from_block(&block, registry),
        Ok(None) => {
            log::debug!("No EXIF data found in {}", path.display());
            ExifView::default()
        }
        Err(e) => {
            log::debug!("Could not decode EXIF of {}: {e:#}", path.display());
            ExifView::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::fixtures;
    use crate::exif::block;
    use exif::Rational;
    use tempfile::TempDir;

    fn registry() -> &'static TagRegistry {
        TagRegistry::standard()
    }

    #[test]
    fn view_is_keyed_by_name() {
        let view = ExifView::from_block(&fixtures::camera_block(), registry());
        assert_eq!(view.image.get("Make"), Some(&ViewValue::Text("X".into())));
        assert_eq!(view.get("Model").and_then(|v| v.as_text()), Some("Y"));
        assert_eq!(view.get("Orientation"), Some(&ViewValue::Integer(1)));
        assert_eq!(view.exif.get("BodySerialNumber").unwrap().to_string(), "SN-0042");
        assert!(view.has_thumbnail);
        assert!(view.thumbnail_ifd.contains_key("Compression"));
    }

    #[test]
    fn unknown_ids_keyed_numerically() {
        let mut block = ExifBlock::default();
        block.primary.insert(0xC7FF, Value::Short(vec![3, 4]));
        let view = ExifView::from_block(&block, registry());
        assert_eq!(view.image.get("51199"), Some(&ViewValue::Integers(vec![3, 4])));
    }

    #[test]
    fn multi_string_ascii_joined() {
        let mut block = ExifBlock::default();
        block.primary.insert(0x013B, Value::Ascii(vec![b"Ann".to_vec(), vec![], b"Bo".to_vec()]));
        let view = ExifView::from_block(&block, registry());
        assert_eq!(view.get("Artist").and_then(|v| v.as_text()), Some("Ann, Bo"));
    }

    #[test]
    fn invalid_utf8_falls_back_to_escaped_bytes() {
        assert_eq!(decode_text(b"ok\0\0"), "ok");
        assert_eq!(decode_text(&[0xFF, b'a']), "b'\\xffa'");
    }

    #[test]
    fn user_comment_header_stripped() {
        let mut block = ExifBlock::default();
        block
            .exif
            .insert(TAG_USER_COMMENT, Value::Undefined(b"ASCII\0\0\0hello".to_vec(), 0));
        let view = ExifView::from_block(&block, registry());
        assert_eq!(view.get("UserComment").and_then(|v| v.as_text()), Some("hello"));
    }

    #[test]
    fn xp_tags_decoded_from_utf16() {
        let mut block = ExifBlock::default();
        let raw: Vec<u8> = "Été".encode_utf16().chain([0]).flat_map(|u| u.to_le_bytes()).collect();
        block.primary.insert(TAG_XP_TITLE, Value::Byte(raw));
        let view = ExifView::from_block(&block, registry());
        assert_eq!(view.get("XPTitle").and_then(|v| v.as_text()), Some("Été"));
    }

    #[test]
    fn lat_lon_from_gps_section() {
        let mut block = ExifBlock::default();
        block.gps.insert(1, block::ascii("S"));
        block.gps.insert(2, Value::Rational(gps::to_dms(-33.86)));
        block.gps.insert(3, block::ascii("E"));
        block.gps.insert(4, Value::Rational(gps::to_dms(151.21)));
        let view = ExifView::from_block(&block, registry());
        let (lat, lon) = view.lat_lon().unwrap();
        assert!((lat + 33.86).abs() < 1e-4);
        assert!((lon - 151.21).abs() < 1e-4);
    }

    #[test]
    fn lat_lon_needs_all_four_tags() {
        let mut block = ExifBlock::default();
        block.gps.insert(2, Value::Rational(vec![
            Rational { num: 1, denom: 1 },
            Rational { num: 1, denom: 1 },
            Rational { num: 1, denom: 1 },
        ]));
        let view = ExifView::from_block(&block, registry());
        assert_eq!(view.lat_lon(), None);
    }

    #[test]
    fn read_exif_from_file() {
        let dir = TempDir::new().unwrap();
        let bytes = fixtures::with_block(fixtures::jpeg_bytes(8, 8), &fixtures::camera_block());
        let path = fixtures::write(dir.path(), "a.jpg", &bytes);

        let view = read_exif(&path, registry());
        assert_eq!(view.get("Make").and_then(|v| v.as_text()), Some("X"));
    }

    #[test]
    fn read_exif_never_fails() {
        let dir = TempDir::new().unwrap();
        let plain = fixtures::write(dir.path(), "plain.png", &fixtures::png_bytes(4, 4));
        let junk = fixtures::write(dir.path(), "junk.jpg", b"not an image");

        assert!(read_exif(&plain, registry()).is_empty());
        assert!(read_exif(&junk, registry()).is_empty());
        assert!(read_exif(&dir.path().join("missing.jpg"), registry()).is_empty());
    }

    #[test]
    fn json_uses_ifd_names() {
        let view = ExifView::from_block(&fixtures::camera_block(), registry());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["0th"]["Make"], "X");
        assert_eq!(json["Exif"]["ISOSpeedRatings"], 200);
        assert_eq!(json["has_thumbnail"], true);
    }
}
