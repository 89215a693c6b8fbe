//! Per-IFD view over a metadata block.
//!
//! Decoding and encoding of the TIFF structure go through kamadak-exif.
//! The view keeps one id→value map per IFD plus the thumbnail payload.
//! Pointer entries (Exif, GPS, Interop) and the thumbnail location
//! entries are not kept in the maps: the encoder synthesizes them from
//! which maps are non-empty and where the thumbnail lands.

use anyhow::{Result, anyhow};
use exif::experimental::Writer;
use exif::{Context, Field, In, Tag, Value};
use std::collections::BTreeMap;
use std::io::Cursor;

use super::tag::{
    TAG_EXIF_POINTER, TAG_GPS_POINTER, TAG_INTEROP_POINTER, TAG_JPEG_THUMBNAIL_LENGTH,
    TAG_JPEG_THUMBNAIL_OFFSET, TAG_STRIP_BYTE_COUNTS, TAG_STRIP_OFFSETS, TAG_TILE_BYTE_COUNTS,
    TAG_TILE_OFFSETS, TagGroup,
};

/// Entries the encoder derives on its own.
const MANAGED: [u16; 9] = [
    TAG_EXIF_POINTER,
    TAG_GPS_POINTER,
    TAG_INTEROP_POINTER,
    TAG_STRIP_OFFSETS,
    TAG_STRIP_BYTE_COUNTS,
    TAG_TILE_OFFSETS,
    TAG_TILE_BYTE_COUNTS,
    TAG_JPEG_THUMBNAIL_OFFSET,
    TAG_JPEG_THUMBNAIL_LENGTH,
];

/// One of the sub-tables of a metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ifd {
    /// `0th`, the primary image.
    Primary,
    Exif,
    Gps,
    Interop,
    /// `1st`, the thumbnail image.
    Thumbnail,
}

impl Ifd {
    pub const ALL: [Ifd; 5] = [Ifd::Primary, Ifd::Exif, Ifd::Gps, Ifd::Interop, Ifd::Thumbnail];

    pub fn name(self) -> &'static str {
        match self {
            Self::Primary => "0th",
            Self::Exif => "Exif",
            Self::Gps => "GPS",
            Self::Interop => "Interop",
            Self::Thumbnail => "1st",
        }
    }

    /// Registry group whose numbering this IFD uses.
    pub fn tag_group(self) -> TagGroup {
        match self {
            Self::Primary | Self::Thumbnail => TagGroup::Image,
            Self::Exif => TagGroup::Exif,
            Self::Gps => TagGroup::Gps,
            Self::Interop => TagGroup::Interop,
        }
    }

    /// IFD a registry group's tags are written to.
    pub fn for_group(group: TagGroup) -> Self {
        match group {
            TagGroup::Image => Self::Primary,
            TagGroup::Exif => Self::Exif,
            TagGroup::Gps => Self::Gps,
            TagGroup::Interop => Self::Interop,
        }
    }

    fn image(self) -> In {
        match self {
            Self::Thumbnail => In::THUMBNAIL,
            _ => In::PRIMARY,
        }
    }

    fn locate(field: &Field) -> Option<Self> {
        match (field.ifd_num, field.tag.context()) {
            (In::PRIMARY, Context::Tiff) => Some(Self::Primary),
            (In::PRIMARY, Context::Exif) => Some(Self::Exif),
            (In::PRIMARY, Context::Gps) => Some(Self::Gps),
            (In::PRIMARY, Context::Interop) => Some(Self::Interop),
            (In::THUMBNAIL, Context::Tiff) => Some(Self::Thumbnail),
            _ => None,
        }
    }

    fn field(self, id: u16, value: Value) -> Field {
        Field {
            tag: Tag(self.tag_group().context(), id),
            ifd_num: self.image(),
            value,
        }
    }
}

pub type IfdMap = BTreeMap<u16, Value>;

/// Image data referenced from the `1st` IFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    /// JPEGInterchangeFormat payload.
    Jpeg(Vec<u8>),
    /// Uncompressed strips, in StripOffsets order.
    Strips(Vec<Vec<u8>>),
}

/// Decoded metadata block: one map per IFD, keyed by numeric tag id.
#[derive(Debug, Clone)]
pub struct ExifBlock {
    pub little_endian: bool,
    pub primary: IfdMap,
    pub exif: IfdMap,
    pub gps: IfdMap,
    pub interop: IfdMap,
    pub thumbnail_ifd: IfdMap,
    pub thumbnail: Option<Thumbnail>,
}

impl Default for ExifBlock {
    fn default() -> Self {
        Self {
            little_endian: true,
            primary: IfdMap::new(),
            exif: IfdMap::new(),
            gps: IfdMap::new(),
            interop: IfdMap::new(),
            thumbnail_ifd: IfdMap::new(),
            thumbnail: None,
        }
    }
}

impl ExifBlock {
    pub fn ifd(&self, ifd: Ifd) -> &IfdMap {
        match ifd {
            Ifd::Primary => &self.primary,
            Ifd::Exif => &self.exif,
            Ifd::Gps => &self.gps,
            Ifd::Interop => &self.interop,
            Ifd::Thumbnail => &self.thumbnail_ifd,
        }
    }

    pub fn ifd_mut(&mut self, ifd: Ifd) -> &mut IfdMap {
        match ifd {
            Ifd::Primary => &mut self.primary,
            Ifd::Exif => &mut self.exif,
            Ifd::Gps => &mut self.gps,
            Ifd::Interop => &mut self.interop,
            Ifd::Thumbnail => &mut self.thumbnail_ifd,
        }
    }

    /// True when nothing describes the primary image. A `1st` IFD cannot
    /// be written without a `0th` one, so a thumbnail alone counts as
    /// empty.
    pub fn is_empty(&self) -> bool {
        [Ifd::Primary, Ifd::Exif, Ifd::Gps, Ifd::Interop]
            .iter()
            .all(|&i| self.ifd(i).is_empty())
    }

    /// Drop the `1st` IFD together with the embedded thumbnail.
    pub fn clear_thumbnail(&mut self) {
        self.thumbnail_ifd.clear();
        self.thumbnail = None;
    }

    /// Parse a block starting at the TIFF header (`II*\0` / `MM\0*`).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let exif = exif::Reader::new()
            .read_raw(data.to_vec())
            .map_err(|e| anyhow!("Failed to parse metadata block: {e}"))?;

        let mut block = ExifBlock { little_endian: exif.little_endian(), ..Default::default() };
        for field in exif.fields() {
            if let Value::Unknown(..) = field.value {
                log::debug!("Skipping {} in IFD {}: unknown value type", field.tag, field.ifd_num);
                continue;
            }
            match Ifd::locate(field) {
                Some(ifd) => {
                    block.ifd_mut(ifd).insert(field.tag.number(), field.value.clone());
                }
                None => log::debug!("Skipping {} in IFD {}", field.tag, field.ifd_num),
            }
        }

        block.thumbnail = take_thumbnail(&mut block.thumbnail_ifd, exif.buf());
        for ifd in Ifd::ALL {
            block.ifd_mut(ifd).retain(|id, _| !MANAGED.contains(id));
        }
        Ok(block)
    }

    /// Encode the block, starting with the TIFF header.
    ///
    /// Fails for an empty block: a TIFF structure needs at least one entry
    /// in the `0th` IFD.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            anyhow::bail!("Cannot encode a metadata block without entries");
        }

        let fields: Vec<Field> = Ifd::ALL
            .iter()
            .flat_map(|&ifd| {
                self.ifd(ifd)
                    .iter()
                    .filter(|(id, _)| !MANAGED.contains(id))
                    .map(move |(&id, value)| ifd.field(id, value.clone()))
            })
            .collect();
        let strips: Vec<&[u8]> = match &self.thumbnail {
            Some(Thumbnail::Strips(strips)) => strips.iter().map(Vec::as_slice).collect(),
            _ => Vec::new(),
        };

        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        match &self.thumbnail {
            Some(Thumbnail::Jpeg(jpeg)) => writer.set_jpeg(jpeg, In::THUMBNAIL),
            Some(Thumbnail::Strips(_)) => writer.set_strips(&strips, In::THUMBNAIL),
            None => {}
        }

        let mut out = Cursor::new(Vec::new());
        writer
            .write(&mut out, self.little_endian)
            .map_err(|e| anyhow!("Failed to encode metadata block: {e}"))?;
        Ok(out.into_inner())
    }
}

/// ASCII value holding one string.
pub fn ascii(text: &str) -> Value {
    Value::Ascii(vec![text.as_bytes().to_vec()])
}

fn uints(value: &Value) -> Vec<usize> {
    match value {
        Value::Short(v) => v.iter().map(|&x| x as usize).collect(),
        Value::Long(v) => v.iter().map(|&x| x as usize).collect(),
        _ => Vec::new(),
    }
}

fn slice(buf: &[u8], offset: usize, len: usize) -> Option<Vec<u8>> {
    buf.get(offset..offset.checked_add(len)?).map(<[u8]>::to_vec)
}

/// Pull the thumbnail payload out of the block buffer. Offsets point
/// into the old layout, so a payload that can't be resolved is dropped.
fn take_thumbnail(first: &mut IfdMap, buf: &[u8]) -> Option<Thumbnail> {
    let jpeg_offset = first.remove(&TAG_JPEG_THUMBNAIL_OFFSET);
    let jpeg_len = first.remove(&TAG_JPEG_THUMBNAIL_LENGTH);
    let strip_offsets = first.remove(&TAG_STRIP_OFFSETS);
    let strip_counts = first.remove(&TAG_STRIP_BYTE_COUNTS);

    if let (Some(offset), Some(len)) = (jpeg_offset, jpeg_len) {
        let (offset, len) = (uints(&offset), uints(&len));
        let jpeg = match (offset.first(), len.first()) {
            (Some(&o), Some(&l)) => slice(buf, o, l),
            _ => None,
        };
        if jpeg.is_none() {
            log::debug!("JPEG thumbnail lies outside the block, dropped");
        }
        return jpeg.map(Thumbnail::Jpeg);
    }

    if let (Some(offsets), Some(counts)) = (strip_offsets, strip_counts) {
        let (offsets, counts) = (uints(&offsets), uints(&counts));
        if offsets.len() != counts.len() {
            log::debug!("Thumbnail strip tables disagree, dropped");
            return None;
        }
        let strips: Option<Vec<Vec<u8>>> =
            offsets.iter().zip(&counts).map(|(&o, &l)| slice(buf, o, l)).collect();
        if strips.is_none() {
            log::debug!("Thumbnail strip lies outside the block, dropped");
        }
        return strips.map(Thumbnail::Strips);
    }
    None
}
