use anyhow::{Context, Result};
use exif::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::block::{self, ExifBlock, Ifd};
use super::container;
use super::gps;
use super::tag::{
    TAG_GPS_LATITUDE, TAG_GPS_LATITUDE_REF, TAG_GPS_LONGITUDE, TAG_GPS_LONGITUDE_REF,
    TAG_USER_COMMENT, TagDescriptor, TagGroup, TagRegistry, ValueType,
};
use crate::config::OutputConfig;
use crate::pipeline::{Transformation, destination_for};

/// Character-code header of an ASCII `UserComment`.
const USER_COMMENT_ASCII: &[u8; 8] = b"ASCII\0\0\0";

/// Result of a mutator call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new artifact was written at this path.
    Written(PathBuf),
    /// Nothing to do; the source path is returned and no file was written.
    Unchanged(PathBuf),
}

impl Outcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Written(p) | Self::Unchanged(p) => p,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Target of one change: a registry tag or one of the GPS convenience keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKey {
    Tag(&'static TagDescriptor),
    /// `gps_lat`: signed decimal degrees, written as DMS plus `N`/`S`.
    /// Must lie within ±90.
    GpsLatitude,
    /// `gps_lon`: signed decimal degrees, written as DMS plus `E`/`W`.
    /// Must lie within ±180.
    GpsLongitude,
}

impl ChangeKey {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tag(desc) => desc.name,
            Self::GpsLatitude => "gps_lat",
            Self::GpsLongitude => "gps_lon",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeValue {
    Text(String),
    Number(f64),
}

impl ChangeValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            Self::Number(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Validated set of edits for [`modify_exif`], applied in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<(ChangeKey, ChangeValue)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: ChangeKey, value: ChangeValue) {
        self.changes.push((key, value));
    }

    /// Build a change set from free-form `(name, value)` text pairs.
    ///
    /// Empty values are no-ops. Names the registry does not know (other
    /// than `gps_lat` / `gps_lon`) are dropped.
    pub fn from_pairs<I, K, V>(registry: &TagRegistry, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.is_empty() {
                continue;
            }
            let key = match key {
                "gps_lat" => ChangeKey::GpsLatitude,
                "gps_lon" => ChangeKey::GpsLongitude,
                name => match registry.resolve(name) {
                    Some(desc) => ChangeKey::Tag(desc),
                    None => {
                        log::debug!("Ignoring unknown tag {name:?}");
                        continue;
                    }
                },
            };
            set.push(key, ChangeValue::Text(value.to_string()));
        }
        set
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ChangeKey, ChangeValue)> {
        self.changes.iter()
    }
}

/// A set of tag names, for deletion and keep-only filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSelection(BTreeSet<String>);

impl TagSelection {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TagSelection {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Read a source file and decode its block. `None` when the container
/// carries no block; a corrupt block is an error.
fn load(path: &Path) -> Result<(Vec<u8>, Option<ExifBlock>)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let block = match container::read_block(&bytes)? {
        Some(raw) => Some(ExifBlock::parse(&raw).context("Failed to parse metadata block")?),
        None => None,
    };
    Ok((bytes, block))
}

/// Splice `block` into the container and write it to `dest`.
/// The compressed pixel data is carried over untouched. An empty block
/// removes the container's metadata.
fn save(bytes: Vec<u8>, block: &ExifBlock, dest: &Path) -> Result<()> {
    let serialized = match block.is_empty() {
        true => None,
        false => Some(block.serialize()?),
    };
    let output = container::replace_block(bytes, serialized.as_deref())?;
    container::write_atomic(dest, &output)?;
    log::info!("Wrote {}", dest.display());
    Ok(())
}

/// Apply `changes` and write the result to a `formatted_` destination.
///
/// Per-key problems (unparsable numbers, unsupported value types, bad
/// coordinates) are logged and skipped; only file-level errors fail.
///
/// Unlike a bare float parse, `gps_lat` / `gps_lon` are also range
/// checked: a latitude beyond ±90 or a longitude beyond ±180 is skipped
/// as a bad coordinate instead of being written as an unsigned DMS
/// triple no reader can place.
pub fn modify_exif(path: &Path, changes: &ChangeSet, output: &OutputConfig) -> Result<Outcome> {
    let dest = destination_for(path, Transformation::Format, output.output_dir.as_deref())?;
    let (bytes, block) = load(path)?;
    let mut block = block.unwrap_or_default();

    let mut applied = 0usize;
    for (key, value) in changes.iter() {
        let ok = match key {
            ChangeKey::GpsLatitude => set_coordinate(&mut block, value, Axis::Latitude),
            ChangeKey::GpsLongitude => set_coordinate(&mut block, value, Axis::Longitude),
            ChangeKey::Tag(desc) => set_tag(&mut block, desc, value),
        };
        if ok {
            applied += 1;
        } else {
            log::debug!("Change to {} not applied", key.name());
        }
    }
    log::debug!("Applied {applied} of {} change(s) to {}", changes.len(), path.display());

    save(bytes, &block, &dest)?;
    Ok(Outcome::Written(dest))
}

/// Remove the named tags and write the result to a `formatted_`
/// destination. A file without a metadata block is left alone.
pub fn delete_tags(
    path: &Path,
    names: &TagSelection,
    registry: &TagRegistry,
    output: &OutputConfig,
) -> Result<Outcome> {
    let (bytes, block) = load(path)?;
    let Some(mut block) = block else {
        log::debug!("No EXIF data in {}, nothing to delete", path.display());
        return Ok(Outcome::Unchanged(path.to_path_buf()));
    };
    let dest = destination_for(path, Transformation::Format, output.output_dir.as_deref())?;

    for name in names.iter() {
        match registry.resolve(name) {
            Some(desc) => {
                if block.ifd_mut(Ifd::for_group(desc.group)).remove(&desc.id).is_some() {
                    log::debug!("Deleted {name}");
                }
            }
            None => log::debug!("Ignoring unknown tag {name:?}"),
        }
    }

    save(bytes, &block, &dest)?;
    Ok(Outcome::Written(dest))
}

/// Keep only the selected tags (across the 0th, Exif, GPS and Interop
/// IFDs), drop the thumbnail, and write to an `optimized_` destination.
///
/// A file without a block is returned unchanged; a block that fails to
/// decode is an error.
pub fn keep_only_tags(
    path: &Path,
    keep: &TagSelection,
    registry: &TagRegistry,
    output: &OutputConfig,
) -> Result<Outcome> {
    let (bytes, block) = load(path)?;
    let Some(mut block) = block else {
        log::debug!("No EXIF data in {}, nothing to filter", path.display());
        return Ok(Outcome::Unchanged(path.to_path_buf()));
    };
    let dest = destination_for(path, Transformation::Optimize, output.output_dir.as_deref())?;

    for ifd in [Ifd::Primary, Ifd::Exif, Ifd::Gps, Ifd::Interop] {
        let group = ifd.tag_group();
        block.ifd_mut(ifd).retain(|&id, _| {
            registry
                .lookup_name(group, id)
                .is_some_and(|name| keep.contains(name))
        });
    }
    block.clear_thumbnail();

    save(bytes, &block, &dest)?;
    Ok(Outcome::Written(dest))
}

fn set_tag(block: &mut ExifBlock, desc: &TagDescriptor, value: &ChangeValue) -> bool {
    let encoded = if desc.group == TagGroup::Exif && desc.id == TAG_USER_COMMENT {
        let mut raw = USER_COMMENT_ASCII.to_vec();
        raw.extend(value.to_text().chars().filter(char::is_ascii).map(|c| c as u8));
        Value::Undefined(raw, 0)
    } else {
        match desc.value_type {
            ValueType::Ascii => block::ascii(&value.to_text()),
            ValueType::Undefined => Value::Undefined(value.to_text().into_bytes(), 0),
            ValueType::Short => match value.as_integer().and_then(|n| u16::try_from(n).ok()) {
                Some(n) => Value::Short(vec![n]),
                None => {
                    log::warn!("Skipping {}: {value:?} is not a valid SHORT", desc.name);
                    return false;
                }
            },
            ValueType::Long => match value.as_integer().and_then(|n| u32::try_from(n).ok()) {
                Some(n) => Value::Long(vec![n]),
                None => {
                    log::warn!("Skipping {}: {value:?} is not a valid LONG", desc.name);
                    return false;
                }
            },
            other => {
                log::warn!("Skipping {}: writing {other:?} values is not supported", desc.name);
                return false;
            }
        }
    };
    block.ifd_mut(Ifd::for_group(desc.group)).insert(desc.id, encoded);
    true
}

#[derive(Clone, Copy)]
enum Axis {
    Latitude,
    Longitude,
}

fn set_coordinate(block: &mut ExifBlock, value: &ChangeValue, axis: Axis) -> bool {
    let (limit, ref_tag, tag, label) = match axis {
        Axis::Latitude => (90.0, TAG_GPS_LATITUDE_REF, TAG_GPS_LATITUDE, "latitude"),
        Axis::Longitude => (180.0, TAG_GPS_LONGITUDE_REF, TAG_GPS_LONGITUDE, "longitude"),
    };
    let deg = match value.as_f64() {
        Some(d) if d.is_finite() && d.abs() <= limit => d,
        _ => {
            log::warn!("Skipping GPS {label}: {value:?} is not a valid coordinate");
            return false;
        }
    };
    let reference = match axis {
        Axis::Latitude => gps::latitude_ref(deg),
        Axis::Longitude => gps::longitude_ref(deg),
    };
    block.gps.insert(tag, Value::Rational(gps::to_dms(deg)));
    block.gps.insert(ref_tag, block::ascii(reference));
    true
}
