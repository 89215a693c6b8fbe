//! EXIF metadata codec and mutator.
//!
//! - [`ExifBlock`]: per-IFD id→value maps over a TIFF block, parsed and
//!   encoded by kamadak-exif
//! - [`TagRegistry`]: tag names ⇄ `(group, id, type)`
//! - [`read_exif`]: name-keyed [`ExifView`] of a file, never fails
//! - [`modify_exif`], [`delete_tags`], [`keep_only_tags`]: write a new
//!   artifact with an edited block and the original pixel stream
//! - [`gps`]: DMS ⇄ decimal degree conversion

pub mod block;
pub mod container;
pub mod gps;
mod reader;
pub mod tag;
mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use block::{ExifBlock, Ifd, Thumbnail};
pub use exif::{Rational, SRational, Value};
pub use reader::{ExifView, ViewValue, load_block, read_exif};
pub use tag::{TagDescriptor, TagGroup, TagRegistry, ValueType};
pub use writer::{
    ChangeKey, ChangeSet, ChangeValue, Outcome, TagSelection, delete_tags, keep_only_tags,
    modify_exif,
};
