//! # exif-studio
//!
//! Inspect, edit, filter, strip and watermark the EXIF metadata embedded in
//! JPEG, PNG and WebP images. Every transformation writes a new file next to
//! the source (or into a configured output directory); sources are never
//! modified unless they are themselves the output of the same transformation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exif_studio::config::Config;
//! use exif_studio::exif::{ChangeSet, TagRegistry, keep_only_tags, modify_exif, read_exif};
//! use exif_studio::templates;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let registry = TagRegistry::standard();
//!     let path = Path::new("photo.jpg");
//!
//!     // 1. Read existing metadata (never fails; empty when absent)
//!     let view = read_exif(path, registry);
//!     println!("Camera: {:?}", view.get("Model"));
//!     if let Some((lat, lon)) = view.lat_lon() {
//!         println!("Taken at {lat:.5}, {lon:.5}");
//!     }
//!
//!     // 2. Edit tags, including the GPS convenience keys
//!     let changes = ChangeSet::from_pairs(
//!         registry,
//!         [("Artist", "Ada"), ("gps_lat", "-33.86"), ("gps_lon", "151.21")],
//!     );
//!     let edited = modify_exif(path, &changes, &config.output)?;
//!
//!     // 3. Reduce to a publishing template
//!     let keep = templates::get_template("flickr").expect("built-in template");
//!     let filtered = keep_only_tags(edited.path(), &keep, registry, &config.output)?;
//!     println!("Wrote {}", filtered.path().display());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Transformations
//!
//! | Operation | Output name | Pixels |
//! |-----------|-------------|--------|
//! | [`exif::modify_exif`], [`exif::delete_tags`] | `formatted_<name>` | carried over unchanged |
//! | [`exif::keep_only_tags`] | `optimized_<name>` | carried over unchanged |
//! | [`purify::strip_exif`] | `purified_<name>` | re-encoded, no metadata |
//! | [`watermark::apply_watermark`] | `watermarked_<name>` | re-encoded, metadata kept |
//!
//! ## Concurrency
//!
//! Every operation is synchronous and keeps no state between calls, so
//! different files can be processed from several threads at once. Writes
//! go to a temp file that is renamed over the destination: a reader never
//! sees a torn file, but two calls writing the same destination (the same
//! source twice, or two sources mapped to one name through an output
//! directory) are last-writer-wins. No locking is done.
//!
//! ## Modules
//!
//! - [`config`]: Configuration types and loading/saving
//! - [`exif`]: Metadata block view (on top of kamadak-exif), tag registry, reader and mutator
//! - [`pipeline`]: Destination naming, format detection and image collection
//! - [`purify`]: Metadata stripping
//! - [`templates`]: Named tag allow-lists
//! - [`watermark`]: Text watermarking

pub mod config;
pub mod exif;
pub mod pipeline;
pub mod purify;
pub mod templates;
pub mod watermark;
