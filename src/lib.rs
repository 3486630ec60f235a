//! # photomark
//!
//! Read and write keyword tags and star ratings embedded in image files, without
//! ever leaving a file half-written.
//!
//! ## Quick Start
//!
//! Everything goes through [`pipeline::MetadataService`]:
//!
//! ```rust,no_run
//! use photomark::config::Config;
//! use photomark::pipeline::{collect_images, MetadataService};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("photomark.json".as_ref()))?;
//!     let service = MetadataService::new(config);
//!
//!     // Collect supported image files from paths (files or directories)
//!     let images = collect_images(&[PathBuf::from("./photos")]);
//!
//!     for path in &images {
//!         let record = service.read_metadata(path).await;
//!         println!("{}: {:?} ({} stars)", path.display(), record.tags, record.rating);
//!     }
//!
//!     let result = service.batch_write_tags(&images, &["holiday".to_string()]).await;
//!     if let Some(summary) = result.failure_summary("tag") {
//!         eprintln!("{summary}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The codec can be driven directly on in-memory bytes:
//!
//! ```rust,no_run
//! use photomark::exif::{decode, encode, merge};
//! use photomark::record::{MetadataPatch, MetadataRecord};
//!
//! # fn main() -> photomark::error::Result<()> {
//! let original = std::fs::read("photo.jpg")?;
//!
//! let mut container = decode(&original)?;
//! println!("{:?}", MetadataRecord::from_container(&container));
//!
//! merge(&mut container, &MetadataPatch::rating(5));
//! let updated = encode(&container, &original)?;
//! std::fs::write("photo.jpg", updated)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Read | Write |
//! |--------|------|-------|
//! | JPEG (`.jpg`, `.jpeg`, `.jpe`) | EXIF + XMP + IPTC | EXIF + XMP + IPTC |
//! | PNG (`.png`) | EXIF (`eXIf`) + XMP (`iTXt`) | no |
//! | TIFF (`.tif`, `.tiff`) | EXIF + XMP + IPTC | no |
//!
//! ## Modules
//!
//! - [`config`]: configuration types and loading/saving
//! - [`error`]: the [`MetadataError`](error::MetadataError) taxonomy
//! - [`exif`]: container codec (EXIF/TIFF, XMP, IPTC)
//! - [`resolver`]: picks tags, rating, date and camera info out of a decoded container
//! - [`record`]: the canonical record and the write patch
//! - [`persist`]: backup-then-commit single-file writes
//! - [`batch`]: chunked batch dispatch and per-file result partitioning
//! - [`pipeline`]: format detection, image collection, and the service facade

pub mod batch;
pub mod config;
pub mod error;
pub mod exif;
pub mod persist;
pub mod pipeline;
pub mod record;
pub mod resolver;

#[cfg(test)]
mod test_support;
