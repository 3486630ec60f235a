use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::batch::{self, BatchResult};
use crate::config::Config;
use crate::error::{MetadataError, Result};
use crate::exif;
use crate::persist;
use crate::record::{MetadataPatch, MetadataRecord};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// The container family of an image file.
///
/// Use [`ImageKind::from_path`] to detect the format from a file extension and
/// [`ImageKind::from_signature`] to detect it from the leading bytes.
///
/// # Example
///
/// ```rust
/// use photomark::pipeline::ImageKind;
/// use std::path::Path;
///
/// let kind = ImageKind::from_path(Path::new("photo.JPG"));
/// assert_eq!(kind, Some(ImageKind::Jpeg));
/// assert!(kind.unwrap().is_writable());
///
/// let kind = ImageKind::from_path(Path::new("scan.tif"));
/// assert_eq!(kind, Some(ImageKind::Tiff));
/// assert!(!kind.unwrap().is_writable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// JPEG: EXIF+XMP+IPTC, read and write
    Jpeg,
    /// PNG: eXIf and iTXt XMP, read only
    Png,
    /// TIFF: IFD chain, read only
    Tiff,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Determine the image kind from the file's magic bytes.
    pub fn from_signature(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(PNG_SIGNATURE) {
            Some(Self::Png)
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Some(Self::Tiff)
        } else {
            None
        }
    }

    /// Whether the codec can re-encode this format.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Tiff => "TIFF",
        }
    }
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Only files with supported image extensions
/// are included (see [`ImageKind`] for the full list).
///
/// # Example
///
/// ```rust,no_run
/// use photomark::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./photos/"),        // entire directory
/// ]);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_dir() {
            let found = WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        log::debug!("Skipping unreadable entry: {e}");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file() && is_supported_image(entry.path()))
                .map(walkdir::DirEntry::into_path);
            images.extend(found);
        } else if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Whether the extension names one of the [`ImageKind`]s. Backups and temp
/// files left next to an image never match.
pub fn is_supported_image(path: &Path) -> bool {
    ImageKind::from_path(path).is_some()
}

/// The engine's entry point: reads, single-file writes, and batch writes.
///
/// Holds only configuration, so one instance can be shared by any number of
/// concurrent callers.
///
/// # Example
///
/// ```rust,no_run
/// # use photomark::pipeline::MetadataService;
/// # use photomark::config::Config;
/// # use std::path::PathBuf;
/// # async fn example() {
/// let service = MetadataService::new(Config::default());
///
/// let record = service.read_metadata("photo.jpg".as_ref()).await;
/// println!("{} tags, {} stars", record.tags.len(), record.rating);
///
/// let paths = vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")];
/// let result = service.batch_set_rating(&paths, 5).await;
/// if let Some(summary) = result.failure_summary("rate") {
///     eprintln!("{summary}");
/// }
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetadataService {
    config: Config,
}

impl MetadataService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read the canonical record of a file. Never fails: unsupported or
    /// unreadable files yield [`MetadataRecord::empty`].
    pub async fn read_metadata(&self, path: &Path) -> MetadataRecord {
        match self.try_read_metadata(path).await {
            Ok(record) => record,
            Err(e) => {
                log::debug!("{}: {e}, using empty record", path.display());
                MetadataRecord::empty()
            }
        }
    }

    /// Like [`read_metadata`](Self::read_metadata), but reports why a file could not be read.
    pub async fn try_read_metadata(&self, path: &Path) -> Result<MetadataRecord> {
        if ImageKind::from_path(path).is_none() {
            return Err(MetadataError::UnsupportedFormat(format!(
                "unknown file type: {}",
                path.display()
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        let container = tokio::task::spawn_blocking(move || exif::decode(&bytes))
            .await
            .map_err(|e| MetadataError::Io(std::io::Error::other(e)))??;
        Ok(MetadataRecord::from_container(&container))
    }

    pub async fn write_tags(&self, path: &Path, tags: &[String]) -> Result<()> {
        persist::write_tags(path, tags, &self.config.backup).await
    }

    pub async fn write_rating(&self, path: &Path, rating: i32) -> Result<()> {
        persist::write_rating(path, rating, &self.config.backup).await
    }

    /// Apply a partial update. Fields absent from `patch` are left as found on disk.
    pub async fn write_metadata(&self, path: &Path, patch: &MetadataPatch) -> Result<()> {
        if patch.is_empty() {
            return Err(MetadataError::EmptyPatch);
        }
        persist::write_metadata(path, patch, &self.config.backup).await
    }

    /// Set the rating of every file, a chunk at a time.
    ///
    /// Duplicate paths are written once, so `total_processed` (the M in
    /// "Failed to rate N out of M files") counts distinct paths.
    pub async fn batch_set_rating(&self, paths: &[PathBuf], rating: i32) -> BatchResult {
        self.run_batch(paths, &MetadataPatch::rating(rating), None).await
    }

    /// Replace the tags of every file, a chunk at a time.
    ///
    /// As with [`batch_set_rating`](Self::batch_set_rating), `total_processed`
    /// counts distinct paths.
    pub async fn batch_write_tags(&self, paths: &[PathBuf], tags: &[String]) -> BatchResult {
        self.run_batch(paths, &MetadataPatch::tags(tags.to_vec()), None).await
    }

    /// Apply one patch to every file. Only an empty patch fails the call as a
    /// whole; per-file errors are folded into [`BatchResult::failed`].
    pub async fn batch_write_metadata(
        &self,
        paths: &[PathBuf],
        patch: &MetadataPatch,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchResult> {
        if patch.is_empty() {
            return Err(MetadataError::EmptyPatch);
        }
        Ok(self.run_batch(paths, patch, cancel).await)
    }

    async fn run_batch(
        &self,
        paths: &[PathBuf],
        patch: &MetadataPatch,
        cancel: Option<&CancellationToken>,
    ) -> BatchResult {
        let backup = &self.config.backup;
        let chunk_size = self.config.batch.effective_chunk_size();
        log::debug!("Batch of {} files, chunk size {chunk_size}", paths.len());

        batch::run_batch(paths, chunk_size, cancel, |path| async move {
            persist::write_metadata(&path, patch, backup).await
        })
        .await
    }
}
