//! Transactional metadata writes: guard, snapshot, decode-merge-encode,
//! commit, then best-effort backup retirement.
//!
//! Writes to the same path must be serialized by the caller; there is no
//! per-file lock here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use crate::config::BackupConfig;
use crate::error::{MetadataError, Result};
use crate::exif;
use crate::pipeline::ImageKind;
use crate::record::MetadataPatch;

const TEMP_SUFFIX: &str = ".photomark-tmp";
const SIGNATURE_LEN: u64 = 8;

/// Backup paths with a scheduled deletion, and the generation that scheduled it.
/// A new snapshot of the same path drops the entry, which cancels the deletion.
static PENDING_RETIREMENTS: LazyLock<Mutex<HashMap<PathBuf, u64>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));
static RETIREMENT_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Apply `patch` to the file at `path`.
///
/// A copy of the current bytes is written to the backup path first. If
/// anything after that fails, the backup stays on disk and
/// [`MetadataError::CommitFailed`] names it. After a successful commit the
/// backup is deleted in the background once the configured delay has passed,
/// unless a later write to the same path has taken a new snapshot by then.
pub async fn write_metadata(
    path: &Path,
    patch: &MetadataPatch,
    backup: &BackupConfig,
) -> Result<()> {
    guard(path).await?;

    let backup_path = backup.backup_path(path);
    snapshot(path, &backup_path).await?;

    if let Err(e) = commit(path, patch).await {
        log::error!(
            "Write to {} failed, backup kept at {}: {e}",
            path.display(),
            backup_path.display()
        );
        return Err(MetadataError::CommitFailed {
            path: path.to_path_buf(),
            backup: backup_path,
            reason: e.to_string(),
        });
    }
    log::info!("Metadata written: {}", path.display());

    if backup.keep {
        log::debug!("Keeping backup {}", backup_path.display());
    } else {
        retire_backup(backup_path, backup.retire_delay()).await;
    }
    Ok(())
}

/// Replace the keyword fields, leaving the rating as found.
pub async fn write_tags(path: &Path, tags: &[String], backup: &BackupConfig) -> Result<()> {
    write_metadata(path, &MetadataPatch::tags(tags.to_vec()), backup).await
}

/// Replace the rating fields, leaving the tags as found.
pub async fn write_rating(path: &Path, rating: i32, backup: &BackupConfig) -> Result<()> {
    write_metadata(path, &MetadataPatch::rating(rating), backup).await
}

/// Reject files the codec cannot re-encode before anything touches the disk.
///
/// Both the extension and the leading bytes must name a writable format. A
/// file that cannot be opened is left for the snapshot step to report.
async fn guard(path: &Path) -> Result<()> {
    match ImageKind::from_path(path) {
        Some(kind) if kind.is_writable() => {}
        Some(kind) => return Err(MetadataError::UnsupportedWriteFormat(kind.name().to_string())),
        None => {
            return Err(MetadataError::UnsupportedWriteFormat(format!(
                "unknown file type: {}",
                path.display()
            )));
        }
    }

    let head = match read_signature(path).await {
        Ok(head) => head,
        Err(e) => {
            log::debug!("Could not read signature of {}: {e}", path.display());
            return Ok(());
        }
    };
    match ImageKind::from_signature(&head) {
        Some(kind) if kind.is_writable() => Ok(()),
        Some(kind) => Err(MetadataError::UnsupportedWriteFormat(format!(
            "{} content in {}",
            kind.name(),
            path.display()
        ))),
        None => Err(MetadataError::UnsupportedWriteFormat(format!(
            "unrecognized file signature: {}",
            path.display()
        ))),
    }
}

async fn read_signature(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(SIGNATURE_LEN as usize);
    file.take(SIGNATURE_LEN).read_to_end(&mut head).await?;
    Ok(head)
}

async fn snapshot(path: &Path, backup_path: &Path) -> Result<()> {
    if PENDING_RETIREMENTS.lock().await.remove(backup_path).is_some() {
        log::debug!("Cancelled pending removal of {}", backup_path.display());
    }

    match tokio::fs::copy(path, backup_path).await {
        Ok(_) => {
            log::debug!("Backup created: {}", backup_path.display());
            Ok(())
        }
        Err(source) => Err(MetadataError::BackupFailed {
            path: backup_path.to_path_buf(),
            source,
        }),
    }
}

/// Re-read the current bytes, patch them off the async threads, and swap the
/// result in through a sibling temp file.
async fn commit(path: &Path, patch: &MetadataPatch) -> Result<()> {
    let original = tokio::fs::read(path).await?;
    let patch = patch.clone();

    let encoded = tokio::task::spawn_blocking(move || {
        let mut container = exif::decode(&original)?;
        exif::merge(&mut container, &patch);
        exif::encode(&container, &original)
    })
    .await
    .map_err(|e| MetadataError::Io(std::io::Error::other(e)))??;

    let temp = temp_path(path);
    let replaced = match tokio::fs::write(&temp, &encoded).await {
        Ok(()) => tokio::fs::rename(&temp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = replaced {
        if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
            log::debug!("Could not remove {}: {cleanup}", temp.display());
        }
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Delete the backup after `delay`, unless a newer snapshot has replaced it
/// in the meantime. Failures are logged, never returned.
async fn retire_backup(backup_path: PathBuf, delay: Duration) {
    let generation = RETIREMENT_GENERATION.fetch_add(1, Ordering::Relaxed);
    PENDING_RETIREMENTS.lock().await.insert(backup_path.clone(), generation);

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let mut pending = PENDING_RETIREMENTS.lock().await;
        if pending.get(&backup_path) != Some(&generation) {
            log::debug!("Backup {} superseded, not removing", backup_path.display());
            return;
        }
        pending.remove(&backup_path);
        match tokio::fs::remove_file(&backup_path).await {
            Ok(()) => log::debug!("Backup removed: {}", backup_path.display()),
            Err(e) => log::warn!("Failed to remove backup {}: {e}", backup_path.display()),
        }
    });
}
