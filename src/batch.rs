//! Apply one single-file operation across many files, a chunk at a time.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::path::PathBuf;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::{MetadataError, Result};

/// A file the operation did not complete for.
#[derive(Debug)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: MetadataError,
}

/// Per-file outcome of a batch operation.
///
/// Every distinct input path lands in exactly one of `successful` or
/// `failed`, so `successful.len() + failed.len() == total_processed`. Repeated
/// input paths are counted once.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub successful: BTreeSet<PathBuf>,
    pub failed: Vec<FailedFile>,
    pub total_processed: usize,
}

impl BatchResult {
    /// `Failed to <verb> N out of M files`, or `None` when nothing failed.
    pub fn failure_summary(&self, verb: &str) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        Some(format!(
            "Failed to {verb} {} out of {} files",
            self.failed.len(),
            self.total_processed
        ))
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `op` over `paths` in chunks of `chunk_size`.
///
/// Operations within a chunk run concurrently; chunk *i* starts only once
/// every operation of chunk *i-1* has settled. Duplicate paths are processed
/// once. When `cancel` fires, no further chunk is dispatched and the
/// remaining files are reported as [`MetadataError::Cancelled`].
pub async fn run_batch<F, Fut>(
    paths: &[PathBuf],
    chunk_size: usize,
    cancel: Option<&CancellationToken>,
    op: F,
) -> BatchResult
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut seen = HashSet::new();
    let unique: Vec<PathBuf> = paths.iter().filter(|p| seen.insert(*p)).cloned().collect();
    if unique.len() < paths.len() {
        log::debug!("Dropped {} duplicate paths from batch", paths.len() - unique.len());
    }

    let mut result = BatchResult::default();
    let mut chunks = unique.chunks(chunk_size.max(1));

    while let Some(chunk) = chunks.next() {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            let mut skipped = 0;
            for path in chunk.iter().chain(chunks.by_ref().flatten()) {
                result
                    .failed
                    .push(FailedFile { path: path.clone(), error: MetadataError::Cancelled });
                skipped += 1;
            }
            log::info!("Batch cancelled, {skipped} files not processed");
            break;
        }

        let outcomes = join_all(chunk.iter().map(|path| {
            let pending = op(path.clone());
            async move { (path, pending.await) }
        }))
        .await;

        for (path, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    result.successful.insert(path.clone());
                }
                Err(error) => {
                    log::warn!("{}: {error}", path.display());
                    result.failed.push(FailedFile { path: path.clone(), error });
                }
            }
        }
    }

    result.total_processed = result.successful.len() + result.failed.len();
    result
}
