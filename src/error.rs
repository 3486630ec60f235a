use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the metadata engine.
///
/// Reads never surface these to callers (see [`crate::pipeline::MetadataService::read_metadata`]);
/// single-file writes return them directly and batch writes fold them into
/// [`crate::batch::BatchResult::failed`].
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The file type carries no container this engine understands.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file type can be read but not re-encoded.
    #[error("Unsupported write format: {0}")]
    UnsupportedWriteFormat(String),

    /// The pre-write snapshot could not be created; the original is untouched.
    #[error("Failed to create backup {}: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding or the final overwrite failed after a backup was taken.
    #[error(
        "Failed to commit metadata to {} (backup kept at {}): {reason}",
        path.display(),
        backup.display()
    )]
    CommitFailed {
        path: PathBuf,
        backup: PathBuf,
        reason: String,
    },

    /// The container bytes could not be parsed or rebuilt.
    #[error("Malformed metadata container: {0}")]
    Malformed(String),

    /// A write was requested with neither tags nor rating.
    #[error("Metadata patch has no fields to write")]
    EmptyPatch,

    /// The batch was cancelled before this file was dispatched.
    #[error("Cancelled before the file was processed")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
