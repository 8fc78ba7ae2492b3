//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement,
//! together with the error type every operation reports.

use crate::StorageBackend;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed error source carried by medium failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Sequential reader returned by [`Storage::stream_read`]. Dropping it releases
/// the underlying file descriptor or connection.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Sequential writer returned by [`Storage::stream_write`]. Content is only
/// guaranteed visible once `shutdown()` has completed successfully.
pub type BlobWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Storage operation names, used to tag errors and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    WriteIfMissing,
    Remove,
    RemoveFolder,
    StreamRead,
    StreamWrite,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::WriteIfMissing => "write_if_missing",
            Operation::Remove => "remove",
            Operation::RemoveFolder => "remove_folder",
            Operation::StreamRead => "stream_read",
            Operation::StreamWrite => "stream_write",
        };
        f.write_str(name)
    }
}

/// One failed delete inside a folder removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub error: String,
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Storage {operation} failed for {key}: {source}")]
    Medium {
        operation: Operation,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Folder removal under {folder} incomplete: {failed} of {total} deletes failed")]
    FolderRemovalIncomplete {
        folder: String,
        failed: usize,
        total: usize,
        failures: Vec<DeleteFailure>,
    },

    #[error("Storage {operation} cancelled for {key}")]
    Cancelled { operation: Operation, key: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub(crate) fn medium(
        operation: Operation,
        key: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        StorageError::Medium {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StorageError::Cancelled { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Both backends (local filesystem, remote object store) implement this trait so
/// callers can store blobs without knowing which medium holds them. Keys are
/// `/`-separated and are joined under the instance prefix before reaching the
/// medium (see [`crate::keys`]).
///
/// Implementations hold no per-call state and are safe to share between tasks.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the whole blob stored at `key`.
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Create or overwrite the blob at `key`.
    ///
    /// The write is finalized before this returns, so a following `read`
    /// observes `data`.
    async fn write(&self, key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Create the blob at `key` only if nothing is stored there yet.
    ///
    /// An existing blob makes this a successful no-op. Creation is a single
    /// atomic medium operation: when several callers race on an absent key,
    /// exactly one payload is stored and every caller gets `Ok(())`.
    async fn write_if_missing(&self, key: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Delete the blob at `key`. Fails with `NotFound` if there is none.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Delete every blob whose key starts with `folder/`.
    ///
    /// Succeeds when nothing matches. Blobs outside the folder are never touched.
    /// A partial failure is reported as [`StorageError::FolderRemovalIncomplete`];
    /// blobs already deleted stay deleted.
    async fn remove_folder(&self, folder: &str) -> StorageResult<()>;

    /// Open a sequential reader over the blob at `key`.
    async fn stream_read(&self, key: &str) -> StorageResult<BlobReader>;

    /// Open a sequential writer for the blob at `key`.
    ///
    /// The caller must call `shutdown()` on every exit path; until it
    /// completes the blob may be partially written or absent.
    async fn stream_write(&self, key: &str) -> StorageResult<BlobWriter>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
