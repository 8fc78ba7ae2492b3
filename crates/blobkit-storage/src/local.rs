use crate::keys::{join_key, normalize_key};
use crate::traits::{BlobReader, BlobWriter, Operation, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

/// Name prefix of the temp files `write_if_missing` stages payloads in.
const STAGING_PREFIX: &str = ".blobkit-staging-";

/// Local filesystem storage implementation
///
/// Keys map 1:1 onto nested files under `base_path/prefix`; intermediate
/// directories are created on write.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    prefix: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`, creating the
    /// directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            prefix: String::new(),
        })
    }

    /// Namespace every key under `prefix` inside the base directory.
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = normalize_key(prefix.as_ref());
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Convert a key to its filesystem path under the base directory.
    ///
    /// Keys are normalized lexically and joined under the prefix, so `..` cannot
    /// leave it. A key that normalizes to nothing would address the prefix
    /// directory itself and is rejected.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if normalize_key(key).is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(join_key(&self.prefix, key)))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(
        &self,
        key: &str,
        path: &Path,
        operation: Operation,
    ) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(operation, key, parent, e))?;
        }
        Ok(())
    }

    fn io_error(operation: Operation, key: &str, path: &Path, e: std::io::Error) -> StorageError {
        // A directory at the key holds other blobs, not this one.
        if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory)
            && matches!(
                operation,
                Operation::Read | Operation::Remove | Operation::StreamRead
            )
        {
            return StorageError::NotFound(key.to_string());
        }
        tracing::error!(
            error = %e,
            operation = %operation,
            path = %path.display(),
            key = %key,
            "Local storage operation failed"
        );
        StorageError::medium(operation, key, e)
    }
}

/// Write the whole payload and flush it to disk.
async fn write_synced(file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.sync_all().await
}

/// Write `data` to a fresh temp file in `dir` and flush it.
///
/// The returned path unlinks the temp file when dropped, including when the
/// calling future is dropped halfway through.
async fn stage_payload(dir: &Path, data: &[u8]) -> std::io::Result<TempPath> {
    let dir = dir.to_path_buf();
    let staged = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(dir)
    })
    .await
    .map_err(std::io::Error::other)??;

    let (file, temp_path) = staged.into_parts();
    let mut file = fs::File::from_std(file);
    write_synced(&mut file, data).await?;

    Ok(temp_path)
}

async fn is_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let data = fs::read(&path)
            .await
            .map_err(|e| Self::io_error(Operation::Read, key, &path, e))?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );

        Ok(data)
    }

    async fn write(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(key, &path, Operation::Write).await?;

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| Self::io_error(Operation::Write, key, &path, e))?;

        write_synced(&mut file, &data)
            .await
            .map_err(|e| Self::io_error(Operation::Write, key, &path, e))?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(())
    }

    async fn write_if_missing(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(key, &path, Operation::WriteIfMissing).await?;

        let dir = path.parent().unwrap_or(&self.base_path);
        let staged = stage_payload(dir, &data)
            .await
            .map_err(|e| Self::io_error(Operation::WriteIfMissing, key, &path, e))?;

        // link(2) never replaces an existing target, so the key only ever
        // appears holding the complete, synced payload.
        match fs::hard_link(&staged, &path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if is_dir(&path).await {
                    return Err(Self::io_error(Operation::WriteIfMissing, key, &path, e));
                }
                tracing::debug!(
                    path = %path.display(),
                    key = %key,
                    "Local storage write_if_missing skipped, blob already exists"
                );
                return Ok(());
            }
            Err(e) => return Err(Self::io_error(Operation::WriteIfMissing, key, &path, e)),
        }
        drop(staged);

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write_if_missing created blob"
        );

        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if let Err(e) = fs::remove_file(&path).await {
            // Some platforms report EPERM rather than EISDIR for a directory.
            if is_dir(&path).await {
                return Err(StorageError::NotFound(key.to_string()));
            }
            return Err(Self::io_error(Operation::Remove, key, &path, e));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage remove successful"
        );

        Ok(())
    }

    async fn remove_folder(&self, folder: &str) -> StorageResult<()> {
        let path = self.key_to_path(folder)?;
        let start = std::time::Instant::now();

        match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                // A blob named exactly like the folder is not under `folder/`.
                tracing::debug!(path = %path.display(), "Folder path is a blob, nothing to remove");
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Folder does not exist, nothing to remove");
                return Ok(());
            }
            Err(e) => return Err(Self::io_error(Operation::RemoveFolder, folder, &path, e)),
        }

        match fs::remove_dir_all(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Self::io_error(Operation::RemoveFolder, folder, &path, e)),
        }

        tracing::info!(
            path = %path.display(),
            folder = %folder,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage folder removal successful"
        );

        Ok(())
    }

    async fn stream_read(&self, key: &str) -> StorageResult<BlobReader> {
        let path = self.key_to_path(key)?;

        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::io_error(Operation::StreamRead, key, &path, e))?;

        // Opening a directory succeeds on Unix; reading it would not.
        let meta = file
            .metadata()
            .await
            .map_err(|e| Self::io_error(Operation::StreamRead, key, &path, e))?;
        if meta.is_dir() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        tracing::debug!(path = %path.display(), key = %key, "Local storage stream_read opened");

        Ok(Box::new(file))
    }

    async fn stream_write(&self, key: &str) -> StorageResult<BlobWriter> {
        let path = self.key_to_path(key)?;

        self.ensure_parent_dir(key, &path, Operation::StreamWrite).await?;

        let file = fs::File::create(&path)
            .await
            .map_err(|e| Self::io_error(Operation::StreamWrite, key, &path, e))?;

        tracing::debug!(path = %path.display(), key = %key, "Local storage stream_write opened");

        Ok(Box::new(file))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
