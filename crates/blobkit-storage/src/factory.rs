#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{CancellableStorage, RemoteStorage};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use blobkit_core::StorageConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Create a storage backend based on configuration
///
/// When an operation timeout is configured the backend is wrapped in a
/// [`CancellableStorage`] carrying that deadline.
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    config
        .validate()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    let storage = create_backend(config).await?;

    tracing::info!(
        backend = %config.storage_backend(),
        prefix = %config.prefix(),
        delete_concurrency = config.delete_concurrency(),
        "Storage backend initialized"
    );

    match config.operation_timeout() {
        Some(deadline) => Ok(Arc::new(
            CancellableStorage::new(storage, CancellationToken::new()).with_deadline(deadline),
        )),
        None => Ok(storage),
    }
}

async fn create_backend(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path)
                .await?
                .with_prefix(config.prefix());
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("STORAGE_BUCKET not configured".to_string()))?;
            let region = config.region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let storage = RemoteStorage::s3(bucket, region, endpoint, config.prefix())
                .await?
                .with_delete_concurrency(config.delete_concurrency());
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-gcs")]
        StorageBackend::Gcs => {
            let bucket = config
                .bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("STORAGE_BUCKET not configured".to_string()))?;

            let storage = RemoteStorage::gcs(bucket, config.prefix())
                .await?
                .with_delete_concurrency(config.delete_concurrency());
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-gcs"))]
        StorageBackend::Gcs => Err(StorageError::ConfigError(
            "GCS storage backend not available (storage-gcs feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => Ok(Arc::new(
            RemoteStorage::in_memory(config.prefix())
                .with_delete_concurrency(config.delete_concurrency()),
        )),
    }
}
