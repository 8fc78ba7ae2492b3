use crate::deletion::DeletionEngine;
use crate::keys::{join_key, normalize_key};
use crate::traits::{BlobReader, BlobWriter, Operation, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::buffered::BufWriter;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload};
use std::sync::Arc;
use tokio_util::io::StreamReader;

/// Object store storage implementation
///
/// Keys map onto object names `{prefix}/{key}` inside one bucket. Works with any
/// `object_store` backend; S3, GCS and in-memory constructors are provided.
#[derive(Clone)]
pub struct RemoteStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    backend: StorageBackend,
    deleter: DeletionEngine,
}

impl std::fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStorage")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("delete_concurrency", &self.deleter.concurrency())
            .finish()
    }
}

impl RemoteStorage {
    /// Wrap an already built object store.
    ///
    /// `bucket` is only used for log events; the store itself is already bound
    /// to its bucket.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        backend: StorageBackend,
        bucket: impl Into<String>,
        prefix: impl AsRef<str>,
    ) -> Self {
        RemoteStorage {
            store,
            bucket: bucket.into(),
            prefix: normalize_key(prefix.as_ref()),
            backend,
            deleter: DeletionEngine::default(),
        }
    }

    /// Process-local object store, handy for tests and development.
    pub fn in_memory(prefix: impl AsRef<str>) -> Self {
        Self::new(
            Arc::new(InMemory::new()),
            StorageBackend::Memory,
            "memory",
            prefix,
        )
    }

    /// Create a storage for an S3 (or S3-compatible) bucket
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `prefix` - Key namespace inside the bucket
    #[cfg(feature = "storage-s3")]
    pub async fn s3(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        prefix: impl AsRef<str>,
    ) -> StorageResult<Self> {
        use object_store::aws::{AmazonS3Builder, S3ConditionalPut};

        // Credentials come from the environment.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone())
            .with_conditional_put(S3ConditionalPut::ETagMatch);

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::new(Arc::new(store), StorageBackend::S3, bucket, prefix))
    }

    /// Create a storage for a Google Cloud Storage bucket, with credentials
    /// resolved from the environment.
    #[cfg(feature = "storage-gcs")]
    pub async fn gcs(bucket: String, prefix: impl AsRef<str>) -> StorageResult<Self> {
        use object_store::gcp::GoogleCloudStorageBuilder;

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket.clone())
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::new(Arc::new(store), StorageBackend::Gcs, bucket, prefix))
    }

    /// Set how many deletes folder removal keeps in flight.
    pub fn with_delete_concurrency(mut self, concurrency: usize) -> Self {
        self.deleter = DeletionEngine::new(concurrency);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolve a caller key to its object location under the prefix.
    fn location(&self, key: &str) -> StorageResult<Path> {
        if normalize_key(key).is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(Path::from(join_key(&self.prefix, key)))
    }

    /// Map a store error for the caller's `key`; `location` is only logged.
    fn store_error(
        &self,
        operation: Operation,
        key: &str,
        location: &Path,
        start: std::time::Instant,
        e: ObjectStoreError,
    ) -> StorageError {
        if let ObjectStoreError::NotFound { .. } = e {
            if matches!(
                operation,
                Operation::Read | Operation::Remove | Operation::StreamRead
            ) {
                return StorageError::NotFound(key.to_string());
            }
        }
        tracing::error!(
            error = %e,
            operation = %operation,
            bucket = %self.bucket,
            key = %key,
            location = %location,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store operation failed"
        );
        StorageError::medium(operation, key, e)
    }
}

#[async_trait]
impl Storage for RemoteStorage {
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let location = self.location(key)?;
        let start = std::time::Instant::now();

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.store_error(Operation::Read, key, &location, start, e))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| self.store_error(Operation::Read, key, &location, start, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store read successful"
        );

        Ok(bytes.to_vec())
    }

    async fn write(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let location = self.location(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| self.store_error(Operation::Write, key, &location, start, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store write successful"
        );

        Ok(())
    }

    async fn write_if_missing(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        let location = self.location(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        // The store enforces "create only" server-side (If-None-Match / generation 0).
        let result = self
            .store
            .put_opts(
                &location,
                PutPayload::from(Bytes::from(data)),
                PutOptions::from(PutMode::Create),
            )
            .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %location,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store write_if_missing created blob"
                );
                Ok(())
            }
            Err(ObjectStoreError::AlreadyExists { .. })
            | Err(ObjectStoreError::Precondition { .. }) => {
                tracing::debug!(
                    bucket = %self.bucket,
                    key = %location,
                    "Object store write_if_missing skipped, blob already exists"
                );
                Ok(())
            }
            Err(e) => Err(self.store_error(Operation::WriteIfMissing, key, &location, start, e)),
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let location = self.location(key)?;
        let start = std::time::Instant::now();

        // Object stores delete absent objects silently; HEAD first to report NotFound.
        self.store
            .head(&location)
            .await
            .map_err(|e| self.store_error(Operation::Remove, key, &location, start, e))?;

        self.store
            .delete(&location)
            .await
            .map_err(|e| self.store_error(Operation::Remove, key, &location, start, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %location,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store remove successful"
        );

        Ok(())
    }

    async fn remove_folder(&self, folder: &str) -> StorageResult<()> {
        let folder_location = self.location(folder)?;
        let start = std::time::Instant::now();

        // Listing is by path segment, so `a/b` matches `a/b/x` but not `a/bc`.
        let mut listing = self.store.list(Some(&folder_location));
        let mut locations = Vec::new();
        while let Some(item) = listing.next().await {
            let meta = item.map_err(|e| {
                self.store_error(Operation::RemoveFolder, folder, &folder_location, start, e)
            })?;
            if meta.location != folder_location {
                locations.push(meta.location);
            }
        }

        if locations.is_empty() {
            tracing::debug!(
                bucket = %self.bucket,
                folder = %folder_location,
                "No objects under folder, nothing to remove"
            );
            return Ok(());
        }

        let deleted = self
            .deleter
            .delete_all(
                folder_location.as_ref(),
                locations,
                |location: Path| {
                    let store = self.store.clone();
                    async move { store.delete(&location).await }
                },
            )
            .await?;

        tracing::info!(
            bucket = %self.bucket,
            folder = %folder_location,
            deleted,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store folder removal successful"
        );

        Ok(())
    }

    async fn stream_read(&self, key: &str) -> StorageResult<BlobReader> {
        let location = self.location(key)?;
        let start = std::time::Instant::now();

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.store_error(Operation::StreamRead, key, &location, start, e))?;

        let bucket = self.bucket.clone();
        let key = location.to_string();
        let stream = result.into_stream().map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "Object store stream read error"
                );
                std::io::Error::other(e)
            })
        });

        Ok(Box::new(StreamReader::new(stream)))
    }

    async fn stream_write(&self, key: &str) -> StorageResult<BlobWriter> {
        let location = self.location(key)?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %location,
            "Object store stream_write opened"
        );

        // Small payloads become one PUT on shutdown, larger ones a multipart upload.
        Ok(Box::new(BufWriter::new(self.store.clone(), location)))
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
