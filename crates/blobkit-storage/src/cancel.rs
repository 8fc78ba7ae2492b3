//! Cancellation and deadlines for storage operations.
//!
//! [`CancellableStorage`] runs every call of an inner storage under a
//! [`CancellationToken`] and an optional per-operation deadline. When either
//! fires, the in-flight future is dropped (abandoning the native I/O call) and
//! the operation fails with [`StorageError::Cancelled`]. Streaming handles that
//! were already returned are not touched.

use crate::traits::{BlobReader, BlobWriter, Operation, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct CancellableStorage {
    inner: Arc<dyn Storage>,
    token: CancellationToken,
    deadline: Option<Duration>,
}

impl CancellableStorage {
    pub fn new(inner: Arc<dyn Storage>, token: CancellationToken) -> Self {
        CancellableStorage {
            inner,
            token,
            deadline: None,
        }
    }

    /// Fail any single operation that takes longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// A view sharing the inner storage whose token is a child of this one:
    /// cancelling the parent cancels it, cancelling it leaves the parent alone.
    pub fn child(&self) -> Self {
        CancellableStorage {
            inner: self.inner.clone(),
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    async fn guard<T, F>(&self, operation: Operation, key: &str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>> + Send,
        T: Send,
    {
        let cancelled = || {
            tracing::warn!(operation = %operation, key = %key, "Storage operation cancelled");
            StorageError::Cancelled {
                operation,
                key: key.to_string(),
            }
        };

        if self.token.is_cancelled() {
            return Err(cancelled());
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(cancelled()),
                },
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(cancelled()),
            result = bounded => result,
        }
    }
}

#[async_trait]
impl Storage for CancellableStorage {
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.guard(Operation::Read, key, self.inner.read(key)).await
    }

    async fn write(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        self.guard(Operation::Write, key, self.inner.write(key, data))
            .await
    }

    async fn write_if_missing(&self, key: &str, data: Vec<u8>) -> StorageResult<()> {
        self.guard(
            Operation::WriteIfMissing,
            key,
            self.inner.write_if_missing(key, data),
        )
        .await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.guard(Operation::Remove, key, self.inner.remove(key)).await
    }

    async fn remove_folder(&self, folder: &str) -> StorageResult<()> {
        self.guard(Operation::RemoveFolder, folder, self.inner.remove_folder(folder))
            .await
    }

    async fn stream_read(&self, key: &str) -> StorageResult<BlobReader> {
        self.guard(Operation::StreamRead, key, self.inner.stream_read(key))
            .await
    }

    async fn stream_write(&self, key: &str) -> StorageResult<BlobWriter> {
        self.guard(Operation::StreamWrite, key, self.inner.stream_write(key))
            .await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
