//! Concurrent fan-out deletion used by remote folder removal.
//!
//! Every listed object gets its own delete, with at most `concurrency` of them in
//! flight. A failed delete never cancels its siblings: the engine waits for all
//! of them and then reports one aggregated error.

use crate::traits::{DeleteFailure, StorageError, StorageResult};
use blobkit_core::DEFAULT_DELETE_CONCURRENCY;
use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;

/// Bounded-width parallel deleter
#[derive(Debug, Clone, Copy)]
pub struct DeletionEngine {
    concurrency: usize,
}

impl Default for DeletionEngine {
    fn default() -> Self {
        DeletionEngine::new(DEFAULT_DELETE_CONCURRENCY)
    }
}

impl DeletionEngine {
    /// Create an engine keeping at most `concurrency` deletes in flight.
    /// A width of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        DeletionEngine {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Delete all `keys` using `delete`, returning how many were deleted.
    ///
    /// `folder` only labels the aggregated error and log events.
    pub async fn delete_all<K, F, Fut, E>(
        &self,
        folder: &str,
        keys: Vec<K>,
        delete: F,
    ) -> StorageResult<usize>
    where
        K: Display,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let total = keys.len();
        if total == 0 {
            return Ok(0);
        }

        let start = std::time::Instant::now();

        let failures: Vec<DeleteFailure> = stream::iter(keys)
            .map(|key| {
                let name = key.to_string();
                let pending = delete(key);
                async move { (name, pending.await) }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|(key, result)| async move {
                match result {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, key = %key, "Delete failed during folder removal");
                        Some(DeleteFailure {
                            key,
                            error: e.to_string(),
                        })
                    }
                }
            })
            .collect()
            .await;

        if !failures.is_empty() {
            tracing::error!(
                folder = %folder,
                failed = failures.len(),
                total,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Folder removal incomplete"
            );
            return Err(StorageError::FolderRemovalIncomplete {
                folder: folder.to_string(),
                failed: failures.len(),
                total,
                failures,
            });
        }

        tracing::debug!(
            folder = %folder,
            deleted = total,
            concurrency = self.concurrency,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Fan-out delete finished"
        );

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("a/b/obj_{}", i)).collect()
    }

    #[tokio::test]
    async fn deletes_every_key() {
        let deleted = Arc::new(Mutex::new(HashSet::new()));
        let engine = DeletionEngine::new(4);

        let count = engine
            .delete_all("a/b", keys(20), |key| {
                let deleted = deleted.clone();
                async move {
                    deleted.lock().unwrap().insert(key);
                    Ok::<(), String>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(count, 20);
        assert_eq!(deleted.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn empty_listing_is_noop() {
        let engine = DeletionEngine::default();
        let count = engine
            .delete_all("nothing", Vec::<String>::new(), |_key| async {
                Err::<(), _>("must not be called")
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn waits_for_all_and_aggregates_failures() {
        let attempted = Arc::new(AtomicUsize::new(0));
        let engine = DeletionEngine::new(3);

        let err = engine
            .delete_all("a/b", keys(10), |key| {
                let attempted = attempted.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    attempted.fetch_add(1, Ordering::SeqCst);
                    if key.ends_with("_3") || key.ends_with("_7") {
                        Err(format!("boom {}", key))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap_err();

        assert_eq!(attempted.load(Ordering::SeqCst), 10);
        match err {
            StorageError::FolderRemovalIncomplete {
                folder,
                failed,
                total,
                failures,
            } => {
                assert_eq!(folder, "a/b");
                assert_eq!(failed, 2);
                assert_eq!(total, 10);
                let failed_keys: HashSet<_> = failures.into_iter().map(|f| f.key).collect();
                assert!(failed_keys.contains("a/b/obj_3"));
                assert!(failed_keys.contains("a/b/obj_7"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn respects_concurrency_width() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let engine = DeletionEngine::new(2);

        engine
            .delete_all("folder", keys(12), |_key| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            })
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn zero_width_is_clamped() {
        assert_eq!(DeletionEngine::new(0).concurrency(), 1);
    }
}
