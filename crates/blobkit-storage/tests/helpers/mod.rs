use blobkit_storage::{LocalStorage, RemoteStorage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

/// A storage under test plus whatever keeps its medium alive.
pub struct TestBackend {
    pub name: &'static str,
    pub storage: Arc<dyn Storage>,
    _dir: Option<TempDir>,
}

/// Initialize tracing once for the test binary; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub async fn local_backend() -> TestBackend {
    let dir = TempDir::new().expect("create temp dir");
    let storage = LocalStorage::new(dir.path().join("test_local_files"))
        .await
        .expect("create local storage")
        .with_prefix("someprefix/sub");
    TestBackend {
        name: "local",
        storage: Arc::new(storage),
        _dir: Some(dir),
    }
}

pub fn remote_backend() -> TestBackend {
    TestBackend {
        name: "remote",
        storage: Arc::new(RemoteStorage::in_memory("someprefix/sub").with_delete_concurrency(8)),
        _dir: None,
    }
}

/// Every backend the contract tests run against.
pub async fn all_backends() -> Vec<TestBackend> {
    init_tracing();
    vec![local_backend().await, remote_backend()]
}
