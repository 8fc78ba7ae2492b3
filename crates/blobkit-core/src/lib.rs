//! Blobkit Core Library
//!
//! Configuration and backend selection types shared by the storage crate and
//! whatever process constructs a storage instance.

pub mod config;
pub mod storage_types;

// Re-export commonly used types
pub use config::{StorageConfig, DEFAULT_DELETE_CONCURRENCY};
pub use storage_types::StorageBackend;
