//! Blobkit Storage Library
//!
//! A uniform blob store over a local filesystem or a remote object store. Callers
//! code against the [`Storage`] trait and never learn which medium holds their
//! bytes.
//!
//! # Key format
//!
//! Keys are `/`-separated UTF-8 strings such as `users/123/file.txt`. Every key is
//! joined under the instance prefix by the `keys` module, so all backends resolve
//! keys the same way: no doubled separators, and `..` never leaves the prefix.
//!
//! # Conditional writes
//!
//! [`Storage::write_if_missing`] is a single atomic medium operation on every
//! backend: an exclusive hard link of a fully written temp file locally and a
//! create-only conditional put remotely. Losing the race is a successful no-op.

pub mod cancel;
pub mod deletion;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod remote;
pub mod traits;

// Re-export commonly used types
pub use blobkit_core::StorageBackend;
pub use cancel::CancellableStorage;
pub use deletion::DeletionEngine;
pub use factory::create_storage;
pub use keys::join_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use remote::RemoteStorage;
pub use traits::{
    BlobReader, BlobWriter, DeleteFailure, Operation, Storage, StorageError, StorageResult,
};
pub use tokio_util::sync::CancellationToken;
