//! Configuration module
//!
//! Storage configuration read from the environment (and an optional `.env`
//! file). The values here only select and construct a backend; credentials for
//! remote object stores are resolved by the object store client itself.

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

/// Default number of deletes kept in flight during folder removal.
pub const DEFAULT_DELETE_CONCURRENCY: usize = 64;

/// Storage configuration
#[derive(Clone, Debug, PartialEq)]
pub struct StorageConfig {
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub bucket: Option<String>,
    /// Key namespace applied to every key, on every backend
    pub prefix: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub delete_concurrency: usize,
    pub operation_timeout_secs: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            storage_backend: StorageBackend::Local,
            local_storage_path: None,
            bucket: None,
            prefix: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            delete_concurrency: DEFAULT_DELETE_CONCURRENCY,
            operation_timeout_secs: None,
        }
    }
}

impl StorageConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let delete_concurrency = match non_empty("STORAGE_DELETE_CONCURRENCY") {
            Some(value) => value.trim().parse::<usize>().map_err(|e| {
                anyhow::anyhow!("STORAGE_DELETE_CONCURRENCY must be a positive integer: {}", e)
            })?,
            None => DEFAULT_DELETE_CONCURRENCY,
        };

        let operation_timeout_secs = match non_empty("STORAGE_OPERATION_TIMEOUT_SECS") {
            Some(value) => Some(value.trim().parse::<u64>().map_err(|e| {
                anyhow::anyhow!("STORAGE_OPERATION_TIMEOUT_SECS must be an integer: {}", e)
            })?),
            None => None,
        };

        Ok(StorageConfig {
            storage_backend,
            local_storage_path: non_empty("LOCAL_STORAGE_PATH"),
            bucket: non_empty("STORAGE_BUCKET"),
            prefix: non_empty("STORAGE_PREFIX"),
            s3_region: non_empty("S3_REGION"),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            aws_region: non_empty("AWS_REGION"),
            delete_concurrency,
            operation_timeout_secs,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.delete_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "STORAGE_DELETE_CONCURRENCY must be greater than zero"
            ));
        }

        if self.operation_timeout_secs == Some(0) {
            return Err(anyhow::anyhow!(
                "STORAGE_OPERATION_TIMEOUT_SECS must be greater than zero when set"
            ));
        }

        match self.storage_backend {
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::S3 => {
                if self.bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Gcs => {
                if self.bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BUCKET must be set when using GCS storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        Ok(())
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage_backend
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.local_storage_path.as_deref()
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    /// Region for S3, falling back to `AWS_REGION`.
    pub fn region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn delete_concurrency(&self) -> usize {
        self.delete_concurrency
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_local_backend() {
        let config = StorageConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.storage_backend(), StorageBackend::Local);
        assert_eq!(config.delete_concurrency(), DEFAULT_DELETE_CONCURRENCY);
        assert_eq!(config.operation_timeout(), None);
        assert_eq!(config.prefix(), "");
    }

    #[test]
    fn local_requires_path() {
        let config = StorageConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "local")])).unwrap();
        assert!(config.validate().is_err());

        let config = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/var/lib/blobs"),
        ]))
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn s3_region_falls_back_to_aws_region() {
        let config = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "s3"),
            ("STORAGE_BUCKET", "blobs"),
            ("STORAGE_PREFIX", "someprefix/sub"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.region(), Some("eu-west-1"));
        assert_eq!(config.prefix(), "someprefix/sub");
    }

    #[test]
    fn gcs_requires_bucket() {
        let config = StorageConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "gcs")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_numbers() {
        assert!(
            StorageConfig::from_lookup(lookup(&[("STORAGE_DELETE_CONCURRENCY", "lots")])).is_err()
        );

        let config =
            StorageConfig::from_lookup(lookup(&[("STORAGE_DELETE_CONCURRENCY", "0")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_operation_timeout() {
        let config = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("STORAGE_OPERATION_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_values_are_treated_as_unset() {
        let config = StorageConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", ""),
            ("STORAGE_PREFIX", "  "),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend(), StorageBackend::Local);
        assert_eq!(config.prefix, None);
    }
}
