use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend types
///
/// Defined in core because configuration selects the backend before any
/// storage crate is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Filesystem rooted at a base directory
    Local,
    S3,
    /// Google Cloud Storage
    Gcs,
    /// Process-local object store, mostly for tests
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "fs" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            "gcs" => Ok(StorageBackend::Gcs),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Gcs => write!(f, "gcs"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_backends() {
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("FS".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!(" S3 ".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!("gcs".parse::<StorageBackend>().unwrap(), StorageBackend::Gcs);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!("nfs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn display_round_trips_through_serde_name() {
        for backend in [
            StorageBackend::Local,
            StorageBackend::S3,
            StorageBackend::Gcs,
            StorageBackend::Memory,
        ] {
            let json = serde_json::to_string(&backend).unwrap();
            assert_eq!(json, format!("\"{}\"", backend));
        }
    }
}
