use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

mod local;
mod s3;

pub use local::LocalStorageService;
pub use s3::S3StorageService;

/// Descriptor of a fully persisted upload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Caller-resolvable reference to the stored artifact.
    pub location: String,
    /// Bytes actually written.
    pub size: u64,
}

/// Storage failures, split by which side of the pipe broke. The upload
/// session classifies its terminal result from this distinction.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading the inbound byte stream failed (client abort, size ceiling,
    /// malformed framing). The backend write was discarded.
    #[error("failed reading upload stream: {0}")]
    Source(#[source] std::io::Error),

    /// The backend itself failed. The partial write was discarded.
    #[error("storage backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Abstract persistence capability. Implementations stream the reader to the
/// backend and must never leave a partial artifact behind on any failure
/// path, nor touch objects stored under other keys.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Persist the byte stream under `key`. Returns the stored location and
    /// the number of bytes written on full success only.
    async fn put<'a>(
        &self,
        key: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        size_hint: Option<u64>,
    ) -> Result<StoredObject, StorageError>;

    /// Remove a stored object. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Caller-resolvable reference for a key, without touching the backend.
    fn location(&self, key: &str) -> String;
}
