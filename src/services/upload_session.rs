use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};
use uuid::Uuid;

use crate::services::storage::{StorageError, StorageService};
use crate::utils::validation::{Rejection, ValidationRules, file_extension, validate_upload};

/// What the multipart ingest adapter must deliver for a file part before any
/// bytes are consumed.
#[derive(Debug, Clone)]
pub struct PartMetadata {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// Success payload of a finished upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Caller-resolvable reference to the stored artifact.
    pub location: String,
    /// Destination key the artifact was stored under.
    pub key: String,
    /// Bytes actually received and written.
    pub size: u64,
}

/// Terminal error classification for one upload attempt.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Rejected(Rejection),

    #[error("client aborted the upload")]
    ClientAborted,

    #[error("malformed upload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type SessionOutcome = Result<StoredUpload, UploadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Receiving,
    Writing,
    Succeeded,
    Failed,
}

/// Orchestrates one upload attempt: metadata validation, destination key
/// generation, the streaming write, and exactly-once terminal signaling.
///
/// One session per request; sessions share nothing mutable with each other.
/// Cleanup of partial writes is owned by the storage backend, which discards
/// them before `put` returns, so by the time an outcome is observable every
/// resource tied to the attempt has been released.
pub struct UploadSession {
    storage: Arc<dyn StorageService>,
    rules: ValidationRules,
    pad_id: String,
    state: SessionState,
    outcome: Option<SessionOutcome>,
}

impl UploadSession {
    pub fn new(
        pad_id: impl Into<String>,
        rules: ValidationRules,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        Self {
            storage,
            rules,
            pad_id: pad_id.into(),
            state: SessionState::Idle,
            outcome: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the attempt to its terminal state. The returned reference is the
    /// single observable result for this session.
    pub async fn run<R>(
        &mut self,
        metadata: PartMetadata,
        reader: R,
        declared_size: Option<u64>,
    ) -> &SessionOutcome
    where
        R: AsyncRead + Unpin + Send,
    {
        self.state = SessionState::Receiving;

        if let Err(rejection) = validate_upload(&metadata.file_name, declared_size, &self.rules) {
            tracing::info!(
                pad_id = %self.pad_id,
                file_name = %metadata.file_name,
                "Upload rejected: {}",
                rejection
            );
            return self.complete(Err(UploadError::Rejected(rejection)));
        }

        // Generated exactly once per attempt, before the first byte is
        // written. Collision resistance comes from the random token, not
        // from checking the backend.
        let key = destination_key(&self.pad_id, &metadata.file_name);
        self.state = SessionState::Writing;
        tracing::debug!(pad_id = %self.pad_id, key = %key, "Streaming upload to storage");

        let limited = LimitedReader::new(reader, self.rules.max_file_size);
        let outcome = match self.storage.put(&key, Box::new(limited), declared_size).await {
            Ok(stored) => Ok(StoredUpload {
                location: stored.location,
                key,
                size: stored.size,
            }),
            Err(StorageError::Source(e)) => Err(classify_source_error(e)),
            Err(e) => Err(UploadError::Storage(e)),
        };

        self.complete(outcome)
    }

    /// One-time terminal-result producer. The first call records the outcome
    /// and moves the session to `Succeeded` or `Failed`; every later call is
    /// a no-op returning the already-recorded result, so racing error
    /// signals collapse into a single observable outcome.
    pub fn complete(&mut self, outcome: SessionOutcome) -> &SessionOutcome {
        if self.outcome.is_none() {
            self.state = match &outcome {
                Ok(_) => SessionState::Succeeded,
                Err(_) => SessionState::Failed,
            };
        }
        self.outcome.get_or_insert(outcome)
    }

    /// Consume the session, yielding its terminal result. A session that was
    /// never driven reports an internal error rather than panicking.
    pub fn into_outcome(self) -> SessionOutcome {
        self.outcome.unwrap_or_else(|| {
            Err(UploadError::Internal(
                "upload session produced no result".to_string(),
            ))
        })
    }
}

/// Destination key for one attempt: pad id, random token, and the original
/// extension. Unpredictable so stored names cannot be enumerated or made to
/// collide on purpose.
pub fn destination_key(pad_id: &str, file_name: &str) -> String {
    let token = Uuid::new_v4();
    match file_extension(file_name) {
        Some(ext) => format!("{}/{}.{}", pad_id, token, ext),
        None => format!("{}/{}", pad_id, token),
    }
}

/// Typed error surfaced by `LimitedReader` when the running total crosses
/// the ceiling, so the session can tell a size abort from a genuine stream
/// failure.
#[derive(Debug, Error)]
#[error("upload of {seen} bytes exceeds the configured maximum of {max} bytes")]
pub struct SizeLimitExceeded {
    pub seen: u64,
    pub max: u64,
}

/// Counts bytes flowing through an inbound stream and fails the read the
/// moment the configured ceiling is crossed. This is the incremental size
/// check for streams whose length is not known in advance; the storage
/// backend sees the failure as a source error and discards its partial
/// write.
pub struct LimitedReader<R> {
    inner: R,
    max: u64,
    consumed: u64,
}

impl<R> LimitedReader<R> {
    pub fn new(inner: R, max: u64) -> Self {
        Self {
            inner,
            max,
            consumed: 0,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LimitedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.consumed += (buf.filled().len() - before) as u64;
                if this.consumed > this.max {
                    // AsyncRead requires that an Err return leaves the buffer
                    // untouched; roll back the bytes filled by this poll.
                    buf.set_filled(before);
                    return Poll::Ready(Err(io::Error::other(SizeLimitExceeded {
                        seen: this.consumed,
                        max: this.max,
                    })));
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Maps an inbound-stream failure to a terminal error kind. Size-ceiling
/// aborts carry the typed marker; disconnect-shaped I/O errors are the
/// client going away; anything else is framing-level damage.
fn classify_source_error(err: io::Error) -> UploadError {
    if let Some(inner) = err.get_ref() {
        if let Some(limit) = inner.downcast_ref::<SizeLimitExceeded>() {
            return UploadError::Rejected(Rejection::Size {
                size: limit.seen,
                max: limit.max,
            });
        }
    }

    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => UploadError::ClientAborted,
        _ => UploadError::Malformed(err.to_string()),
    }
}
