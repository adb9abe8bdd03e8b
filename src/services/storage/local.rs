use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::{StorageError, StorageService, StoredObject};

/// Reference local-filesystem backend. Writes go to a `.part` sibling of the
/// final path and are renamed into place only once the stream completed, so
/// a finalized file is always a complete file.
pub struct LocalStorageService {
    base_folder: PathBuf,
    public_url: String,
}

impl LocalStorageService {
    pub fn new(base_folder: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            base_folder: base_folder.into(),
            public_url: public_url.into(),
        }
    }

    fn final_path(&self, key: &str) -> PathBuf {
        self.base_folder.join(key)
    }
}

/// Temp path next to the final one. The key already embeds a per-attempt
/// unique token, so the `.part` name cannot collide across requests.
fn part_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    final_path.with_file_name(name)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove partial upload {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn put<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        _size_hint: Option<u64>,
    ) -> Result<StoredObject, StorageError> {
        let final_path = self.final_path(key);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Backend(e.into()))?;
        }

        let tmp_path = part_path(&final_path);
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| StorageError::Backend(e.into()))?;

        let mut buffer = vec![0u8; 64 * 1024];
        let mut total: u64 = 0;

        loop {
            let n = match reader.read(&mut buffer).await {
                Ok(n) => n,
                Err(e) => {
                    drop(file);
                    discard(&tmp_path).await;
                    return Err(StorageError::Source(e));
                }
            };
            if n == 0 {
                break;
            }
            if let Err(e) = file.write_all(&buffer[..n]).await {
                drop(file);
                discard(&tmp_path).await;
                return Err(StorageError::Backend(e.into()));
            }
            total += n as u64;
        }

        if let Err(e) = file.flush().await {
            drop(file);
            discard(&tmp_path).await;
            return Err(StorageError::Backend(e.into()));
        }
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            discard(&tmp_path).await;
            return Err(StorageError::Backend(e.into()));
        }

        tracing::debug!("Stored {} ({} bytes)", final_path.display(), total);

        Ok(StoredObject {
            location: self.location(key),
            size: total,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.final_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Backend(e.into())),
        }
    }

    fn location(&self, key: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), key)
    }
}
