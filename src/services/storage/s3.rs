use anyhow::anyhow;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{StorageError, StorageService, StoredObject};

/// S3-compatible backend (AWS, MinIO). Uploads stream through the multipart
/// API in fixed-size parts; any failure aborts the multipart upload so no
/// orphaned part sets are billed or listed.
pub struct S3StorageService {
    client: Client,
    bucket: String,
}

const PART_SIZE: usize = 10 * 1024 * 1024;

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    async fn abort(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::warn!("Failed to abort multipart upload for {}: {}", key, e);
        }
    }

    async fn stream_parts(
        &self,
        key: &str,
        upload_id: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<(Vec<CompletedPart>, u64), StorageError> {
        let mut part_number = 1;
        let mut completed_parts = Vec::new();
        let mut total: u64 = 0;
        let mut buffer = vec![0u8; PART_SIZE];

        loop {
            let mut n = 0;
            while n < PART_SIZE {
                let read = reader
                    .read(&mut buffer[n..])
                    .await
                    .map_err(StorageError::Source)?;
                if read == 0 {
                    break;
                }
                n += read;
            }

            if n == 0 {
                break;
            }

            total += n as u64;
            let body = ByteStream::from(buffer[..n].to_vec());
            let upload_part_res = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .body(body)
                .part_number(part_number)
                .send()
                .await
                .map_err(|e| StorageError::Backend(e.into()))?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            part_number += 1;
        }

        Ok((completed_parts, total))
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn put<'a>(
        &self,
        key: &str,
        mut reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
        _size_hint: Option<u64>,
    ) -> Result<StoredObject, StorageError> {
        let multipart_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.into()))?;

        let upload_id = multipart_res
            .upload_id()
            .ok_or_else(|| StorageError::Backend(anyhow!("no upload ID returned")))?
            .to_string();

        let (completed_parts, total) = match self
            .stream_parts(key, &upload_id, reader.as_mut())
            .await
        {
            Ok(res) => res,
            Err(e) => {
                self.abort(key, &upload_id).await;
                return Err(e);
            }
        };

        if completed_parts.is_empty() {
            // Zero-byte stream: S3 rejects a partless complete call.
            self.abort(key, &upload_id).await;
            let res = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(Vec::new()))
                .send()
                .await;
            if let Err(e) = res {
                return Err(StorageError::Backend(e.into()));
            }
        } else {
            let completed = CompletedMultipartUpload::builder()
                .set_parts(Some(completed_parts))
                .build();

            let res = self
                .client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(completed)
                .send()
                .await;
            if let Err(e) = res {
                self.abort(key, &upload_id).await;
                return Err(StorageError::Backend(e.into()));
            }
        }

        Ok(StoredObject {
            location: self.location(key),
            size: total,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.into()))?;
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }
}
