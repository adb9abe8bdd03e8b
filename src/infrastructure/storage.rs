use std::sync::Arc;

use anyhow::{Context, Result};
use aws_sdk_s3::config::Region;
use tracing::info;

use crate::config::StorageConfig;
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};

/// Build the configured storage backend. Local disk by default; an
/// S3-compatible endpoint when selected.
pub async fn setup_storage(config: &StorageConfig) -> Result<Arc<dyn StorageService>> {
    match config.backend.as_str() {
        "local" => {
            info!(
                "Local storage: {} (served at {})",
                config.base_folder.display(),
                config.public_url
            );
            tokio::fs::create_dir_all(&config.base_folder)
                .await
                .with_context(|| {
                    format!(
                        "failed to create storage base folder {}",
                        config.base_folder.display()
                    )
                })?;
            Ok(Arc::new(LocalStorageService::new(
                config.base_folder.clone(),
                config.public_url.clone(),
            )))
        }
        "s3" => {
            let endpoint = config
                .s3_endpoint
                .clone()
                .context("S3_ENDPOINT must be set for the s3 backend")?;
            let access_key = config
                .s3_access_key
                .clone()
                .context("S3_ACCESS_KEY must be set for the s3 backend")?;
            let secret_key = config
                .s3_secret_key
                .clone()
                .context("S3_SECRET_KEY must be set for the s3 backend")?;
            let bucket = config
                .s3_bucket
                .clone()
                .context("S3_BUCKET must be set for the s3 backend")?;

            info!("S3 storage: {} (Bucket: {})", endpoint, bucket);

            let aws_config = aws_config::from_env()
                .endpoint_url(&endpoint)
                .region(Region::new("us-east-1"))
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    access_key, secret_key, None, None, "static",
                ))
                .load()
                .await;

            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build();

            let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

            // Ensure the bucket exists before the first upload needs it.
            match s3_client.head_bucket().bucket(&bucket).send().await {
                Ok(_) => info!("Bucket '{}' is ready", bucket),
                Err(_) => {
                    info!("Bucket '{}' not found, creating...", bucket);
                    if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                        tracing::error!("Failed to create bucket '{}': {}", bucket, e);
                    }
                }
            }

            Ok(Arc::new(S3StorageService::new(s3_client, bucket)))
        }
        other => anyhow::bail!("unknown storage backend '{}'", other),
    }
}
