use std::env;
use std::path::PathBuf;

/// Upload policy and storage configuration. Loaded once at startup and
/// threaded through `AppState`; handlers treat it as immutable for the
/// duration of a request.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Allowed file extensions (default: common image types).
    /// An empty list disables the extension restriction.
    pub allowed_file_types: Vec<String>,

    /// Maximum file size in bytes (default: 5 MB).
    pub max_file_size: u64,

    /// Storage backend settings. Never exposed to clients.
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage backend: "local" or "s3" (default: "local").
    pub backend: String,

    /// Base folder for the local backend (default: "./uploads").
    pub base_folder: PathBuf,

    /// Public URL prefix prepended to stored keys when building the
    /// location returned to clients (default: "/uploads").
    pub public_url: String,

    /// S3 endpoint URL (MinIO compatible).
    pub s3_endpoint: Option<String>,
    /// S3 access key.
    pub s3_access_key: Option<String>,
    /// S3 secret key.
    pub s3_secret_key: Option<String>,
    /// S3 bucket name.
    pub s3_bucket: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_file_types: vec![
                "jpeg".to_string(),
                "jpg".to_string(),
                "bmp".to_string(),
                "gif".to_string(),
                "png".to_string(),
            ],
            max_file_size: 5_000_000, // 5 MB
            storage: StorageConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            base_folder: PathBuf::from("./uploads"),
            public_url: "/uploads".to_string(),
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_bucket: None,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            allowed_file_types: env::var("FILE_TYPES")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_file_types),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            storage: StorageConfig::from_env(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            backend: env::var("STORAGE_BACKEND").unwrap_or(default.backend),

            base_folder: env::var("STORAGE_BASE_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(default.base_folder),

            public_url: env::var("STORAGE_PUBLIC_URL").unwrap_or(default.public_url),

            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),
            s3_bucket: env::var("S3_BUCKET").ok(),
        }
    }
}
