//! Object storage for pet images
//!
//! Uploads go to an S3-compatible bucket with a public-read ACL and are
//! addressed by their public URL afterwards.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream, types::ObjectCannedAcl};
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// Largest accepted upload, per file
pub const MAX_IMAGE_BYTES: usize = 15_000_000;

const KEY_PREFIX: &str = "images/pet";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    Upload(String),
}

/// An image ready to be stored
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub key: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Build an upload with a fresh object key
    pub fn new(file_name: Option<&str>, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            key: object_key(file_name, content_type),
            content_type: content_type.to_string(),
            bytes,
        }
    }
}

/// Destination for uploaded images; returns the public URL of the stored object
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<String, StorageError>;
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    /// Public domain serving the bucket, if it differs from the endpoint
    pub public_domain: Option<String>,
}

impl StorageConfig {
    /// Create a new StorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `BUCKET_NAME`: Bucket receiving the images (required)
    /// - `AWS_ENDPOINT`: S3-compatible endpoint URL (required)
    /// - `AWS_REGION`: Region name (default: fra1)
    /// - `BUCKET_DOMAIN`: Public domain for image URLs (optional)
    pub fn from_env() -> Result<Self> {
        let bucket = std::env::var("BUCKET_NAME")
            .context("BUCKET_NAME environment variable not set")?;
        let endpoint = std::env::var("AWS_ENDPOINT")
            .context("AWS_ENDPOINT environment variable not set")?;
        let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "fra1".to_string());
        let public_domain = std::env::var("BUCKET_DOMAIN")
            .ok()
            .map(|d| d.trim().trim_end_matches('/').to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            bucket,
            endpoint,
            region,
            public_domain,
        })
    }

    /// Base URL that object keys are appended to
    pub fn public_base_url(&self) -> String {
        if let Some(domain) = &self.public_domain {
            return domain.clone();
        }

        let host = self
            .endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        format!("https://{}.{}", self.bucket, host)
    }
}

/// `images/pet/<millis>-<uuid>.<ext>`, the extension taken from the file
/// name or else from the content type
pub fn object_key(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext);
    let from_type = content_type
        .split_once('/')
        .map(|(_, subtype)| subtype.split('+').next().unwrap_or(subtype));

    let extension = [from_name, from_type]
        .into_iter()
        .flatten()
        .map(|ext| {
            ext.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .find(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string());

    format!(
        "{}/{}-{}.{}",
        KEY_PREFIX,
        Utc::now().timestamp_millis(),
        Uuid::new_v4(),
        extension
    )
}

/// Whether a multipart content type is accepted as an image
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .split_once('/')
        .is_some_and(|(kind, subtype)| kind.eq_ignore_ascii_case("image") && !subtype.is_empty())
}

/// S3-compatible image store
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3ImageStore {
    pub async fn new(config: &StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        info!("Image storage configured for bucket {}", config.bucket);

        Self {
            client: Client::new(&sdk_config),
            bucket: config.bucket.clone(),
            public_base: config.public_base_url(),
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn upload(&self, image: ImageUpload) -> Result<String, StorageError> {
        let size = image.bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&image.key)
            .body(ByteStream::from(image.bytes))
            .content_type(&image.content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload {}: {}", image.key, DisplayErrorContext(&e));
                StorageError::Upload(image.key.clone())
            })?;

        info!("Uploaded {} ({} bytes)", image.key, size);

        Ok(format!("{}/{}", self.public_base, image.key))
    }
}
