//! Upload of finished videos to Google Cloud Storage.
//!
//! The store is behind a trait so the HTTP layer can be exercised
//! without cloud credentials. The production implementation uploads
//! with a public-read ACL and a hard timeout; callers decide what to
//! do when an upload fails.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::buckets::get::GetBucketRequest;
use google_cloud_storage::http::object_access_controls::PredefinedObjectAcl;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

/// Uploads that run longer than this are abandoned.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("upload timed out after {}s", UPLOAD_TIMEOUT.as_secs())]
    Timeout,
    #[error("storage request failed: {0}")]
    Gcs(#[from] google_cloud_storage::http::Error),
    #[error("failed to read video file: {0}")]
    Io(#[from] std::io::Error),
}

/// Object storage backend for generated videos.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether `bucket` exists and is reachable with the current credentials.
    async fn bucket_exists(&self, bucket: &str) -> bool;

    /// Upload the file at `path` to `bucket`/`object` with public-read
    /// access, returning the public URL.
    async fn upload_public(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, StoreError>;
}

/// Public HTTPS URL for an object with public-read access.
pub fn public_url(bucket: &str, object: &str) -> String {
    format!("https://storage.googleapis.com/{bucket}/{object}")
}

pub struct GcsStore {
    client: Client,
}

impl GcsStore {
    /// Build a client from ambient credentials (service account or
    /// application default credentials).
    pub async fn connect(project_id: Option<&str>) -> anyhow::Result<Self> {
        let config = ClientConfig::default().with_auth().await?;
        if let Some(project) = project_id {
            tracing::info!(project, "storage client initialized");
        } else {
            tracing::info!("storage client initialized without explicit project");
        }
        Ok(Self {
            client: Client::new(config),
        })
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn bucket_exists(&self, bucket: &str) -> bool {
        self.client
            .get_bucket(&GetBucketRequest {
                bucket: bucket.to_string(),
                ..Default::default()
            })
            .await
            .is_ok()
    }

    async fn upload_public(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let data = tokio::fs::read(path).await?;
        let size = data.len();

        let mut media = Media::new(object.to_string());
        media.content_type = content_type.to_string().into();
        let upload_type = UploadType::Simple(media);
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            predefined_acl: Some(PredefinedObjectAcl::PublicRead),
            ..Default::default()
        };

        let upload = self
            .client
            .upload_object(&req, Bytes::from(data), &upload_type);
        tokio::time::timeout(UPLOAD_TIMEOUT, upload)
            .await
            .map_err(|_| StoreError::Timeout)??;

        tracing::info!(bucket, object, size, "uploaded video");
        Ok(public_url(bucket, object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_layout() {
        assert_eq!(
            public_url("my-bucket", "videos/out.mp4"),
            "https://storage.googleapis.com/my-bucket/videos/out.mp4"
        );
    }
}
