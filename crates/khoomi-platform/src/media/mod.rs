//! Media host
//!
//! Images live on an external host. Uploads return a public URL and an
//! opaque handle; the handle is kept so the asset can be destroyed later.

pub mod http_host;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use crate::shared::error::{PlatformError, Result};

pub use http_host::{HttpMediaHost, HttpMediaHostConfig};

pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Clone)]
pub enum MediaSource {
    Bytes {
        file_name: String,
        content_type: String,
        data: Bytes,
    },
    /// Host fetches the image itself
    RemoteUrl(String),
}

impl MediaSource {
    /// Accept only non-empty images of a supported type.
    pub fn image(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Result<Self> {
        let content_type = content_type.into();
        if !SUPPORTED_IMAGE_TYPES.contains(&content_type.as_str()) {
            return Err(PlatformError::validation(format!(
                "unsupported image type '{}'; expected one of {}",
                content_type,
                SUPPORTED_IMAGE_TYPES.join(", ")
            )));
        }
        if data.is_empty() {
            return Err(PlatformError::validation("image file is empty"));
        }
        Ok(Self::Bytes {
            file_name: file_name.into(),
            content_type,
            data,
        })
    }

    pub fn remote(url: &str) -> Result<Self> {
        let url = url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(PlatformError::validation("image url must be an http(s) URL"));
        }
        Ok(Self::RemoteUrl(url.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub url: String,
    pub handle: String,
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, source: MediaSource, folder: &str) -> Result<MediaAsset>;

    async fn destroy(&self, handle: &str) -> Result<()>;
}

/// Stand-in when no media credentials are configured; every call fails.
#[derive(Debug, Default)]
pub struct DisabledMediaHost;

#[async_trait]
impl MediaHost for DisabledMediaHost {
    async fn upload(&self, _source: MediaSource, _folder: &str) -> Result<MediaAsset> {
        Err(PlatformError::media("media host is not configured"))
    }

    async fn destroy(&self, _handle: &str) -> Result<()> {
        Err(PlatformError::media("media host is not configured"))
    }
}

/// Destroy assets best-effort; failures are logged and otherwise ignored.
pub async fn discard(host: &dyn MediaHost, handles: &[String]) {
    for handle in handles {
        if let Err(e) = host.destroy(handle).await {
            warn!(handle = %handle, error = %e, "Failed to delete media asset");
        }
    }
}

/// Run `write` after uploads; on failure, destroy what was uploaded.
pub async fn with_rollback<T, F>(host: &dyn MediaHost, handles: &[String], write: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match write.await {
        Ok(value) => Ok(value),
        Err(e) => {
            if !handles.is_empty() {
                warn!(count = handles.len(), error = %e, "Write failed after upload, deleting uploaded media");
                discard(host, handles).await;
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        destroyed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaHost for RecordingHost {
        async fn upload(&self, _source: MediaSource, _folder: &str) -> Result<MediaAsset> {
            unreachable!()
        }

        async fn destroy(&self, handle: &str) -> Result<()> {
            self.destroyed.lock().unwrap().push(handle.to_string());
            if handle == "broken" {
                return Err(PlatformError::media("boom"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_image_type_check() {
        assert!(MediaSource::image("a.png", "image/png", Bytes::from_static(b"x")).is_ok());
        assert!(MediaSource::image("a.pdf", "application/pdf", Bytes::from_static(b"x")).is_err());
        assert!(MediaSource::image("a.png", "image/png", Bytes::new()).is_err());
    }

    #[test]
    fn test_remote_url_scheme() {
        assert!(MediaSource::remote("https://cdn.example.com/a.png").is_ok());
        assert!(MediaSource::remote("file:///etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_rollback_deletes_uploads_on_failure() {
        let host = RecordingHost::default();
        let handles = vec!["a".to_string(), "broken".to_string(), "c".to_string()];

        let result: Result<()> =
            with_rollback(&host, &handles, async { Err(PlatformError::internal("insert failed")) }).await;

        assert!(result.is_err());
        assert_eq!(*host.destroyed.lock().unwrap(), handles);
    }

    #[tokio::test]
    async fn test_rollback_keeps_uploads_on_success() {
        let host = RecordingHost::default();
        let handles = vec!["a".to_string()];

        let value = with_rollback(&host, &handles, async { Ok(7) }).await.unwrap();

        assert_eq!(value, 7);
        assert!(host.destroyed.lock().unwrap().is_empty());
    }
}
