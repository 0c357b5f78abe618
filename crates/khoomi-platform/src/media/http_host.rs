//! Signed-upload HTTP media host client

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::media::{MediaAsset, MediaHost, MediaSource};
use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone)]
pub struct HttpMediaHostConfig {
    pub upload_url: String,
    pub destroy_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

impl From<&khoomi_config::MediaConfig> for HttpMediaHostConfig {
    fn from(config: &khoomi_config::MediaConfig) -> Self {
        Self {
            upload_url: config.upload_url.clone(),
            destroy_url: config.destroy_url.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

pub struct HttpMediaHost {
    config: HttpMediaHostConfig,
    client: reqwest::Client,
}

impl HttpMediaHost {
    pub fn new(config: HttpMediaHostConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        sign_params(params, &self.config.api_secret)
    }
}

/// SHA-256 over `k=v` pairs sorted by key and joined by `&`, then the secret.
pub fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{}{}", joined, secret).as_bytes()))
}

#[async_trait]
impl MediaHost for HttpMediaHost {
    async fn upload(&self, source: MediaSource, folder: &str) -> Result<MediaAsset> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("folder", folder), ("timestamp", &timestamp)]);

        let file = match source {
            MediaSource::Bytes { file_name, content_type, data } => Part::bytes(data.to_vec())
                .file_name(file_name)
                .mime_str(&content_type)?,
            MediaSource::RemoteUrl(url) => Part::text(url),
        };
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("folder", folder.to_string())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self.client.post(&self.config.upload_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::media(format!("upload failed with HTTP {}: {}", status, body)));
        }

        let uploaded: UploadResponse = response.json().await?;
        debug!(handle = %uploaded.public_id, "Media uploaded");
        Ok(MediaAsset {
            url: uploaded.secure_url,
            handle: uploaded.public_id,
        })
    }

    async fn destroy(&self, handle: &str) -> Result<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", handle), ("timestamp", &timestamp)]);

        let form = Form::new()
            .text("public_id", handle.to_string())
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self.client.post(&self.config.destroy_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::media(format!("destroy failed with HTTP {}: {}", status, body)));
        }

        let outcome: DestroyResponse = response.json().await?;
        match outcome.result.as_str() {
            "ok" | "not found" => {
                debug!(handle = %handle, result = %outcome.result, "Media destroyed");
                Ok(())
            }
            other => Err(PlatformError::media(format!("destroy returned '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_order_independent() {
        let a = sign_params(&[("timestamp", "1700000000"), ("folder", "shops")], "secret");
        let b = sign_params(&[("folder", "shops"), ("timestamp", "1700000000")], "secret");
        assert_eq!(a, b);
        assert_eq!(a, hex::encode(Sha256::digest(b"folder=shops&timestamp=1700000000secret")));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("public_id", "shops/abc"), ("timestamp", "1")];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }
}
