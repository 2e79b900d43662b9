//! Client for the photo file server.
//!
//! `POST {base}/files/upload` takes a multipart `file` part and answers
//! `{"url": ...}`, where the URL may be relative to the server.
//! `DELETE {base}/files/delete/{filename}` removes a stored file.

use crate::config::ClientConfig;
use crate::error::{ServiceError, ServiceResult};
use chrono::Utc;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const JPEG_MIME: &str = "image/jpeg";

pub struct PhotoClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

impl PhotoClient {
    pub fn new(config: &ClientConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::upstream("failed to initialise photo client", e))?;
        Ok(Self {
            client,
            base_url: config.upload_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Uploads a JPEG as `{prefix}_{millis}.jpg` and returns its absolute
    /// URL.
    pub async fn upload_jpeg(&self, prefix: &str, bytes: Vec<u8>) -> ServiceResult<String> {
        const CONTEXT: &str = "failed to upload photo";

        if bytes.is_empty() {
            return Err(ServiceError::invalid("photo is empty"));
        }
        let filename = format!("{prefix}_{}.jpg", Utc::now().timestamp_millis());
        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str(JPEG_MIME)
            .map_err(|e| ServiceError::upstream(CONTEXT, e))?;

        let resp: UploadResponse = self
            .client
            .post(format!("{}/files/upload", self.base_url))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServiceError::upstream(CONTEXT, e))?
            .json()
            .await
            .map_err(|e| ServiceError::upstream(CONTEXT, e))?;

        let url = resp
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServiceError::upstream(CONTEXT, "response carried no url"))?;
        Ok(self.resolve_url(&url))
    }

    /// Deletes the file a photo URL points at.
    pub async fn delete(&self, photo_url: &str) -> ServiceResult<()> {
        const CONTEXT: &str = "failed to delete photo";

        let filename = filename_from_url(photo_url)
            .ok_or_else(|| ServiceError::invalid("photo URL has no file name"))?;
        self.client
            .delete(format!("{}/files/delete/{filename}", self.base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ServiceError::upstream(CONTEXT, e))?;
        debug!(filename, "photo deleted");
        Ok(())
    }

    /// Absolute URLs pass through; anything else is joined to the base URL.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }
}

/// Last path segment of a URL, ignoring any query string.
pub fn filename_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().filter(|name| !name.is_empty())
}
