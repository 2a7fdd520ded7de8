use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::library::StorageId;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const PNG_CONTENT_TYPE: &str = "image/png";

const LOCAL_UPLOAD_SCHEME: &str = "local-upload://";

/// Blob storage: issue an upload URL, post bytes to it, get an id back.
pub trait StorageClient: Send + Sync {
    fn generate_upload_url(&self) -> BoxFuture<'_, AppResult<String>>;
    fn upload<'a>(
        &'a self,
        upload_url: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, AppResult<StorageId>>;
    /// Where a stored blob can be fetched from.
    fn url_for(&self, id: &StorageId) -> String;
}

/// Blobs as files under one directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        PDF_CONTENT_TYPE => "pdf",
        PNG_CONTENT_TYPE => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

impl StorageClient for LocalStorage {
    fn generate_upload_url(&self) -> BoxFuture<'_, AppResult<String>> {
        Box::pin(async move { Ok(format!("{LOCAL_UPLOAD_SCHEME}{}", Uuid::new_v4())) })
    }

    fn upload<'a>(
        &'a self,
        upload_url: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, AppResult<StorageId>> {
        Box::pin(async move {
            let token = upload_url
                .strip_prefix(LOCAL_UPLOAD_SCHEME)
                .filter(|token| !token.is_empty() && !token.contains(['/', '\\']))
                .ok_or_else(|| {
                    AppError::invalid_argument(format!("not a local upload url: {upload_url}"))
                })?;
            tokio::fs::create_dir_all(&self.root).await.map_err(|source| {
                AppError::io_with_context(source, format!("failed to create {}", self.root.display()))
            })?;

            let name = format!("{token}.{}", extension_for(content_type));
            let path = self.root.join(&name);
            tokio::fs::write(&path, &bytes).await.map_err(|source| {
                AppError::io_with_context(source, format!("failed to write {}", path.display()))
            })?;
            debug!(blob = %name, bytes = bytes.len(), "blob stored");
            Ok(StorageId::from(name))
        })
    }

    fn url_for(&self, id: &StorageId) -> String {
        format!("file://{}", self.root.join(id.as_str()).display())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrlResponse {
    upload_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    storage_id: String,
}

/// Remote storage speaking the upload-URL handshake over HTTP.
pub struct HttpStorage {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStorage {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::invalid_argument(format!("http client setup failed: {err}")))?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self { client, endpoint })
    }
}

impl StorageClient for HttpStorage {
    fn generate_upload_url(&self) -> BoxFuture<'_, AppResult<String>> {
        Box::pin(async move {
            let url = format!("{}/generate-upload-url", self.endpoint);
            let response: UploadUrlResponse = self
                .client
                .post(&url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|err| AppError::fetch(&url, err))?
                .json()
                .await
                .map_err(|err| AppError::fetch(&url, err))?;
            Ok(response.upload_url)
        })
    }

    fn upload<'a>(
        &'a self,
        upload_url: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, AppResult<StorageId>> {
        Box::pin(async move {
            let response: UploadResponse = self
                .client
                .post(upload_url)
                .header(CONTENT_TYPE, content_type)
                .body(bytes)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|err| AppError::fetch(upload_url, err))?
                .json()
                .await
                .map_err(|err| AppError::fetch(upload_url, err))?;
            Ok(StorageId::from(response.storage_id))
        })
    }

    fn url_for(&self, id: &StorageId) -> String {
        format!("{}/storage/{id}", self.endpoint)
    }
}
