use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::backend::{PdfBackend, open_default_backend, open_default_backend_from_bytes};
use crate::error::{AppError, AppResult};
use crate::library::SourceLocator;
use crate::preload::{is_http, local_path};

/// Opens the raw document behind a [`SourceLocator`].
pub trait DocumentLoader: Send + Sync {
    fn open<'a>(&'a self, source: &'a SourceLocator) -> BoxFuture<'a, AppResult<Box<dyn PdfBackend>>>;
}

pub struct HayroDocumentLoader {
    client: reqwest::Client,
}

impl HayroDocumentLoader {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::invalid_argument(format!("http client setup failed: {err}")))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> AppResult<Arc<Vec<u8>>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| AppError::fetch(url, err))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| AppError::fetch(url, err))?;
        Ok(Arc::new(bytes.to_vec()))
    }
}

impl DocumentLoader for HayroDocumentLoader {
    fn open<'a>(&'a self, source: &'a SourceLocator) -> BoxFuture<'a, AppResult<Box<dyn PdfBackend>>> {
        Box::pin(async move {
            match source {
                SourceLocator::Url(url) if is_http(url) => {
                    let bytes = self.download(url).await?;
                    let label = PathBuf::from(url);
                    decode_off_thread(move || open_default_backend_from_bytes(label, bytes)).await
                }
                SourceLocator::Url(url) => {
                    let path = local_path(url);
                    decode_off_thread(move || open_default_backend(path)).await
                }
                SourceLocator::LocalFile(path) => {
                    let path = path.clone();
                    decode_off_thread(move || open_default_backend(path)).await
                }
            }
        })
    }
}

/// PDF parsing is CPU-bound; keep it off the async workers.
pub(crate) async fn decode_off_thread<T, F>(decode: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(decode)
        .await
        .map_err(|err| AppError::pdf_decode(format!("decode task failed: {err}")))?
}
