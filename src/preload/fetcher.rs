use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::BoxFuture;
use image::ImageReader;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// Height-to-width ratio, `None` for an empty image.
    pub fn ratio(&self) -> Option<f64> {
        (self.width > 0 && self.height > 0)
            .then(|| f64::from(self.height) / f64::from(self.width))
    }
}

/// Loads one image and reports its natural size. Completion means the image is usable.
pub trait ImageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, AppResult<ImageInfo>>;
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::invalid_argument(format!("http client setup failed: {err}")))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, AppResult<ImageInfo>> {
        Box::pin(async move {
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
            sniff_dimensions(url, &bytes)
        })
    }
}

/// Reads images from plain paths or `file://` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageFetcher;

impl ImageFetcher for FileImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, AppResult<ImageInfo>> {
        Box::pin(async move {
            let path = local_path(url);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|err| AppError::fetch(url, err))?;
            sniff_dimensions(url, &bytes)
        })
    }
}

/// Routes `http(s)://` to HTTP and everything else to the file system.
pub struct AnyImageFetcher {
    http: HttpImageFetcher,
    file: FileImageFetcher,
}

impl AnyImageFetcher {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http: HttpImageFetcher::new(timeout)?,
            file: FileImageFetcher,
        })
    }
}

impl ImageFetcher for AnyImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, AppResult<ImageInfo>> {
        if is_http(url) {
            self.http.fetch(url)
        } else {
            self.file.fetch(url)
        }
    }
}

pub(crate) fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

pub(crate) fn local_path(url: &str) -> PathBuf {
    PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
}

fn sniff_dimensions(url: &str, bytes: &[u8]) -> AppResult<ImageInfo> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| AppError::fetch(url, err))?
        .into_dimensions()
        .map_err(|err| AppError::fetch(url, err))?;
    Ok(ImageInfo { width, height })
}
