use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};
use tracing::{info, warn};

use crate::backend::{PdfDoc, RgbaFrame};
use crate::config::UploadConfig;
use crate::error::{AppError, AppResult, UploadStep};
use crate::library::{CategoryId, DocumentId, LibraryBackend, NewDocument, StorageId};

use super::storage::{PDF_CONTENT_TYPE, PNG_CONTENT_TYPE, StorageClient};

/// Rasterized pages waiting for upload. Keeps the renderer a little ahead.
const PAGE_BUFFER: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub title: String,
    pub category_id: CategoryId,
    pub source: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadProgress {
    PdfStored { total_pages: usize },
    /// `page` is 1-based. `stored` is false when the page could not be rasterized.
    PageProcessed { page: usize, total_pages: usize, stored: bool },
    Saved { document: DocumentId },
}

/// Converts a PDF into stored page images and a document record.
pub struct Uploader {
    library: Arc<dyn LibraryBackend>,
    storage: Arc<dyn StorageClient>,
    render_scale: f32,
}

impl Uploader {
    pub fn new(
        library: Arc<dyn LibraryBackend>,
        storage: Arc<dyn StorageClient>,
        config: &UploadConfig,
    ) -> Self {
        Self {
            library,
            storage,
            render_scale: config.render_scale,
        }
    }

    /// Runs the whole upload. The first failing step abandons it; blobs
    /// already stored are left behind and no record is created.
    pub async fn upload_pdf(
        &self,
        request: UploadRequest,
        progress: Option<flume::Sender<UploadProgress>>,
    ) -> AppResult<DocumentId> {
        self.check_prerequisites(&request)?;
        let report = |event: UploadProgress| {
            if let Some(progress) = &progress {
                let _ = progress.send(event);
            }
        };

        let bytes = tokio::fs::read(&request.source).await.map_err(|source| {
            AppError::io_with_context(source, format!("failed to read {}", request.source.display()))
        })?;
        let bytes = Arc::new(bytes);
        let label = request.source.clone();
        let shared = Arc::clone(&bytes);
        let doc = tokio::task::spawn_blocking(move || PdfDoc::open_with_shared_bytes(label, shared))
            .await
            .map_err(|err| AppError::pdf_decode(format!("decode task failed: {err}")))??;
        let total_pages = doc.page_count();

        let file_storage_id = self
            .store(PDF_CONTENT_TYPE, bytes.to_vec())
            .await
            .map_err(|err| AppError::storage(UploadStep::PdfUpload, err))?;
        report(UploadProgress::PdfStored { total_pages });

        let pages = rasterize_pages(doc, self.render_scale);
        let mut page_images = Vec::with_capacity(total_pages);
        while let Ok((index, png)) = pages.recv_async().await {
            let page = index + 1;
            let stored = match png {
                Ok(png) => {
                    let id = self
                        .store(PNG_CONTENT_TYPE, png)
                        .await
                        .map_err(|err| AppError::storage(UploadStep::PageUpload { page }, err))?;
                    Some(id)
                }
                Err(err) => {
                    warn!(page, error = %err, "page rasterization failed; storing without image");
                    None
                }
            };
            report(UploadProgress::PageProcessed {
                page,
                total_pages,
                stored: stored.is_some(),
            });
            page_images.push(stored);
        }

        let document = self
            .library
            .create_document(NewDocument {
                title: request.title.trim().to_string(),
                category_id: request.category_id,
                file_storage_id,
                page_images,
                date: None,
            })
            .map_err(|err| AppError::storage(UploadStep::MetadataSave, err))?;
        info!(document = %document, pages = total_pages, "upload complete");
        report(UploadProgress::Saved {
            document: document.clone(),
        });
        Ok(document)
    }

    fn check_prerequisites(&self, request: &UploadRequest) -> AppResult<()> {
        let snapshot = self.library.snapshot();
        if snapshot.categories.is_empty() {
            return Err(AppError::missing_prerequisite(
                "create a category before uploading",
            ));
        }
        if snapshot.category(&request.category_id).is_none() {
            return Err(AppError::missing_prerequisite(format!(
                "category {} does not exist",
                request.category_id
            )));
        }
        if request.title.trim().is_empty() {
            return Err(AppError::invalid_argument("document title must not be empty"));
        }
        if request.source.as_os_str().is_empty() || !request.source.is_file() {
            return Err(AppError::missing_prerequisite(format!(
                "no document file at {}",
                request.source.display()
            )));
        }
        Ok(())
    }

    async fn store(&self, content_type: &str, bytes: Vec<u8>) -> AppResult<StorageId> {
        let url = self.storage.generate_upload_url().await?;
        self.storage.upload(&url, content_type, bytes).await
    }
}

/// Renders every page to PNG on a blocking thread. The thread stops once the
/// receiver is dropped.
fn rasterize_pages(doc: PdfDoc, scale: f32) -> flume::Receiver<(usize, AppResult<Vec<u8>>)> {
    let (sender, receiver) = flume::bounded(PAGE_BUFFER);
    tokio::task::spawn_blocking(move || {
        for page in 0..doc.page_count() {
            let png = doc
                .render_page(page, scale)
                .and_then(|frame| encode_png(page, frame));
            if sender.send((page, png)).is_err() {
                return;
            }
        }
    });
    receiver
}

fn encode_png(page: usize, frame: RgbaFrame) -> AppResult<Vec<u8>> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.pixels.to_vec())
        .ok_or_else(|| {
            AppError::pdf_render(page, AppError::invalid_argument("frame size does not match pixels"))
        })?;
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|err| AppError::pdf_render(page, err))?;
    Ok(png.into_inner())
}
