mod pipeline;
mod storage;

pub use pipeline::{UploadProgress, UploadRequest, Uploader};
pub use storage::{
    HttpStorage, LocalStorage, PDF_CONTENT_TYPE, PNG_CONTENT_TYPE, StorageClient,
};
