use std::fmt;

pub type AppResult<T> = Result<T, AppError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Step of an upload that failed, reported to the user verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    PdfUpload,
    PageUpload { page: usize },
    MetadataSave,
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PdfUpload => f.write_str("PDF upload"),
            Self::PageUpload { page } => write!(f, "upload of page {page}"),
            Self::MetadataSave => f.write_str("document metadata save"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: BoxedSource,
    },
    #[error("failed to decode document: {0}")]
    PdfDecode(String),
    #[error("PDF render failed for page {page}")]
    PdfRender {
        page: usize,
        #[source]
        source: BoxedSource,
    },
    #[error("{step} failed")]
    Storage {
        step: UploadStep,
        #[source]
        source: BoxedSource,
    },
    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<std::io::Error> for AppError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            context: "I/O operation failed".to_string(),
        }
    }
}

impl AppError {
    pub fn io_with_context(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::Fetch {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn pdf_decode(message: impl Into<String>) -> Self {
        Self::PdfDecode(message.into())
    }

    pub fn pdf_render(page: usize, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::PdfRender {
            page,
            source: Box::new(source),
        }
    }

    pub fn storage(step: UploadStep, source: impl Into<BoxedSource>) -> Self {
        Self::Storage {
            step,
            source: source.into(),
        }
    }

    pub fn missing_prerequisite(message: impl Into<String>) -> Self {
        Self::MissingPrerequisite(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Failing upload step, if this error came out of the upload pipeline.
    pub fn upload_step(&self) -> Option<UploadStep> {
        match self {
            Self::Storage { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, UploadStep};

    #[test]
    fn pdf_render_error_wraps_page_and_source() {
        let err = AppError::pdf_render(7, AppError::invalid_argument("bad page"));
        assert!(matches!(err, AppError::PdfRender { page: 7, .. }));
        assert_eq!(err.to_string(), "PDF render failed for page 7");
    }

    #[test]
    fn storage_error_names_the_failing_step() {
        let err = AppError::storage(
            UploadStep::PageUpload { page: 3 },
            AppError::invalid_argument("connection refused"),
        );
        assert_eq!(err.to_string(), "upload of page 3 failed");
        assert_eq!(err.upload_step(), Some(UploadStep::PageUpload { page: 3 }));
        assert_eq!(AppError::not_found("doc").upload_step(), None);
    }

    #[test]
    fn fetch_error_accepts_string_sources() {
        let err = AppError::fetch("https://cdn/p1.png", "status 404");
        assert_eq!(err.to_string(), "failed to fetch https://cdn/p1.png");
    }
}
