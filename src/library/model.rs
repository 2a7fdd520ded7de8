use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(DocumentId);
string_id!(CategoryId);
string_id!(
    /// Handle for one stored blob (a source PDF or a page image).
    StorageId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub position: usize,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub title: String,
    pub category_id: CategoryId,
    pub date: DateTime<Utc>,
    pub file_storage_id: StorageId,
    /// `None` for pages whose image was never stored.
    #[serde(default)]
    pub page_images: Vec<Option<StorageId>>,
    pub active: bool,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub category_id: CategoryId,
    pub file_storage_id: StorageId,
    pub page_images: Vec<Option<StorageId>>,
    pub date: Option<DateTime<Utc>>,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub category_id: Option<CategoryId>,
    pub page_images: Option<Vec<Option<StorageId>>>,
}

/// Everything the library holds. Also the on-disk format of `library.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,
}

impl LibrarySnapshot {
    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|category| &category.id == id)
    }

    pub fn document(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.documents.iter().find(|document| &document.id == id)
    }

    /// Categories in display order.
    pub fn sorted_categories(&self) -> Vec<&Category> {
        let mut categories: Vec<_> = self.categories.iter().collect();
        categories.sort_by_key(|category| category.position);
        categories
    }

    /// Documents of one category in display order.
    pub fn documents_in(&self, category: &CategoryId) -> Vec<&DocumentRecord> {
        let mut documents: Vec<_> = self
            .documents
            .iter()
            .filter(|document| &document.category_id == category)
            .collect();
        documents.sort_by_key(|document| document.position);
        documents
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocator {
    Url(String),
    LocalFile(PathBuf),
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::LocalFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// What the viewer is handed when a document is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: DocumentId,
    pub title: String,
    pub category: String,
    pub date: DateTime<Utc>,
    pub source: SourceLocator,
    /// Pre-rendered page images; `None` entries have no image yet.
    pub page_image_urls: Option<Vec<Option<String>>>,
}

impl DocumentRef {
    /// A raw file with no stored record, viewed directly.
    pub fn local_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: DocumentId::from(path.display().to_string()),
            title,
            category: String::new(),
            date: Utc::now(),
            source: SourceLocator::LocalFile(path),
            page_image_urls: None,
        }
    }

    /// Present only when at least one page image exists.
    pub fn usable_page_images(&self) -> Option<&[Option<String>]> {
        self.page_image_urls
            .as_deref()
            .filter(|urls| urls.iter().any(Option::is_some))
    }
}
