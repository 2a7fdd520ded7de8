use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{AppError, AppResult};
use crate::upload::StorageClient;

use super::model::{
    Category, DocumentId, DocumentRecord, DocumentRef, LibrarySnapshot, SourceLocator,
};
use super::store::LibraryBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarSection {
    pub category: Category,
    pub documents: Vec<DocumentRecord>,
}

/// Live, filterable list of active documents grouped by category.
pub struct Sidebar {
    updates: watch::Receiver<LibrarySnapshot>,
    storage: Arc<dyn StorageClient>,
    filter: String,
    selected: Option<DocumentId>,
}

impl Sidebar {
    pub fn new(library: &dyn LibraryBackend, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            updates: library.subscribe(),
            storage,
            filter: String::new(),
            selected: None,
        }
    }

    /// Case-insensitive title filter. Empty shows everything.
    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.trim().to_lowercase();
    }

    pub fn selected(&self) -> Option<&DocumentId> {
        self.selected.as_ref()
    }

    /// Waits for the next library change. `false` once the library is gone.
    pub async fn changed(&mut self) -> bool {
        self.updates.changed().await.is_ok()
    }

    pub fn sections(&self) -> Vec<SidebarSection> {
        let snapshot = self.updates.borrow();
        snapshot
            .sorted_categories()
            .into_iter()
            .filter(|category| category.active)
            .filter_map(|category| {
                let documents: Vec<_> = snapshot
                    .documents_in(&category.id)
                    .into_iter()
                    .filter(|document| document.active && self.matches(document))
                    .cloned()
                    .collect();
                // Empty categories stay visible unless a search hides them.
                (self.filter.is_empty() || !documents.is_empty()).then(|| SidebarSection {
                    category: category.clone(),
                    documents,
                })
            })
            .collect()
    }

    pub fn select(&mut self, id: &DocumentId) -> AppResult<DocumentRef> {
        let document = {
            let snapshot = self.updates.borrow();
            let record = snapshot
                .document(id)
                .ok_or_else(|| AppError::not_found(format!("document {id}")))?;
            document_ref(record, &snapshot, self.storage.as_ref())?
        };
        self.selected = Some(id.clone());
        Ok(document)
    }

    fn matches(&self, document: &DocumentRecord) -> bool {
        self.filter.is_empty() || document.title.to_lowercase().contains(&self.filter)
    }
}

/// Resolves a stored record into what the viewer needs.
pub fn document_ref(
    record: &DocumentRecord,
    snapshot: &LibrarySnapshot,
    storage: &dyn StorageClient,
) -> AppResult<DocumentRef> {
    if record.file_storage_id.as_str().is_empty() {
        return Err(AppError::missing_prerequisite(format!(
            "document {} has no file",
            record.id
        )));
    }
    let page_image_urls = (!record.page_images.is_empty()).then(|| {
        record
            .page_images
            .iter()
            .map(|image| image.as_ref().map(|id| storage.url_for(id)))
            .collect()
    });
    Ok(DocumentRef {
        id: record.id.clone(),
        title: record.title.clone(),
        category: snapshot
            .category(&record.category_id)
            .map(|category| category.name.clone())
            .unwrap_or_default(),
        date: record.date,
        source: SourceLocator::Url(storage.url_for(&record.file_storage_id)),
        page_image_urls,
    })
}
