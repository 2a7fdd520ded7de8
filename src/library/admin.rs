use std::sync::Arc;

use crate::error::{AppError, AppResult};

use super::model::{Category, CategoryId, DocumentId, DocumentRecord};
use super::store::LibraryBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRow {
    pub document: DocumentRecord,
    pub category_name: String,
}

/// Content management over the whole library, inactive entries included.
pub struct Admin {
    library: Arc<dyn LibraryBackend>,
}

impl Admin {
    pub fn new(library: Arc<dyn LibraryBackend>) -> Self {
        Self { library }
    }

    pub fn categories(&self) -> Vec<Category> {
        self.library.list_categories()
    }

    pub fn documents(&self) -> Vec<AdminRow> {
        let categories = self.library.list_categories();
        self.library
            .list_documents()
            .into_iter()
            .map(|document| AdminRow {
                category_name: categories
                    .iter()
                    .find(|category| category.id == document.category_id)
                    .map(|category| category.name.clone())
                    .unwrap_or_default(),
                document,
            })
            .collect()
    }

    /// Uploading needs somewhere to put the document.
    pub fn ensure_can_upload(&self) -> AppResult<()> {
        if self.library.snapshot().categories.is_empty() {
            return Err(AppError::missing_prerequisite(
                "create a category before uploading",
            ));
        }
        Ok(())
    }

    pub fn add_category(&self, name: &str) -> AppResult<CategoryId> {
        self.library.create_category(name)
    }

    pub fn rename_category(&self, id: &CategoryId, name: &str) -> AppResult<()> {
        self.library.rename_category(id, name)
    }

    pub fn remove_category(&self, id: &CategoryId) -> AppResult<()> {
        self.library.delete_category(id)
    }

    pub fn toggle_category(&self, id: &CategoryId) -> AppResult<bool> {
        self.library.toggle_category_active(id)
    }

    /// Moves a category to `position`, clamped to the end of the list.
    pub fn move_category(&self, id: &CategoryId, position: usize) -> AppResult<()> {
        let ids: Vec<_> = self
            .library
            .list_categories()
            .into_iter()
            .map(|category| category.id)
            .collect();
        let ordered = moved(ids, id, position)
            .ok_or_else(|| AppError::not_found(format!("category {id}")))?;
        self.library.reorder_categories(&ordered)
    }

    pub fn remove_document(&self, id: &DocumentId) -> AppResult<()> {
        self.library.delete_document(id)
    }

    pub fn toggle_document(&self, id: &DocumentId) -> AppResult<bool> {
        self.library.toggle_document_active(id)
    }

    /// Moves a document within its category.
    pub fn move_document(&self, id: &DocumentId, position: usize) -> AppResult<()> {
        let snapshot = self.library.snapshot();
        let category = snapshot
            .document(id)
            .map(|document| document.category_id.clone())
            .ok_or_else(|| AppError::not_found(format!("document {id}")))?;
        let ids: Vec<_> = snapshot
            .documents_in(&category)
            .into_iter()
            .map(|document| document.id.clone())
            .collect();
        let ordered = moved(ids, id, position)
            .ok_or_else(|| AppError::not_found(format!("document {id}")))?;
        self.library.reorder_documents(&category, &ordered)
    }
}

fn moved<T: PartialEq>(mut ids: Vec<T>, id: &T, position: usize) -> Option<Vec<T>> {
    let from = ids.iter().position(|candidate| candidate == id)?;
    let item = ids.remove(from);
    ids.insert(position.min(ids.len()), item);
    Some(ids)
}
