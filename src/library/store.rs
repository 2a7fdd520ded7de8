use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

use super::model::{
    Category, CategoryId, DocumentId, DocumentRecord, DocumentUpdate, LibrarySnapshot, NewDocument,
};

pub const LIBRARY_FILE_NAME: &str = "library.json";

/// Document and category store. Every mutation is visible to subscribers.
pub trait LibraryBackend: Send + Sync {
    fn snapshot(&self) -> LibrarySnapshot;
    fn subscribe(&self) -> watch::Receiver<LibrarySnapshot>;

    fn create_category(&self, name: &str) -> AppResult<CategoryId>;
    fn rename_category(&self, id: &CategoryId, name: &str) -> AppResult<()>;
    fn delete_category(&self, id: &CategoryId) -> AppResult<()>;
    fn reorder_categories(&self, ordered: &[CategoryId]) -> AppResult<()>;
    fn toggle_category_active(&self, id: &CategoryId) -> AppResult<bool>;

    fn create_document(&self, document: NewDocument) -> AppResult<DocumentId>;
    fn update_document(&self, id: &DocumentId, update: DocumentUpdate) -> AppResult<()>;
    fn delete_document(&self, id: &DocumentId) -> AppResult<()>;
    fn reorder_documents(&self, category: &CategoryId, ordered: &[DocumentId]) -> AppResult<()>;
    fn toggle_document_active(&self, id: &DocumentId) -> AppResult<bool>;

    fn list_categories(&self) -> Vec<Category> {
        self.snapshot()
            .sorted_categories()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every document, active or not, grouped by category order.
    fn list_documents(&self) -> Vec<DocumentRecord> {
        let snapshot = self.snapshot();
        let mut documents = Vec::with_capacity(snapshot.documents.len());
        for category in snapshot.sorted_categories() {
            documents.extend(snapshot.documents_in(&category.id).into_iter().cloned());
        }
        documents
    }

    fn list_active_documents(&self) -> Vec<DocumentRecord> {
        let snapshot = self.snapshot();
        let mut documents = Vec::new();
        for category in snapshot.sorted_categories() {
            if !category.active {
                continue;
            }
            documents.extend(
                snapshot
                    .documents_in(&category.id)
                    .into_iter()
                    .filter(|document| document.active)
                    .cloned(),
            );
        }
        documents
    }
}

/// Library kept in one JSON file, rewritten whole on every mutation.
pub struct FileLibrary {
    path: Option<PathBuf>,
    state: watch::Sender<LibrarySnapshot>,
    writer: Mutex<()>,
}

impl FileLibrary {
    /// Opens `<root>/library.json`, starting empty when it does not exist yet.
    pub fn open(root: impl AsRef<Path>) -> AppResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|source| {
            AppError::io_with_context(source, format!("failed to create {}", root.display()))
        })?;
        let path = root.join(LIBRARY_FILE_NAME);
        let snapshot = if path.exists() {
            let bytes = fs::read(&path).map_err(|source| {
                AppError::io_with_context(source, format!("failed to read {}", path.display()))
            })?;
            serde_json::from_slice(&bytes).map_err(|err| {
                AppError::io_with_context(err.into(), format!("failed to parse {}", path.display()))
            })?
        } else {
            LibrarySnapshot::default()
        };
        debug!(
            path = %path.display(),
            categories = snapshot.categories.len(),
            documents = snapshot.documents.len(),
            "library opened"
        );
        Ok(Self::with_snapshot(Some(path), snapshot))
    }

    /// Library that is never written to disk.
    pub fn in_memory() -> Self {
        Self::with_snapshot(None, LibrarySnapshot::default())
    }

    fn with_snapshot(path: Option<PathBuf>, snapshot: LibrarySnapshot) -> Self {
        let (state, _) = watch::channel(snapshot);
        Self {
            path,
            state,
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Applies `change` to a copy, persists it, then publishes it.
    /// A failing change or write leaves the library untouched.
    fn mutate<T>(&self, change: impl FnOnce(&mut LibrarySnapshot) -> AppResult<T>) -> AppResult<T> {
        let _writer = lock(&self.writer);
        let mut next = self.state.borrow().clone();
        let output = change(&mut next)?;
        self.persist(&next)?;
        self.state.send_replace(next);
        Ok(output)
    }

    fn persist(&self, snapshot: &LibrarySnapshot) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| AppError::io_with_context(err.into(), "failed to encode library"))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, bytes).map_err(|source| {
            AppError::io_with_context(source, format!("failed to write {}", staging.display()))
        })?;
        fs::rename(&staging, path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to replace {}", path.display()))
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clean_name(name: &str, what: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid_argument(format!("{what} must not be empty")));
    }
    Ok(name.to_string())
}

fn category_mut<'a>(
    snapshot: &'a mut LibrarySnapshot,
    id: &CategoryId,
) -> AppResult<&'a mut Category> {
    snapshot
        .categories
        .iter_mut()
        .find(|category| &category.id == id)
        .ok_or_else(|| AppError::not_found(format!("category {id}")))
}

fn document_mut<'a>(
    snapshot: &'a mut LibrarySnapshot,
    id: &DocumentId,
) -> AppResult<&'a mut DocumentRecord> {
    snapshot
        .documents
        .iter_mut()
        .find(|document| &document.id == id)
        .ok_or_else(|| AppError::not_found(format!("document {id}")))
}

fn renumber_categories(snapshot: &mut LibrarySnapshot) {
    snapshot.categories.sort_by_key(|category| category.position);
    for (position, category) in snapshot.categories.iter_mut().enumerate() {
        category.position = position;
    }
}

fn renumber_documents(snapshot: &mut LibrarySnapshot, category: &CategoryId) {
    let mut members: Vec<_> = snapshot
        .documents
        .iter_mut()
        .filter(|document| &document.category_id == category)
        .collect();
    members.sort_by_key(|document| document.position);
    for (position, document) in members.into_iter().enumerate() {
        document.position = position;
    }
}

/// `ordered` must name every existing id exactly once.
fn check_permutation<T: PartialEq>(existing: &[&T], ordered: &[T]) -> AppResult<()> {
    let complete = ordered.len() == existing.len()
        && existing.iter().all(|id| ordered.contains(*id))
        && ordered
            .iter()
            .enumerate()
            .all(|(index, id)| !ordered[..index].contains(id));
    if complete {
        Ok(())
    } else {
        Err(AppError::invalid_argument(
            "reorder must list every item exactly once",
        ))
    }
}

impl LibraryBackend for FileLibrary {
    fn snapshot(&self) -> LibrarySnapshot {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<LibrarySnapshot> {
        self.state.subscribe()
    }

    fn create_category(&self, name: &str) -> AppResult<CategoryId> {
        let name = clean_name(name, "category name")?;
        let id = self.mutate(|snapshot| {
            let id = CategoryId::generate();
            snapshot.categories.push(Category {
                id: id.clone(),
                name,
                position: snapshot.categories.len(),
                active: true,
            });
            Ok(id)
        })?;
        info!(category = %id, "category created");
        Ok(id)
    }

    fn rename_category(&self, id: &CategoryId, name: &str) -> AppResult<()> {
        let name = clean_name(name, "category name")?;
        self.mutate(|snapshot| {
            category_mut(snapshot, id)?.name = name;
            Ok(())
        })
    }

    fn delete_category(&self, id: &CategoryId) -> AppResult<()> {
        self.mutate(|snapshot| {
            category_mut(snapshot, id)?;
            let members = snapshot
                .documents
                .iter()
                .filter(|document| &document.category_id == id)
                .count();
            if members > 0 {
                return Err(AppError::invalid_argument(format!(
                    "category {id} still holds {members} documents"
                )));
            }
            snapshot.categories.retain(|category| &category.id != id);
            renumber_categories(snapshot);
            Ok(())
        })?;
        info!(category = %id, "category deleted");
        Ok(())
    }

    fn reorder_categories(&self, ordered: &[CategoryId]) -> AppResult<()> {
        self.mutate(|snapshot| {
            let existing: Vec<_> = snapshot.categories.iter().map(|category| &category.id).collect();
            check_permutation(&existing, ordered)?;
            for category in &mut snapshot.categories {
                category.position = ordered
                    .iter()
                    .position(|id| id == &category.id)
                    .unwrap_or(category.position);
            }
            renumber_categories(snapshot);
            Ok(())
        })
    }

    fn toggle_category_active(&self, id: &CategoryId) -> AppResult<bool> {
        self.mutate(|snapshot| {
            let category = category_mut(snapshot, id)?;
            category.active = !category.active;
            Ok(category.active)
        })
    }

    fn create_document(&self, document: NewDocument) -> AppResult<DocumentId> {
        let title = clean_name(&document.title, "document title")?;
        let id = self.mutate(|snapshot| {
            if snapshot.category(&document.category_id).is_none() {
                return Err(AppError::missing_prerequisite(format!(
                    "category {} does not exist",
                    document.category_id
                )));
            }
            let id = DocumentId::generate();
            let position = snapshot.documents_in(&document.category_id).len();
            snapshot.documents.push(DocumentRecord {
                id: id.clone(),
                title,
                category_id: document.category_id,
                date: document.date.unwrap_or_else(Utc::now),
                file_storage_id: document.file_storage_id,
                page_images: document.page_images,
                active: true,
                position,
            });
            Ok(id)
        })?;
        info!(document = %id, "document created");
        Ok(id)
    }

    fn update_document(&self, id: &DocumentId, update: DocumentUpdate) -> AppResult<()> {
        let title = update
            .title
            .as_deref()
            .map(|title| clean_name(title, "document title"))
            .transpose()?;
        self.mutate(|snapshot| {
            if let Some(category) = &update.category_id
                && snapshot.category(category).is_none()
            {
                return Err(AppError::missing_prerequisite(format!(
                    "category {category} does not exist"
                )));
            }
            let next_position = update
                .category_id
                .as_ref()
                .map(|category| snapshot.documents_in(category).len());

            let document = document_mut(snapshot, id)?;
            let previous_category = document.category_id.clone();
            if let Some(title) = title {
                document.title = title;
            }
            if let Some(page_images) = update.page_images {
                document.page_images = page_images;
            }
            if let (Some(category), Some(position)) = (update.category_id, next_position)
                && category != previous_category
            {
                document.category_id = category;
                document.position = position;
                renumber_documents(snapshot, &previous_category);
            }
            Ok(())
        })
    }

    fn delete_document(&self, id: &DocumentId) -> AppResult<()> {
        self.mutate(|snapshot| {
            let category = document_mut(snapshot, id)?.category_id.clone();
            snapshot.documents.retain(|document| &document.id != id);
            renumber_documents(snapshot, &category);
            Ok(())
        })?;
        info!(document = %id, "document deleted");
        Ok(())
    }

    fn reorder_documents(&self, category: &CategoryId, ordered: &[DocumentId]) -> AppResult<()> {
        self.mutate(|snapshot| {
            let existing: Vec<_> = snapshot
                .documents_in(category)
                .into_iter()
                .map(|document| &document.id)
                .collect();
            check_permutation(&existing, ordered)?;
            for document in &mut snapshot.documents {
                if &document.category_id != category {
                    continue;
                }
                if let Some(position) = ordered.iter().position(|id| id == &document.id) {
                    document.position = position;
                }
            }
            Ok(())
        })
    }

    fn toggle_document_active(&self, id: &DocumentId) -> AppResult<bool> {
        self.mutate(|snapshot| {
            let document = document_mut(snapshot, id)?;
            document.active = !document.active;
            Ok(document.active)
        })
    }
}
