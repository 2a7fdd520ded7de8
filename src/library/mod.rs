mod admin;
mod model;
mod sidebar;
mod store;

pub use admin::{Admin, AdminRow};
pub use model::{
    Category, CategoryId, DocumentId, DocumentRecord, DocumentRef, DocumentUpdate,
    LibrarySnapshot, NewDocument, SourceLocator, StorageId,
};
pub use sidebar::{Sidebar, SidebarSection, document_ref};
pub use store::{FileLibrary, LIBRARY_FILE_NAME, LibraryBackend};
