use std::collections::BTreeSet;

use super::zoom::ZoomState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerPhase {
    Idle,
    Loading,
    Ready,
    /// Source could not be fetched; a placeholder sheet stands in for the pages.
    Unavailable,
    /// Decode failure, shown in place of the pages until the document changes.
    Failed(String),
}

impl ViewerPhase {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageImageState {
    Pending,
    Loaded,
    /// No image yet (not generated) or the fetch failed; a placeholder is shown.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSession {
    /// 1-based.
    pub current_page: usize,
    pub total_pages: usize,
    pub zoom: ZoomState,
    /// 0-based indices of pages with a usable image or raster.
    pub loaded_pages: BTreeSet<usize>,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 0,
            zoom: ZoomState::default(),
            loaded_pages: BTreeSet::new(),
        }
    }
}

impl ViewerSession {
    pub fn with_total_pages(total_pages: usize) -> Self {
        Self {
            total_pages,
            ..Self::default()
        }
    }

    pub fn cursor(&self) -> usize {
        self.current_page.saturating_sub(1)
    }

    pub fn clamp_page(&self, page: usize) -> usize {
        page.clamp(1, self.total_pages.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewerPhase, ViewerSession};

    #[test]
    fn session_pages_are_one_based() {
        let session = ViewerSession::with_total_pages(12);
        assert_eq!(session.current_page, 1);
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.clamp_page(0), 1);
        assert_eq!(session.clamp_page(40), 12);
        assert_eq!(ViewerSession::default().clamp_page(3), 1);
        assert!(session.loaded_pages.is_empty());
    }

    #[test]
    fn only_ready_is_ready() {
        assert!(ViewerPhase::Ready.is_ready());
        assert!(!ViewerPhase::Loading.is_ready());
        assert!(!ViewerPhase::Failed("bad xref".to_string()).is_ready());
        assert!(!ViewerPhase::Unavailable.is_ready());
    }
}
