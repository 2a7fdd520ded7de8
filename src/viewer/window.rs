use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSlot {
    /// Pre-rendered page image.
    Image { url: String },
    /// Raw-document page handed to the rasterizer.
    Render,
    Placeholder,
}

/// Pages within `radius` of the cursor, clipped to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderWindow {
    first: usize,
    last: usize,
    empty: bool,
}

impl RenderWindow {
    pub fn around(cursor: usize, total_pages: usize, radius: usize) -> Self {
        if total_pages == 0 {
            return Self {
                first: 0,
                last: 0,
                empty: true,
            };
        }
        let cursor = cursor.min(total_pages - 1);
        Self {
            first: cursor.saturating_sub(radius),
            last: cursor.saturating_add(radius).min(total_pages - 1),
            empty: false,
        }
    }

    pub fn contains(&self, page: usize) -> bool {
        !self.empty && (self.first..=self.last).contains(&page)
    }

    pub fn len(&self) -> usize {
        if self.empty { 0 } else { self.last - self.first + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn pages(&self) -> RangeInclusive<usize> {
        if self.empty {
            // Empty inclusive range.
            1..=0
        } else {
            self.first..=self.last
        }
    }

    /// Share of the window already rendered, 0 to 100.
    pub fn progress_percent(&self, rendered: impl Fn(usize) -> bool) -> u8 {
        let expected = self.len();
        if expected == 0 {
            return 0;
        }
        let done = self.pages().filter(|page| rendered(*page)).count();
        ((done * 100) / expected) as u8
    }
}
