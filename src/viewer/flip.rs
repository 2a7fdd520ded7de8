use crate::layout::LayoutState;

/// Reported by the flip widget once a page turn has finished animating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipEvent {
    /// 0-based index of the page now showing.
    pub page: usize,
}

/// Page-turn animation widget. Completion is reported asynchronously as a
/// [`FlipEvent`]; the viewer never assumes a flip finished until then.
pub trait PageFlipWidget {
    /// Layout or page count changed for the document already loaded.
    fn configure(&mut self, layout: LayoutState, page_count: usize);
    /// A different document was loaded: back to the first page, no event.
    fn reset(&mut self, layout: LayoutState, page_count: usize);
    fn flip_next(&mut self);
    fn flip_prev(&mut self);
    fn turn_to(&mut self, page: usize);
}

/// Widget without animation: every flip completes at once and its event is
/// sent on a flume channel for the host to forward to the viewer.
pub struct HeadlessFlipWidget {
    events: flume::Sender<FlipEvent>,
    page: usize,
    page_count: usize,
    step: usize,
}

impl HeadlessFlipWidget {
    pub fn channel() -> (Self, flume::Receiver<FlipEvent>) {
        let (events, receiver) = flume::unbounded();
        (
            Self {
                events,
                page: 0,
                page_count: 0,
                step: 1,
            },
            receiver,
        )
    }

    fn complete(&mut self, page: usize) {
        if self.page_count == 0 {
            return;
        }
        let page = page.min(self.page_count - 1);
        if page == self.page {
            return;
        }
        self.page = page;
        // The receiver may be gone while the host shuts down.
        let _ = self.events.send(FlipEvent { page });
    }
}

impl PageFlipWidget for HeadlessFlipWidget {
    fn configure(&mut self, layout: LayoutState, page_count: usize) {
        self.step = layout.view_mode.pages_per_spread();
        if page_count != self.page_count {
            self.page = 0;
        }
        self.page_count = page_count;
    }

    fn reset(&mut self, layout: LayoutState, page_count: usize) {
        self.page = 0;
        self.step = layout.view_mode.pages_per_spread();
        self.page_count = page_count;
    }

    fn flip_next(&mut self) {
        self.complete(self.page.saturating_add(self.step));
    }

    fn flip_prev(&mut self) {
        self.complete(self.page.saturating_sub(self.step));
    }

    fn turn_to(&mut self, page: usize) {
        self.complete(page);
    }
}
