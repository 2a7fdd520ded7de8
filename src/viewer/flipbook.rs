use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use kurbo::Size;
use tracing::{debug, info, warn};

use crate::backend::{PdfBackend, RgbaFrame};
use crate::config::{Config, ViewerConfig};
use crate::layout::{LayoutCalculator, LayoutInput, LayoutState, sanitize_ratio};
use crate::library::{DocumentRef, SourceLocator};
use crate::error::AppError;
use crate::preload::{AbortFlag, ImagePreloader, PreloadStatus, TierPlan};
use crate::sound::FlipSound;

use super::cache::{RenderedPageCache, RenderedPageKey};
use super::flip::{FlipEvent, PageFlipWidget};
use super::gesture::{PointerKind, TapDetector, WheelAction, WheelNavigator};
use super::source::DocumentLoader;
use super::state::{PageImageState, ViewerPhase, ViewerSession};
use super::window::{PageSlot, RenderWindow};

type SharedPdf = Arc<Mutex<Box<dyn PdfBackend>>>;

/// Collaborators handed to a viewer by its host.
pub struct ViewerDeps {
    pub preloader: Arc<ImagePreloader>,
    pub loader: Arc<dyn DocumentLoader>,
    pub flip: Box<dyn PageFlipWidget>,
    pub sound: Box<dyn FlipSound>,
    pub on_close: Box<dyn FnMut()>,
}

struct RawDocument {
    pdf: SharedPdf,
    doc_id: u64,
}

/// Presents one document at a time.
///
/// The current page only changes through [`FlipbookViewer::on_flip_complete`];
/// navigation asks the flip widget to animate and waits for its event.
pub struct FlipbookViewer {
    settings: ViewerConfig,
    breakpoint_px: u32,
    calculator: LayoutCalculator,
    deps: ViewerDeps,
    document: Option<DocumentRef>,
    phase: ViewerPhase,
    session: ViewerSession,
    ratio: f64,
    container: Size,
    viewport_width: f64,
    layout: LayoutState,
    taps: TapDetector,
    wheel: WheelNavigator,
    page_states: Vec<PageImageState>,
    raw: Option<RawDocument>,
    cache: RenderedPageCache,
    plan: Option<TierPlan>,
    abort: AbortFlag,
}

fn lock(pdf: &SharedPdf) -> MutexGuard<'_, Box<dyn PdfBackend>> {
    pdf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FlipbookViewer {
    pub fn new(config: &Config, deps: ViewerDeps) -> Self {
        let settings = config.viewer.clone();
        let calculator = LayoutCalculator::from(&config.layout);
        let ratio = sanitize_ratio(settings.default_ratio);
        let container = Size::new(800.0, 600.0);
        let viewport_width = container.width;
        let layout = calculator.calculate(&LayoutInput {
            container,
            viewport_width,
            intrinsic_ratio: ratio,
        });
        Self {
            taps: TapDetector::new(Duration::from_millis(settings.double_tap_ms)),
            wheel: WheelNavigator::new(
                Duration::from_millis(settings.wheel_debounce_ms),
                config.layout.breakpoint_px,
            ),
            // The whole render window must fit, or its edges evict each other.
            cache: RenderedPageCache::new(
                settings
                    .render_cache_entries
                    .max(settings.render_window.saturating_mul(2).saturating_add(1)),
            ),
            breakpoint_px: config.layout.breakpoint_px,
            settings,
            calculator,
            deps,
            document: None,
            phase: ViewerPhase::Idle,
            session: ViewerSession::default(),
            ratio,
            container,
            viewport_width,
            layout,
            page_states: Vec::new(),
            raw: None,
            plan: None,
            abort: AbortFlag::new(),
        }
    }

    pub fn phase(&self) -> &ViewerPhase {
        &self.phase
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn layout(&self) -> LayoutState {
        self.layout
    }

    pub fn document(&self) -> Option<&DocumentRef> {
        self.document.as_ref()
    }

    pub fn page_ratio(&self) -> f64 {
        self.ratio
    }

    pub fn page_state(&self, page: usize) -> Option<PageImageState> {
        self.page_states.get(page).copied()
    }

    /// Sheet size with zoom applied. Zoom never changes [`Self::layout`].
    pub fn display_size(&self) -> Size {
        self.layout.size() * f64::from(self.session.zoom.scale())
    }

    /// Tiers dispatched by the latest preload, image sets only.
    pub fn preload_plan(&self) -> Option<&TierPlan> {
        self.plan.as_ref()
    }

    pub(crate) fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Resets everything when `document` differs from the current one.
    /// Returns `false` for an identical reference.
    pub fn on_document_changed(&mut self, document: DocumentRef) -> bool {
        if self.document.as_ref() == Some(&document) {
            return false;
        }

        // In-flight preloads for the old document keep running into the shared cache.
        self.abort.raise();
        self.abort = AbortFlag::new();
        self.raw = None;
        self.plan = None;
        self.cache.clear();
        self.taps.reset();
        self.wheel.reset();
        self.ratio = sanitize_ratio(self.settings.default_ratio);

        let images = document.usable_page_images();
        let total_pages = images.map_or(0, <[_]>::len);
        self.page_states = images
            .unwrap_or_default()
            .iter()
            .map(|url| {
                if url.is_some() {
                    PageImageState::Pending
                } else {
                    PageImageState::Placeholder
                }
            })
            .collect();
        self.session = ViewerSession::with_total_pages(total_pages);
        self.phase = if images.is_some() {
            ViewerPhase::Ready
        } else {
            ViewerPhase::Loading
        };
        info!(
            document = %document.id,
            source = %document.source,
            pages = total_pages,
            "document changed"
        );
        self.document = Some(document);
        self.relayout();
        self.deps.flip.reset(self.layout, total_pages);
        true
    }

    /// Finishes bringing the current document up: ratio discovery and the
    /// first preload for image sets, decode and first renders for raw files.
    pub async fn load(&mut self) {
        let Some(document) = self.document.clone() else {
            return;
        };
        match document.usable_page_images() {
            Some(urls) => {
                self.discover_image_ratio(urls).await;
                self.preload_current().await;
            }
            None => self.open_raw(&document.source).await,
        }
    }

    async fn discover_image_ratio(&mut self, urls: &[Option<String>]) {
        let Some(first) = urls.iter().flatten().next() else {
            return;
        };
        match self.deps.preloader.load_info(first).await {
            Ok(info) => {
                if let Some(ratio) = info.ratio() {
                    self.set_ratio(ratio);
                }
            }
            Err(err) => debug!(url = %first, error = %err, "ratio probe failed; keeping default"),
        }
    }

    async fn open_raw(&mut self, source: &SourceLocator) {
        match self.deps.loader.open(source).await {
            Ok(pdf) => {
                let total_pages = pdf.page_count();
                let ratio = pdf.page_ratio(0).unwrap_or(self.settings.default_ratio);
                self.raw = Some(RawDocument {
                    doc_id: pdf.doc_id(),
                    pdf: Arc::new(Mutex::new(pdf)),
                });
                self.session = ViewerSession::with_total_pages(total_pages);
                self.phase = ViewerPhase::Ready;
                self.set_ratio(ratio);
                self.deps.flip.reset(self.layout, total_pages);
                self.render_visible_pages().await;
            }
            Err(err @ (AppError::Fetch { .. } | AppError::Io { .. })) => {
                warn!(source = %source, error = %err, "document source unreachable");
                self.phase = ViewerPhase::Unavailable;
            }
            Err(err) => {
                warn!(source = %source, error = %err, "document could not be decoded");
                self.phase = ViewerPhase::Failed(err.to_string());
            }
        }
    }

    fn set_ratio(&mut self, ratio: f64) {
        self.ratio = sanitize_ratio(ratio);
        if self.relayout() {
            self.deps.flip.configure(self.layout, self.session.total_pages);
        }
    }

    pub fn on_resize(&mut self, container: Size, viewport_width: f64) {
        self.container = container;
        self.viewport_width = viewport_width;
        if self.relayout() {
            self.deps.flip.configure(self.layout, self.session.total_pages);
        }
    }

    fn relayout(&mut self) -> bool {
        let layout = self.calculator.calculate(&LayoutInput {
            container: self.container,
            viewport_width: self.viewport_width,
            intrinsic_ratio: self.ratio,
        });
        let changed = layout != self.layout;
        self.layout = layout;
        changed
    }

    pub fn next(&mut self) {
        if self.phase.is_ready() {
            self.deps.flip.flip_next();
        }
    }

    pub fn prev(&mut self) {
        if self.phase.is_ready() {
            self.deps.flip.flip_prev();
        }
    }

    /// Jumps to a 1-based page, clamped to the document.
    pub fn turn_to(&mut self, page: usize) {
        if self.phase.is_ready() {
            let page = self.session.clamp_page(page);
            self.deps.flip.turn_to(page - 1);
        }
    }

    /// Applies a finished flip. Returns `false` for events that do not fit
    /// the current document.
    pub async fn on_flip_complete(&mut self, event: FlipEvent) -> bool {
        if !self.phase.is_ready() || event.page >= self.session.total_pages {
            debug!(page = event.page, "flip event ignored");
            return false;
        }
        self.session.current_page = event.page + 1;
        self.deps.sound.play_flip_sound();
        if self.raw.is_some() {
            self.render_visible_pages().await;
        } else {
            self.preload_current().await;
        }
        true
    }

    /// Dispatches the tiered preload for the current position. Returns the
    /// plan, or `None` when the document is not an image set.
    pub async fn preload_current(&mut self) -> Option<TierPlan> {
        if !self.phase.is_ready() {
            return None;
        }
        let urls = self.document.as_ref()?.usable_page_images()?.to_vec();
        let cursor = self.session.cursor();
        let spread = self.layout.view_mode.pages_per_spread();
        let plan = self
            .deps
            .preloader
            .preload_for_viewer(&urls, cursor, spread, &self.abort)
            .await;

        let on_screen = cursor..(cursor + spread).min(urls.len());
        for (page, url) in urls.iter().enumerate() {
            let Some(url) = url else {
                continue;
            };
            if self.deps.preloader.is_loaded(url) {
                self.page_states[page] = PageImageState::Loaded;
                self.session.loaded_pages.insert(page);
            } else if on_screen.contains(&page) || self.image_failed(url) {
                // On screen, the critical fetch settled without success.
                self.page_states[page] = PageImageState::Placeholder;
            }
        }
        self.plan = Some(plan.clone());
        Some(plan)
    }

    fn image_failed(&self, url: &str) -> bool {
        self.deps.preloader.status(url) == Some(PreloadStatus::Error)
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.session.zoom.zoom_in()
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.session.zoom.zoom_out()
    }

    pub fn reset_zoom(&mut self) -> f32 {
        self.session.zoom.reset()
    }

    /// Tap or click on the page. A double tap toggles zoom; returns whether it did.
    pub fn handle_click(&mut self, kind: PointerKind, at: Instant) -> bool {
        if !self.taps.register(kind, at) {
            return false;
        }
        self.session.zoom.toggle();
        true
    }

    pub fn handle_wheel(&mut self, delta_y: f64, at: Instant) -> WheelAction {
        if !self.phase.is_ready() {
            return WheelAction::Ignored;
        }
        let action = self.wheel.handle(self.viewport_width, delta_y, at);
        match action {
            WheelAction::Next => self.next(),
            WheelAction::Prev => self.prev(),
            WheelAction::Ignored | WheelAction::Suppressed => {}
        }
        action
    }

    fn render_window(&self) -> RenderWindow {
        RenderWindow::around(
            self.session.cursor(),
            self.session.total_pages,
            self.settings.render_window,
        )
    }

    fn render_key(&self, doc_id: u64, page: usize) -> RenderedPageKey {
        RenderedPageKey::new(doc_id, page, self.settings.render_scale)
    }

    pub fn page_slots(&self) -> Vec<PageSlot> {
        if self.phase == ViewerPhase::Unavailable {
            return vec![PageSlot::Placeholder];
        }
        if self.raw.is_some() {
            let window = self.render_window();
            return (0..self.session.total_pages)
                .map(|page| {
                    if window.contains(page) {
                        PageSlot::Render
                    } else {
                        PageSlot::Placeholder
                    }
                })
                .collect();
        }

        let Some(urls) = self.document.as_ref().and_then(DocumentRef::usable_page_images) else {
            return Vec::new();
        };
        urls.iter()
            .zip(&self.page_states)
            .map(|(url, state)| match url {
                // Background fetches settle after the last preload pass; ask the preloader.
                Some(url)
                    if self.deps.preloader.is_loaded(url)
                        || (*state != PageImageState::Placeholder && !self.image_failed(url)) =>
                {
                    PageSlot::Image { url: url.clone() }
                }
                _ => PageSlot::Placeholder,
            })
            .collect()
    }

    /// Render progress of the window around the current page, raw files only.
    pub fn progress(&self) -> Option<u8> {
        let raw = self.raw.as_ref()?;
        let window = self.render_window();
        Some(window.progress_percent(|page| {
            self.cache.contains(&self.render_key(raw.doc_id, page))
        }))
    }

    /// Rasterizes every page of the window that is not cached yet, nearest
    /// first. Returns how many pages were rendered.
    pub async fn render_visible_pages(&mut self) -> usize {
        let Some(raw) = &self.raw else {
            return 0;
        };
        let doc_id = raw.doc_id;
        let pdf = Arc::clone(&raw.pdf);
        let cursor = self.session.cursor();
        let mut pages: Vec<_> = self.render_window().pages().collect();
        pages.sort_by_key(|page| page.abs_diff(cursor));

        let mut rendered = 0;
        for page in pages {
            let key = self.render_key(doc_id, page);
            if self.cache.contains(&key) {
                continue;
            }
            let pdf = Arc::clone(&pdf);
            let scale = self.settings.render_scale;
            match tokio::task::spawn_blocking(move || lock(&pdf).render_page(page, scale)).await {
                Ok(Ok(frame)) => {
                    self.cache.insert(key, frame);
                    self.session.loaded_pages.insert(page);
                    rendered += 1;
                }
                Ok(Err(err)) => warn!(page, error = %err, "page render failed"),
                Err(err) => warn!(page, error = %err, "page render task failed"),
            }
        }
        rendered
    }

    pub fn rendered_page(&mut self, page: usize) -> Option<RgbaFrame> {
        let doc_id = self.raw.as_ref()?.doc_id;
        let key = self.render_key(doc_id, page);
        self.cache.get_cloned(&key)
    }

    /// Viewport width decides wheel navigation; exposed for hosts that log it.
    pub fn is_pointing_device_viewport(&self) -> bool {
        self.viewport_width >= f64::from(self.breakpoint_px)
    }

    pub fn close(&mut self) {
        self.abort.raise();
        info!("viewer closed");
        (self.deps.on_close)();
    }
}

impl Drop for FlipbookViewer {
    fn drop(&mut self) {
        self.abort.raise();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use chrono::{TimeZone, Utc};
    use futures_util::future::BoxFuture;
    use kurbo::Size;

    use super::{FlipbookViewer, ViewerDeps};
    use crate::config::Config;
    use crate::error::{AppError, AppResult};
    use crate::layout::ViewMode;
    use crate::library::{DocumentId, DocumentRef, SourceLocator};
    use crate::preload::{ImageFetcher, ImageInfo, ImagePreloader, PreloaderConfig, TimerRunner};
    use crate::sound::FlipSound;
    use crate::test_support::{build_pdf, build_sized_pdf};
    use crate::viewer::{
        FlipEvent, HayroDocumentLoader, HeadlessFlipWidget, PageImageState, PageSlot, PointerKind,
        ViewerPhase, WheelAction,
    };

    struct FakeFetcher {
        info: ImageInfo,
        failing: HashSet<String>,
        requests: Mutex<Vec<String>>,
    }

    impl ImageFetcher for FakeFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, AppResult<ImageInfo>> {
            self.requests
                .lock()
                .expect("request log should lock")
                .push(url.to_string());
            Box::pin(async move {
                if self.failing.contains(url) {
                    Err(AppError::fetch(url, "404"))
                } else {
                    Ok(self.info)
                }
            })
        }
    }

    impl FakeFetcher {
        fn requested(&self) -> Vec<String> {
            self.requests.lock().expect("request log should lock").clone()
        }
    }

    struct CountingSound(Rc<Cell<usize>>);

    impl FlipSound for CountingSound {
        fn play_flip_sound(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    struct Harness {
        viewer: FlipbookViewer,
        fetcher: Arc<FakeFetcher>,
        events: flume::Receiver<FlipEvent>,
        sounds: Rc<Cell<usize>>,
        closed: Rc<Cell<bool>>,
    }

    impl Harness {
        async fn pump(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.viewer.on_flip_complete(event).await;
            }
        }
    }

    fn harness(failing: &[&str]) -> Harness {
        harness_with(&Config::default(), failing)
    }

    fn harness_with(config: &Config, failing: &[&str]) -> Harness {
        let fetcher = Arc::new(FakeFetcher {
            info: ImageInfo {
                width: 100,
                height: 200,
            },
            failing: failing.iter().map(|url| url.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        });
        let preloader = ImagePreloader::new(
            fetcher.clone(),
            Arc::new(TimerRunner::new(Duration::from_millis(50))),
            PreloaderConfig::default(),
        );
        let (flip, events) = HeadlessFlipWidget::channel();
        let sounds = Rc::new(Cell::new(0));
        let closed = Rc::new(Cell::new(false));
        let on_close = {
            let closed = Rc::clone(&closed);
            Box::new(move || closed.set(true))
        };
        let viewer = FlipbookViewer::new(
            config,
            ViewerDeps {
                preloader,
                loader: Arc::new(
                    HayroDocumentLoader::new(Duration::from_secs(1)).expect("loader should build"),
                ),
                flip: Box::new(flip),
                sound: Box::new(CountingSound(Rc::clone(&sounds))),
                on_close,
            },
        );
        Harness {
            viewer,
            fetcher,
            events,
            sounds,
            closed,
        }
    }

    fn image_document(id: &str, pages: usize) -> DocumentRef {
        DocumentRef {
            id: DocumentId::from(id),
            title: id.to_string(),
            category: "Decks".to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            source: SourceLocator::Url(format!("https://cdn/{id}.pdf")),
            page_image_urls: Some(
                (1..=pages)
                    .map(|page| Some(format!("https://cdn/{id}/{page}.png")))
                    .collect(),
            ),
        }
    }

    fn raw_document(dir: &std::path::Path, name: &str, bytes: Vec<u8>) -> DocumentRef {
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("pdf should be written");
        DocumentRef::local_file(path)
    }

    #[tokio::test(start_paused = true)]
    async fn image_sets_are_ready_at_once_and_discover_their_ratio() {
        let mut harness = harness(&[]);
        let viewer = &mut harness.viewer;
        assert_eq!(viewer.phase(), &ViewerPhase::Idle);

        assert!(viewer.on_document_changed(image_document("deck", 12)));
        assert_eq!(viewer.phase(), &ViewerPhase::Ready);
        assert_eq!(viewer.session().current_page, 1);
        assert_eq!(viewer.session().total_pages, 12);
        assert_eq!(viewer.page_ratio(), 1.414);

        viewer.load().await;
        assert_eq!(viewer.page_ratio(), 2.0);
        let layout = viewer.layout();
        assert_eq!(f64::from(layout.base_height) / f64::from(layout.base_width), 2.0);
        assert_eq!(viewer.page_state(0), Some(PageImageState::Loaded));
        assert!(viewer.session().loaded_pages.contains(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn identical_reference_does_not_reset_and_a_new_one_does() {
        let mut harness = harness(&[]);
        let viewer = &mut harness.viewer;
        viewer.on_document_changed(image_document("deck", 5));
        viewer.load().await;
        viewer.zoom_in();

        assert!(!viewer.on_document_changed(image_document("deck", 5)));
        assert!((viewer.session().zoom.scale() - 1.1).abs() < 1e-6);
        let old_abort = viewer.abort_flag();

        assert!(viewer.on_document_changed(image_document("other", 3)));
        assert_eq!(viewer.session().total_pages, 3);
        assert_eq!(viewer.session().zoom.scale(), 1.0);
        assert!(viewer.session().loaded_pages.is_empty());
        assert_eq!(viewer.page_ratio(), 1.414);
        assert!(old_abort.is_raised());
        assert!(!viewer.abort_flag().is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn flipping_to_page_two_preloads_the_rest() {
        let mut harness = harness(&[]);
        harness.viewer.on_document_changed(image_document("deck", 9));
        harness.viewer.load().await;

        harness.viewer.next();
        assert_eq!(harness.viewer.session().current_page, 1);
        harness.pump().await;
        assert_eq!(harness.viewer.session().current_page, 2);
        assert_eq!(harness.sounds.get(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let requested: HashSet<_> = harness.fetcher.requested().into_iter().collect();
        for page in 2..=9 {
            assert!(
                requested.contains(&format!("https://cdn/deck/{page}.png")),
                "page {page} should have been preloaded"
            );
        }
        // Page 1 was probed once for its ratio and never fetched again.
        assert_eq!(
            harness
                .fetcher
                .requested()
                .iter()
                .filter(|url| url.ends_with("/1.png"))
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_images_render_as_placeholders() {
        let mut harness = harness(&["https://cdn/deck/2.png"]);
        let mut document = image_document("deck", 3);
        if let Some(urls) = document.page_image_urls.as_mut() {
            urls[2] = None;
        }
        harness.viewer.on_resize(Size::new(1200.0, 800.0), 1400.0);
        harness.viewer.on_document_changed(document);
        harness.viewer.load().await;
        assert_eq!(harness.viewer.layout().view_mode, ViewMode::Double);

        let slots = harness.viewer.page_slots();
        assert_eq!(
            slots,
            vec![
                PageSlot::Image {
                    url: "https://cdn/deck/1.png".to_string()
                },
                PageSlot::Placeholder,
                PageSlot::Placeholder,
            ]
        );
        assert_eq!(harness.viewer.progress(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn flip_events_outside_the_document_are_ignored() {
        let mut harness = harness(&[]);
        assert!(!harness.viewer.on_flip_complete(FlipEvent { page: 0 }).await);

        harness.viewer.on_document_changed(image_document("deck", 3));
        assert!(!harness.viewer.on_flip_complete(FlipEvent { page: 3 }).await);
        assert_eq!(harness.sounds.get(), 0);

        harness.viewer.turn_to(40);
        harness.pump().await;
        assert_eq!(harness.viewer.session().current_page, 3);

        harness.viewer.turn_to(1);
        harness.pump().await;
        assert_eq!(harness.viewer.session().current_page, 1);
        assert_eq!(harness.sounds.get(), 2);
    }

    #[tokio::test]
    async fn raw_documents_open_renders_the_window_and_reports_progress() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let texts: Vec<String> = (1..=12).map(|page| format!("page {page}")).collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut harness = harness(&[]);
        let document = raw_document(dir.path(), "long.pdf", build_sized_pdf(&texts, 200, 400));

        harness.viewer.on_document_changed(document);
        assert_eq!(harness.viewer.phase(), &ViewerPhase::Loading);
        assert_eq!(harness.viewer.progress(), None);

        harness.viewer.load().await;
        assert_eq!(harness.viewer.phase(), &ViewerPhase::Ready);
        assert_eq!(harness.viewer.session().total_pages, 12);
        assert!((harness.viewer.page_ratio() - 2.0).abs() < 1e-6);
        assert_eq!(harness.viewer.progress(), Some(100));

        let slots = harness.viewer.page_slots();
        assert_eq!(slots.len(), 12);
        assert!(slots[..5].iter().all(|slot| *slot == PageSlot::Render));
        assert!(slots[5..].iter().all(|slot| *slot == PageSlot::Placeholder));
        assert!(harness.viewer.rendered_page(0).is_some());
        assert!(harness.viewer.rendered_page(7).is_none());

        harness.viewer.turn_to(9);
        harness.pump().await;
        assert_eq!(harness.viewer.session().current_page, 9);
        assert_eq!(harness.viewer.progress(), Some(100));
        assert!(harness.viewer.rendered_page(11).is_some());
    }

    #[tokio::test]
    async fn corrupt_raw_document_shows_the_error_panel() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let mut harness = harness(&[]);
        let document = raw_document(dir.path(), "broken.pdf", b"%PDF-1.4 truncated".to_vec());

        harness.viewer.on_document_changed(document);
        harness.viewer.load().await;
        assert!(matches!(harness.viewer.phase(), ViewerPhase::Failed(_)));

        harness.viewer.next();
        assert!(harness.events.try_recv().is_err());
        assert!(harness.viewer.page_slots().is_empty());

        let good = raw_document(dir.path(), "good.pdf", build_pdf(&["ok"]));
        harness.viewer.on_document_changed(good);
        harness.viewer.load().await;
        assert_eq!(harness.viewer.phase(), &ViewerPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_to_a_same_sized_document_starts_over_at_page_one() {
        let mut harness = harness(&[]);
        harness.viewer.on_document_changed(image_document("first", 5));
        harness.viewer.turn_to(4);
        harness.pump().await;
        assert_eq!(harness.viewer.session().current_page, 4);

        harness.viewer.on_document_changed(image_document("second", 5));
        assert_eq!(harness.viewer.session().current_page, 1);
        harness.viewer.next();
        harness.pump().await;
        assert_eq!(harness.viewer.session().current_page, 2);
    }

    #[tokio::test]
    async fn render_cache_holds_a_window_wider_than_its_configured_size() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let texts: Vec<String> = (1..=30).map(|page| format!("page {page}")).collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut config = Config::default();
        config.viewer.render_window = 8;
        config.viewer.render_cache_entries = 16;
        let mut harness = harness_with(&config, &[]);

        harness
            .viewer
            .on_document_changed(raw_document(dir.path(), "wide.pdf", build_pdf(&texts)));
        harness.viewer.load().await;
        harness.viewer.turn_to(15);
        harness.pump().await;
        assert_eq!(harness.viewer.session().current_page, 15);

        assert_eq!(harness.viewer.progress(), Some(100));
        assert_eq!(harness.viewer.render_visible_pages().await, 0);
        assert!(harness.viewer.rendered_page(6).is_some());
        assert!(harness.viewer.rendered_page(22).is_some());
    }

    #[tokio::test]
    async fn unreachable_source_shows_a_placeholder_instead_of_the_error_panel() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let mut harness = harness(&[]);

        let mut remote = DocumentRef::local_file(dir.path().join("remote.pdf"));
        remote.source = SourceLocator::Url("http://127.0.0.1:9/remote.pdf".to_string());
        harness.viewer.on_document_changed(remote);
        harness.viewer.load().await;
        assert_eq!(harness.viewer.phase(), &ViewerPhase::Unavailable);
        assert_eq!(harness.viewer.page_slots(), vec![PageSlot::Placeholder]);

        let missing = DocumentRef::local_file(dir.path().join("missing.pdf"));
        harness.viewer.on_document_changed(missing);
        harness.viewer.load().await;
        assert_eq!(harness.viewer.phase(), &ViewerPhase::Unavailable);

        harness.viewer.next();
        assert!(harness.events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn background_fetch_failures_become_placeholders() {
        let mut harness = harness(&["https://cdn/deck/3.png", "https://cdn/deck/6.png"]);
        harness.viewer.on_document_changed(image_document("deck", 8));
        harness.viewer.load().await;
        let plan = harness
            .viewer
            .preload_plan()
            .cloned()
            .expect("image sets record their plan");
        assert_eq!(plan.critical, vec!["https://cdn/deck/1.png"]);
        assert_eq!(plan.high, vec!["https://cdn/deck/2.png", "https://cdn/deck/3.png"]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let slots = harness.viewer.page_slots();
        assert_eq!(slots[2], PageSlot::Placeholder);
        assert_eq!(slots[5], PageSlot::Placeholder);
        assert_eq!(
            slots[3],
            PageSlot::Image {
                url: "https://cdn/deck/4.png".to_string()
            }
        );

        harness.viewer.next();
        harness.pump().await;
        assert_eq!(harness.viewer.page_state(2), Some(PageImageState::Placeholder));
        assert_eq!(harness.viewer.page_state(3), Some(PageImageState::Loaded));
    }

    #[tokio::test(start_paused = true)]
    async fn double_click_toggles_zoom_without_relayout() {
        let mut harness = harness(&[]);
        let viewer = &mut harness.viewer;
        viewer.on_document_changed(image_document("deck", 4));
        let layout = viewer.layout();
        let start = Instant::now();

        assert!(!viewer.handle_click(PointerKind::Mouse, start));
        assert!(viewer.handle_click(PointerKind::Mouse, start + Duration::from_millis(300)));
        assert!((viewer.session().zoom.scale() - 1.4).abs() < 1e-6);
        assert_eq!(viewer.layout(), layout);
        let zoomed = viewer.display_size();
        assert!((zoomed.width - f64::from(layout.base_width) * 1.4).abs() < 1e-3);

        let later = start + Duration::from_secs(5);
        assert!(!viewer.handle_click(PointerKind::Mouse, later));
        assert!(!viewer.handle_click(PointerKind::Mouse, later + Duration::from_millis(301)));
        assert!((viewer.session().zoom.scale() - 1.4).abs() < 1e-6);

        viewer.reset_zoom();
        assert_eq!(viewer.session().zoom.scale(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn wheel_flips_only_on_wide_viewports() {
        let mut harness = harness(&[]);
        harness.viewer.on_document_changed(image_document("deck", 6));
        let start = Instant::now();

        harness.viewer.on_resize(Size::new(700.0, 900.0), 700.0);
        assert_eq!(harness.viewer.handle_wheel(40.0, start), WheelAction::Ignored);

        harness.viewer.on_resize(Size::new(1400.0, 900.0), 1400.0);
        assert!(harness.viewer.is_pointing_device_viewport());
        assert_eq!(harness.viewer.handle_wheel(40.0, start), WheelAction::Next);
        assert_eq!(
            harness.viewer.handle_wheel(40.0, start + Duration::from_millis(50)),
            WheelAction::Suppressed
        );
        harness.pump().await;
        // Double mode advances a whole spread.
        assert_eq!(harness.viewer.session().current_page, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn close_notifies_the_host_and_drop_raises_the_abort_flag() {
        let mut first = harness(&[]);
        first.viewer.on_document_changed(image_document("deck", 2));
        let abort = first.viewer.abort_flag();

        first.viewer.close();
        assert!(first.closed.get());
        assert!(abort.is_raised());

        let other = harness(&[]);
        let abort = other.viewer.abort_flag();
        drop(other);
        assert!(abort.is_raised());
    }
}
