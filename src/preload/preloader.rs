use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::config::PreloadConfig;
use crate::error::AppResult;

use super::fetcher::{ImageFetcher, ImageInfo};
use super::plan::{TierPlan, TierWindows, plan_viewer_tiers};
use super::runner::BackgroundRunner;
use super::task::{PreloadPriority, PreloadStatus, PreloadTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloaderConfig {
    pub windows: TierWindows,
    pub low_delay: Duration,
}

impl Default for PreloaderConfig {
    fn default() -> Self {
        Self::from(&PreloadConfig::default())
    }
}

impl From<&PreloadConfig> for PreloaderConfig {
    fn from(config: &PreloadConfig) -> Self {
        Self {
            windows: TierWindows {
                high: config.high_window,
                low: config.low_window,
            },
            low_delay: Duration::from_millis(config.low_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub loaded: usize,
    pub failed: usize,
    pub queued: usize,
    pub in_flight: usize,
}

/// Stops a sequential high-priority run between fetches. Fetches already issued still finish.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct PreloadState {
    /// Append-only for the preloader's lifetime.
    loaded: HashMap<String, ImageInfo>,
    tasks: HashMap<String, PreloadTask>,
    queue: VecDeque<PreloadTask>,
    queued: HashSet<String>,
    draining: bool,
}

impl PreloadState {
    fn begin(&mut self, url: &str, priority: PreloadPriority) {
        let mut task = PreloadTask::new(url, priority);
        task.start();
        self.tasks.insert(url.to_string(), task);
    }

    fn complete(&mut self, url: &str, result: &AppResult<ImageInfo>) {
        if let Some(task) = self.tasks.get_mut(url) {
            task.finish(result.is_ok());
        }
        if let Ok(info) = result {
            self.loaded.insert(url.to_string(), *info);
        }
    }

    fn remove_queued(&mut self, url: &str) {
        if self.queued.remove(url) {
            self.queue.retain(|task| task.url != url);
        }
    }
}

/// Priority-tiered page image preloader with a loaded-URL cache.
///
/// One instance is shared (via `Arc`) by every viewer in the process, so a page
/// fetched for one viewer is never fetched again for another. Failures are not
/// cached: a URL that errored is attempted again the next time it is requested.
pub struct ImagePreloader {
    state: Mutex<PreloadState>,
    fetcher: Arc<dyn ImageFetcher>,
    runner: Arc<dyn BackgroundRunner>,
    config: PreloaderConfig,
}

impl ImagePreloader {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        runner: Arc<dyn BackgroundRunner>,
        config: PreloaderConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PreloadState::default()),
            fetcher,
            runner,
            config,
        })
    }

    pub fn config(&self) -> PreloaderConfig {
        self.config
    }

    /// Requests `urls` at `priority`.
    ///
    /// Critical fetches run concurrently and are awaited. High fetches run one
    /// after another and are awaited. Low and idle URLs are queued and this
    /// returns immediately; the queue drains in the background.
    pub async fn preload(self: &Arc<Self>, urls: &[String], priority: PreloadPriority) {
        let admitted = self.admit(urls, priority);
        if admitted.is_empty() {
            return;
        }
        debug!(
            priority = priority.as_str(),
            count = admitted.len(),
            "dispatching preload"
        );

        match priority {
            PreloadPriority::Critical => self.fetch_concurrently(&admitted).await,
            PreloadPriority::High => self.fetch_sequentially(&admitted, &AbortFlag::new()).await,
            PreloadPriority::Low => self.enqueue(admitted, priority, Some(self.config.low_delay)),
            PreloadPriority::Idle => self.enqueue(admitted, priority, None),
        }
    }

    /// Tiers `page_urls` around the 0-based `cursor` and dispatches every tier.
    ///
    /// Returns once the critical tier has settled. The high tier continues on a
    /// spawned task that checks `abort` between fetches.
    pub async fn preload_for_viewer(
        self: &Arc<Self>,
        page_urls: &[Option<String>],
        cursor: usize,
        pages_per_spread: usize,
        abort: &AbortFlag,
    ) -> TierPlan {
        let plan = plan_viewer_tiers(page_urls, cursor, pages_per_spread, self.config.windows);

        self.preload(&plan.critical, PreloadPriority::Critical).await;

        let high = self.admit(&plan.high, PreloadPriority::High);
        if !high.is_empty() {
            let preloader = Arc::clone(self);
            let abort = abort.clone();
            tokio::spawn(async move {
                preloader.fetch_sequentially(&high, &abort).await;
            });
        }

        self.preload(&plan.low, PreloadPriority::Low).await;
        self.preload(&plan.idle, PreloadPriority::Idle).await;
        plan
    }

    /// Loads a single image at critical priority and returns its natural size.
    pub async fn load_info(self: &Arc<Self>, url: &str) -> AppResult<ImageInfo> {
        if let Some(info) = self.info(url) {
            return Ok(info);
        }
        {
            let mut state = self.lock();
            state.remove_queued(url);
            state.begin(url, PreloadPriority::Critical);
        }
        self.fetch_tracked(url).await
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.lock().loaded.contains_key(url)
    }

    pub fn info(&self, url: &str) -> Option<ImageInfo> {
        self.lock().loaded.get(url).copied()
    }

    pub fn status(&self, url: &str) -> Option<PreloadStatus> {
        let state = self.lock();
        if state.loaded.contains_key(url) {
            return Some(PreloadStatus::Loaded);
        }
        if state.queued.contains(url) {
            return Some(PreloadStatus::Pending);
        }
        state.tasks.get(url).map(|task| task.status)
    }

    pub fn cache_stats(&self) -> CacheStats {
        let state = self.lock();
        let mut stats = CacheStats {
            loaded: state.loaded.len(),
            queued: state.queue.len(),
            ..CacheStats::default()
        };
        for task in state.tasks.values() {
            match task.status {
                PreloadStatus::Loading => stats.in_flight += 1,
                PreloadStatus::Error => stats.failed += 1,
                PreloadStatus::Pending | PreloadStatus::Loaded => {}
            }
        }
        stats
    }

    /// Drops loaded and queued URLs, and repeats within the batch. Critical and
    /// high requests take queued URLs out of the queue and fetch them directly.
    fn admit(&self, urls: &[String], priority: PreloadPriority) -> Vec<String> {
        let mut state = self.lock();
        let mut admitted = Vec::with_capacity(urls.len());
        let mut batch = HashSet::new();
        for url in urls {
            if state.loaded.contains_key(url) || !batch.insert(url.as_str()) {
                continue;
            }
            if state.queued.contains(url) {
                if priority.is_queued() {
                    continue;
                }
                state.remove_queued(url);
            }
            admitted.push(url.clone());
        }
        admitted
    }

    async fn fetch_concurrently(&self, urls: &[String]) {
        {
            let mut state = self.lock();
            for url in urls {
                state.begin(url, PreloadPriority::Critical);
            }
        }
        join_all(urls.iter().map(|url| self.fetch_tracked(url))).await;
    }

    async fn fetch_sequentially(&self, urls: &[String], abort: &AbortFlag) {
        for url in urls {
            if abort.is_raised() {
                debug!("sequential preload aborted");
                return;
            }
            if self.is_loaded(url) {
                continue;
            }
            self.lock().begin(url, PreloadPriority::High);
            let _ = self.fetch_tracked(url).await;
            tokio::task::yield_now().await;
        }
    }

    fn enqueue(
        self: &Arc<Self>,
        urls: Vec<String>,
        priority: PreloadPriority,
        delay: Option<Duration>,
    ) {
        let start_drain = {
            let mut state = self.lock();
            for url in urls {
                if state.queued.insert(url.clone()) {
                    state.queue.push_back(PreloadTask::new(url, priority));
                }
            }
            !std::mem::replace(&mut state.draining, true)
        };
        if !start_drain {
            return;
        }

        let preloader = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            preloader.drain().await;
        });
    }

    async fn drain(&self) {
        loop {
            self.runner.next_slot().await;
            let next = {
                let mut state = self.lock();
                match state.queue.pop_front() {
                    Some(task) => {
                        state.queued.remove(&task.url);
                        if state.loaded.contains_key(&task.url) {
                            continue;
                        }
                        state.begin(&task.url, task.priority);
                        task
                    }
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            let _ = self.fetch_tracked(&next.url).await;
        }
    }

    async fn fetch_tracked(&self, url: &str) -> AppResult<ImageInfo> {
        let result = self.fetcher.fetch(url).await;
        if let Err(err) = &result {
            warn!(url = %url, error = %err, "page image preload failed");
        }
        self.lock().complete(url, &result);
        result
    }

    fn lock(&self) -> MutexGuard<'_, PreloadState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
