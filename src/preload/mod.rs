mod fetcher;
mod plan;
mod preloader;
mod runner;
mod task;

pub use fetcher::{AnyImageFetcher, FileImageFetcher, HttpImageFetcher, ImageFetcher, ImageInfo};
pub(crate) use fetcher::{is_http, local_path};
pub use plan::{TierPlan, TierWindows, plan_viewer_tiers};
pub use preloader::{AbortFlag, CacheStats, ImagePreloader, PreloaderConfig};
pub use runner::{BackgroundRunner, IdleRunner, IdleSignal, RunnerKind, TimerRunner, select_runner};
pub use task::{PreloadPriority, PreloadStatus, PreloadTask};
