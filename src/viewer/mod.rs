mod cache;
mod flip;
mod flipbook;
mod gesture;
mod source;
mod state;
mod window;
mod zoom;

pub use cache::{CacheCounters, RenderedPageCache, RenderedPageKey};
pub use flip::{FlipEvent, HeadlessFlipWidget, PageFlipWidget};
pub use flipbook::{FlipbookViewer, ViewerDeps};
pub use gesture::{PointerKind, TapDetector, WheelAction, WheelNavigator};
pub use source::{DocumentLoader, HayroDocumentLoader};
pub use state::{PageImageState, ViewerPhase, ViewerSession};
pub use window::{PageSlot, RenderWindow};
pub use zoom::{MAX_ZOOM, MIN_ZOOM, ZoomState};
