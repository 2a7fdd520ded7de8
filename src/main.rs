use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use flipbook::config::Config;
use flipbook::error::{AppError, AppResult};
use flipbook::library::{
    Admin, CategoryId, DocumentId, DocumentRef, FileLibrary, LibraryBackend, Sidebar,
};
use flipbook::preload::{
    AnyImageFetcher, IdleSignal, ImagePreloader, PreloadPriority, PreloaderConfig, TierPlan,
    select_runner,
};
use flipbook::sound::SoundPlayer;
use flipbook::upload::{
    HttpStorage, LocalStorage, StorageClient, UploadProgress, UploadRequest, Uploader,
};
use flipbook::viewer::{
    FlipbookViewer, HayroDocumentLoader, HeadlessFlipWidget, PageSlot, ViewerDeps, ViewerPhase,
};
use kurbo::Size;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "flipbook", version, about = "PDF flipbook library and viewer")]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Rasterize a PDF and add it to the library.
    Upload {
        file: PathBuf,
        #[arg(long)]
        category: String,
        /// Defaults to the file name.
        #[arg(long)]
        title: Option<String>,
    },
    /// Active documents by category, or every document with `--all`.
    List {
        #[arg(long)]
        all: bool,
        #[arg(long)]
        search: Option<String>,
    },
    Remove {
        id: String,
    },
    Toggle {
        id: String,
    },
    /// Move a document within its category.
    Move {
        id: String,
        position: usize,
    },
    /// Open a library document, or a PDF path, in a headless viewer.
    View {
        target: String,
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
        /// Viewport width; defaults to `--width`.
        #[arg(long)]
        viewport: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    Add { name: String },
    List,
    Rename { id: String, name: String },
    Remove { id: String },
    Toggle { id: String },
    Move { id: String, position: usize },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    flipbook::logging::init(&config.log)?;

    let root = config.library.resolved_root();
    let library: Arc<dyn LibraryBackend> = Arc::new(FileLibrary::open(&root)?);
    let storage = open_storage(&config, &root)?;
    debug!(root = %root.display(), "library ready");

    match cli.command {
        Command::Category(command) => run_category(&Admin::new(library), command),
        Command::Upload {
            file,
            category,
            title,
        } => upload(&config, library, storage, file, category, title).await,
        Command::List { all, search } => {
            list(library, storage, all, search.as_deref());
            Ok(())
        }
        Command::Remove { id } => Admin::new(library).remove_document(&DocumentId::from(id)),
        Command::Toggle { id } => {
            let active = Admin::new(library).toggle_document(&DocumentId::from(id.as_str()))?;
            println!("{id} is now {}", if active { "active" } else { "inactive" });
            Ok(())
        }
        Command::Move { id, position } => {
            Admin::new(library).move_document(&DocumentId::from(id), position)
        }
        Command::View {
            target,
            width,
            height,
            viewport,
        } => {
            let document = resolve_view_target(library.as_ref(), storage, &target)?;
            view(&config, document, Size::new(width, height), viewport.unwrap_or(width)).await
        }
    }
}

fn open_storage(config: &Config, root: &std::path::Path) -> AppResult<Arc<dyn StorageClient>> {
    let timeout = Duration::from_millis(config.preload.fetch_timeout_ms);
    Ok(match &config.upload.storage_endpoint {
        Some(endpoint) => Arc::new(HttpStorage::new(endpoint.as_str(), timeout)?),
        None => Arc::new(LocalStorage::new(root.join("storage"))),
    })
}

fn run_category(admin: &Admin, command: CategoryCommand) -> AppResult<()> {
    match command {
        CategoryCommand::Add { name } => {
            let id = admin.add_category(&name)?;
            println!("{id}");
        }
        CategoryCommand::List => {
            for category in admin.categories() {
                let state = if category.active { "" } else { " (inactive)" };
                println!("{}\t{}\t{}{state}", category.position, category.id, category.name);
            }
        }
        CategoryCommand::Rename { id, name } => {
            admin.rename_category(&CategoryId::from(id), &name)?;
        }
        CategoryCommand::Remove { id } => admin.remove_category(&CategoryId::from(id))?,
        CategoryCommand::Toggle { id } => {
            let active = admin.toggle_category(&CategoryId::from(id.as_str()))?;
            println!("{id} is now {}", if active { "active" } else { "inactive" });
        }
        CategoryCommand::Move { id, position } => {
            admin.move_category(&CategoryId::from(id), position)?;
        }
    }
    Ok(())
}

async fn upload(
    config: &Config,
    library: Arc<dyn LibraryBackend>,
    storage: Arc<dyn StorageClient>,
    file: PathBuf,
    category: String,
    title: Option<String>,
) -> AppResult<()> {
    Admin::new(Arc::clone(&library)).ensure_can_upload()?;
    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let uploader = Uploader::new(library, storage, &config.upload);

    let (progress, events) = flume::unbounded();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv_async().await {
            match event {
                UploadProgress::PdfStored { total_pages } => {
                    eprintln!("stored PDF, rendering {total_pages} pages");
                }
                UploadProgress::PageProcessed {
                    page,
                    total_pages,
                    stored,
                } => {
                    let note = if stored { "" } else { " (no image)" };
                    eprintln!("page {page}/{total_pages}{note}");
                }
                UploadProgress::Saved { .. } => {}
            }
        }
    });

    let result = uploader
        .upload_pdf(
            UploadRequest {
                title,
                category_id: CategoryId::from(category),
                source: file,
            },
            Some(progress),
        )
        .await;
    // The uploader dropped its sender, so the reporter drains and exits.
    let _ = reporter.await;
    println!("{}", result?);
    Ok(())
}

fn list(
    library: Arc<dyn LibraryBackend>,
    storage: Arc<dyn StorageClient>,
    all: bool,
    search: Option<&str>,
) {
    if all {
        for row in Admin::new(library).documents() {
            let state = if row.document.active { "" } else { " (inactive)" };
            println!(
                "{}\t{}\t{}\t{} pages{state}",
                row.document.id,
                row.category_name,
                row.document.title,
                row.document.page_images.len()
            );
        }
        return;
    }

    let mut sidebar = Sidebar::new(library.as_ref(), storage);
    if let Some(search) = search {
        sidebar.set_filter(search);
    }
    for section in sidebar.sections() {
        println!("{}", section.category.name);
        for document in section.documents {
            println!(
                "  {}\t{}\t{}",
                document.id,
                document.title,
                document.date.format("%Y-%m-%d")
            );
        }
    }
}

fn resolve_view_target(
    library: &dyn LibraryBackend,
    storage: Arc<dyn StorageClient>,
    target: &str,
) -> AppResult<DocumentRef> {
    let path = PathBuf::from(target);
    if path.is_file() {
        return Ok(DocumentRef::local_file(path));
    }
    let mut sidebar = Sidebar::new(library, storage);
    sidebar.select(&DocumentId::from(target)).map_err(|err| match err {
        AppError::NotFound(_) => AppError::not_found(format!("no document or file named {target}")),
        other => other,
    })
}

async fn view(
    config: &Config,
    document: DocumentRef,
    container: Size,
    viewport_width: f64,
) -> AppResult<()> {
    let timeout = Duration::from_millis(config.preload.fetch_timeout_ms);
    let idle = IdleSignal::new();
    let preloader = ImagePreloader::new(
        Arc::new(AnyImageFetcher::new(timeout)?),
        select_runner(
            Some(&idle),
            Duration::from_millis(config.preload.idle_throttle_ms),
        ),
        PreloaderConfig::from(&config.preload),
    );
    let (flip, flips) = HeadlessFlipWidget::channel();
    let mut viewer = FlipbookViewer::new(
        config,
        ViewerDeps {
            preloader: Arc::clone(&preloader),
            loader: Arc::new(HayroDocumentLoader::new(timeout)?),
            flip: Box::new(flip),
            sound: Box::new(SoundPlayer::silent(&config.sound)),
            on_close: Box::new(|| info!("viewer closed")),
        },
    );

    viewer.on_resize(container, viewport_width);
    viewer.on_document_changed(document);
    viewer.load().await;
    match viewer.phase() {
        ViewerPhase::Failed(message) => return Err(AppError::pdf_decode(message.clone())),
        ViewerPhase::Unavailable => eprintln!("document source is unreachable; showing a placeholder"),
        ViewerPhase::Idle | ViewerPhase::Loading | ViewerPhase::Ready => {}
    }
    print_status(&viewer, &preloader);

    let slice = Duration::from_millis(config.preload.idle_slice_ms);
    let mut ticks = tokio::time::interval(slice);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        // Waiting on the user is idle time for background preloads.
        let line = loop {
            tokio::select! {
                line = lines.next_line() => break line,
                _ = ticks.tick() => idle.notify_idle(slice),
            }
        };
        idle.notify_busy();
        let Some(line) = line.map_err(|source| AppError::io_with_context(source, "stdin"))? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "next" | "n" => viewer.next(),
            "prev" | "p" => viewer.prev(),
            "zoom+" => {
                viewer.zoom_in();
            }
            "zoom-" => {
                viewer.zoom_out();
            }
            "zoom0" => {
                viewer.reset_zoom();
            }
            "quit" | "q" => break,
            other => match other.parse::<usize>() {
                Ok(page) => viewer.turn_to(page),
                Err(_) => {
                    eprintln!("unknown command {other:?}; try next, prev, <page>, zoom+, zoom-, quit");
                    continue;
                }
            },
        }
        while let Ok(event) = flips.try_recv() {
            viewer.on_flip_complete(event).await;
        }
        print_status(&viewer, &preloader);
    }

    viewer.close();
    Ok(())
}

fn print_status(viewer: &FlipbookViewer, preloader: &ImagePreloader) {
    let session = viewer.session();
    let layout = viewer.layout();
    let size = viewer.display_size();
    let slots = viewer.page_slots();
    let ready = slots
        .iter()
        .filter(|slot| !matches!(slot, PageSlot::Placeholder))
        .count();
    println!(
        "page {}/{} | {:?} {}x{} | zoom {:.1} ({:.0}x{:.0}) | {} of {} pages shown",
        session.current_page,
        session.total_pages,
        layout.view_mode,
        layout.base_width,
        layout.base_height,
        session.zoom.scale(),
        size.width,
        size.height,
        ready,
        slots.len()
    );
    match viewer.progress() {
        Some(progress) => println!("rendered {progress}% of the visible window"),
        None => {
            let stats = preloader.cache_stats();
            println!(
                "images: {} loaded, {} queued, {} in flight, {} failed",
                stats.loaded, stats.queued, stats.in_flight, stats.failed
            );
        }
    }
    if let Some(plan) = viewer.preload_plan() {
        println!("{}", describe_plan(plan));
    }
}

fn describe_plan(plan: &TierPlan) -> String {
    [
        PreloadPriority::Critical,
        PreloadPriority::High,
        PreloadPriority::Low,
        PreloadPriority::Idle,
    ]
    .into_iter()
    .map(|priority| format!("{} {}", priority.as_str(), plan.tier(priority).len()))
    .collect::<Vec<_>>()
    .join(", ")
}
