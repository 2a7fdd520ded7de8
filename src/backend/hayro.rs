use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hayro::hayro_interpret::InterpreterSettings;
use hayro::hayro_syntax::Pdf;
use hayro::hayro_syntax::page::Page;
use hayro::vello_cpu::color::palette::css::WHITE;
use hayro::{RenderSettings, render};

use crate::error::{AppError, AppResult};

use super::traits::{PdfBackend, RgbaFrame};

pub struct PdfDoc {
    path: PathBuf,
    doc_id: u64,
    pdf: Pdf,
}

pub type HayroPdfBackend = PdfDoc;

impl PdfBackend for PdfDoc {
    fn doc_id(&self) -> u64 {
        PdfDoc::doc_id(self)
    }

    fn page_count(&self) -> usize {
        PdfDoc::page_count(self)
    }

    fn page_dimensions(&self, page: usize) -> AppResult<(f32, f32)> {
        PdfDoc::page_render_dimensions(self, page)
    }

    fn render_page(&self, page: usize, scale: f32) -> AppResult<RgbaFrame> {
        PdfDoc::render_page(self, page, scale)
    }
}

impl PdfDoc {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let bytes = Self::load_shared_bytes(path)?;
        Self::open_with_shared_bytes(path, bytes)
    }

    pub fn load_shared_bytes(path: impl AsRef<Path>) -> AppResult<Arc<Vec<u8>>> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(AppError::invalid_argument("pdf path must not be empty"));
        }
        if !path.exists() {
            return Err(AppError::io_with_context(
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing file"),
                format!("pdf file not found: {}", path.display()),
            ));
        }
        if !path.is_file() {
            return Err(AppError::invalid_argument(
                "pdf path must be a regular file",
            ));
        }

        let bytes = std::fs::read(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read {}", path.display()))
        })?;
        Ok(Arc::new(bytes))
    }

    /// `label` identifies the document in logs and in its id; it need not exist on disk.
    pub fn open_with_shared_bytes(label: impl AsRef<Path>, bytes: Arc<Vec<u8>>) -> AppResult<Self> {
        let label = label.as_ref();
        if !bytes.as_slice().starts_with(b"%PDF-") {
            return Err(AppError::pdf_decode("input is not a valid PDF header"));
        }
        let doc_id = calculate_doc_id(label, bytes.len());
        let pdf =
            Pdf::new(bytes).map_err(|_| AppError::pdf_decode("failed to parse PDF with hayro"))?;
        if pdf.pages().len() == 0 {
            return Err(AppError::pdf_decode("document has no pages"));
        }

        Ok(Self {
            path: label.to_path_buf(),
            doc_id,
            pdf,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn doc_id(&self) -> u64 {
        self.doc_id
    }

    pub fn page_count(&self) -> usize {
        self.pdf.pages().len()
    }

    pub fn page_render_dimensions(&self, page: usize) -> AppResult<(f32, f32)> {
        Ok(self.page(page)?.render_dimensions())
    }

    pub fn render_page(&self, page: usize, scale: f32) -> AppResult<RgbaFrame> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(AppError::invalid_argument(
                "scale must be a positive finite value",
            ));
        }

        let page_ref = self.page(page)?;
        let render_settings = RenderSettings {
            x_scale: scale,
            y_scale: scale,
            bg_color: WHITE,
            ..Default::default()
        };
        let interpreter_settings = InterpreterSettings::default();
        let pixmap = render(page_ref, &interpreter_settings, &render_settings);

        Ok(RgbaFrame {
            width: pixmap.width() as u32,
            height: pixmap.height() as u32,
            pixels: pixmap.data_as_u8_slice().to_vec().into(),
        })
    }

    fn page(&self, page: usize) -> AppResult<&Page<'_>> {
        self.pdf
            .pages()
            .get(page)
            .ok_or(AppError::invalid_argument("page index is out of range"))
    }
}

fn calculate_doc_id(path: &Path, byte_len: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    byte_len.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use crate::backend::PdfBackend;
    use crate::error::AppError;
    use crate::test_support::{build_pdf, build_sized_pdf};

    use super::PdfDoc;

    #[test]
    fn open_rejects_directory_path() {
        let dir = tempfile::tempdir().expect("test directory should be created");

        let result = PdfDoc::open(dir.path());
        assert!(matches!(
            result,
            Err(AppError::InvalidArgument(message))
                if message == "pdf path must be a regular file"
        ));
    }

    #[test]
    fn open_rejects_non_pdf_bytes_as_decode_failure() {
        let result = PdfDoc::open_with_shared_bytes("notes.txt", Arc::new(b"hello".to_vec()));
        assert!(matches!(result, Err(AppError::PdfDecode(_))));
    }

    #[test]
    fn open_accepts_valid_pdf_with_page_count() {
        let dir = tempfile::tempdir().expect("test directory should be created");
        let file = dir.path().join("file.pdf");
        fs::write(&file, build_pdf(&["first page", "second page"]))
            .expect("test file should be created");

        let doc = PdfDoc::open(&file).expect("pdf should open");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.path(), file.as_path());
    }

    #[test]
    fn render_page_rejects_out_of_range_page() {
        let doc = PdfDoc::open_with_shared_bytes("one.pdf", Arc::new(build_pdf(&["only"])))
            .expect("pdf should open");

        assert!(matches!(
            doc.render_page(3, 1.0),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(doc.render_page(0, 0.0).is_err());
    }

    #[test]
    fn page_ratio_follows_media_box() {
        let doc = PdfDoc::open_with_shared_bytes(
            "a4.pdf",
            Arc::new(build_sized_pdf(&["hello"], 210, 297)),
        )
        .expect("pdf should open");

        let (width, height) = doc
            .page_render_dimensions(0)
            .expect("dimensions should be available");
        assert!((width - 210.0).abs() < f32::EPSILON);
        assert!((height - 297.0).abs() < f32::EPSILON);
        let ratio = doc.page_ratio(0).expect("ratio should be available");
        assert!((ratio - 297.0 / 210.0).abs() < 1e-6);
    }

    #[test]
    fn render_page_uses_hayro_pixmap_output() {
        let doc = PdfDoc::open_with_shared_bytes("pixmap.pdf", Arc::new(build_pdf(&["render me"])))
            .expect("pdf should open");
        let frame = doc.render_page(0, 1.0).expect("render should succeed");
        assert!(frame.width > 0);
        assert!(frame.height > 0);
        assert_eq!(
            frame.pixels.len(),
            frame.width as usize * frame.height as usize * 4
        );
    }
}
