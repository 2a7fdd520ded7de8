use std::sync::Arc;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl RgbaFrame {
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

pub trait PdfBackend: Send {
    fn doc_id(&self) -> u64;
    fn page_count(&self) -> usize;
    /// Page size in PDF points, `(width, height)`.
    fn page_dimensions(&self, page: usize) -> AppResult<(f32, f32)>;
    fn render_page(&self, page: usize, scale: f32) -> AppResult<RgbaFrame>;

    /// Height-to-width ratio of `page`.
    fn page_ratio(&self, page: usize) -> AppResult<f64> {
        let (width, height) = self.page_dimensions(page)?;
        if width <= 0.0 || height <= 0.0 {
            return Err(crate::error::AppError::pdf_decode(format!(
                "page {page} has a degenerate size {width}x{height}"
            )));
        }
        Ok(f64::from(height) / f64::from(width))
    }
}
