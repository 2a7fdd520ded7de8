use kurbo::Size;

use crate::config::LayoutConfig;

pub const DEFAULT_PAGE_RATIO: f64 = 1.414;

const SINGLE_MARGIN_PX: f64 = 40.0;
const DOUBLE_MARGIN_X_PX: f64 = 80.0;
const DOUBLE_MARGIN_Y_PX: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    Single,
    Double,
}

impl ViewMode {
    pub fn pages_per_spread(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
        }
    }
}

pub fn select_view_mode(viewport_width: f64, breakpoint_px: u32) -> ViewMode {
    if viewport_width < f64::from(breakpoint_px) {
        ViewMode::Single
    } else {
        ViewMode::Double
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutInput {
    pub container: Size,
    pub viewport_width: f64,
    /// Page height divided by page width.
    pub intrinsic_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutState {
    pub base_width: u32,
    pub base_height: u32,
    pub view_mode: ViewMode,
}

impl LayoutState {
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.base_width), f64::from(self.base_height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutCalculator {
    breakpoint_px: u32,
    min_page_width_px: u32,
}

impl Default for LayoutCalculator {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for LayoutCalculator {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            breakpoint_px: config.breakpoint_px,
            min_page_width_px: config.min_page_width_px,
        }
    }
}

impl LayoutCalculator {
    /// Largest sheet that fits the container in the selected mode, keeping the page ratio.
    pub fn calculate(&self, input: &LayoutInput) -> LayoutState {
        let ratio = sanitize_ratio(input.intrinsic_ratio);
        let view_mode = select_view_mode(input.viewport_width, self.breakpoint_px);
        let available = available_sheet_area(input.container, view_mode);

        let mut height = available.height;
        let mut width = height / ratio;
        if width > available.width {
            width = available.width;
            height = width * ratio;
        }

        let min_width = f64::from(self.min_page_width_px);
        let width = width.max(min_width);
        let height = height.max(min_width * ratio);

        LayoutState {
            base_width: to_pixels(width),
            base_height: to_pixels(height),
            view_mode,
        }
    }
}

fn available_sheet_area(container: Size, view_mode: ViewMode) -> Size {
    let width = finite_or_zero(container.width);
    let height = finite_or_zero(container.height);
    match view_mode {
        ViewMode::Single => Size::new(width - SINGLE_MARGIN_PX, height - SINGLE_MARGIN_PX),
        ViewMode::Double => Size::new(
            (width - DOUBLE_MARGIN_X_PX) / 2.0,
            height - DOUBLE_MARGIN_Y_PX,
        ),
    }
}

pub(crate) fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        DEFAULT_PAGE_RATIO
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

fn to_pixels(value: f64) -> u32 {
    value.floor().clamp(0.0, f64::from(u32::MAX)) as u32
}
