use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub preload: PreloadConfig,
    pub layout: LayoutConfig,
    pub viewer: ViewerConfig,
    pub sound: SoundConfig,
    pub library: LibraryConfig,
    pub upload: UploadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreloadConfig {
    pub high_window: usize,
    pub low_window: usize,
    pub low_delay_ms: u64,
    pub idle_throttle_ms: u64,
    pub idle_slice_ms: u64,
    pub fetch_timeout_ms: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            high_window: 2,
            low_window: 4,
            low_delay_ms: 100,
            idle_throttle_ms: 50,
            idle_slice_ms: 16,
            fetch_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LayoutConfig {
    pub breakpoint_px: u32,
    pub min_page_width_px: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            breakpoint_px: 1024,
            min_page_width_px: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub render_window: usize,
    pub default_ratio: f64,
    pub double_tap_ms: u64,
    pub wheel_debounce_ms: u64,
    pub render_scale: f32,
    pub render_cache_entries: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            render_window: 4,
            default_ratio: 1.414,
            double_tap_ms: 300,
            wheel_debounce_ms: 300,
            render_scale: 1.5,
            render_cache_entries: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SoundConfig {
    pub volume: f32,
    pub playback_rate: f32,
    pub assets: Vec<PathBuf>,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            volume: 0.5,
            playback_rate: 1.0,
            assets: vec![
                PathBuf::from("sounds/page-flip-1.mp3"),
                PathBuf::from("sounds/page-flip-2.mp3"),
                PathBuf::from("sounds/page-flip-3.mp3"),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LibraryConfig {
    pub root: Option<PathBuf>,
}

impl LibraryConfig {
    pub fn resolved_root(&self) -> PathBuf {
        self.root
            .clone()
            .or_else(default_data_dir)
            .unwrap_or_else(|| PathBuf::from(".flipbook"))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub render_scale: f32,
    pub storage_endpoint: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            storage_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "flipbook=info".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> AppResult<Self> {
        let Some(path) = default_config_path() else {
            return Ok(Self::default());
        };
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        if !path.is_file() {
            return Err(AppError::invalid_argument(format!(
                "config path is not a regular file: {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read config: {}", path.display()))
        })?;
        let parsed = toml::from_str::<Self>(&raw).map_err(|source| {
            AppError::invalid_argument(format!(
                "failed to parse config {}: {source}",
                path.display()
            ))
        })?;
        Ok(parsed.sanitized())
    }

    fn sanitized(mut self) -> Self {
        self.preload.low_delay_ms = self.preload.low_delay_ms.max(1);
        self.preload.idle_throttle_ms = self.preload.idle_throttle_ms.max(1);
        self.preload.idle_slice_ms = self.preload.idle_slice_ms.max(1);
        self.preload.fetch_timeout_ms = self.preload.fetch_timeout_ms.max(1);
        self.layout.breakpoint_px = self.layout.breakpoint_px.max(1);
        self.layout.min_page_width_px = self.layout.min_page_width_px.max(1);
        self.viewer.double_tap_ms = self.viewer.double_tap_ms.max(1);
        self.viewer.render_cache_entries = self.viewer.render_cache_entries.max(1);
        if !self.viewer.default_ratio.is_finite() || self.viewer.default_ratio <= 0.0 {
            self.viewer.default_ratio = ViewerConfig::default().default_ratio;
        }
        if !self.viewer.render_scale.is_finite() || self.viewer.render_scale <= 0.0 {
            self.viewer.render_scale = ViewerConfig::default().render_scale;
        }
        if !self.upload.render_scale.is_finite() || self.upload.render_scale <= 0.0 {
            self.upload.render_scale = UploadConfig::default().render_scale;
        }
        self.sound.volume = if self.sound.volume.is_finite() {
            self.sound.volume.clamp(0.0, 1.0)
        } else {
            SoundConfig::default().volume
        };
        if !self.sound.playback_rate.is_finite() || self.sound.playback_rate <= 0.0 {
            self.sound.playback_rate = SoundConfig::default().playback_rate;
        }
        if self.log.filter.trim().is_empty() {
            self.log.filter = LogConfig::default().filter;
        }
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("FLIPBOOK_CONFIG_PATH")
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("flipbook").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Some(
            PathBuf::from(home)
                .join(".config")
                .join("flipbook")
                .join("config.toml"),
        );
    }
    if let Some(appdata) = std::env::var_os("APPDATA")
        && !appdata.is_empty()
    {
        return Some(PathBuf::from(appdata).join("flipbook").join("config.toml"));
    }
    None
}

fn default_data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("flipbook"));
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Some(
            PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("flipbook"),
        );
    }
    std::env::var_os("APPDATA")
        .filter(|appdata| !appdata.is_empty())
        .map(|appdata| PathBuf::from(appdata).join("flipbook"))
}
