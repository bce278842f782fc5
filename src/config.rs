use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::viewport::{DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM, ViewportPolicy};

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub viewport: ViewportConfig,
    pub narration: NarrationConfig,
    pub speech: SpeechConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    pub batch_size: usize,
    pub load_threshold: usize,
    pub unload_threshold: usize,
    pub default_zoom: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            load_threshold: 5,
            unload_threshold: 20,
            default_zoom: DEFAULT_ZOOM,
            viewport_width: 1200.0,
            viewport_height: 800.0,
        }
    }
}

impl ViewportConfig {
    pub fn policy(&self) -> ViewportPolicy {
        ViewportPolicy {
            batch_size: self.batch_size,
            load_threshold: self.load_threshold,
            unload_threshold: self.unload_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NarrationConfig {
    pub lookahead: usize,
    pub prefetch_interval_ms: u64,
    pub playback_poll_ms: u64,
    pub page_wait_ms: u64,
    pub skip_settle_ms: u64,
    pub default_voice: String,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            lookahead: 5,
            prefetch_interval_ms: 100,
            playback_poll_ms: 50,
            page_wait_ms: 1500,
            skip_settle_ms: 60,
            default_voice: "en-us".to_string(),
        }
    }
}

impl NarrationConfig {
    pub fn prefetch_interval(&self) -> Duration {
        Duration::from_millis(self.prefetch_interval_ms)
    }

    pub fn playback_poll(&self) -> Duration {
        Duration::from_millis(self.playback_poll_ms)
    }

    pub fn page_wait(&self) -> Duration {
        Duration::from_millis(self.page_wait_ms)
    }

    pub fn skip_settle(&self) -> Duration {
        Duration::from_millis(self.skip_settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SpeechConfig {
    pub synth_program: String,
    pub player_program: String,
    pub player_args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            synth_program: "espeak-ng".to_string(),
            player_program: "aplay".to_string(),
            player_args: vec!["-q".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
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

    pub(crate) fn sanitized(mut self) -> Self {
        self.viewport.batch_size = self.viewport.batch_size.max(1);
        self.viewport.load_threshold = self.viewport.load_threshold.max(1);
        // Unloading inside the batch would evict what the last load just brought in.
        self.viewport.unload_threshold = self
            .viewport
            .unload_threshold
            .max(self.viewport.batch_size);
        if !self.viewport.default_zoom.is_finite() {
            self.viewport.default_zoom = DEFAULT_ZOOM;
        }
        self.viewport.default_zoom = self.viewport.default_zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if !self.viewport.viewport_width.is_finite() || self.viewport.viewport_width < 1.0 {
            self.viewport.viewport_width = ViewportConfig::default().viewport_width;
        }
        if !self.viewport.viewport_height.is_finite() || self.viewport.viewport_height < 1.0 {
            self.viewport.viewport_height = ViewportConfig::default().viewport_height;
        }

        self.narration.lookahead = self.narration.lookahead.max(1);
        self.narration.prefetch_interval_ms = self.narration.prefetch_interval_ms.max(1);
        self.narration.playback_poll_ms = self.narration.playback_poll_ms.max(1);
        self.narration.page_wait_ms = self.narration.page_wait_ms.max(1);
        if self.narration.default_voice.trim().is_empty() {
            self.narration.default_voice = NarrationConfig::default().default_voice;
        }
        if self.logging.level.trim().is_empty() {
            self.logging.level = LoggingConfig::default().level;
        }
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("PDFEST_CONFIG_PATH")
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("pdfest").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Some(
            PathBuf::from(home)
                .join(".config")
                .join("pdfest")
                .join("config.toml"),
        );
    }
    if let Some(appdata) = std::env::var_os("APPDATA")
        && !appdata.is_empty()
    {
        return Some(PathBuf::from(appdata).join("pdfest").join("config.toml"));
    }
    None
}
