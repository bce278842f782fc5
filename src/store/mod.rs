use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::segment::{ColumnMode, SegmentParams};
use crate::viewport::DEFAULT_ZOOM;

mod memory;
mod toml_store;

pub use memory::MemoryStateStore;
pub use toml_store::{TomlStateStore, default_data_dir};

/// Per-document reading state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentState {
    pub last_page: usize,
    pub last_sentence: usize,
    pub zoom: f32,
    pub header_margin: f32,
    pub footer_margin: f32,
    pub column_mode: ColumnMode,
}

impl Default for DocumentState {
    fn default() -> Self {
        let params = SegmentParams::default();
        Self {
            last_page: 0,
            last_sentence: 0,
            zoom: DEFAULT_ZOOM,
            header_margin: params.header_margin,
            footer_margin: params.footer_margin,
            column_mode: params.column_mode,
        }
    }
}

impl DocumentState {
    pub fn segment_params(&self) -> SegmentParams {
        SegmentParams {
            header_margin: self.header_margin.max(0.0),
            footer_margin: self.footer_margin.max(0.0),
            column_mode: self.column_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub voice: Option<String>,
    pub brightness: f32,
    pub last_document: Option<PathBuf>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            voice: None,
            brightness: 1.0,
            last_document: None,
        }
    }
}

/// Durable storage owned by the caller. The session reads it when a document opens and
/// writes checkpoints; it never assumes a storage format.
pub trait StateStore: Send + Sync {
    fn load_document(&self, path: &Path) -> AppResult<Option<DocumentState>>;
    fn save_document(&self, path: &Path, state: &DocumentState) -> AppResult<()>;
    fn load_global(&self) -> AppResult<GlobalSettings>;
    fn save_global(&self, settings: &GlobalSettings) -> AppResult<()>;
}
