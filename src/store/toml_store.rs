use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{AppError, AppResult};

use super::{DocumentState, GlobalSettings, StateStore};

const GLOBAL_FILE: &str = "settings.toml";
const DOCUMENTS_DIR: &str = "documents";

/// One TOML file per document, named by a hash of its path, plus a global settings file.
#[derive(Debug, Clone)]
pub struct TomlStateStore {
    root: PathBuf,
}

impl TomlStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The file name must stay the same across builds, or saved progress is orphaned.
    fn document_file(&self, path: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(path.as_os_str().to_string_lossy().as_bytes());
        self.root
            .join(DOCUMENTS_DIR)
            .join(format!("{:x}.toml", hasher.finalize()))
    }
}

pub fn default_data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("pdfest"));
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Some(
            PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("pdfest"),
        );
    }
    if let Some(appdata) = std::env::var_os("APPDATA")
        && !appdata.is_empty()
    {
        return Some(PathBuf::from(appdata).join("pdfest"));
    }
    None
}

fn read_toml<T: DeserializeOwned>(file: &Path) -> AppResult<Option<T>> {
    if !file.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(file).map_err(|source| {
        AppError::io_with_context(source, format!("failed to read state: {}", file.display()))
    })?;
    let value = toml::from_str(&raw).map_err(|source| {
        AppError::invalid_argument(format!("failed to parse state {}: {source}", file.display()))
    })?;
    Ok(Some(value))
}

fn write_toml<T: Serialize>(file: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(|source| {
            AppError::io_with_context(source, format!("failed to create {}", parent.display()))
        })?;
    }
    let contents = toml::to_string(value).map_err(|source| {
        AppError::invalid_argument(format!("failed to encode state: {source}"))
    })?;
    // Readers only ever see a complete file.
    let staging = file.with_extension("toml.tmp");
    fs::write(&staging, contents).map_err(|source| {
        AppError::io_with_context(source, format!("failed to write {}", staging.display()))
    })?;
    fs::rename(&staging, file).map_err(|source| {
        AppError::io_with_context(source, format!("failed to replace {}", file.display()))
    })?;
    debug!(file = %file.display(), "state saved");
    Ok(())
}

impl StateStore for TomlStateStore {
    fn load_document(&self, path: &Path) -> AppResult<Option<DocumentState>> {
        read_toml(&self.document_file(path))
    }

    fn save_document(&self, path: &Path, state: &DocumentState) -> AppResult<()> {
        write_toml(&self.document_file(path), state)
    }

    fn load_global(&self) -> AppResult<GlobalSettings> {
        Ok(read_toml(&self.root.join(GLOBAL_FILE))?.unwrap_or_default())
    }

    fn save_global(&self, settings: &GlobalSettings) -> AppResult<()> {
        write_toml(&self.root.join(GLOBAL_FILE), settings)
    }
}
