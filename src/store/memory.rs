use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::AppResult;

use super::{DocumentState, GlobalSettings, StateStore};

/// Keeps state for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    documents: Mutex<HashMap<PathBuf, DocumentState>>,
    global: Mutex<GlobalSettings>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load_document(&self, path: &Path) -> AppResult<Option<DocumentState>> {
        let documents = self.documents.lock().unwrap_or_else(|err| err.into_inner());
        Ok(documents.get(path).cloned())
    }

    fn save_document(&self, path: &Path, state: &DocumentState) -> AppResult<()> {
        let mut documents = self.documents.lock().unwrap_or_else(|err| err.into_inner());
        documents.insert(path.to_path_buf(), state.clone());
        Ok(())
    }

    fn load_global(&self) -> AppResult<GlobalSettings> {
        let global = self.global.lock().unwrap_or_else(|err| err.into_inner());
        Ok(global.clone())
    }

    fn save_global(&self, settings: &GlobalSettings) -> AppResult<()> {
        let mut global = self.global.lock().unwrap_or_else(|err| err.into_inner());
        *global = settings.clone();
        Ok(())
    }
}
