use tracing::debug;

use crate::pages::PageStore;
use crate::segment::Sentence;

use super::compose::compose_highlight;

/// Tracks which page currently shows an overlay so at most one highlight exists.
#[derive(Debug, Default)]
pub struct HighlightRenderer {
    page: Option<usize>,
}

impl HighlightRenderer {
    pub fn highlighted_page(&self) -> Option<usize> {
        self.page
    }

    /// Returns false when the sentence's page is not resident.
    pub fn draw(&mut self, store: &mut PageStore, sentence: &Sentence) -> bool {
        if let Some(previous) = self.page
            && previous != sentence.page_index
        {
            self.clear(store, previous);
        }

        let Some(page) = store.get(sentence.page_index) else {
            return false;
        };
        let raster = compose_highlight(&page.original, &sentence.boxes, store.brightness());
        store.set_raster(sentence.page_index, raster);
        self.page = Some(sentence.page_index);
        debug!(page = sentence.page_index, ordinal = sentence.ordinal, "highlight drawn");
        true
    }

    pub fn clear(&mut self, store: &mut PageStore, page: usize) {
        store.restore_raster(page);
        if self.page == Some(page) {
            self.page = None;
        }
    }

    pub fn clear_all(&mut self, store: &mut PageStore) {
        if let Some(page) = self.page.take() {
            store.restore_raster(page);
        }
    }

    /// The page was evicted or reloaded; its raster no longer carries an overlay.
    pub fn forget(&mut self, page: usize) {
        if self.page == Some(page) {
            self.page = None;
        }
    }
}
