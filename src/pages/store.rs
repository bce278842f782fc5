use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use image::RgbaImage;

use crate::backend::WordBox;
use crate::document::LoadedPage;
use crate::highlight::{apply_brightness, clamp_brightness};

/// A resident page. `original` is never modified after load; `raster` is what gets shown.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub zoom: f32,
    pub original: Arc<RgbaImage>,
    pub raster: Arc<RgbaImage>,
    pub words: Vec<WordBox>,
    /// Page size in untransformed units.
    pub size: (f32, f32),
    pub y_offset: f32,
    pub height: f32,
}

#[derive(Debug)]
pub struct PageStore {
    pages: BTreeMap<usize, Page>,
    brightness: f32,
}

impl Default for PageStore {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PageStore {
    pub fn new(brightness: f32) -> Self {
        Self {
            pages: BTreeMap::new(),
            brightness: clamp_brightness(brightness),
        }
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    /// Replaces any previous copy of the page wholesale.
    pub fn insert(&mut self, loaded: LoadedPage, y_offset: f32) -> &Page {
        let original = Arc::new(loaded.original);
        let raster = Arc::new(apply_brightness(&original, self.brightness));
        let height = original.height() as f32;
        let page = Page {
            index: loaded.index,
            zoom: loaded.zoom,
            original,
            raster,
            words: loaded.words,
            size: loaded.size,
            y_offset,
            height,
        };
        self.pages.insert(loaded.index, page);
        &self.pages[&loaded.index]
    }

    pub fn remove(&mut self, index: usize) -> Option<Page> {
        self.pages.remove(&index)
    }

    pub fn get(&self, index: usize) -> Option<&Page> {
        self.pages.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.pages.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn resident(&self) -> BTreeSet<usize> {
        self.pages.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn set_raster(&mut self, index: usize, raster: RgbaImage) -> bool {
        let Some(page) = self.pages.get_mut(&index) else {
            return false;
        };
        page.raster = Arc::new(raster);
        true
    }

    /// Drops any overlay on the page and shows the original at the current brightness.
    pub fn restore_raster(&mut self, index: usize) -> bool {
        let brightness = self.brightness;
        let Some(page) = self.pages.get_mut(&index) else {
            return false;
        };
        page.raster = Arc::new(apply_brightness(&page.original, brightness));
        true
    }

    /// Re-derives every display raster from its original. Returns the clamped value.
    pub fn set_brightness(&mut self, brightness: f32) -> f32 {
        self.brightness = clamp_brightness(brightness);
        let indices: Vec<usize> = self.pages.keys().copied().collect();
        for index in indices {
            self.restore_raster(index);
        }
        self.brightness
    }
}
