use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;

use crate::error::{AppError, AppResult};

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

    pub fn into_image(self) -> AppResult<RgbaImage> {
        let (width, height) = (self.width, self.height);
        RgbaImage::from_raw(width, height, self.pixels.as_ref().to_vec()).ok_or_else(|| {
            AppError::invalid_argument(format!(
                "frame buffer does not match {width}x{height} RGBA dimensions"
            ))
        })
    }
}

/// Axis-aligned box with a top-left origin, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageRect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x0: self.x0 * factor,
            y0: self.y0 * factor,
            x1: self.x1 * factor,
            y1: self.y1 * factor,
        }
    }

    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) * 0.5
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One word in untransformed page units.
#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub rect: PageRect,
    pub text: String,
}

impl WordBox {
    pub fn new(rect: PageRect, text: impl Into<String>) -> Self {
        Self {
            rect,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Page(usize),
    Uri(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub rect: PageRect,
    pub target: LinkTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub level: usize,
    pub title: String,
    pub page: usize,
}

pub trait PdfBackend: Send {
    fn path(&self) -> &Path;
    fn doc_id(&self) -> u64;
    fn page_count(&self) -> usize;
    fn page_dimensions(&self, page: usize) -> AppResult<(f32, f32)>;
    fn render_page(&self, page: usize, zoom: f32) -> AppResult<RgbaFrame>;
    fn extract_words(&self, page: usize) -> AppResult<Vec<WordBox>>;

    fn links(&self, _page: usize) -> AppResult<Vec<PageLink>> {
        Ok(Vec::new())
    }

    fn outline(&self) -> AppResult<Vec<OutlineEntry>> {
        Ok(Vec::new())
    }
}
