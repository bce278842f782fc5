pub const PAGE_GAP: f32 = 10.0;
pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 4.0;
pub const ZOOM_STEP: f32 = 0.25;
pub const DEFAULT_ZOOM: f32 = 2.5;

pub fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        DEFAULT_ZOOM
    }
}

/// Canvas geometry. Every page is placed at `index * estimated_page_height`, using the
/// first page's size, so layout never depends on which pages are resident.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    total_pages: usize,
    base_page_size: (f32, f32),
    zoom: f32,
    page_width: f32,
    estimated_page_height: f32,
    canvas_height: f32,
    viewport_width: f32,
    viewport_height: f32,
    scroll_top: f32,
}

impl Layout {
    pub fn new(
        total_pages: usize,
        base_page_size: (f32, f32),
        zoom: f32,
        viewport: (f32, f32),
    ) -> Self {
        let mut layout = Self {
            total_pages,
            base_page_size,
            zoom: clamp_zoom(zoom),
            page_width: 0.0,
            estimated_page_height: 0.0,
            canvas_height: 0.0,
            viewport_width: viewport.0.max(1.0),
            viewport_height: viewport.1.max(1.0),
            scroll_top: 0.0,
        };
        layout.recompute();
        layout
    }

    fn recompute(&mut self) {
        let (width, height) = self.base_page_size;
        self.page_width = (width * self.zoom).floor();
        self.estimated_page_height = (height * self.zoom).floor() + PAGE_GAP;
        self.canvas_height = self.estimated_page_height * self.total_pages as f32;
        self.scroll_top = self.scroll_top.clamp(0.0, self.max_scroll_top());
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn page_width(&self) -> f32 {
        self.page_width
    }

    pub fn estimated_page_height(&self) -> f32 {
        self.estimated_page_height
    }

    pub fn canvas_height(&self) -> f32 {
        self.canvas_height
    }

    pub fn viewport_size(&self) -> (f32, f32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    pub fn max_scroll_top(&self) -> f32 {
        (self.canvas_height - self.viewport_height).max(0.0)
    }

    pub fn set_scroll_top(&mut self, scroll_top: f32) {
        let scroll_top = if scroll_top.is_finite() { scroll_top } else { 0.0 };
        self.scroll_top = scroll_top.clamp(0.0, self.max_scroll_top());
    }

    pub fn scroll_by(&mut self, delta: f32) {
        self.set_scroll_top(self.scroll_top + delta);
    }

    /// Scroll position as a fraction of the canvas height, independent of zoom.
    pub fn scroll_fraction(&self) -> f32 {
        if self.canvas_height <= 0.0 {
            return 0.0;
        }
        (self.scroll_top / self.canvas_height).clamp(0.0, 1.0)
    }

    pub fn set_scroll_fraction(&mut self, fraction: f32) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.set_scroll_top(fraction * self.canvas_height);
    }

    /// Changes zoom, keeping the scroll fraction. Returns false when the clamped zoom is
    /// unchanged.
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        let zoom = clamp_zoom(zoom);
        if (zoom - self.zoom).abs() < f32::EPSILON {
            return false;
        }
        let fraction = self.scroll_fraction();
        self.zoom = zoom;
        self.recompute();
        self.set_scroll_fraction(fraction);
        true
    }

    pub fn set_viewport_size(&mut self, width: f32, height: f32) {
        let fraction = self.scroll_fraction();
        if width.is_finite() {
            self.viewport_width = width.max(1.0);
        }
        if height.is_finite() {
            self.viewport_height = height.max(1.0);
        }
        self.set_scroll_fraction(fraction);
    }

    pub fn page_y_offset(&self, page: usize) -> f32 {
        page as f32 * self.estimated_page_height
    }

    /// Pages are horizontally centred in the viewport.
    pub fn page_x_offset(&self) -> f32 {
        ((self.viewport_width - self.page_width) / 2.0).max(0.0)
    }

    pub fn page_at(&self, canvas_y: f32) -> Option<usize> {
        if self.total_pages == 0 || self.estimated_page_height <= 0.0 || canvas_y < 0.0 {
            return None;
        }
        let page = (canvas_y / self.estimated_page_height).floor() as usize;
        (page < self.total_pages).then_some(page)
    }

    /// Page containing the vertical centre of the viewport.
    pub fn visible_page(&self) -> usize {
        let centre = self.scroll_top + self.viewport_height / 2.0;
        self.page_at(centre)
            .unwrap_or_else(|| self.total_pages.saturating_sub(1))
    }

    pub fn scroll_to_page(&mut self, page: usize) {
        self.set_scroll_top(self.page_y_offset(page));
    }
}
