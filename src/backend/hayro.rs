use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hayro::hayro_interpret::font::Glyph;
use hayro::hayro_interpret::util::{PageExt, RectExt};
use hayro::hayro_interpret::{
    BlendMode, ClipPath, Context, Device, GlyphDrawMode, Image, InterpreterSettings, Paint,
    PathDrawMode, SoftMask, interpret_page,
};
use hayro::hayro_syntax::Pdf;
use hayro::hayro_syntax::page::Page;
use hayro::vello_cpu::color::palette::css::WHITE;
use hayro::{RenderSettings, render};
use kurbo::{Affine, BezPath, Point};
use tracing::debug;

use crate::error::{AppError, AppResult};

use super::traits::{PageRect, PdfBackend, RgbaFrame, WordBox};

pub struct PdfDoc {
    path: PathBuf,
    doc_id: u64,
    pdf: Pdf,
}

impl PdfBackend for PdfDoc {
    fn path(&self) -> &Path {
        &self.path
    }

    fn doc_id(&self) -> u64 {
        self.doc_id
    }

    fn page_count(&self) -> usize {
        self.pdf.pages().len()
    }

    fn page_dimensions(&self, page: usize) -> AppResult<(f32, f32)> {
        Ok(self.page(page)?.render_dimensions())
    }

    fn render_page(&self, page: usize, zoom: f32) -> AppResult<RgbaFrame> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(AppError::invalid_argument(
                "zoom must be a positive finite value",
            ));
        }
        let page_ref = self.page(page)?;

        let render_settings = RenderSettings {
            x_scale: zoom,
            y_scale: zoom,
            bg_color: WHITE,
            ..Default::default()
        };
        let pixmap = render(page_ref, &InterpreterSettings::default(), &render_settings);
        debug!(page, zoom, width = pixmap.width(), height = pixmap.height(), "rasterized page");

        Ok(RgbaFrame {
            width: pixmap.width() as u32,
            height: pixmap.height() as u32,
            pixels: pixmap.data_as_u8_slice().to_vec().into(),
        })
    }

    fn extract_words(&self, page: usize) -> AppResult<Vec<WordBox>> {
        let page_ref = self.page(page)?;
        let words = collect_words(page_ref);
        debug!(page, words = words.len(), "extracted word boxes");
        Ok(words)
    }
}

impl PdfDoc {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let bytes = Self::load_shared_bytes(path)?;
        Self::open_with_shared_bytes(path, bytes)
    }

    pub fn load_shared_bytes(path: impl AsRef<Path>) -> AppResult<Arc<Vec<u8>>> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(AppError::invalid_argument("pdf path must not be empty"));
        }
        if !path.exists() {
            return Err(AppError::io_with_context(
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing file"),
                format!("pdf file not found: {}", path.display()),
            ));
        }
        if !path.is_file() {
            return Err(AppError::invalid_argument(
                "pdf path must be a regular file",
            ));
        }

        let bytes = std::fs::read(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read pdf: {}", path.display()))
        })?;
        if !bytes.starts_with(b"%PDF-") {
            return Err(AppError::invalid_argument(
                "input is not a valid PDF header",
            ));
        }

        Ok(Arc::new(bytes))
    }

    pub fn open_with_shared_bytes(path: impl AsRef<Path>, bytes: Arc<Vec<u8>>) -> AppResult<Self> {
        let path = path.as_ref();
        if !bytes.as_slice().starts_with(b"%PDF-") {
            return Err(AppError::invalid_argument(
                "input is not a valid PDF header",
            ));
        }
        let doc_id = calculate_doc_id(path, bytes.len());
        let pdf = Pdf::new(bytes)
            .map_err(|_| AppError::invalid_argument("failed to parse PDF with hayro"))?;

        Ok(Self {
            path: path.to_path_buf(),
            doc_id,
            pdf,
        })
    }

    fn page(&self, page: usize) -> AppResult<&Page<'_>> {
        self.pdf
            .pages()
            .get(page)
            .ok_or_else(|| AppError::invalid_argument("page index is out of range"))
    }
}

fn collect_words(page: &Page<'_>) -> Vec<WordBox> {
    let mut context = Context::new(
        page.initial_transform(true),
        page.intersected_crop_box().to_kurbo(),
        page.xref(),
        InterpreterSettings::default(),
    );
    let mut device = WordCollector::default();
    interpret_page(page, &mut context, &mut device);
    device.finish()
}

const LINE_BREAK_THRESHOLD: f64 = 6.0;
// Used when a word has a single glyph and no advance can be measured.
const FALLBACK_ADVANCE: f64 = 6.0;
const WORD_GAP_FACTOR: f64 = 2.5;
const ASCENT_RATIO: f64 = 0.8;
const DESCENT_RATIO: f64 = 0.2;

struct PendingWord {
    text: String,
    first_x: f64,
    last_x: f64,
    baseline: f64,
    glyphs: usize,
}

impl PendingWord {
    fn average_advance(&self) -> f64 {
        if self.glyphs < 2 {
            return FALLBACK_ADVANCE;
        }
        let advance = (self.last_x - self.first_x) / (self.glyphs - 1) as f64;
        if advance > 0.0 { advance } else { FALLBACK_ADVANCE }
    }

    fn continues_at(&self, x: f64, y: f64) -> bool {
        if (y - self.baseline).abs() > LINE_BREAK_THRESHOLD || x < self.last_x {
            return false;
        }
        x - self.last_x <= self.average_advance() * WORD_GAP_FACTOR
    }

    fn into_raw(self) -> RawWord {
        let advance = self.average_advance();
        RawWord {
            x0: self.first_x,
            x1: self.last_x + advance,
            baseline: self.baseline,
            em: (advance * 2.0).clamp(4.0, 72.0),
            text: self.text,
        }
    }
}

struct RawWord {
    x0: f64,
    x1: f64,
    baseline: f64,
    em: f64,
    text: String,
}

const SAME_LINE_TOLERANCE: f64 = 0.5;

/// Words sharing a baseline get one vertical extent, so sorting by top edge keeps
/// them in left-to-right order.
fn line_aligned_words(raw: Vec<RawWord>) -> Vec<WordBox> {
    let mut words = Vec::with_capacity(raw.len());
    let mut start = 0;
    while start < raw.len() {
        let baseline = raw[start].baseline;
        let mut end = start + 1;
        while end < raw.len() && (raw[end].baseline - baseline).abs() <= SAME_LINE_TOLERANCE {
            end += 1;
        }
        let em = raw[start..end]
            .iter()
            .map(|word| word.em)
            .fold(0.0_f64, f64::max);
        for word in &raw[start..end] {
            let rect = PageRect::new(
                word.x0 as f32,
                (baseline - em * ASCENT_RATIO) as f32,
                word.x1 as f32,
                (baseline + em * DESCENT_RATIO) as f32,
            );
            words.push(WordBox::new(rect, word.text.clone()));
        }
        start = end;
    }
    words
}

/// Groups positioned glyphs into words. Whitespace glyphs, line changes and wide
/// horizontal gaps end the current word.
#[derive(Default)]
struct WordCollector {
    words: Vec<RawWord>,
    pending: Option<PendingWord>,
    last_glyph: Option<(char, i32, i32)>,
}

impl WordCollector {
    fn finish(mut self) -> Vec<WordBox> {
        self.flush();
        line_aligned_words(self.words)
    }

    fn flush(&mut self) {
        if let Some(word) = self.pending.take() {
            self.words.push(word.into_raw());
        }
    }

    fn push_char(&mut self, ch: char, x: f64, y: f64) {
        if ch.is_whitespace() {
            self.flush();
            return;
        }

        if let Some(pending) = self.pending.as_mut()
            && pending.continues_at(x, y)
        {
            pending.text.push(ch);
            pending.last_x = x;
            pending.glyphs += 1;
            return;
        }

        self.flush();
        self.pending = Some(PendingWord {
            text: ch.to_string(),
            first_x: x,
            last_x: x,
            baseline: y,
            glyphs: 1,
        });
    }

    fn is_duplicate_glyph(&self, ch: char, x: f64, y: f64) -> bool {
        self.last_glyph == Some((ch, quantize_coord(x), quantize_coord(y)))
    }
}

impl<'a> Device<'a> for WordCollector {
    fn set_soft_mask(&mut self, _mask: Option<SoftMask<'a>>) {}

    fn set_blend_mode(&mut self, _blend_mode: BlendMode) {}

    fn draw_path(
        &mut self,
        _path: &BezPath,
        _transform: Affine,
        _paint: &Paint<'a>,
        _draw_mode: &PathDrawMode,
    ) {
    }

    fn push_clip_path(&mut self, _clip_path: &ClipPath) {}

    fn push_transparency_group(
        &mut self,
        _opacity: f32,
        _mask: Option<SoftMask<'a>>,
        _blend_mode: BlendMode,
    ) {
    }

    fn draw_glyph(
        &mut self,
        glyph: &Glyph<'a>,
        transform: Affine,
        glyph_transform: Affine,
        _paint: &Paint<'a>,
        _draw_mode: &GlyphDrawMode,
    ) {
        let Some(ch) = glyph.as_unicode() else {
            return;
        };

        let position = (transform * glyph_transform) * Point::ORIGIN;
        // Fake bold draws the same glyph twice at the same spot.
        if self.is_duplicate_glyph(ch, position.x, position.y) {
            return;
        }

        self.last_glyph = Some((ch, quantize_coord(position.x), quantize_coord(position.y)));
        self.push_char(ch, position.x, position.y);
    }

    fn draw_image(&mut self, _image: Image<'a, '_>, _transform: Affine) {}

    fn pop_clip_path(&mut self) {}

    fn pop_transparency_group(&mut self) {}
}

fn quantize_coord(value: f64) -> i32 {
    (value * 100.0).round() as i32
}

fn calculate_doc_id(path: &Path, byte_len: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    byte_len.hash(&mut hasher);
    hasher.finish()
}
