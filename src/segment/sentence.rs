use serde::{Deserialize, Serialize};

use crate::backend::{PageRect, WordBox};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ColumnMode {
    #[default]
    Single,
    Double,
}

impl ColumnMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Single => Self::Double,
            Self::Double => Self::Single,
        }
    }
}

impl TryFrom<u8> for ColumnMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Single),
            2 => Ok(Self::Double),
            other => Err(format!("column mode must be 1 or 2, got {other}")),
        }
    }
}

impl From<ColumnMode> for u8 {
    fn from(mode: ColumnMode) -> Self {
        match mode {
            ColumnMode::Single => 1,
            ColumnMode::Double => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentParams {
    pub header_margin: f32,
    pub footer_margin: f32,
    pub column_mode: ColumnMode,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            header_margin: 50.0,
            footer_margin: 60.0,
            column_mode: ColumnMode::Single,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentence {
    pub text: String,
    /// One box per word, page-local and already multiplied by the zoom.
    #[serde(skip)]
    pub boxes: Vec<PageRect>,
    pub page_index: usize,
    pub page_y_offset: f32,
    /// Position of the sentence within its page's segmentation output.
    pub ordinal: usize,
    /// 0 for the left column (or single-column pages), 1 for the right column.
    pub column: u8,
}

impl Sentence {
    pub fn top(&self) -> f32 {
        self.boxes.first().map_or(0.0, |rect| rect.y0)
    }

    pub fn global_top(&self) -> f32 {
        self.page_y_offset + self.top()
    }
}

/// Page-level inputs for segmentation.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub index: usize,
    pub size: (f32, f32),
    pub zoom: f32,
    pub y_offset: f32,
}

pub fn segment_page(
    page: PageGeometry,
    words: &[WordBox],
    params: &SegmentParams,
) -> Vec<Sentence> {
    let (page_width, page_height) = page.size;
    let kept = words
        .iter()
        .filter(|word| !in_margin(word, page_height, params))
        .collect::<Vec<_>>();
    let ordered = reading_order(kept, page_width, params.column_mode);

    let mut sentences = Vec::new();
    let mut pending: Vec<(&WordBox, u8)> = Vec::new();
    for (word, column) in ordered {
        pending.push((word, column));
        if ends_sentence(&word.text) {
            sentences.push(close_sentence(&page, sentences.len(), &mut pending));
        }
    }
    if !pending.is_empty() {
        sentences.push(close_sentence(&page, sentences.len(), &mut pending));
    }
    sentences
}

fn in_margin(word: &WordBox, page_height: f32, params: &SegmentParams) -> bool {
    let top = word.rect.y0;
    (params.header_margin > 0.0 && top < params.header_margin)
        || (params.footer_margin > 0.0 && top > page_height - params.footer_margin)
}

fn reading_order(words: Vec<&WordBox>, page_width: f32, mode: ColumnMode) -> Vec<(&WordBox, u8)> {
    match mode {
        ColumnMode::Single => words.into_iter().map(|word| (word, 0)).collect(),
        ColumnMode::Double => {
            let mid = page_width / 2.0;
            let (mut left, mut right): (Vec<&WordBox>, Vec<&WordBox>) =
                words.into_iter().partition(|word| column_of(&word.rect, mid) == 0);
            left.sort_by(|a, b| by_y_then_x(&a.rect, &b.rect));
            right.sort_by(|a, b| by_y_then_x(&a.rect, &b.rect));
            left.into_iter()
                .map(|word| (word, 0))
                .chain(right.into_iter().map(|word| (word, 1)))
                .collect()
        }
    }
}

/// Words straddling the gutter go to the column holding their centre.
pub(crate) fn column_of(rect: &PageRect, mid: f32) -> u8 {
    if rect.x1 < mid {
        0
    } else if rect.x0 >= mid {
        1
    } else if rect.center_x() < mid {
        0
    } else {
        1
    }
}

fn by_y_then_x(a: &PageRect, b: &PageRect) -> std::cmp::Ordering {
    a.y0.total_cmp(&b.y0).then(a.x0.total_cmp(&b.x0))
}

fn ends_sentence(text: &str) -> bool {
    text.ends_with(['.', '!', '?'])
}

fn close_sentence(page: &PageGeometry, ordinal: usize, pending: &mut Vec<(&WordBox, u8)>) -> Sentence {
    let column = pending.first().map_or(0, |(_, column)| *column);
    let text = pending
        .iter()
        .map(|(word, _)| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let boxes = pending
        .iter()
        .map(|(word, _)| word.rect.scaled(page.zoom))
        .collect();
    pending.clear();
    Sentence {
        text,
        boxes,
        page_index: page.index,
        page_y_offset: page.y_offset,
        ordinal,
        column,
    }
}
