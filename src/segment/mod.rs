mod sentence;
mod sequence;

pub use sentence::{ColumnMode, PageGeometry, SegmentParams, Sentence, segment_page};
pub use sequence::{SentenceKey, SentenceSequence};
