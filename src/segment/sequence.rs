use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::sentence::Sentence;

/// Identity of a sentence that survives resegmentation, unlike its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SentenceKey {
    pub page: usize,
    pub ordinal: usize,
    pub text: String,
}

/// The global reading-order sequence over every resident page. Indices are only valid
/// for the `epoch` they were built in.
#[derive(Debug, Clone, Default)]
pub struct SentenceSequence {
    epoch: u64,
    sentences: Vec<Sentence>,
    pages: BTreeSet<usize>,
}

impl SentenceSequence {
    pub fn new(epoch: u64, mut sentences: Vec<Sentence>, pages: BTreeSet<usize>) -> Self {
        // Stable, so sentences sharing a top edge keep their segmentation order.
        sentences.sort_by(|a, b| {
            a.page_index
                .cmp(&b.page_index)
                .then(a.column.cmp(&b.column))
                .then(a.top().total_cmp(&b.top()))
        });
        Self {
            epoch,
            sentences,
            pages,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sentence> {
        self.sentences.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sentence> {
        self.sentences.iter()
    }

    pub fn pages(&self) -> &BTreeSet<usize> {
        &self.pages
    }

    pub fn contains_page(&self, page: usize) -> bool {
        self.pages.contains(&page)
    }

    pub fn last_page(&self) -> Option<usize> {
        self.pages.last().copied()
    }

    pub fn page_of(&self, index: usize) -> Option<usize> {
        self.get(index).map(|sentence| sentence.page_index)
    }

    pub fn first_on_page(&self, page: usize) -> Option<usize> {
        self.sentences
            .iter()
            .position(|sentence| sentence.page_index == page)
    }

    /// First sentence on `page` or, failing that, on the nearest later resident page.
    pub fn first_at_or_after_page(&self, page: usize) -> Option<usize> {
        self.sentences
            .iter()
            .position(|sentence| sentence.page_index >= page)
    }

    pub fn key(&self, index: usize) -> Option<SentenceKey> {
        self.get(index).map(|sentence| SentenceKey {
            page: sentence.page_index,
            ordinal: sentence.ordinal,
            text: sentence.text.clone(),
        })
    }

    /// Old index to new index for every sentence present in both sequences.
    pub fn index_map(&self, newer: &SentenceSequence) -> BTreeMap<usize, usize> {
        let positions: HashMap<SentenceKey, usize> = (0..newer.len())
            .filter_map(|index| newer.key(index).map(|key| (key, index)))
            .collect();
        (0..self.len())
            .filter_map(|old| {
                let key = self.key(old)?;
                positions.get(&key).map(|new| (old, *new))
            })
            .collect()
    }
}
