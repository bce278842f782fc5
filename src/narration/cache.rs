use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::segment::SentenceSequence;
use crate::speech::SpeechProvider;

/// Everything the playback loop and the prefetch worker share, behind one lock.
#[derive(Debug)]
pub struct Ledger {
    pub cursor: usize,
    pub generation: u64,
    pub voice: String,
    pub sentences: Arc<SentenceSequence>,
    epoch: u64,
    clips: BTreeMap<usize, PathBuf>,
}

/// What is needed to synthesize one sentence, captured under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    pub index: usize,
    pub epoch: u64,
    pub text: String,
    pub voice: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Cached(PathBuf),
    Missing(ClipRequest),
    OutOfRange,
}

impl Ledger {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn clip(&self, index: usize) -> Option<&Path> {
        self.clips.get(&index).map(PathBuf::as_path)
    }

    pub fn cached_indices(&self) -> Vec<usize> {
        self.clips.keys().copied().collect()
    }

    pub fn lookup(&self, index: usize) -> Lookup {
        if let Some(path) = self.clips.get(&index) {
            return Lookup::Cached(path.clone());
        }
        match self.sentences.get(index) {
            Some(sentence) => Lookup::Missing(ClipRequest {
                index,
                epoch: self.epoch,
                text: sentence.text.clone(),
                voice: self.voice.clone(),
            }),
            None => Lookup::OutOfRange,
        }
    }

    /// Deletes every entry below `index`.
    pub fn evict_before(&mut self, index: usize) {
        let kept = self.clips.split_off(&index);
        let stale = std::mem::replace(&mut self.clips, kept);
        for (stale_index, path) in stale {
            remove_clip(stale_index, &path);
        }
    }

    /// Drops all entries and invalidates syntheses still in flight.
    pub fn clear(&mut self) {
        self.epoch = self.epoch.saturating_add(1);
        for (index, path) in std::mem::take(&mut self.clips) {
            remove_clip(index, &path);
        }
    }

    /// Moves entries to their new indices; entries missing from `map` are deleted.
    /// In-flight syntheses keyed by old indices are invalidated.
    pub fn rekey(&mut self, map: &BTreeMap<usize, usize>) {
        self.epoch = self.epoch.saturating_add(1);
        let mut moved = BTreeMap::new();
        for (old, path) in std::mem::take(&mut self.clips) {
            match map.get(&old) {
                Some(&new) => {
                    moved.insert(new, path);
                }
                None => remove_clip(old, &path),
            }
        }
        self.clips = moved;
    }
}

fn remove_clip(index: usize, path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!(sentence = index, path = %path.display(), "failed to remove cached clip: {err}");
    }
}

/// Session-scoped clip files keyed by sentence index. The directory disappears with the
/// cache.
#[derive(Debug)]
pub struct AudioCache {
    dir: TempDir,
    next_file: AtomicU64,
    ledger: Mutex<Ledger>,
}

impl AudioCache {
    pub fn new(voice: impl Into<String>) -> AppResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pdfest-audio-")
            .tempdir()
            .map_err(|source| AppError::io_with_context(source, "failed to create audio cache"))?;
        Ok(Self {
            dir,
            next_file: AtomicU64::new(0),
            ledger: Mutex::new(Ledger {
                cursor: 0,
                generation: 0,
                voice: voice.into(),
                sentences: Arc::new(SentenceSequence::default()),
                epoch: 0,
                clips: BTreeMap::new(),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn lookup(&self, index: usize) -> Lookup {
        self.lock().lookup(index)
    }

    /// Writes a synthesized clip. Returns `None` when the cache was invalidated after
    /// the request was captured or the sentence lies behind the trailing entry; an
    /// existing entry wins over a duplicate.
    pub fn store(&self, request: &ClipRequest, audio: &[u8]) -> AppResult<Option<PathBuf>> {
        let serial = self.next_file.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.path().join(format!("clip-{serial}.wav"));
        fs::write(&path, audio).map_err(|source| {
            AppError::io_with_context(source, format!("failed to write {}", path.display()))
        })?;

        let mut ledger = self.lock();
        if ledger.epoch != request.epoch {
            drop(ledger);
            remove_clip(request.index, &path);
            debug!(sentence = request.index, epoch = request.epoch, "discarded stale clip");
            return Ok(None);
        }
        // Playback already moved past this sentence and evicted its neighbours.
        if request.index.saturating_add(1) < ledger.cursor {
            drop(ledger);
            remove_clip(request.index, &path);
            return Ok(None);
        }
        if let Some(existing) = ledger.clips.get(&request.index) {
            let existing = existing.clone();
            drop(ledger);
            remove_clip(request.index, &path);
            return Ok(Some(existing));
        }
        ledger.clips.insert(request.index, path.clone());
        Ok(Some(path))
    }

    /// Blocking synthesis followed by `store`.
    pub fn synthesize(
        &self,
        request: &ClipRequest,
        speech: &dyn SpeechProvider,
    ) -> AppResult<Option<PathBuf>> {
        let audio = speech.synthesize(&request.text, &request.voice)?;
        self.store(request, &audio)
    }

    /// Idempotent: returns the cached clip without synthesizing when present. `None`
    /// means the index is out of range or the result went stale.
    pub fn ensure(&self, index: usize, speech: &dyn SpeechProvider) -> AppResult<Option<PathBuf>> {
        match self.lookup(index) {
            Lookup::Cached(path) => Ok(Some(path)),
            Lookup::Missing(request) => self.synthesize(&request, speech),
            Lookup::OutOfRange => Ok(None),
        }
    }

    pub fn evict_before(&self, index: usize) {
        self.lock().evict_before(index);
    }
}
