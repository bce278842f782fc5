use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NarrationConfig;
use crate::error::{AppError, AppResult};
use crate::segment::SentenceSequence;
use crate::speech::{PlaybackDevice, SpeechProvider};

use super::cache::{AudioCache, ClipRequest, Lookup};
use super::prefetch::spawn_prefetch;
use super::signal::{NarrationSignal, SignalCell};

/// Requests from narration tasks to the presentation context.
#[derive(Debug)]
pub enum NarrationEvent {
    /// Redraw the highlight for `index` of the sequence built in `epoch`.
    Highlight { index: usize, epoch: u64 },
    /// The sequence ran out; pages after `after_page` are needed to continue.
    NeedSentences { after_page: Option<usize> },
    /// A sentence finished and the cursor moved to `index`.
    Advanced { index: usize },
    /// Playback ended by itself, at the end of the document or on a fatal error.
    Finished { error: Option<AppError> },
}

pub type EventSink = Arc<dyn Fn(NarrationEvent) + Send + Sync>;

pub(super) struct Shared {
    pub(super) cache: AudioCache,
    pub(super) signal: SignalCell,
    pub(super) playing: AtomicBool,
    pub(super) prefetch_running: AtomicBool,
    pub(super) speech: Arc<dyn SpeechProvider>,
    pub(super) device: Arc<dyn PlaybackDevice>,
    pub(super) sink: EventSink,
    pub(super) config: NarrationConfig,
}

impl Shared {
    fn emit(&self, event: NarrationEvent) {
        (self.sink)(event);
    }

    fn still_current(&self, run: u64, generation: u64) -> bool {
        self.signal.is_active(run) && self.cache.lock().generation == generation
    }
}

/// Sentence-by-sentence playback with look-ahead synthesis. Skips bump the generation;
/// every suspend point in the playback loop re-checks it before an observable effect.
pub struct Narrator {
    shared: Arc<Shared>,
    playback: Option<JoinHandle<()>>,
}

impl Narrator {
    pub fn new(
        speech: Arc<dyn SpeechProvider>,
        device: Arc<dyn PlaybackDevice>,
        sink: EventSink,
        config: NarrationConfig,
        voice: impl Into<String>,
    ) -> AppResult<Self> {
        let shared = Shared {
            cache: AudioCache::new(voice)?,
            signal: SignalCell::default(),
            playing: AtomicBool::new(false),
            prefetch_running: AtomicBool::new(false),
            speech,
            device,
            sink,
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
            playback: None,
        })
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    pub fn cursor(&self) -> usize {
        self.shared.cache.lock().cursor
    }

    pub fn generation(&self) -> u64 {
        self.shared.cache.lock().generation
    }

    pub fn voice(&self) -> String {
        self.shared.cache.lock().voice.clone()
    }

    pub fn sentences(&self) -> Arc<SentenceSequence> {
        Arc::clone(&self.shared.cache.lock().sentences)
    }

    pub fn cache(&self) -> &AudioCache {
        &self.shared.cache
    }

    /// Moves the cursor without playing. Out-of-range indices are ignored.
    pub fn set_cursor(&mut self, index: usize) -> usize {
        let (cursor, generation) = {
            let mut ledger = self.shared.cache.lock();
            if index >= ledger.sentences.len() || index == ledger.cursor {
                return ledger.cursor;
            }
            ledger.cursor = index;
            ledger.generation = ledger.generation.saturating_add(1);
            (ledger.cursor, ledger.generation)
        };
        self.shared.device.stop();
        self.shared.signal.publish_generation(generation);
        cursor
    }

    /// Starts playback from the cursor, or from the first sentence of `visible_page` when
    /// the cursor sits elsewhere. Returns false if already playing or nothing is loaded.
    pub fn play(&mut self, visible_page: usize) -> AppResult<bool> {
        if self.is_playing() {
            return Ok(false);
        }
        let runtime = Handle::try_current()
            .map_err(|_| AppError::unsupported("narration needs a running tokio runtime"))?;

        let (cursor, generation) = {
            let mut ledger = self.shared.cache.lock();
            if ledger.sentences.is_empty() {
                return Ok(false);
            }
            if ledger.cursor >= ledger.sentences.len() {
                ledger.cursor = 0;
            }
            if ledger.sentences.page_of(ledger.cursor) != Some(visible_page)
                && let Some(first) = ledger
                    .sentences
                    .first_on_page(visible_page)
                    .or_else(|| ledger.sentences.first_at_or_after_page(visible_page))
            {
                ledger.cursor = first;
            }
            ledger.generation = ledger.generation.saturating_add(1);
            (ledger.cursor, ledger.generation)
        };

        let run = self.shared.signal.start_run(generation);
        self.shared.playing.store(true, Ordering::Release);
        // A loop from an earlier run exits on its own once it sees the new run id.
        self.playback = Some(runtime.spawn(playback_loop(Arc::clone(&self.shared), run)));
        spawn_prefetch(&runtime, Arc::clone(&self.shared));
        info!(sentence = cursor, generation, run, "narration started");
        Ok(true)
    }

    /// Returns whether playback was running.
    pub fn stop(&mut self) -> bool {
        let was_playing = self.shared.playing.swap(false, Ordering::AcqRel);
        {
            // The loop checks the generation under this lock right before starting a clip.
            let mut ledger = self.shared.cache.lock();
            ledger.generation = ledger.generation.saturating_add(1);
            self.shared.signal.stop();
        }
        self.shared.device.stop();
        if was_playing {
            info!(sentence = self.cursor(), "narration stopped");
        }
        was_playing
    }

    /// Returns the new playing state.
    pub fn toggle(&mut self, visible_page: usize) -> AppResult<bool> {
        if self.is_playing() {
            self.stop();
            return Ok(false);
        }
        self.play(visible_page)
    }

    pub fn next(&mut self) -> Option<usize> {
        self.step(true)
    }

    pub fn prev(&mut self) -> Option<usize> {
        self.step(false)
    }

    fn step(&mut self, forward: bool) -> Option<usize> {
        let (index, generation) = {
            let mut ledger = self.shared.cache.lock();
            let len = ledger.sentences.len();
            let target = if forward {
                Some(ledger.cursor + 1).filter(|&next| next < len)
            } else {
                ledger.cursor.min(len).checked_sub(1)
            }?;
            ledger.cursor = target;
            ledger.generation = ledger.generation.saturating_add(1);
            (target, ledger.generation)
        };
        self.shared.device.stop();
        self.shared.signal.publish_generation(generation);
        debug!(sentence = index, generation, "cursor skipped");
        Some(index)
    }

    /// Installs a rebuilt sequence. The cursor follows its sentence when it survives, so
    /// playback continues; otherwise it moves to the first sentence of the same page and
    /// playback restarts there. Returns the new cursor.
    pub fn replace_sentences(&mut self, sentences: Arc<SentenceSequence>) -> usize {
        let mut restarted = None;
        let cursor = {
            let mut ledger = self.shared.cache.lock();
            let old = Arc::clone(&ledger.sentences);
            let map = old.index_map(&sentences);

            let follows = map.get(&ledger.cursor).copied().or_else(|| {
                // Past the end: continue after the last sentence played.
                (ledger.cursor >= old.len())
                    .then(|| old.len().checked_sub(1))
                    .flatten()
                    .and_then(|last| map.get(&last))
                    .map(|last| last + 1)
            });

            match follows {
                Some(index) => {
                    ledger.cursor = index;
                    ledger.rekey(&map);
                }
                None => {
                    let fallback = old.page_of(ledger.cursor).and_then(|page| {
                        sentences
                            .first_on_page(page)
                            .or_else(|| sentences.first_at_or_after_page(page))
                    });
                    ledger.cursor = fallback
                        .unwrap_or_else(|| ledger.cursor.min(sentences.len().saturating_sub(1)));
                    ledger.generation = ledger.generation.saturating_add(1);
                    ledger.clear();
                    restarted = Some(ledger.generation);
                }
            }
            ledger.sentences = sentences;
            ledger.cursor
        };

        if let Some(generation) = restarted {
            if self.is_playing() {
                self.shared.device.stop();
            }
            self.shared.signal.publish_generation(generation);
            debug!(sentence = cursor, generation, "sequence changed under the cursor");
        }
        self.shared.signal.bump_revision();
        cursor
    }

    /// Clips synthesized with the old voice are dropped and the current sentence restarts
    /// in the new one. Returns false if unchanged.
    pub fn set_voice(&mut self, voice: &str) -> bool {
        let generation = {
            let mut ledger = self.shared.cache.lock();
            if ledger.voice == voice {
                return false;
            }
            ledger.voice = voice.to_string();
            ledger.clear();
            ledger.generation = ledger.generation.saturating_add(1);
            ledger.generation
        };
        if self.is_playing() {
            self.shared.device.stop();
        }
        self.shared.signal.publish_generation(generation);
        self.shared.signal.bump_revision();
        info!(voice, generation, "narration voice changed");
        true
    }
}

impl Drop for Narrator {
    fn drop(&mut self) {
        self.stop();
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
    }
}

enum PlaybackEnd {
    Completed,
    Interrupted,
}

async fn playback_loop(shared: Arc<Shared>, run: u64) {
    let outcome = drive(&shared, run).await;
    // Only the active run reports; a user stop or a newer run already took over.
    if !shared.signal.stop_run(run) {
        return;
    }
    shared.playing.store(false, Ordering::Release);
    let error = outcome.err();
    match &error {
        Some(err) => {
            shared.device.stop();
            warn!(run, "narration failed: {err}");
        }
        None => info!(run, "narration reached the end of the loaded text"),
    }
    shared.emit(NarrationEvent::Finished { error });
}

async fn drive(shared: &Arc<Shared>, run: u64) -> AppResult<()> {
    let mut rx = shared.signal.subscribe();
    let mut settled = shared.signal.current().generation;

    loop {
        if !shared.signal.is_active(run) {
            return Ok(());
        }
        if shared.signal.current().generation != settled {
            if !wait_until_settled(shared, run, &mut rx).await {
                return Ok(());
            }
        }

        let (index, generation, epoch, lookup, last_page) = {
            let ledger = shared.cache.lock();
            (
                ledger.cursor,
                ledger.generation,
                ledger.sentences.epoch(),
                ledger.lookup(ledger.cursor),
                ledger.sentences.last_page(),
            )
        };
        settled = generation;

        let request = match lookup {
            Lookup::OutOfRange => {
                // Read first: the grown sequence may be installed before emit returns.
                let revision = shared.signal.current().revision;
                shared.emit(NarrationEvent::NeedSentences {
                    after_page: last_page,
                });
                let changed = wait_for(&mut rx, shared.config.page_wait(), |signal| {
                    signal.revision != revision
                        || signal.generation != generation
                        || signal.run != run
                        || signal.stopped
                })
                .await;
                if !changed {
                    return Ok(());
                }
                continue;
            }
            Lookup::Cached(path) => {
                shared.emit(NarrationEvent::Highlight { index, epoch });
                Ok(path)
            }
            Lookup::Missing(request) => {
                shared.emit(NarrationEvent::Highlight { index, epoch });
                Err(request)
            }
        };
        let clip = match request {
            Ok(path) => path,
            Err(request) => match synthesize_now(shared, run, generation, request, &mut rx).await? {
                Some(path) => path,
                None => continue,
            },
        };

        {
            let ledger = shared.cache.lock();
            if ledger.generation != generation || !shared.signal.is_active(run) {
                continue;
            }
            shared.device.load(&clip)?;
            shared.device.play()?;
        }
        debug!(sentence = index, generation, "playing sentence");

        if let PlaybackEnd::Interrupted = wait_for_playback(shared, run, generation, &mut rx).await {
            continue;
        }

        let advanced = {
            let mut ledger = shared.cache.lock();
            if ledger.generation != generation {
                None
            } else {
                let played = ledger.cursor;
                ledger.evict_before(played.saturating_sub(1));
                ledger.cursor = played + 1;
                Some(ledger.cursor)
            }
        };
        if let Some(index) = advanced {
            shared.emit(NarrationEvent::Advanced { index });
        }
    }
}

/// Waits until no skip has landed for `skip_settle`. False when the run ended.
async fn wait_until_settled(
    shared: &Shared,
    run: u64,
    rx: &mut watch::Receiver<NarrationSignal>,
) -> bool {
    loop {
        let before = shared.signal.current();
        if before.run != run || before.stopped {
            return false;
        }
        let moved = wait_for(rx, shared.config.skip_settle(), |signal| {
            signal.generation != before.generation || signal.run != run || signal.stopped
        })
        .await;
        if !moved {
            return true;
        }
    }
}

/// Fallback synthesis on a blocking thread, abandoned as soon as a skip or stop lands.
/// The clip is still cached when it completes under the same cache epoch.
async fn synthesize_now(
    shared: &Arc<Shared>,
    run: u64,
    generation: u64,
    request: ClipRequest,
    rx: &mut watch::Receiver<NarrationSignal>,
) -> AppResult<Option<PathBuf>> {
    let worker = Arc::clone(shared);
    let index = request.index;
    let task = tokio::task::spawn_blocking(move || {
        worker.cache.synthesize(&request, worker.speech.as_ref())
    });

    tokio::select! {
        joined = task => {
            let result = joined
                .map_err(|err| AppError::synthesis(format!("synthesis task failed: {err}")))?;
            if !shared.still_current(run, generation) {
                debug!(sentence = index, "discarding synthesis for a stale cursor");
                return Ok(None);
            }
            result
        }
        _ = wait_for(rx, Duration::MAX, |signal| {
            signal.generation != generation || signal.run != run || signal.stopped
        }) => Ok(None),
    }
}

async fn wait_for_playback(
    shared: &Shared,
    run: u64,
    generation: u64,
    rx: &mut watch::Receiver<NarrationSignal>,
) -> PlaybackEnd {
    let poll = shared.config.playback_poll();
    loop {
        if !shared.device.is_busy() {
            return if shared.still_current(run, generation) {
                PlaybackEnd::Completed
            } else {
                PlaybackEnd::Interrupted
            };
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = rx.changed() => {}
        }
        if !shared.still_current(run, generation) {
            shared.device.stop();
            return PlaybackEnd::Interrupted;
        }
    }
}

/// True when `done` held before `limit` elapsed.
async fn wait_for(
    rx: &mut watch::Receiver<NarrationSignal>,
    limit: Duration,
    mut done: impl FnMut(&NarrationSignal) -> bool,
) -> bool {
    let waited = async { rx.wait_for(|signal| done(signal)).await.is_ok() };
    if limit == Duration::MAX {
        return waited.await;
    }
    tokio::time::timeout(limit, waited).await.unwrap_or(false)
}
