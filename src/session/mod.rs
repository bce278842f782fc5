mod events;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::{LinkTarget, OutlineEntry};
use crate::config::Config;
use crate::document::{
    DocumentHandle, DocumentInfo, DocumentLoader, DocumentWorker, HayroDocumentLoader,
    LoadedPage,
};
use crate::error::{AppError, AppResult};
use crate::highlight::{HighlightRenderer, autoscroll_target};
use crate::narration::{EventSink, NarrationEvent, Narrator};
use crate::pages::PageStore;
use crate::segment::{ColumnMode, PageGeometry, SegmentParams, SentenceSequence, segment_page};
use crate::speech::{
    CommandPlayback, EspeakSpeech, PlaybackDevice, SpeechProvider, Voice, sort_voices,
};
use crate::store::{
    DocumentState, GlobalSettings, MemoryStateStore, StateStore, TomlStateStore,
    default_data_dir,
};
use crate::viewport::{Layout, Viewport, ZOOM_STEP};

pub use events::{Notice, SessionEvent};

const NOTICE_CAPACITY: usize = 256;

/// External collaborators a session talks to.
pub struct SessionDeps {
    pub loader: Arc<dyn DocumentLoader>,
    pub speech: Arc<dyn SpeechProvider>,
    pub device: Arc<dyn PlaybackDevice>,
    pub store: Arc<dyn StateStore>,
}

impl SessionDeps {
    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn StateStore> =
            match config.store.data_dir.clone().or_else(default_data_dir) {
                Some(root) => Arc::new(TomlStateStore::new(root)),
                None => {
                    warn!("no data directory available; reading progress will not persist");
                    Arc::new(MemoryStateStore::new())
                }
            };
        Self {
            loader: Arc::new(HayroDocumentLoader),
            speech: Arc::new(EspeakSpeech::from_config(&config.speech)),
            device: Arc::new(CommandPlayback::from_config(&config.speech)),
            store,
        }
    }
}

/// Everything one open document needs: viewport, resident pages, sentences, highlight and
/// narration. Methods run on the presentation context; background work reports back
/// through `SessionEvent`s applied by `handle_event`.
pub struct Session {
    config: Config,
    info: DocumentInfo,
    document: DocumentHandle,
    viewport: Viewport,
    pages: PageStore,
    params: SegmentParams,
    sentences: Arc<SentenceSequence>,
    segment_epoch: u64,
    highlight: HighlightRenderer,
    narrator: Narrator,
    speech: Arc<dyn SpeechProvider>,
    store: Arc<dyn StateStore>,
    global: GlobalSettings,
    events_tx: flume::Sender<SessionEvent>,
    events_rx: flume::Receiver<SessionEvent>,
    notices: broadcast::Sender<Notice>,
    _worker: DocumentWorker,
}

impl Session {
    /// Opens the document and restores its reading state. Nothing is created when the
    /// document cannot be opened.
    pub async fn open(
        path: impl Into<PathBuf>,
        config: Config,
        deps: SessionDeps,
    ) -> AppResult<Self> {
        let config = config.sanitized();
        let worker = DocumentWorker::spawn_with_loader(path.into(), deps.loader).await?;
        let info = worker.info().clone();

        let stored = deps.store.load_document(&info.path).unwrap_or_else(|err| {
            warn!(path = %info.path.display(), "failed to load document state: {err}");
            None
        });
        let mut global = deps.store.load_global().unwrap_or_else(|err| {
            warn!("failed to load settings: {err}");
            GlobalSettings::default()
        });
        let state = stored.clone().unwrap_or_else(|| DocumentState {
            zoom: config.viewport.default_zoom,
            ..DocumentState::default()
        });

        let layout = Layout::new(
            info.page_count,
            info.first_page_size,
            state.zoom,
            (config.viewport.viewport_width, config.viewport.viewport_height),
        );
        let viewport = Viewport::new(layout, config.viewport.policy());

        let (events_tx, events_rx) = flume::unbounded();
        let narration_tx = events_tx.clone();
        let sink: EventSink = Arc::new(move |event| {
            let _ = narration_tx.send(SessionEvent::Narration(event));
        });
        let voice = global
            .voice
            .clone()
            .unwrap_or_else(|| config.narration.default_voice.clone());
        let narrator = Narrator::new(
            Arc::clone(&deps.speech),
            deps.device,
            sink,
            config.narration.clone(),
            voice,
        )?;
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        global.last_document = Some(info.path.clone());

        let mut session = Self {
            document: worker.handle(),
            pages: PageStore::new(global.brightness),
            params: state.segment_params(),
            sentences: Arc::new(SentenceSequence::default()),
            segment_epoch: 0,
            highlight: HighlightRenderer::default(),
            narrator,
            speech: deps.speech,
            store: deps.store,
            global,
            events_tx,
            events_rx,
            notices,
            viewport,
            info,
            config,
            _worker: worker,
        };

        if state.last_page > 0 && state.last_page < session.info.page_count {
            session.goto(state.last_page).await;
        } else {
            let first = session.viewport.goto_range(0);
            session.ensure_range(first.start, first.end).await;
        }
        if stored.is_some() {
            session.restore_cursor(state.last_page, state.last_sentence);
        }
        session.save_global();
        session.checkpoint();
        info!(
            path = %session.info.path.display(),
            pages = session.info.page_count,
            resident = session.pages.len(),
            sentences = session.sentences.len(),
            "session opened"
        );
        Ok(session)
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.viewport.layout
    }

    pub fn visible_page(&self) -> usize {
        self.viewport.visible_page()
    }

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    pub fn sentences(&self) -> &SentenceSequence {
        &self.sentences
    }

    pub fn segment_params(&self) -> SegmentParams {
        self.params
    }

    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    pub fn highlighted_page(&self) -> Option<usize> {
        self.highlight.highlighted_page()
    }

    pub fn is_playing(&self) -> bool {
        self.narrator.is_playing()
    }

    pub fn cursor(&self) -> usize {
        self.narrator.cursor()
    }

    pub fn voice(&self) -> String {
        self.narrator.voice()
    }

    pub fn brightness(&self) -> f32 {
        self.pages.brightness()
    }

    pub fn is_loading(&self) -> bool {
        self.viewport.is_loading()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    // Viewport

    /// Scroll position changed; returns the visible page.
    pub fn on_scroll(&mut self, scroll_top: f32) -> usize {
        self.viewport.layout.set_scroll_top(scroll_top);
        self.after_scroll();
        self.viewport.visible_page()
    }

    pub fn scroll_by(&mut self, delta: f32) -> usize {
        self.viewport.layout.scroll_by(delta);
        self.after_scroll();
        self.viewport.visible_page()
    }

    pub fn set_viewport_size(&mut self, width: f32, height: f32) {
        self.viewport.layout.set_viewport_size(width, height);
        self.after_scroll();
    }

    /// Loads every missing page in `[lo, hi)` before returning. Indices past the end are
    /// ignored. Returns the number of pages loaded.
    pub async fn ensure_range(&mut self, lo: usize, hi: usize) -> usize {
        let hi = hi.min(self.info.page_count);
        let zoom = self.viewport.layout.zoom();
        let mut loaded = 0;
        for page in lo..hi {
            if self.pages.contains(page) {
                continue;
            }
            match self.document.load_page(page, zoom).await {
                Ok(result) => {
                    self.install(result);
                    loaded += 1;
                }
                Err(err) => warn!(page, "page load failed: {err}"),
            }
        }
        self.settle_residency(loaded > 0);
        loaded
    }

    /// Jumps to `page` with its whole batch resident. Out-of-range pages are ignored.
    pub async fn goto(&mut self, page: usize) -> bool {
        if page >= self.info.page_count {
            debug!(page, total = self.info.page_count, "goto ignored");
            return false;
        }
        self.viewport.layout.scroll_to_page(page);
        let range = self.viewport.goto_range(page);
        self.ensure_range(range.start, range.end).await;
        self.notify_scrolled();
        true
    }

    /// Re-rasterizes the resident set at the new zoom, keeping the scroll fraction.
    /// Returns false when the clamped zoom did not change.
    pub async fn set_zoom(&mut self, zoom: f32) -> bool {
        if !self.viewport.layout.set_zoom(zoom) {
            return false;
        }
        let epoch = self.viewport.bump_layout_epoch();
        let zoom = self.viewport.layout.zoom();
        let had_highlight = self.highlight.highlighted_page().is_some();
        debug!(zoom, epoch, resident = self.pages.len(), "re-rasterizing for zoom");

        for page in self.pages.resident() {
            match self.document.load_page(page, zoom).await {
                Ok(result) => self.install(result),
                Err(err) => {
                    warn!(page, zoom, "page reload failed: {err}");
                    self.pages.remove(page);
                    self.highlight.forget(page);
                }
            }
        }
        self.resegment();
        if had_highlight {
            self.redraw_cursor();
        }
        self.notify(Notice::PagesChanged {
            resident: self.pages.resident().into_iter().collect(),
        });
        self.after_scroll();
        self.checkpoint();
        true
    }

    pub async fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.viewport.layout.zoom() + ZOOM_STEP).await
    }

    pub async fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.viewport.layout.zoom() - ZOOM_STEP).await
    }

    // Segmentation settings

    pub fn set_margins(&mut self, header_margin: f32, footer_margin: f32) {
        self.params.header_margin = non_negative(header_margin);
        self.params.footer_margin = non_negative(footer_margin);
        self.resegment();
        self.checkpoint();
    }

    pub fn set_column_mode(&mut self, mode: ColumnMode) {
        if self.params.column_mode == mode {
            return;
        }
        self.params.column_mode = mode;
        self.resegment();
        self.checkpoint();
    }

    pub fn toggle_column_mode(&mut self) -> ColumnMode {
        self.set_column_mode(self.params.column_mode.toggled());
        self.params.column_mode
    }

    /// Returns the clamped brightness.
    pub fn set_brightness(&mut self, brightness: f32) -> f32 {
        let had_highlight = self.highlight.highlighted_page().is_some();
        let applied = self.pages.set_brightness(brightness);
        if had_highlight {
            self.redraw_cursor();
        }
        self.global.brightness = applied;
        self.save_global();
        applied
    }

    // Narration

    pub fn set_voice(&mut self, voice: &str) -> bool {
        if !self.narrator.set_voice(voice) {
            return false;
        }
        self.global.voice = Some(voice.to_string());
        self.save_global();
        true
    }

    pub async fn voices(&self) -> AppResult<Vec<Voice>> {
        let speech = Arc::clone(&self.speech);
        let mut voices = tokio::task::spawn_blocking(move || speech.list_voices())
            .await
            .map_err(|err| AppError::synthesis(format!("voice listing task failed: {err}")))??;
        sort_voices(&mut voices);
        Ok(voices)
    }

    pub fn play(&mut self) -> AppResult<bool> {
        let started = self.narrator.play(self.viewport.visible_page())?;
        if started {
            self.notify(Notice::PlaybackStarted {
                sentence: self.narrator.cursor(),
            });
        }
        Ok(started)
    }

    /// Returns the new playing state.
    pub fn toggle_play(&mut self) -> AppResult<bool> {
        if self.narrator.is_playing() {
            self.stop();
            return Ok(false);
        }
        self.play()
    }

    pub fn stop(&mut self) -> bool {
        let was_playing = self.narrator.stop();
        if was_playing {
            self.checkpoint();
            self.notify(Notice::PlaybackStopped {
                sentence: self.narrator.cursor(),
            });
        }
        was_playing
    }

    pub fn next_sentence(&mut self) -> Option<usize> {
        let index = self.narrator.next()?;
        self.show_sentence(index);
        Some(index)
    }

    pub fn prev_sentence(&mut self) -> Option<usize> {
        let index = self.narrator.prev()?;
        self.show_sentence(index);
        Some(index)
    }

    /// Moves the cursor to `index` and highlights it without playing.
    pub fn select_sentence(&mut self, index: usize) -> bool {
        if index >= self.sentences.len() {
            return false;
        }
        self.narrator.set_cursor(index);
        self.show_sentence(index)
    }

    // Links and table of contents

    /// The document outline, or one `Page N` entry per page when it has none.
    pub async fn outline(&self) -> AppResult<Vec<OutlineEntry>> {
        let outline = self.document.outline().await?;
        if !outline.is_empty() {
            return Ok(outline);
        }
        Ok((0..self.info.page_count)
            .map(|page| OutlineEntry {
                level: 0,
                title: format!("Page {}", page + 1),
                page,
            })
            .collect())
    }

    /// Link under a canvas position on a resident page.
    pub async fn link_at(&self, canvas_x: f32, canvas_y: f32) -> AppResult<Option<LinkTarget>> {
        let layout = &self.viewport.layout;
        let Some(page) = layout.page_at(canvas_y) else {
            return Ok(None);
        };
        if !self.pages.contains(page) {
            return Ok(None);
        }
        let zoom = layout.zoom();
        let x = (canvas_x - layout.page_x_offset()) / zoom;
        let y = (canvas_y - layout.page_y_offset(page)) / zoom;
        let links = self.document.links(page).await?;
        Ok(links
            .into_iter()
            .find(|link| link.rect.contains(x, y))
            .map(|link| link.target))
    }

    /// Internal targets are followed; external URIs are handed back to the caller.
    pub async fn follow_link(&mut self, target: LinkTarget) -> Option<String> {
        match target {
            LinkTarget::Page(page) => {
                self.goto(page).await;
                None
            }
            LinkTarget::Uri(uri) => Some(uri),
        }
    }

    // Persistence

    pub fn save_progress(&self) -> AppResult<()> {
        let visible = self.viewport.visible_page();
        let cursor = self.narrator.cursor();
        let last_sentence = match (
            self.sentences.page_of(cursor),
            self.sentences.first_on_page(visible),
        ) {
            (Some(page), Some(first)) if page == visible => cursor - first,
            _ => 0,
        };
        let state = DocumentState {
            last_page: visible,
            last_sentence,
            zoom: self.viewport.layout.zoom(),
            header_margin: self.params.header_margin,
            footer_margin: self.params.footer_margin,
            column_mode: self.params.column_mode,
        };
        self.store.save_document(&self.info.path, &state)
    }

    pub fn close(mut self) {
        self.stop();
        self.checkpoint();
        info!(path = %self.info.path.display(), "session closed");
    }

    fn checkpoint(&self) {
        if let Err(err) = self.save_progress() {
            warn!(path = %self.info.path.display(), "failed to save progress: {err}");
        }
    }

    fn save_global(&self) {
        if let Err(err) = self.store.save_global(&self.global) {
            warn!("failed to save settings: {err}");
        }
    }

    fn restore_cursor(&mut self, page: usize, offset: usize) {
        let Some(first) = self.sentences.first_on_page(page) else {
            return;
        };
        let index = first + offset;
        let index = if self.sentences.page_of(index) == Some(page) {
            index
        } else {
            first
        };
        self.narrator.set_cursor(index);
    }

    // Events

    pub async fn next_event(&self) -> Option<SessionEvent> {
        self.events_rx.recv_async().await.ok()
    }

    pub fn try_next_event(&self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Applies everything queued so far. Stops at the first narration error.
    pub fn drain_events(&mut self) -> AppResult<usize> {
        let mut applied = 0;
        while let Some(event) = self.try_next_event() {
            self.handle_event(event)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Applies background events until narration ends by itself or `interrupt` resolves,
    /// which stops playback. `observe` runs after every applied event. Call after a
    /// successful [`Session::play`]; the error a failed narration ended with is returned.
    pub async fn run_until_finished(
        &mut self,
        interrupt: impl Future<Output = ()>,
        mut observe: impl FnMut(&Self),
    ) -> AppResult<()> {
        enum Wake {
            Event(Option<SessionEvent>),
            Interrupted,
        }

        tokio::pin!(interrupt);
        loop {
            let wake = tokio::select! {
                event = self.next_event() => Wake::Event(event),
                () = &mut interrupt => Wake::Interrupted,
            };
            match wake {
                Wake::Event(Some(event)) => {
                    let finished = matches!(
                        event,
                        SessionEvent::Narration(NarrationEvent::Finished { .. })
                    );
                    let applied = self.handle_event(event);
                    observe(self);
                    applied?;
                    if finished {
                        return Ok(());
                    }
                }
                Wake::Event(None) => return Ok(()),
                Wake::Interrupted => {
                    self.stop();
                    observe(self);
                    return Ok(());
                }
            }
        }
    }

    /// Applies a background result. A narration session that ended on a synthesis or
    /// playback failure returns that error.
    pub fn handle_event(&mut self, event: SessionEvent) -> AppResult<()> {
        match event {
            SessionEvent::PagesLoaded {
                layout_epoch,
                results,
            } => {
                self.viewport.finish_load();
                self.apply_loaded(layout_epoch, results);
                Ok(())
            }
            SessionEvent::Narration(event) => self.apply_narration(event),
        }
    }

    fn apply_loaded(&mut self, layout_epoch: u64, results: Vec<AppResult<LoadedPage>>) {
        if layout_epoch != self.viewport.layout_epoch() {
            debug!(layout_epoch, "discarding pages rasterized for an old layout");
            self.check_lazy_load();
            return;
        }
        let mut changed = false;
        for result in results {
            match result {
                Ok(loaded) if !self.pages.contains(loaded.index) => {
                    self.install(loaded);
                    changed = true;
                }
                Ok(_) => {}
                Err(err) => warn!("lazy page load failed: {err}"),
            }
        }
        self.settle_residency(changed);
        // Failed loads would be planned again right away.
        if changed {
            self.check_lazy_load();
        }
    }

    fn apply_narration(&mut self, event: NarrationEvent) -> AppResult<()> {
        match event {
            NarrationEvent::Highlight { index, epoch } => {
                if epoch == self.sentences.epoch() {
                    self.show_sentence(index);
                } else {
                    // The sequence was rebuilt since; the cursor already points into the new one.
                    let cursor = self.narrator.cursor();
                    debug!(sentence = index, epoch, cursor, "stale highlight request");
                    self.show_sentence(cursor);
                }
            }
            NarrationEvent::NeedSentences { after_page } => self.load_after(after_page),
            NarrationEvent::Advanced { index } => {
                let last_page = self.sentences.last_page();
                let at_edge = self
                    .sentences
                    .page_of(index)
                    .is_none_or(|page| Some(page) == last_page);
                if at_edge {
                    self.load_after(last_page);
                }
            }
            NarrationEvent::Finished { error } => {
                self.checkpoint();
                self.notify(Notice::PlaybackStopped {
                    sentence: self.narrator.cursor(),
                });
                if let Some(err) = error {
                    self.notify(Notice::Error {
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    // Internals

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    fn notify_scrolled(&self) {
        self.notify(Notice::Scrolled {
            scroll_top: self.viewport.layout.scroll_top(),
            visible_page: self.viewport.visible_page(),
        });
    }

    fn install(&mut self, loaded: LoadedPage) {
        let y_offset = self.viewport.layout.page_y_offset(loaded.index);
        self.highlight.forget(loaded.index);
        self.pages.insert(loaded, y_offset);
    }

    fn after_scroll(&mut self) {
        self.check_lazy_load();
        self.settle_residency(false);
        self.notify_scrolled();
    }

    /// Evicts far pages, then rebuilds the sentence sequence if the resident set moved.
    fn settle_residency(&mut self, mut changed: bool) {
        changed |= self.unload_far_pages();
        if changed {
            self.resegment();
            self.notify(Notice::PagesChanged {
                resident: self.pages.resident().into_iter().collect(),
            });
        }
    }

    fn unload_far_pages(&mut self) -> bool {
        let pinned = self.narration_pins();
        let plan = self.viewport.unload_plan(&self.pages.resident(), &pinned);
        for &page in &plan {
            self.pages.remove(page);
            self.highlight.forget(page);
        }
        if !plan.is_empty() {
            debug!(pages = ?plan, "pages unloaded");
        }
        !plan.is_empty()
    }

    /// The narrated page and the page after it stay resident while playing.
    fn narration_pins(&self) -> Vec<usize> {
        if !self.narrator.is_playing() {
            return Vec::new();
        }
        self.sentences
            .page_of(self.narrator.cursor())
            .or_else(|| self.sentences.last_page())
            .map(|page| vec![page, page + 1])
            .unwrap_or_default()
    }

    fn check_lazy_load(&mut self) {
        if self.viewport.is_loading() {
            return;
        }
        let plan = self.viewport.lazy_load_plan(&self.pages.resident());
        self.request_pages(plan);
    }

    fn load_after(&mut self, after_page: Option<usize>) {
        let start = after_page.map_or(0, |page| page + 1);
        let end = start
            .saturating_add(self.viewport.policy().batch_size)
            .min(self.info.page_count);
        let pages = (start..end)
            .filter(|page| !self.pages.contains(*page))
            .collect();
        self.request_pages(pages);
    }

    /// Starts the single in-flight background load. No-op while one is pending.
    fn request_pages(&mut self, pages: Vec<usize>) -> bool {
        if pages.is_empty() || !self.viewport.begin_load() {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("background page loads need a tokio runtime");
            self.viewport.finish_load();
            return false;
        };
        let document = self.document.clone();
        let zoom = self.viewport.layout.zoom();
        let layout_epoch = self.viewport.layout_epoch();
        let events = self.events_tx.clone();
        debug!(pages = ?pages, layout_epoch, "background load scheduled");
        runtime.spawn(async move {
            let mut results = Vec::with_capacity(pages.len());
            for page in pages {
                results.push(document.load_page(page, zoom).await);
            }
            let _ = events.send(SessionEvent::PagesLoaded {
                layout_epoch,
                results,
            });
        });
        true
    }

    fn resegment(&mut self) {
        self.segment_epoch = self.segment_epoch.saturating_add(1);
        let sentences = self
            .pages
            .iter()
            .flat_map(|page| {
                let geometry = PageGeometry {
                    index: page.index,
                    size: page.size,
                    zoom: page.zoom,
                    y_offset: page.y_offset,
                };
                segment_page(geometry, &page.words, &self.params)
            })
            .collect();
        let sequence = Arc::new(SentenceSequence::new(
            self.segment_epoch,
            sentences,
            self.pages.resident(),
        ));
        self.sentences = Arc::clone(&sequence);
        let cursor = self.narrator.replace_sentences(sequence);
        debug!(
            epoch = self.segment_epoch,
            sentences = self.sentences.len(),
            cursor,
            "sentences rebuilt"
        );
        if self.highlight.highlighted_page().is_some() {
            self.redraw_cursor();
        }
    }

    /// Redraws the highlight at the cursor without scrolling.
    fn redraw_cursor(&mut self) {
        let sequence = Arc::clone(&self.sentences);
        match sequence.get(self.narrator.cursor()) {
            Some(sentence) => {
                self.highlight.draw(&mut self.pages, sentence);
            }
            None => self.highlight.clear_all(&mut self.pages),
        }
    }

    /// Highlights a sentence and scrolls it into comfortable view.
    fn show_sentence(&mut self, index: usize) -> bool {
        let sequence = Arc::clone(&self.sentences);
        let Some(sentence) = sequence.get(index) else {
            return false;
        };
        if !self.highlight.draw(&mut self.pages, sentence) {
            return false;
        }
        self.notify(Notice::Highlighted {
            sentence: index,
            page: sentence.page_index,
        });
        let (_, viewport_height) = self.viewport.layout.viewport_size();
        if let Some(target) = autoscroll_target(
            sentence.global_top(),
            self.viewport.layout.scroll_top(),
            viewport_height,
        ) {
            self.viewport.layout.set_scroll_top(target);
            self.after_scroll();
        }
        true
    }
}

fn non_negative(margin: f32) -> f32 {
    if margin.is_finite() { margin.max(0.0) } else { 0.0 }
}
