use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::backend::{
    LinkTarget, OutlineEntry, PageLink, PageRect, PdfBackend, RgbaFrame, WordBox,
};
use crate::document::DocumentLoader;
use crate::error::{AppError, AppResult};
use crate::narration::NarrationEvent;
use crate::segment::{Sentence, SentenceSequence};
use crate::speech::{PlaybackDevice, SpeechProvider, Voice};

pub fn unique_temp_path(suffix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();

    let mut path = std::env::temp_dir();
    path.push(format!("pdfest_{suffix}_{}_{}", process::id(), nanos));
    path
}

pub fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
    let page_streams: Vec<String> = if page_texts.is_empty() {
        vec![String::new()]
    } else {
        page_texts
            .iter()
            .map(|text| {
                let escaped = escape_literal_string(text);
                format!("BT /F1 14 Tf 36 260 Td ({escaped}) Tj ET")
            })
            .collect()
    };
    build_pdf_from_streams(&page_streams)
}

/// Minimal uncompressed PDF with 300x300 pages and one Helvetica font.
pub fn build_pdf_from_streams(page_streams: &[String]) -> Vec<u8> {
    let page_count = page_streams.len();
    let page_ids: Vec<usize> = (0..page_count).map(|i| 4 + i * 2).collect();

    let mut objects = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids = page_ids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push(format!(
        "<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (index, stream) in page_streams.iter().enumerate() {
        let content_id = 5 + index * 2;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 300 300] /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
    let mut offsets = vec![0_usize];
    for (index, object) in objects.iter().enumerate() {
        offsets.push(bytes.len());
        bytes.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", index + 1).as_bytes());
    }

    let xref_start = bytes.len();
    bytes.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    bytes.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        bytes.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    bytes.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    bytes
}

fn escape_literal_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Debug, Clone)]
struct FakePage {
    size: (f32, f32),
    words: Vec<WordBox>,
    links: Vec<PageLink>,
}

/// In-memory document: blank white pages with scripted words, links and outline.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    path: PathBuf,
    pages: Vec<FakePage>,
    outline: Vec<OutlineEntry>,
}

impl FakeBackend {
    /// 300x400 pages, each holding the sentence `Page <i> speaks.` as three words.
    pub fn one_sentence_per_page(count: usize) -> Self {
        let pages = (0..count)
            .map(|index| FakePage {
                size: (300.0, 400.0),
                words: vec![
                    WordBox::new(PageRect::new(40.0, 100.0, 70.0, 112.0), "Page"),
                    WordBox::new(PageRect::new(75.0, 100.0, 90.0, 112.0), index.to_string()),
                    WordBox::new(PageRect::new(95.0, 100.0, 135.0, 112.0), "speaks."),
                ],
                links: Vec::new(),
            })
            .collect();
        Self {
            path: PathBuf::from("/fake/document.pdf"),
            pages,
            outline: Vec::new(),
        }
    }

    pub fn with_link(mut self, page: usize, rect: PageRect, target: LinkTarget) -> Self {
        if let Some(fake) = self.pages.get_mut(page) {
            fake.links.push(PageLink { rect, target });
        }
        self
    }

    pub fn with_outline(mut self, outline: Vec<OutlineEntry>) -> Self {
        self.outline = outline;
        self
    }

    fn page(&self, page: usize) -> AppResult<&FakePage> {
        self.pages
            .get(page)
            .ok_or_else(|| AppError::invalid_argument("page index is out of range"))
    }
}

pub fn sentence_text(page: usize) -> String {
    format!("Page {page} speaks.")
}

impl PdfBackend for FakeBackend {
    fn path(&self) -> &Path {
        &self.path
    }

    fn doc_id(&self) -> u64 {
        7
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_dimensions(&self, page: usize) -> AppResult<(f32, f32)> {
        Ok(self.page(page)?.size)
    }

    fn render_page(&self, page: usize, zoom: f32) -> AppResult<RgbaFrame> {
        let (width, height) = self.page(page)?.size;
        let width = (width * zoom).floor().max(1.0) as u32;
        let height = (height * zoom).floor().max(1.0) as u32;
        let pixels = vec![255_u8; width as usize * height as usize * 4];
        Ok(RgbaFrame {
            width,
            height,
            pixels: Arc::from(pixels),
        })
    }

    fn extract_words(&self, page: usize) -> AppResult<Vec<WordBox>> {
        Ok(self.page(page)?.words.clone())
    }

    fn links(&self, page: usize) -> AppResult<Vec<PageLink>> {
        Ok(self.page(page)?.links.clone())
    }

    fn outline(&self) -> AppResult<Vec<OutlineEntry>> {
        Ok(self.outline.clone())
    }
}

pub struct FakeLoader {
    backend: Option<FakeBackend>,
    failure: String,
}

impl FakeLoader {
    pub fn new(backend: FakeBackend) -> Self {
        Self {
            backend: Some(backend),
            failure: String::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            backend: None,
            failure: message.to_string(),
        }
    }
}

impl DocumentLoader for FakeLoader {
    fn open(&self, path: &Path) -> AppResult<Box<dyn PdfBackend>> {
        let Some(backend) = &self.backend else {
            return Err(AppError::invalid_argument(self.failure.clone()));
        };
        let mut backend = backend.clone();
        backend.path = path.to_path_buf();
        Ok(Box::new(backend))
    }
}

/// Synthesizes a sentence into its own UTF-8 bytes, so a clip names what it says.
#[derive(Debug, Default)]
pub struct FakeSpeech {
    calls: Mutex<Vec<(String, String)>>,
    failure: Option<String>,
    delay: Duration,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls_with_voice()
            .into_iter()
            .map(|(text, _)| text)
            .collect()
    }

    pub fn calls_with_voice(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl SpeechProvider for FakeSpeech {
    fn synthesize(&self, text: &str, voice: &str) -> AppResult<Vec<u8>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((text.to_string(), voice.to_string()));
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match &self.failure {
            Some(message) => Err(AppError::synthesis(message.clone())),
            None => Ok(text.as_bytes().to_vec()),
        }
    }

    fn list_voices(&self) -> AppResult<Vec<Voice>> {
        Ok(vec![
            Voice {
                id: "fr-fr".to_string(),
                locale: "fr".to_string(),
                gender: "F".to_string(),
            },
            Voice {
                id: "en-us".to_string(),
                locale: "en".to_string(),
                gender: "M".to_string(),
            },
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLog {
    Played(String),
    Finished(String),
    Interrupted(String),
}

#[derive(Debug, Default)]
struct DeviceState {
    loaded: Option<String>,
    current: Option<(String, Instant, Duration)>,
    log: Vec<DeviceLog>,
}

impl DeviceState {
    fn settle(&mut self) {
        if let Some((text, started, duration)) = self.current.take() {
            if started.elapsed() >= duration {
                self.log.push(DeviceLog::Finished(text));
            } else {
                self.log.push(DeviceLog::Interrupted(text));
            }
        }
    }
}

/// Plays a clip for a scripted duration and records what was heard.
#[derive(Debug)]
pub struct FakeDevice {
    state: Mutex<DeviceState>,
    default_duration: Duration,
    durations: HashMap<String, Duration>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_millis(10))
    }

    pub fn with_default_duration(duration: Duration) -> Self {
        Self {
            state: Mutex::new(DeviceState::default()),
            default_duration: duration,
            durations: HashMap::new(),
        }
    }

    pub fn with_duration(mut self, text: impl Into<String>, duration: Duration) -> Self {
        self.durations.insert(text.into(), duration);
        self
    }

    pub fn log(&self) -> Vec<DeviceLog> {
        self.state.lock().expect("device lock").log.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.entries(|entry| match entry {
            DeviceLog::Played(text) => Some(text.clone()),
            _ => None,
        })
    }

    pub fn finished(&self) -> Vec<String> {
        self.entries(|entry| match entry {
            DeviceLog::Finished(text) => Some(text.clone()),
            _ => None,
        })
    }

    pub fn interrupted(&self) -> Vec<String> {
        self.entries(|entry| match entry {
            DeviceLog::Interrupted(text) => Some(text.clone()),
            _ => None,
        })
    }

    fn entries(&self, pick: impl Fn(&DeviceLog) -> Option<String>) -> Vec<String> {
        self.log().iter().filter_map(pick).collect()
    }
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackDevice for FakeDevice {
    fn load(&self, audio: &Path) -> AppResult<()> {
        let bytes = fs::read(audio)
            .map_err(|err| AppError::playback(format!("missing clip {}: {err}", audio.display())))?;
        self.state.lock().expect("device lock").loaded =
            Some(String::from_utf8_lossy(&bytes).into_owned());
        Ok(())
    }

    fn play(&self) -> AppResult<()> {
        let mut state = self.state.lock().expect("device lock");
        state.settle();
        let Some(text) = state.loaded.clone() else {
            return Err(AppError::playback("no audio loaded"));
        };
        let duration = self
            .durations
            .get(&text)
            .copied()
            .unwrap_or(self.default_duration);
        state.log.push(DeviceLog::Played(text.clone()));
        state.current = Some((text, Instant::now(), duration));
        Ok(())
    }

    fn stop(&self) {
        self.state.lock().expect("device lock").settle();
    }

    fn is_busy(&self) -> bool {
        let mut state = self.state.lock().expect("device lock");
        let done = state
            .current
            .as_ref()
            .is_some_and(|(_, started, duration)| started.elapsed() >= *duration);
        if done {
            state.settle();
        }
        state.current.is_some()
    }
}

pub fn sentence_on(page: usize, text: &str) -> Sentence {
    Sentence {
        text: text.to_string(),
        boxes: vec![PageRect::new(10.0, 10.0, 50.0, 20.0)],
        page_index: page,
        page_y_offset: page as f32 * 100.0,
        ordinal: 0,
        column: 0,
    }
}

/// One sentence per page, sentence `i` on page `i`.
pub fn sequence_of(texts: &[&str]) -> SentenceSequence {
    let sentences = texts
        .iter()
        .enumerate()
        .map(|(page, text)| sentence_on(page, text))
        .collect();
    let pages: BTreeSet<usize> = (0..texts.len()).collect();
    SentenceSequence::new(0, sentences, pages)
}

pub fn collect_events(rx: &flume::Receiver<NarrationEvent>) -> Vec<NarrationEvent> {
    rx.try_iter().collect()
}

pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
