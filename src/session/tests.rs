use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::backend::{LinkTarget, OutlineEntry, PageRect};
use crate::config::{Config, NarrationConfig};
use crate::error::AppError;
use crate::narration::NarrationEvent;
use crate::segment::ColumnMode;
use crate::store::{DocumentState, MemoryStateStore, StateStore};
use crate::test_support::{
    FakeBackend, FakeDevice, FakeLoader, FakeSpeech, sentence_text,
};

use super::{Notice, Session, SessionDeps, SessionEvent};

const DOC: &str = "/books/fixture.pdf";

/// Pages are 150x200 at zoom 0.5, so each occupies 210 canvas units including the gap.
fn test_config() -> Config {
    let mut config = Config::default();
    config.viewport.default_zoom = 0.5;
    config.viewport.viewport_width = 400.0;
    config.viewport.viewport_height = 200.0;
    config.narration = NarrationConfig {
        prefetch_interval_ms: 10,
        playback_poll_ms: 5,
        page_wait_ms: 100,
        skip_settle_ms: 20,
        ..NarrationConfig::default()
    };
    config
}

struct Fixture {
    backend: FakeBackend,
    speech: Arc<FakeSpeech>,
    device: Arc<FakeDevice>,
    store: Arc<MemoryStateStore>,
}

impl Fixture {
    fn new(pages: usize) -> Self {
        Self {
            backend: FakeBackend::one_sentence_per_page(pages),
            speech: Arc::new(FakeSpeech::new()),
            device: Arc::new(FakeDevice::new()),
            store: Arc::new(MemoryStateStore::new()),
        }
    }

    async fn open(&self) -> Session {
        let deps = SessionDeps {
            loader: Arc::new(FakeLoader::new(self.backend.clone())),
            speech: self.speech.clone(),
            device: self.device.clone(),
            store: self.store.clone(),
        };
        Session::open(DOC, test_config(), deps)
            .await
            .expect("fixture document opens")
    }
}

/// Applies background events until `done` holds. False on timeout.
async fn pump_until(session: &mut Session, mut done: impl FnMut(&Session) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done(session) {
            return true;
        }
        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(5), session.next_event()).await
        {
            let _ = session.handle_event(event);
        }
    }
    done(session)
}

async fn pump_idle(session: &mut Session) -> bool {
    pump_until(session, |s| !s.is_loading() && s.pages().contains(s.visible_page())).await
}

fn highlighted_sentences(notices: &mut broadcast::Receiver<Notice>) -> Vec<usize> {
    let mut seen: Vec<usize> = Vec::new();
    loop {
        match notices.try_recv() {
            Ok(Notice::Highlighted { sentence, .. }) => {
                if seen.last() != Some(&sentence) {
                    seen.push(sentence);
                }
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => return seen,
        }
    }
}

#[tokio::test]
async fn open_failure_leaves_no_session() {
    let deps = SessionDeps {
        loader: Arc::new(FakeLoader::failing("not a PDF")),
        speech: Arc::new(FakeSpeech::new()),
        device: Arc::new(FakeDevice::new()),
        store: Arc::new(MemoryStateStore::new()),
    };
    let err = Session::open(DOC, test_config(), deps)
        .await
        .err()
        .expect("open fails");
    assert!(matches!(err, AppError::DocumentOpen { .. }));
}

#[tokio::test]
async fn three_pages_play_in_order_and_next_cuts_the_current_sentence() {
    let mut fixture = Fixture::new(3);
    fixture.device = Arc::new(
        FakeDevice::with_default_duration(Duration::from_millis(30))
            .with_duration(sentence_text(1), Duration::from_secs(30)),
    );
    let mut session = fixture.open().await;
    session.set_margins(0.0, 0.0);
    session.set_column_mode(ColumnMode::Single);
    assert_eq!(session.sentences().len(), 3);
    let mut notices = session.subscribe();
    let device = fixture.device.clone();

    assert!(session.play().expect("runtime present"));
    assert!(pump_until(&mut session, |_| device.started().len() == 2).await);
    session.drain_events().expect("no narration error");
    assert_eq!(device.finished(), vec![sentence_text(0)]);
    assert_eq!(session.cursor(), 1);
    assert_eq!(session.highlighted_page(), Some(1));

    assert_eq!(session.next_sentence(), Some(2));
    assert_eq!(session.highlighted_page(), Some(2));
    assert_eq!(device.interrupted(), vec![sentence_text(1)]);

    assert!(pump_until(&mut session, |s| !s.is_playing()).await);
    session.drain_events().expect("no narration error");
    assert_eq!(
        device.started(),
        vec![sentence_text(0), sentence_text(1), sentence_text(2)]
    );
    assert_eq!(device.finished(), vec![sentence_text(0), sentence_text(2)]);
    assert_eq!(highlighted_sentences(&mut notices), vec![0, 1, 2]);
}

#[tokio::test]
async fn rapid_skips_only_play_the_final_sentence() {
    let mut fixture = Fixture::new(8);
    fixture.speech = Arc::new(FakeSpeech::with_delay(Duration::from_millis(5)));
    fixture.device = Arc::new(FakeDevice::with_default_duration(Duration::from_secs(30)));
    let mut session = fixture.open().await;
    let device = fixture.device.clone();

    session.play().expect("runtime present");
    assert!(pump_until(&mut session, |_| device.started().len() == 1).await);
    for _ in 0..5 {
        assert!(session.next_sentence().is_some());
        tokio::task::yield_now().await;
    }
    assert_eq!(session.cursor(), 5);

    assert!(pump_until(&mut session, |_| device.started().len() == 2).await);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(device.started(), vec![sentence_text(0), sentence_text(5)]);
    assert!(session.stop());
    assert!(!session.is_playing());
}

#[tokio::test]
async fn played_sentences_leave_at_most_one_trailing_clip() {
    let fixture = Fixture::new(5);
    let mut session = fixture.open().await;

    session.play().expect("runtime present");
    assert!(pump_until(&mut session, |s| !s.is_playing()).await);
    assert_eq!(fixture.device.finished().len(), 5);

    let cache = session.narrator().cache();
    let cached = cache.lock().cached_indices();
    assert!(cached.iter().all(|&index| index >= 3), "got {cached:?}");
    let files = std::fs::read_dir(cache.dir()).expect("cache dir").count();
    assert_eq!(files, cached.len());
}

#[tokio::test]
async fn synthesis_failure_stops_playback_and_reaches_the_caller() {
    let mut fixture = Fixture::new(2);
    fixture.speech = Arc::new(FakeSpeech::failing("offline"));
    let mut session = fixture.open().await;
    let mut notices = session.subscribe();

    session.play().expect("runtime present");
    let mut failure = None;
    while failure.is_none() {
        let event = tokio::time::timeout(Duration::from_secs(5), session.next_event())
            .await
            .expect("narration reports back")
            .expect("queue stays open");
        if let Err(err) = session.handle_event(event) {
            failure = Some(err);
        }
    }
    assert!(matches!(failure, Some(AppError::Synthesis { .. })));
    assert!(!session.is_playing());
    assert!(fixture.device.started().is_empty());

    let mut saw_error = false;
    while let Ok(notice) = notices.try_recv() {
        saw_error |= matches!(notice, Notice::Error { message } if message.contains("offline"));
    }
    assert!(saw_error);
}

#[tokio::test]
async fn running_to_the_end_returns_the_narration_failure() {
    let mut fixture = Fixture::new(2);
    fixture.speech = Arc::new(FakeSpeech::failing("offline"));
    let mut session = fixture.open().await;

    assert!(session.play().expect("runtime present"));
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        session.run_until_finished(std::future::pending(), |_| {}),
    )
    .await
    .expect("narration reports back");
    assert!(matches!(outcome, Err(AppError::Synthesis { .. })));
    assert!(!session.is_playing());
}

#[tokio::test]
async fn running_to_the_end_reads_every_page_and_reports_each_highlight() {
    let fixture = Fixture::new(3);
    let mut session = fixture.open().await;
    let mut notices = session.subscribe();

    assert!(session.play().expect("runtime present"));
    let mut observed = 0;
    tokio::time::timeout(
        Duration::from_secs(5),
        session.run_until_finished(std::future::pending(), |_| observed += 1),
    )
    .await
    .expect("narration reaches the end")
    .expect("narration succeeds");
    assert!(observed > 0);
    assert!(!session.is_playing());
    assert_eq!(
        fixture.device.finished(),
        (0..3).map(sentence_text).collect::<Vec<_>>()
    );
    assert_eq!(highlighted_sentences(&mut notices), vec![0, 1, 2]);
}

#[tokio::test]
async fn interrupting_a_run_stops_playback() {
    let mut fixture = Fixture::new(3);
    fixture.device = Arc::new(FakeDevice::with_default_duration(Duration::from_secs(30)));
    let mut session = fixture.open().await;

    assert!(session.play().expect("runtime present"));
    let interrupt = tokio::time::sleep(Duration::from_millis(50));
    tokio::time::timeout(
        Duration::from_secs(5),
        session.run_until_finished(interrupt, |_| {}),
    )
    .await
    .expect("interrupt ends the run")
    .expect("an interrupted run is not an error");
    assert!(!session.is_playing());
    assert!(fixture.device.finished().is_empty());
}

#[tokio::test]
async fn stale_highlight_redraws_at_the_cursor() {
    let fixture = Fixture::new(3);
    let mut session = fixture.open().await;
    assert_eq!(session.highlighted_page(), None);

    let stale = session.sentences().epoch() + 1;
    session
        .handle_event(SessionEvent::Narration(NarrationEvent::Highlight {
            index: 2,
            epoch: stale,
        }))
        .expect("highlights never fail");
    assert_eq!(
        session.highlighted_page(),
        session.sentences().page_of(session.cursor())
    );
    assert_eq!(session.highlighted_page(), Some(0));
}

#[tokio::test]
async fn scroll_by_moves_relative_to_the_current_offset() {
    let fixture = Fixture::new(20);
    let mut session = fixture.open().await;

    assert_eq!(session.scroll_by(3.0 * 210.0), 3);
    assert_eq!(session.scroll_by(-210.0), 2);
    assert_eq!(session.scroll_by(-10_000.0), 0);
}

#[tokio::test]
async fn scrolling_keeps_residency_bounded_and_visible_page_loaded() {
    let fixture = Fixture::new(100);
    let mut session = fixture.open().await;
    assert_eq!(
        session.pages().resident().into_iter().collect::<Vec<_>>(),
        (0..10).collect::<Vec<_>>()
    );

    let mut seed: u64 = 0x2545_f491;
    for _ in 0..30 {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let target = (seed >> 33) as f32 % session.layout().canvas_height();
        let visible = session.on_scroll(target);
        assert!(pump_idle(&mut session).await, "visible page {visible} never loaded");
        assert!(session.pages().len() <= 2 * 20 + 2 * 10);
        assert!(session.pages().contains(session.visible_page()));
    }
}

#[tokio::test]
async fn scrolling_near_the_edge_loads_the_next_batch() {
    let fixture = Fixture::new(40);
    let mut session = fixture.open().await;

    let visible = session.on_scroll(8.0 * 210.0);
    assert_eq!(visible, 8);
    assert!(session.is_loading());
    // A second trigger while the first load is pending is coalesced.
    session.on_scroll(8.2 * 210.0);
    assert!(pump_until(&mut session, |s| !s.is_loading()).await);
    assert!((10..20).all(|page| session.pages().contains(page)));
    assert!(session.sentences().len() >= 20);
}

#[tokio::test]
async fn goto_loads_the_surrounding_batch_and_ignores_bad_pages() {
    let fixture = Fixture::new(100);
    let mut session = fixture.open().await;

    assert!(!session.goto(100).await);
    assert!(session.goto(40).await);
    assert_eq!(session.visible_page(), 40);
    assert!((30..50).all(|page| session.pages().contains(page)));
    assert!(!session.pages().contains(0));
}

#[tokio::test]
async fn zoom_rerasterizes_resident_pages_and_keeps_the_scroll_fraction() {
    let fixture = Fixture::new(20);
    let mut session = fixture.open().await;
    session.on_scroll(630.0);
    assert!(pump_idle(&mut session).await);
    let fraction = session.layout().scroll_fraction();
    let resident = session.pages().resident();

    assert!(session.set_zoom(1.0).await);
    assert!(!session.set_zoom(1.0).await);
    assert!((session.layout().scroll_fraction() - fraction).abs() < 1e-4);
    assert!(resident.iter().all(|&page| session.pages().contains(page)));
    assert!(pump_idle(&mut session).await);
    for page in session.pages().iter() {
        assert_eq!(page.zoom, 1.0);
        assert_eq!(page.raster.width(), 300);
    }
}

#[tokio::test]
async fn narrated_page_stays_resident_while_scrolling_away() {
    let mut fixture = Fixture::new(60);
    fixture.device = Arc::new(FakeDevice::with_default_duration(Duration::from_secs(30)));
    let mut session = fixture.open().await;

    session.play().expect("runtime present");
    assert!(pump_until(&mut session, |_| fixture.device.started().len() == 1).await);
    session.on_scroll(50.0 * 210.0);
    assert!(pump_idle(&mut session).await);
    assert!(session.pages().contains(0));
    assert!(session.pages().contains(1));
    assert!(!session.pages().contains(5));
    assert_eq!(session.cursor(), 0);
    session.stop();
}

#[tokio::test]
async fn margins_and_columns_resegment_and_persist() {
    let fixture = Fixture::new(3);
    let mut session = fixture.open().await;
    assert_eq!(session.sentences().len(), 3);

    // Every word sits at y = 100.
    session.set_margins(150.0, 0.0);
    assert!(session.sentences().is_empty());
    session.set_margins(0.0, 0.0);
    assert_eq!(session.sentences().len(), 3);
    assert_eq!(session.toggle_column_mode(), ColumnMode::Double);

    let saved = fixture
        .store
        .load_document(Path::new(DOC))
        .expect("memory store")
        .expect("state saved");
    assert_eq!(saved.header_margin, 0.0);
    assert_eq!(saved.column_mode, ColumnMode::Double);
}

#[tokio::test]
async fn reopening_restores_page_zoom_and_cursor() {
    let fixture = Fixture::new(40);
    fixture
        .store
        .save_document(
            Path::new(DOC),
            &DocumentState {
                last_page: 12,
                last_sentence: 0,
                zoom: 0.75,
                header_margin: 0.0,
                footer_margin: 0.0,
                column_mode: ColumnMode::Double,
            },
        )
        .expect("memory store");

    let session = fixture.open().await;
    assert_eq!(session.visible_page(), 12);
    assert_eq!(session.layout().zoom(), 0.75);
    assert_eq!(session.segment_params().column_mode, ColumnMode::Double);
    assert_eq!(session.sentences().page_of(session.cursor()), Some(12));

    session.close();
    let global = fixture.store.load_global().expect("memory store");
    assert_eq!(global.last_document.as_deref(), Some(Path::new(DOC)));
    let saved = fixture
        .store
        .load_document(Path::new(DOC))
        .expect("memory store")
        .expect("state saved");
    assert_eq!(saved.last_page, 12);
}

#[tokio::test]
async fn brightness_is_clamped_applied_and_saved() {
    let fixture = Fixture::new(2);
    let mut session = fixture.open().await;

    assert_eq!(session.set_brightness(0.1), 0.3);
    let page = session.pages().get(0).expect("resident");
    assert_eq!(page.raster.get_pixel(0, 0).0[0], (255.0_f32 * 0.3).round() as u8);
    assert_eq!(page.original.get_pixel(0, 0).0[0], 255);
    assert_eq!(
        fixture.store.load_global().expect("memory store").brightness,
        0.3
    );
}

#[tokio::test]
async fn links_resolve_from_canvas_positions() {
    let mut fixture = Fixture::new(20);
    fixture.backend = FakeBackend::one_sentence_per_page(20)
        .with_link(0, PageRect::new(40.0, 100.0, 135.0, 112.0), LinkTarget::Page(7))
        .with_link(
            1,
            PageRect::new(40.0, 100.0, 135.0, 112.0),
            LinkTarget::Uri("https://example.org".to_string()),
        );
    let mut session = fixture.open().await;

    // Pages are centred: (400 - 150) / 2 = 125.
    let inside = (125.0 + 50.0 * 0.5, 105.0 * 0.5);
    let target = session
        .link_at(inside.0, inside.1)
        .await
        .expect("links load");
    assert_eq!(target, Some(LinkTarget::Page(7)));
    assert_eq!(session.link_at(10.0, inside.1).await.expect("links load"), None);

    let uri = session
        .link_at(inside.0, 210.0 + inside.1)
        .await
        .expect("links load")
        .expect("link present");
    assert_eq!(
        session.follow_link(uri).await.as_deref(),
        Some("https://example.org")
    );

    assert_eq!(session.follow_link(LinkTarget::Page(7)).await, None);
    assert_eq!(session.visible_page(), 7);
}

#[tokio::test]
async fn outline_falls_back_to_page_entries() {
    let fixture = Fixture::new(3);
    let session = fixture.open().await;
    let outline = session.outline().await.expect("outline loads");
    let titles: Vec<&str> = outline.iter().map(|entry| entry.title.as_str()).collect();
    assert_eq!(titles, vec!["Page 1", "Page 2", "Page 3"]);

    let mut fixture = Fixture::new(3);
    let chapters = vec![OutlineEntry {
        level: 0,
        title: "Intro".to_string(),
        page: 1,
    }];
    fixture.backend = fixture.backend.clone().with_outline(chapters.clone());
    let session = fixture.open().await;
    assert_eq!(session.outline().await.expect("outline loads"), chapters);
}

#[tokio::test]
async fn voices_are_sorted_and_voice_changes_persist() {
    let fixture = Fixture::new(1);
    let mut session = fixture.open().await;

    let voices = session.voices().await.expect("voices listed");
    let ids: Vec<&str> = voices.iter().map(|voice| voice.id.as_str()).collect();
    assert_eq!(ids, vec!["en-us", "fr-fr"]);

    assert!(session.set_voice("fr-fr"));
    assert!(!session.set_voice("fr-fr"));
    assert_eq!(session.voice(), "fr-fr");
    assert_eq!(
        fixture.store.load_global().expect("memory store").voice.as_deref(),
        Some("fr-fr")
    );
}
