use crate::document::LoadedPage;
use crate::error::AppResult;
use crate::narration::NarrationEvent;

/// Work finished off the presentation context, queued for `Session::handle_event`.
#[derive(Debug)]
pub enum SessionEvent {
    PagesLoaded {
        layout_epoch: u64,
        results: Vec<AppResult<LoadedPage>>,
    },
    Narration(NarrationEvent),
}

/// State changes observers render from. Emitted after the session state is updated.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    PlaybackStarted { sentence: usize },
    PlaybackStopped { sentence: usize },
    Highlighted { sentence: usize, page: usize },
    PagesChanged { resident: Vec<usize> },
    Scrolled { scroll_top: f32, visible_page: usize },
    Error { message: String },
}
