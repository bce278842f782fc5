mod compose;
mod renderer;
mod scroll;

pub use compose::{
    MAX_BRIGHTNESS, MIN_BRIGHTNESS, apply_brightness, clamp_brightness, compose_highlight,
    line_clusters,
};
pub use renderer::HighlightRenderer;
pub use scroll::autoscroll_target;
