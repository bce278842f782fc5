mod layout;
mod manager;

pub use layout::{DEFAULT_ZOOM, Layout, MAX_ZOOM, MIN_ZOOM, PAGE_GAP, ZOOM_STEP, clamp_zoom};
pub use manager::{Viewport, ViewportPolicy, goto_range, plan_lazy_load, plan_unload};
