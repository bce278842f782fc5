const LOWER_BOUND_RATIO: f32 = 0.75;
const TARGET_RATIO: f32 = 0.2;

/// New scroll top that brings a sentence into comfortable view, or `None` when the
/// sentence top already sits between the viewport top and 75% of its height.
pub fn autoscroll_target(global_top: f32, scroll_top: f32, viewport_height: f32) -> Option<f32> {
    let above = global_top < scroll_top;
    let below = global_top > scroll_top + viewport_height * LOWER_BOUND_RATIO;
    if !above && !below {
        return None;
    }
    Some((global_top - viewport_height * TARGET_RATIO).max(0.0))
}
