use image::{Rgba, RgbaImage, imageops};

use crate::backend::PageRect;

pub const MIN_BRIGHTNESS: f32 = 0.3;
pub const MAX_BRIGHTNESS: f32 = 1.0;

const LINE_BUCKET: f32 = 5.0;
const HIGHLIGHT_PADDING: f32 = 2.0;
const HIGHLIGHT_COLOR: Rgba<u8> = Rgba([255, 255, 0, 102]);

pub fn clamp_brightness(brightness: f32) -> f32 {
    if brightness.is_finite() {
        brightness.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS)
    } else {
        MAX_BRIGHTNESS
    }
}

/// Merges word boxes whose top edges round to the same 5-unit bucket. Clusters keep the
/// order in which their first box appears.
pub fn line_clusters(boxes: &[PageRect]) -> Vec<PageRect> {
    let mut clusters: Vec<(i64, PageRect)> = Vec::new();
    for rect in boxes {
        let bucket = ((rect.y0 / LINE_BUCKET).round() * LINE_BUCKET) as i64;
        match clusters.iter_mut().find(|(key, _)| *key == bucket) {
            Some((_, merged)) => *merged = merged.union(rect),
            None => clusters.push((bucket, *rect)),
        }
    }
    clusters.into_iter().map(|(_, rect)| rect).collect()
}

/// Builds a new display raster from the untouched original: one translucent rectangle
/// per line cluster, then brightness.
pub fn compose_highlight(original: &RgbaImage, boxes: &[PageRect], brightness: f32) -> RgbaImage {
    let (width, height) = original.dimensions();
    let mut overlay = RgbaImage::new(width, height);
    for cluster in line_clusters(boxes) {
        let Some((x0, y0, x1, y1)) = clip_to_raster(&cluster, width, height) else {
            continue;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                overlay.put_pixel(x, y, HIGHLIGHT_COLOR);
            }
        }
    }

    let mut composed = original.clone();
    imageops::overlay(&mut composed, &overlay, 0, 0);
    apply_brightness(&composed, brightness)
}

pub fn apply_brightness(image: &RgbaImage, brightness: f32) -> RgbaImage {
    let brightness = clamp_brightness(brightness);
    let mut out = image.clone();
    if brightness >= MAX_BRIGHTNESS {
        return out;
    }
    for pixel in out.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel = (f32::from(*channel) * brightness).round() as u8;
        }
    }
    out
}

fn clip_to_raster(rect: &PageRect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = (rect.x0 - HIGHLIGHT_PADDING).floor().max(0.0);
    let y0 = (rect.y0 - HIGHLIGHT_PADDING).floor().max(0.0);
    let x1 = (rect.x1 + HIGHLIGHT_PADDING).ceil().min(width as f32);
    let y1 = (rect.y1 + HIGHLIGHT_PADDING).ceil().min(height as f32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}
