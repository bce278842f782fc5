use std::path::Path;

use serde::Serialize;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub id: String,
    pub locale: String,
    pub gender: String,
}

/// Turns text into encoded audio. Calls may block on the network or the CPU and are
/// always made from blocking threads.
pub trait SpeechProvider: Send + Sync {
    fn synthesize(&self, text: &str, voice: &str) -> AppResult<Vec<u8>>;
    fn list_voices(&self) -> AppResult<Vec<Voice>>;
}

/// A single-stream audio output.
pub trait PlaybackDevice: Send + Sync {
    fn load(&self, audio: &Path) -> AppResult<()>;
    fn play(&self) -> AppResult<()>;
    /// Stops immediately; a no-op when idle.
    fn stop(&self);
    fn is_busy(&self) -> bool;
}

pub fn sort_voices(voices: &mut [Voice]) {
    voices.sort_by(|a, b| a.locale.cmp(&b.locale).then_with(|| a.id.cmp(&b.id)));
}
