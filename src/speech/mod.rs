mod command;
mod traits;

pub use command::{CommandPlayback, EspeakSpeech, parse_voice_table};
pub use traits::{PlaybackDevice, SpeechProvider, Voice, sort_voices};
