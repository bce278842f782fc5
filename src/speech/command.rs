use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::config::SpeechConfig;
use crate::error::{AppError, AppResult};

use super::traits::{PlaybackDevice, SpeechProvider, Voice};

/// Synthesis through an espeak-compatible command writing WAV to stdout.
#[derive(Debug, Clone)]
pub struct EspeakSpeech {
    program: String,
}

impl EspeakSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.synth_program.clone())
    }
}

impl SpeechProvider for EspeakSpeech {
    fn synthesize(&self, text: &str, voice: &str) -> AppResult<Vec<u8>> {
        let output = Command::new(&self.program)
            .arg("-v")
            .arg(voice)
            .arg("--stdout")
            .arg("--")
            .arg(text)
            .output()
            .map_err(|err| AppError::synthesis(format!("failed to run {}: {err}", self.program)))?;
        if !output.status.success() {
            return Err(AppError::synthesis(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if output.stdout.is_empty() {
            return Err(AppError::synthesis(format!("{} produced no audio", self.program)));
        }
        debug!(voice, bytes = output.stdout.len(), "synthesized sentence");
        Ok(output.stdout)
    }

    fn list_voices(&self) -> AppResult<Vec<Voice>> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .output()
            .map_err(|err| AppError::synthesis(format!("failed to run {}: {err}", self.program)))?;
        if !output.status.success() {
            return Err(AppError::synthesis(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_voice_table(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses the `--voices` table: `Pty Language Age/Gender VoiceName File ...`.
pub fn parse_voice_table(raw: &str) -> Vec<Voice> {
    raw.lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let language = columns.next()?;
            let age_gender = columns.next()?;
            let gender = match age_gender.rsplit('/').next() {
                Some("M") => "Male",
                Some("F") => "Female",
                _ => "Unknown",
            };
            Some(Voice {
                id: language.to_string(),
                locale: language.to_string(),
                gender: gender.to_string(),
            })
        })
        .collect()
}

#[derive(Default)]
struct PlayerState {
    loaded: Option<PathBuf>,
    child: Option<Child>,
}

/// Plays files by spawning an external player per clip.
pub struct CommandPlayback {
    program: String,
    args: Vec<String>,
    state: Mutex<PlayerState>,
}

impl CommandPlayback {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            state: Mutex::new(PlayerState::default()),
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.player_program.clone(), config.player_args.clone())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PlayerState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

fn kill_child(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        if let Err(err) = child.kill() {
            warn!("failed to stop player: {err}");
        }
        let _ = child.wait();
    }
}

impl PlaybackDevice for CommandPlayback {
    fn load(&self, audio: &Path) -> AppResult<()> {
        if !audio.is_file() {
            return Err(AppError::playback(format!(
                "audio clip is missing: {}",
                audio.display()
            )));
        }
        self.with_state(|state| state.loaded = Some(audio.to_path_buf()));
        Ok(())
    }

    fn play(&self) -> AppResult<()> {
        self.with_state(|state| {
            let Some(path) = state.loaded.clone() else {
                return Err(AppError::playback("no audio loaded"));
            };
            if let Some(child) = state.child.as_mut() {
                kill_child(child);
            }
            let child = Command::new(&self.program)
                .args(&self.args)
                .arg(&path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|err| {
                    AppError::playback(format!("failed to run {}: {err}", self.program))
                })?;
            state.child = Some(child);
            Ok(())
        })
    }

    fn stop(&self) {
        self.with_state(|state| {
            if let Some(mut child) = state.child.take() {
                kill_child(&mut child);
            }
        });
    }

    fn is_busy(&self) -> bool {
        self.with_state(|state| match state.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        })
    }
}

impl Drop for CommandPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
