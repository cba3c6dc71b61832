//! Spoken notifications and the dedupe policy in front of them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Speech output. Implementations must tolerate `cancel` with nothing playing.
pub trait Speaker {
    fn speak(&mut self, text: &str);
    fn cancel(&mut self);
}

/// Short audible/visual cues for user actions and fresh guidance.
pub trait Cues {
    fn click(&mut self) {}
    fn alert(&mut self) {}
}

/// Whether a call to [`NotificationPolicy::notify`] produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Emitted,
    Suppressed,
}

/// Speaks guidance only when it changes.
///
/// The newest message always wins: speech still playing is cancelled before
/// the next utterance, and nothing is queued.
pub struct NotificationPolicy {
    last_spoken: String,
    speaker: Option<Box<dyn Speaker>>,
}

impl NotificationPolicy {
    pub fn new(speaker: Option<Box<dyn Speaker>>) -> Self {
        Self {
            last_spoken: String::new(),
            speaker,
        }
    }

    /// A policy that tracks messages but has no speech output.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn last_spoken(&self) -> &str {
        &self.last_spoken
    }

    pub fn has_speaker(&self) -> bool {
        self.speaker.is_some()
    }

    pub fn notify(&mut self, text: &str) -> NotifyOutcome {
        if text.is_empty() || text == self.last_spoken {
            return NotifyOutcome::Suppressed;
        }

        self.last_spoken = text.to_string();
        log::info!("Speaking: {}", text);
        if let Some(speaker) = self.speaker.as_mut() {
            speaker.cancel();
            speaker.speak(text);
        }
        NotifyOutcome::Emitted
    }
}

/// Speaks by running an external text-to-speech program (`espeak`, `say`, ...)
/// with the text as its last argument.
pub struct CommandSpeaker {
    program: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: None,
        }
    }

    /// Build a speaker only if `program` can be found.
    pub fn detect(program: &str, args: Vec<String>) -> Option<Self> {
        match find_program(program) {
            Some(path) => Some(Self::new(path, args)),
            None => {
                log::warn!("Speech program '{}' not found, speech disabled", program);
                None
            }
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str) {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => self.child = Some(child),
            Err(e) => log::warn!("Failed to run {}: {}", self.program.display(), e),
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Rings the terminal bell when new guidance arrives.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl Cues for TerminalBell {
    fn alert(&mut self) {
        let mut err = std::io::stderr();
        let _ = err.write_all(b"\x07");
        let _ = err.flush();
    }
}

/// Locate an executable by path or on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let plain = dir.join(program);
        if plain.is_file() {
            return Some(plain);
        }
        let suffixed = dir.join(format!("{}{}", program, std::env::consts::EXE_SUFFIX));
        suffixed.is_file().then_some(suffixed)
    })
}
