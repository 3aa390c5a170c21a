//! Command parsing and dispatch
//!
//! Both endpoints understand the same four slash commands. A command
//! typed locally is relayed to the peer and then applied here; a command
//! received from the peer is applied but never relayed back, so a single
//! keystroke changes state on both ends exactly once.

use std::sync::Arc;

use crate::audio::AudioEngine;
use crate::control::ControlLink;
use crate::error::ControlError;
use crate::state::Toggle;

/// The slash commands accepted on stdin and over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle the audio subsystem on or off.
    Audio,
    /// Toggle microphone mute while audio is enabled.
    Mute,
    /// Toggle the outgoing video pause.
    Pause,
    /// End the call on both sides.
    End,
}

impl Command {
    /// Parse a trimmed input line. Commands are exact matches, so the
    /// relayed line is byte for byte what the peer will parse.
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "/audio" => Some(Self::Audio),
            "/mute" => Some(Self::Mute),
            "/pause" => Some(Self::Pause),
            "/end" => Some(Self::End),
            _ => None,
        }
    }

    /// Wire form of the command.
    pub fn as_line(&self) -> &'static str {
        match self {
            Self::Audio => "/audio",
            Self::Mute => "/mute",
            Self::Pause => "/pause",
            Self::End => "/end",
        }
    }
}

/// Applies commands to the call and relays local ones to the peer.
pub struct CommandRouter {
    link: Arc<dyn ControlLink>,
    audio: Option<Arc<AudioEngine>>,
    video_pause: Option<Toggle>,
    session_running: Toggle,
}

impl CommandRouter {
    pub fn new(
        link: Arc<dyn ControlLink>,
        audio: Option<Arc<AudioEngine>>,
        video_pause: Option<Toggle>,
        session_running: Toggle,
    ) -> Self {
        Self {
            link,
            audio,
            video_pause,
            session_running,
        }
    }

    /// Handle a line typed on this endpoint: relay it, then apply it.
    /// The relay goes out even when the local apply refuses, so the two
    /// ends stay in step on the next accepted toggle.
    pub fn dispatch_local(&self, line: &str) {
        let command = match Command::parse(line.trim()) {
            Some(command) => command,
            None => {
                tracing::info!("Unknown command: {}", line.trim());
                return;
            }
        };
        match self.link.send_line(command.as_line()) {
            Ok(()) => {}
            Err(ControlError::NotConnected) => {
                tracing::debug!("Peer not connected, applying {} locally only", command.as_line());
            }
            Err(e) => {
                tracing::warn!("Failed to relay {}: {}", command.as_line(), e);
            }
        }
        self.apply(command);
    }

    /// Handle a line received from the peer: apply it, never relay it.
    pub fn dispatch_remote(&self, line: &str) {
        let command = match Command::parse(line.trim()) {
            Some(command) => command,
            None => {
                tracing::warn!("Peer sent unknown command: {}", line.trim());
                return;
            }
        };
        self.apply(command);
    }

    fn apply(&self, command: Command) {
        match command {
            Command::Audio => {
                if let Some(engine) = &self.audio {
                    engine.toggle();
                } else {
                    tracing::warn!("Audio is unavailable on this endpoint");
                }
            }
            Command::Mute => {
                if let Some(engine) = &self.audio {
                    engine.toggle_mute();
                } else {
                    tracing::warn!("Audio is unavailable on this endpoint");
                }
            }
            Command::Pause => {
                if let Some(paused) = &self.video_pause {
                    let now_paused = paused.toggle();
                    tracing::info!(
                        "Video {}",
                        if now_paused { "paused" } else { "resumed" }
                    );
                } else {
                    tracing::warn!("Video is unavailable on this endpoint");
                }
            }
            Command::End => {
                tracing::info!("Call ended");
                self.session_running.set(false);
            }
        }
    }
}
