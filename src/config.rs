//! Endpoint configuration
//!
//! The two endpoints run identical code; the role only decides which side
//! of each port pair they bind. For every subsystem the server listens on
//! the base port and sends to base+1, the client does the opposite, so the
//! same pair of constants works on both machines.
//!
//! Tunables can be overridden from `lancall.toml` in the platform config
//! directory; the role and peer address always come from the command line.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::constants::{
    AUDIO_PORT, AUDIO_SAMPLE_RATE, AUDIO_WINDOW_BYTES, CONTROL_PORT, FRAME_HEIGHT,
    FRAME_QUEUE_CAPACITY, FRAME_RATE, FRAME_WIDTH, JPEG_QUALITY, MAX_VIDEO_PACKET, VIDEO_PORT,
};
use crate::error::{Error, Result};

/// Which side of the call this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    /// Listens on the base port of each pair.
    Server,
    /// Listens on base+1 of each pair.
    Client,
}

impl CallRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "server" => Some(CallRole::Server),
            "client" => Some(CallRole::Client),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CallRole::Server => "server",
            CallRole::Client => "client",
        }
    }

    /// Port this side binds for a base/base+1 pair.
    pub fn listen_port(&self, base: u16) -> u16 {
        match self {
            CallRole::Server => base,
            CallRole::Client => base + 1,
        }
    }

    /// Port the peer binds for the same pair.
    pub fn peer_port(&self, base: u16) -> u16 {
        match self {
            CallRole::Server => base + 1,
            CallRole::Client => base,
        }
    }
}

/// Video pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub jpeg_quality: u8,
    pub max_packet: usize,
    pub queue_capacity: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            frame_rate: FRAME_RATE,
            jpeg_quality: JPEG_QUALITY,
            max_packet: MAX_VIDEO_PACKET,
            queue_capacity: FRAME_QUEUE_CAPACITY,
        }
    }
}

impl VideoConfig {
    /// Interval between outgoing frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.frame_rate.max(1)))
    }
}

/// Audio pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub window_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: AUDIO_SAMPLE_RATE,
            window_bytes: AUDIO_WINDOW_BYTES,
        }
    }
}

/// Base ports; each subsystem occupies base and base+1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub video: u16,
    pub audio: u16,
    pub control: u16,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            video: VIDEO_PORT,
            audio: AUDIO_PORT,
            control: CONTROL_PORT,
        }
    }
}

/// Overridable subset read from `lancall.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    video: VideoConfig,
    audio: AudioConfig,
    ports: PortConfig,
}

/// Complete runtime configuration of one endpoint.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub role: CallRole,
    pub peer_ip: IpAddr,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub ports: PortConfig,
}

impl CallConfig {
    /// Default configuration for the given role and peer.
    pub fn new(role: CallRole, peer_ip: IpAddr) -> Self {
        Self {
            role,
            peer_ip,
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            ports: PortConfig::default(),
        }
    }

    /// Load configuration, applying `lancall.toml` overrides when the file
    /// exists. `LANCALL_CONFIG` points at an explicit file instead of the
    /// platform config directory.
    pub fn load(role: CallRole, peer_ip: IpAddr) -> Result<Self> {
        let file = match config_file_path() {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                let parsed: FileConfig = toml::from_str(&text)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                tracing::info!("Loaded configuration from {}", path.display());
                parsed
            }
            _ => FileConfig::default(),
        };
        let config = Self {
            role,
            peer_ip,
            video: file.video,
            audio: file.audio,
            ports: file.ports,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(Error::Config(format!(
                "invalid frame size {}x{}",
                self.video.width, self.video.height
            )));
        }
        if self.video.frame_rate == 0 {
            return Err(Error::Config("frame_rate must be at least 1".into()));
        }
        if self.video.jpeg_quality == 0 || self.video.jpeg_quality > 100 {
            return Err(Error::Config(format!(
                "jpeg_quality {} outside 1-100",
                self.video.jpeg_quality
            )));
        }
        if self.video.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.audio.window_bytes == 0 || self.audio.window_bytes % 2 != 0 {
            return Err(Error::Config(format!(
                "window_bytes {} must be even and non-zero",
                self.audio.window_bytes
            )));
        }
        // each subsystem occupies base and base+1
        let mut bases = [self.ports.video, self.ports.audio, self.ports.control];
        bases.sort_unstable();
        for pair in bases.windows(2) {
            if pair[1].saturating_sub(pair[0]) < 2 {
                return Err(Error::Config(format!(
                    "port pairs overlap: {} and {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }

    pub fn video_listen_port(&self) -> u16 {
        self.role.listen_port(self.ports.video)
    }

    pub fn video_peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.peer_ip, self.role.peer_port(self.ports.video))
    }

    pub fn audio_listen_port(&self) -> u16 {
        self.role.listen_port(self.ports.audio)
    }

    pub fn audio_peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.peer_ip, self.role.peer_port(self.ports.audio))
    }

    pub fn control_listen_port(&self) -> u16 {
        self.role.listen_port(self.ports.control)
    }

    pub fn control_peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.peer_ip, self.role.peer_port(self.ports.control))
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LANCALL_CONFIG") {
        return Some(PathBuf::from(path));
    }
    ProjectDirs::from("", "", "lancall").map(|dirs| dirs.config_dir().join("lancall.toml"))
}
