//! Call session assembly
//!
//! Wires every subsystem of one endpoint together: binds the video
//! sockets and starts both video pipelines, prepares the audio engine,
//! connects the control channel in both directions and runs the stdin
//! command loop. Shutdown stops the pieces in reverse dependency order
//! and is safe to call more than once.

use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

#[cfg(feature = "audio-device")]
use crate::audio::device::CpalBackend;
use crate::audio::AudioEngine;
use crate::codec::JpegCodec;
use crate::config::{AudioConfig, CallConfig};
use crate::constants::VIDEO_SOCKET_BUFFER;
use crate::control::{CommandRouter, ControlDialer, ControlListener};
use crate::error::{AudioError, ControlError, Result, VideoError};
use crate::media::testpattern::{CountingRenderer, TestPatternSource};
use crate::media::AudioBackend;
use crate::net;
use crate::state::Toggle;
use crate::stats::{CallStats, StatsReporter};
use crate::video::{VideoReceivePipeline, VideoSendPipeline};

/// How often the command loop rechecks the running flag while stdin
/// is quiet.
const CLI_POLL: Duration = Duration::from_millis(200);

/// One running call endpoint.
pub struct CallSession {
    config: CallConfig,
    running: Toggle,
    stopped: Toggle,
    stats: Arc<CallStats>,
    router: Arc<CommandRouter>,
    video_send: Option<VideoSendPipeline>,
    video_recv: Option<VideoReceivePipeline>,
    audio: Option<Arc<AudioEngine>>,
    dialer: Option<Arc<ControlDialer>>,
    listener: Option<ControlListener>,
    reporter: Option<StatsReporter>,
}

impl CallSession {
    /// Bring up the endpoint. A video bind failure is fatal; a missing
    /// audio device is not, the call just runs without audio.
    pub fn start(config: CallConfig) -> Result<Self> {
        let running = Toggle::new(true);
        let stats = CallStats::new();
        tracing::info!(
            "Starting {} endpoint, peer {}",
            config.role.name(),
            config.peer_ip
        );

        // receive side first, so early frames from the peer are not lost
        let recv_socket = net::bind_udp(config.video_listen_port(), VIDEO_SOCKET_BUFFER)
            .map_err(|e| {
                VideoError::BindFailed(format!("port {}: {}", config.video_listen_port(), e))
            })?;
        let video_recv = VideoReceivePipeline::start(
            recv_socket,
            Box::new(JpegCodec::new(config.video.jpeg_quality)),
            Box::new(CountingRenderer::new()),
            config.video.max_packet,
            stats.clone(),
        )?;

        let send_socket =
            net::udp_sender(VIDEO_SOCKET_BUFFER).map_err(|e| VideoError::BindFailed(e.to_string()))?;
        let video_send = VideoSendPipeline::start(
            &config.video,
            Box::new(TestPatternSource::new(config.video.width, config.video.height)),
            Box::new(JpegCodec::new(config.video.jpeg_quality)),
            send_socket,
            config.video_peer_addr(),
            stats.clone(),
        )?;

        // sockets bind now, the capture device waits for the first /audio
        let audio = match default_audio_backend(&config.audio) {
            Ok(backend) => match AudioEngine::new(
                config.audio_listen_port(),
                config.audio_peer_addr(),
                config.audio.window_bytes,
                backend,
                running.clone(),
                stats.clone(),
            ) {
                Ok(engine) => Some(Arc::new(engine)),
                Err(e) => {
                    tracing::error!("Audio setup failed, continuing without audio: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("No audio backend available: {}", e);
                None
            }
        };

        let dialer = Arc::new(ControlDialer::start(config.control_peer_addr())?);
        let router = Arc::new(CommandRouter::new(
            dialer.clone(),
            audio.clone(),
            Some(video_send.pause_flag()),
            running.clone(),
        ));
        let listener_socket = net::control_listener(config.control_listen_port()).map_err(|e| {
            ControlError::BindFailed(format!("port {}: {}", config.control_listen_port(), e))
        })?;
        let listener = {
            let router = router.clone();
            ControlListener::start(listener_socket, move |line| router.dispatch_remote(line))?
        };

        let reporter = StatsReporter::start(stats.clone());
        tracing::info!(
            "Call running: video :{} -> {}, audio :{} -> {}, control :{} -> {}",
            config.video_listen_port(),
            config.video_peer_addr(),
            config.audio_listen_port(),
            config.audio_peer_addr(),
            config.control_listen_port(),
            config.control_peer_addr()
        );

        Ok(Self {
            config,
            running,
            stopped: Toggle::new(false),
            stats,
            router,
            video_send: Some(video_send),
            video_recv: Some(video_recv),
            audio,
            dialer: Some(dialer),
            listener: Some(listener),
            reporter: Some(reporter),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// Read commands from stdin until the call ends. Returns when the
    /// running flag clears, whether from a local `/end`, the peer's, or
    /// a closed console.
    pub fn run_cli(&self) -> Result<()> {
        println!("Commands: /audio  /mute  /pause  /end");
        let (tx, rx) = bounded::<String>(8);
        // detached: a blocked stdin read cannot be interrupted, the
        // thread ends with the process
        thread::Builder::new()
            .name("cli-stdin".to_string())
            .spawn(move || forward_stdin(tx))?;

        while self.running.get() {
            match rx.recv_timeout(CLI_POLL) {
                Ok(line) => self.router.dispatch_local(&line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Console closed, ending call");
                    self.running.set(false);
                }
            }
        }
        Ok(())
    }

    /// Stop every subsystem and wait for their threads. Idempotent.
    pub fn shutdown(&mut self) {
        if self.stopped.swap(true) {
            return;
        }
        tracing::info!("Shutting down call");
        self.running.set(false);
        if let Some(mut pipeline) = self.video_send.take() {
            pipeline.stop();
        }
        if let Some(mut pipeline) = self.video_recv.take() {
            pipeline.stop();
        }
        if let Some(engine) = self.audio.take() {
            engine.shutdown();
        }
        if let Some(dialer) = self.dialer.take() {
            dialer.stop();
        }
        if let Some(listener) = self.listener.take() {
            listener.stop();
        }
        if let Some(mut reporter) = self.reporter.take() {
            reporter.stop();
        }
        let totals = self.stats.snapshot();
        tracing::info!(
            "Call ended: {} video frames sent ({} dropped), {} received, {} audio packets sent, {} received",
            totals.video_frames_sent,
            totals.video_frames_dropped,
            totals.video_frames_received,
            totals.audio_packets_sent,
            totals.audio_packets_received
        );
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn forward_stdin(tx: Sender<String>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if tx.send(line).is_err() {
            break;
        }
    }
    // dropping the sender tells the command loop the console is gone
}

#[cfg(feature = "audio-device")]
fn default_audio_backend(config: &AudioConfig) -> std::result::Result<Arc<dyn AudioBackend>, AudioError> {
    Ok(Arc::new(CpalBackend::new(
        config.sample_rate,
        config.window_bytes,
    )))
}

#[cfg(not(feature = "audio-device"))]
fn default_audio_backend(
    _config: &AudioConfig,
) -> std::result::Result<Arc<dyn AudioBackend>, AudioError> {
    Err(AudioError::BackendUnavailable(
        "built without the audio-device feature".to_string(),
    ))
}
