//! Audio subsystem lifecycle
//!
//! The subsystem starts disabled and muted. `/audio` toggles the whole
//! subsystem: enabling opens the capture device and spawns the duplex
//! loops, disabling stops and joins them. `/mute` only swaps outgoing
//! windows for silence and is refused while the subsystem is disabled.
//! Both sockets are bound up front so a bind failure surfaces at session
//! start instead of mid-call.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::audio::{recv, send};
use crate::constants::{AUDIO_RECV_TIMEOUT, AUDIO_SOCKET_BUFFER};
use crate::error::AudioError;
use crate::media::traits::AudioBackend;
use crate::net;
use crate::state::Toggle;
use crate::stats::CallStats;

pub struct AudioEngine {
    enabled: Toggle,
    muted: Toggle,
    session_running: Toggle,
    send_socket: Arc<UdpSocket>,
    recv_socket: Arc<UdpSocket>,
    peer: SocketAddr,
    window_bytes: usize,
    backend: Arc<dyn AudioBackend>,
    stats: Arc<CallStats>,
    /// Loop handles; the lock also serializes enable/disable transitions.
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl AudioEngine {
    /// Bind the duplex sockets. Device opening waits until `enable`.
    pub fn new(
        listen_port: u16,
        peer: SocketAddr,
        window_bytes: usize,
        backend: Arc<dyn AudioBackend>,
        session_running: Toggle,
        stats: Arc<CallStats>,
    ) -> Result<Self, AudioError> {
        let recv_socket = net::bind_udp(listen_port, AUDIO_SOCKET_BUFFER)
            .map_err(|e| AudioError::BindFailed(format!("port {}: {}", listen_port, e)))?;
        recv_socket
            .set_read_timeout(Some(AUDIO_RECV_TIMEOUT))
            .map_err(|e| AudioError::BindFailed(e.to_string()))?;
        let send_socket = net::udp_sender(AUDIO_SOCKET_BUFFER)
            .map_err(|e| AudioError::BindFailed(e.to_string()))?;

        Ok(Self {
            enabled: Toggle::new(false),
            muted: Toggle::new(true),
            session_running,
            send_socket: Arc::new(send_socket),
            recv_socket: Arc::new(recv_socket),
            peer,
            window_bytes,
            backend,
            stats,
            threads: Mutex::new(Vec::new()),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.get()
    }

    /// Address of the bound receive socket.
    pub fn recv_addr(&self) -> std::io::Result<SocketAddr> {
        self.recv_socket.local_addr()
    }

    /// `/audio`: enable or disable the whole subsystem.
    pub fn toggle(&self) {
        if self.enabled.get() {
            self.disable();
        } else {
            self.enable();
        }
    }

    /// `/mute`: flip silence substitution; refused while disabled.
    pub fn toggle_mute(&self) {
        if !self.enabled.get() {
            tracing::warn!("Audio subsystem is disabled, enable it with /audio before muting");
            return;
        }
        let muted = self.muted.toggle();
        tracing::info!("Microphone {}", if muted { "muted" } else { "unmuted" });
    }

    fn enable(&self) {
        let mut threads = self.threads.lock();
        if self.enabled.get() {
            return;
        }
        let source = match self.backend.open_capture() {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Failed to open capture device, audio stays disabled: {}", e);
                return;
            }
        };
        self.enabled.set(true);

        let send_handle = thread::Builder::new().name("audio-send".to_string()).spawn({
            let socket = self.send_socket.clone();
            let peer = self.peer;
            let session_running = self.session_running.clone();
            let enabled = self.enabled.clone();
            let muted = self.muted.clone();
            let stats = self.stats.clone();
            let window_bytes = self.window_bytes;
            move || {
                send::send_loop(
                    source,
                    socket,
                    peer,
                    session_running,
                    enabled,
                    muted,
                    stats,
                    window_bytes,
                )
            }
        });
        match send_handle {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                tracing::error!("Failed to start audio send loop: {}", e);
                self.enabled.set(false);
                return;
            }
        }

        let recv_handle = thread::Builder::new().name("audio-recv".to_string()).spawn({
            let socket = self.recv_socket.clone();
            let backend = self.backend.clone();
            let session_running = self.session_running.clone();
            let enabled = self.enabled.clone();
            let stats = self.stats.clone();
            let window_bytes = self.window_bytes;
            move || {
                recv::receive_loop(socket, backend, session_running, enabled, stats, window_bytes)
            }
        });
        match recv_handle {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                tracing::error!("Failed to start audio receive loop: {}", e);
                self.enabled.set(false);
                for handle in threads.drain(..) {
                    let _ = handle.join();
                }
                return;
            }
        }

        tracing::info!("Audio subsystem enabled (muted: {})", self.muted.get());
    }

    fn disable(&self) {
        let mut threads = self.threads.lock();
        if !self.enabled.get() {
            return;
        }
        self.enabled.set(false);
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
        tracing::info!("Audio subsystem disabled");
    }

    /// Session shutdown: stop the loops without role-specific logging.
    pub fn shutdown(&self) {
        let mut threads = self.threads.lock();
        self.enabled.set(false);
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::traits::{AudioSink, AudioSource};
    use crossbeam_channel::{Receiver, Sender};
    use std::time::Duration;

    /// Produces alternating +/-4000 windows with a short internal pause.
    struct FakeSource;

    impl AudioSource for FakeSource {
        fn read_window(&mut self, window: &mut [u8]) -> Result<usize, AudioError> {
            thread::sleep(Duration::from_millis(5));
            for (i, pair) in window.chunks_exact_mut(2).enumerate() {
                let s: i16 = if i % 2 == 0 { 4000 } else { -4000 };
                pair.copy_from_slice(&s.to_le_bytes());
            }
            Ok(window.len())
        }
    }

    struct FakeSink(Sender<Vec<u8>>);

    impl AudioSink for FakeSink {
        fn write(&mut self, window: &[u8]) -> Result<(), AudioError> {
            let _ = self.0.send(window.to_vec());
            Ok(())
        }
    }

    struct FakeBackend {
        played: Sender<Vec<u8>>,
    }

    impl AudioBackend for FakeBackend {
        fn open_capture(&self) -> Result<Box<dyn AudioSource>, AudioError> {
            Ok(Box::new(FakeSource))
        }

        fn open_playback(&self) -> Result<Box<dyn AudioSink>, AudioError> {
            Ok(Box::new(FakeSink(self.played.clone())))
        }
    }

    fn test_engine(peer: SocketAddr) -> (AudioEngine, Receiver<Vec<u8>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let backend = Arc::new(FakeBackend { played: tx });
        let engine = AudioEngine::new(
            0,
            peer,
            320,
            backend,
            Toggle::new(true),
            CallStats::new(),
        )
        .unwrap();
        (engine, rx)
    }

    fn loopback_probe() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[test]
    fn test_mute_refused_while_disabled() {
        let (_probe, peer) = loopback_probe();
        let (engine, _rx) = test_engine(peer);
        assert!(!engine.is_enabled());
        assert!(engine.is_muted());
        engine.toggle_mute();
        assert!(engine.is_muted());
    }

    #[test]
    fn test_enable_disable_cycle_joins_loops() {
        let (_probe, peer) = loopback_probe();
        let (engine, _rx) = test_engine(peer);
        engine.toggle();
        assert!(engine.is_enabled());
        thread::sleep(Duration::from_millis(50));
        engine.toggle();
        assert!(!engine.is_enabled());
        assert!(engine.threads.lock().is_empty());
    }

    #[test]
    fn test_muted_engine_sends_silence_windows() {
        let (probe, peer) = loopback_probe();
        let (engine, _rx) = test_engine(peer);
        engine.toggle();
        assert!(engine.is_muted());

        let mut buf = [0u8; 640];
        let (len, _) = probe.recv_from(&mut buf).unwrap();
        assert_eq!(len, 320);
        assert!(buf[..len].iter().all(|&b| b == 0));
        engine.shutdown();
    }

    #[test]
    fn test_unmuted_engine_sends_voice_windows() {
        let (probe, peer) = loopback_probe();
        let (engine, _rx) = test_engine(peer);
        engine.toggle();
        engine.toggle_mute();
        assert!(!engine.is_muted());

        // skip any silence windows queued before the unmute
        let mut buf = [0u8; 640];
        let mut saw_voice = false;
        for _ in 0..50 {
            let (len, _) = probe.recv_from(&mut buf).unwrap();
            if buf[..len].iter().any(|&b| b != 0) {
                saw_voice = true;
                break;
            }
        }
        assert!(saw_voice);
        engine.shutdown();
    }

    #[test]
    fn test_real_audio_reaches_playback() {
        let (_probe, peer) = loopback_probe();
        let (engine, played) = test_engine(peer);
        engine.toggle();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut target = engine.recv_addr().unwrap();
        target.set_ip("127.0.0.1".parse().unwrap());

        // loud alternating window passes the non-zero scan and the gate
        let mut window = [0u8; 320];
        for (i, pair) in window.chunks_exact_mut(2).enumerate() {
            let s: i16 = if i % 2 == 0 { 4000 } else { -4000 };
            pair.copy_from_slice(&s.to_le_bytes());
        }
        for _ in 0..5 {
            sender.send_to(&window, target).unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        let heard = played.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(heard.len(), 320);
        assert!(heard.iter().any(|&b| b != 0));
        engine.shutdown();
    }

    #[test]
    fn test_all_zero_window_never_opens_playback() {
        let (_probe, peer) = loopback_probe();
        let (engine, played) = test_engine(peer);
        engine.toggle();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut target = engine.recv_addr().unwrap();
        target.set_ip("127.0.0.1".parse().unwrap());

        let silence = [0u8; 320];
        for _ in 0..5 {
            sender.send_to(&silence, target).unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        assert!(played
            .recv_timeout(Duration::from_millis(300))
            .is_err());
        engine.shutdown();
    }

    #[test]
    fn test_mute_command_routes_through_the_router() {
        use crate::control::{CommandRouter, ControlLink};
        use crate::error::ControlError;

        struct RecordingLink(Mutex<Vec<String>>);

        impl ControlLink for RecordingLink {
            fn send_line(&self, line: &str) -> Result<(), ControlError> {
                self.0.lock().push(line.to_string());
                Ok(())
            }
        }

        let (_probe, peer) = loopback_probe();
        let (engine, _rx) = test_engine(peer);
        let engine = Arc::new(engine);
        let link = Arc::new(RecordingLink(Mutex::new(Vec::new())));
        let router = CommandRouter::new(
            link.clone(),
            Some(engine.clone()),
            None,
            Toggle::new(true),
        );

        router.dispatch_local("/audio");
        assert!(engine.is_enabled());
        router.dispatch_local("/mute");
        assert!(!engine.is_muted());
        assert_eq!(
            *link.0.lock(),
            vec!["/audio".to_string(), "/mute".to_string()]
        );
        engine.shutdown();
    }
}
