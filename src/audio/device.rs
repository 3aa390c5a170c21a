//! cpal device backend
//!
//! Opens the default input and output devices at the call's wire format,
//! 16 kHz mono 16-bit. Streams are built inside their owning thread (cpal
//! streams are not Send) and parked there until the endpoint drops. A
//! device that cannot run the requested format fails the open, which the
//! engine treats as fatal for the audio subsystem.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::constants::AUDIO_RECV_TIMEOUT;
use crate::error::AudioError;
use crate::media::traits::{AudioBackend, AudioSink, AudioSource};
use crate::state::Toggle;

/// Chunks queued between the stream callbacks and the loop threads.
const CAPTURE_DEPTH: usize = 32;
/// Playback backlog: 64 windows is 640 ms at the 10 ms cadence.
const PLAYBACK_DEPTH: usize = 64;
/// How long `open` waits for the stream thread to report readiness.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default-device backend at a fixed mono format.
pub struct CpalBackend {
    sample_rate: u32,
    window_bytes: usize,
}

impl CpalBackend {
    pub fn new(sample_rate: u32, window_bytes: usize) -> Self {
        Self {
            sample_rate,
            window_bytes,
        }
    }

    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: 1,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }
}

impl AudioBackend for CpalBackend {
    fn open_capture(&self) -> Result<Box<dyn AudioSource>, AudioError> {
        Ok(Box::new(CpalCapture::open(
            self.stream_config(),
            self.window_bytes,
        )?))
    }

    fn open_playback(&self) -> Result<Box<dyn AudioSink>, AudioError> {
        Ok(Box::new(CpalPlayback::open(self.stream_config())?))
    }
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::error!("Audio stream error: {}", err);
}

/// Capture endpoint; assembles callback chunks into fixed windows.
pub struct CpalCapture {
    data_rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    running: Toggle,
    handle: Option<JoinHandle<()>>,
}

impl CpalCapture {
    fn open(config: StreamConfig, window_bytes: usize) -> Result<Self, AudioError> {
        let (data_tx, data_rx) = bounded::<Vec<u8>>(CAPTURE_DEPTH);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let running = Toggle::new(true);
        let flag = running.clone();
        let handle = thread::Builder::new()
            .name("cpal-capture".to_string())
            .spawn(move || capture_thread(config, data_tx, ready_tx, flag))
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                data_rx,
                pending: Vec::with_capacity(window_bytes * 2),
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                running.set(false);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.set(false);
                let _ = handle.join();
                Err(AudioError::StreamError(
                    "capture stream did not start".to_string(),
                ))
            }
        }
    }
}

impl AudioSource for CpalCapture {
    fn read_window(&mut self, window: &mut [u8]) -> Result<usize, AudioError> {
        while self.pending.len() < window.len() {
            match self.data_rx.recv_timeout(AUDIO_RECV_TIMEOUT) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AudioError::CaptureFailed(
                        "capture stream ended".to_string(),
                    ))
                }
            }
        }
        let len = window.len();
        window.copy_from_slice(&self.pending[..len]);
        self.pending.drain(..len);
        Ok(len)
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.running.set(false);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn capture_thread(
    config: StreamConfig,
    data_tx: Sender<Vec<u8>>,
    ready_tx: Sender<Result<(), AudioError>>,
    running: Toggle,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(AudioError::DeviceNotFound(
                "no default input device".to_string(),
            )));
            return;
        }
    };

    let format = device
        .default_input_config()
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let callback_running = running.clone();
    let stream = match format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if !callback_running.get() {
                    return;
                }
                let mut bytes = Vec::with_capacity(data.len() * 2);
                for sample in data {
                    bytes.extend_from_slice(&sample.to_le_bytes());
                }
                let _ = data_tx.try_send(bytes);
            },
            log_stream_error,
            None,
        ),
        _ => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !callback_running.get() {
                    return;
                }
                let mut bytes = Vec::with_capacity(data.len() * 2);
                for sample in data {
                    let s = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                    bytes.extend_from_slice(&s.to_le_bytes());
                }
                let _ = data_tx.try_send(bytes);
            },
            log_stream_error,
            None,
        ),
    };

    match stream {
        Ok(stream) => {
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            // keep the thread alive while running; the stream stops when
            // it drops at the end of this scope
            while running.get() {
                thread::sleep(Duration::from_millis(10));
            }
        }
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
        }
    }
}

/// Pulls queued PCM bytes sample by sample, zero on underrun.
struct SampleFeed {
    data_rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl SampleFeed {
    fn new(data_rx: Receiver<Vec<u8>>) -> Self {
        Self {
            data_rx,
            pending: Vec::new(),
            offset: 0,
        }
    }

    fn next_sample(&mut self) -> i16 {
        if self.offset + 2 > self.pending.len() {
            match self.data_rx.try_recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                // underrun, play silence
                Err(_) => return 0,
            }
            if self.pending.len() < 2 {
                return 0;
            }
        }
        let s = i16::from_le_bytes([self.pending[self.offset], self.pending[self.offset + 1]]);
        self.offset += 2;
        s
    }
}

/// Playback endpoint; write never blocks, underruns play silence.
pub struct CpalPlayback {
    data_tx: Sender<Vec<u8>>,
    running: Toggle,
    handle: Option<JoinHandle<()>>,
}

impl CpalPlayback {
    fn open(config: StreamConfig) -> Result<Self, AudioError> {
        let (data_tx, data_rx) = bounded::<Vec<u8>>(PLAYBACK_DEPTH);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let running = Toggle::new(true);
        let flag = running.clone();
        let handle = thread::Builder::new()
            .name("cpal-playback".to_string())
            .spawn(move || playback_thread(config, data_rx, ready_tx, flag))
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                data_tx,
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                running.set(false);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.set(false);
                let _ = handle.join();
                Err(AudioError::StreamError(
                    "playback stream did not start".to_string(),
                ))
            }
        }
    }
}

impl AudioSink for CpalPlayback {
    fn write(&mut self, window: &[u8]) -> Result<(), AudioError> {
        match self.data_tx.try_send(window.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Playback queue full, window dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(AudioError::PlaybackFailed(
                "playback stream ended".to_string(),
            )),
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.running.set(false);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn playback_thread(
    config: StreamConfig,
    data_rx: Receiver<Vec<u8>>,
    ready_tx: Sender<Result<(), AudioError>>,
    running: Toggle,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(AudioError::DeviceNotFound(
                "no default output device".to_string(),
            )));
            return;
        }
    };

    let format = device
        .default_output_config()
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::F32);

    let mut feed = SampleFeed::new(data_rx);
    let stream = match format {
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    *slot = feed.next_sample();
                }
            },
            log_stream_error,
            None,
        ),
        _ => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for slot in data.iter_mut() {
                    *slot = f32::from(feed.next_sample()) / 32768.0;
                }
            },
            log_stream_error,
            None,
        ),
    };

    match stream {
        Ok(stream) => {
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            while running.get() {
                thread::sleep(Duration::from_millis(10));
            }
        }
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_capture_never_panics() {
        // passes with or without a usable input device
        let backend = CpalBackend::new(16_000, 320);
        let _ = backend.open_capture();
    }
}
