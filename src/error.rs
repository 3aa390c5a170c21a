//! Error types for the call engine

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Control channel error: {0}")]
    Control(#[from] ControlError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio backend available: {0}")]
    BackendUnavailable(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Socket bind failed: {0}")]
    BindFailed(String),
}

/// Video subsystem errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid frame dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Thread failed to start: {0}")]
    ThreadFailed(String),
}

/// Control channel errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
