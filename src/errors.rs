//! Defines the custom error types used throughout the `presenter_rs` crate.
//!
//! This module centralizes error handling, providing specific error enums for
//! the different categories of issues (configuration, media acquisition,
//! presentation requests), and a top-level `AppError` to wrap them for the
//! demo binary. Each error type implements `Debug`, `Display`, and
//! `std::error::Error`, and provides `From` implementations for the common
//! underlying error types.
//!
//! Media errors never cross the `send`/`clear` boundary: the surface logs them
//! and lets the affected component fall back to static rendering.

use std::error::Error as StdError;
use std::fmt;

// --- ConfigError ---
/// Errors related to loading and parsing the presentation configuration.
#[must_use = "a configuration error should be handled or propagated"]
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred while trying to read the configuration file.
    Io(std::io::Error),
    /// An error occurred while parsing the configuration file content.
    Parse(String),
    /// A required configuration key was missing from the file.
    MissingKey(String),
    /// A key was present but its value could not be interpreted.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Configuration parse error: {}", e),
            ConfigError::MissingKey(key) => write!(f, "Missing configuration key: '{}'", key),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for configuration key '{}'", value, key)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

// --- MediaError ---
/// Errors related to media acquisition and decoding (images, video, audio).
#[must_use = "a media error should be handled or propagated"]
#[derive(Debug)]
pub enum MediaError {
    /// An I/O error occurred while reading a media resource.
    Io(std::io::Error),
    /// An error occurred during image decoding via the `image` crate.
    Image(image::ImageError),
    /// An error occurred during video decoding via `ffmpeg-next`.
    #[cfg(feature = "ffmpeg")]
    Ffmpeg(ffmpeg_next::Error),
    /// No player backend is registered for the requested media kind.
    NoPlayerAvailable(String),
    /// The player backend failed to initialize its decode session.
    PlayerInit(String),
    /// The decode thread could not be spawned or exited unexpectedly.
    DecodeThread(String),
    /// The media failed to decode earlier and is not retried until invalidated.
    Unavailable(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Io(e) => write!(f, "Media I/O error: {}", e),
            MediaError::Image(e) => write!(f, "Image processing error: {}", e),
            #[cfg(feature = "ffmpeg")]
            MediaError::Ffmpeg(e) => write!(f, "FFmpeg error: {}", e),
            MediaError::NoPlayerAvailable(s) => write!(f, "No media player available: {}", s),
            MediaError::PlayerInit(s) => write!(f, "Media player initialization failed: {}", s),
            MediaError::DecodeThread(s) => write!(f, "Media decode thread error: {}", s),
            MediaError::Unavailable(s) => write!(f, "Media unavailable after earlier failure: {}", s),
        }
    }
}

impl StdError for MediaError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            MediaError::Io(e) => Some(e),
            MediaError::Image(e) => Some(e),
            #[cfg(feature = "ffmpeg")]
            MediaError::Ffmpeg(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self { MediaError::Io(err) }
}
impl From<image::ImageError> for MediaError {
    fn from(err: image::ImageError) -> Self { MediaError::Image(err) }
}
#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for MediaError {
    fn from(err: ffmpeg_next::Error) -> Self { MediaError::Ffmpeg(err) }
}

// --- PresentationError ---
/// Errors returned at the presentation request boundary.
#[must_use = "a presentation error should be handled or propagated"]
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationError {
    /// The slide cannot be rendered at all (e.g. zero-sized design geometry).
    /// Rejected before any buffer work begins.
    InvalidSlide(String),
    /// The request serializer has been shut down; the event was reported dropped.
    ShutDown,
    /// The request serializer's worker thread could not be started.
    WorkerSpawn(String),
}

impl fmt::Display for PresentationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationError::InvalidSlide(s) => write!(f, "Invalid slide: {}", s),
            PresentationError::ShutDown => write!(f, "Presentation request serializer is shut down"),
            PresentationError::WorkerSpawn(s) => write!(f, "Failed to start request serializer: {}", s),
        }
    }
}

impl StdError for PresentationError {}

// --- AppError (Top-level error enum) ---
/// A top-level error type used by the demo binary.
#[must_use = "an application error should be handled or propagated"]
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Media(MediaError),
    Presentation(PresentationError),
    Deck(serde_json::Error),
    Generic(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Application Configuration Error: {}", e),
            AppError::Media(e) => write!(f, "Application Media Error: {}", e),
            AppError::Presentation(e) => write!(f, "Application Presentation Error: {}", e),
            AppError::Deck(e) => write!(f, "Application Slide Deck Error: {}", e),
            AppError::Generic(s) => write!(f, "Application Error: {}", s),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Media(e) => Some(e),
            AppError::Presentation(e) => Some(e),
            AppError::Deck(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self { AppError::Config(err) }
}
impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self { AppError::Media(err) }
}
impl From<PresentationError> for AppError {
    fn from(err: PresentationError) -> Self { AppError::Presentation(err) }
}
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self { AppError::Deck(err) }
}
