//! Built-in playback sessions that need no codec.
//!
//! This module is responsible for:
//! - `SyntheticVideoPlayer`: a decode thread generating paced RGBA frames,
//!   used by the demo shell and by tests that need real concurrency.
//! - `SyntheticAudioPlayer`: a position-only session for audio components.
//! - `synthetic_registry`: a `PlayerRegistry` wired with both.
//!
//! A synthetic source reference looks like `synthetic:<name>`; the name seeds
//! the generated colors so different sources are visually distinct.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use log::{debug, error, info, trace};
use parking_lot::Mutex;

use crate::errors::MediaError;
use crate::media_player::{FrameSlot, MediaPlayer, PlaybackStatus, PlayerConfig, PlayerRegistry, RepaintSignal};
use crate::model::{MediaKind, MediaRef};

const DEFAULT_FRAME_SIZE: (u32, u32) = (64, 36);
const DEFAULT_FPS: u32 = 30;
const DEFAULT_LENGTH: Duration = Duration::from_secs(10);

/// Shared between a video player and its decode thread.
pub(crate) struct DecodeShared {
    pub(crate) stop_flag: AtomicBool,
    pub(crate) looped: AtomicBool,
    pub(crate) position_ms: AtomicU64,
    pub(crate) status: Mutex<PlaybackStatus>,
}

impl DecodeShared {
    pub(crate) fn new(looped: bool) -> Self {
        Self {
            stop_flag: AtomicBool::new(false),
            looped: AtomicBool::new(looped),
            position_ms: AtomicU64::new(0),
            status: Mutex::new(PlaybackStatus::Idle),
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub(crate) fn set_position(&self, position: Duration) {
        self.position_ms.store(position.as_millis() as u64, Ordering::Release);
    }

    pub(crate) fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: PlaybackStatus) {
        *self.status.lock() = status;
    }

    pub(crate) fn status(&self) -> PlaybackStatus {
        self.status.lock().clone()
    }
}

/// A video session whose "decoder" paints frames on a background thread.
pub struct SyntheticVideoPlayer {
    source: MediaRef,
    config: PlayerConfig,
    frames: FrameSlot,
    repaint: RepaintSignal,
    shared: Arc<DecodeShared>,
    decoder_thread_handle: Option<thread::JoinHandle<()>>,
    frame_size: (u32, u32),
    fps: u32,
    length: Duration,
}

impl SyntheticVideoPlayer {
    pub fn new(source: MediaRef, config: PlayerConfig, repaint: RepaintSignal) -> Self {
        Self {
            source,
            config,
            frames: FrameSlot::new(),
            repaint,
            shared: Arc::new(DecodeShared::new(config.looped)),
            decoder_thread_handle: None,
            frame_size: DEFAULT_FRAME_SIZE,
            fps: DEFAULT_FPS,
            length: DEFAULT_LENGTH,
        }
    }

    pub fn with_length(mut self, length: Duration) -> Self {
        self.length = length;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }
}

impl MediaPlayer for SyntheticVideoPlayer {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn source(&self) -> &MediaRef {
        &self.source
    }

    fn config(&self) -> PlayerConfig {
        self.config
    }

    fn configure(&mut self, config: PlayerConfig) {
        self.config = config;
        self.shared.looped.store(config.looped, Ordering::Release);
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.decoder_thread_handle.is_some() {
            return Ok(());
        }
        let shared = self.shared.clone();
        let frames = self.frames.clone();
        let repaint = self.repaint.clone();
        let seed = seed_for(&self.source);
        let (width, height) = self.frame_size;
        let frame_interval = Duration::from_secs(1) / self.fps;
        let length = self.length;
        let source_name = self.source.to_string();

        debug!("Spawning synthetic decoding thread for: {}", source_name);
        shared.set_status(PlaybackStatus::Playing);
        let handle = thread::Builder::new()
            .name(format!("decode:{}", source_name))
            .spawn(move || {
                let started = Instant::now();
                let mut frame_index: u64 = 0;
                loop {
                    if shared.is_stopped() {
                        info!("Decoder thread for {} received stop signal.", source_name);
                        break;
                    }
                    let elapsed = started.elapsed();
                    let position = if shared.looped.load(Ordering::Acquire) && !length.is_zero() {
                        Duration::from_nanos((elapsed.as_nanos() % length.as_nanos()) as u64)
                    } else if elapsed >= length {
                        info!("Synthetic video {} reached end of stream.", source_name);
                        shared.set_position(length);
                        shared.set_status(PlaybackStatus::Ended);
                        repaint.request();
                        break;
                    } else {
                        elapsed
                    };
                    shared.set_position(position);
                    frames.publish(Arc::new(paint_frame(width, height, seed, frame_index)));
                    trace!("Published synthetic frame {} for {}", frame_index, source_name);
                    repaint.request();
                    frame_index += 1;
                    thread::sleep(frame_interval);
                }
                info!("Video decoding thread for {} finished.", source_name);
            })
            .map_err(|e| {
                error!("Failed to spawn decoder thread for {}: {}", self.source, e);
                self.shared.set_status(PlaybackStatus::Failed(e.to_string()));
                MediaError::DecodeThread(e.to_string())
            })?;
        self.decoder_thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.shared.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.decoder_thread_handle.take() {
            debug!("Joining video decoder thread for {}", self.source);
            if let Err(e) = handle.join() {
                error!("Error joining video decoder thread for {}: {:?}", self.source, e);
            }
        }
        let mut status = self.shared.status.lock();
        if *status == PlaybackStatus::Playing {
            *status = PlaybackStatus::Idle;
        }
    }

    fn position(&self) -> Duration {
        self.shared.position()
    }

    fn frames(&self) -> Option<FrameSlot> {
        Some(self.frames.clone())
    }

    fn status(&self) -> PlaybackStatus {
        self.shared.status()
    }
}

/// An audio session tracking position only.
pub struct SyntheticAudioPlayer {
    source: MediaRef,
    config: PlayerConfig,
    started: Option<Instant>,
    stopped_at: Option<Duration>,
    length: Duration,
}

impl SyntheticAudioPlayer {
    pub fn new(source: MediaRef, config: PlayerConfig) -> Self {
        Self { source, config, started: None, stopped_at: None, length: DEFAULT_LENGTH }
    }

    pub fn with_length(mut self, length: Duration) -> Self {
        self.length = length;
        self
    }
}

impl MediaPlayer for SyntheticAudioPlayer {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn source(&self) -> &MediaRef {
        &self.source
    }

    fn config(&self) -> PlayerConfig {
        self.config
    }

    fn configure(&mut self, config: PlayerConfig) {
        self.config = config;
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.started.is_none() {
            self.started = Some(Instant::now());
            self.stopped_at = None;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped_at = Some(self.position());
        self.started = None;
    }

    fn position(&self) -> Duration {
        if let Some(at) = self.stopped_at {
            return at;
        }
        let Some(started) = self.started else { return Duration::ZERO };
        let elapsed = started.elapsed();
        if self.length.is_zero() {
            Duration::ZERO
        } else if self.config.looped {
            Duration::from_nanos((elapsed.as_nanos() % self.length.as_nanos()) as u64)
        } else {
            elapsed.min(self.length)
        }
    }

    fn frames(&self) -> Option<FrameSlot> {
        None
    }

    fn status(&self) -> PlaybackStatus {
        match self.started {
            None => PlaybackStatus::Idle,
            Some(_) if !self.config.looped && self.position() >= self.length => PlaybackStatus::Ended,
            Some(_) => PlaybackStatus::Playing,
        }
    }
}

/// A registry serving `synthetic:` sources for both media kinds.
pub fn synthetic_registry() -> PlayerRegistry {
    let mut registry = PlayerRegistry::new();
    register_synthetic(&mut registry);
    registry
}

/// Adds the synthetic constructors to an existing registry.
pub fn register_synthetic(registry: &mut PlayerRegistry) {
    registry.register(MediaKind::Video, |source, config, repaint| {
        Ok(Box::new(SyntheticVideoPlayer::new(source.clone(), config, repaint)) as Box<dyn MediaPlayer>)
    });
    registry.register(MediaKind::Audio, |source, config, _repaint| {
        Ok(Box::new(SyntheticAudioPlayer::new(source.clone(), config)) as Box<dyn MediaPlayer>)
    });
}

fn seed_for(source: &MediaRef) -> u32 {
    // FNV-1a; stable across runs so frames are reproducible
    source.as_str().bytes().fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193))
}

/// A horizontal gradient whose phase advances with the frame index.
fn paint_frame(width: u32, height: u32, seed: u32, frame_index: u64) -> RgbaImage {
    let base = [(seed & 0xff) as u8, ((seed >> 8) & 0xff) as u8, ((seed >> 16) & 0xff) as u8];
    let phase = (frame_index % 256) as u32;
    RgbaImage::from_fn(width, height, |x, _y| {
        let shade = ((x * 255 / width.max(1)) + phase) % 256;
        Rgba([
            base[0].wrapping_add(shade as u8),
            base[1],
            base[2].wrapping_sub(shade as u8),
            255,
        ])
    })
}
