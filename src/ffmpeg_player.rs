//! Video playback backed by `ffmpeg-next`.
//!
//! The input is opened on the decode thread itself; the open result is sent
//! back before `play` returns so a missing file or codec surfaces as a player
//! init failure rather than a silent black component.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self as std_mpsc, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::frame::video::Video;
use image::RgbaImage;
use log::{debug, error, info, trace, warn};

use crate::errors::MediaError;
use crate::media_pipeline::{DecodeShared, SyntheticVideoPlayer};
use crate::media_player::{FrameSlot, MediaPlayer, PlaybackStatus, PlayerConfig, PlayerRegistry, RepaintSignal};
use crate::model::{MediaKind, MediaRef};

const FALLBACK_FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 30);

pub struct FfmpegVideoPlayer {
    source: MediaRef,
    config: PlayerConfig,
    frames: FrameSlot,
    repaint: RepaintSignal,
    shared: Arc<DecodeShared>,
    decoder_thread_handle: Option<thread::JoinHandle<()>>,
}

impl FfmpegVideoPlayer {
    pub fn new(source: MediaRef, config: PlayerConfig, repaint: RepaintSignal) -> Self {
        Self {
            source,
            config,
            frames: FrameSlot::new(),
            repaint,
            shared: Arc::new(DecodeShared::new(config.looped)),
            decoder_thread_handle: None,
        }
    }
}

impl MediaPlayer for FfmpegVideoPlayer {
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
        let path = self.source.to_string();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), MediaError>>(1);

        debug!("Spawning video decoding thread for: {}", path);
        let handle = thread::Builder::new()
            .name(format!("decode:{}", path))
            .spawn(move || decode_thread(&path, &shared, &frames, &repaint, ready_tx))
            .map_err(|e| {
                error!("Failed to spawn decoder thread for {}: {}", self.source, e);
                MediaError::DecodeThread(e.to_string())
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.decoder_thread_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.shared.set_status(PlaybackStatus::Failed(e.to_string()));
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                let message = format!("decoder thread for {} exited before opening its input", self.source);
                self.shared.set_status(PlaybackStatus::Failed(message.clone()));
                Err(MediaError::DecodeThread(message))
            }
        }
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

/// An opened input with its video decoder and RGBA scaler.
struct DecodeSession {
    ictx: ffmpeg::format::context::Input,
    video_stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: Scaler,
    time_base: f64,
    frame_interval: Duration,
}

enum SessionEnd {
    Eof,
    Stopped,
    Failed(String),
}

fn open_session(path: &str) -> Result<DecodeSession, MediaError> {
    let ictx = ffmpeg::format::input(&path).map_err(|e| {
        error!("FFmpeg: Failed to open {}: {}", path, e);
        MediaError::Ffmpeg(e)
    })?;
    let input_stream = ictx.streams().best(Type::Video).ok_or_else(|| {
        error!("FFmpeg: No video stream found for {}", path);
        MediaError::Ffmpeg(ffmpeg::Error::StreamNotFound)
    })?;
    let video_stream_index = input_stream.index();
    let time_base = f64::from(input_stream.time_base());
    let rate = f64::from(input_stream.avg_frame_rate());
    let frame_interval = if rate > 0.0 { Duration::from_secs_f64(1.0 / rate) } else { FALLBACK_FRAME_INTERVAL };

    let context_decoder = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())?;
    let decoder = context_decoder.decoder().video()?;
    debug!(
        "Video decoder initialized for {}. Format: {:?}, Width: {}, Height: {}",
        path,
        decoder.format(),
        decoder.width(),
        decoder.height()
    );
    let scaler = Scaler::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        Pixel::RGBA,
        decoder.width(),
        decoder.height(),
        Flags::BILINEAR,
    )?;
    Ok(DecodeSession { ictx, video_stream_index, decoder, scaler, time_base, frame_interval })
}

fn decode_thread(
    path: &str,
    shared: &DecodeShared,
    frames: &FrameSlot,
    repaint: &RepaintSignal,
    ready: SyncSender<Result<(), MediaError>>,
) {
    let mut ready = Some(ready);
    loop {
        let mut session = match open_session(path) {
            Ok(session) => session,
            Err(e) => {
                match ready.take() {
                    Some(tx) => {
                        let _ = tx.send(Err(e));
                    }
                    None => shared.set_status(PlaybackStatus::Failed(e.to_string())),
                }
                return;
            }
        };
        if let Some(tx) = ready.take() {
            shared.set_status(PlaybackStatus::Playing);
            let _ = tx.send(Ok(()));
        }

        match run_session(&mut session, path, shared, frames, repaint) {
            SessionEnd::Eof if shared.looped.load(Ordering::Acquire) && !shared.is_stopped() => {
                debug!("Video EOF for {}, looping.", path);
                shared.set_position(Duration::ZERO);
            }
            SessionEnd::Eof => {
                info!("Video {} reached end of stream.", path);
                shared.set_status(PlaybackStatus::Ended);
                repaint.request();
                break;
            }
            SessionEnd::Stopped => {
                info!("Decoder thread for {} received stop signal.", path);
                break;
            }
            SessionEnd::Failed(message) => {
                shared.set_status(PlaybackStatus::Failed(message));
                break;
            }
        }
    }
    info!("Video decoding thread for {} finished.", path);
}

fn run_session(
    session: &mut DecodeSession,
    path: &str,
    shared: &DecodeShared,
    frames: &FrameSlot,
    repaint: &RepaintSignal,
) -> SessionEnd {
    let DecodeSession { ictx, video_stream_index, decoder, scaler, time_base, frame_interval } = session;
    let mut decoded_frame = Video::empty();
    for (stream, packet) in ictx.packets() {
        if shared.is_stopped() {
            return SessionEnd::Stopped;
        }
        if stream.index() != *video_stream_index {
            continue;
        }
        if let Err(e) = decoder.send_packet(&packet) {
            error!("FFmpeg send_packet error for {}: {}", path, e);
            return SessionEnd::Failed(e.to_string());
        }
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            if shared.is_stopped() {
                return SessionEnd::Stopped;
            }
            let mut rgba_frame = Video::empty();
            if let Err(e) = scaler.run(&decoded_frame, &mut rgba_frame) {
                error!("FFmpeg frame scaling failed for {}: {}", path, e);
                return SessionEnd::Failed(e.to_string());
            }
            if let Some(pts) = decoded_frame.timestamp() {
                shared.set_position(Duration::from_secs_f64((pts as f64 * *time_base).max(0.0)));
            }
            match frame_to_image(&rgba_frame) {
                Some(image) => {
                    frames.publish(Arc::new(image));
                    trace!("Published video frame for: {}", path);
                    repaint.request();
                }
                None => warn!("Dropping malformed RGBA frame for {}", path),
            }
            thread::sleep(*frame_interval);
        }
    }
    SessionEnd::Eof
}

/// Copies an RGBA frame row by row; ffmpeg pads rows to its line stride.
fn frame_to_image(frame: &Video) -> Option<RgbaImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 4;
    let stride = frame.stride(0);
    let data = frame.data(0);
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(data.get(start..start + row_bytes)?);
    }
    RgbaImage::from_raw(width, height, pixels)
}

/// Initializes ffmpeg and routes video sources to it. `synthetic:` sources
/// keep their synthetic backend.
///
/// # Errors
/// `MediaError::Ffmpeg` if the library fails to initialize.
pub fn register_ffmpeg(registry: &mut PlayerRegistry) -> Result<(), MediaError> {
    ffmpeg::init()?;
    info!("FFmpeg initialized; registering video backend");
    registry.register(MediaKind::Video, |source, config, repaint| {
        if source.as_str().starts_with("synthetic:") {
            Ok(Box::new(SyntheticVideoPlayer::new(source.clone(), config, repaint)) as Box<dyn MediaPlayer>)
        } else {
            Ok(Box::new(FfmpegVideoPlayer::new(source.clone(), config, repaint)) as Box<dyn MediaPlayer>)
        }
    });
    Ok(())
}
