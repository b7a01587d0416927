#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use presenter_rs::animator::TransitionAnimator;
use presenter_rs::clock::{Clock, ManualClock};
use presenter_rs::errors::MediaError;
use presenter_rs::event::RecordingListener;
use presenter_rs::media_player::{
    FrameSlot, MediaPlayer, PlaybackStatus, PlayerConfig, PlayerFactory, RepaintSignal,
};
use presenter_rs::model::{
    Color, Component, ComponentKind, Dimensions, ImageSource, MediaKind, MediaRef, MediaSource, Rect, ShapeFill, Slide,
};
use presenter_rs::surface::PresentationSurface;
use presenter_rs::transition::{Direction, Fade};

pub const SIZE: Dimensions = Dimensions { width: 8, height: 8 };

/// Lifecycle log shared by every player a [`RecordingFactory`] creates.
#[derive(Default)]
pub struct PlayerLog {
    pub created: Vec<String>,
    pub stopped: Vec<String>,
    pub reconfigured: Vec<(String, PlayerConfig)>,
}

/// A factory whose players only record what happens to them. Positions
/// follow the shared [`ManualClock`].
pub struct RecordingFactory {
    clock: Arc<ManualClock>,
    log: Arc<Mutex<PlayerLog>>,
}

impl RecordingFactory {
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self { clock, log: Arc::new(Mutex::new(PlayerLog::default())) })
    }

    pub fn created(&self) -> usize {
        self.log.lock().created.len()
    }

    pub fn stops_of(&self, source: &str) -> usize {
        self.log.lock().stopped.iter().filter(|s| s.as_str() == source).count()
    }

    pub fn total_stops(&self) -> usize {
        self.log.lock().stopped.len()
    }

    pub fn reconfigured(&self) -> Vec<(String, PlayerConfig)> {
        self.log.lock().reconfigured.clone()
    }
}

impl PlayerFactory for RecordingFactory {
    fn create_player(
        &self,
        kind: MediaKind,
        source: &MediaRef,
        config: PlayerConfig,
        _repaint: RepaintSignal,
    ) -> Result<Box<dyn MediaPlayer>, MediaError> {
        if source.as_str().starts_with("missing:") {
            return Err(MediaError::NoPlayerAvailable(source.to_string()));
        }
        self.log.lock().created.push(source.to_string());
        Ok(Box::new(FakePlayer {
            kind,
            source: source.clone(),
            config,
            clock: self.clock.clone(),
            started_at: None,
            frozen_at: None,
            log: self.log.clone(),
        }))
    }
}

struct FakePlayer {
    kind: MediaKind,
    source: MediaRef,
    config: PlayerConfig,
    clock: Arc<ManualClock>,
    started_at: Option<Duration>,
    frozen_at: Option<Duration>,
    log: Arc<Mutex<PlayerLog>>,
}

impl MediaPlayer for FakePlayer {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn source(&self) -> &MediaRef {
        &self.source
    }

    fn config(&self) -> PlayerConfig {
        self.config
    }

    fn configure(&mut self, config: PlayerConfig) {
        self.config = config;
        self.log.lock().reconfigured.push((self.source.to_string(), config));
    }

    fn play(&mut self) -> Result<(), MediaError> {
        self.started_at = Some(self.clock.elapsed());
        Ok(())
    }

    fn stop(&mut self) {
        self.frozen_at = Some(self.position());
        self.log.lock().stopped.push(self.source.to_string());
    }

    fn position(&self) -> Duration {
        if let Some(at) = self.frozen_at {
            return at;
        }
        self.started_at.map_or(Duration::ZERO, |start| self.clock.elapsed().saturating_sub(start))
    }

    fn frames(&self) -> Option<FrameSlot> {
        None
    }

    fn status(&self) -> PlaybackStatus {
        match (self.started_at, self.frozen_at) {
            (Some(_), None) => PlaybackStatus::Playing,
            _ => PlaybackStatus::Idle,
        }
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub factory: Arc<RecordingFactory>,
    pub surface: PresentationSurface,
    pub recorder: Arc<RecordingListener>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new());
        let factory = RecordingFactory::new(clock.clone());
        let surface = PresentationSurface::new(SIZE, factory.clone(), clock.clone() as Arc<dyn Clock>);
        let recorder = RecordingListener::new();
        surface.subscribe(recorder.clone());
        Self { clock, factory, surface, recorder }
    }

    /// Advances time in steps and ticks until `terminal` terminal
    /// notifications were seen. Returns false if that never happened.
    pub fn drive_until_terminal(&self, terminal: usize) -> bool {
        for _ in 0..200 {
            if self.recorder.wait_for_terminal(terminal, Duration::from_millis(10)) {
                return true;
            }
            self.clock.advance(Duration::from_millis(50));
            self.surface.tick();
        }
        self.recorder.wait_for_terminal(terminal, Duration::from_millis(100))
    }

    /// Waits for the event with the given number of begin notifications.
    pub fn wait_for_begins(&self, begins: usize) -> bool {
        for _ in 0..500 {
            if self.recorder.begun().len() >= begins {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }
}

pub fn fade(direction: Direction, ms: u64) -> Option<TransitionAnimator> {
    Some(TransitionAnimator::new(Arc::new(Fade::new(direction)), Duration::from_millis(ms)))
}

pub fn shape(id: &str, bounds: Rect, fill: Color) -> Component {
    Component::new(id, bounds, ComponentKind::Shape(ShapeFill { fill }))
}

pub fn video(id: &str, source: &str, looped: bool) -> Component {
    video_with_poster(id, source, looped, Color::rgb(0, 0, 128))
}

/// A full-size video whose poster is shown while no frame is decoded.
pub fn video_with_poster(id: &str, source: &str, looped: bool, poster: Color) -> Component {
    Component::new(
        id,
        Rect::new(0, 0, SIZE.width, SIZE.height),
        ComponentKind::Video(MediaSource { source: MediaRef::new(source), looped, muted: true, poster: Some(poster) }),
    )
}

/// A full-size still image component.
pub fn still(id: &str, path: &std::path::Path) -> Component {
    let source = MediaRef::new(path.to_str().expect("utf-8 media path"));
    Component::new(id, Rect::new(0, 0, SIZE.width, SIZE.height), ComponentKind::Image(ImageSource { source }))
}

/// A full-size solid slide.
pub fn solid(name: &str, fill: Color) -> Arc<Slide> {
    Arc::new(Slide::new(name, SIZE).with_component(shape("fill", Rect::new(0, 0, SIZE.width, SIZE.height), fill)))
}
