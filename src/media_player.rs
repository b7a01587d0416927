//! The media player lifecycle contract.
//!
//! Each playable component (video or audio) gets its own decode/playback
//! session, created through a [`PlayerFactory`] keyed by [`MediaKind`]. The
//! session is owned by exactly one [`PlayerHandle`]; components only register
//! as listeners on it. Releasing a handle consumes it, so a double release or
//! a use after release does not compile.
//!
//! Decode threads never touch the surface's pixel buffers. They publish the
//! latest frame into a [`FrameSlot`] and flip a [`RepaintSignal`]; the render
//! thread picks both up on its next tick.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::errors::MediaError;
use crate::model::{MediaKind, MediaRef};

/// Playback options pushed to a player at creation, and live-patched when a
/// new component takes over an existing session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerConfig {
    pub looped: bool,
    pub muted: bool,
}

/// What a player reports about its own session. Decode failures surface here
/// instead of being thrown across the boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    Ended,
    Failed(String),
}

/// Repaint request flag shared between decode threads and the render loop.
#[derive(Clone, Default)]
pub struct RepaintSignal {
    requested: Arc<AtomicBool>,
    waker: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl RepaintSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also invokes `waker` on every request, e.g. to unpark a UI loop.
    pub fn with_waker(waker: impl Fn() + Send + Sync + 'static) -> Self {
        Self { requested: Arc::new(AtomicBool::new(false)), waker: Some(Arc::new(waker)) }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        if let Some(waker) = &self.waker {
            waker();
        }
    }

    /// Returns whether a repaint was requested and resets the flag.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RepaintSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepaintSignal")
            .field("requested", &self.is_requested())
            .field("has_waker", &self.waker.is_some())
            .finish()
    }
}

/// The most recent decoded frame of a video session.
#[derive(Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<Arc<RgbaImage>>>>,
    generation: Arc<AtomicU64>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Arc<RgbaImage>) {
        *self.latest.lock() = Some(frame);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn latest(&self) -> Option<Arc<RgbaImage>> {
        self.latest.lock().clone()
    }

    /// Number of frames published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSlot").field("generation", &self.generation()).finish()
    }
}

/// One decode/playback session.
pub trait MediaPlayer: Send {
    fn kind(&self) -> MediaKind;

    fn source(&self) -> &MediaRef;

    fn config(&self) -> PlayerConfig;

    /// Applies new loop/mute settings without restarting playback.
    fn configure(&mut self, config: PlayerConfig);

    #[must_use = "starting playback can fail; the Result must be handled"]
    fn play(&mut self) -> Result<(), MediaError>;

    /// Stops playback and frees decode resources. Called exactly once, by
    /// the owning handle.
    fn stop(&mut self);

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Decoded frames, for video sessions.
    fn frames(&self) -> Option<FrameSlot>;

    fn status(&self) -> PlaybackStatus;
}

/// Creates players. `Err` is the "no player available" outcome; the caller
/// logs it and renders the component statically.
pub trait PlayerFactory: Send + Sync {
    #[must_use = "player creation can fail; the Result must be handled"]
    fn create_player(
        &self,
        kind: MediaKind,
        source: &MediaRef,
        config: PlayerConfig,
        repaint: RepaintSignal,
    ) -> Result<Box<dyn MediaPlayer>, MediaError>;
}

type PlayerConstructor =
    Box<dyn Fn(&MediaRef, PlayerConfig, RepaintSignal) -> Result<Box<dyn MediaPlayer>, MediaError> + Send + Sync>;

/// A [`PlayerFactory`] dispatching to one constructor per media kind.
#[derive(Default)]
pub struct PlayerRegistry {
    constructors: HashMap<MediaKind, PlayerConstructor>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: MediaKind, constructor: F)
    where
        F: Fn(&MediaRef, PlayerConfig, RepaintSignal) -> Result<Box<dyn MediaPlayer>, MediaError>
            + Send
            + Sync
            + 'static,
    {
        debug!("Registering {} player constructor", kind);
        self.constructors.insert(kind, Box::new(constructor));
    }

    pub fn supports(&self, kind: MediaKind) -> bool {
        self.constructors.contains_key(&kind)
    }
}

impl PlayerFactory for PlayerRegistry {
    fn create_player(
        &self,
        kind: MediaKind,
        source: &MediaRef,
        config: PlayerConfig,
        repaint: RepaintSignal,
    ) -> Result<Box<dyn MediaPlayer>, MediaError> {
        let constructor = self.constructors.get(&kind).ok_or_else(|| {
            MediaError::NoPlayerAvailable(format!("no {} backend registered for '{}'", kind, source))
        })?;
        constructor(source, config, repaint)
    }
}

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlayerId(u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    Created,
    Playing,
}

/// Exclusive owner of one playback session.
///
/// Dropping the handle releases the session; [`release`](Self::release) is the
/// explicit, logged spelling of the same thing.
pub struct PlayerHandle {
    id: PlayerId,
    player: Box<dyn MediaPlayer>,
    state: HandleState,
    listeners: Vec<String>,
}

impl PlayerHandle {
    pub fn new(player: Box<dyn MediaPlayer>) -> Self {
        let id = PlayerId(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed));
        debug!("Created {} for {} '{}'", id, player.kind(), player.source());
        Self { id, player, state: HandleState::Created, listeners: Vec::new() }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.player.kind()
    }

    pub fn source(&self) -> &MediaRef {
        self.player.source()
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Starts playback. A handle already playing is left alone.
    #[must_use = "starting playback can fail; the Result must be handled"]
    pub fn start(&mut self) -> Result<(), MediaError> {
        if self.state == HandleState::Playing {
            return Ok(());
        }
        self.player.play()?;
        self.state = HandleState::Playing;
        info!("Started {} ({} '{}')", self.id, self.kind(), self.source());
        Ok(())
    }

    /// Registers a component as an observer of this session's frames.
    pub fn attach(&mut self, component_id: &str) {
        if !self.listeners.iter().any(|l| l == component_id) {
            self.listeners.push(component_id.to_string());
        }
    }

    pub fn detach(&mut self, component_id: &str) {
        self.listeners.retain(|l| l != component_id);
    }

    pub fn listeners(&self) -> &[String] {
        &self.listeners
    }

    /// Live-patches loop/mute without restarting the session.
    pub fn reconfigure(&mut self, config: PlayerConfig) {
        if self.player.config() != config {
            debug!("Reconfiguring {}: {:?}", self.id, config);
            self.player.configure(config);
        }
    }

    pub fn config(&self) -> PlayerConfig {
        self.player.config()
    }

    pub fn position(&self) -> Duration {
        self.player.position()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.player.status()
    }

    pub fn latest_frame(&self) -> Option<Arc<RgbaImage>> {
        self.player.frames().and_then(|slot| slot.latest())
    }

    /// Releases the session. Consumes the handle.
    pub fn release(self) {
        info!("Releasing {} ({} '{}')", self.id, self.kind(), self.source());
        drop(self);
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        if let PlaybackStatus::Failed(reason) = self.player.status() {
            warn!("{} released after failure: {}", self.id, reason);
        }
        self.player.stop();
        debug!("{} stopped", self.id);
    }
}

impl fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("source", self.source())
            .field("state", &self.state)
            .field("listeners", &self.listeners)
            .finish()
    }
}
