//! The presentation surface: state machine, double buffers and media sessions.
//!
//! This module is responsible for:
//! - Executing `send`/`clear` events: rendering the incoming slide, opening its
//!   playback sessions and starting the transition animator.
//! - Ticking: refreshing dynamic content and compositing the in-flight
//!   transition into the output frame.
//! - Promotion on completion: the incoming slide becomes current and the old
//!   current slide's sessions are released, or everything is released on clear.
//! - Background continuity: an identical video or image background is handed
//!   from the current slide to the incoming one instead of being restarted.
//! - The transition gate the request serializer waits on.
//!
//! All buffer mutation happens inside the surface's state lock. Listener
//! notifications and retired slides are collected while the lock is held;
//! sessions are stopped and notifications published after it is released, in
//! the order they were produced. The gate opens only after an
//! event's terminal notification has been published.

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use image::RgbaImage;
use log::{debug, error, info, trace, warn};
use parking_lot::{Condvar, Mutex, ReentrantMutex};

use crate::animator::TransitionAnimator;
use crate::clock::Clock;
use crate::config::{PresentationConfig, TransitionPreferences};
use crate::errors::PresentationError;
use crate::event::{EventAction, EventNotice, Listeners, Notification, PresentationEvent, PresentationListener};
use crate::media_cache::MediaCache;
use crate::media_player::{PlayerFactory, PlayerHandle, PlayerId, RepaintSignal};
use crate::model::{Component, ComponentKind, Dimensions, MediaKind, MediaRef, Slide};
use crate::pixel_buffer::PixelBuffer;
use crate::renderer::{should_play, FrameSource, RenderOptions, SlideRenderer};
use crate::transition::Direction;

const DEFAULT_CACHE_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    /// Nothing displayed.
    Clear,
    /// An incoming slide is animating over the current one.
    TransitioningIn,
    /// The current slide is steady.
    Displayed,
    /// The current slide is animating away to an empty screen.
    TransitioningOut,
}

impl fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurfaceState::Clear => "clear",
            SurfaceState::TransitioningIn => "transitioning-in",
            SurfaceState::Displayed => "displayed",
            SurfaceState::TransitioningOut => "transitioning-out",
        };
        f.write_str(name)
    }
}

/// A slide plus the playback sessions it owns while it is current or incoming.
struct SlideState {
    slide: Arc<Slide>,
    /// Foreground sessions keyed by component id.
    players: Vec<(String, PlayerHandle)>,
    background_player: Option<PlayerHandle>,
    /// False while the background is drawn separately underneath this slide's
    /// buffer because it continues across a slide change.
    include_background: bool,
}

impl SlideState {
    fn new(slide: Arc<Slide>) -> Self {
        Self { slide, players: Vec::new(), background_player: None, include_background: true }
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions { include_background: self.include_background }
    }

    /// True if this slide's buffer changes without a new event.
    fn is_dynamic(&self) -> bool {
        self.slide.has_auto_updating()
            || self.players.iter().any(|(_, h)| h.kind() == MediaKind::Video)
            || (self.include_background
                && self.background_player.as_ref().is_some_and(|h| h.kind() == MediaKind::Video))
    }

    fn session_count(&self) -> usize {
        self.players.len() + usize::from(self.background_player.is_some())
    }

    fn release(self) {
        debug!("Releasing {} session(s) of slide '{}'", self.session_count(), self.slide.name);
        for (_, handle) in self.players {
            handle.release();
        }
        if let Some(handle) = self.background_player {
            handle.release();
        }
    }
}

impl FrameSource for SlideState {
    fn frame_for(&self, component_id: &str) -> Option<Arc<RgbaImage>> {
        if let Some((_, handle)) = self.players.iter().find(|(id, _)| id == component_id) {
            return handle.latest_frame();
        }
        self.background_player
            .as_ref()
            .filter(|h| h.listeners().iter().any(|l| l == component_id))
            .and_then(PlayerHandle::latest_frame)
    }
}

struct ActiveTransition {
    animator: TransitionAnimator,
    notice: EventNotice,
}

struct SurfaceInner {
    state: SurfaceState,
    dimensions: Dimensions,
    buffer_current: PixelBuffer,
    buffer_incoming: PixelBuffer,
    output: PixelBuffer,
    current: Option<SlideState>,
    incoming: Option<SlideState>,
    active: Option<ActiveTransition>,
    /// Auto-updating content on the displayed slide needs periodic ticks.
    clock_running: bool,
    renderer: SlideRenderer,
    factory: Arc<dyn PlayerFactory>,
    clock: Arc<dyn Clock>,
    repaint: RepaintSignal,
    /// Slides whose sessions are stopped once the state lock is released.
    /// Stopping a player may join its decode thread.
    retired: Vec<SlideState>,
}

/// Blocks the request serializer while a transition is in flight.
struct TransitionGate {
    busy: Mutex<bool>,
    changed: Condvar,
}

impl TransitionGate {
    fn new() -> Self {
        Self { busy: Mutex::new(false), changed: Condvar::new() }
    }

    fn close(&self) {
        *self.busy.lock() = true;
    }

    fn open(&self) {
        let mut busy = self.busy.lock();
        if *busy {
            *busy = false;
            self.changed.notify_all();
        }
    }

    /// Waits until the gate is open. Returns false if `cancelled` turned true
    /// first.
    fn wait_idle(&self, cancelled: &dyn Fn() -> bool) -> bool {
        let mut busy = self.busy.lock();
        while *busy {
            if cancelled() {
                return false;
            }
            self.changed.wait(&mut busy);
        }
        !cancelled()
    }

    fn interrupt(&self) {
        let _busy = self.busy.lock();
        self.changed.notify_all();
    }
}

struct SurfaceShared {
    inner: Mutex<SurfaceInner>,
    gate: TransitionGate,
    listeners: Listeners,
    /// Orders whole execute/tick passes, publication included. Reentrant so a
    /// listener may call back into the surface from its own thread.
    dispatch: ReentrantMutex<()>,
}

/// A cloneable handle to one presentation surface.
#[derive(Clone)]
pub struct PresentationSurface {
    shared: Arc<SurfaceShared>,
}

impl PresentationSurface {
    pub fn new(dimensions: Dimensions, factory: Arc<dyn PlayerFactory>, clock: Arc<dyn Clock>) -> Self {
        Self::with_cache(dimensions, factory, clock, MediaCache::new(DEFAULT_CACHE_CAPACITY))
    }

    pub fn from_config(config: &PresentationConfig, factory: Arc<dyn PlayerFactory>, clock: Arc<dyn Clock>) -> Self {
        Self::with_cache(config.dimensions, factory, clock, MediaCache::new(config.media_cache_capacity))
    }

    pub fn with_cache(
        dimensions: Dimensions,
        factory: Arc<dyn PlayerFactory>,
        clock: Arc<dyn Clock>,
        cache: MediaCache,
    ) -> Self {
        info!("Creating presentation surface {}", dimensions);
        let inner = SurfaceInner {
            state: SurfaceState::Clear,
            dimensions,
            buffer_current: PixelBuffer::new(dimensions),
            buffer_incoming: PixelBuffer::new(dimensions),
            output: PixelBuffer::new(dimensions),
            current: None,
            incoming: None,
            active: None,
            clock_running: false,
            renderer: SlideRenderer::new(cache),
            factory,
            clock,
            repaint: RepaintSignal::new(),
            retired: Vec::new(),
        };
        Self {
            shared: Arc::new(SurfaceShared {
                inner: Mutex::new(inner),
                gate: TransitionGate::new(),
                listeners: Listeners::default(),
                dispatch: ReentrantMutex::new(()),
            }),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn PresentationListener>) {
        self.shared.listeners.subscribe(listener);
    }

    /// Runs an event synchronously.
    ///
    /// An in-flight transition is force-stopped first and its event reported
    /// dropped. A `Clear` on a clear surface is reported dropped without
    /// touching any buffer. Player failures never surface here; the affected
    /// component renders its static fallback.
    ///
    /// # Errors
    /// `PresentationError::InvalidSlide` if a sent slide has empty geometry.
    /// Nothing is notified and no buffer is touched in that case.
    #[must_use = "executing an event can fail; the Result must be handled"]
    pub fn execute(&self, event: PresentationEvent) -> Result<(), PresentationError> {
        if let EventAction::Send { slide, .. } = event.action() {
            slide.validate().map_err(|e| {
                error!("Rejecting event {}: {}", event.id(), e);
                e
            })?;
        }
        let _dispatch = self.shared.dispatch.lock();
        let (notice, action, preferences) = event.into_parts();
        let mut notes = Vec::new();
        let retired = {
            let mut inner = self.shared.inner.lock();
            inner.execute(notice, action, preferences, &mut notes);
            if inner.active.is_some() {
                self.shared.gate.close();
            }
            mem::take(&mut inner.retired)
        };
        release_all(retired);
        self.publish(notes);
        Ok(())
    }

    /// Advances the in-flight transition (if any), refreshes dynamic content
    /// and recomposites the output frame. Completes the transition when the
    /// animator reaches the end.
    pub fn tick(&self) -> SurfaceState {
        let _dispatch = self.shared.dispatch.lock();
        let mut notes = Vec::new();
        let (state, retired) = {
            let mut inner = self.shared.inner.lock();
            inner.tick(&mut notes);
            (inner.state, mem::take(&mut inner.retired))
        };
        release_all(retired);
        self.publish(notes);
        state
    }

    /// Forces the in-flight transition to its end and runs promotion (or the
    /// clear teardown) on the calling thread. The event completes normally.
    /// Returns false, doing nothing, if no transition is in flight.
    pub fn stop_transition(&self) -> bool {
        let _dispatch = self.shared.dispatch.lock();
        let mut notes = Vec::new();
        let (stopped, retired) = {
            let mut inner = self.shared.inner.lock();
            let stopped = match inner.active.as_mut() {
                Some(active) => {
                    active.animator.stop();
                    inner.finish(&mut notes);
                    true
                }
                None => false,
            };
            (stopped, mem::take(&mut inner.retired))
        };
        release_all(retired);
        self.publish(notes);
        stopped
    }

    /// Force-stops the in-flight transition on behalf of a newer event and
    /// reports the in-flight event dropped.
    ///
    /// If `next_is_clear`, an incoming slide is torn down instead of promoted.
    /// Returns false if nothing was in flight.
    pub fn supersede(&self, next_is_clear: bool) -> bool {
        let _dispatch = self.shared.dispatch.lock();
        let mut notes = Vec::new();
        let (superseded, retired) = {
            let mut inner = self.shared.inner.lock();
            let superseded = inner.abandon_in_flight(next_is_clear, &mut notes);
            (superseded, mem::take(&mut inner.retired))
        };
        release_all(retired);
        self.publish(notes);
        superseded
    }

    /// Reallocates every buffer to `dimensions` and re-renders what is shown.
    pub fn resize(&self, dimensions: Dimensions) {
        let _dispatch = self.shared.dispatch.lock();
        self.shared.inner.lock().resize(dimensions);
    }

    /// Forgets a cached still image and re-renders, e.g. after the file changed.
    pub fn invalidate_media(&self, reference: &MediaRef) {
        let _dispatch = self.shared.dispatch.lock();
        let mut inner = self.shared.inner.lock();
        if inner.renderer.cache_mut().invalidate(reference) {
            inner.rerender_all();
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.shared.inner.lock().state
    }

    pub fn dimensions(&self) -> Dimensions {
        self.shared.inner.lock().dimensions
    }

    /// A copy of the visible frame.
    pub fn frame(&self) -> PixelBuffer {
        self.shared.inner.lock().output.clone()
    }

    /// A copy of the last fully rendered current slide.
    pub fn current_buffer(&self) -> PixelBuffer {
        self.shared.inner.lock().buffer_current.clone()
    }

    /// Dimensions of the current, incoming and output buffers.
    pub fn buffer_dimensions(&self) -> [Dimensions; 3] {
        let inner = self.shared.inner.lock();
        [inner.buffer_current.dimensions(), inner.buffer_incoming.dimensions(), inner.output.dimensions()]
    }

    pub fn current_slide(&self) -> Option<Arc<Slide>> {
        self.shared.inner.lock().current.as_ref().map(|s| s.slide.clone())
    }

    pub fn in_flight_direction(&self) -> Option<Direction> {
        match self.state() {
            SurfaceState::TransitioningIn => Some(Direction::In),
            SurfaceState::TransitioningOut => Some(Direction::Out),
            SurfaceState::Clear | SurfaceState::Displayed => None,
        }
    }

    pub fn is_clear_in_flight(&self) -> bool {
        self.in_flight_direction() == Some(Direction::Out)
    }

    pub fn is_idle(&self) -> bool {
        self.shared.inner.lock().active.is_none()
    }

    /// True while a transition runs or the displayed slide has auto-updating
    /// content. The render loop may stop ticking otherwise.
    pub fn wants_clock_ticks(&self) -> bool {
        let inner = self.shared.inner.lock();
        inner.active.is_some() || inner.clock_running
    }

    /// True if a decode thread delivered a frame since the last tick.
    pub fn needs_repaint(&self) -> bool {
        self.shared.inner.lock().repaint.is_requested()
    }

    pub fn repaint_signal(&self) -> RepaintSignal {
        self.shared.inner.lock().repaint.clone()
    }

    /// Number of playback sessions currently owned by the surface.
    pub fn live_sessions(&self) -> usize {
        let inner = self.shared.inner.lock();
        inner.current.as_ref().map_or(0, SlideState::session_count)
            + inner.incoming.as_ref().map_or(0, SlideState::session_count)
    }

    /// Id and position of the background session of the newest slide.
    pub fn background_session(&self) -> Option<(PlayerId, Duration)> {
        let inner = self.shared.inner.lock();
        inner
            .incoming
            .as_ref()
            .and_then(|s| s.background_player.as_ref())
            .or_else(|| inner.current.as_ref().and_then(|s| s.background_player.as_ref()))
            .map(|h| (h.id(), h.position()))
    }

    /// Blocks until no transition is in flight. Returns false if `cancelled`
    /// turned true first; callers wake the wait with [`interrupt_wait`](Self::interrupt_wait).
    pub fn wait_until_idle(&self, cancelled: &dyn Fn() -> bool) -> bool {
        self.shared.gate.wait_idle(cancelled)
    }

    pub fn interrupt_wait(&self) {
        self.shared.gate.interrupt();
    }

    /// Reports an event that never reached the surface as dropped.
    pub(crate) fn report_dropped(&self, notice: EventNotice) {
        let _dispatch = self.shared.dispatch.lock();
        info!("Dropped {}", notice);
        self.shared.listeners.publish(&Notification::Dropped(notice));
    }

    fn publish(&self, notes: Vec<Notification>) {
        let terminal = notes.iter().any(Notification::is_terminal);
        for note in &notes {
            self.shared.listeners.publish(note);
        }
        if terminal {
            let inner = self.shared.inner.lock();
            if inner.active.is_none() {
                self.shared.gate.open();
            }
        }
    }
}

impl fmt::Debug for PresentationSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("PresentationSurface")
            .field("state", &inner.state)
            .field("dimensions", &inner.dimensions)
            .field("current", &inner.current.as_ref().map(|s| s.slide.name.as_str()))
            .field("incoming", &inner.incoming.as_ref().map(|s| s.slide.name.as_str()))
            .finish()
    }
}

impl SurfaceInner {
    fn set_state(&mut self, new_state: SurfaceState) {
        if self.state != new_state {
            info!("Surface state {} -> {}", self.state, new_state);
            self.state = new_state;
        }
    }

    fn execute(
        &mut self,
        notice: EventNotice,
        action: EventAction,
        preferences: TransitionPreferences,
        notes: &mut Vec<Notification>,
    ) {
        let is_clear = matches!(action, EventAction::Clear { .. });
        self.abandon_in_flight(is_clear, notes);
        match action {
            EventAction::Send { slide, animator } => self.begin_send(notice, slide, animator, preferences, notes),
            EventAction::Clear { animator } => self.begin_clear(notice, animator, notes),
        }
    }

    fn begin_send(
        &mut self,
        notice: EventNotice,
        slide: Arc<Slide>,
        animator: Option<TransitionAnimator>,
        preferences: TransitionPreferences,
        notes: &mut Vec<Notification>,
    ) {
        info!("Begin {}", notice);
        notes.push(Notification::Begin(notice.clone()));
        self.ensure_buffers();
        let wall = self.clock.wall();

        let mut incoming = SlideState::new(slide.clone());
        let continues = self.current.as_ref().is_some_and(|c| background_continues(&c.slide, &slide, &preferences));
        if continues {
            self.continue_background(&slide, &mut incoming, wall);
        } else {
            incoming.background_player = slide
                .background
                .as_ref()
                .and_then(|bg| open_session(self.factory.as_ref(), &self.repaint, &slide, bg));
            if let Some(current) = self.current.as_mut().filter(|c| !c.include_background) {
                debug!("Re-rendering '{}' with its background", current.slide.name);
                current.include_background = true;
                render_state(&mut self.renderer, current, &mut self.buffer_current, wall);
            }
        }

        for component in &slide.components {
            if let Some(handle) = open_session(self.factory.as_ref(), &self.repaint, &slide, component) {
                incoming.players.push((component.id.clone(), handle));
            }
        }

        render_state(&mut self.renderer, &incoming, &mut self.buffer_incoming, wall);
        self.incoming = Some(incoming);
        self.set_state(SurfaceState::TransitioningIn);
        self.start_animator(notice, animator.unwrap_or_else(|| TransitionAnimator::cut(Direction::In)), notes);
    }

    /// Hands the current slide's background session to `incoming` and makes
    /// sure the current buffer no longer contains the background, which is
    /// now drawn underneath the transition.
    fn continue_background(&mut self, slide: &Arc<Slide>, incoming: &mut SlideState, wall: DateTime<Local>) {
        let (Some(current), Some(new_bg)) = (self.current.as_mut(), slide.background.as_ref()) else {
            return;
        };
        incoming.include_background = false;
        match current.background_player.take() {
            Some(mut handle) => {
                if let Some(old_bg) = &current.slide.background {
                    handle.detach(&old_bg.id);
                }
                handle.attach(&new_bg.id);
                if let Some(config) = new_bg.player_config() {
                    handle.reconfigure(config);
                }
                info!("Background '{}' continues on {} at {:?}", new_bg.id, handle.id(), handle.position());
                incoming.background_player = Some(handle);
            }
            None => {
                incoming.background_player = open_session(self.factory.as_ref(), &self.repaint, slide, new_bg);
            }
        }
        if current.include_background {
            debug!("Re-rendering '{}' without its background", current.slide.name);
            current.include_background = false;
            render_state(&mut self.renderer, current, &mut self.buffer_current, wall);
        }
    }

    fn begin_clear(&mut self, notice: EventNotice, animator: Option<TransitionAnimator>, notes: &mut Vec<Notification>) {
        if self.state == SurfaceState::Clear {
            info!("Surface already clear, dropping {}", notice);
            notes.push(Notification::Dropped(notice));
            return;
        }
        info!("Begin {}", notice);
        notes.push(Notification::Begin(notice.clone()));
        self.ensure_buffers();
        let wall = self.clock.wall();
        if let Some(current) = self.current.as_mut().filter(|c| !c.include_background) {
            debug!("Re-rendering '{}' with its background before clearing", current.slide.name);
            current.include_background = true;
            render_state(&mut self.renderer, current, &mut self.buffer_current, wall);
        }
        self.buffer_incoming.clear();
        self.set_state(SurfaceState::TransitioningOut);
        self.start_animator(notice, animator.unwrap_or_else(|| TransitionAnimator::cut(Direction::Out)), notes);
    }

    fn start_animator(&mut self, notice: EventNotice, mut animator: TransitionAnimator, notes: &mut Vec<Notification>) {
        debug!("Starting {:?} for {}", animator, notice);
        animator.start(self.clock.now());
        let complete = animator.is_complete();
        self.active = Some(ActiveTransition { animator, notice });
        if complete {
            self.finish(notes);
        } else {
            self.compose();
        }
    }

    fn tick(&mut self, notes: &mut Vec<Notification>) {
        let now = self.clock.now();
        let wall = self.clock.wall();
        if self.repaint.take() {
            trace!("Repaint requested by a decode thread");
        }
        if let Some(active) = self.active.as_mut() {
            active.animator.tick(now);
        }
        if let Some(current) = self.current.as_ref().filter(|s| s.is_dynamic()) {
            render_state(&mut self.renderer, current, &mut self.buffer_current, wall);
        }
        if let Some(incoming) = self.incoming.as_ref().filter(|s| s.is_dynamic()) {
            render_state(&mut self.renderer, incoming, &mut self.buffer_incoming, wall);
        }
        if self.active.as_ref().is_some_and(|a| a.animator.is_complete()) {
            self.finish(notes);
        } else {
            self.compose();
        }
    }

    /// Completes the in-flight transition normally.
    fn finish(&mut self, notes: &mut Vec<Notification>) {
        let Some(active) = self.active.take() else { return };
        match self.state {
            SurfaceState::TransitioningIn => self.promote(),
            SurfaceState::TransitioningOut => self.clear_all(),
            other => warn!("Transition for {} finished in unexpected state {}", active.notice, other),
        }
        info!("Complete {}", active.notice);
        notes.push(Notification::Complete(active.notice));
    }

    fn abandon_in_flight(&mut self, next_is_clear: bool, notes: &mut Vec<Notification>) -> bool {
        let Some(mut active) = self.active.take() else { return false };
        active.animator.stop();
        match self.state {
            SurfaceState::TransitioningIn if next_is_clear => self.tear_down_incoming(),
            SurfaceState::TransitioningIn => self.promote(),
            SurfaceState::TransitioningOut => self.clear_all(),
            other => warn!("Abandoning {} in unexpected state {}", active.notice, other),
        }
        info!("Superseded in-flight {}", active.notice);
        notes.push(Notification::Dropped(active.notice));
        true
    }

    /// The incoming slide becomes current; the old current slide's sessions
    /// are released.
    fn promote(&mut self) {
        let Some(incoming) = self.incoming.take() else {
            warn!("Promotion requested with no incoming slide");
            return;
        };
        info!("Promoting slide '{}'", incoming.slide.name);
        self.clock_running = incoming.slide.has_auto_updating();
        if let Some(previous) = self.current.replace(incoming) {
            self.retired.push(previous);
        }
        mem::swap(&mut self.buffer_current, &mut self.buffer_incoming);
        self.buffer_incoming.clear();
        self.set_state(SurfaceState::Displayed);
        if !self.clock_running {
            debug!("Displayed slide has no auto-updating content; clock ticks may stop");
        }
        self.compose();
    }

    fn clear_all(&mut self) {
        self.retired.extend(self.current.take());
        self.retired.extend(self.incoming.take());
        self.buffer_current.clear();
        self.buffer_incoming.clear();
        self.output.clear();
        self.clock_running = false;
        self.set_state(SurfaceState::Clear);
    }

    /// Discards the incoming slide. A background session it inherited goes
    /// back to the current slide.
    fn tear_down_incoming(&mut self) {
        if let Some(mut incoming) = self.incoming.take() {
            info!("Tearing down incoming slide '{}'", incoming.slide.name);
            if !incoming.include_background {
                if let (Some(current), Some(mut handle)) = (self.current.as_mut(), incoming.background_player.take()) {
                    if let Some(new_bg) = &incoming.slide.background {
                        handle.detach(&new_bg.id);
                    }
                    if let Some(old_bg) = &current.slide.background {
                        handle.attach(&old_bg.id);
                        if let Some(config) = old_bg.player_config() {
                            handle.reconfigure(config);
                        }
                    }
                    current.background_player = Some(handle);
                }
            }
            self.retired.push(incoming);
        }
        self.buffer_incoming.clear();
        let state = if self.current.is_some() { SurfaceState::Displayed } else { SurfaceState::Clear };
        self.set_state(state);
        self.compose();
    }

    fn resize(&mut self, dimensions: Dimensions) {
        if dimensions.is_empty() {
            warn!("Ignoring resize to empty dimensions {}", dimensions);
            return;
        }
        if self.dimensions == dimensions {
            return;
        }
        info!("Resizing surface {} -> {}", self.dimensions, dimensions);
        self.dimensions = dimensions;
        self.ensure_buffers();
    }

    fn ensure_buffers(&mut self) {
        let dimensions = self.dimensions;
        let current = self.buffer_current.ensure_dimensions(dimensions);
        let incoming = self.buffer_incoming.ensure_dimensions(dimensions);
        let output = self.output.ensure_dimensions(dimensions);
        if current || incoming || output {
            debug!("Reallocated surface buffers to {}", dimensions);
            self.rerender_all();
        }
    }

    fn rerender_all(&mut self) {
        let wall = self.clock.wall();
        if let Some(current) = &self.current {
            render_state(&mut self.renderer, current, &mut self.buffer_current, wall);
        }
        if let Some(incoming) = &self.incoming {
            render_state(&mut self.renderer, incoming, &mut self.buffer_incoming, wall);
        }
        self.compose();
    }

    /// Builds the visible frame from the buffers.
    fn compose(&mut self) {
        let wall = self.clock.wall();
        self.output.clear();
        match &self.active {
            Some(active) => {
                if let Some(incoming) = self.incoming.as_ref().filter(|s| !s.include_background) {
                    self.renderer.draw_background(&incoming.slide, &mut self.output, incoming, wall);
                }
                let t = active.animator.eased_progress();
                trace!("Compositing '{}' at {:.3}", active.animator.transition().name(), t);
                active.animator.transition().composite(&self.buffer_current, &self.buffer_incoming, t, &mut self.output);
            }
            None => {
                if let Some(current) = &self.current {
                    if !current.include_background {
                        self.renderer.draw_background(&current.slide, &mut self.output, current, wall);
                    }
                    self.output.draw_over(&self.buffer_current, 1.0);
                }
            }
        }
    }
}

fn release_all(retired: Vec<SlideState>) {
    for state in retired {
        state.release();
    }
}

fn render_state(renderer: &mut SlideRenderer, state: &SlideState, buffer: &mut PixelBuffer, wall: DateTime<Local>) {
    renderer.render(&state.slide, buffer, state.render_options(), state, wall);
}

/// True if `incoming` shows the same background media as `current` and the
/// preference for that media kind allows keeping it.
fn background_continues(current: &Slide, incoming: &Slide, preferences: &TransitionPreferences) -> bool {
    let (Some(old_bg), Some(new_bg)) = (&current.background, &incoming.background) else {
        return false;
    };
    if !old_bg.shares_media_with(new_bg) {
        return false;
    }
    match new_bg.kind {
        ComponentKind::Video(_) => preferences.smart_video_transitions,
        ComponentKind::Image(_) => preferences.smart_image_transitions,
        _ => false,
    }
}

/// Opens and starts a playback session for `component`, or returns `None`
/// if it needs none, is not visible, or no player could be obtained.
fn open_session(
    factory: &dyn PlayerFactory,
    repaint: &RepaintSignal,
    slide: &Slide,
    component: &Component,
) -> Option<PlayerHandle> {
    let (kind, media) = (component.media_kind()?, component.media_source()?);
    if !should_play(slide, component) {
        debug!("Component '{}' is not visible; no {} session opened", component.id, kind);
        return None;
    }
    let config = component.player_config().unwrap_or_default();
    let player = match factory.create_player(kind, &media.source, config, repaint.clone()) {
        Ok(player) => player,
        Err(e) => {
            warn!("No {} player for component '{}', rendering statically: {}", kind, component.id, e);
            return None;
        }
    };
    let mut handle = PlayerHandle::new(player);
    handle.attach(&component.id);
    if let Err(e) = handle.start() {
        error!("Failed to start {} for component '{}': {}", handle.id(), component.id, e);
        return None;
    }
    Some(handle)
}
