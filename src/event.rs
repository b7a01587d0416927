//! Presentation events and the notifications the engine emits about them.
//!
//! A [`PresentationEvent`] is created by a caller, consumed exactly once by
//! the surface, and produces exactly one terminal notification: either
//! `transition_complete` or `event_dropped`. Accepted events additionally get
//! one `transition_begin` before their terminal notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::animator::TransitionAnimator;
use crate::config::TransitionPreferences;
use crate::model::Slide;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    fn next() -> Self {
        EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an event asks the surface to do.
#[derive(Debug)]
pub enum EventAction {
    /// Show `slide`. No animator means an instantaneous cut.
    Send { slide: Arc<Slide>, animator: Option<TransitionAnimator> },
    /// Transition the current slide away to an empty screen.
    Clear { animator: Option<TransitionAnimator> },
}

#[derive(Debug)]
pub struct PresentationEvent {
    id: EventId,
    action: EventAction,
    preferences: TransitionPreferences,
}

impl PresentationEvent {
    pub fn send(slide: Arc<Slide>, animator: Option<TransitionAnimator>, preferences: TransitionPreferences) -> Self {
        Self { id: EventId::next(), action: EventAction::Send { slide, animator }, preferences }
    }

    pub fn clear(animator: Option<TransitionAnimator>, preferences: TransitionPreferences) -> Self {
        Self { id: EventId::next(), action: EventAction::Clear { animator }, preferences }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn action(&self) -> &EventAction {
        &self.action
    }

    pub fn is_clear(&self) -> bool {
        matches!(self.action, EventAction::Clear { .. })
    }

    pub fn preferences(&self) -> TransitionPreferences {
        self.preferences
    }

    /// A cheap, cloneable summary for listeners.
    pub fn notice(&self) -> EventNotice {
        let kind = match &self.action {
            EventAction::Send { slide, .. } => EventKind::Send { slide: slide.name.clone() },
            EventAction::Clear { .. } => EventKind::Clear,
        };
        EventNotice { id: self.id, kind }
    }

    pub(crate) fn into_parts(self) -> (EventNotice, EventAction, TransitionPreferences) {
        let notice = self.notice();
        (notice, self.action, self.preferences)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Send { slide: String },
    Clear,
}

/// The payload handed to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventNotice {
    pub id: EventId,
    pub kind: EventKind,
}

impl fmt::Display for EventNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Send { slide } => write!(f, "send {} ('{}')", self.id, slide),
            EventKind::Clear => write!(f, "clear {}", self.id),
        }
    }
}

/// Subscriber for transition lifecycle notifications.
///
/// Callbacks run on whichever thread completed the work (the render thread
/// for animated transitions, the caller or serializer worker for cuts and
/// drops) and never while the surface's state lock is held.
pub trait PresentationListener: Send + Sync {
    fn transition_begin(&self, _event: &EventNotice) {}
    fn transition_complete(&self, _event: &EventNotice) {}
    fn event_dropped(&self, _event: &EventNotice) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Begin(EventNotice),
    Complete(EventNotice),
    Dropped(EventNotice),
}

impl Notification {
    pub fn event_id(&self) -> EventId {
        match self {
            Notification::Begin(n) | Notification::Complete(n) | Notification::Dropped(n) => n.id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Begin(_))
    }
}

/// Owned collection of subscribers, held by the publisher.
#[derive(Default)]
pub(crate) struct Listeners {
    subscribers: Mutex<Vec<Arc<dyn PresentationListener>>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, listener: Arc<dyn PresentationListener>) {
        self.subscribers.lock().push(listener);
    }

    pub(crate) fn publish(&self, notification: &Notification) {
        // snapshot so a listener may subscribe from inside a callback
        let subscribers: Vec<_> = self.subscribers.lock().clone();
        for listener in subscribers {
            match notification {
                Notification::Begin(n) => listener.transition_begin(n),
                Notification::Complete(n) => listener.transition_complete(n),
                Notification::Dropped(n) => listener.event_dropped(n),
            }
        }
    }
}

/// A listener that records every notification in order. Useful for status
/// displays and for asserting ordering in tests.
#[derive(Default)]
pub struct RecordingListener {
    log: Mutex<Vec<Notification>>,
    changed: Condvar,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    pub fn completed(&self) -> Vec<EventId> {
        self.filter(|n| matches!(n, Notification::Complete(_)))
    }

    pub fn dropped(&self) -> Vec<EventId> {
        self.filter(|n| matches!(n, Notification::Dropped(_)))
    }

    pub fn begun(&self) -> Vec<EventId> {
        self.filter(|n| matches!(n, Notification::Begin(_)))
    }

    /// Blocks until at least `count` terminal notifications have been
    /// recorded, or `timeout` passes. Returns true if the count was reached.
    pub fn wait_for_terminal(&self, count: usize, timeout: Duration) -> bool {
        let mut log = self.log.lock();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if log.iter().filter(|n| n.is_terminal()).count() >= count {
                return true;
            }
            if self.changed.wait_until(&mut log, deadline).timed_out() {
                return log.iter().filter(|n| n.is_terminal()).count() >= count;
            }
        }
    }

    fn filter(&self, keep: impl Fn(&Notification) -> bool) -> Vec<EventId> {
        self.log.lock().iter().filter(|n| keep(n)).map(Notification::event_id).collect()
    }

    fn record(&self, notification: Notification) {
        self.log.lock().push(notification);
        self.changed.notify_all();
    }
}

impl PresentationListener for RecordingListener {
    fn transition_begin(&self, event: &EventNotice) {
        self.record(Notification::Begin(event.clone()));
    }

    fn transition_complete(&self, event: &EventNotice) {
        self.record(Notification::Complete(event.clone()));
    }

    fn event_dropped(&self, event: &EventNotice) {
        self.record(Notification::Dropped(event.clone()));
    }
}
