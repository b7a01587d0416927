//! The caller-facing front door: `send` and `clear`.
//!
//! Each call carries a [`TransitionPreferences`] snapshot. With
//! `wait_for_transition` set, the event goes through the
//! [`RequestSerializer`] and runs after the in-flight transition completes.
//! Without it, the in-flight transition is stopped on the spot, its event is
//! reported dropped, and the new event runs synchronously on the caller's
//! thread.

use std::sync::Arc;

use log::{debug, info};

use crate::animator::TransitionAnimator;
use crate::config::TransitionPreferences;
use crate::errors::PresentationError;
use crate::event::{EventAction, EventId, PresentationEvent, PresentationListener};
use crate::model::Slide;
use crate::serializer::RequestSerializer;
use crate::surface::PresentationSurface;

pub struct Presenter {
    surface: PresentationSurface,
    serializer: RequestSerializer,
}

impl Presenter {
    /// # Errors
    /// `PresentationError::WorkerSpawn` if the serializer thread cannot start.
    #[must_use = "starting the presenter can fail; the Result must be handled"]
    pub fn new(surface: PresentationSurface) -> Result<Self, PresentationError> {
        let serializer = RequestSerializer::start(surface.clone())?;
        Ok(Self { surface, serializer })
    }

    pub fn surface(&self) -> &PresentationSurface {
        &self.surface
    }

    pub fn subscribe(&self, listener: Arc<dyn PresentationListener>) {
        self.surface.subscribe(listener);
    }

    /// Shows `slide`. No animator means an instantaneous cut.
    ///
    /// Returns the id of the created event so callers can match notifications.
    #[must_use = "sending can fail; the Result must be handled"]
    pub fn send(
        &self,
        slide: Arc<Slide>,
        animator: Option<TransitionAnimator>,
        preferences: TransitionPreferences,
    ) -> Result<EventId, PresentationError> {
        self.submit(PresentationEvent::send(slide, animator, preferences))
    }

    /// Transitions the current slide away to an empty screen.
    #[must_use = "clearing can fail; the Result must be handled"]
    pub fn clear(
        &self,
        animator: Option<TransitionAnimator>,
        preferences: TransitionPreferences,
    ) -> Result<EventId, PresentationError> {
        self.submit(PresentationEvent::clear(animator, preferences))
    }

    fn submit(&self, event: PresentationEvent) -> Result<EventId, PresentationError> {
        let id = event.id();
        if event.preferences().wait_for_transition {
            debug!("Queueing {} behind any in-flight transition", event.notice());
            self.serializer.queue(event)?;
        } else {
            self.execute_immediately(event)?;
        }
        Ok(id)
    }

    fn execute_immediately(&self, event: PresentationEvent) -> Result<(), PresentationError> {
        if let EventAction::Send { slide, .. } = event.action() {
            slide.validate()?;
        }
        if event.is_clear() && self.surface.is_clear_in_flight() {
            info!("Already clearing, dropping {}", event.notice());
            self.surface.report_dropped(event.notice());
            return Ok(());
        }
        if let Some(parked) = self.serializer.take_pending() {
            info!("{} superseded by immediate {}", parked.notice(), event.notice());
            self.surface.report_dropped(parked.notice());
        }
        self.surface.supersede(event.is_clear());
        self.surface.execute(event)
    }

    /// Stops the serializer; a parked event is reported dropped.
    pub fn shutdown(&mut self) {
        self.serializer.shutdown();
    }
}
