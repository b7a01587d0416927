//! Single-slot request serializer for the "wait for transition" policy.
//!
//! Requests that arrive while a transition is in flight are parked in one
//! pending slot; a newer request supersedes the parked one, which is reported
//! dropped. A worker thread hands the parked request to the surface only once
//! the surface's transition gate is open, i.e. after the previous event's
//! completion notification has been delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::errors::PresentationError;
use crate::event::{EventAction, EventNotice, PresentationEvent};
use crate::surface::PresentationSurface;

struct SerializerShared {
    pending: Mutex<Option<PresentationEvent>>,
    event_available: Condvar,
    stopped: AtomicBool,
}

impl SerializerShared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

pub struct RequestSerializer {
    shared: Arc<SerializerShared>,
    surface: PresentationSurface,
    worker: Option<JoinHandle<()>>,
}

impl RequestSerializer {
    /// Spawns the worker thread for `surface`.
    ///
    /// # Errors
    /// `PresentationError::WorkerSpawn` if the thread cannot be created.
    #[must_use = "starting the serializer can fail; the Result must be handled"]
    pub fn start(surface: PresentationSurface) -> Result<Self, PresentationError> {
        let shared = Arc::new(SerializerShared {
            pending: Mutex::new(None),
            event_available: Condvar::new(),
            stopped: AtomicBool::new(false),
        });
        let worker_shared = shared.clone();
        let worker_surface = surface.clone();
        let worker = thread::Builder::new()
            .name("presentation-serializer".into())
            .spawn(move || run_worker(&worker_shared, &worker_surface))
            .map_err(|e| {
                error!("Failed to spawn request serializer thread: {}", e);
                PresentationError::WorkerSpawn(e.to_string())
            })?;
        debug!("Request serializer started");
        Ok(Self { shared, surface, worker: Some(worker) })
    }

    /// Parks `event` for dispatch once the surface is idle.
    ///
    /// A previously parked event is superseded and reported dropped. A clear
    /// arriving while the surface is already transitioning out is dropped
    /// immediately.
    ///
    /// # Errors
    /// `PresentationError::InvalidSlide` if a sent slide has empty geometry
    /// (nothing is notified), or `PresentationError::ShutDown` after
    /// [`shutdown`](Self::shutdown) (the event is reported dropped).
    #[must_use = "queueing can fail; the Result must be handled"]
    pub fn queue(&self, event: PresentationEvent) -> Result<(), PresentationError> {
        if let EventAction::Send { slide, .. } = event.action() {
            slide.validate()?;
        }
        if self.shared.is_stopped() {
            warn!("Serializer is shut down, dropping {}", event.notice());
            self.surface.report_dropped(event.notice());
            return Err(PresentationError::ShutDown);
        }

        let notice = event.notice();
        let already_clearing = event.is_clear() && self.surface.is_clear_in_flight();
        let superseded = {
            let mut pending = self.shared.pending.lock();
            let superseded = pending.take();
            if !already_clearing {
                *pending = Some(event);
                self.shared.event_available.notify_one();
            }
            superseded
        };
        if let Some(old) = superseded {
            info!("{} superseded by {}", old.notice(), notice);
            self.surface.report_dropped(old.notice());
        }
        if already_clearing {
            info!("Already clearing, dropping {}", notice);
            self.surface.report_dropped(notice);
        } else {
            debug!("Parked {}", notice);
        }
        Ok(())
    }

    /// Summary of the parked event, if any.
    pub fn pending(&self) -> Option<EventNotice> {
        self.shared.pending.lock().as_ref().map(PresentationEvent::notice)
    }

    /// Removes and returns the parked event without dispatching it.
    pub fn take_pending(&self) -> Option<PresentationEvent> {
        self.shared.pending.lock().take()
    }

    pub fn is_running(&self) -> bool {
        !self.shared.is_stopped()
    }

    /// Stops the worker and reports any parked event dropped. An event the
    /// worker already took is dispatched fully before the worker exits.
    pub fn shutdown(&mut self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) && self.worker.is_none() {
            return;
        }
        info!("Shutting down request serializer");
        {
            let _pending = self.shared.pending.lock();
            self.shared.event_available.notify_all();
        }
        self.surface.interrupt_wait();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.join() {
                error!("Request serializer thread panicked: {:?}", e);
            }
        }
        if let Some(event) = self.take_pending() {
            info!("Dropping {} left pending at shutdown", event.notice());
            self.surface.report_dropped(event.notice());
        }
    }
}

impl Drop for RequestSerializer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &SerializerShared, surface: &PresentationSurface) {
    debug!("Request serializer worker running");
    loop {
        {
            let mut pending = shared.pending.lock();
            while pending.is_none() && !shared.is_stopped() {
                shared.event_available.wait(&mut pending);
            }
        }
        if shared.is_stopped() {
            break;
        }
        if !surface.wait_until_idle(&|| shared.is_stopped()) {
            break;
        }
        // the slot may have been superseded while the transition ran
        let Some(event) = shared.pending.lock().take() else { continue };
        debug!("Dispatching {}", event.notice());
        if let Err(e) = surface.execute(event) {
            warn!("Serializer could not dispatch event: {}", e);
        }
    }
    debug!("Request serializer worker finished");
}
