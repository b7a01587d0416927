//! Presentation transition engine.
//!
//! A [`Presenter`] accepts `send(slide)` and `clear()` requests and drives a
//! [`PresentationSurface`] through animated transitions between slides:
//! double-buffered off-screen rendering, pluggable [`Transition`]
//! compositing, media sessions that survive a transition when both slides
//! share a background, and exactly one completion or drop notification per
//! accepted request.

pub mod animator;
pub mod clock;
pub mod config;
pub mod errors;
pub mod event;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_player;
pub mod media_cache;
pub mod media_pipeline;
pub mod media_player;
pub mod model;
pub mod pixel_buffer;
pub mod presenter;
pub mod renderer;
pub mod serializer;
pub mod surface;
pub mod text_renderer;
pub mod transition;

pub use animator::TransitionAnimator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PresentationConfig, TransitionPreferences};
pub use errors::{AppError, ConfigError, MediaError, PresentationError};
pub use event::{EventId, EventKind, EventNotice, Notification, PresentationEvent, PresentationListener, RecordingListener};
pub use model::{Component, ComponentKind, Dimensions, MediaKind, MediaRef, Rect, Slide};
pub use presenter::Presenter;
pub use surface::{PresentationSurface, SurfaceState};
pub use transition::{Direction, Transition, TransitionKind};
