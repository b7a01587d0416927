use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use presenter_rs::clock::SystemClock;
use presenter_rs::config::{load_config, PresentationConfig};
use presenter_rs::errors::AppError;
use presenter_rs::event::RecordingListener;
use presenter_rs::media_pipeline::synthetic_registry;
use presenter_rs::media_player::PlayerRegistry;
use presenter_rs::model::Slide;
use presenter_rs::presenter::Presenter;
use presenter_rs::surface::PresentationSurface;
use presenter_rs::transition::Direction;

const USAGE: &str = "usage: presenter_rs <config.ini> <deck.json> <output.png>";

/// Upper bound on how long one slide may take to reach its terminal notification.
const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

fn load_deck(path: &str) -> Result<Vec<Slide>, AppError> {
    info!("Loading slide deck from: {}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| {
        error!("Error reading deck file '{}': {}", path, e);
        AppError::Generic(format!("cannot read deck '{}': {}", path, e))
    })?;
    let slides: Vec<Slide> = serde_json::from_str(&contents)?;
    info!("Loaded {} slide(s)", slides.len());
    Ok(slides)
}

fn build_registry() -> Result<PlayerRegistry, AppError> {
    #[allow(unused_mut)]
    let mut registry = synthetic_registry();
    #[cfg(feature = "ffmpeg")]
    presenter_rs::ffmpeg_player::register_ffmpeg(&mut registry)?;
    Ok(registry)
}

/// Ticks the surface until `listener` has seen `terminal_count` terminal
/// notifications, then keeps ticking for `hold` so dynamic content advances.
async fn drive_until(
    surface: &PresentationSurface,
    listener: &RecordingListener,
    terminal_count: usize,
    hold: Duration,
    tick_interval: Duration,
) -> Result<(), AppError> {
    let mut interval = tokio::time::interval(tick_interval);
    let started = tokio::time::Instant::now();
    loop {
        interval.tick().await;
        surface.tick();
        if listener.wait_for_terminal(terminal_count, Duration::ZERO) {
            break;
        }
        if started.elapsed() > EVENT_TIMEOUT {
            return Err(AppError::Generic(format!(
                "timed out waiting for event {} to finish",
                terminal_count
            )));
        }
    }
    let held = tokio::time::Instant::now();
    while held.elapsed() < hold {
        interval.tick().await;
        if surface.wants_clock_ticks() || surface.needs_repaint() {
            surface.tick();
        }
    }
    Ok(())
}

async fn run(config: PresentationConfig, slides: Vec<Slide>, output: &Path) -> Result<(), AppError> {
    let registry = build_registry()?;
    let surface = PresentationSurface::from_config(&config, Arc::new(registry), Arc::new(SystemClock));
    let mut presenter = Presenter::new(surface.clone())?;
    let listener = RecordingListener::new();
    presenter.subscribe(listener.clone());

    let preferences = config.preferences();
    for (index, slide) in slides.into_iter().enumerate() {
        let id = presenter.send(Arc::new(slide), Some(config.default_animator(Direction::In)), preferences)?;
        debug!("Submitted slide {} as event {}", index, id);
        drive_until(&surface, &listener, index + 1, config.default_duration, config.tick_interval).await?;
    }

    surface.frame().save_png(output)?;
    info!("Saved final frame to {}", output.display());

    let dropped = listener.dropped();
    if !dropped.is_empty() {
        warn!("{} event(s) were dropped: {:?}", dropped.len(), dropped);
    }
    presenter.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init(); // Initialize logger
    info!("Starting presenter_rs demo...");

    let args: Vec<String> = std::env::args().collect();
    let (config_path, deck_path, output_path) = match args.as_slice() {
        [_, config, deck, output] => (config, deck, output),
        _ => {
            error!("{}", USAGE);
            return Err(AppError::Generic(USAGE.to_string()));
        }
    };

    let config = load_config(config_path)?;
    let slides = load_deck(deck_path)?;
    if slides.is_empty() {
        warn!("Deck '{}' has no slides; the output frame will be blank", deck_path);
    }
    run(config, slides, Path::new(output_path)).await
}
