mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fade, shape, still, video, video_with_poster, Harness, SIZE};
use presenter_rs::config::TransitionPreferences;
use presenter_rs::event::PresentationEvent;
use presenter_rs::model::{Color, Component, ComponentKind, MediaRef, MediaSource, Rect, Slide};
use presenter_rs::surface::SurfaceState;
use presenter_rs::transition::Direction;

const LOOP: &str = "synthetic:loop";

fn with_video_background(name: &str, bg_id: &str, source: &str, fg: Color) -> Arc<Slide> {
    Arc::new(
        Slide::new(name, SIZE)
            .with_background(video(bg_id, source, true))
            .with_component(shape("fg", Rect::new(0, 0, 2, 2), fg)),
    )
}

fn send(h: &Harness, slide: Arc<Slide>, ms: u64, prefs: TransitionPreferences) {
    let animator = if ms == 0 { None } else { fade(Direction::In, ms) };
    h.surface.execute(PresentationEvent::send(slide, animator, prefs)).expect("valid slide");
}

#[test]
fn shared_video_background_keeps_its_session() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();

    send(&h, with_video_background("one", "bg-1", LOOP, Color::WHITE), 0, prefs);
    assert_eq!(h.factory.created(), 1);
    let (session, first_position) = h.surface.background_session().expect("background playing");

    h.clock.advance(Duration::from_millis(500));
    h.surface.tick();
    send(&h, with_video_background("two", "bg-2", LOOP, Color::BLACK), 300, prefs);

    let (during, mid_position) = h.surface.background_session().expect("background playing");
    assert_eq!(during, session);
    assert!(mid_position >= first_position);
    assert_eq!(h.factory.created(), 1, "no new background session");
    assert_eq!(h.factory.stops_of(LOOP), 0);

    h.clock.advance(Duration::from_millis(300));
    assert_eq!(h.surface.tick(), SurfaceState::Displayed);
    let (after, final_position) = h.surface.background_session().expect("background playing");
    assert_eq!(after, session);
    assert!(final_position >= mid_position);
    assert_eq!(h.factory.stops_of(LOOP), 0, "continuing background was released");
    assert_eq!(h.surface.live_sessions(), 1);

    h.surface.execute(PresentationEvent::clear(None, prefs)).expect("clear accepted");
    assert_eq!(h.factory.stops_of(LOOP), 1);
    assert_eq!(h.surface.live_sessions(), 0);
}

#[test]
fn continuing_background_is_drawn_under_both_slides() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    send(&h, with_video_background("one", "bg-1", LOOP, Color::WHITE), 0, prefs);
    // poster color fills the frame where the foreground does not
    assert_eq!(h.surface.frame().pixel(5, 5), [0, 0, 128, 255]);

    send(&h, with_video_background("two", "bg-2", LOOP, Color::BLACK), 300, prefs);
    h.clock.advance(Duration::from_millis(150));
    h.surface.tick();
    assert_eq!(h.surface.frame().pixel(5, 5), [0, 0, 128, 255]);
    assert_eq!(h.surface.current_buffer().pixel(5, 5)[3], 0, "current buffer rendered without background");

    h.clock.advance(Duration::from_millis(150));
    h.surface.tick();
    assert_eq!(h.surface.frame().pixel(5, 5), [0, 0, 128, 255]);
    assert_eq!(h.surface.frame().pixel(0, 0), [0, 0, 0, 255]);
}

#[test]
fn smart_transitions_off_restarts_the_background() {
    let h = Harness::new();
    let prefs = TransitionPreferences { smart_video_transitions: false, ..TransitionPreferences::default() };

    send(&h, with_video_background("one", "bg-1", LOOP, Color::WHITE), 0, prefs);
    let (first, _) = h.surface.background_session().expect("background playing");
    send(&h, with_video_background("two", "bg-2", LOOP, Color::BLACK), 300, prefs);
    assert_eq!(h.factory.created(), 2);
    let (second, _) = h.surface.background_session().expect("background playing");
    assert_ne!(first, second);

    h.clock.advance(Duration::from_millis(300));
    h.surface.tick();
    assert_eq!(h.factory.stops_of(LOOP), 1, "old background released on promotion");
}

#[test]
fn different_background_media_is_not_shared() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    send(&h, with_video_background("one", "bg", "synthetic:a", Color::WHITE), 0, prefs);
    send(&h, with_video_background("two", "bg", "synthetic:b", Color::BLACK), 0, prefs);
    assert_eq!(h.factory.created(), 2);
    assert_eq!(h.factory.stops_of("synthetic:a"), 1);
    assert_eq!(h.factory.stops_of("synthetic:b"), 0);
}

#[test]
fn continuing_background_takes_the_new_playback_settings() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    send(&h, with_video_background("one", "bg-1", LOOP, Color::WHITE), 0, prefs);
    let mut second = Slide::new("two", SIZE).with_background(video("bg-2", LOOP, false));
    second.components.push(shape("fg", Rect::new(0, 0, 2, 2), Color::BLACK));
    send(&h, Arc::new(second), 0, prefs);

    let reconfigured = h.factory.reconfigured();
    let (source, config) = reconfigured.last().expect("background reconfigured");
    assert_eq!(source, LOOP);
    assert!(!config.looped);
}

#[test]
fn clear_superseding_a_continuing_send_hands_the_background_back() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    send(&h, with_video_background("one", "bg-1", LOOP, Color::WHITE), 0, prefs);
    let (session, _) = h.surface.background_session().expect("background playing");
    send(&h, with_video_background("two", "bg-2", LOOP, Color::BLACK), 10_000, prefs);

    assert!(h.surface.supersede(true));
    assert_eq!(h.surface.state(), SurfaceState::Displayed);
    assert_eq!(h.surface.background_session().map(|(id, _)| id), Some(session));
    assert_eq!(h.factory.stops_of(LOOP), 0);
    // the remaining slide still shows its background
    assert_eq!(h.surface.frame().pixel(0, 0), [255, 255, 255, 255]);
    assert_eq!(h.surface.frame().pixel(5, 5), [0, 0, 128, 255]);
}

#[test]
fn promotion_runs_once_even_when_stopped_twice() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    let first = Arc::new(Slide::new("one", SIZE).with_component(video("clip", "synthetic:one", false)));
    send(&h, first, 10_000, prefs);
    assert!(h.surface.stop_transition());
    assert!(!h.surface.stop_transition());
    h.surface.tick();
    assert_eq!(h.surface.state(), SurfaceState::Displayed);

    let second = Arc::new(Slide::new("two", SIZE).with_component(video("clip", "synthetic:two", false)));
    send(&h, second, 0, prefs);
    assert_eq!(h.factory.stops_of("synthetic:one"), 1);
    h.surface.execute(PresentationEvent::clear(None, prefs)).expect("clear accepted");
    assert_eq!(h.factory.stops_of("synthetic:one"), 1);
    assert_eq!(h.factory.stops_of("synthetic:two"), 1);
    assert_eq!(h.factory.total_stops(), 2);
}

#[test]
fn missing_player_falls_back_to_poster_and_completes() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    let slide = Arc::new(Slide::new("poster", SIZE).with_component(video("clip", "missing:clip", true)));
    send(&h, slide, 0, prefs);
    assert_eq!(h.surface.state(), SurfaceState::Displayed);
    assert_eq!(h.surface.live_sessions(), 0);
    assert_eq!(h.surface.frame().pixel(3, 3), [0, 0, 128, 255]);
    assert_eq!(h.recorder.completed().len(), 1);
}

#[test]
fn invisible_video_gets_no_session_but_audio_always_plays() {
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    let mut hidden = video("hidden", "synthetic:hidden", true);
    hidden.bounds = Rect::new(100, 100, 4, 4);
    let audio = Component::new(
        "music",
        Rect::new(0, 0, 0, 0),
        ComponentKind::Audio(MediaSource {
            source: MediaRef::new("synthetic:music"),
            looped: true,
            muted: false,
            poster: None,
        }),
    );
    let slide = Arc::new(Slide::new("mixed", SIZE).with_component(hidden).with_component(audio));
    send(&h, slide, 0, prefs);
    assert_eq!(h.factory.created(), 1);
    assert_eq!(h.surface.live_sessions(), 1);
}

fn write_still(dir: &tempfile::TempDir, name: &str, rgba: [u8; 4]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    image::RgbaImage::from_pixel(SIZE.width, SIZE.height, image::Rgba(rgba)).save(&path).expect("write png");
    path
}

fn with_image_background(name: &str, bg_id: &str, path: &std::path::Path, fg: Color) -> Arc<Slide> {
    Arc::new(
        Slide::new(name, SIZE)
            .with_background(still(bg_id, path))
            .with_component(shape("fg", Rect::new(0, 0, 2, 2), fg)),
    )
}

#[test]
fn shared_image_background_stays_steady_through_the_fade() {
    let dir = tempfile::tempdir().expect("temp dir");
    let backdrop = write_still(&dir, "backdrop.png", [200, 0, 0, 255]);
    let h = Harness::new();
    let prefs = TransitionPreferences::default();

    send(&h, with_image_background("one", "bg-1", &backdrop, Color::WHITE), 0, prefs);
    assert_eq!(h.surface.frame().pixel(5, 5), [200, 0, 0, 255]);
    send(&h, with_image_background("two", "bg-2", &backdrop, Color::BLACK), 300, prefs);
    assert_eq!(h.surface.current_buffer().pixel(5, 5)[3], 0, "current buffer rendered without background");

    h.clock.advance(Duration::from_millis(150));
    h.surface.tick();
    let frame = h.surface.frame();
    assert_eq!(frame.pixel(5, 5), [200, 0, 0, 255]);
    assert_eq!(frame.pixel(0, 0), [128, 128, 128, 255]);
    assert_eq!(h.surface.current_buffer().pixel(5, 5)[3], 0);

    h.clock.advance(Duration::from_millis(150));
    assert_eq!(h.surface.tick(), SurfaceState::Displayed);
    assert_eq!(h.surface.frame().pixel(5, 5), [200, 0, 0, 255]);
    assert_eq!(h.surface.frame().pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(h.factory.created(), 0, "still images need no playback session");
}

#[test]
fn shared_image_background_fades_with_its_slide_when_smart_transitions_are_off() {
    let dir = tempfile::tempdir().expect("temp dir");
    let backdrop = write_still(&dir, "backdrop.png", [200, 0, 0, 255]);
    let h = Harness::new();
    let prefs = TransitionPreferences { smart_image_transitions: false, ..TransitionPreferences::default() };

    send(&h, with_image_background("one", "bg-1", &backdrop, Color::WHITE), 0, prefs);
    send(&h, with_image_background("two", "bg-2", &backdrop, Color::BLACK), 300, prefs);
    assert_eq!(h.surface.current_buffer().pixel(5, 5), [200, 0, 0, 255], "background stays in the current buffer");

    h.clock.advance(Duration::from_millis(150));
    h.surface.tick();
    assert_eq!(h.surface.current_buffer().pixel(5, 5), [200, 0, 0, 255]);
    // both buffers carry the same opaque backdrop, so the blend is exact
    assert_eq!(h.surface.frame().pixel(5, 5), [200, 0, 0, 255]);
    assert_eq!(h.surface.frame().pixel(0, 0), [128, 128, 128, 255]);

    h.clock.advance(Duration::from_millis(150));
    assert_eq!(h.surface.tick(), SurfaceState::Displayed);
    assert_eq!(h.surface.current_buffer().pixel(5, 5), [200, 0, 0, 255]);
}

#[test]
fn plain_send_after_a_continuing_one_restores_the_current_background() {
    const S: &str = "synthetic:s";
    const T: &str = "synthetic:t";
    let green = Color::rgb(0, 200, 0);
    let blue = Color::rgb(0, 0, 200);
    let h = Harness::new();
    let prefs = TransitionPreferences::default();
    let slide = |name: &str, source: &str, poster: Color, fg: Color| {
        Arc::new(
            Slide::new(name, SIZE)
                .with_background(video_with_poster(&format!("{}-bg", name), source, true, poster))
                .with_component(shape("fg", Rect::new(0, 0, 2, 2), fg)),
        )
    };

    send(&h, slide("a", S, green, Color::WHITE), 0, prefs);
    send(&h, slide("b", S, green, Color::BLACK), 0, prefs);
    assert_eq!(h.factory.created(), 1);
    assert_eq!(h.surface.current_buffer().pixel(5, 5)[3], 0, "b is drawn over its continuing background");

    send(&h, slide("c", T, blue, Color::WHITE), 300, prefs);
    assert_eq!(h.surface.frame().pixel(5, 5), [0, 200, 0, 255]);
    assert_eq!(h.surface.current_buffer().pixel(5, 5), [0, 200, 0, 255]);

    h.clock.advance(Duration::from_millis(150));
    h.surface.tick();
    assert_eq!(h.surface.frame().pixel(5, 5), [0, 100, 100, 255]);
    assert_eq!(h.factory.stops_of(S), 0, "b still owns its background mid-transition");

    h.clock.advance(Duration::from_millis(150));
    assert_eq!(h.surface.tick(), SurfaceState::Displayed);
    assert_eq!(h.surface.frame().pixel(5, 5), [0, 0, 200, 255]);
    assert_eq!(h.factory.stops_of(S), 1);
    assert_eq!(h.factory.stops_of(T), 0);
    assert_eq!(h.surface.live_sessions(), 1);
}
