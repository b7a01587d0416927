mod common;

use std::time::Duration;

use common::{fade, solid, Harness};
use presenter_rs::config::TransitionPreferences;
use presenter_rs::errors::PresentationError;
use presenter_rs::event::PresentationEvent;
use presenter_rs::model::Color;
use presenter_rs::presenter::Presenter;
use presenter_rs::serializer::RequestSerializer;
use presenter_rs::transition::Direction;

fn prefs() -> TransitionPreferences {
    TransitionPreferences::default()
}

#[test]
fn parked_event_waits_for_the_in_flight_transition() {
    let h = Harness::new();
    let serializer = RequestSerializer::start(h.surface.clone()).expect("worker starts");
    h.surface
        .execute(PresentationEvent::send(solid("a", Color::WHITE), fade(Direction::In, 300), prefs()))
        .expect("valid");

    let next = PresentationEvent::send(solid("b", Color::BLACK), None, prefs());
    let next_id = next.id();
    serializer.queue(next).expect("queued");
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(serializer.pending().map(|n| n.id), Some(next_id), "dispatched while a transition was running");
    assert_eq!(h.recorder.begun().len(), 1);

    assert!(h.drive_until_terminal(2));
    assert!(h.recorder.completed().contains(&next_id));
    assert!(serializer.pending().is_none());
}

#[test]
fn newest_queued_event_wins() {
    let h = Harness::new();
    let serializer = RequestSerializer::start(h.surface.clone()).expect("worker starts");
    h.surface
        .execute(PresentationEvent::send(solid("a", Color::WHITE), fade(Direction::In, 300), prefs()))
        .expect("valid");

    let mut ids = Vec::new();
    for name in ["b", "c", "d"] {
        let event = PresentationEvent::send(solid(name, Color::BLACK), None, prefs());
        ids.push(event.id());
        serializer.queue(event).expect("queued");
    }
    assert_eq!(h.recorder.dropped(), ids[..2].to_vec());
    assert_eq!(serializer.pending().map(|n| n.id), Some(ids[2]));

    assert!(h.drive_until_terminal(4));
    assert_eq!(h.surface.current_slide().map(|s| s.name.clone()), Some("d".to_string()));
}

#[test]
fn shutdown_drops_the_parked_event_and_rejects_new_ones() {
    let h = Harness::new();
    let mut presenter = Presenter::new(h.surface.clone()).expect("serializer starts");
    h.surface
        .execute(PresentationEvent::send(solid("a", Color::WHITE), fade(Direction::In, 10_000), prefs()))
        .expect("valid");

    let parked = presenter.send(solid("b", Color::BLACK), None, prefs()).expect("queued");
    presenter.shutdown();
    assert_eq!(h.recorder.dropped(), vec![parked]);

    let late = presenter.send(solid("c", Color::BLACK), None, prefs());
    assert_eq!(late, Err(PresentationError::ShutDown));
    assert_eq!(h.recorder.dropped().len(), 2);

    // shutting down twice is harmless
    presenter.shutdown();
    assert_eq!(h.recorder.dropped().len(), 2);
}

#[test]
fn dropping_the_serializer_stops_its_worker() {
    let h = Harness::new();
    h.surface
        .execute(PresentationEvent::send(solid("a", Color::WHITE), fade(Direction::In, 10_000), prefs()))
        .expect("valid");
    {
        let serializer = RequestSerializer::start(h.surface.clone()).expect("worker starts");
        serializer.queue(PresentationEvent::clear(None, prefs())).expect("queued");
        assert!(serializer.is_running());
    }
    assert_eq!(h.recorder.dropped().len(), 1);
    assert_eq!(h.recorder.completed().len(), 0);
}
