//! Presenter lifecycle through the whole engine: auto-dismiss timing,
//! replacement, activation and dismissal.

use std::time::Duration;

use rideping::{Route, ThreadKind};
use tokio::time::Instant;

use crate::fixtures::{Harness, ME};

async fn harness_with_two_rides() -> Harness {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.ride("R2", Some("Downtown"), &[ME, "u2"]);
    h.set_view("/rides");
    h.wait_watching(2).await;
    h.wait_tails(2).await;
    h
}

#[tokio::test(start_paused = true)]
async fn test_auto_dismiss_after_display_duration() {
    let mut h = harness_with_two_rides().await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    let shown = h.wait_visible().await;
    let shown_at = Instant::now();
    assert_eq!(
        shown.remaining(shown_at),
        Some(Duration::from_millis(1500))
    );

    h.wait_hidden().await;
    let visible_for = shown_at.elapsed();
    assert!(visible_for >= Duration::from_millis(1500), "{:?}", visible_for);
    assert!(visible_for < Duration::from_millis(1600), "{:?}", visible_for);
}

#[tokio::test(start_paused = true)]
async fn test_remaining_time_counts_down() {
    let mut h = harness_with_two_rides().await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    h.wait_visible().await;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let view = h.engine.view();
    assert_eq!(
        view.remaining(Instant::now()),
        Some(Duration::from_millis(1000))
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_event_replaces_and_restarts_timer() {
    let mut h = harness_with_two_rides().await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    let first = h.wait_visible().await;
    let first_at = Instant::now();

    tokio::time::sleep(Duration::from_millis(1000)).await;
    h.post(ThreadKind::Ride, "R2", "m2", "u2", "parking now");
    let second = h
        .wait_for("R2 notification", |v| {
            v.notification
                .as_ref()
                .is_some_and(|n| n.thread_id.as_str() == "R2")
        })
        .await;
    assert!(second.generation > first.generation);

    // Past the first notification's deadline, the second is still showing.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let view = h.engine.view();
    assert_eq!(view.notification.unwrap().title, "Downtown");

    h.wait_hidden().await;
    assert!(first_at.elapsed() >= Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn test_activate_ride_navigates_to_ride_page() {
    let mut h = harness_with_two_rides().await;
    let navigation = h.engine.navigation();

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    let view = h.wait_visible().await;
    h.engine.activate(view.generation).unwrap();

    h.wait_hidden().await;
    assert_eq!(navigation.try_recv().unwrap(), Route::Ride("R1".into()));
    assert!(navigation.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_activate_direct_navigates_to_direct_messages() {
    let mut h = Harness::start();
    h.direct("D1", &[ME, "u3"]);
    h.user("u3", Some("jane"), None);
    h.wait_watching(1).await;
    let navigation = h.engine.navigation();

    h.post(ThreadKind::Direct, "D1", "m1", "u3", "hey");
    let view = h.wait_visible().await;
    h.engine.activate(view.generation).unwrap();

    h.wait_hidden().await;
    assert_eq!(
        navigation.try_recv().unwrap().path(),
        "/messages?category=direct"
    );
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_hides_without_navigation() {
    let mut h = harness_with_two_rides().await;
    let navigation = h.engine.navigation();

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    let view = h.wait_visible().await;
    h.engine.dismiss(view.generation).unwrap();

    h.wait_hidden().await;
    assert!(navigation.try_recv().is_err());

    // Activating the dismissed instance does nothing.
    h.engine.activate(view.generation).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(navigation.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_requests_for_replaced_notification_are_ignored() {
    let mut h = harness_with_two_rides().await;
    let navigation = h.engine.navigation();

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    let first = h.wait_visible().await;
    h.post(ThreadKind::Ride, "R2", "m2", "u2", "parking now");
    h.wait_for("replacement", |v| v.generation > first.generation)
        .await;

    h.engine.dismiss(first.generation).unwrap();
    h.engine.activate(first.generation).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let view = h.engine.view();
    assert_eq!(view.notification.unwrap().title, "Downtown");
    assert!(navigation.try_recv().is_err());
}

/// Dismissing cancels the timer, so it cannot cut a later notification short.
#[tokio::test(start_paused = true)]
async fn test_dismissed_timer_does_not_hide_next_notification() {
    let mut h = harness_with_two_rides().await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    let first = h.wait_visible().await;
    h.engine.dismiss(first.generation).unwrap();
    h.wait_hidden().await;

    tokio::time::sleep(Duration::from_millis(1000)).await;
    h.post(ThreadKind::Ride, "R2", "m2", "u2", "parking now");
    h.wait_visible().await;
    let second_at = Instant::now();

    // The first timer would have fired 500ms from now.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(h.engine.view().is_visible());

    h.wait_hidden().await;
    assert!(second_at.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_never_more_than_one_visible() {
    let mut h = harness_with_two_rides().await;

    for i in 0..5 {
        h.post(
            ThreadKind::Ride,
            "R1",
            &format!("m{}", i),
            "u2",
            &format!("update {}", i),
        );
    }

    let view = h
        .wait_for("five surfaced", |v| v.stats.surfaced == 5)
        .await;
    assert_eq!(view.notification.unwrap().body_preview, "update 4");
    h.wait_hidden().await;
}
