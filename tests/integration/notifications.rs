//! End-to-end surfacing and suppression.
//!
//! Each test seeds threads, lets the watchers attach, posts messages and
//! checks what the presenter ended up showing.

use std::time::Duration;

use rideping::store::{MessageDoc, ThreadDoc};
use rideping::{Config, MemoryStore, ThreadKind};

use crate::fixtures::{Harness, ME};

/// Ride R1 to "Airport"; u2 writes while u1 browses the rides list.
#[tokio::test(start_paused = true)]
async fn test_ride_message_surfaces_with_destination_title() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.set_view("/rides");
    h.wait_watching(1).await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");

    let view = h.wait_visible().await;
    let shown = view.notification.expect("notification");
    assert_eq!(shown.title, "Airport");
    assert_eq!(shown.body_preview, "leaving now");
    assert_eq!(shown.sender_name, "Sam");
    assert_eq!(shown.route.path(), "/ride/R1");
}

#[tokio::test(start_paused = true)]
async fn test_ride_without_destination_uses_fallback_title() {
    let mut h = Harness::start();
    h.ride("R1", None, &[ME, "u2"]);
    h.wait_watching(1).await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "hi");

    let view = h.wait_visible().await;
    assert_eq!(view.notification.unwrap().title, "Ride Chat");
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_push_shows_once() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.wait_watching(1).await;
    h.wait_tails(1).await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "leaving now");
    h.wait_visible().await;
    h.store.redeliver_tail(ThreadKind::Ride, &"R1".into());

    let view = h.wait_observed(2).await;
    assert_eq!(view.stats.surfaced, 1);
    assert_eq!(view.stats.discarded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_message_older_than_window_is_not_shown() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.wait_watching(1).await;

    h.post_aged(
        ThreadKind::Ride,
        "R1",
        "m1",
        "u2",
        "old news",
        chrono::Duration::seconds(15),
    );

    let view = h.wait_observed(1).await;
    assert!(!view.is_visible());
    assert_eq!(view.stats.surfaced, 0);
}

#[tokio::test(start_paused = true)]
async fn test_backlog_at_startup_is_not_shown() {
    let store = MemoryStore::new();
    store.upsert_thread(
        ThreadKind::Ride,
        ThreadDoc {
            id: "R1".into(),
            participants: vec![ME.into(), "u2".into()],
            destination: Some("Airport".to_string()),
        },
    );
    store
        .post_message(
            ThreadKind::Ride,
            &"R1".into(),
            MessageDoc {
                id: "m1".into(),
                sender_id: Some("u2".into()),
                sender_name: Some("Sam".to_string()),
                text: Some("from yesterday".to_string()),
                timestamp: Some(chrono::Utc::now() - chrono::Duration::hours(20)),
            },
        )
        .unwrap();

    let mut h = Harness::with_store(store, Config::default());
    let view = h.wait_observed(1).await;
    assert!(!view.is_visible());
    assert_eq!(view.stats.discarded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_own_messages_never_notify() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.direct("D1", &[ME, "u3"]);
    h.wait_watching(2).await;

    h.post(ThreadKind::Ride, "R1", "m1", ME, "on my way");
    h.post(ThreadKind::Direct, "D1", "m2", ME, "see you");

    let view = h.wait_observed(2).await;
    assert!(!view.is_visible());
    assert_eq!(view.stats.surfaced, 0);
}

/// Direct thread D1 between u1 and u3; u3 writes while u1 is on /messages.
#[tokio::test(start_paused = true)]
async fn test_nothing_shows_on_messages_view() {
    let mut h = Harness::start();
    h.direct("D1", &[ME, "u3"]);
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.set_view("/messages");
    h.wait_watching(2).await;

    h.post(ThreadKind::Direct, "D1", "m1", "u3", "hey");
    h.post(ThreadKind::Ride, "R1", "m2", "u2", "leaving now");

    let view = h.wait_observed(2).await;
    assert!(!view.is_visible());
    assert_eq!(view.stats.discarded, 2);
}

#[tokio::test(start_paused = true)]
async fn test_open_ride_page_suppresses_only_that_ride() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.ride("R2", Some("Downtown"), &[ME, "u2"]);
    h.set_view("/ride/R1");
    h.wait_watching(2).await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "at the gate");
    h.wait_observed(1).await;
    assert!(!h.engine.view().is_visible());

    h.post(ThreadKind::Ride, "R2", "m2", "u2", "parking now");
    let view = h.wait_visible().await;
    assert_eq!(view.notification.unwrap().title, "Downtown");
}

#[tokio::test(start_paused = true)]
async fn test_leaving_the_view_reenables_notifications() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.set_view("/ride/R1");
    h.wait_watching(1).await;

    h.post(ThreadKind::Ride, "R1", "m1", "u2", "first");
    h.wait_observed(1).await;

    h.set_view("/rides");
    h.post(ThreadKind::Ride, "R1", "m2", "u2", "second");
    let view = h.wait_visible().await;
    assert_eq!(view.notification.unwrap().body_preview, "second");
}

#[tokio::test(start_paused = true)]
async fn test_direct_title_uses_profile_name() {
    let mut h = Harness::start();
    h.direct("D1", &[ME, "u3"]);
    h.user("u3", Some("jane doe"), Some("jane@example.com"));
    h.wait_watching(1).await;

    h.post(ThreadKind::Direct, "D1", "m1", "u3", "hey");

    let shown = h.wait_visible().await.notification.unwrap();
    assert_eq!(shown.title, "Jane Doe");
    assert_eq!(shown.sender_name, "Jane Doe");
    assert_eq!(shown.route.path(), "/messages?category=direct");
}

#[tokio::test(start_paused = true)]
async fn test_failed_lookup_falls_back_to_sender_name() {
    let mut h = Harness::start();
    h.direct("D1", &[ME, "u3"]);
    h.store.fail_lookups(true);
    h.wait_watching(1).await;

    h.post(ThreadKind::Direct, "D1", "m1", "u3", "hey");

    let shown = h.wait_visible().await.notification.unwrap();
    assert_eq!(shown.title, "Sam");
}

#[tokio::test(start_paused = true)]
async fn test_slow_lookup_times_out_to_fallback() {
    let mut h = Harness::start();
    h.direct("D1", &[ME, "u3"]);
    h.user("u3", Some("jane"), None);
    h.store.set_lookup_delay(Some(Duration::from_secs(60)));
    h.wait_watching(1).await;

    let start = tokio::time::Instant::now();
    h.post(ThreadKind::Direct, "D1", "m1", "u3", "hey");

    let shown = h.wait_visible().await.notification.unwrap();
    assert_eq!(shown.title, "Sam");
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(2), "waited {:?}", waited);
    assert!(waited < Duration::from_secs(3), "waited {:?}", waited);
}

/// A redelivery while the name lookup is still pending must not produce a
/// second notification.
#[tokio::test(start_paused = true)]
async fn test_redelivery_during_lookup_is_already_seen() {
    let mut h = Harness::start();
    h.direct("D1", &[ME, "u3"]);
    h.user("u3", Some("jane"), None);
    h.store.set_lookup_delay(Some(Duration::from_millis(500)));
    h.wait_watching(1).await;
    h.wait_tails(1).await;

    h.post(ThreadKind::Direct, "D1", "m1", "u3", "hey");
    h.store.redeliver_tail(ThreadKind::Direct, &"D1".into());
    h.wait_observed(2).await;

    let view = h.wait_visible().await;
    assert_eq!(view.notification.unwrap().title, "Jane");
    assert_eq!(view.stats.surfaced, 1);
    assert_eq!(view.stats.discarded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_ride_and_direct_with_same_id_are_independent() {
    let mut h = Harness::start();
    h.ride("X", Some("Airport"), &[ME, "u2"]);
    h.direct("X", &[ME, "u3"]);
    h.wait_watching(2).await;

    h.post(ThreadKind::Ride, "X", "m1", "u2", "ride chat");
    h.post(ThreadKind::Direct, "X", "m1", "u3", "direct chat");

    let view = h
        .wait_for("both surfaced", |v| v.stats.surfaced == 2)
        .await;
    assert_eq!(view.stats.discarded, 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_tail_is_dropped_and_processing_continues() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.wait_watching(1).await;

    h.store
        .post_message(
            ThreadKind::Ride,
            &"R1".into(),
            MessageDoc {
                id: "m1".into(),
                sender_id: Some("u2".into()),
                sender_name: None,
                text: Some("   ".to_string()),
                timestamp: Some(chrono::Utc::now()),
            },
        )
        .unwrap();
    let view = h.wait_observed(1).await;
    assert!(!view.is_visible());

    h.post(ThreadKind::Ride, "R1", "m2", "u2", "sorry, typo");
    let view = h.wait_visible().await;
    assert_eq!(view.notification.unwrap().body_preview, "sorry, typo");
}

#[tokio::test(start_paused = true)]
async fn test_long_text_is_previewed() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &[ME, "u2"]);
    h.wait_watching(1).await;

    let text = "a".repeat(80);
    h.post(ThreadKind::Ride, "R1", "m1", "u2", &text);

    let shown = h.wait_visible().await.notification.unwrap();
    assert_eq!(shown.body_preview, format!("{}...", "a".repeat(50)));
}

#[tokio::test(start_paused = true)]
async fn test_threads_without_me_are_ignored() {
    let mut h = Harness::start();
    h.ride("R1", Some("Airport"), &["u2", "u3"]);
    h.ride("R2", Some("Downtown"), &[ME, "u2"]);

    let view = h.wait_watching(1).await;
    assert_eq!(view.watching, 1);
    h.wait_tails(1).await;
    assert_eq!(h.store.tail_subscription_count(), 1);
}
