use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::thread::{NotificationEvent, ThreadId, ThreadKind};
use crate::view::Route;

/// Renderable payload of the visible notification. `route` is where
/// activating it navigates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    pub kind: ThreadKind,
    pub thread_id: ThreadId,
    pub title: String,
    pub body_preview: String,
    pub sender_name: String,
    #[serde(serialize_with = "serialize_route")]
    pub route: Route,
}

impl NotificationView {
    pub fn new(event: &NotificationEvent) -> Self {
        Self {
            kind: event.kind,
            thread_id: event.thread_id.clone(),
            title: event.title.clone(),
            body_preview: event.body_preview.clone(),
            sender_name: event.sender_name.clone(),
            route: Route::for_thread(event.kind, &event.thread_id),
        }
    }
}

fn serialize_route<S: serde::Serializer>(route: &Route, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&route.path())
}

/// Running totals, mostly useful to observers that need to know the engine
/// has caught up with the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Tail observations evaluated by the filter.
    pub observed: u64,
    /// Notifications that reached the presenter.
    pub surfaced: u64,
    pub discarded: u64,
}

static VERSION_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn next_version() -> u64 {
    VERSION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Immutable snapshot published to the UI shell after every state change.
#[derive(Debug, Clone)]
pub struct PresenterView {
    pub version: u64,
    /// Identifies the visible instance; pass it back to activate or dismiss.
    pub generation: u64,
    pub notification: Option<NotificationView>,
    pub shown_at: Option<Instant>,
    pub display_duration: Duration,
    /// Number of threads with a live tail watcher.
    pub watching: usize,
    pub stats: EngineStats,
}

impl PresenterView {
    pub fn is_visible(&self) -> bool {
        self.notification.is_some()
    }

    /// Display time left at `now`, for progress indicators. `None` while idle.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let shown_at = self.shown_at?;
        self.notification.as_ref()?;
        Some(
            self.display_duration
                .saturating_sub(now.saturating_duration_since(shown_at)),
        )
    }
}

impl Default for PresenterView {
    fn default() -> Self {
        Self {
            version: 0,
            generation: 0,
            notification: None,
            shown_at: None,
            display_duration: Duration::ZERO,
            watching: 0,
            stats: EngineStats::default(),
        }
    }
}
