//! Test fixtures for integration tests.
//!
//! Provides a [`Harness`] that owns an in-memory store and an engine running
//! as user `u1`, plus helpers to seed threads, post messages and wait on
//! published snapshots.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use rideping::store::{MessageDoc, ThreadDoc, UserProfile};
use rideping::thread::MessageId;
use rideping::{
    Config, Engine, EngineHandle, MemoryStore, PresenterView, ThreadKind, UserId, ViewContext,
};

/// The current user in every harness.
pub const ME: &str = "u1";

const WAIT_LIMIT: Duration = Duration::from_secs(30);

pub struct Harness {
    pub store: MemoryStore,
    pub engine: EngineHandle,
    views: watch::Receiver<PresenterView>,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }

    /// Start an engine over a store that may already hold data or faults.
    pub fn with_store(store: MemoryStore, config: Config) -> Self {
        let engine = Engine::spawn(Arc::new(store.clone()), UserId::from(ME), config)
            .expect("Failed to spawn engine");
        let views = engine.subscribe_view();
        Self {
            store,
            engine,
            views,
        }
    }

    pub fn ride(&self, id: &str, destination: Option<&str>, participants: &[&str]) {
        self.store.upsert_thread(
            ThreadKind::Ride,
            ThreadDoc {
                id: id.into(),
                participants: participants.iter().map(|p| UserId::from(*p)).collect(),
                destination: destination.map(str::to_string),
            },
        );
    }

    pub fn direct(&self, id: &str, participants: &[&str]) {
        self.store.upsert_thread(
            ThreadKind::Direct,
            ThreadDoc {
                id: id.into(),
                participants: participants.iter().map(|p| UserId::from(*p)).collect(),
                destination: None,
            },
        );
    }

    pub fn user(&self, id: &str, name: Option<&str>, email: Option<&str>) {
        self.store.put_user(UserProfile {
            id: id.into(),
            name: name.map(str::to_string),
            email: email.map(str::to_string),
        });
    }

    /// Post a message sent right now.
    pub fn post(&self, kind: ThreadKind, thread: &str, id: &str, sender: &str, text: &str) {
        self.post_aged(kind, thread, id, sender, text, chrono::Duration::zero());
    }

    pub fn post_aged(
        &self,
        kind: ThreadKind,
        thread: &str,
        id: &str,
        sender: &str,
        text: &str,
        age: chrono::Duration,
    ) {
        self.store
            .post_message(
                kind,
                &thread.into(),
                MessageDoc {
                    id: MessageId::from(id),
                    sender_id: Some(sender.into()),
                    sender_name: Some("Sam".to_string()),
                    text: Some(text.to_string()),
                    timestamp: Some(Utc::now() - age),
                },
            )
            .expect("Failed to post message");
    }

    pub fn set_view(&self, path: &str) {
        self.engine
            .set_view(ViewContext::from_location(path, None))
            .expect("Engine closed");
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&mut self, what: &str, predicate: F) -> PresenterView
    where
        F: Fn(&PresenterView) -> bool,
    {
        let outcome = tokio::time::timeout(WAIT_LIMIT, self.views.wait_for(|v| predicate(v)))
            .await
            .map(|found| found.map(|view| view.clone()));
        match outcome {
            Ok(Ok(view)) => view,
            Ok(Err(_)) => panic!("Engine stopped while waiting for {}", what),
            Err(_) => panic!(
                "Timed out waiting for {}; last view: {:?}",
                what,
                *self.views.borrow()
            ),
        }
    }

    pub async fn wait_watching(&mut self, count: usize) -> PresenterView {
        self.wait_for(&format!("{} watchers", count), |v| v.watching == count)
            .await
    }

    /// Wait until `count` tails have been evaluated in total.
    pub async fn wait_observed(&mut self, count: u64) -> PresenterView {
        self.wait_for(&format!("{} observations", count), |v| {
            v.stats.observed >= count
        })
        .await
    }

    pub async fn wait_visible(&mut self) -> PresenterView {
        self.wait_for("a visible notification", |v| v.is_visible())
            .await
    }

    pub async fn wait_hidden(&mut self) -> PresenterView {
        self.wait_for("no visible notification", |v| !v.is_visible())
            .await
    }

    /// Let watchers attach to their subscriptions before the test posts.
    pub async fn wait_tails(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        while self.store.tail_subscription_count() != count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "Timed out waiting for {} tail subscriptions",
                count
            );
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub async fn shutdown(self) -> MemoryStore {
        self.engine.shutdown().await.expect("Engine shutdown failed");
        self.store
    }
}
