//! Scripted replay against the in-memory store.
//!
//! A script is JSON:
//!
//! ```json
//! {
//!   "user": "u1",
//!   "steps": [
//!     {"thread": {"kind": "ride", "id": "R1", "participants": ["u1", "u2"], "destination": "Airport"}},
//!     {"view": {"path": "/rides"}},
//!     {"message": {"kind": "ride", "thread": "R1", "sender": "u2", "sender_name": "Sam", "text": "leaving now"}},
//!     {"wait_ms": 2000}
//!   ]
//! }
//! ```
//!
//! Steps run in order against a fresh [`MemoryStore`]; the notification
//! lifecycle is reported as [`ReplayEvent`]s while it happens.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::app::{Engine, EngineHandle};
use crate::config::Config;
use crate::render::{NotificationView, PresenterView};
use crate::store::{MemoryStore, MessageDoc, ThreadDoc, UserProfile};
use crate::thread::{MessageId, ThreadId, ThreadKind, UserId};
use crate::view::{Route, ViewContext};
use crate::{plog_debug, Error, Result};

/// Pause after every non-wait step so the engine can catch up with the store.
const SETTLE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub user: Option<UserId>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Create or update a thread document.
    Thread {
        kind: ThreadKind,
        #[serde(flatten)]
        doc: ThreadDoc,
    },
    RemoveThread {
        kind: ThreadKind,
        id: ThreadId,
    },
    User(UserProfile),
    View {
        path: String,
        #[serde(default)]
        open_thread: Option<ThreadId>,
    },
    Message(ScriptMessage),
    WaitMs(u64),
    /// Activate whatever is visible.
    Activate,
    Dismiss,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptMessage {
    pub kind: ThreadKind,
    pub thread: ThreadId,
    #[serde(default)]
    pub id: Option<MessageId>,
    pub sender: UserId,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub text: String,
    /// How long ago the message was sent.
    #[serde(default)]
    pub age_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Shown {
        at_ms: u64,
        generation: u64,
        notification: NotificationView,
    },
    Hidden {
        at_ms: u64,
        generation: u64,
    },
    Navigated {
        at_ms: u64,
        #[serde(serialize_with = "serialize_route")]
        route: Route,
    },
}

fn serialize_route<S: serde::Serializer>(route: &Route, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&route.path())
}

impl fmt::Display for ReplayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayEvent::Shown {
                at_ms,
                generation,
                notification,
            } => write!(
                f,
                "{:>7}ms  show #{}  [{}] {}: {} ({})",
                at_ms,
                generation,
                notification.kind,
                notification.title,
                notification.body_preview,
                notification.sender_name
            ),
            ReplayEvent::Hidden { at_ms, generation } => {
                write!(f, "{:>7}ms  hide #{}", at_ms, generation)
            }
            ReplayEvent::Navigated { at_ms, route } => {
                write!(f, "{:>7}ms  navigate {}", at_ms, route)
            }
        }
    }
}

/// Tracks visibility transitions across successive snapshots.
#[derive(Debug, Default)]
struct Transitions {
    visible: Option<u64>,
}

impl Transitions {
    fn observe(&mut self, view: &PresenterView, at_ms: u64, out: &mut Vec<ReplayEvent>) {
        let now_visible = view.notification.as_ref().map(|_| view.generation);
        if now_visible == self.visible {
            return;
        }
        if let Some(generation) = self.visible {
            out.push(ReplayEvent::Hidden { at_ms, generation });
        }
        if let (Some(generation), Some(notification)) = (now_visible, &view.notification) {
            out.push(ReplayEvent::Shown {
                at_ms,
                generation,
                notification: notification.clone(),
            });
        }
        self.visible = now_visible;
    }
}

/// Run `script` as `user` and return the lifecycle events in order.
/// `on_event` sees each event as soon as it is observed.
pub async fn run<F>(script: Script, user: UserId, config: Config, mut on_event: F) -> Result<Vec<ReplayEvent>>
where
    F: FnMut(&ReplayEvent) + Send + 'static,
{
    let store = MemoryStore::new();
    let engine = Engine::spawn(Arc::new(store.clone()), user, config)?;
    let started = Instant::now();

    let mut views = engine.subscribe_view();
    let navigation = engine.navigation();
    let observer = tokio::spawn(async move {
        let mut events = Vec::new();
        let mut transitions = Transitions::default();
        loop {
            let at_ms = started.elapsed().as_millis() as u64;
            let mut batch = Vec::new();
            while let Ok(route) = navigation.try_recv() {
                batch.push(ReplayEvent::Navigated { at_ms, route });
            }
            let view = views.borrow_and_update().clone();
            transitions.observe(&view, at_ms, &mut batch);
            for event in batch {
                on_event(&event);
                events.push(event);
            }
            if views.changed().await.is_err() {
                break;
            }
        }
        events
    });

    for step in script.steps {
        apply(&store, &engine, step).await?;
    }

    engine.shutdown().await?;
    observer
        .await
        .map_err(|e| Error::TaskJoin(e.to_string()))
}

/// Timestamp of a message sent `age_ms` ago.
fn sent_at(age_ms: u64) -> Result<DateTime<Utc>> {
    i64::try_from(age_ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .ok_or_else(|| Error::Validation(format!("age_ms out of range: {}", age_ms)))
}

async fn apply(store: &MemoryStore, engine: &EngineHandle, step: Step) -> Result<()> {
    plog_debug!("replay: {:?}", step);
    match step {
        Step::Thread { kind, doc } => store.upsert_thread(kind, doc),
        Step::RemoveThread { kind, id } => {
            store.remove_thread(kind, &id)?;
        }
        Step::User(profile) => store.put_user(profile),
        Step::View { path, open_thread } => {
            engine.set_view(ViewContext::from_location(&path, open_thread))?;
        }
        Step::Message(message) => {
            let sent_at = sent_at(message.age_ms)?;
            store.post_message(
                message.kind,
                &message.thread,
                MessageDoc {
                    id: message.id.unwrap_or_else(MessageId::generate),
                    sender_id: Some(message.sender),
                    sender_name: message.sender_name,
                    text: Some(message.text),
                    timestamp: Some(sent_at),
                },
            )?;
        }
        Step::WaitMs(ms) => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return Ok(());
        }
        Step::Activate => {
            let view = engine.view();
            if view.is_visible() {
                engine.activate(view.generation)?;
            }
        }
        Step::Dismiss => {
            let view = engine.view();
            if view.is_visible() {
                engine.dismiss(view.generation)?;
            }
        }
    }
    tokio::time::sleep(SETTLE).await;
    Ok(())
}
