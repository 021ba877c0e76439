//! Boundary to the hosted document store.
//!
//! The engine never queries the store directly. It opens push subscriptions
//! for "threads containing user X" and "latest message in thread Y", and
//! does one-off profile lookups for display names. Subscriptions deliver
//! whole snapshots; dropping a [`Subscription`] unsubscribes.

pub mod memory;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::thread::{MessageId, ThreadHandle, ThreadId, ThreadKind, UserId};
use crate::{Error, Result};

pub use memory::MemoryStore;

/// Thread document as stored in the `rides` or `directMessages` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDoc {
    pub id: ThreadId,
    #[serde(default)]
    pub participants: Vec<UserId>,
    /// Set on ride documents only.
    #[serde(default)]
    pub destination: Option<String>,
}

impl ThreadDoc {
    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn into_handle(self, kind: ThreadKind) -> Result<ThreadHandle> {
        if self.id.is_empty() {
            return Err(Error::Malformed(format!("{} thread without id", kind)));
        }
        let display_title = self
            .destination
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(ThreadHandle {
            kind,
            thread_id: self.id,
            display_title,
            participant_ids: self.participants,
        })
    }
}

/// Message document from a thread's `messages` subcollection. Every field
/// but the id may be absent on documents written by older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDoc {
    pub id: MessageId,
    #[serde(default)]
    pub sender_id: Option<UserId>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// `None` while a server timestamp is still pending.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserProfile {
    /// Name if set, otherwise email.
    pub fn display_name(&self) -> Option<&str> {
        [self.name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Live result set of one query. Each item is a full snapshot or an error
/// reported by the store; `None` from [`Subscription::next`] means the store
/// closed the stream.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T>>,
}

impl<T> Subscription<T> {
    /// Sender half for store implementations. The subscription is released
    /// when the receiving side is dropped, which `is_closed` reports.
    pub fn channel() -> (mpsc::UnboundedSender<Result<T>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    pub async fn next(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }
}

pub trait DocumentStore: Send + Sync + 'static {
    /// Threads of `kind` whose participant list contains `member`.
    fn subscribe_threads(
        &self,
        kind: ThreadKind,
        member: &UserId,
    ) -> Result<Subscription<Vec<ThreadDoc>>>;

    /// Latest message of one thread, ordered by send time, limit one.
    fn subscribe_tail(
        &self,
        kind: ThreadKind,
        thread_id: &ThreadId,
    ) -> Result<Subscription<Option<MessageDoc>>>;

    fn lookup_user(&self, user_id: &UserId) -> BoxFuture<'static, Result<Option<UserProfile>>>;
}
