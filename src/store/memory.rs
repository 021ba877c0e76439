//! In-process document store with push subscriptions.
//!
//! Backs the replay command and the test suites. Every mutation pushes fresh
//! snapshots to the matching live subscriptions, the same way the hosted
//! store notifies listeners. Faults can be injected to exercise the engine's
//! retry and fallback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

use super::{DocumentStore, MessageDoc, Subscription, ThreadDoc, UserProfile};
use crate::thread::{MessageId, ThreadId, ThreadKey, ThreadKind, UserId};
use crate::{plog_trace, Error, Result};

type ThreadSender = mpsc::UnboundedSender<Result<Vec<ThreadDoc>>>;
type TailSender = mpsc::UnboundedSender<Result<Option<MessageDoc>>>;

struct ThreadSub {
    kind: ThreadKind,
    member: UserId,
    tx: ThreadSender,
}

struct TailSub {
    key: ThreadKey,
    tx: TailSender,
}

#[derive(Default)]
struct Inner {
    threads: BTreeMap<ThreadKey, ThreadDoc>,
    messages: HashMap<ThreadKey, Vec<MessageDoc>>,
    users: HashMap<UserId, UserProfile>,
    thread_subs: Vec<ThreadSub>,
    tail_subs: Vec<TailSub>,
    /// Number of upcoming subscribe calls that fail.
    failing_subscriptions: u32,
    failing_lookups: bool,
    lookup_delay: Option<Duration>,
}

impl Inner {
    fn members_snapshot(&self, kind: ThreadKind, member: &UserId) -> Vec<ThreadDoc> {
        self.threads
            .iter()
            .filter(|(key, doc)| key.kind == kind && doc.has_participant(member))
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    /// Newest message by timestamp; pending timestamps sort last, ties go to
    /// the later write.
    fn tail(&self, key: &ThreadKey) -> Option<MessageDoc> {
        self.messages
            .get(key)?
            .iter()
            .enumerate()
            .max_by_key(|(idx, m)| (m.timestamp.is_none(), m.timestamp, *idx))
            .map(|(_, m)| m.clone())
    }

    fn push_memberships(&mut self, kind: ThreadKind) {
        self.thread_subs.retain(|s| !s.tx.is_closed());
        let snapshots: Vec<_> = self
            .thread_subs
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.tx.clone(), self.members_snapshot(kind, &s.member)))
            .collect();
        for (tx, docs) in snapshots {
            let _ = tx.send(Ok(docs));
        }
    }

    fn push_tail(&mut self, key: &ThreadKey) {
        self.tail_subs.retain(|s| !s.tx.is_closed());
        let tail = self.tail(key);
        for sub in self.tail_subs.iter().filter(|s| &s.key == key) {
            let _ = sub.tx.send(Ok(tail.clone()));
        }
    }

    fn take_subscription_fault(&mut self) -> Result<()> {
        if self.failing_subscriptions > 0 {
            self.failing_subscriptions -= 1;
            return Err(Error::Subscription("store unreachable".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a thread document.
    pub fn upsert_thread(&self, kind: ThreadKind, doc: ThreadDoc) {
        let mut inner = self.lock();
        inner.threads.insert(ThreadKey::new(kind, doc.id.clone()), doc);
        inner.push_memberships(kind);
    }

    pub fn remove_thread(&self, kind: ThreadKind, thread_id: &ThreadId) -> Result<ThreadDoc> {
        let mut inner = self.lock();
        let key = ThreadKey::new(kind, thread_id.clone());
        let doc = inner
            .threads
            .remove(&key)
            .ok_or_else(|| Error::ThreadNotFound(key.to_string()))?;
        inner.push_memberships(kind);
        Ok(doc)
    }

    /// Append a message and notify the thread's tail listeners.
    pub fn post_message(
        &self,
        kind: ThreadKind,
        thread_id: &ThreadId,
        doc: MessageDoc,
    ) -> Result<MessageId> {
        let mut inner = self.lock();
        let key = ThreadKey::new(kind, thread_id.clone());
        if !inner.threads.contains_key(&key) {
            return Err(Error::ThreadNotFound(key.to_string()));
        }
        let id = doc.id.clone();
        plog_trace!("MemoryStore::post_message thread={} id={}", key, id);
        inner.messages.entry(key.clone()).or_default().push(doc);
        inner.push_tail(&key);
        Ok(id)
    }

    /// Push the current tail again without changing it, as a flaky network
    /// layer would.
    pub fn redeliver_tail(&self, kind: ThreadKind, thread_id: &ThreadId) {
        let mut inner = self.lock();
        inner.push_tail(&ThreadKey::new(kind, thread_id.clone()));
    }

    pub fn put_user(&self, profile: UserProfile) {
        self.lock().users.insert(profile.id.clone(), profile);
    }

    /// Make the next `count` subscribe calls fail.
    pub fn fail_next_subscriptions(&self, count: u32) {
        self.lock().failing_subscriptions = count;
    }

    /// Report an error on every live subscription and close them, as when
    /// the connection to the hosted store drops.
    pub fn disconnect_all(&self) {
        let mut inner = self.lock();
        for sub in inner.thread_subs.drain(..) {
            let _ = sub.tx.send(Err(Error::Subscription("connection lost".to_string())));
        }
        for sub in inner.tail_subs.drain(..) {
            let _ = sub.tx.send(Err(Error::Subscription("connection lost".to_string())));
        }
    }

    pub fn fail_lookups(&self, failing: bool) {
        self.lock().failing_lookups = failing;
    }

    pub fn set_lookup_delay(&self, delay: Option<Duration>) {
        self.lock().lookup_delay = delay;
    }

    /// Live membership subscriptions (closed ones are pruned first).
    pub fn thread_subscription_count(&self) -> usize {
        let mut inner = self.lock();
        inner.thread_subs.retain(|s| !s.tx.is_closed());
        inner.thread_subs.len()
    }

    /// Live tail subscriptions (closed ones are pruned first).
    pub fn tail_subscription_count(&self) -> usize {
        let mut inner = self.lock();
        inner.tail_subs.retain(|s| !s.tx.is_closed());
        inner.tail_subs.len()
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe_threads(
        &self,
        kind: ThreadKind,
        member: &UserId,
    ) -> Result<Subscription<Vec<ThreadDoc>>> {
        let mut inner = self.lock();
        inner.take_subscription_fault()?;
        let (tx, sub) = Subscription::channel();
        let _ = tx.send(Ok(inner.members_snapshot(kind, member)));
        inner.thread_subs.push(ThreadSub {
            kind,
            member: member.clone(),
            tx,
        });
        Ok(sub)
    }

    fn subscribe_tail(
        &self,
        kind: ThreadKind,
        thread_id: &ThreadId,
    ) -> Result<Subscription<Option<MessageDoc>>> {
        let mut inner = self.lock();
        inner.take_subscription_fault()?;
        let key = ThreadKey::new(kind, thread_id.clone());
        let (tx, sub) = Subscription::channel();
        let _ = tx.send(Ok(inner.tail(&key)));
        inner.tail_subs.push(TailSub { key, tx });
        Ok(sub)
    }

    fn lookup_user(&self, user_id: &UserId) -> BoxFuture<'static, Result<Option<UserProfile>>> {
        let inner = Arc::clone(&self.inner);
        let user_id = user_id.clone();
        async move {
            let delay = inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .lookup_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if inner.failing_lookups {
                return Err(Error::Lookup(format!("profile {} unavailable", user_id)));
            }
            Ok(inner.users.get(&user_id).cloned())
        }
        .boxed()
    }
}
