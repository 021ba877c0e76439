//! Thread registry: owns the membership actors and one tail watcher per
//! visible thread.
//!
//! Membership snapshots arrive as messages and are applied with
//! [`ThreadRegistry::reconcile`]. Every watcher runs on a child of the
//! registry's token, so [`ThreadRegistry::shutdown`] reaches all of them
//! with a single cancel before joining.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::actors::{ActorHandle, MembershipActor, TailWatcher, WatcherHandle};
use crate::config::Config;
use crate::retry::Backoff;
use crate::store::DocumentStore;
use crate::tea::Message;
use crate::thread::{ThreadHandle, ThreadKey, ThreadKind, UserId};
use crate::{plog_debug, plog_warn, Result};

/// What one call to [`ThreadRegistry::reconcile`] changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub started: Vec<ThreadKey>,
    pub stopped: Vec<ThreadKey>,
    /// Still watched, but title or participants changed.
    pub refreshed: Vec<ThreadKey>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.refreshed.is_empty()
    }
}

pub struct ThreadRegistry {
    store: Arc<dyn DocumentStore>,
    user_id: UserId,
    msg_tx: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    backoff: Backoff,
    sender_fallback: String,
    membership: Vec<ActorHandle>,
    watchers: HashMap<ThreadKey, WatcherHandle>,
}

impl ThreadRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        user_id: UserId,
        config: &Config,
        msg_tx: mpsc::UnboundedSender<Message>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            user_id,
            msg_tx,
            cancel,
            backoff: Backoff::from_config(config),
            sender_fallback: config.sender_fallback.clone(),
            membership: Vec::new(),
            watchers: HashMap::new(),
        }
    }

    /// Spawn one membership actor per thread kind. Idempotent.
    pub fn start(&mut self) {
        if !self.membership.is_empty() {
            return;
        }
        for kind in ThreadKind::ALL {
            let actor = MembershipActor::new(
                kind,
                self.user_id.clone(),
                self.store.clone(),
                self.msg_tx.clone(),
                self.backoff.clone(),
            );
            self.membership.push(actor.spawn(self.cancel.child_token()));
        }
        plog_debug!("ThreadRegistry: started for user {}", self.user_id);
    }

    /// Make the watchers of `kind` match `threads`. Watchers of the other
    /// kind are untouched.
    pub fn reconcile(&mut self, kind: ThreadKind, threads: Vec<ThreadHandle>) -> Reconciliation {
        let mut result = Reconciliation::default();
        if self.cancel.is_cancelled() {
            plog_warn!("ThreadRegistry: reconcile after shutdown ignored");
            return result;
        }

        let mut wanted: HashMap<ThreadKey, ThreadHandle> = HashMap::new();
        for thread in threads.into_iter().filter(|t| t.kind == kind) {
            wanted.insert(thread.key(), thread);
        }

        let gone: Vec<ThreadKey> = self
            .watchers
            .keys()
            .filter(|key| key.kind == kind && !wanted.contains_key(*key))
            .cloned()
            .collect();
        for key in gone {
            // Dropping the handle cancels the watcher and releases its subscription.
            self.watchers.remove(&key);
            result.stopped.push(key);
        }

        for (key, thread) in wanted {
            match self.watchers.get(&key) {
                Some(watcher) => {
                    if watcher.update(thread) {
                        result.refreshed.push(key);
                    }
                }
                None => {
                    let watcher = TailWatcher::new(
                        thread,
                        self.store.clone(),
                        self.msg_tx.clone(),
                        self.backoff.clone(),
                        self.sender_fallback.clone(),
                    )
                    .spawn(self.cancel.child_token());
                    self.watchers.insert(key.clone(), watcher);
                    result.started.push(key);
                }
            }
        }

        result.started.sort();
        result.stopped.sort();
        result.refreshed.sort();
        if !result.is_empty() {
            plog_debug!(
                "ThreadRegistry: {} started={} stopped={} refreshed={} watching={}",
                kind,
                result.started.len(),
                result.stopped.len(),
                result.refreshed.len(),
                self.watchers.len()
            );
        }
        result
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    pub fn contains(&self, key: &ThreadKey) -> bool {
        self.watchers.contains_key(key)
    }

    /// Cancel every actor, then wait for each to release its subscription.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        let count = self.watchers.len();
        for actor in self.membership.drain(..) {
            actor.stop().await?;
        }
        for (_, watcher) in self.watchers.drain() {
            watcher.stop().await?;
        }
        plog_debug!("ThreadRegistry: shut down, released {} watchers", count);
        Ok(())
    }
}
