//! Tail watcher: follows the newest message of one thread and forwards each
//! observation to the engine. It never filters; empty threads produce
//! nothing.

use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::retry::Backoff;
use crate::store::{DocumentStore, MessageDoc};
use crate::tea::Message;
use crate::thread::{MessageTail, ThreadHandle, ThreadId, UserId};
use crate::{plog_debug, plog_trace};

use super::{follow, ActorHandle};

pub struct TailWatcher {
    thread: ThreadHandle,
    store: Arc<dyn DocumentStore>,
    msg_tx: mpsc::UnboundedSender<Message>,
    backoff: Backoff,
    sender_fallback: String,
}

impl TailWatcher {
    pub fn new(
        thread: ThreadHandle,
        store: Arc<dyn DocumentStore>,
        msg_tx: mpsc::UnboundedSender<Message>,
        backoff: Backoff,
        sender_fallback: String,
    ) -> Self {
        Self {
            thread,
            store,
            msg_tx,
            backoff,
            sender_fallback,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> WatcherHandle {
        let key = self.thread.key();
        plog_debug!("TailWatcher::spawn thread={}", key);
        let (thread_tx, thread_rx) = watch::channel(self.thread.clone());
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let Self {
                thread,
                store,
                msg_tx,
                mut backoff,
                sender_fallback,
            } = self;
            let label = format!("tail[{}]", thread.key());

            follow(
                &label,
                &token,
                &mut backoff,
                || store.subscribe_tail(thread.kind, &thread.thread_id),
                |latest| {
                    let Some(doc) = latest else {
                        plog_trace!("{}: no messages yet", label);
                        return ControlFlow::Continue(());
                    };
                    let tail = tail_from_doc(&thread.thread_id, doc, &sender_fallback);
                    plog_trace!("{}: observed {}", label, tail.message_id);
                    let message = Message::TailObserved {
                        thread: thread_rx.borrow().clone(),
                        tail,
                        observed_at: Utc::now(),
                    };
                    match msg_tx.send(message) {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(_) => ControlFlow::Break(()),
                    }
                },
            )
            .await;
        });

        WatcherHandle {
            thread: thread_tx,
            actor: ActorHandle::new(cancel, join),
        }
    }
}

/// Owning handle for one watcher; dropping it unsubscribes.
pub struct WatcherHandle {
    thread: watch::Sender<ThreadHandle>,
    actor: ActorHandle,
}

impl WatcherHandle {
    pub fn thread(&self) -> ThreadHandle {
        self.thread.borrow().clone()
    }

    /// Refresh title or participants without re-subscribing. Returns true if
    /// anything changed.
    pub fn update(&self, thread: ThreadHandle) -> bool {
        self.thread.send_if_modified(|current| {
            if *current == thread {
                false
            } else {
                *current = thread;
                true
            }
        })
    }

    pub async fn stop(self) -> crate::Result<()> {
        self.actor.stop().await
    }
}

/// Build a tail from a raw document. Missing fields become empty values for
/// the filter to reject; a pending server timestamp counts as "now".
pub fn tail_from_doc(thread_id: &ThreadId, doc: MessageDoc, sender_fallback: &str) -> MessageTail {
    MessageTail {
        thread_id: thread_id.clone(),
        message_id: doc.id,
        sender_id: doc.sender_id.unwrap_or_else(|| UserId::new("")),
        sender_name: doc
            .sender_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| sender_fallback.to_string()),
        text: doc.text.unwrap_or_default(),
        sent_at: doc.timestamp.unwrap_or_else(Utc::now),
    }
}
