//! Membership actor: follows the set of threads of one kind that list the
//! current user as a participant.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::retry::Backoff;
use crate::store::{DocumentStore, ThreadDoc};
use crate::tea::Message;
use crate::thread::{ThreadHandle, ThreadKind, UserId};
use crate::{plog_debug, plog_warn};

use super::{follow, ActorHandle};

pub struct MembershipActor {
    kind: ThreadKind,
    user_id: UserId,
    store: Arc<dyn DocumentStore>,
    msg_tx: mpsc::UnboundedSender<Message>,
    backoff: Backoff,
}

impl MembershipActor {
    pub fn new(
        kind: ThreadKind,
        user_id: UserId,
        store: Arc<dyn DocumentStore>,
        msg_tx: mpsc::UnboundedSender<Message>,
        backoff: Backoff,
    ) -> Self {
        Self {
            kind,
            user_id,
            store,
            msg_tx,
            backoff,
        }
    }

    /// Spawn under `cancel`; the returned handle cancels on drop.
    pub fn spawn(self, cancel: CancellationToken) -> ActorHandle {
        plog_debug!("MembershipActor::spawn kind={}", self.kind);
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let Self {
                kind,
                user_id,
                store,
                msg_tx,
                mut backoff,
            } = self;
            let label = format!("membership[{}]", kind);

            follow(
                &label,
                &token,
                &mut backoff,
                || store.subscribe_threads(kind, &user_id),
                |docs| {
                    let threads = membership_handles(kind, &user_id, docs);
                    plog_debug!("{}: {} threads", label, threads.len());
                    match msg_tx.send(Message::MembershipChanged { kind, threads }) {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(_) => ControlFlow::Break(()),
                    }
                },
            )
            .await;
        });

        ActorHandle::new(cancel, join)
    }
}

/// Convert a snapshot into handles, keeping only well-formed threads that
/// actually include `user_id`.
pub fn membership_handles(
    kind: ThreadKind,
    user_id: &UserId,
    docs: Vec<ThreadDoc>,
) -> Vec<ThreadHandle> {
    docs.into_iter()
        .filter(|doc| doc.has_participant(user_id))
        .filter_map(|doc| match doc.into_handle(kind) {
            Ok(handle) => Some(handle),
            Err(e) => {
                plog_warn!("Dropping {} thread document: {}", kind, e);
                None
            }
        })
        .collect()
}
