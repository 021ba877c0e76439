//! Actor system for store subscriptions and timers.
//!
//! Each actor is an independent tokio task that communicates with the engine
//! loop via message passing. Actors handle:
//! - Thread membership per kind (MembershipActor)
//! - The newest message of one thread (TailWatcher)
//! - Auto-dismiss of the visible notification (see `presenter::DismissTimer`)
//!
//! Every actor is stopped through a CancellationToken derived from the
//! engine's root token, so cancelling the root reaches all of them at once.

pub mod membership;
pub mod tail;

use std::ops::ControlFlow;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::retry::Backoff;
use crate::store::Subscription;
use crate::{plog_debug, plog_warn, Error, Result};

pub use membership::MembershipActor;
pub use tail::{TailWatcher, WatcherHandle};

/// Handle to a running actor. Dropping the handle cancels the actor.
pub struct ActorHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl ActorHandle {
    pub fn new(cancel: CancellationToken, join: JoinHandle<()>) -> Self {
        Self {
            cancel,
            join: Some(join),
        }
    }

    /// Signal the actor to shut down. Takes effect at its next await point.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait until the task has released everything it owns.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            join.await.map_err(|e| Error::TaskJoin(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for ActorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Keep a subscription open until cancelled, re-subscribing with backoff
/// whenever opening fails, the store reports an error, or the stream ends.
///
/// `on_snapshot` returning `Break` ends the loop (the consumer is gone).
pub(crate) async fn follow<T, S, F>(
    label: &str,
    cancel: &CancellationToken,
    backoff: &mut Backoff,
    mut subscribe: S,
    mut on_snapshot: F,
) where
    S: FnMut() -> Result<Subscription<T>>,
    F: FnMut(T) -> ControlFlow<()>,
{
    loop {
        match subscribe() {
            Ok(mut sub) => {
                plog_debug!("{}: subscribed", label);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            plog_debug!("{}: cancelled", label);
                            return;
                        }
                        item = sub.next() => match item {
                            Some(Ok(snapshot)) => {
                                backoff.reset();
                                if on_snapshot(snapshot).is_break() {
                                    plog_debug!("{}: consumer gone", label);
                                    return;
                                }
                            }
                            Some(Err(e)) => {
                                plog_warn!("{}: subscription error: {}", label, e);
                                break;
                            }
                            None => {
                                plog_warn!("{}: subscription closed by store", label);
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                plog_warn!("{}: subscribe failed: {}", label, e);
            }
        }

        let delay = backoff.next_delay();
        plog_warn!(
            "{}: retrying in {:?} (attempt {})",
            label,
            delay,
            backoff.attempts()
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                plog_debug!("{}: cancelled during backoff", label);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
