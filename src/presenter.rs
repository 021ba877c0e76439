//! Single-slot notification presenter.
//!
//! [`PresenterState`] is a two-phase machine (`Idle`, `Visible`). Every
//! `show` starts a new generation; timer expiry, dismissal and activation
//! all name the generation they apply to, so a request aimed at a
//! notification that has since been replaced is ignored instead of closing
//! the newer one.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::actors::ActorHandle;
use crate::tea::Message;
use crate::thread::NotificationEvent;
use crate::view::Route;
use crate::{plog_debug, plog_trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Visible,
}

#[derive(Debug, Default)]
pub struct PresenterState {
    current: Option<NotificationEvent>,
    generation: u64,
    shown_at: Option<Instant>,
}

impl PresenterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        if self.current.is_some() {
            Phase::Visible
        } else {
            Phase::Idle
        }
    }

    pub fn is_visible(&self) -> bool {
        self.phase() == Phase::Visible
    }

    pub fn current(&self) -> Option<&NotificationEvent> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn shown_at(&self) -> Option<Instant> {
        self.shown_at
    }

    /// Show `event`, replacing whatever is visible. Returns the new
    /// generation, which the caller arms the dismiss timer with.
    pub fn show(&mut self, event: NotificationEvent, now: Instant) -> u64 {
        self.generation += 1;
        if let Some(previous) = &self.current {
            plog_debug!(
                "Presenter: replacing {} with {} (generation {})",
                previous.thread_id,
                event.thread_id,
                self.generation
            );
        }
        self.current = Some(event);
        self.shown_at = Some(now);
        self.generation
    }

    /// Dismiss timer for `generation` fired.
    pub fn expire(&mut self, generation: u64) -> bool {
        self.close(generation, "expired")
    }

    pub fn dismiss(&mut self, generation: u64) -> bool {
        self.close(generation, "dismissed")
    }

    /// Close the notification and return where to navigate.
    pub fn activate(&mut self, generation: u64) -> Option<Route> {
        let event = self.current.as_ref()?;
        if generation != self.generation {
            plog_trace!(
                "Presenter: stale activate {} (current {})",
                generation,
                self.generation
            );
            return None;
        }
        let route = Route::for_thread(event.kind, &event.thread_id);
        self.close(generation, "activated");
        Some(route)
    }

    fn close(&mut self, generation: u64, how: &str) -> bool {
        if self.current.is_none() || generation != self.generation {
            plog_trace!(
                "Presenter: ignoring {} for generation {} (current {})",
                how,
                generation,
                self.generation
            );
            return false;
        }
        plog_debug!("Presenter: generation {} {}", generation, how);
        self.current = None;
        self.shown_at = None;
        true
    }
}

/// Cancellable auto-dismiss timer. Dropping it cancels the pending expiry.
pub struct DismissTimer {
    generation: u64,
    actor: ActorHandle,
}

impl DismissTimer {
    /// Send `DismissTimerElapsed { generation }` after `after`, unless
    /// cancelled first. The timer also stops when `parent` is cancelled.
    pub fn arm(
        generation: u64,
        after: Duration,
        parent: &CancellationToken,
        msg_tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    let _ = msg_tx.send(Message::DismissTimerElapsed { generation });
                }
            }
        });
        Self {
            generation,
            actor: ActorHandle::new(cancel, join),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        self.actor.shutdown();
    }
}
