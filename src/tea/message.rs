//! Messages for the TEA pattern.
//!
//! Messages come from the membership actors, tail watchers, the dismiss
//! timer, finished name lookups and the UI shell.

use chrono::{DateTime, Utc};

use crate::thread::{MessageTail, NotificationEvent, ThreadHandle, ThreadKey, ThreadKind};
use crate::view::ViewContext;

/// Input messages to the update function.
#[derive(Debug)]
pub enum Message {
    // From background actors
    /// Full membership snapshot for one kind of thread.
    MembershipChanged {
        kind: ThreadKind,
        threads: Vec<ThreadHandle>,
    },
    /// A watcher saw a new tail. `thread` is the handle as of the observation.
    TailObserved {
        thread: ThreadHandle,
        tail: MessageTail,
        observed_at: DateTime<Utc>,
    },
    /// Name lookup finished (or fell back) for a surfaced direct message.
    TitleResolved { event: NotificationEvent },
    DismissTimerElapsed { generation: u64 },

    // From the UI shell
    ViewChanged(ViewContext),
    Dismiss { generation: u64 },
    Activate { generation: u64 },
}

impl Message {
    /// Thread a watcher-originated message belongs to.
    pub fn thread_key(&self) -> Option<ThreadKey> {
        match self {
            Message::TailObserved { thread, .. } => Some(thread.key()),
            Message::TitleResolved { event } => Some(event.key()),
            _ => None,
        }
    }
}
