//! Commands for the TEA pattern: side effects executed by the engine loop.

use std::time::Duration;

use crate::filter::TitleRequest;
use crate::thread::{ThreadHandle, ThreadKind};
use crate::view::Route;

#[derive(Debug)]
pub enum Command {
    /// Start and stop tail watchers so they match `threads`.
    Reconcile {
        kind: ThreadKind,
        threads: Vec<ThreadHandle>,
    },
    /// Finish the title off the event loop and report `TitleResolved`.
    ResolveTitle(TitleRequest),
    /// Replace any pending dismiss timer.
    ArmDismissTimer { generation: u64, after: Duration },
    CancelDismissTimer,
    Navigate(Route),
}
