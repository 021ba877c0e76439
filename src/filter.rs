//! Dedup and suppression: decides whether a thread's new tail message
//! becomes a visible notification.
//!
//! [`Filter::evaluate`] runs the checks in a fixed order:
//!
//! 1. malformed tails (blank id, sender or text) are dropped untouched
//! 2. the user's own messages are marked seen and dropped
//! 3. a message id equal to the thread's seen marker is a replay
//! 4. the marker is written, so nothing after this point can see the
//!    message twice
//! 5. conversations already on screen are suppressed
//! 6. messages older than the recency window are suppressed
//! 7. the title is built, or a display-name lookup is requested
//!
//! Name lookup happens outside the filter (see [`resolve_title`]) because it
//! is asynchronous; the marker is already written by then.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::store::DocumentStore;
use crate::thread::{
    MessageId, MessageTail, NotificationEvent, ThreadHandle, ThreadKey, ThreadKind, UserId,
};
use crate::view::ViewContext;
use crate::{plog_debug, Error, Result};

/// Per-thread high-water mark of processed message ids.
///
/// Keyed by thread, not by subscription, so a thread that leaves and rejoins
/// the membership set keeps its marker for the rest of the session.
#[derive(Debug, Default, Clone)]
pub struct SeenMarkers {
    markers: HashMap<ThreadKey, MessageId>,
}

impl SeenMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_seen(&self, key: &ThreadKey, message_id: &MessageId) -> bool {
        self.markers.get(key) == Some(message_id)
    }

    fn mark(&mut self, key: ThreadKey, message_id: MessageId) {
        self.markers.insert(key, message_id);
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    Malformed(&'static str),
    OwnMessage,
    AlreadySeen,
    OnMessagesView,
    ThreadOnScreen,
    Stale { age: chrono::Duration },
}

impl DiscardReason {
    pub fn label(&self) -> &'static str {
        match self {
            DiscardReason::Malformed(_) => "malformed",
            DiscardReason::OwnMessage => "own-message",
            DiscardReason::AlreadySeen => "already-seen",
            DiscardReason::OnMessagesView => "on-messages-view",
            DiscardReason::ThreadOnScreen => "thread-on-screen",
            DiscardReason::Stale { .. } => "stale",
        }
    }
}

/// What remains to do before a surviving tail can be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleRequest {
    Ready(NotificationEvent),
    /// Direct threads are titled with the other participant's name. `fallback`
    /// carries the embedded sender name and is used as-is if the lookup fails
    /// or finds no profile. `unnamed` titles a profile with neither name nor
    /// email.
    LookupSender {
        user_id: UserId,
        fallback: NotificationEvent,
        unnamed: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Discard(DiscardReason),
    Surface(TitleRequest),
}

pub struct Filter {
    user_id: UserId,
    seen: SeenMarkers,
    recency_window: chrono::Duration,
    preview_max_chars: usize,
    ride_title_fallback: String,
    sender_fallback: String,
}

impl Filter {
    pub fn new(user_id: UserId, config: &Config) -> Self {
        Self {
            user_id,
            seen: SeenMarkers::new(),
            recency_window: config.recency_window(),
            preview_max_chars: config.preview_max_chars,
            ride_title_fallback: config.ride_title_fallback.clone(),
            sender_fallback: config.sender_fallback.clone(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn seen(&self) -> &SeenMarkers {
        &self.seen
    }

    /// Decide what to do with `tail`, observed on `thread` at `now`.
    pub fn evaluate(
        &mut self,
        thread: &ThreadHandle,
        tail: &MessageTail,
        view: &ViewContext,
        now: DateTime<Utc>,
    ) -> Decision {
        let decision = self.decide(thread, tail, view, now);
        match &decision {
            Decision::Discard(reason) => plog_debug!(
                "Filter: discard thread={} message={} reason={}",
                thread.key(),
                tail.message_id,
                reason.label()
            ),
            Decision::Surface(_) => plog_debug!(
                "Filter: surface thread={} message={}",
                thread.key(),
                tail.message_id
            ),
        }
        decision
    }

    fn decide(
        &mut self,
        thread: &ThreadHandle,
        tail: &MessageTail,
        view: &ViewContext,
        now: DateTime<Utc>,
    ) -> Decision {
        if let Err(reason) = validate(tail) {
            return Decision::Discard(reason);
        }

        let key = thread.key();

        if tail.sender_id == self.user_id {
            self.seen.mark(key, tail.message_id.clone());
            return Decision::Discard(DiscardReason::OwnMessage);
        }

        if self.seen.is_seen(&key, &tail.message_id) {
            return Decision::Discard(DiscardReason::AlreadySeen);
        }

        self.seen.mark(key, tail.message_id.clone());

        if view.is_aggregate_messages() {
            return Decision::Discard(DiscardReason::OnMessagesView);
        }
        if view.shows_thread(thread.kind, &thread.thread_id) {
            return Decision::Discard(DiscardReason::ThreadOnScreen);
        }

        let age = now.signed_duration_since(tail.sent_at);
        if age > self.recency_window {
            return Decision::Discard(DiscardReason::Stale { age });
        }

        Decision::Surface(self.title_request(thread, tail))
    }

    fn title_request(&self, thread: &ThreadHandle, tail: &MessageTail) -> TitleRequest {
        let body_preview = preview(&tail.text, self.preview_max_chars);
        match thread.kind {
            ThreadKind::Ride => TitleRequest::Ready(NotificationEvent {
                kind: ThreadKind::Ride,
                thread_id: thread.thread_id.clone(),
                title: thread
                    .display_title
                    .clone()
                    .unwrap_or_else(|| self.ride_title_fallback.clone()),
                body_preview,
                sender_name: tail.sender_name.clone(),
            }),
            ThreadKind::Direct => {
                let fallback = NotificationEvent {
                    kind: ThreadKind::Direct,
                    thread_id: thread.thread_id.clone(),
                    title: tail.sender_name.clone(),
                    body_preview,
                    sender_name: tail.sender_name.clone(),
                };
                match thread.other_participant(&self.user_id) {
                    Some(other) => TitleRequest::LookupSender {
                        user_id: other.clone(),
                        fallback,
                        unnamed: self.sender_fallback.clone(),
                    },
                    None => TitleRequest::Ready(fallback),
                }
            }
        }
    }
}

fn validate(tail: &MessageTail) -> std::result::Result<(), DiscardReason> {
    if tail.message_id.is_empty() {
        return Err(DiscardReason::Malformed("missing message id"));
    }
    if tail.sender_id.is_empty() {
        return Err(DiscardReason::Malformed("missing sender id"));
    }
    if tail.text.trim().is_empty() {
        return Err(DiscardReason::Malformed("empty text"));
    }
    Ok(())
}

/// Finish a [`TitleRequest`]. Lookup failures and timeouts fall back to the
/// embedded sender name and never surface as errors.
pub async fn resolve_title(
    store: Arc<dyn DocumentStore>,
    request: TitleRequest,
    timeout: Duration,
) -> NotificationEvent {
    match request {
        TitleRequest::Ready(event) => event,
        TitleRequest::LookupSender {
            user_id,
            mut fallback,
            unnamed,
        } => match lookup_display_name(store.as_ref(), &user_id, &unnamed, timeout).await {
            Ok(Some(name)) => {
                fallback.title = name.clone();
                fallback.sender_name = name;
                fallback
            }
            Ok(None) => fallback,
            Err(e) => {
                plog_debug!("Name lookup for {} failed, using fallback: {}", user_id, e);
                fallback
            }
        },
    }
}

/// Capitalised display name of `user_id`, or `None` when no profile exists.
/// A profile without name or email is titled `unnamed`.
pub async fn lookup_display_name(
    store: &dyn DocumentStore,
    user_id: &UserId,
    unnamed: &str,
    timeout: Duration,
) -> Result<Option<String>> {
    let profile = tokio::time::timeout(timeout, store.lookup_user(user_id))
        .await
        .map_err(|_| Error::Timeout(timeout))??;
    Ok(profile.map(|p| capitalize_name(p.display_name().unwrap_or(unnamed))))
}

/// Truncate to `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Upper-case the first letter of each space-separated word and lower-case
/// the rest.
pub fn capitalize_name(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
