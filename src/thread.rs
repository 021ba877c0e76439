//! Conversation threads and the values that flow between the watcher,
//! filter and presenter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Document id of a ride or direct-message thread.
    ThreadId
);
string_id!(UserId);
string_id!(MessageId);

impl MessageId {
    /// Fresh random id, used when a store assigns ids itself.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    /// Group chat attached to a ride.
    Ride,
    /// One-to-one conversation.
    Direct,
}

impl ThreadKind {
    pub const ALL: [ThreadKind; 2] = [ThreadKind::Ride, ThreadKind::Direct];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadKind::Ride => "ride",
            ThreadKind::Direct => "direct",
        }
    }
}

impl std::fmt::Display for ThreadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rides and direct threads live in separate collections, so an id is only
/// unique together with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadKey {
    pub kind: ThreadKind,
    pub id: ThreadId,
}

impl ThreadKey {
    pub fn new(kind: ThreadKind, id: impl Into<ThreadId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One conversation the current user participates in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    pub kind: ThreadKind,
    pub thread_id: ThreadId,
    /// Ride destination for rides; unused for direct threads.
    pub display_title: Option<String>,
    pub participant_ids: Vec<UserId>,
}

impl ThreadHandle {
    pub fn key(&self) -> ThreadKey {
        ThreadKey::new(self.kind, self.thread_id.clone())
    }

    /// First participant that is not `me`.
    pub fn other_participant(&self, me: &UserId) -> Option<&UserId> {
        self.participant_ids.iter().find(|id| *id != me)
    }
}

/// Most recent message observed for a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTail {
    pub thread_id: ThreadId,
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Candidate notification handed to the presenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub kind: ThreadKind,
    pub thread_id: ThreadId,
    pub title: String,
    pub body_preview: String,
    pub sender_name: String,
}

impl NotificationEvent {
    pub fn key(&self) -> ThreadKey {
        ThreadKey::new(self.kind, self.thread_id.clone())
    }
}
