//! What the user is looking at right now.
//!
//! The UI shell pushes a new [`ViewContext`] on every navigation. The filter
//! reads it to suppress notifications for conversations already on screen,
//! and the presenter produces a [`Route`] when a notification is activated.

use std::sync::OnceLock;

use regex::Regex;

use crate::thread::{ThreadId, ThreadKind};

pub const MESSAGES_PATH: &str = "/messages";
pub const DIRECT_CATEGORY: &str = "direct";

fn ride_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/ride/([^/?#]+)/?$").expect("valid ride path regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Aggregate messages view, optionally opened on a category tab.
    Messages { category: Option<String> },
    /// Ride detail page, which embeds the ride's group chat.
    Ride(ThreadId),
    Other(String),
}

impl Route {
    pub fn parse(location: &str) -> Self {
        let (path, query) = match location.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (location, None),
        };
        let path = path.split('#').next().unwrap_or_default();

        if path == MESSAGES_PATH || path == "/messages/" {
            let category = query.and_then(|q| {
                q.split('&')
                    .filter_map(|pair| pair.split_once('='))
                    .find(|(key, _)| *key == "category")
                    .map(|(_, value)| value.to_string())
            });
            return Route::Messages { category };
        }

        if let Some(caps) = ride_path_regex().captures(path) {
            return Route::Ride(ThreadId::new(&caps[1]));
        }

        Route::Other(location.to_string())
    }

    /// Where activating a notification for this kind of thread leads.
    pub fn for_thread(kind: ThreadKind, thread_id: &ThreadId) -> Self {
        match kind {
            ThreadKind::Ride => Route::Ride(thread_id.clone()),
            ThreadKind::Direct => Route::Messages {
                category: Some(DIRECT_CATEGORY.to_string()),
            },
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Messages { category: None } => MESSAGES_PATH.to_string(),
            Route::Messages {
                category: Some(category),
            } => format!("{}?category={}", MESSAGES_PATH, category),
            Route::Ride(id) => format!("/ride/{}", id),
            Route::Other(path) => path.clone(),
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewContext {
    pub route: Route,
}

impl Default for ViewContext {
    fn default() -> Self {
        Self {
            route: Route::Other("/".to_string()),
        }
    }
}

impl ViewContext {
    pub fn new(route: Route) -> Self {
        Self { route }
    }

    /// Build from a router path plus the `id` query parameter some routers
    /// report separately from the path.
    pub fn from_location(path: &str, open_thread: Option<ThreadId>) -> Self {
        let route = match (Route::parse(path), open_thread) {
            (Route::Ride(_), Some(id)) => Route::Ride(id),
            (Route::Other(p), Some(id)) if p.starts_with("/ride/") => Route::Ride(id),
            (route, _) => route,
        };
        Self { route }
    }

    pub fn is_aggregate_messages(&self) -> bool {
        matches!(self.route, Route::Messages { .. })
    }

    /// True when the thread's own conversation is already on screen.
    pub fn shows_thread(&self, kind: ThreadKind, thread_id: &ThreadId) -> bool {
        match (&self.route, kind) {
            (Route::Ride(open), ThreadKind::Ride) => open == thread_id,
            _ => false,
        }
    }
}
