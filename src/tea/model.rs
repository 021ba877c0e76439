//! Model for the TEA pattern.
//!
//! The Model is pure engine state - no channels, no handles, no runtime
//! infrastructure. Watchers and timers live in the engine loop.

use crate::config::Config;
use crate::filter::Filter;
use crate::presenter::PresenterState;
use crate::render::{next_version, EngineStats, NotificationView, PresenterView};
use crate::thread::UserId;
use crate::view::ViewContext;

pub struct Model {
    pub filter: Filter,
    pub view: ViewContext,
    pub presenter: PresenterState,
    pub stats: EngineStats,
    /// Live tail watchers, as last reported by the registry.
    pub watching: usize,

    // Dirty flag - set when a new snapshot should be published
    pub dirty: bool,

    // Config (immutable after init)
    pub config: Config,
}

impl Model {
    pub fn new(user_id: UserId, config: Config) -> Self {
        Self {
            filter: Filter::new(user_id, &config),
            view: ViewContext::default(),
            presenter: PresenterState::new(),
            stats: EngineStats::default(),
            watching: 0,
            dirty: true,
            config,
        }
    }

    pub fn user_id(&self) -> &UserId {
        self.filter.user_id()
    }

    pub fn snapshot(&self) -> PresenterView {
        PresenterView {
            version: next_version(),
            generation: self.presenter.generation(),
            notification: self.presenter.current().map(NotificationView::new),
            shown_at: self.presenter.shown_at(),
            display_duration: self.config.display_duration(),
            watching: self.watching,
            stats: self.stats,
        }
    }
}
