pub mod config;
pub mod error;
pub mod log;
pub mod retry;
pub mod store;
pub mod thread;
pub mod view;

// Notification pipeline
pub mod actors;
pub mod filter;
pub mod presenter;
pub mod registry;

// Event loop architecture
pub mod app;
pub mod render;
pub mod replay;
pub mod tea;

pub use app::{Engine, EngineHandle};
pub use config::Config;
pub use error::{Error, Result};
pub use render::{NotificationView, PresenterView};
pub use store::{DocumentStore, MemoryStore};
pub use thread::{NotificationEvent, ThreadId, ThreadKind, UserId};
pub use view::{Route, ViewContext};
