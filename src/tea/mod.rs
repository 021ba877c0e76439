//! The Elm Architecture (TEA) core of the notification engine.
//!
//! - `Model`: filter markers, view context, presenter slot and counters
//! - `Message`: inputs from actors, timers and the UI shell
//! - `Command`: side effects for the engine loop to perform
//! - `update`: the single entry point that mutates the model
//!
//! Everything that touches `SeenMarkers` or the presenter goes through
//! `update`, one message at a time.

pub mod command;
pub mod message;
pub mod model;
pub mod update;

pub use command::Command;
pub use message::Message;
pub use model::Model;
pub use update::update;
