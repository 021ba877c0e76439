use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Notification engine has shut down")]
    EngineClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
