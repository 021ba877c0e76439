//! File logging for the notification engine.
//!
//! Every line is tagged with the component that wrote it, derived from the
//! calling module:
//!
//! ```text
//! [14:02:11.408] [DEBUG] [filter] Filter: discard thread=ride:R1 message=m4 reason=already_seen
//! ```
//!
//! The global level is INFO, or DEBUG with `--debug` / `RIDEPING_DEBUG=1`.
//! `RIDEPING_LOG` overrides it per component, e.g.
//! `RIDEPING_LOG=filter=trace,store=warn`.
//!
//! Until `init_with_debug` runs every log call is a no-op, so library users
//! and tests never touch the filesystem.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static OVERRIDES: OnceLock<Vec<(Component, LogLevel)>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Part of the engine a log line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Store,
    Registry,
    Watcher,
    Filter,
    Presenter,
    Engine,
    Replay,
    Cli,
}

impl Component {
    const ALL: [Component; 8] = [
        Component::Store,
        Component::Registry,
        Component::Watcher,
        Component::Filter,
        Component::Presenter,
        Component::Engine,
        Component::Replay,
        Component::Cli,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Store => "store",
            Component::Registry => "registry",
            Component::Watcher => "watcher",
            Component::Filter => "filter",
            Component::Presenter => "presenter",
            Component::Engine => "engine",
            Component::Replay => "replay",
            Component::Cli => "cli",
        }
    }

    /// Map a `module_path!()` to its component.
    pub fn of_module(module: &str) -> Self {
        let inner = module.split_once("::").map_or("", |(_, rest)| rest);
        let head = inner.split("::").next().unwrap_or("");
        match head {
            "store" | "config" => Component::Store,
            "registry" => Component::Registry,
            "actors" => Component::Watcher,
            "filter" => Component::Filter,
            "presenter" | "render" => Component::Presenter,
            "replay" => Component::Replay,
            "" => Component::Cli,
            _ => Component::Engine,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `component=level` pairs separated by commas. Unknown entries are
/// skipped.
pub fn parse_overrides(directives: &str) -> Vec<(Component, LogLevel)> {
    directives.split(',')
        .filter_map(|entry| {
            let (component, level) = entry.split_once('=')?;
            Some((Component::parse(component)?, LogLevel::parse(level)?))
        })
        .collect()
}

/// Initialize logging to ~/.rideping/rideping.log
pub fn init_with_debug(debug: bool) {
    let env_debug = std::env::var("RIDEPING_DEBUG")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);

    let level = if debug || env_debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);

    let overrides = std::env::var("RIDEPING_LOG")
        .map(|directives| parse_overrides(&directives))
        .unwrap_or_default();
    OVERRIDES.set(overrides).ok();

    if let Some(dir) = dirs::home_dir().map(|h| h.join(".rideping")) {
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("rideping.log");
        // Truncate file on startup
        let _ = std::fs::write(&path, "");
        LOG_PATH.set(path).ok();
    }
}

fn level_for(component: Component) -> LogLevel {
    OVERRIDES
        .get()
        .and_then(|o| o.iter().rev().find(|(c, _)| *c == component))
        .map(|(_, level)| *level)
        .unwrap_or_else(|| LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed)))
}

fn format_line(
    timestamp: impl fmt::Display,
    level: LogLevel,
    component: Component,
    args: fmt::Arguments<'_>,
) -> String {
    format!("[{}] [{}] [{}] {}", timestamp, level.as_str(), component, args)
}

/// Write one line if `level` is enabled for the component owning `module`.
pub fn log_at(level: LogLevel, module: &str, args: fmt::Arguments<'_>) {
    let Some(path) = LOG_PATH.get() else {
        return;
    };
    let component = Component::of_module(module);
    if level > level_for(component) {
        return;
    }
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let _ = writeln!(file, "{}", format_line(timestamp, level, component, args));
    }
}

#[macro_export]
macro_rules! plog {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Info, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! plog_error {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Error, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! plog_warn {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Warn, module_path!(), format_args!($($arg)*))
    };
}

/// Only written in debug mode or when the component is raised to DEBUG.
#[macro_export]
macro_rules! plog_debug {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Debug, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! plog_trace {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Trace, module_path!(), format_args!($($arg)*))
    };
}
