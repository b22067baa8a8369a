//! Tracing setup with a log level that can be changed at runtime.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Levels offered on the configuration page
pub const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, thiserror::Error)]
pub enum LogLevelError {
    #[error("unknown log level: {0}")]
    Unknown(String),
    #[error("failed to reload log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle to the active level filter
pub struct LogLevelControl {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
    current: ArcSwap<String>,
}

impl LogLevelControl {
    /// Control that only remembers the level (no subscriber installed)
    pub fn detached(level: &str) -> Self {
        Self {
            handle: None,
            current: ArcSwap::from_pointee(level.to_string()),
        }
    }

    pub fn current(&self) -> String {
        self.current.load().as_ref().clone()
    }

    /// Replace the filter with a single global level
    pub fn set(&self, level: &str) -> Result<(), LogLevelError> {
        let level = level.trim().to_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(LogLevelError::Unknown(level));
        }

        if let Some(handle) = &self.handle {
            handle.reload(EnvFilter::new(&level))?;
        }
        self.current.store(Arc::new(level));
        Ok(())
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level` at startup; later changes go through
/// [`LogLevelControl::set`].
pub fn init(level: &str) -> LogLevelControl {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    LogLevelControl {
        handle: Some(handle),
        current: ArcSwap::from_pointee(level.to_string()),
    }
}
