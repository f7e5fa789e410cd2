//! Logger sink handed to the PDF engine.
//!
//! Engines only know the generic `log(level, message)` capability. The
//! [`LogAdapter`] forwards those calls into the `log` facade (or an explicit
//! `log::Log` backend) so engine output lands in the application's logger.

use std::sync::Arc;

use log::{Level, Log, Record};

/// Target used by [`LogAdapter::new`].
pub const DEFAULT_TARGET: &str = "forge_renderer::engine";

/// Anything that accepts a level and a message.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(Level, &str) + Send + Sync,
{
    fn log(&self, level: Level, message: &str) {
        self(level, message)
    }
}

/// Discards everything. Engines use it until a logger is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Forwards sink calls to a structured `log` backend.
pub struct LogAdapter {
    target: String,
    backend: Option<Arc<dyn Log>>,
}

impl LogAdapter {
    /// Forward to the global `log` facade.
    pub fn new() -> Self {
        Self::with_target(DEFAULT_TARGET)
    }

    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            backend: None,
        }
    }

    /// Forward to an explicit backend instead of the global logger.
    pub fn with_backend(backend: Arc<dyn Log>) -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            backend: Some(backend),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for LogAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for LogAdapter {
    fn log(&self, level: Level, message: &str) {
        match &self.backend {
            Some(backend) => backend.log(
                &Record::builder()
                    .args(format_args!("{message}"))
                    .level(level)
                    .target(&self.target)
                    .build(),
            ),
            None => log::log!(target: self.target.as_str(), level, "{message}"),
        }
    }
}
