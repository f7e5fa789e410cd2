//! Error types for configuration, templates, the PDF engine, and the
//! renderer that ties them together.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A configuration value could not be parsed or applied.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown page format '{0}'")]
    InvalidFormat(String),

    #[error("Unknown output destination '{0}' (expected one of I, D, F, S)")]
    InvalidDestination(String),

    #[error("Invalid value for config entry '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A template could not be loaded or evaluated.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Template '{name}' failed to render: {source}")]
    Render {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },
}

/// Failures raised by a PDF engine session.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Font directory '{}' is not usable: {reason}", path.display())]
    FontDirectory { path: PathBuf, reason: String },

    #[error("Font '{family}' could not be loaded: {reason}")]
    Font { family: String, reason: String },

    #[error("Image '{src}' could not be loaded: {reason}")]
    Image { src: String, reason: String },

    #[error("HTML exceeds the node limit of {limit}")]
    NodeLimit { limit: u64 },

    #[error("HTML nests deeper than {max} elements")]
    Depth { max: usize },

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Everything that can go wrong during [`crate::DocumentRenderer::render`].
///
/// Engine and template failures are carried unmodified.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("PDF engine error: {0}")]
    Engine(#[from] EngineError),
}
