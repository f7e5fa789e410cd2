//! # forge-renderer – templates in, PDF out
//!
//! A [`DocumentRenderer`] is configured through setters (fonts, page format,
//! title, logger, template paths, variables) and then renders:
//!
//! 1. **Engine session** – a fresh [`engine::PdfEngine`] built from the
//!    [`RenderConfig`] ([`engine`])
//! 2. **Templates** – header, footer, style and body rendered with the shared
//!    variables ([`template`])
//! 3. **Output** – body HTML written to the engine and delivered as bytes, a
//!    saved file, an HTTP-ready response, or echoed back as a preview
//!
//! The default backends are Handlebars for templates and a small block-flow
//! printpdf engine for PDF output; both sit behind traits.
//!
//! ```no_run
//! use forge_renderer::{DocumentRenderer, HostParameters};
//!
//! let mut renderer = DocumentRenderer::new(&HostParameters::new("/tmp"), None);
//! renderer.set_title("Invoice 2024-001");
//! renderer.add_variable_template("content", "<p>Total: 42.00</p>");
//! let pdf = renderer.render_pdf().unwrap();
//! assert!(pdf.starts_with(b"%PDF-"));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod renderer;
pub mod template;

// Re-exports for convenience
pub use config::{FontStyles, HostParameters, PageFormat, RenderConfig};
pub use engine::{Destination, Output, Response};
pub use error::{ConfigError, EngineError, RenderError, TemplateError};
pub use logger::{LogAdapter, LogSink, NullSink};
pub use renderer::{DocumentRenderer, Rendered};
pub use template::{HandlebarsEngine, TemplateRole, TemplateSource, Translator, Variables};
