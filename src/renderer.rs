//! [`DocumentRenderer`]: collects configuration through setters, renders the
//! body/header/footer/style templates and hands the HTML to a PDF engine.
//!
//! ```text
//! setters ─▶ render() ─▶ engine session ─▶ header ─▶ footer ─▶ style ─▶ body
//!                                                                        │
//!                                         preview HTML ◀─┬───────────────┘
//!                                                        └─▶ write_html ─▶ output
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::config::{FontStyles, HostParameters, PageFormat, RenderConfig};
use crate::engine::{Destination, EngineFactory, Output, PdfEngine, PrintPdfFactory};
use crate::error::{EngineError, RenderError};
use crate::logger::LogSink;
use crate::template::{
    FilterSet, HandlebarsEngine, TemplateEngine, TemplateRequest, TemplateRole, TemplateSource,
    Translator, Variables, STYLE_VARIABLE,
};

/// Result of [`DocumentRenderer::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// The body HTML, when rendering in preview mode.
    Preview(String),
    /// Whatever the engine's output step produced.
    Document(Output),
}

/// Template-driven PDF renderer.
///
/// Configure once, render any number of times; every render builds a fresh
/// engine session from the current configuration.
pub struct DocumentRenderer {
    config: RenderConfig,
    translator: Option<Arc<dyn Translator>>,
    filters: FilterSet,
    templates: Box<dyn TemplateEngine>,
    engine: Box<dyn EngineFactory>,

    body: TemplateSource,
    header: Option<TemplateSource>,
    footer: Option<TemplateSource>,
    style: Option<TemplateSource>,

    variables: Variables,
    logger: Option<Arc<dyn LogSink>>,
    title: Option<String>,
    font_directories: Vec<PathBuf>,
    show_image_errors: Option<bool>,
    debug: Option<bool>,
}

impl DocumentRenderer {
    /// Renderer backed by Handlebars and printpdf.
    pub fn new(params: &HostParameters, translator: Option<Arc<dyn Translator>>) -> Self {
        Self::with_backends(
            params,
            translator,
            Box::new(HandlebarsEngine::new()),
            Box::new(PrintPdfFactory),
        )
    }

    /// Renderer with caller-supplied template and PDF engines.
    pub fn with_backends(
        params: &HostParameters,
        translator: Option<Arc<dyn Translator>>,
        templates: Box<dyn TemplateEngine>,
        engine: Box<dyn EngineFactory>,
    ) -> Self {
        Self {
            config: params.render_config(),
            translator,
            filters: FilterSet::common(),
            templates,
            engine,
            body: TemplateSource::bundled(),
            header: None,
            footer: None,
            style: None,
            variables: Variables::new(),
            logger: None,
            title: None,
            font_directories: Vec::new(),
            show_image_errors: None,
            debug: None,
        }
    }

    // ── Templates ─────────────────────────────────────────────────────────

    /// Body template file. Replaces the bundled document template.
    pub fn set_template_path(&mut self, path: impl Into<PathBuf>) {
        self.set_template(TemplateRole::Body, TemplateSource::file(path));
    }

    /// Header template file, repeated on every page.
    pub fn set_template_path_header(&mut self, path: impl Into<PathBuf>) {
        self.set_template(TemplateRole::Header, TemplateSource::file(path));
    }

    /// Footer template file, repeated on every page.
    pub fn set_template_path_footer(&mut self, path: impl Into<PathBuf>) {
        self.set_template(TemplateRole::Footer, TemplateSource::file(path));
    }

    /// Style template file. Its output is bound to the body as `style`.
    pub fn set_template_path_style(&mut self, path: impl Into<PathBuf>) {
        self.set_template(TemplateRole::Style, TemplateSource::file(path));
    }

    /// Replace the source of one template role.
    pub fn set_template(&mut self, role: TemplateRole, source: TemplateSource) {
        match role {
            TemplateRole::Body => self.body = source,
            TemplateRole::Header => self.header = Some(source),
            TemplateRole::Footer => self.footer = Some(source),
            TemplateRole::Style => self.style = Some(source),
        }
    }

    /// Current source of `role`; the body always has one.
    pub fn template(&self, role: TemplateRole) -> Option<&TemplateSource> {
        match role {
            TemplateRole::Body => Some(&self.body),
            TemplateRole::Header => self.header.as_ref(),
            TemplateRole::Footer => self.footer.as_ref(),
            TemplateRole::Style => self.style.as_ref(),
        }
    }

    /// Bind a variable for every template role. Rebinding overwrites.
    pub fn add_variable_template(&mut self, name: &str, value: impl Into<Value>) {
        self.variables.insert(name.to_string(), value.into());
    }

    /// Variables bound so far, in insertion order.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Register an extra template filter, replacing one of the same name.
    pub fn add_filter<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(&[Value]) -> String + Send + Sync + 'static,
    {
        self.filters.add(name, filter);
    }

    // ── Engine settings ───────────────────────────────────────────────────

    /// Sink handed to every engine session.
    pub fn set_logger(&mut self, logger: Arc<dyn LogSink>) {
        self.logger = Some(logger);
    }

    /// Document title stored in the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Append a font directory. Directories are searched in the order added.
    pub fn add_font_directory(&mut self, dir: impl AsRef<Path>) {
        self.font_directories.push(dir.as_ref().to_path_buf());
    }

    /// Registered font directories, in search order.
    pub fn font_directories(&self) -> &[PathBuf] {
        &self.font_directories
    }

    /// Add a font family, replacing any earlier mapping for it.
    pub fn add_font(&mut self, name: &str, styles: FontStyles) {
        self.config.add_font(name, styles);
    }

    /// Page size and orientation.
    pub fn set_format(&mut self, format: PageFormat) {
        self.config.format = format;
    }

    /// Engine text mode; `c` restricts output to built-in fonts.
    pub fn set_mode(&mut self, mode: impl Into<String>) {
        self.config.mode = mode.into();
    }

    /// Set a raw engine config entry.
    pub fn add_config(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RenderError> {
        self.config.set(name, value.into())?;
        Ok(())
    }

    /// Cap on the nodes the engine may build from one HTML chunk.
    pub fn set_backtrack_limit(&mut self, limit: u64) {
        self.config.backtrack_limit = Some(limit);
    }

    /// Fail on unloadable images instead of skipping them.
    pub fn set_show_image_errors(&mut self, state: bool) {
        self.show_image_errors = Some(state);
    }

    /// Engine debug mode: font fallbacks become errors.
    pub fn set_debug(&mut self, state: bool) {
        self.debug = Some(state);
    }

    /// The config engine sessions are built from.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    // ── Rendering ─────────────────────────────────────────────────────────

    fn init_engine(&self) -> Result<Box<dyn PdfEngine>, RenderError> {
        let mut engine = self.engine.create(&self.config)?;

        if let Some(state) = self.show_image_errors {
            engine.set_show_image_errors(state);
        }
        if let Some(state) = self.debug {
            engine.set_debug(state);
        }
        for dir in &self.font_directories {
            engine.add_font_directory(dir)?;
        }
        if let Some(title) = &self.title {
            engine.set_title(title);
        }
        if let Some(logger) = &self.logger {
            engine.set_logger(Arc::clone(logger));
        }
        Ok(engine)
    }

    fn render_template(
        &self,
        source: Option<&TemplateSource>,
        variables: &Variables,
    ) -> Result<String, RenderError> {
        let html = self.templates.render(&TemplateRequest {
            source,
            variables,
            translator: self.translator.as_ref(),
            filters: &self.filters,
        })?;
        Ok(html)
    }

    /// Steps shared by every render: a configured engine session plus the
    /// body HTML. Header and footer are already installed on the session.
    fn prepare(&self) -> Result<(Box<dyn PdfEngine>, String), RenderError> {
        let mut engine = self.init_engine()?;
        let variables = self.variables.clone();

        if let Some(header) = &self.header {
            let html = self.render_template(Some(header), &variables)?;
            engine.set_html_header(&html)?;
        }
        if let Some(footer) = &self.footer {
            let html = self.render_template(Some(footer), &variables)?;
            engine.set_html_footer(&html)?;
        }

        let style = self.render_template(self.style.as_ref(), &variables)?;
        let mut body_variables = Variables::new();
        body_variables.insert(STYLE_VARIABLE.to_string(), Value::String(style));
        body_variables.extend(variables);

        let body = self.render_template(Some(&self.body), &body_variables)?;
        log::debug!(
            "rendered body template '{}' ({} bytes)",
            self.body.name(),
            body.len()
        );
        Ok((engine, body))
    }

    /// Render the configured templates.
    ///
    /// With `preview` the body HTML is returned and the engine never sees
    /// it. Otherwise the HTML is written to a fresh engine session and its
    /// output is returned; see [`crate::engine::resolve_destination`] for how
    /// an omitted file name or destination is filled in.
    pub fn render(
        &self,
        preview: bool,
        file_name: Option<&str>,
        destination: Option<Destination>,
    ) -> Result<Rendered, RenderError> {
        let (mut engine, body) = self.prepare()?;
        if preview {
            return Ok(Rendered::Preview(body));
        }

        engine.write_html(&body)?;
        let output = engine.output(file_name, destination)?;
        Ok(Rendered::Document(output))
    }

    /// Render and return the raw PDF bytes.
    pub fn render_pdf(&self) -> Result<Vec<u8>, RenderError> {
        let bytes = match self.render(false, None, Some(Destination::String))? {
            Rendered::Document(output) => output.into_bytes(),
            Rendered::Preview(_) => None,
        };
        bytes.ok_or_else(|| {
            RenderError::Engine(EngineError::Pdf(
                "engine returned no bytes for destination S".to_string(),
            ))
        })
    }

    /// Render in preview mode and return the body HTML.
    pub fn preview(&self) -> Result<String, RenderError> {
        let (_engine, body) = self.prepare()?;
        Ok(body)
    }
}
