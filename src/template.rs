//! Template side of the renderer: sources, variables, translator, filters,
//! and the [`TemplateEngine`] contract with its Handlebars implementation.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde_json::{Map, Value};

use crate::error::TemplateError;

/// Body template used until a path is set.
pub const DEFAULT_DOCUMENT_TEMPLATE: &str = include_str!("../templates/document.hbs");

/// Variables broadcast into every template role, in insertion order.
pub type Variables = Map<String, Value>;

/// Reserved body variable carrying the rendered style template.
pub const STYLE_VARIABLE: &str = "style";

/// Where a template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Inline { name: String, source: String },
}

impl TemplateSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        TemplateSource::File(path.into())
    }

    pub fn inline(name: impl Into<String>, source: impl Into<String>) -> Self {
        TemplateSource::Inline {
            name: name.into(),
            source: source.into(),
        }
    }

    /// The bundled document template.
    pub fn bundled() -> Self {
        Self::inline("document.hbs", DEFAULT_DOCUMENT_TEMPLATE)
    }

    /// Human-readable name for error messages.
    pub fn name(&self) -> String {
        match self {
            TemplateSource::File(path) => path.display().to_string(),
            TemplateSource::Inline { name, .. } => name.clone(),
        }
    }

    fn load(&self) -> Result<String, TemplateError> {
        match self {
            TemplateSource::File(path) => {
                fs::read_to_string(path).map_err(|source| TemplateError::Read {
                    path: path.clone(),
                    source,
                })
            }
            TemplateSource::Inline { source, .. } => Ok(source.clone()),
        }
    }
}

/// The four template roles a document is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateRole {
    Body,
    Header,
    Footer,
    Style,
}

impl fmt::Display for TemplateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TemplateRole::Body => "body",
            TemplateRole::Header => "header",
            TemplateRole::Footer => "footer",
            TemplateRole::Style => "style",
        })
    }
}

/// Message translation used by the `translate` helper.
pub trait Translator: Send + Sync {
    fn translate(&self, message: &str, count: Option<i64>) -> String;
}

/// A filter receives the evaluated helper parameters and returns plain text.
pub type Filter = Arc<dyn Fn(&[Value]) -> String + Send + Sync>;

/// Named filters installed into every template render.
#[derive(Clone, Default)]
pub struct FilterSet {
    filters: Vec<(String, Filter)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The filters every document template can rely on.
    pub fn common() -> Self {
        let mut set = Self::new();
        set.add("upper", |args: &[Value]| display(first(args)).to_uppercase());
        set.add("lower", |args: &[Value]| display(first(args)).to_lowercase());
        set.add("trim", |args: &[Value]| display(first(args)).trim().to_string());
        set.add("truncate", |args: &[Value]| {
            let text = display(first(args));
            let limit = args.get(1).and_then(Value::as_u64).unwrap_or(80) as usize;
            if text.chars().count() <= limit {
                return text;
            }
            let mut cut: String = text.chars().take(limit).collect();
            cut.push('\u{2026}');
            cut
        });
        set.add("default", |args: &[Value]| {
            let value = first(args);
            if is_blank(value) {
                args.get(1).map(display).unwrap_or_default()
            } else {
                display(value)
            }
        });
        set.add("number", |args: &[Value]| {
            let decimals = args.get(1).and_then(Value::as_u64).unwrap_or(0) as usize;
            match first(args) {
                Value::Number(n) => n
                    .as_f64()
                    .map(|v| format_number(v, decimals))
                    .unwrap_or_default(),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|v| format_number(v, decimals))
                    .unwrap_or_else(|_| s.clone()),
                other => display(other),
            }
        });
        set
    }

    /// Add or replace a filter.
    pub fn add<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(&[Value]) -> String + Send + Sync + 'static,
    {
        self.filters.retain(|(existing, _)| existing != name);
        self.filters.push((name.to_string(), Arc::new(filter)));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|(name, _)| name.as_str())
    }

    fn install(&self, registry: &mut Handlebars<'_>) {
        for (name, filter) in &self.filters {
            let filter = Arc::clone(filter);
            registry.register_helper(
                name,
                Box::new(
                    move |h: &Helper,
                          r: &Handlebars,
                          _: &Context,
                          _: &mut RenderContext,
                          out: &mut dyn Output|
                          -> HelperResult {
                        let args: Vec<Value> =
                            h.params().iter().map(|p| p.value().clone()).collect();
                        out.write(&(r.get_escape_fn())(&filter(&args)))?;
                        Ok(())
                    },
                ),
            );
        }
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn first(args: &[Value]) -> &Value {
    args.first().unwrap_or(&Value::Null)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Text form of a JSON value as templates print it.
fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// `1234567.891` with 2 decimals → `1,234,567.89`.
fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut result = String::new();
    if negative {
        result.push('-');
    }
    result.push_str(&grouped);
    if let Some(frac) = frac_part {
        result.push('.');
        result.push_str(frac);
    }
    result
}

/// Everything one template render needs.
pub struct TemplateRequest<'a> {
    /// `None` renders the empty template.
    pub source: Option<&'a TemplateSource>,
    pub variables: &'a Variables,
    pub translator: Option<&'a Arc<dyn Translator>>,
    pub filters: &'a FilterSet,
}

/// Renders a template source into an HTML string.
pub trait TemplateEngine {
    fn render(&self, request: &TemplateRequest<'_>) -> Result<String, TemplateError>;
}

/// [`TemplateEngine`] backed by Handlebars.
///
/// Values are HTML-escaped with `{{name}}` and emitted raw with
/// `{{{name}}}`. Filters are helpers (`{{upper name}}`), and the translator
/// is available as `{{translate "message"}}` or `{{t "message" count}}`.
#[derive(Debug, Clone, Default)]
pub struct HandlebarsEngine {
    strict: bool,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on variables that are referenced but not bound.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    fn registry(&self, request: &TemplateRequest<'_>) -> Handlebars<'static> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(self.strict);
        request.filters.install(&mut registry);

        let translator = request.translator.cloned();
        for name in ["translate", "t"] {
            let translator = translator.clone();
            registry.register_helper(
                name,
                Box::new(
                    move |h: &Helper,
                          r: &Handlebars,
                          _: &Context,
                          _: &mut RenderContext,
                          out: &mut dyn Output|
                          -> HelperResult {
                        let message = h.param(0).map(|p| display(p.value())).unwrap_or_default();
                        let count = h.param(1).and_then(|p| p.value().as_i64());
                        let text = match &translator {
                            Some(translator) => translator.translate(&message, count),
                            None => message,
                        };
                        out.write(&(r.get_escape_fn())(&text))?;
                        Ok(())
                    },
                ),
            );
        }
        registry
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn render(&self, request: &TemplateRequest<'_>) -> Result<String, TemplateError> {
        let Some(source) = request.source else {
            return Ok(String::new());
        };

        let text = source.load()?;
        let registry = self.registry(request);
        registry
            .render_template(&text, request.variables)
            .map_err(|source_err| TemplateError::Render {
                name: source.name(),
                source: source_err,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl Translator for Upper {
        fn translate(&self, message: &str, count: Option<i64>) -> String {
            match count {
                Some(n) => format!("{} ({n})", message.to_uppercase()),
                None => message.to_uppercase(),
            }
        }
    }

    fn render(
        source: &str,
        variables: &Variables,
        translator: Option<&Arc<dyn Translator>>,
    ) -> String {
        let source = TemplateSource::inline("test", source);
        let filters = FilterSet::common();
        HandlebarsEngine::new()
            .render(&TemplateRequest {
                source: Some(&source),
                variables,
                translator,
                filters: &filters,
            })
            .unwrap()
    }

    fn vars(value: Value) -> Variables {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_source_renders_empty() {
        let filters = FilterSet::common();
        let html = HandlebarsEngine::new()
            .render(&TemplateRequest {
                source: None,
                variables: &Variables::new(),
                translator: None,
                filters: &filters,
            })
            .unwrap();
        assert_eq!(html, "");
    }

    #[test]
    fn escapes_by_default_and_raw_on_triple_stash() {
        let v = vars(json!({ "x": "<b>hi</b>" }));
        assert_eq!(render("{{x}}", &v, None), "&lt;b&gt;hi&lt;/b&gt;");
        assert_eq!(render("{{{x}}}", &v, None), "<b>hi</b>");
    }

    #[test]
    fn common_filters() {
        let v = vars(json!({ "name": "  Ada  ", "total": 1234567.891, "empty": "" }));
        assert_eq!(render("{{upper name}}", &v, None), "  ADA  ");
        assert_eq!(render("[{{trim name}}]", &v, None), "[Ada]");
        assert_eq!(render("{{number total 2}}", &v, None), "1,234,567.89");
        assert_eq!(render("{{default empty \"n/a\"}}", &v, None), "n/a");
        assert_eq!(render("{{truncate \"abcdef\" 3}}", &v, None), "abc\u{2026}");
    }

    #[test]
    fn translator_helper() {
        let translator: Arc<dyn Translator> = Arc::new(Upper);
        let v = Variables::new();
        assert_eq!(render("{{translate \"total\"}}", &v, Some(&translator)), "TOTAL");
        assert_eq!(render("{{t \"items\" 3}}", &v, Some(&translator)), "ITEMS (3)");
        assert_eq!(render("{{t \"items\"}}", &v, None), "items");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let source = TemplateSource::file("/nonexistent/forge/body.hbs");
        let filters = FilterSet::new();
        let err = HandlebarsEngine::new()
            .render(&TemplateRequest {
                source: Some(&source),
                variables: &Variables::new(),
                translator: None,
                filters: &filters,
            })
            .unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
    }

    #[test]
    fn strict_mode_rejects_unbound_variables() {
        let source = TemplateSource::inline("strict", "{{missing}}");
        let filters = FilterSet::new();
        let result = HandlebarsEngine::strict().render(&TemplateRequest {
            source: Some(&source),
            variables: &Variables::new(),
            translator: None,
            filters: &filters,
        });
        assert!(matches!(result, Err(TemplateError::Render { .. })));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1000.0, 0), "1,000");
        assert_eq!(format_number(-1234.5, 1), "-1,234.5");
    }
}
