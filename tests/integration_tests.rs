//! Integration tests for the forge-renderer pipeline.
//!
//! These tests validate:
//! - The renderer drives the engine session in the documented order
//! - Optional templates are skipped when unset, and preview never outputs
//! - Variables reach every template role unchanged
//! - The printpdf engine produces valid PDF bytes and files

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use forge_renderer::config::{FontStyles, HostParameters, RenderConfig};
use forge_renderer::engine::dom::{parse_html, DomNode, Tag};
use forge_renderer::engine::{
    deliver, Destination, EngineFactory, Output, PdfEngine, Response,
};
use forge_renderer::error::{EngineError, RenderError};
use forge_renderer::logger::{LogAdapter, LogSink};
use forge_renderer::renderer::{DocumentRenderer, Rendered};
use forge_renderer::template::{HandlebarsEngine, TemplateRole, TemplateSource};
use log::Level;
use serde_json::json;

// =====================================================================
// Helpers
// =====================================================================

/// One call made on a recorded engine session.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create,
    ShowImageErrors(bool),
    Debug(bool),
    FontDirectory(PathBuf),
    Title(String),
    Logger,
    Header(String),
    Footer(String),
    WriteHtml(String),
    Output(Option<String>, Option<Destination>),
}

#[derive(Clone, Default)]
struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
    configs: Arc<Mutex<Vec<RenderConfig>>>,
}

impl Journal {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn last_config(&self) -> RenderConfig {
        self.configs.lock().unwrap().last().cloned().unwrap()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

struct RecordingFactory(Journal);

impl EngineFactory for RecordingFactory {
    fn create(&self, config: &RenderConfig) -> Result<Box<dyn PdfEngine>, EngineError> {
        self.0.configs.lock().unwrap().push(config.clone());
        self.0.push(Call::Create);
        Ok(Box::new(RecordingEngine {
            journal: self.0.clone(),
            logger: None,
        }))
    }
}

struct RecordingEngine {
    journal: Journal,
    logger: Option<Arc<dyn LogSink>>,
}

impl PdfEngine for RecordingEngine {
    fn set_show_image_errors(&mut self, state: bool) {
        self.journal.push(Call::ShowImageErrors(state));
    }

    fn set_debug(&mut self, state: bool) {
        self.journal.push(Call::Debug(state));
    }

    fn add_font_directory(&mut self, dir: &Path) -> Result<(), EngineError> {
        self.journal.push(Call::FontDirectory(dir.to_path_buf()));
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        self.journal.push(Call::Title(title.to_string()));
    }

    fn set_logger(&mut self, logger: Arc<dyn LogSink>) {
        self.journal.push(Call::Logger);
        self.logger = Some(logger);
    }

    fn set_html_header(&mut self, html: &str) -> Result<(), EngineError> {
        self.journal.push(Call::Header(html.to_string()));
        Ok(())
    }

    fn set_html_footer(&mut self, html: &str) -> Result<(), EngineError> {
        self.journal.push(Call::Footer(html.to_string()));
        Ok(())
    }

    fn write_html(&mut self, html: &str) -> Result<(), EngineError> {
        if let Some(logger) = &self.logger {
            logger.log(Level::Info, &format!("writing {} bytes", html.len()));
        }
        self.journal.push(Call::WriteHtml(html.to_string()));
        Ok(())
    }

    fn output(
        &mut self,
        file_name: Option<&str>,
        destination: Option<Destination>,
    ) -> Result<Output, EngineError> {
        self.journal.push(Call::Output(
            file_name.map(str::to_string),
            destination,
        ));
        deliver(
            b"%PDF-recorded".to_vec(),
            file_name,
            destination,
            &std::env::temp_dir(),
        )
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn params() -> HostParameters {
    HostParameters::new(std::env::temp_dir())
}

fn recorded() -> (DocumentRenderer, Journal) {
    init_logging();
    let journal = Journal::default();
    let renderer = DocumentRenderer::with_backends(
        &params(),
        None,
        Box::new(HandlebarsEngine::new()),
        Box::new(RecordingFactory(journal.clone())),
    );
    (renderer, journal)
}

fn inline(role: TemplateRole, source: &str) -> TemplateSource {
    TemplateSource::inline(role.to_string(), source)
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Engine session setup
// =====================================================================

#[test]
fn engine_is_initialised_in_order() {
    let (mut r, journal) = recorded();
    r.set_logger(Arc::new(LogAdapter::new()));
    r.set_title("Report");
    r.add_font_directory("/fonts/a");
    r.set_debug(true);
    r.set_show_image_errors(false);

    r.render(false, None, Some(Destination::String)).unwrap();
    let calls = journal.calls();
    assert_eq!(
        &calls[..6],
        &[
            Call::Create,
            Call::ShowImageErrors(false),
            Call::Debug(true),
            Call::FontDirectory(PathBuf::from("/fonts/a")),
            Call::Title("Report".to_string()),
            Call::Logger,
        ]
    );
}

#[test]
fn unset_settings_are_not_forwarded() {
    let (r, journal) = recorded();
    r.render(false, None, None).unwrap();
    let calls = journal.calls();
    assert_eq!(calls[0], Call::Create);
    assert!(matches!(calls[1], Call::WriteHtml(_)));
    assert_eq!(calls[2], Call::Output(None, None));
    assert_eq!(calls.len(), 3);
}

#[test]
fn font_directories_are_registered_in_call_order() {
    let (mut r, journal) = recorded();
    r.add_font_directory("/fonts/first");
    r.add_font_directory("/fonts/second");
    r.preview().unwrap();

    let dirs: Vec<PathBuf> = journal
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::FontDirectory(dir) => Some(dir),
            _ => None,
        })
        .collect();
    assert_eq!(
        dirs,
        vec![PathBuf::from("/fonts/first"), PathBuf::from("/fonts/second")]
    );
}

#[test]
fn readding_a_font_family_keeps_the_later_mapping() {
    let (mut r, journal) = recorded();
    r.add_font("Brand", FontStyles::regular("Brand-Old.ttf"));
    r.add_font("brand", FontStyles::regular("Brand.ttf").with_bold("Brand-Bold.ttf"));
    r.preview().unwrap();

    let config = journal.last_config();
    let styles = &config.font_data["brand"];
    assert_eq!(styles.file_for(false, false), Some("Brand.ttf"));
    assert_eq!(styles.file_for(true, false), Some("Brand-Bold.ttf"));
    assert!(config.font_data.contains_key("dejavusans"));
}

#[test]
fn backtrack_limit_travels_with_the_config() {
    let (mut r, journal) = recorded();
    r.set_backtrack_limit(10_000);
    r.preview().unwrap();
    assert_eq!(journal.last_config().backtrack_limit, Some(10_000));
}

#[test]
fn logger_is_set_once_and_forwards() {
    let (mut r, journal) = recorded();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let lines = Arc::clone(&lines);
        move |level: Level, message: &str| {
            lines.lock().unwrap().push((level, message.to_string()));
        }
    };
    r.set_logger(Arc::new(sink));
    r.render(false, None, Some(Destination::String)).unwrap();

    let logger_calls = journal
        .calls()
        .iter()
        .filter(|c| **c == Call::Logger)
        .count();
    assert_eq!(logger_calls, 1);

    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].0, Level::Info);
    assert!(lines[0].1.starts_with("writing "));
}

// =====================================================================
// Template roles
// =====================================================================

#[test]
fn unset_header_footer_and_style_are_skipped() {
    let (mut r, journal) = recorded();
    r.set_template(TemplateRole::Body, inline(TemplateRole::Body, "<p>[{{style}}]</p>"));
    r.render(false, None, Some(Destination::String)).unwrap();

    let calls = journal.calls();
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::Header(_) | Call::Footer(_))));
    assert!(calls.contains(&Call::WriteHtml("<p>[]</p>".to_string())));
}

#[test]
fn preview_never_writes_or_outputs() {
    let (mut r, journal) = recorded();
    r.set_template(TemplateRole::Header, inline(TemplateRole::Header, "<p>head</p>"));
    r.add_variable_template("content", "<p>Body</p>");

    match r.render(true, Some("ignored.pdf"), Some(Destination::File)).unwrap() {
        Rendered::Preview(html) => assert!(html.contains("<div><p>Body</p></div>")),
        other => panic!("Expected preview, got {other:?}"),
    }

    let calls = journal.calls();
    assert!(calls.contains(&Call::Header("<p>head</p>".to_string())));
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::WriteHtml(_) | Call::Output(..))));
}

#[test]
fn variables_reach_every_role_unchanged() {
    let (mut r, journal) = recorded();
    let show = "{{customer.name}}|{{total}}|{{join tags}}";
    r.add_filter("join", |args| match args.first() {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    });
    r.set_template(TemplateRole::Header, inline(TemplateRole::Header, show));
    r.set_template(TemplateRole::Footer, inline(TemplateRole::Footer, show));
    r.set_template(TemplateRole::Style, inline(TemplateRole::Style, show));
    r.set_template(
        TemplateRole::Body,
        inline(TemplateRole::Body, &format!("{show}/{{{{{{style}}}}}}")),
    );
    r.add_variable_template("customer", json!({"name": "Ada"}));
    r.add_variable_template("total", 42);
    r.add_variable_template("tags", json!(["a", "b"]));

    r.render(false, None, Some(Destination::String)).unwrap();

    let expected = "Ada|42|a,b";
    let calls = journal.calls();
    assert!(calls.contains(&Call::Header(expected.to_string())));
    assert!(calls.contains(&Call::Footer(expected.to_string())));
    assert!(calls.contains(&Call::WriteHtml(format!("{expected}/{expected}"))));
}

#[test]
fn template_errors_propagate_unmodified() {
    let (mut r, journal) = recorded();
    r.set_template_path_footer("/nonexistent/forge/footer.hbs");
    let err = r.render(false, None, None).unwrap_err();
    assert!(matches!(err, RenderError::Template(_)));
    assert!(!journal
        .calls()
        .iter()
        .any(|c| matches!(c, Call::WriteHtml(_))));
}

#[test]
fn templates_load_from_files() {
    let (mut r, journal) = recorded();
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("header.hbs");
    let body = dir.path().join("body.hbs");
    std::fs::write(&header, "<p>{{t \"Invoice\"}} {{upper company}}</p>").unwrap();
    std::fs::write(&body, "<p>{{number amount 2}}</p>").unwrap();

    r.set_template_path_header(&header);
    r.set_template_path(&body);
    r.add_variable_template("company", "acme");
    r.add_variable_template("amount", 1234.5);
    r.render(false, None, Some(Destination::String)).unwrap();

    let calls = journal.calls();
    assert!(calls.contains(&Call::Header("<p>Invoice ACME</p>".to_string())));
    assert!(calls.contains(&Call::WriteHtml("<p>1,234.50</p>".to_string())));
}

// =====================================================================
// Output destinations
// =====================================================================

#[test]
fn default_output_is_an_inline_response() {
    let (r, _journal) = recorded();
    match r.render(false, None, None).unwrap() {
        Rendered::Document(Output::Response(Response {
            file_name, body, ..
        })) => {
            assert_eq!(file_name, "document.pdf");
            assert_eq!(body, b"%PDF-recorded");
        }
        other => panic!("Expected inline response, got {other:?}"),
    }
}

#[test]
fn file_name_without_destination_saves_a_file() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("report.pdf");

    let mut r = DocumentRenderer::new(&HostParameters::new(dir.path().join("tmp")), None);
    r.add_variable_template("content", "<p>Saved to disk</p>");
    let rendered = r.render(false, target.to_str(), None).unwrap();

    assert_eq!(rendered, Rendered::Document(Output::Saved(target.clone())));
    assert_valid_pdf(&std::fs::read(&target).unwrap());
}

// =====================================================================
// printpdf engine end to end
// =====================================================================

#[test]
fn parse_block_subset() {
    let dom = parse_html("<h2>Title</h2><p>Hello <b>world</b></p>", None).unwrap();
    assert_eq!(dom.len(), 2);
    match &dom[0] {
        DomNode::Element(e) => assert_eq!(e.tag, Tag::Heading(2)),
        other => panic!("Expected element, got {other:?}"),
    }
}

#[test]
fn full_document_renders_to_pdf() {
    init_logging();
    let mut r = DocumentRenderer::new(&params(), None);
    r.set_title("Invoice");
    r.set_logger(Arc::new(LogAdapter::new()));
    r.set_template(
        TemplateRole::Header,
        inline(TemplateRole::Header, "<p>{{company}} page {PAGENO} of {nbpg}</p>"),
    );
    r.set_template(TemplateRole::Footer, inline(TemplateRole::Footer, "<hr><p>Thank you</p>"));
    r.set_template(TemplateRole::Style, inline(TemplateRole::Style, "p { margin: 0; }"));
    r.add_variable_template("company", "ACME");

    let rows: String = (1..=80)
        .map(|i| format!("<tr><td>Item {i}</td><td>{i}.00</td></tr>"))
        .collect();
    r.add_variable_template(
        "content",
        format!(
            "<table><tr><th>Item</th><th>Price</th></tr>{rows}</table>\
             <pagebreak><ul><li>Done</li></ul>"
        ),
    );

    let bytes = r.render_pdf().unwrap();
    assert_valid_pdf(&bytes);
}

#[test]
fn node_limit_is_an_engine_error() {
    init_logging();
    let mut r = DocumentRenderer::new(&params(), None);
    r.set_backtrack_limit(3);
    r.add_variable_template("content", "<p>a</p><p>b</p><p>c</p><p>d</p>");
    let err = r.render_pdf().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Engine(EngineError::NodeLimit { limit: 3 })
    ));
}

fn fixture_fonts() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fonts")
}

#[test]
fn fontdata_family_is_embedded() {
    init_logging();
    let mut r = DocumentRenderer::new(&params(), None);
    r.add_font_directory(fixture_fonts());
    r.add_font("Tuffy", FontStyles::regular("Tuffy.ttf"));
    r.add_config("default_font", "tuffy").unwrap();
    r.set_debug(true);
    r.add_variable_template(
        "content",
        "<h2>Embedded</h2><p>Regular and <b>bold</b> fall back to one face: caf\u{e9}</p>",
    );

    let bytes = r.render_pdf().unwrap();
    assert_valid_pdf(&bytes);
    assert!(
        bytes.windows(b"FontFile".len()).any(|w| w == b"FontFile"),
        "Embedded font program missing"
    );
}

#[test]
fn fontdata_family_missing_from_directories_fails_in_debug() {
    init_logging();
    let mut r = DocumentRenderer::new(&params(), None);
    r.add_font_directory(fixture_fonts());
    r.add_font("brand", FontStyles::regular("Brand.ttf"));
    r.add_config("default_font", "brand").unwrap();
    r.set_debug(true);
    let err = r.render_pdf().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Engine(EngineError::Font { ref family, .. }) if family == "brand"
    ));
}

#[test]
fn deeply_nested_content_is_an_engine_error() {
    init_logging();
    let mut r = DocumentRenderer::new(&params(), None);
    r.set_backtrack_limit(1000);
    r.add_variable_template("content", "<div>".repeat(200_000));
    let err = r.render_pdf().unwrap_err();
    assert!(matches!(err, RenderError::Engine(EngineError::Depth { .. })));
}

#[test]
fn core_mode_renders_with_builtin_fonts() {
    init_logging();
    let mut r = DocumentRenderer::new(&params(), None);
    r.set_mode("c");
    r.add_config("default_font", "dejavusans").unwrap();
    r.set_format("A5-L".parse().unwrap());
    r.add_variable_template("content", "<p>Core fonts only: caf\u{e9} \u{20ac}5</p>");
    assert_valid_pdf(&r.render_pdf().unwrap());
}

#[test]
fn host_parameters_from_json() {
    let params = HostParameters::from_json(r#"{"tempDir": "/var/tmp/forge", "appDir": "/app"}"#)
        .unwrap();
    assert_eq!(params.temp_dir, PathBuf::from("/var/tmp/forge"));
    assert_eq!(params.extra["appDir"], json!("/app"));
    assert_eq!(params.render_config().temp_dir, PathBuf::from("/var/tmp/forge"));
}
