//! The default PDF engine: block-flow layout drawn with `printpdf`
//! (v0.8 ops-based API).
//!
//! HTML written to a session is parsed and flattened into blocks right away;
//! fonts, pagination and drawing happen in [`PdfEngine::output`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use log::Level;
use printpdf::font::ParsedFont;
use printpdf::*;

use crate::config::RenderConfig;
use crate::engine::dom::{body_children, parse_html};
use crate::engine::flow::{
    collect_blocks, layout_band, paginate, substitute_page_numbers, Block, Geometry, Placed,
    TextStyle,
};
use crate::engine::fonts::{BuiltinFamily, DocumentFont, FontBook, FontFace};
use crate::engine::{deliver, Destination, EngineFactory, Output, PdfEngine};
use crate::error::EngineError;
use crate::logger::{LogSink, NullSink};

const PT_TO_MM: f32 = 0.352778;

/// Builds [`PrintPdfEngine`] sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintPdfFactory;

impl EngineFactory for PrintPdfFactory {
    fn create(&self, config: &RenderConfig) -> Result<Box<dyn PdfEngine>, EngineError> {
        Ok(Box::new(PrintPdfEngine::new(config.clone())))
    }
}

/// A decoded image with its pixel dimensions.
struct ImageSource {
    bytes: Vec<u8>,
    px_width: u32,
    px_height: u32,
}

/// One printpdf-backed engine session.
pub struct PrintPdfEngine {
    config: RenderConfig,
    show_image_errors: bool,
    debug: bool,
    fonts: FontBook,
    title: String,
    logger: Arc<dyn LogSink>,
    header: Vec<Block>,
    footer: Vec<Block>,
    body: Vec<Block>,
    images: HashMap<String, ImageSource>,
}

impl PrintPdfEngine {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            show_image_errors: false,
            debug: false,
            fonts: FontBook::new(),
            title: String::new(),
            logger: Arc::new(NullSink),
            header: Vec::new(),
            footer: Vec::new(),
            body: Vec::new(),
            images: HashMap::new(),
        }
    }

    fn log(&self, level: Level, message: &str) {
        self.logger.log(level, message);
    }

    /// Parse HTML into blocks and load the images it references.
    fn ingest(&mut self, html: &str) -> Result<Vec<Block>, EngineError> {
        let nodes = body_children(parse_html(html, self.config.backtrack_limit)?);
        let blocks = collect_blocks(&nodes);
        if self.debug {
            self.log(Level::Debug, &format!("parsed {} block(s)", blocks.len()));
        }

        for block in &blocks {
            let Block::Image { src, .. } = block else {
                continue;
            };
            if self.images.contains_key(src) {
                continue;
            }
            match load_image(src) {
                Ok(image) => {
                    self.images.insert(src.clone(), image);
                }
                Err(reason) if self.show_image_errors => {
                    return Err(EngineError::Image {
                        src: preview(src).to_string(),
                        reason,
                    });
                }
                Err(reason) => {
                    self.log(
                        Level::Warn,
                        &format!("Skipping image {:?}: {reason}", preview(src)),
                    );
                }
            }
        }
        Ok(blocks)
    }

    /// Pick the document font from `default_font`.
    fn resolve_font(&self) -> Result<DocumentFont, EngineError> {
        let family = self
            .config
            .option_str("default_font")
            .unwrap_or("helvetica")
            .to_ascii_lowercase();

        if let Some(builtin) = BuiltinFamily::from_name(&family) {
            return Ok(DocumentFont::Builtin(builtin));
        }

        if self.config.is_core_mode() {
            self.log(
                Level::Warn,
                &format!("core mode: '{family}' replaced by helvetica"),
            );
            return Ok(DocumentFont::Builtin(BuiltinFamily::Helvetica));
        }

        let loaded = match self.config.font_data.get(&family) {
            Some(styles) => self.fonts.load_family(&family, styles),
            None => Err(EngineError::Font {
                family: family.clone(),
                reason: "not present in fontdata".to_string(),
            }),
        };

        match loaded {
            Ok(embedded) => Ok(DocumentFont::Embedded(embedded)),
            Err(e) if self.debug => Err(e),
            Err(e) => {
                self.log(Level::Warn, &format!("{e}; falling back to helvetica"));
                Ok(DocumentFont::Builtin(BuiltinFamily::Helvetica))
            }
        }
    }

    fn render_document(&self) -> Result<Vec<u8>, EngineError> {
        let font = self.resolve_font()?;
        let geometry = Geometry::from_config(&self.config);
        let dims: HashMap<String, (u32, u32)> = self
            .images
            .iter()
            .map(|(src, img)| (src.clone(), (img.px_width, img.px_height)))
            .collect();

        let layouts = paginate(&self.body, geometry, &font, &dims);
        let total = layouts.len();

        let mut doc = PdfDocument::new(&self.title);
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let fonts = self.register_fonts(&mut doc, &font, &mut warnings)?;
        let images = self.register_images(&mut doc, &mut warnings)?;

        let page_w = Mm(geometry.page_width * PT_TO_MM);
        let page_h = Mm(geometry.page_height * PT_TO_MM);
        let mut pages = Vec::with_capacity(total);

        for (index, layout) in layouts.iter().enumerate() {
            let mut ops = Vec::new();
            for (band, is_footer) in [(&self.header, false), (&self.footer, true)] {
                if band.is_empty() {
                    continue;
                }
                let blocks = substitute_page_numbers(band, index + 1, total);
                for item in layout_band(&blocks, geometry, &font, &dims, is_footer) {
                    draw_item(&mut ops, &item, geometry.page_height, &font, &fonts, &images);
                }
            }
            for item in &layout.items {
                draw_item(&mut ops, item, geometry.page_height, &font, &fonts, &images);
            }
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);

        if self.debug && !warnings.is_empty() {
            self.log(
                Level::Debug,
                &format!("printpdf reported {} warning(s)", warnings.len()),
            );
        }
        self.log(
            Level::Info,
            &format!(
                "rendered {total} page(s) in {}, {} bytes",
                font.name(),
                bytes.len()
            ),
        );
        Ok(bytes)
    }

    fn register_fonts(
        &self,
        doc: &mut PdfDocument,
        font: &DocumentFont,
        warnings: &mut Vec<PdfWarnMsg>,
    ) -> Result<PdfFonts, EngineError> {
        let family = match font {
            DocumentFont::Builtin(builtin) => return Ok(PdfFonts::Builtin(*builtin)),
            DocumentFont::Embedded(family) => family,
        };

        let mut by_face: HashMap<*const FontFace, FontId> = HashMap::new();
        let mut ids = HashMap::new();
        for (style, face) in family.faces() {
            let id = match by_face.get(&Arc::as_ptr(face)) {
                Some(id) => id.clone(),
                None => {
                    let parsed = ParsedFont::from_bytes(&face.bytes, 0, warnings).ok_or_else(
                        || EngineError::Font {
                            family: family.family.clone(),
                            reason: "printpdf could not parse the font".to_string(),
                        },
                    )?;
                    let id = doc.add_font(&parsed);
                    by_face.insert(Arc::as_ptr(face), id.clone());
                    id
                }
            };
            ids.insert(style, id);
        }
        Ok(PdfFonts::Embedded(ids))
    }

    fn register_images(
        &self,
        doc: &mut PdfDocument,
        warnings: &mut Vec<PdfWarnMsg>,
    ) -> Result<HashMap<String, ImageResource>, EngineError> {
        let mut resources = HashMap::new();
        for (src, image) in &self.images {
            match RawImage::decode_from_bytes(&image.bytes, warnings) {
                Ok(raw) => {
                    resources.insert(
                        src.clone(),
                        ImageResource {
                            xobj_id: doc.add_image(&raw),
                            px_width: image.px_width,
                            px_height: image.px_height,
                        },
                    );
                }
                Err(e) if self.show_image_errors => {
                    return Err(EngineError::Image {
                        src: preview(src).to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    self.log(
                        Level::Warn,
                        &format!("Skipping image {:?}: PDF encode error: {e}", preview(src)),
                    );
                }
            }
        }
        Ok(resources)
    }
}

impl PdfEngine for PrintPdfEngine {
    fn set_show_image_errors(&mut self, state: bool) {
        self.show_image_errors = state;
    }

    fn set_debug(&mut self, state: bool) {
        self.debug = state;
    }

    fn add_font_directory(&mut self, dir: &Path) -> Result<(), EngineError> {
        self.fonts.add_directory(dir)
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_logger(&mut self, logger: Arc<dyn LogSink>) {
        self.logger = logger;
    }

    fn set_html_header(&mut self, html: &str) -> Result<(), EngineError> {
        self.header = self.ingest(html)?;
        Ok(())
    }

    fn set_html_footer(&mut self, html: &str) -> Result<(), EngineError> {
        self.footer = self.ingest(html)?;
        Ok(())
    }

    fn write_html(&mut self, html: &str) -> Result<(), EngineError> {
        let blocks = self.ingest(html)?;
        self.body.extend(blocks);
        Ok(())
    }

    fn output(
        &mut self,
        file_name: Option<&str>,
        destination: Option<Destination>,
    ) -> Result<Output, EngineError> {
        let bytes = self.render_document()?;
        deliver(bytes, file_name, destination, &self.config.temp_dir)
    }
}

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Font handles for drawing.
enum PdfFonts {
    Builtin(BuiltinFamily),
    Embedded(HashMap<(bool, bool), FontId>),
}

fn black() -> Color {
    Color::Rgb(Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Emit PDF ops for one placed item. Layout `y` is measured from the top of
/// the page; PDF space starts at the bottom.
fn draw_item(
    ops: &mut Vec<Op>,
    item: &Placed,
    page_height: f32,
    font: &DocumentFont,
    fonts: &PdfFonts,
    images: &HashMap<String, ImageResource>,
) {
    match item {
        Placed::Text { x, y, text, style } => {
            let ascent = style.size * font.ascent(style.bold, style.italic);
            let baseline = page_height - y - ascent;
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(*x),
                    y: Pt(baseline),
                },
            });
            ops.push(Op::SetFillColor { col: black() });
            write_text(ops, text, style, fonts);
            ops.push(Op::EndTextSection);
        }
        Placed::Rule { x1, x2, y } => {
            let pdf_y = page_height - y;
            ops.push(Op::SetOutlineColor { col: black() });
            ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![point(*x1, pdf_y), point(*x2, pdf_y)],
                    is_closed: false,
                },
            });
        }
        Placed::Image {
            src,
            x,
            y,
            width,
            height,
        } => {
            let Some(res) = images.get(src) else {
                return;
            };
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if res.px_width > 0 {
                width / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                height / res.px_height as f32
            } else {
                1.0
            };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(*x)),
                    translate_y: Some(Pt(page_height - y - height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

fn write_text(ops: &mut Vec<Op>, text: &str, style: &TextStyle, fonts: &PdfFonts) {
    match fonts {
        PdfFonts::Builtin(family) => {
            let font = family.font(style.bold, style.italic);
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(style.size),
                font,
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_winlatin(text))],
                font,
            });
        }
        PdfFonts::Embedded(ids) => {
            let Some(id) = ids
                .get(&(style.bold, style.italic))
                .or_else(|| ids.get(&(false, false)))
            else {
                return;
            };
            ops.push(Op::SetFontSize {
                size: Pt(style.size),
                font: id.clone(),
            });
            ops.push(Op::WriteText {
                items: vec![TextItem::Text(text.to_string())],
                font: id.clone(),
            });
        }
    }
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: not valid UTF-8 whenever a byte >= 0x80 does not happen to form
    // a UTF-8 sequence with its neighbours (e.g. a lone 0xE9). The string is
    // only handed to printpdf, whose WinAnsiEncoding path copies the bytes
    // into the content stream without inspecting them as UTF-8.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

/// Load image bytes from a data URI or a local path and read its size.
fn load_image(src: &str) -> Result<ImageSource, String> {
    let bytes = if src.starts_with("data:") {
        parse_data_uri(src)?
    } else if src.starts_with("http://") || src.starts_with("https://") {
        return Err("remote images are not fetched".to_string());
    } else {
        let path = src.strip_prefix("file://").unwrap_or(src);
        fs::read(path).map_err(|e| format!("{path}: {e}"))?
    };

    let decoded = ::image::load_from_memory(&bytes).map_err(|e| format!("decode error: {e}"))?;
    Ok(ImageSource {
        px_width: decoded.width(),
        px_height: decoded.height(),
        bytes,
    })
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or("not a data URI")?;
    let (header, data) = rest
        .split_once(',')
        .ok_or("invalid data URI: missing `,` separator")?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Shorten long sources (data URIs) for messages.
fn preview(src: &str) -> &str {
    match src.char_indices().nth(80) {
        Some((idx, _)) => &src[..idx],
        None => src,
    }
}
