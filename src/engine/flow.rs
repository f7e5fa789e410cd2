//! Block flow – flattens the DOM into blocks and stacks them onto pages.
//!
//! Handles:
//! - Paragraphs, headings, list items with markers, table rows as
//!   equal-width columns, rules, images
//! - Greedy word wrap within the content width
//! - Page breaks on overflow, `<pagebreak>` and `page-break-before/after`
//! - Header/footer bands with `{PAGENO}` / `{nbpg}` substitution

use std::collections::HashMap;

use crate::config::RenderConfig;
use crate::engine::dom::{DomNode, ElementNode, Tag};
use crate::engine::fonts::DocumentFont;

/// Body text size in points.
pub const BASE_FONT_SIZE: f32 = 11.0;

const LINE_HEIGHT_FACTOR: f32 = 1.2;
const PX_TO_PT: f32 = 0.75;
const MM_TO_PT: f32 = 72.0 / 25.4;
const LIST_INDENT: f32 = 18.0;
const CELL_PADDING: f32 = 3.0;

/// Page number placeholder in header/footer HTML.
pub const PAGE_NUMBER: &str = "{PAGENO}";
/// Page count placeholder in header/footer HTML.
pub const PAGE_COUNT: &str = "{nbpg}";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: BASE_FONT_SIZE,
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text {
        text: String,
        style: TextStyle,
        indent: f32,
        marker: Option<String>,
        space_after: f32,
    },
    Row {
        cells: Vec<String>,
        header: bool,
    },
    Image {
        src: String,
        width: Option<f32>,
        height: Option<f32>,
    },
    Rule,
    PageBreak,
}

impl Block {
    fn map_text(&self, f: &impl Fn(&str) -> String) -> Block {
        match self {
            Block::Text {
                text,
                style,
                indent,
                marker,
                space_after,
            } => Block::Text {
                text: f(text),
                style: *style,
                indent: *indent,
                marker: marker.clone(),
                space_after: *space_after,
            },
            Block::Row { cells, header } => Block::Row {
                cells: cells.iter().map(|c| f(c)).collect(),
                header: *header,
            },
            other => other.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// DOM → blocks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InlineBuffer {
    text: String,
    all_bold: bool,
    all_italic: bool,
    has_text: bool,
}

impl InlineBuffer {
    fn push(&mut self, text: &str, bold: bool, italic: bool) {
        if !text.trim().is_empty() {
            if self.has_text {
                self.all_bold &= bold;
                self.all_italic &= italic;
            } else {
                self.all_bold = bold;
                self.all_italic = italic;
            }
            self.has_text = true;
        }
        self.text.push_str(text);
    }

    fn take(&mut self) -> Option<(String, bool, bool)> {
        let raw = std::mem::take(&mut self.text);
        let had_text = std::mem::replace(&mut self.has_text, false);
        if !had_text {
            return None;
        }
        let text = raw
            .split('\n')
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
            .trim_matches('\n')
            .to_string();
        Some((text, self.all_bold, self.all_italic))
    }
}

#[derive(Clone, Copy)]
struct Context {
    style: TextStyle,
    indent: f32,
    space_after: f32,
}

struct Collector {
    blocks: Vec<Block>,
    inline: InlineBuffer,
}

/// Flatten parsed DOM nodes into flow blocks.
pub fn collect_blocks(nodes: &[DomNode]) -> Vec<Block> {
    let mut collector = Collector {
        blocks: Vec::new(),
        inline: InlineBuffer::default(),
    };
    let ctx = Context {
        style: TextStyle::default(),
        indent: 0.0,
        space_after: 0.0,
    };
    for node in nodes {
        collector.visit(node, ctx);
    }
    collector.flush(ctx, None);
    collector.blocks
}

impl Collector {
    fn flush(&mut self, ctx: Context, marker: Option<String>) {
        if let Some((text, bold, italic)) = self.inline.take() {
            self.blocks.push(Block::Text {
                text,
                style: TextStyle {
                    size: ctx.style.size,
                    bold: ctx.style.bold || bold,
                    italic: ctx.style.italic || italic,
                },
                indent: ctx.indent,
                marker,
                space_after: ctx.space_after,
            });
        }
    }

    fn visit(&mut self, node: &DomNode, ctx: Context) {
        match node {
            DomNode::Text(text) => self.inline.push(text, ctx.style.bold, ctx.style.italic),
            DomNode::Element(e) => self.visit_element(e, ctx),
        }
    }

    fn visit_element(&mut self, e: &ElementNode, ctx: Context) {
        if e.tag.is_inline() {
            self.visit_inline(e, ctx);
            return;
        }

        match e.tag {
            Tag::Head | Tag::Skipped => return,
            Tag::Hr => {
                self.flush(ctx, None);
                self.blocks.push(Block::Rule);
                return;
            }
            Tag::PageBreak => {
                self.flush(ctx, None);
                self.blocks.push(Block::PageBreak);
                return;
            }
            Tag::Img => {
                self.flush(ctx, None);
                if let Some(src) = e.attr("src") {
                    self.blocks.push(Block::Image {
                        src: src.to_string(),
                        width: dimension(e, "width"),
                        height: dimension(e, "height"),
                    });
                }
                return;
            }
            _ => {}
        }

        self.flush(ctx, None);
        if has_break(e, "page-break-before") {
            self.blocks.push(Block::PageBreak);
        }

        match e.tag {
            Tag::Heading(level) => {
                let inner = Context {
                    style: TextStyle {
                        size: heading_size(level),
                        bold: true,
                        italic: ctx.style.italic,
                    },
                    space_after: heading_size(level) * 0.5,
                    ..ctx
                };
                self.visit_children(e, inner);
                self.flush(inner, None);
            }
            Tag::P => {
                let inner = Context {
                    space_after: ctx.style.size * 0.6,
                    ..ctx
                };
                self.visit_children(e, inner);
                self.flush(inner, None);
            }
            Tag::Ul | Tag::Ol => {
                let inner = Context {
                    indent: ctx.indent + LIST_INDENT,
                    ..ctx
                };
                let ordered = e.tag == Tag::Ol;
                let mut number = 0;
                for child in &e.children {
                    match child {
                        DomNode::Element(li) if li.tag == Tag::Li => {
                            number += 1;
                            let marker = if ordered {
                                format!("{number}.")
                            } else {
                                "\u{2022}".to_string()
                            };
                            self.visit_list_item(li, inner, marker);
                        }
                        other => self.visit(other, inner),
                    }
                }
                self.flush(inner, None);
                if let Some(Block::Text { space_after, .. }) = self.blocks.last_mut() {
                    *space_after = space_after.max(ctx.style.size * 0.6);
                }
            }
            Tag::Li => self.visit_list_item(e, ctx, "\u{2022}".to_string()),
            Tag::Table => {
                self.collect_rows(e);
                if let Some(Block::Row { .. }) = self.blocks.last() {
                    self.blocks.push(Block::Text {
                        text: String::new(),
                        style: ctx.style,
                        indent: 0.0,
                        marker: None,
                        space_after: 0.0,
                    });
                }
            }
            Tag::Tr => self.collect_rows(e),
            _ => {
                let inner = Context {
                    space_after: 0.0,
                    ..ctx
                };
                self.visit_children(e, inner);
                self.flush(inner, None);
            }
        }

        if has_break(e, "page-break-after") {
            self.blocks.push(Block::PageBreak);
        }
    }

    fn visit_inline(&mut self, e: &ElementNode, ctx: Context) {
        match e.tag {
            Tag::Br => self.inline.text.push('\n'),
            Tag::Bold => self.visit_children(
                e,
                Context {
                    style: TextStyle {
                        bold: true,
                        ..ctx.style
                    },
                    ..ctx
                },
            ),
            Tag::Italic => self.visit_children(
                e,
                Context {
                    style: TextStyle {
                        italic: true,
                        ..ctx.style
                    },
                    ..ctx
                },
            ),
            _ => self.visit_children(e, ctx),
        }
    }

    fn visit_list_item(&mut self, li: &ElementNode, ctx: Context, marker: String) {
        let mut marker = Some(marker);
        for child in &li.children {
            match child {
                DomNode::Element(nested) if matches!(nested.tag, Tag::Ul | Tag::Ol) => {
                    self.flush(ctx, marker.take());
                    self.visit_element(nested, ctx);
                }
                other => self.visit(other, ctx),
            }
        }
        self.flush(ctx, marker.take());
    }

    fn visit_children(&mut self, e: &ElementNode, ctx: Context) {
        for child in &e.children {
            self.visit(child, ctx);
        }
    }

    fn collect_rows(&mut self, e: &ElementNode) {
        for child in &e.children {
            let DomNode::Element(el) = child else {
                continue;
            };
            if el.tag != Tag::Tr {
                // thead / tbody wrappers
                self.collect_rows(el);
                continue;
            }

            let mut cells = Vec::new();
            let mut header = true;
            for cell in &el.children {
                if let DomNode::Element(c) = cell {
                    if matches!(c.tag, Tag::Td | Tag::Th) {
                        header &= c.tag == Tag::Th;
                        cells.push(inline_text(&c.children));
                    }
                }
            }
            if !cells.is_empty() {
                self.blocks.push(Block::Row { cells, header });
            }
        }
    }
}

fn heading_size(level: u8) -> f32 {
    match level {
        1 => 24.0,
        2 => 20.0,
        3 => 16.0,
        4 => 14.0,
        5 => 12.0,
        _ => BASE_FONT_SIZE,
    }
}

fn has_break(e: &ElementNode, property: &str) -> bool {
    e.style_property(property)
        .is_some_and(|v| v.eq_ignore_ascii_case("always") || v.eq_ignore_ascii_case("page"))
}

/// `width="120"` / `style="width: 120px"` in points.
fn dimension(e: &ElementNode, name: &str) -> Option<f32> {
    let raw = e.style_property(name).or_else(|| e.attr(name))?;
    let raw = raw.trim();
    if let Some(mm) = raw.strip_suffix("mm") {
        return mm.trim().parse::<f32>().ok().map(|v| v * MM_TO_PT);
    }
    if let Some(pt) = raw.strip_suffix("pt") {
        return pt.trim().parse::<f32>().ok();
    }
    raw.trim_end_matches("px")
        .trim()
        .parse::<f32>()
        .ok()
        .map(|v| v * PX_TO_PT)
}

/// Concatenated, whitespace-collapsed text of a subtree.
fn inline_text(nodes: &[DomNode]) -> String {
    fn walk(nodes: &[DomNode], out: &mut String) {
        for node in nodes {
            match node {
                DomNode::Text(t) => out.push_str(t),
                DomNode::Element(e) if e.tag == Tag::Br => out.push(' '),
                DomNode::Element(e) if e.tag != Tag::Skipped => walk(&e.children, out),
                DomNode::Element(_) => {}
            }
        }
    }
    let mut out = String::new();
    walk(nodes, &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace the page placeholders in header/footer blocks.
pub fn substitute_page_numbers(blocks: &[Block], page: usize, total: usize) -> Vec<Block> {
    let page = page.to_string();
    let total = total.to_string();
    let replace = |text: &str| text.replace(PAGE_NUMBER, &page).replace(PAGE_COUNT, &total);
    blocks.iter().map(|b| b.map_text(&replace)).collect()
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Page size and margins, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_header: f32,
    pub margin_footer: f32,
}

impl Geometry {
    /// Page format plus the `margin_*` options (millimetres).
    pub fn from_config(config: &RenderConfig) -> Self {
        let (page_width, page_height) = config.format.dimensions_pt();
        let margin = |key: &str, default_mm: f32| {
            config.option_f32(key).unwrap_or(default_mm).max(0.0) * MM_TO_PT
        };
        Self {
            page_width,
            page_height,
            margin_left: margin("margin_left", 15.0),
            margin_right: margin("margin_right", 15.0),
            margin_top: margin("margin_top", 16.0),
            margin_bottom: margin("margin_bottom", 16.0),
            margin_header: margin("margin_header", 9.0),
            margin_footer: margin("margin_footer", 9.0),
        }
    }

    pub fn content_width(&self) -> f32 {
        (self.page_width - self.margin_left - self.margin_right).max(1.0)
    }

    fn content_bottom(&self) -> f32 {
        self.page_height - self.margin_bottom
    }
}

/// Something drawn on a page. `y` is the top edge measured from the top of
/// the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Placed {
    Text {
        x: f32,
        y: f32,
        text: String,
        style: TextStyle,
    },
    Image {
        src: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Placed>,
}

struct Flow<'a> {
    geometry: Geometry,
    font: &'a DocumentFont,
    images: &'a HashMap<String, (u32, u32)>,
    pages: Vec<Page>,
    current: Page,
    y: f32,
    top: f32,
    bottom: f32,
    paginate: bool,
}

impl<'a> Flow<'a> {
    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.pages.push(page);
        self.y = self.top;
    }

    /// Start a new page if `height` does not fit, unless the page is still
    /// empty (oversized content goes on its own page).
    fn reserve(&mut self, height: f32) {
        if self.paginate && self.y + height > self.bottom && !self.current.items.is_empty() {
            self.new_page();
        }
    }

    fn place(&mut self, block: &Block) {
        let g = self.geometry;
        match block {
            Block::Text {
                text,
                style,
                indent,
                marker,
                space_after,
            } => {
                let line_height = style.size * LINE_HEIGHT_FACTOR;
                let x = g.margin_left + indent;
                let lines = wrap_text(text, g.content_width() - indent, |s| {
                    self.font.measure(s, style.size, style.bold, style.italic)
                });
                for (i, line) in lines.into_iter().enumerate() {
                    self.reserve(line_height);
                    if i == 0 {
                        if let Some(marker) = marker {
                            let marker_width = self.font.measure(marker, style.size, false, false);
                            self.current.items.push(Placed::Text {
                                x: x - marker_width - 4.0,
                                y: self.y,
                                text: marker.clone(),
                                style: TextStyle {
                                    bold: false,
                                    italic: false,
                                    ..*style
                                },
                            });
                        }
                    }
                    if !line.is_empty() {
                        self.current.items.push(Placed::Text {
                            x,
                            y: self.y,
                            text: line,
                            style: *style,
                        });
                    }
                    self.y += line_height;
                }
                self.y += space_after;
            }
            Block::Row { cells, header } => {
                let style = TextStyle {
                    bold: *header,
                    ..TextStyle::default()
                };
                let line_height = style.size * LINE_HEIGHT_FACTOR;
                let column = g.content_width() / cells.len() as f32;
                let wrapped: Vec<Vec<String>> = cells
                    .iter()
                    .map(|cell| {
                        wrap_text(cell, column - 2.0 * CELL_PADDING, |s| {
                            self.font.measure(s, style.size, style.bold, false)
                        })
                    })
                    .collect();
                let rows = wrapped.iter().map(Vec::len).max().unwrap_or(1);
                let height = rows as f32 * line_height + 2.0 * CELL_PADDING;

                self.reserve(height);
                for (col, lines) in wrapped.into_iter().enumerate() {
                    let x = g.margin_left + col as f32 * column + CELL_PADDING;
                    for (row, line) in lines.into_iter().enumerate() {
                        if line.is_empty() {
                            continue;
                        }
                        self.current.items.push(Placed::Text {
                            x,
                            y: self.y + CELL_PADDING + row as f32 * line_height,
                            text: line,
                            style,
                        });
                    }
                }
                self.y += height;
                if *header {
                    self.current.items.push(Placed::Rule {
                        x1: g.margin_left,
                        x2: g.page_width - g.margin_right,
                        y: self.y,
                    });
                }
            }
            Block::Image { src, width, height } => {
                let Some(&(px_w, px_h)) = self.images.get(src) else {
                    return;
                };
                let natural_w = px_w as f32 * PX_TO_PT;
                let natural_h = px_h as f32 * PX_TO_PT;
                let (mut w, mut h) = match (width, height) {
                    (Some(w), Some(h)) => (*w, *h),
                    (Some(w), None) => (*w, natural_h * w / natural_w.max(1.0)),
                    (None, Some(h)) => (natural_w * h / natural_h.max(1.0), *h),
                    (None, None) => (natural_w, natural_h),
                };
                let max_w = g.content_width();
                if w > max_w {
                    h *= max_w / w;
                    w = max_w;
                }
                let max_h = (self.bottom - self.top).max(1.0);
                if self.paginate && h > max_h {
                    w *= max_h / h;
                    h = max_h;
                }

                self.reserve(h);
                self.current.items.push(Placed::Image {
                    src: src.clone(),
                    x: g.margin_left,
                    y: self.y,
                    width: w,
                    height: h,
                });
                self.y += h + 4.0;
            }
            Block::Rule => {
                self.reserve(8.0);
                self.y += 4.0;
                self.current.items.push(Placed::Rule {
                    x1: g.margin_left,
                    x2: g.page_width - g.margin_right,
                    y: self.y,
                });
                self.y += 4.0;
            }
            Block::PageBreak => {
                if self.paginate && !self.current.items.is_empty() {
                    self.new_page();
                }
            }
        }
    }
}

/// Stack blocks onto pages. Always returns at least one page.
pub fn paginate(
    blocks: &[Block],
    geometry: Geometry,
    font: &DocumentFont,
    images: &HashMap<String, (u32, u32)>,
) -> Vec<Page> {
    let mut flow = Flow {
        geometry,
        font,
        images,
        pages: Vec::new(),
        current: Page::default(),
        y: geometry.margin_top,
        top: geometry.margin_top,
        bottom: geometry.content_bottom(),
        paginate: true,
    };
    for block in blocks {
        flow.place(block);
    }
    let last = std::mem::take(&mut flow.current);
    flow.pages.push(last);
    flow.pages
}

/// Lay out a header or footer band. The header starts at `margin_header`
/// from the top; the footer ends at `margin_footer` from the bottom.
pub fn layout_band(
    blocks: &[Block],
    geometry: Geometry,
    font: &DocumentFont,
    images: &HashMap<String, (u32, u32)>,
    footer: bool,
) -> Vec<Placed> {
    let run = |top: f32| {
        let mut flow = Flow {
            geometry,
            font,
            images,
            pages: Vec::new(),
            current: Page::default(),
            y: top,
            top,
            bottom: f32::MAX,
            paginate: false,
        };
        for block in blocks {
            flow.place(block);
        }
        (flow.current.items, flow.y - top)
    };

    let (items, height) = run(geometry.margin_header);
    if !footer {
        return items;
    }
    let top = geometry.page_height - geometry.margin_footer - height;
    run(top).0
}

/// Word-wrap text to fit within `max_width` points. Existing newlines are
/// kept; words wider than the line are placed on their own line.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) > max_width && !current.is_empty() {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dom::parse_html;
    use crate::engine::fonts::BuiltinFamily;

    fn blocks(html: &str) -> Vec<Block> {
        collect_blocks(&parse_html(html, None).unwrap())
    }

    fn helvetica() -> DocumentFont {
        DocumentFont::Builtin(BuiltinFamily::Helvetica)
    }

    fn a4() -> Geometry {
        Geometry::from_config(&RenderConfig::new("/tmp"))
    }

    fn texts(page: &Page) -> Vec<&str> {
        page.items
            .iter()
            .filter_map(|item| match item {
                Placed::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn deepest_accepted_nesting_collects() {
        use crate::engine::dom::MAX_DEPTH;
        let html = format!("{}x{}", "<div>".repeat(MAX_DEPTH), "</div>".repeat(MAX_DEPTH));
        let texts: Vec<_> = blocks(&html)
            .into_iter()
            .filter_map(|b| match b {
                Block::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["x".to_string()]);
    }

    #[test]
    fn paragraphs_and_headings() {
        let b = blocks("<h1>Title</h1><p>Hello   <b>world</b></p>");
        assert_eq!(b.len(), 2);
        match &b[0] {
            Block::Text { text, style, .. } => {
                assert_eq!(text, "Title");
                assert!(style.bold);
                assert_eq!(style.size, 24.0);
            }
            other => panic!("Expected text block, got {other:?}"),
        }
        match &b[1] {
            Block::Text { text, style, .. } => {
                assert_eq!(text, "Hello world");
                assert!(!style.bold, "partially bold paragraph stays regular");
            }
            other => panic!("Expected text block, got {other:?}"),
        }
    }

    #[test]
    fn fully_bold_paragraph_is_bold() {
        let b = blocks("<p><strong>All bold</strong></p>");
        assert!(matches!(&b[0], Block::Text { style, .. } if style.bold));
    }

    #[test]
    fn list_markers() {
        let b = blocks("<ol><li>one</li><li>two</li></ol><ul><li>dot</li></ul>");
        let markers: Vec<_> = b
            .iter()
            .filter_map(|block| match block {
                Block::Text { marker, .. } => marker.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(markers, vec!["1.", "2.", "\u{2022}"]);
    }

    #[test]
    fn table_rows() {
        let b = blocks(
            "<table><thead><tr><th>Item</th><th>Qty</th></tr></thead>\
             <tbody><tr><td>Pen</td><td>2</td></tr></tbody></table>",
        );
        assert_eq!(
            b[0],
            Block::Row {
                cells: vec!["Item".into(), "Qty".into()],
                header: true
            }
        );
        assert_eq!(
            b[1],
            Block::Row {
                cells: vec!["Pen".into(), "2".into()],
                header: false
            }
        );
    }

    #[test]
    fn breaks_from_tags_and_styles() {
        let b = blocks(r#"<p>a</p><pagebreak /><div style="page-break-before: always">b</div>"#);
        let breaks = b.iter().filter(|x| **x == Block::PageBreak).count();
        assert_eq!(breaks, 2);

        // Back-to-back breaks never produce a blank page.
        let pages = paginate(&b, a4(), &helvetica(), &HashMap::new());
        assert_eq!(pages.len(), 2);
        assert_eq!(texts(&pages[1]), vec!["b"]);
    }

    #[test]
    fn overflow_creates_pages() {
        let html = "<p>Lorem ipsum dolor sit amet.</p>".repeat(200);
        let pages = paginate(&blocks(&html), a4(), &helvetica(), &HashMap::new());
        assert!(pages.len() > 1, "Expected multiple pages, got {}", pages.len());

        let g = a4();
        for page in &pages {
            for item in &page.items {
                if let Placed::Text { y, .. } = item {
                    assert!(*y >= g.margin_top - 0.01);
                    assert!(*y < g.page_height - g.margin_bottom);
                }
            }
        }
    }

    #[test]
    fn empty_document_has_one_page() {
        let pages = paginate(&[], a4(), &helvetica(), &HashMap::new());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].items.is_empty());
    }

    #[test]
    fn page_number_substitution() {
        let header = blocks("<p>Page {PAGENO} of {nbpg}</p>");
        let band = substitute_page_numbers(&header, 2, 5);
        let placed = layout_band(&band, a4(), &helvetica(), &HashMap::new(), false);
        let page = Page { items: placed };
        assert_eq!(texts(&page), vec!["Page 2 of 5"]);
    }

    #[test]
    fn footer_band_sits_above_bottom_margin() {
        let g = a4();
        let placed = layout_band(&blocks("<p>footer</p>"), g, &helvetica(), &HashMap::new(), true);
        match &placed[0] {
            Placed::Text { y, .. } => {
                assert!(*y > g.page_height / 2.0);
                assert!(*y < g.page_height - g.margin_footer);
            }
            other => panic!("Expected text, got {other:?}"),
        }
    }

    #[test]
    fn images_scale_to_content_width() {
        let mut images = HashMap::new();
        images.insert("big.png".to_string(), (4000, 1000));
        let b = blocks(r#"<img src="big.png">"#);
        let g = a4();
        let pages = paginate(&b, g, &helvetica(), &images);
        match &pages[0].items[0] {
            Placed::Image { width, height, .. } => {
                assert!((width - g.content_width()).abs() < 0.01);
                assert!((height - g.content_width() / 4.0).abs() < 0.01);
            }
            other => panic!("Expected image, got {other:?}"),
        }
    }

    #[test]
    fn word_wrap_basic() {
        let lines = wrap_text("Hello world foo bar", 60.0, |s| s.chars().count() as f32 * 8.0);
        assert!(lines.len() >= 2, "Expected wrapping, got {lines:?}");
        assert_eq!(wrap_text("a\nb", 500.0, |_| 1.0), vec!["a", "b"]);
    }
}
