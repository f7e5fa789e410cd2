//! HTML parser – turns rendered template output into a small DOM tree.
//!
//! Template output is controlled markup, so a tolerant recursive-descent
//! parser over the block subset is enough:
//! - Block: div, p, h1-h6, ul, ol, li, table, tr, td, th, hr, img, pagebreak
//! - Inline: span, b, strong, i, em, u, a, br
//! - Skipped: head, style, script, title (raw content is consumed)

use std::collections::HashMap;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Div,
    P,
    Heading(u8),
    Ul,
    Ol,
    Li,
    Table,
    Tr,
    Td,
    Th,
    Hr,
    Br,
    Img,
    PageBreak,
    Bold,
    Italic,
    Inline,
    /// Elements whose content never reaches the page.
    Skipped,
    /// Unknown tags are kept and treated as divs.
    Unknown(String),
}

impl Tag {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "div" | "section" | "article" | "header" | "footer" | "main" | "blockquote"
            | "thead" | "tbody" | "tfoot" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "hr" => Tag::Hr,
            "br" => Tag::Br,
            "img" => Tag::Img,
            "pagebreak" => Tag::PageBreak,
            "b" | "strong" => Tag::Bold,
            "i" | "em" => Tag::Italic,
            "span" | "u" | "a" | "small" | "sup" | "sub" | "code" | "label" => Tag::Inline,
            "style" | "script" | "title" | "meta" | "link" => Tag::Skipped,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Elements that never have children or a closing tag.
    fn is_void(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "img" | "br" | "hr" | "meta" | "link" | "input" | "pagebreak" | "col"
        )
    }

    /// Elements whose content is raw text up to the matching closing tag.
    fn is_raw_text(name: &str) -> bool {
        matches!(
            name.to_ascii_lowercase().as_str(),
            "style" | "script" | "title"
        )
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Tag::Bold | Tag::Italic | Tag::Inline | Tag::Br)
    }
}

/// A node in the DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Value of one property from the inline `style` attribute.
    pub fn style_property(&self, property: &str) -> Option<&str> {
        self.attr("style")?.split(';').find_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(property)
                .then(|| value.trim())
        })
    }
}

/// Deepest element nesting accepted, limit or not.
pub const MAX_DEPTH: usize = 128;

/// Parse an HTML string into DOM nodes.
///
/// `node_limit` bounds how many nodes a single call may produce. Nodes are
/// counted as they open, and nesting past [`MAX_DEPTH`] is rejected.
pub fn parse_html(html: &str, node_limit: Option<u64>) -> Result<Vec<DomNode>, EngineError> {
    let mut parser = Parser {
        input: html,
        pos: 0,
        nodes: 0,
        depth: 0,
        limit: node_limit,
    };
    parser.parse_nodes(None)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    nodes: u64,
    depth: usize,
    limit: Option<u64>,
}

impl<'a> Parser<'a> {
    fn parse_nodes(&mut self, parent: Option<&str>) -> Result<Vec<DomNode>, EngineError> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.starts_with("</") {
                // Any closing tag ends the open element; the element decides
                // whether it is its own. Stray ones at the top level are dropped.
                if parent.is_some() {
                    break;
                }
                self.skip_past('>');
                continue;
            }
            if let Some(node) = self.parse_node()? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn count(&mut self) -> Result<(), EngineError> {
        self.nodes += 1;
        match self.limit {
            Some(limit) if self.nodes > limit => Err(EngineError::NodeLimit { limit }),
            _ => Ok(()),
        }
    }

    fn parse_node(&mut self) -> Result<Option<DomNode>, EngineError> {
        if self.starts_with("<!--") {
            self.advance(4);
            match self.input[self.pos..].find("-->") {
                Some(end) => self.pos += end + 3,
                None => self.pos = self.input.len(),
            }
            return Ok(None);
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past('>');
            return Ok(None);
        }
        if self.starts_with("<") && self.peek_is_name_start() {
            return self.parse_element().map(Some);
        }
        self.count()?;
        Ok(Some(self.parse_text()))
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        self.advance(1);
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> Result<DomNode, EngineError> {
        self.count()?;
        self.advance(1); // '<'
        let name = self.parse_name();
        let mut elem = ElementNode::new(Tag::parse(&name));

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Unparseable junk inside the tag.
                self.advance(1);
                continue;
            }
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.starts_with("/>") {
            self.advance(2);
            return Ok(DomNode::Element(elem));
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if Tag::is_void(&name) {
            return Ok(DomNode::Element(elem));
        }

        if Tag::is_raw_text(&name) {
            let closing = format!("</{}", name.to_ascii_lowercase());
            let rest = self.input[self.pos..].to_ascii_lowercase();
            let end = rest.find(&closing).unwrap_or(rest.len());
            let raw = &self.input[self.pos..self.pos + end];
            if !raw.is_empty() {
                elem.children.push(DomNode::Text(raw.to_string()));
            }
            self.pos += end;
            self.skip_past('>');
            return Ok(DomNode::Element(elem));
        }

        if self.depth >= MAX_DEPTH {
            return Err(EngineError::Depth { max: MAX_DEPTH });
        }
        self.depth += 1;
        let children = self.parse_nodes(Some(&name));
        self.depth -= 1;
        elem.children = children?;

        if self.starts_with("</") {
            let save = self.pos;
            self.advance(2);
            let closing = self.parse_name();
            if closing.eq_ignore_ascii_case(&name) {
                self.skip_past('>');
            } else {
                // Belongs to an ancestor; leave it for them.
                self.pos = save;
            }
        }

        Ok(DomNode::Element(elem))
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1);
        self.skip_whitespace();

        let quote = match self.current_char() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let start = self.pos;
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.advance(1);
                }
                return (key, decode_entities(&self.input[start..self.pos]));
            }
        };

        self.advance(1);
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c == quote {
                break;
            }
            self.advance(1);
        }
        let value = decode_entities(&self.input[start..self.pos]);
        self.advance(1);
        (key, value)
    }

    fn peek_is_name_start(&self) -> bool {
        self.input[self.pos..]
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn skip_past(&mut self, ch: char) {
        match self.input[self.pos..].find(ch) {
            Some(idx) => self.pos += idx + ch.len_utf8(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance(1);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.current_char() {
                self.pos += c.len_utf8();
            }
        }
    }
}

/// Decode named and numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{00A0}'),
                "euro" => Some('\u{20AC}'),
                "copy" => Some('\u{00A9}'),
                "hellip" => Some('\u{2026}'),
                "ndash" => Some('\u{2013}'),
                "mdash" => Some('\u{2014}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Children of `<body>`, or all nodes when there is no `<body>`. `<head>` is
/// always dropped.
pub fn body_children(nodes: Vec<DomNode>) -> Vec<DomNode> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) if e.tag == Tag::Body => return e.children,
            DomNode::Element(e) if e.tag == Tag::Html => {
                let inner = body_children(e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
            DomNode::Element(e) if e.tag == Tag::Head || e.tag == Tag::Skipped => {}
            other => out.push(other),
        }
    }
    out
}
