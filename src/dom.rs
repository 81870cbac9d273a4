//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! The input is whatever a rich-text editor or a clipboard paste produced, so
//! the parser is tolerant rather than strict: it never fails, and it recovers
//! from unbalanced markup with a tag stack:
//!
//! - a closing tag closes the nearest open element with the same name and
//!   everything opened after it; a closing tag with no open match is dropped
//! - an open `<p>` is closed when a block element starts inside it
//! - an open `<li>` is closed when a sibling `<li>` starts
//! - void elements (`br`, `img`, ...) never take children
//! - elements still open at end of input are closed there
//! - a `<` that does not start a tag is kept as text

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element, with the elements the normalizer and the
/// sandbox care about spelled out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Div,
    P,
    Br,
    Span,
    Ol,
    Ul,
    Li,
    Strong,
    B,
    Em,
    I,
    U,
    S,
    A,
    Heading(u8),
    Blockquote,
    Pre,
    Img,
    Table,
    Script,
    Style,
    /// Catch-all for tags without special handling.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "div" => Tag::Div,
            "p" => Tag::P,
            "br" => Tag::Br,
            "span" => Tag::Span,
            "ol" => Tag::Ol,
            "ul" => Tag::Ul,
            "li" => Tag::Li,
            "strong" => Tag::Strong,
            "b" => Tag::B,
            "em" => Tag::Em,
            "i" => Tag::I,
            "u" => Tag::U,
            "s" => Tag::S,
            "a" => Tag::A,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "blockquote" => Tag::Blockquote,
            "pre" => Tag::Pre,
            "img" => Tag::Img,
            "table" => Tag::Table,
            "script" => Tag::Script,
            "style" => Tag::Style,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Lowercase tag name used for serialization.
    pub fn name(&self) -> String {
        match self {
            Tag::Html => "html".into(),
            Tag::Head => "head".into(),
            Tag::Body => "body".into(),
            Tag::Div => "div".into(),
            Tag::P => "p".into(),
            Tag::Br => "br".into(),
            Tag::Span => "span".into(),
            Tag::Ol => "ol".into(),
            Tag::Ul => "ul".into(),
            Tag::Li => "li".into(),
            Tag::Strong => "strong".into(),
            Tag::B => "b".into(),
            Tag::Em => "em".into(),
            Tag::I => "i".into(),
            Tag::U => "u".into(),
            Tag::S => "s".into(),
            Tag::A => "a".into(),
            Tag::Heading(level) => format!("h{level}"),
            Tag::Blockquote => "blockquote".into(),
            Tag::Pre => "pre".into(),
            Tag::Img => "img".into(),
            Tag::Table => "table".into(),
            Tag::Script => "script".into(),
            Tag::Style => "style".into(),
            Tag::Unknown(name) => name.clone(),
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        match self {
            Tag::Br | Tag::Img => true,
            Tag::Unknown(name) => matches!(
                name.as_str(),
                "hr" | "meta" | "link" | "input" | "wbr" | "col" | "source"
            ),
            _ => false,
        }
    }

    /// Block-level elements; opening one closes an open `<p>`.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Tag::Div
                | Tag::P
                | Tag::Ol
                | Tag::Ul
                | Tag::Li
                | Tag::Heading(_)
                | Tag::Blockquote
                | Tag::Pre
                | Tag::Table
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Tag::Ol | Tag::Ul)
    }

    /// Content of these elements is raw text up to the matching close tag.
    fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Script | Tag::Style)
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    /// Inline `style` declarations as lowercase `(property, value)` pairs.
    pub fn style_decls(&self) -> Vec<(String, String)> {
        self.inline_style()
            .map(|style| {
                style
                    .split(';')
                    .filter_map(|decl| {
                        let (key, value) = decl.split_once(':')?;
                        let key = key.trim().to_ascii_lowercase();
                        if key.is_empty() {
                            return None;
                        }
                        Some((key, value.trim().to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Value of one inline style property; later declarations win.
    pub fn style_value(&self, property: &str) -> Option<String> {
        self.style_decls()
            .into_iter()
            .rev()
            .find(|(key, _)| key == property)
            .map(|(_, value)| value)
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        to_html(&self.children)
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize a node list back to HTML.
pub fn to_html(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(&escape_text(t)),
            DomNode::Element(e) => write_element(e, &mut out),
        }
    }
    out
}

fn write_element(elem: &ElementNode, out: &mut String) {
    let name = elem.tag.name();
    out.push('<');
    out.push_str(&name);
    for (key, value) in &elem.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    if elem.tag.is_void() {
        return;
    }
    if elem.tag.is_raw_text() {
        collect_text(&elem.children, out);
    } else {
        out.push_str(&to_html(&elem.children));
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

/// Escape text for use between tags. U+00A0 is written as `&nbsp;` so that
/// non-breaking spaces survive a parse/serialize cycle visibly.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// Parser – lexer over the raw string, tree builder with a tag stack
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes. Never fails.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut lexer = Lexer::new(html);
    let mut builder = TreeBuilder::default();
    while let Some(token) = lexer.next_token() {
        builder.feed(token);
    }
    builder.finish()
}

#[derive(Debug)]
enum Token {
    Open {
        tag: Tag,
        attributes: BTreeMap<String, String>,
        self_closing: bool,
    },
    Close(Tag),
    Text(String),
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    /// Set after an opening `<script>`/`<style>`; the next token is its raw body.
    raw_text_of: Option<Tag>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text_of: None,
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        if let Some(tag) = self.raw_text_of.take() {
            return Some(self.raw_text(tag));
        }
        loop {
            if self.eof() {
                return None;
            }
            if self.starts_with("<!--") {
                self.skip_comment();
                continue;
            }
            if self.starts_with("<!") || self.starts_with("<?") {
                // Skip doctype / processing instructions
                self.skip_past('>');
                continue;
            }
            if self.starts_with("</") {
                if let Some(token) = self.close_tag() {
                    return Some(token);
                }
                continue;
            }
            if self.starts_with("<") {
                let next = self.input[self.pos + 1..].chars().next();
                if next.is_some_and(|c| c.is_ascii_alphabetic()) {
                    return Some(self.open_tag());
                }
                self.advance(1);
                return Some(Token::Text("<".to_string()));
            }
            return Some(self.text());
        }
    }

    fn text(&mut self) -> Token {
        let start = self.pos;
        while !self.eof() && !self.starts_with("<") {
            self.advance(1);
        }
        Token::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn raw_text(&mut self, tag: Tag) -> Token {
        let closing = format!("</{}", tag.name());
        let rest = &self.input[self.pos..];
        let end = rest
            .to_ascii_lowercase()
            .find(&closing)
            .unwrap_or(rest.len());
        let body = rest[..end].to_string();
        self.pos += end;
        Token::Text(body)
    }

    fn open_tag(&mut self) -> Token {
        // Consume '<'
        self.advance(1);
        let tag = Tag::from_name(&self.parse_tag_name());
        let mut attributes = BTreeMap::new();

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute();
            if key.is_empty() {
                // Junk inside the tag: step over it rather than loop forever.
                self.advance(1);
                continue;
            }
            attributes.insert(key.to_ascii_lowercase(), value);
        }

        let self_closing = self.starts_with("/>");
        if self_closing {
            self.advance(2);
        } else if !self.eof() {
            self.advance(1); // skip '>'
        }
        if tag.is_raw_text() && !self_closing {
            self.raw_text_of = Some(tag.clone());
        }
        Token::Open {
            tag,
            attributes,
            self_closing,
        }
    }

    fn close_tag(&mut self) -> Option<Token> {
        self.advance(2); // skip '</'
        let name = self.parse_tag_name();
        self.skip_past('>');
        if name.is_empty() {
            return None;
        }
        Some(Token::Close(Tag::from_name(&name)))
    }

    fn parse_tag_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_tag_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1); // skip '='
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.starts_with(quote) {
                    self.advance(1);
                }
                let val = decode_entities(&self.input[start..self.pos]);
                if !self.eof() {
                    self.advance(1);
                }
                return val;
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' {
                break;
            }
            if c == '/' && self.input[self.pos..].starts_with("/>") {
                break;
            }
            self.advance(1);
        }
        decode_entities(&self.input[start..self.pos])
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn skip_past(&mut self, end: char) {
        while !self.eof() && self.current_char() != end {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(1);
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4); // skip <!--
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        // Advance by `n` characters (not bytes).
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

#[derive(Default)]
struct TreeBuilder {
    roots: Vec<DomNode>,
    stack: Vec<ElementNode>,
}

impl TreeBuilder {
    fn feed(&mut self, token: Token) {
        match token {
            Token::Text(text) => {
                if !text.is_empty() {
                    self.append(DomNode::Text(text));
                }
            }
            Token::Open {
                tag,
                attributes,
                self_closing,
            } => {
                if tag.is_block() {
                    self.close_open_paragraph();
                }
                if tag == Tag::Li {
                    self.close_open_list_item();
                }
                let mut elem = ElementNode::new(tag);
                elem.attributes = attributes;
                if elem.tag.is_void() || self_closing {
                    self.append(DomNode::Element(elem));
                } else {
                    self.stack.push(elem);
                }
            }
            // `</br>` is read as `<br>`, as browsers do.
            Token::Close(Tag::Br) => self.append(DomNode::Element(ElementNode::new(Tag::Br))),
            Token::Close(tag) => {
                if let Some(pos) = self.stack.iter().rposition(|e| e.tag == tag) {
                    self.close_to(pos);
                } else {
                    log::trace!("dropping stray closing tag </{}>", tag.name());
                }
            }
        }
    }

    fn finish(mut self) -> Vec<DomNode> {
        self.close_to(0);
        self.roots
    }

    fn append(&mut self, node: DomNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    /// Pop every open element at stack index `pos` and above.
    fn close_to(&mut self, pos: usize) {
        while self.stack.len() > pos {
            if let Some(elem) = self.stack.pop() {
                self.append(DomNode::Element(elem));
            }
        }
    }

    /// Nearest open element matching `is_target`, unless an element matching
    /// `is_boundary` sits between it and the top of the stack.
    fn find_in_scope(
        &self,
        is_target: impl Fn(&Tag) -> bool,
        is_boundary: impl Fn(&Tag) -> bool,
    ) -> Option<usize> {
        for (pos, elem) in self.stack.iter().enumerate().rev() {
            if is_target(&elem.tag) {
                return Some(pos);
            }
            if is_boundary(&elem.tag) {
                return None;
            }
        }
        None
    }

    fn close_open_paragraph(&mut self) {
        let found = self.find_in_scope(
            |t| *t == Tag::P,
            |t| matches!(t, Tag::Li | Tag::Div | Tag::Blockquote | Tag::Body) || t.is_list(),
        );
        if let Some(pos) = found {
            self.close_to(pos);
        }
    }

    fn close_open_list_item(&mut self) {
        if let Some(pos) = self.find_in_scope(|t| *t == Tag::Li, Tag::is_list) {
            self.close_to(pos);
        }
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{00A0}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
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

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            // Recurse into <html>
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

/// Child-index path to the first element (document order) carrying `class`.
pub fn find_path_by_class(nodes: &[DomNode], class: &str) -> Option<Vec<usize>> {
    for (i, node) in nodes.iter().enumerate() {
        if let DomNode::Element(e) = node {
            if e.has_class(class) {
                return Some(vec![i]);
            }
            if let Some(mut path) = find_path_by_class(&e.children, class) {
                path.insert(0, i);
                return Some(path);
            }
        }
    }
    None
}

pub fn find_by_class<'a>(nodes: &'a [DomNode], class: &str) -> Option<&'a ElementNode> {
    let path = find_path_by_class(nodes, class)?;
    element_at(nodes, &path)
}

pub fn element_at<'a>(nodes: &'a [DomNode], path: &[usize]) -> Option<&'a ElementNode> {
    let (first, rest) = path.split_first()?;
    match nodes.get(*first)? {
        DomNode::Element(e) if rest.is_empty() => Some(e),
        DomNode::Element(e) => element_at(&e.children, rest),
        DomNode::Text(_) => None,
    }
}

pub fn element_at_mut<'a>(nodes: &'a mut [DomNode], path: &[usize]) -> Option<&'a mut ElementNode> {
    let (first, rest) = path.split_first()?;
    match nodes.get_mut(*first)? {
        DomNode::Element(e) => {
            if rest.is_empty() {
                Some(e)
            } else {
                element_at_mut(&mut e.children, rest)
            }
        }
        DomNode::Text(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            DomNode::Text(t) => panic!("Expected element, got text {t:?}"),
        }
    }

    #[test]
    fn parse_simple_div() {
        let html = r#"<div class="letter-text page"><p>Hello</p></div>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        let e = element(&nodes[0]);
        assert_eq!(e.tag, Tag::Div);
        assert_eq!(e.classes(), vec!["letter-text", "page"]);
        assert!(e.has_class("page"));
        assert_eq!(e.children.len(), 1);
    }

    #[test]
    fn parse_void_break() {
        let nodes = parse_html("<p>one<br>two<br/>three</p>");
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 5);
        assert_eq!(element(&p.children[1]).tag, Tag::Br);
        assert_eq!(p.text_content(), "onetwothree");
    }

    #[test]
    fn parse_nested_inline() {
        let html = r#"<p>Hello <strong>bold <em>world</em></strong>!</p>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        let p = element(&nodes[0]);
        assert_eq!(p.children.len(), 3); // "Hello ", <strong>, "!"
        assert_eq!(p.inner_html(), "Hello <strong>bold <em>world</em></strong>!");
    }

    #[test]
    fn stray_closing_tag_is_dropped() {
        let nodes = parse_html("<p>a</strong>b</p>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(element(&nodes[0]).text_content(), "ab");
    }

    #[test]
    fn unclosed_elements_close_at_end() {
        let nodes = parse_html("<p>a <em>b");
        assert_eq!(nodes.len(), 1);
        assert_eq!(element(&nodes[0]).outer_html(), "<p>a <em>b</em></p>");
    }

    #[test]
    fn misnested_close_pops_intermediate_elements() {
        let nodes = parse_html("<p><strong>a<em>b</p>c");
        assert_eq!(nodes.len(), 2);
        assert_eq!(
            element(&nodes[0]).outer_html(),
            "<p><strong>a<em>b</em></strong></p>"
        );
        assert_eq!(nodes[1], DomNode::Text("c".into()));
    }

    #[test]
    fn paragraph_closed_by_block() {
        let nodes = parse_html("<p>first<p>second<ul><li>x</ul>");
        assert_eq!(nodes.len(), 3);
        assert_eq!(element(&nodes[0]).text_content(), "first");
        assert_eq!(element(&nodes[1]).text_content(), "second");
        assert_eq!(element(&nodes[2]).tag, Tag::Ul);
    }

    #[test]
    fn sibling_list_items_close_each_other() {
        let nodes = parse_html("<ol><li>one<li>two<li>three</ol>");
        let ol = element(&nodes[0]);
        assert_eq!(ol.children.len(), 3);
        assert_eq!(element(&ol.children[2]).text_content(), "three");
    }

    #[test]
    fn bare_less_than_is_text() {
        let nodes = parse_html("<p>a < b and 3<4</p>");
        assert_eq!(element(&nodes[0]).text_content(), "a < b and 3<4");
    }

    #[test]
    fn entities_decode_and_reencode() {
        let nodes = parse_html("<p>Fish &amp; chips&nbsp;&#8212;&#x41;&bogus;</p>");
        let p = element(&nodes[0]);
        assert_eq!(p.text_content(), "Fish & chips\u{a0}\u{2014}A&bogus;");
        assert_eq!(p.inner_html(), "Fish &amp; chips&nbsp;\u{2014}A&amp;bogus;");
    }

    #[test]
    fn script_body_is_raw_text() {
        let nodes = parse_html("<script>if (a < b) { x = '</p>'; }</script><p>ok</p>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(element(&nodes[0]).tag, Tag::Script);
        assert_eq!(element(&nodes[1]).text_content(), "ok");
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        let nodes = parse_html("<!DOCTYPE html><!-- note --><p>x</p>");
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn inline_style_declarations() {
        let nodes = parse_html(r#"<div style="width: 113pt; PADDING:29pt ; width:120pt"></div>"#);
        let div = element(&nodes[0]);
        assert_eq!(div.style_value("padding").as_deref(), Some("29pt"));
        assert_eq!(div.style_value("width").as_deref(), Some("120pt"));
    }

    #[test]
    fn find_and_mutate_by_class() {
        let mut nodes = parse_html(r#"<div><div class="a"><div class="letter-text">t</div></div></div>"#);
        let path = find_path_by_class(&nodes, "letter-text").expect("hook present");
        assert_eq!(path, vec![0, 0, 0]);
        let target = element_at_mut(&mut nodes, &path).expect("path resolves");
        target.children.push(DomNode::Text("u".into()));
        assert_eq!(find_by_class(&nodes, "letter-text").map(|e| e.text_content()), Some("tu".into()));
    }

    #[test]
    fn element_at_mut_resolves_root_and_rejects_text() {
        let mut nodes = parse_html("<p>x</p>text");
        element_at_mut(&mut nodes, &[0])
            .expect("root element")
            .attributes
            .insert("id".into(), "r".into());
        assert_eq!(element(&nodes[0]).attr("id"), Some("r"));
        assert!(element_at_mut(&mut nodes, &[1]).is_none());
        assert!(element_at_mut(&mut nodes, &[0, 0]).is_none());
        assert!(element_at_mut(&mut nodes, &[]).is_none());
    }

    #[test]
    fn body_children_unwraps_document() {
        let nodes = parse_html("<html><head><title>t</title></head><body><p>x</p></body></html>");
        let body = body_children(&nodes);
        assert_eq!(body.len(), 1);
        assert_eq!(element(&body[0]).tag, Tag::P);
    }
}
