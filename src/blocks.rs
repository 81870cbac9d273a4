//! Block normalization – turns rich-text editor output into an ordered list
//! of paragraph / spacer / list blocks ready for measurement.
//!
//! Input is usually Quill markup (`<p>`, `<ol><li data-list="bullet">`,
//! `<span class="ql-ui">`), sometimes HTML pasted from a word processor, and
//! occasionally plain text from the DOCX import path. Whatever arrives,
//! [`normalize`] returns at least one block and never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::{escape_text, parse_html, DomNode, ElementNode, Tag};

/// Kind of a list block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    pub fn tag_name(self) -> &'static str {
        match self {
            ListKind::Ordered => "ol",
            ListKind::Unordered => "ul",
        }
    }
}

/// A semantic unit of letter content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    /// `inline_html` is `segments` joined by `<br>`; each segment is clean
    /// inline markup between two manual line breaks.
    Paragraph {
        inline_html: String,
        segments: Vec<String>,
    },
    /// A deliberate blank line (`<p><br></p>`).
    EmptyParagraph,
    OrderedList {
        items: Vec<String>,
    },
    UnorderedList {
        items: Vec<String>,
    },
}

impl ContentBlock {
    pub fn paragraph(segments: Vec<String>) -> Self {
        ContentBlock::Paragraph {
            inline_html: segments.join("<br>"),
            segments,
        }
    }

    pub fn list(kind: ListKind, items: Vec<String>) -> Self {
        match kind {
            ListKind::Ordered => ContentBlock::OrderedList { items },
            ListKind::Unordered => ContentBlock::UnorderedList { items },
        }
    }

    pub fn list_kind(&self) -> Option<ListKind> {
        match self {
            ContentBlock::OrderedList { .. } => Some(ListKind::Ordered),
            ContentBlock::UnorderedList { .. } => Some(ListKind::Unordered),
            _ => None,
        }
    }

    pub fn list_items(&self) -> Option<&[String]> {
        match self {
            ContentBlock::OrderedList { items } | ContentBlock::UnorderedList { items } => {
                Some(items)
            }
            _ => None,
        }
    }
}

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>|<br\s*/?>").expect("valid regex"));
static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));
static BULLET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[•●○◦▪▫-]\s+").expect("valid regex"));
static NUMBER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+").expect("valid regex"));
static LETTER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]\.\s+").expect("valid regex"));

/// Normalize rich-text HTML (or plain text) into content blocks.
pub fn normalize(input: &str) -> Vec<ContentBlock> {
    let trimmed = input.trim();
    let blocks = if trimmed.is_empty() {
        Vec::new()
    } else if MARKUP.is_match(trimmed) {
        normalize_html(trimmed)
    } else {
        normalize_plain_text(trimmed)
    };

    if blocks.is_empty() {
        vec![ContentBlock::EmptyParagraph]
    } else {
        blocks
    }
}

/// Serialize blocks back to HTML. Normalizing the result gives the same blocks.
pub fn to_html(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            ContentBlock::Paragraph { inline_html, .. } => {
                out.push_str("<p>");
                out.push_str(inline_html);
                out.push_str("</p>");
            }
            ContentBlock::EmptyParagraph => out.push_str("<p><br></p>"),
            ContentBlock::OrderedList { items } | ContentBlock::UnorderedList { items } => {
                let tag = block.list_kind().map(ListKind::tag_name).unwrap_or("ul");
                out.push('<');
                out.push_str(tag);
                out.push('>');
                for item in items {
                    out.push_str("<li>");
                    out.push_str(item);
                    out.push_str("</li>");
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// HTML input
// ---------------------------------------------------------------------------

fn normalize_html(html: &str) -> Vec<ContentBlock> {
    let nodes = parse_html(html);
    let mut normalizer = Normalizer::default();
    normalizer.walk(&nodes);
    normalizer.flush_loose();
    normalizer.blocks
}

#[derive(Default)]
struct Normalizer {
    blocks: Vec<ContentBlock>,
    /// Top-level text and inline elements waiting to become a paragraph.
    loose: Vec<DomNode>,
}

impl Normalizer {
    fn walk(&mut self, nodes: &[DomNode]) {
        for node in nodes {
            let elem = match node {
                DomNode::Text(_) => {
                    self.loose.push(node.clone());
                    continue;
                }
                DomNode::Element(e) => e,
            };
            if is_editor_ui(elem) {
                continue;
            }
            match &elem.tag {
                Tag::Html | Tag::Body | Tag::Div => self.container(&elem.children),
                Tag::Unknown(name) if matches!(name.as_str(), "section" | "article" | "main") => {
                    self.container(&elem.children);
                }
                Tag::P | Tag::Heading(_) | Tag::Blockquote | Tag::Pre
                    if has_block_children(&elem.children) =>
                {
                    self.container(&elem.children);
                }
                Tag::P | Tag::Heading(_) | Tag::Blockquote | Tag::Pre => {
                    self.flush_loose();
                    self.paragraph(&elem.children);
                }
                Tag::Ol | Tag::Ul => {
                    self.flush_loose();
                    self.list_container(elem);
                }
                Tag::Li => {
                    self.flush_loose();
                    let kind = item_kind(elem, ListKind::Unordered);
                    self.list_item(elem, kind);
                }
                // Docs wraps a whole paste in `<b id="docs-internal-guid-...">`.
                Tag::Span | Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::U | Tag::S | Tag::A
                    if has_block_children(&elem.children) =>
                {
                    self.container(&elem.children);
                }
                Tag::Br | Tag::Span | Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::U | Tag::S
                | Tag::A => self.loose.push(node.clone()),
                other => {
                    self.flush_loose();
                    log::debug!("normalizer skipping <{}>", other.name());
                }
            }
        }
    }

    /// Children of a block container; its loose text never joins a sibling's.
    fn container(&mut self, children: &[DomNode]) {
        self.flush_loose();
        self.walk(children);
        self.flush_loose();
    }

    fn flush_loose(&mut self) {
        if self.loose.is_empty() {
            return;
        }
        let loose = std::mem::take(&mut self.loose);
        let blank = loose
            .iter()
            .all(|n| matches!(n, DomNode::Text(t) if t.trim().is_empty()));
        if !blank {
            self.paragraph(&loose);
        }
    }

    fn paragraph(&mut self, children: &[DomNode]) {
        let parts = split_at_breaks(children);
        let mut segments: Vec<String> = parts.iter().map(|p| clean_inline(p)).collect();

        if segments.iter().all(String::is_empty) {
            // `<p><br></p>` is one deliberate blank line; `<p></p>` is nothing.
            for _ in 1..segments.len() {
                self.blocks.push(ContentBlock::EmptyParagraph);
            }
            return;
        }
        // A trailing break renders nothing.
        while segments.last().is_some_and(String::is_empty) {
            segments.pop();
        }
        self.blocks.push(ContentBlock::paragraph(segments));
    }

    fn list_container(&mut self, list: &ElementNode) {
        let default_kind = if list.tag == Tag::Ol {
            ListKind::Ordered
        } else {
            ListKind::Unordered
        };
        for child in &list.children {
            match child {
                DomNode::Element(li) if li.tag == Tag::Li => {
                    self.list_item(li, item_kind(li, default_kind));
                }
                DomNode::Element(nested) if nested.tag.is_list() => {
                    self.nested_items(nested, default_kind);
                }
                other => {
                    let text = clean_inline(std::slice::from_ref(other));
                    if !text.is_empty() {
                        self.push_item(default_kind, text);
                    }
                }
            }
        }
    }

    fn list_item(&mut self, li: &ElementNode, kind: ListKind) {
        let (inline, nested): (Vec<DomNode>, Vec<&ElementNode>) = {
            let mut inline = Vec::new();
            let mut nested = Vec::new();
            for child in &li.children {
                match child {
                    DomNode::Element(e) if e.tag.is_list() => nested.push(e),
                    other => inline.push(other.clone()),
                }
            }
            (inline, nested)
        };
        self.push_item(kind, clean_inline(&inline));
        for list in nested {
            self.nested_items(list, kind);
        }
    }

    /// Nested lists are flattened into the enclosing list block.
    fn nested_items(&mut self, list: &ElementNode, kind: ListKind) {
        for child in &list.children {
            if let DomNode::Element(li) = child {
                if li.tag == Tag::Li {
                    self.list_item(li, kind);
                } else if li.tag.is_list() {
                    self.nested_items(li, kind);
                }
            }
        }
    }

    /// Consecutive items of one kind share a block; a kind change starts a new one.
    fn push_item(&mut self, kind: ListKind, item: String) {
        if let Some(last) = self.blocks.last_mut() {
            if last.list_kind() == Some(kind) {
                match last {
                    ContentBlock::OrderedList { items } | ContentBlock::UnorderedList { items } => {
                        items.push(item);
                        return;
                    }
                    _ => {}
                }
            }
        }
        self.blocks.push(ContentBlock::list(kind, vec![item]));
    }
}

fn has_block_children(children: &[DomNode]) -> bool {
    children
        .iter()
        .any(|n| matches!(n, DomNode::Element(e) if e.tag.is_block()))
}

/// Quill's `data-list` wins over the container tag.
fn item_kind(li: &ElementNode, default: ListKind) -> ListKind {
    match li.attr("data-list") {
        Some("ordered") => ListKind::Ordered,
        Some("bullet") | Some("checked") | Some("unchecked") => ListKind::Unordered,
        _ => default,
    }
}

/// Editor-only UI markup with no content (Quill list markers, cursors).
fn is_editor_ui(elem: &ElementNode) -> bool {
    let ui = elem.has_class("ql-ui")
        || elem.has_class("ql-cursor")
        || elem.attr("contenteditable") == Some("false");
    ui && elem
        .text_content()
        .chars()
        .all(|c| c.is_whitespace() || is_zero_width(c))
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}')
}

/// Split inline content at every `<br>`, at any depth. Formatting elements
/// that straddle a break are cloned onto both sides so tags stay balanced.
fn split_at_breaks(nodes: &[DomNode]) -> Vec<Vec<DomNode>> {
    let mut parts: Vec<Vec<DomNode>> = vec![Vec::new()];
    for node in nodes {
        match node {
            DomNode::Element(e) if e.tag == Tag::Br => parts.push(Vec::new()),
            DomNode::Element(e) if contains_break(&e.children) => {
                let inner = split_at_breaks(&e.children);
                for (i, piece) in inner.into_iter().enumerate() {
                    if i > 0 {
                        parts.push(Vec::new());
                    }
                    let mut shell = ElementNode::new(e.tag.clone());
                    shell.attributes = e.attributes.clone();
                    shell.children = piece;
                    if let Some(last) = parts.last_mut() {
                        last.push(DomNode::Element(shell));
                    }
                }
            }
            other => {
                if let Some(last) = parts.last_mut() {
                    last.push(other.clone());
                }
            }
        }
    }
    parts
}

fn contains_break(nodes: &[DomNode]) -> bool {
    nodes.iter().any(|n| match n {
        DomNode::Element(e) => e.tag == Tag::Br || contains_break(&e.children),
        DomNode::Text(_) => false,
    })
}

enum Piece {
    Text(String),
    Tag(String),
}

/// Clean inline markup: whitespace collapsed across tag boundaries, edges
/// trimmed, only `strong b em i u s a[href]` kept, other wrappers unwrapped,
/// empty wrappers and editor UI removed.
fn clean_inline(nodes: &[DomNode]) -> String {
    let mut pieces = Vec::new();
    let mut prev_space = true;
    emit_inline(nodes, &mut pieces, &mut prev_space);

    // Trim the single trailing space, wherever the last text ended up.
    if let Some(Piece::Text(last)) = pieces
        .iter_mut()
        .rev()
        .find(|p| matches!(p, Piece::Text(t) if !t.is_empty()))
    {
        if last.ends_with(' ') {
            last.pop();
        }
    }

    let mut out = String::new();
    for piece in &pieces {
        match piece {
            Piece::Text(t) => out.push_str(&escape_text(t)),
            Piece::Tag(t) => out.push_str(t),
        }
    }
    out
}

fn emit_inline(nodes: &[DomNode], pieces: &mut Vec<Piece>, prev_space: &mut bool) {
    for node in nodes {
        match node {
            DomNode::Text(text) => {
                let mut collapsed = String::new();
                for c in text.chars() {
                    if is_zero_width(c) {
                        continue;
                    }
                    if c.is_whitespace() && c != '\u{00A0}' {
                        if !*prev_space {
                            collapsed.push(' ');
                            *prev_space = true;
                        }
                    } else {
                        collapsed.push(c);
                        *prev_space = false;
                    }
                }
                if !collapsed.is_empty() {
                    pieces.push(Piece::Text(collapsed));
                }
            }
            DomNode::Element(e) => {
                if is_editor_ui(e) || matches!(e.tag, Tag::Script | Tag::Style | Tag::Img) {
                    continue;
                }
                if e.tag == Tag::Br {
                    // Only reachable inside list items: a break reads as a space.
                    soft_space(pieces, prev_space);
                    continue;
                }
                if e.tag.is_block() {
                    // Flattened block (a `<p>` inside a list item): its edges read as spaces.
                    soft_space(pieces, prev_space);
                    emit_inline(&e.children, pieces, prev_space);
                    soft_space(pieces, prev_space);
                    continue;
                }
                let Some(open) = kept_open_tag(e) else {
                    emit_inline(&e.children, pieces, prev_space);
                    continue;
                };
                let mark = pieces.len();
                pieces.push(Piece::Tag(open));
                emit_inline(&e.children, pieces, prev_space);
                let has_text = pieces[mark..]
                    .iter()
                    .any(|p| matches!(p, Piece::Text(t) if !t.trim().is_empty()));
                if has_text {
                    pieces.push(Piece::Tag(format!("</{}>", e.tag.name())));
                } else {
                    // Empty wrapper: drop it but keep any whitespace it held.
                    let inner: Vec<Piece> = pieces.drain(mark..).skip(1).collect();
                    pieces.extend(inner.into_iter().filter(|p| matches!(p, Piece::Text(_))));
                }
            }
        }
    }
}

fn soft_space(pieces: &mut Vec<Piece>, prev_space: &mut bool) {
    if !*prev_space {
        pieces.push(Piece::Text(" ".to_string()));
        *prev_space = true;
    }
}

fn kept_open_tag(e: &ElementNode) -> Option<String> {
    match e.tag {
        Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::U | Tag::S => {
            Some(format!("<{}>", e.tag.name()))
        }
        Tag::A => Some(match e.attr("href") {
            Some(href) => format!("<a href=\"{}\">", escape_text(href).replace('"', "&quot;")),
            None => "<a>".to_string(),
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Plain-text input
// ---------------------------------------------------------------------------

fn normalize_plain_text(text: &str) -> Vec<ContentBlock> {
    let text = text.replace("\r\n", "\n");
    let mut normalizer = Normalizer::default();

    for paragraph in BLANK_LINE.split(&text) {
        let lines: Vec<&str> = paragraph
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let Some(first) = lines.first() else {
            continue;
        };

        match marker_kind(first) {
            Some(mut kind) => {
                for line in &lines {
                    if let Some(k) = marker_kind(line) {
                        kind = k;
                    }
                    normalizer.push_item(kind, plain_segment(strip_marker(line)));
                }
            }
            None => {
                let segments = lines.iter().map(|l| plain_segment(l)).collect();
                normalizer.blocks.push(ContentBlock::paragraph(segments));
            }
        }
    }
    normalizer.blocks
}

fn marker_kind(line: &str) -> Option<ListKind> {
    if NUMBER_MARKER.is_match(line) {
        Some(ListKind::Ordered)
    } else if BULLET_MARKER.is_match(line) || LETTER_MARKER.is_match(line) {
        Some(ListKind::Unordered)
    } else {
        None
    }
}

fn strip_marker(line: &str) -> &str {
    for re in [&*BULLET_MARKER, &*NUMBER_MARKER, &*LETTER_MARKER] {
        if let Some(m) = re.find(line) {
            return &line[m.end()..];
        }
    }
    line
}

fn plain_segment(line: &str) -> String {
    let collapsed: Vec<&str> = line.split_whitespace().collect();
    escape_text(&collapsed.join(" "))
}
