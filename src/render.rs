//! PDF renderer – draws a paginated [`LetterDocument`] with `printpdf`
//! (v0.8 ops-based API).
//!
//! Page chrome (background, header, date/title, recipient, stamps, page
//! number, signature) is drawn from the template's geometry; each page's text
//! fragment is re-parsed and set in the letter column with the builtin
//! Helvetica faces, whose widths are the ones [`FontManager`] measures with.

use std::collections::HashMap;

use printpdf::*;

use crate::dom::{parse_html, DomNode, ElementNode, Tag};
use crate::error::{Error, Result};
use crate::fonts::FontManager;
use crate::pipeline::{LetterDocument, LetterForm};
use crate::templates::{self, AssetStore, Family, LetterheadTemplate};

const PT_TO_MM: f32 = 0.352778;
const LOGO_WIDTH_LABS: f32 = 86.0;
const LOGO_HEIGHT_DUAL: f32 = 16.0;
const LOGO_TEXT_SIZE: f32 = 24.0;
const STAMP_TEXT_SIZE: f32 = 10.0;
const BULLET_RADIUS: f32 = 1.4;

/// Render every page of a document into PDF bytes.
///
/// Missing or undecodable images fall back to the same text placeholders
/// the HTML uses (a `log::warn` is emitted by the asset store).
pub fn render_pdf(document: &LetterDocument, assets: &AssetStore) -> Result<Vec<u8>> {
    let template = templates::find(&document.template_id)?;
    let g = &template.geometry;
    let page_w = Mm(g.page_width * PT_TO_MM);
    let page_h = Mm(g.page_height * PT_TO_MM);

    let title = if document.form.letter_title.trim().is_empty() {
        "Letter"
    } else {
        document.form.letter_title.as_str()
    };
    let mut doc = PdfDocument::new(title);
    let images = register_images(&mut doc, template, assets);
    let fonts = FontManager::default();

    let total = document.pages.len().max(1);
    let mut pages = Vec::with_capacity(total);
    for (i, page) in document.pages.iter().enumerate() {
        let mut canvas = Canvas::new(g.page_height);
        let ctx = PageContext {
            template,
            form: &document.form,
            fonts: &fonts,
            images: &images,
            number: i + 1,
            total,
        };
        ctx.draw(&mut canvas, &page.content_html)?;
        pages.push(PdfPage::new(page_w, page_h, canvas.ops));
    }
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    if bytes.is_empty() {
        return Err(Error::Render("printpdf produced an empty document".into()));
    }
    log::info!("rendered {} PDF page(s), {} bytes", total, bytes.len());
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

fn register_images(
    doc: &mut PdfDocument,
    template: &LetterheadTemplate,
    assets: &AssetStore,
) -> HashMap<&'static str, ImageResource> {
    let names = [
        Some(template.assets.logo),
        Some(template.assets.stamp),
        Some(template.assets.background),
        template.assets.partner_logo,
        template.assets.partner_stamp,
    ];
    let mut resources = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();

    for name in names.into_iter().flatten() {
        let Some(bytes) = assets.load(name) else {
            continue;
        };
        // Decode with the `image` crate to obtain pixel dimensions.
        let decoded = match ::image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("skipping asset {name}: decode error: {e}");
                continue;
            }
        };
        let raw = match RawImage::decode_from_bytes(&bytes, &mut warnings) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("skipping asset {name}: PDF encode error: {e}");
                continue;
            }
        };
        let xobj_id = doc.add_image(&raw);
        resources.insert(
            name,
            ImageResource {
                xobj_id,
                px_width: decoded.width(),
                px_height: decoded.height(),
            },
        );
    }
    resources
}

// ---------------------------------------------------------------------------
// Drawing primitives (top-left origin, pt)
// ---------------------------------------------------------------------------

fn rgb(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .unwrap_or(0) as f32
            / 255.0
    };
    Color::Rgb(Rgb {
        r: channel(0),
        g: channel(2),
        b: channel(4),
        icc_profile: None,
    })
}

fn builtin(bold: bool, italic: bool) -> BuiltinFont {
    match (bold, italic) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

/// Map text onto the ASCII range the builtin fonts are written with.
fn to_pdf_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\u{00A0}' => out.push(' '),
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' => out.push('*'),
            c if c.is_ascii() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

struct Canvas {
    ops: Vec<Op>,
    page_height: f32,
}

impl Canvas {
    fn new(page_height: f32) -> Self {
        Self {
            ops: Vec::new(),
            page_height,
        }
    }

    fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: &str) {
        let y1 = self.page_height - top - height;
        let y2 = self.page_height - top;
        self.ops.push(Op::SetFillColor { col: rgb(color) });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        point(x, y1),
                        point(x + width, y1),
                        point(x + width, y2),
                        point(x, y2),
                    ],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: &str) {
        self.ops.push(Op::SetOutlineColor { col: rgb(color) });
        self.ops.push(Op::SetOutlineThickness { pt: Pt(thickness) });
        self.ops.push(Op::DrawLine {
            line: Line {
                points: vec![
                    point(from.0, self.page_height - from.1),
                    point(to.0, self.page_height - to.1),
                ],
                is_closed: false,
            },
        });
    }

    /// Circle approximated by a polygon; filled or outlined.
    fn circle(&mut self, cx: f32, cy: f32, r: f32, color: &str, fill: bool) {
        let steps = if r > 10.0 { 48 } else { 12 };
        let points: Vec<LinePoint> = (0..steps)
            .map(|i| {
                let a = i as f32 / steps as f32 * std::f32::consts::TAU;
                point(cx + r * a.cos(), self.page_height - (cy + r * a.sin()))
            })
            .collect();
        if fill {
            self.ops.push(Op::SetFillColor { col: rgb(color) });
            self.ops.push(Op::DrawPolygon {
                polygon: Polygon {
                    rings: vec![PolygonRing { points }],
                    mode: PaintMode::Fill,
                    winding_order: WindingOrder::NonZero,
                },
            });
        } else {
            self.ops.push(Op::SetOutlineColor { col: rgb(color) });
            self.ops.push(Op::SetOutlineThickness { pt: Pt(1.5) });
            self.ops.push(Op::DrawLine {
                line: Line {
                    points,
                    is_closed: true,
                },
            });
        }
    }

    /// Write a run with its baseline at `baseline` (distance from the top).
    fn text(&mut self, x: f32, baseline: f32, text: &str, size: f32, font: BuiltinFont, color: &str) {
        if text.is_empty() {
            return;
        }
        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(x),
                y: Pt(self.page_height - baseline),
            },
        });
        self.ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(size),
            font,
        });
        self.ops.push(Op::SetFillColor { col: rgb(color) });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(to_pdf_text(text))],
            font,
        });
        self.ops.push(Op::EndTextSection);
    }

    fn image(&mut self, res: &ImageResource, x: f32, top: f32, width: f32, height: f32) {
        // At dpi=72 printpdf renders 1 px = 1 pt, so scale = desired_pt / px_dim.
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
        self.ops.push(Op::UseXobject {
            id: res.xobj_id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(self.page_height - top - height)),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        });
    }
}

impl ImageResource {
    fn height_for_width(&self, width: f32) -> f32 {
        if self.px_width == 0 {
            return width;
        }
        width * self.px_height as f32 / self.px_width as f32
    }

    fn width_for_height(&self, height: f32) -> f32 {
        if self.px_height == 0 {
            return height;
        }
        height * self.px_width as f32 / self.px_height as f32
    }
}

// ---------------------------------------------------------------------------
// Inline text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TextStyle {
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    style: TextStyle,
}

/// Pieces with no space between them (a word may change style midway).
#[derive(Debug, Clone, Default)]
struct Word {
    pieces: Vec<Piece>,
}

enum Token {
    Word(Word),
    Space,
    Break,
}

fn inline_tokens(nodes: &[DomNode], style: TextStyle, out: &mut Vec<Token>) {
    for node in nodes {
        match node {
            DomNode::Text(text) => {
                for c in text.chars() {
                    if c.is_whitespace() && c != '\u{00A0}' {
                        if !matches!(out.last(), Some(Token::Space) | None) {
                            out.push(Token::Space);
                        }
                        continue;
                    }
                    match out.last_mut() {
                        Some(Token::Word(word)) => match word.pieces.last_mut() {
                            Some(piece) if piece.style == style => piece.text.push(c),
                            _ => word.pieces.push(Piece {
                                text: c.to_string(),
                                style,
                            }),
                        },
                        _ => out.push(Token::Word(Word {
                            pieces: vec![Piece {
                                text: c.to_string(),
                                style,
                            }],
                        })),
                    }
                }
            }
            DomNode::Element(e) => {
                let mut inner = style;
                match e.tag {
                    Tag::Br => {
                        out.push(Token::Break);
                        continue;
                    }
                    Tag::Strong | Tag::B => inner.bold = true,
                    Tag::Em | Tag::I => inner.italic = true,
                    Tag::U | Tag::A => inner.underline = true,
                    Tag::Script | Tag::Style | Tag::Img => continue,
                    _ => {}
                }
                inline_tokens(&e.children, inner, out);
            }
        }
    }
}

fn word_width(word: &Word, fonts: &FontManager, size: f32) -> f32 {
    word.pieces
        .iter()
        .map(|p| fonts.measure_text_width(&p.text, size, p.style.bold, p.style.italic))
        .sum()
}

/// Greedy wrap of tokens into lines of words. A break always ends a line;
/// a trailing break adds nothing.
fn wrap_tokens(tokens: Vec<Token>, max_width: f32, fonts: &FontManager, size: f32) -> Vec<Vec<Word>> {
    let space = fonts.measure_text_width(" ", size, false, false);
    let mut lines: Vec<Vec<Word>> = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut width = 0.0;

    for token in tokens {
        match token {
            Token::Space => {}
            Token::Break => {
                lines.push(std::mem::take(&mut current));
                width = 0.0;
            }
            Token::Word(word) => {
                let w = word_width(&word, fonts, size);
                if !current.is_empty() && width + space + w > max_width {
                    lines.push(std::mem::take(&mut current));
                    width = 0.0;
                }
                width += if current.is_empty() { w } else { space + w };
                current.push(word);
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// One line of the letter column.
struct ColumnLine {
    indent: f32,
    marker: Option<Marker>,
    words: Vec<Word>,
}

enum Marker {
    Bullet,
    Number(usize),
}

fn column_lines(
    nodes: &[DomNode],
    width: f32,
    gutters: (f32, f32),
    fonts: &FontManager,
    size: f32,
    out: &mut Vec<ColumnLine>,
) {
    let mut loose: Vec<DomNode> = Vec::new();
    let flush = |loose: &mut Vec<DomNode>, out: &mut Vec<ColumnLine>| {
        if loose.iter().all(|n| matches!(n, DomNode::Text(t) if t.trim().is_empty())) {
            loose.clear();
            return;
        }
        paragraph_lines(loose, width, fonts, size, out);
        loose.clear();
    };

    for node in nodes {
        let DomNode::Element(e) = node else {
            loose.push(node.clone());
            continue;
        };
        match e.tag {
            Tag::P | Tag::Heading(_) | Tag::Blockquote | Tag::Pre => {
                flush(&mut loose, out);
                paragraph_lines(&e.children, width, fonts, size, out);
            }
            Tag::Ol | Tag::Ul => {
                flush(&mut loose, out);
                list_lines(e, width, gutters, fonts, size, out);
            }
            Tag::Div | Tag::Body | Tag::Html => {
                flush(&mut loose, out);
                column_lines(&e.children, width, gutters, fonts, size, out);
            }
            _ => loose.push(node.clone()),
        }
    }
    flush(&mut loose, out);
}

fn paragraph_lines(nodes: &[DomNode], width: f32, fonts: &FontManager, size: f32, out: &mut Vec<ColumnLine>) {
    let mut tokens = Vec::new();
    inline_tokens(nodes, TextStyle::default(), &mut tokens);
    for words in wrap_tokens(tokens, width, fonts, size) {
        out.push(ColumnLine {
            indent: 0.0,
            marker: None,
            words,
        });
    }
}

fn list_lines(
    list: &ElementNode,
    width: f32,
    gutters: (f32, f32),
    fonts: &FontManager,
    size: f32,
    out: &mut Vec<ColumnLine>,
) {
    let ordered = list.tag == Tag::Ol;
    let gutter = if ordered { gutters.0 } else { gutters.1 };
    let mut number = list
        .attr("start")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);

    for child in &list.children {
        let DomNode::Element(li) = child else {
            continue;
        };
        if li.tag != Tag::Li {
            continue;
        }
        let unmarked = li.style_value("list-style-type").as_deref() == Some("none");
        let mut tokens = Vec::new();
        inline_tokens(&li.children, TextStyle::default(), &mut tokens);
        for (i, words) in wrap_tokens(tokens, width - gutter, fonts, size)
            .into_iter()
            .enumerate()
        {
            let marker = match (i, unmarked, ordered) {
                (0, false, true) => Some(Marker::Number(number)),
                (0, false, false) => Some(Marker::Bullet),
                _ => None,
            };
            out.push(ColumnLine {
                indent: gutter,
                marker,
                words,
            });
        }
        number += 1;
    }
}

// ---------------------------------------------------------------------------
// Page drawing
// ---------------------------------------------------------------------------

/// Date and recipient break after every comma, keeping the comma.
fn comma_lines(value: &str) -> Vec<String> {
    let parts: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, s)| if i < last { format!("{s},") } else { s.to_string() })
        .collect()
}

struct PageContext<'a> {
    template: &'a LetterheadTemplate,
    form: &'a LetterForm,
    fonts: &'a FontManager,
    images: &'a HashMap<&'static str, ImageResource>,
    number: usize,
    total: usize,
}

impl PageContext<'_> {
    fn draw(&self, canvas: &mut Canvas, fragment: &str) -> Result<()> {
        let t = self.template;
        let g = &t.geometry;
        let line_h = g.line_height;

        if !t.palette.background.eq_ignore_ascii_case("#ffffff") {
            canvas.fill_rect(0.0, 0.0, g.page_width, g.page_height, t.palette.background);
        }
        self.draw_background_image(canvas);

        let mut top = g.padding + self.draw_header(canvas) + g.header_margin;
        let text_x = g.padding + g.left_column_width + g.column_gap;
        let column = g.column_width();
        let bottom = g.page_height - g.padding;

        if self.number == 1 {
            let date_lines = comma_lines(&self.form.date);
            for (i, line) in date_lines.iter().enumerate() {
                self.write_plain(canvas, g.padding, top + i as f32 * line_h, line, t.palette.muted);
            }
            let title_lines = self.wrap_plain(&self.form.letter_title, column);
            for (i, line) in title_lines.iter().enumerate() {
                self.write_plain(canvas, text_x, top + i as f32 * line_h, line, t.palette.text);
            }
            let rows = date_lines.len().max(title_lines.len()).max(1);
            let margin = match t.family {
                Family::A6Labs => 29.0,
                Family::A6Terraviva => 25.0,
            };
            top += rows as f32 * line_h + margin;
            for (i, line) in comma_lines(&self.form.recipient).iter().enumerate() {
                self.write_plain(canvas, g.padding, top + i as f32 * line_h, line, t.palette.muted);
            }
        }
        self.draw_stamps(canvas, bottom);

        // Letter text.
        let mut lines = Vec::new();
        column_lines(
            &parse_html(fragment),
            column,
            (g.ordered_gutter, g.unordered_gutter),
            self.fonts,
            g.font_size,
            &mut lines,
        );
        let mut y = top;
        for line in &lines {
            self.draw_column_line(canvas, text_x, y, line);
            y += line_h;
        }

        // Signature on the last page; a single page pins it to the bottom.
        if self.number == self.total && !self.form.sender_signature.trim().is_empty() {
            let sig_html = t.format_signature(&self.form.sender_signature);
            let mut sig_lines = Vec::new();
            paragraph_lines(&parse_html(&sig_html), column, self.fonts, g.font_size, &mut sig_lines);
            let height = sig_lines.len() as f32 * line_h;
            let sig_top = if self.total == 1 {
                (bottom - height).max(y + 49.0)
            } else {
                y + 49.0
            };
            for (i, line) in sig_lines.iter().enumerate() {
                self.draw_column_line(canvas, text_x, sig_top + i as f32 * line_h, line);
            }
        }

        // Page number, right-aligned at the bottom corner.
        let label = format!("{}/{}", self.number, self.total);
        let w = self.fonts.measure_text_width(&label, g.font_size, false, false);
        canvas.text(
            g.page_width - g.padding - w,
            g.page_height - g.padding,
            &label,
            g.font_size,
            BuiltinFont::Helvetica,
            t.palette.muted,
        );
        Ok(())
    }

    fn baseline(&self, line_top: f32, size: f32) -> f32 {
        let line_h = self.template.geometry.line_height;
        line_top + (line_h - size) / 2.0 + size * 0.75
    }

    fn write_plain(&self, canvas: &mut Canvas, x: f32, top: f32, text: &str, color: &str) {
        let size = self.template.geometry.font_size;
        canvas.text(x, self.baseline(top, size), text, size, BuiltinFont::Helvetica, color);
    }

    fn wrap_plain(&self, text: &str, width: f32) -> Vec<String> {
        let size = self.template.geometry.font_size;
        let tokens = text
            .split_whitespace()
            .map(|w| {
                Token::Word(Word {
                    pieces: vec![Piece {
                        text: w.to_string(),
                        style: TextStyle::default(),
                    }],
                })
            })
            .collect();
        wrap_tokens(tokens, width, self.fonts, size)
            .into_iter()
            .map(|words| {
                words
                    .iter()
                    .map(|w| w.pieces.iter().map(|p| p.text.as_str()).collect::<String>())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }

    fn draw_column_line(&self, canvas: &mut Canvas, x: f32, top: f32, line: &ColumnLine) {
        let t = self.template;
        let size = t.geometry.font_size;
        let baseline = self.baseline(top, size);
        let content_x = x + line.indent;

        match line.marker {
            Some(Marker::Bullet) => {
                let cx = x + line.indent / 2.0 - BULLET_RADIUS;
                canvas.circle(cx, baseline - size * 0.3, BULLET_RADIUS, t.palette.text, true);
            }
            Some(Marker::Number(n)) => {
                let label = format!("{n}.");
                let w = self.fonts.measure_text_width(&label, size, false, false);
                canvas.text(
                    content_x - w - 3.0,
                    baseline,
                    &label,
                    size,
                    BuiltinFont::Helvetica,
                    t.palette.text,
                );
            }
            None => {}
        }

        let space = self.fonts.measure_text_width(" ", size, false, false);
        let mut cursor = content_x;
        for (i, word) in line.words.iter().enumerate() {
            if i > 0 {
                cursor += space;
            }
            for piece in &word.pieces {
                let w = self
                    .fonts
                    .measure_text_width(&piece.text, size, piece.style.bold, piece.style.italic);
                canvas.text(
                    cursor,
                    baseline,
                    &piece.text,
                    size,
                    builtin(piece.style.bold, piece.style.italic),
                    t.palette.text,
                );
                if piece.style.underline {
                    let y = baseline + size * 0.12;
                    canvas.line((cursor, y), (cursor + w, y), 0.5, t.palette.text);
                }
                cursor += w;
            }
        }
    }

    fn draw_background_image(&self, canvas: &mut Canvas) {
        let g = &self.template.geometry;
        let Some(res) = self.images.get(self.template.assets.background) else {
            return;
        };
        let width = match self.template.family {
            Family::A6Labs => 317.0,
            Family::A6Terraviva => g.page_width,
        };
        let height = res.height_for_width(width);
        canvas.image(res, g.page_width - width, g.page_height - height, width, height);
    }

    /// Draw the header; returns its height.
    fn draw_header(&self, canvas: &mut Canvas) -> f32 {
        let t = self.template;
        let g = &t.geometry;
        let line_h = g.line_height;
        let blocks = t.address_lines();

        match t.family {
            Family::A6Labs => {
                let logo_h = self.draw_logo(canvas, t.assets.logo, "A6 Labs", g.padding, g.padding, None);
                let lines = blocks[0];
                let width = lines
                    .iter()
                    .map(|l| self.fonts.measure_text_width(l, g.font_size, false, false))
                    .fold(0.0, f32::max)
                    .min(320.0);
                let x = g.page_width - g.padding - width;
                for (i, line) in lines.iter().enumerate() {
                    self.write_plain(canvas, x, g.padding + i as f32 * line_h, line, t.palette.muted);
                }
                logo_h.max(lines.len() as f32 * line_h)
            }
            Family::A6Terraviva => {
                let left_h = self.draw_logo(
                    canvas,
                    t.assets.logo,
                    "A6 Labs",
                    g.padding,
                    g.padding,
                    Some(LOGO_HEIGHT_DUAL),
                );
                let right_lines = blocks.get(1).copied().unwrap_or(blocks[0]);
                let right_width = right_lines
                    .iter()
                    .map(|l| self.fonts.measure_text_width(l, g.font_size, false, false))
                    .fold(0.0, f32::max)
                    .min(200.0);
                let right_x = g.page_width - g.padding - right_width;
                let right_h = match t.assets.partner_logo {
                    Some(name) => self.draw_logo(canvas, name, "Terraviva", right_x, g.padding, Some(LOGO_HEIGHT_DUAL)),
                    None => 0.0,
                };
                let addr_top = g.padding + left_h.max(right_h) + 8.0;
                for (i, line) in blocks[0].iter().enumerate() {
                    self.write_plain(canvas, g.padding, addr_top + i as f32 * line_h, line, t.palette.muted);
                }
                for (i, line) in right_lines.iter().enumerate() {
                    self.write_plain(canvas, right_x, addr_top + i as f32 * line_h, line, t.palette.muted);
                }
                let rule_y = addr_top + 2.0 * line_h + 15.0;
                canvas.line(
                    (g.padding, rule_y),
                    (g.page_width - g.padding, rule_y),
                    0.75,
                    "#dfe5ec",
                );
                rule_y - g.padding
            }
        }
    }

    /// Logo image or its text fallback; returns the drawn height.
    fn draw_logo(
        &self,
        canvas: &mut Canvas,
        name: &str,
        label: &str,
        x: f32,
        top: f32,
        height: Option<f32>,
    ) -> f32 {
        if let Some(res) = self.images.get(name) {
            let (w, h) = match height {
                Some(h) => (res.width_for_height(h), h),
                None => (LOGO_WIDTH_LABS, res.height_for_width(LOGO_WIDTH_LABS)),
            };
            canvas.image(res, x, top, w, h);
            return h;
        }
        canvas.text(
            x,
            top + LOGO_TEXT_SIZE * 0.9,
            label,
            LOGO_TEXT_SIZE,
            BuiltinFont::HelveticaBold,
            self.template.palette.accent,
        );
        LOGO_TEXT_SIZE * 1.2
    }

    fn draw_stamps(&self, canvas: &mut Canvas, bottom: f32) {
        let t = self.template;
        if !t.show_stamps {
            return;
        }
        let size = t.geometry.left_column_width;
        let mut stamps = vec![(t.assets.stamp, "A6 LABS")];
        if let Some(partner) = t.assets.partner_stamp {
            stamps.push((partner, "TERRAVIVA"));
        }
        let count = stamps.len() as f32;
        let mut top = bottom - count * size - (count - 1.0) * 15.0;
        for (name, label) in stamps {
            self.draw_stamp(canvas, name, label, t.geometry.padding, top, size);
            top += size + 15.0;
        }
    }

    fn draw_stamp(&self, canvas: &mut Canvas, name: &str, label: &str, x: f32, top: f32, size: f32) {
        if let Some(res) = self.images.get(name) {
            canvas.image(res, x, top, size, size);
            return;
        }
        let accent = self.template.palette.accent;
        let r = size / 2.0;
        canvas.circle(x + r, top + r, r - 1.0, accent, false);
        for (i, text) in [label, "STAMP"].iter().enumerate() {
            let w = self
                .fonts
                .measure_text_width(text, STAMP_TEXT_SIZE, true, false);
            let baseline = top + r - 2.0 + i as f32 * STAMP_TEXT_SIZE * 1.3;
            canvas.text(
                x + r - w / 2.0,
                baseline,
                text,
                STAMP_TEXT_SIZE,
                BuiltinFont::HelveticaBold,
                accent,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::Page;

    fn document(template_id: &str, pages: &[&str]) -> LetterDocument {
        LetterDocument {
            template_id: template_id.to_string(),
            form: LetterForm {
                date: "1 March 2025".into(),
                letter_title: "Authorisation Letter".into(),
                recipient: "Melanie Knight, Partnerships".into(),
                sender_signature: "Sincerely, Alex Ring.".into(),
                letter_text: String::new(),
            },
            pages: pages
                .iter()
                .enumerate()
                .map(|(index, html)| Page {
                    index,
                    max_lines: 34,
                    content_html: html.to_string(),
                    line_count: 1,
                })
                .collect(),
            html: String::new(),
        }
    }

    fn ops_for(fragment: &str, width: f32) -> Vec<ColumnLine> {
        let fonts = FontManager::default();
        let mut lines = Vec::new();
        column_lines(&parse_html(fragment), width, (15.0, 15.0), &fonts, 9.0, &mut lines);
        lines
    }

    #[test]
    fn render_multi_page_letter() {
        let doc = document(
            "a6labs-letterhead-1",
            &["<p>Dear Melanie,</p><p><br></p>", "<ol start=\"3\"><li>third</li></ol>"],
        );
        let bytes = render_pdf(&doc, &AssetStore::default()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn render_terraviva_single_page() {
        let doc = document("a6terraviva-letterhead-1", &["<p><strong>Bold</strong> text</p>"]);
        let bytes = render_pdf(&doc, &AssetStore::default()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let doc = document("missing", &["<p>x</p>"]);
        assert!(matches!(
            render_pdf(&doc, &AssetStore::default()),
            Err(Error::UnknownTemplate(_))
        ));
    }

    #[test]
    fn spacer_paragraph_is_one_line() {
        let lines = ops_for("<p>a</p><p><br></p><p>b<br>c</p>", 300.0);
        assert_eq!(lines.len(), 4);
        assert!(lines[1].words.is_empty());
    }

    #[test]
    fn ordered_numbers_follow_start() {
        let lines = ops_for(
            "<ol start=\"4\"><li style=\"list-style-type: none\">tail</li><li>next</li></ol>",
            300.0,
        );
        assert!(lines[0].marker.is_none());
        assert!(matches!(lines[1].marker, Some(Marker::Number(5))));
        assert_eq!(lines[1].indent, 15.0);
    }

    #[test]
    fn styled_word_pieces_stay_together() {
        let lines = ops_for("<p>A6<strong>Labs</strong> co</p>", 300.0);
        assert_eq!(lines[0].words.len(), 2);
        assert_eq!(lines[0].words[0].pieces.len(), 2);
        assert!(lines[0].words[0].pieces[1].style.bold);
    }

    #[test]
    fn comma_lines_keep_commas() {
        assert_eq!(comma_lines("Dubai, 1 March 2025"), vec!["Dubai,", "1 March 2025"]);
        assert!(comma_lines("  ").is_empty());
    }

    #[test]
    fn pdf_text_is_ascii() {
        assert_eq!(to_pdf_text("A6\u{a0}Labs \u{2014} \u{201C}ok\u{201D} é"), "A6 Labs - \"ok\" ?");
    }
}
