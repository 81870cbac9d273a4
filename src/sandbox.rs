//! Rendering sandbox – a live, isolated instance of a template page that
//! answers "how wide does this run render in the letter column?".
//!
//! Launching parses the template's first-page markup, lays the page out with
//! Taffy on the physical page size, and resolves the `.letter-text`
//! container's content width and font size. Each probe inserts a hidden
//! `white-space: nowrap` span holding the run into the container, measures
//! it, and removes it again. The sandbox belongs to one request and is torn
//! down when dropped.

use std::time::{Duration, Instant};

use taffy::prelude::*;

use crate::dom::{element_at, element_at_mut, find_path_by_class, parse_html, DomNode, ElementNode, Tag};
use crate::error::{Error, Result};
use crate::fonts::FontManager;
use crate::measure::TextMeasurer;
use crate::pipeline::LetterForm;
use crate::templates::{AssetStore, LetterheadTemplate};

/// Class of the element whose width governs line breaking.
pub const MEASURE_HOOK_CLASS: &str = "letter-text";

const PT_PER_PX: f32 = 0.75;
const PT_PER_MM: f32 = 72.0 / 25.4;
const DEFAULT_FONT_SIZE: f32 = 9.0;
const DEFAULT_LINE_FACTOR: f32 = 1.667;
/// Slack for float noise when comparing a probe with the column width.
const FIT_EPSILON: f32 = 0.01;

/// Launch options for a [`RenderSandbox`].
#[derive(Clone)]
pub struct SandboxOptions {
    pub fonts: FontManager,
    /// Deadline for the whole sandbox session; 0 disables it.
    pub timeout_ms: u64,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            fonts: FontManager::default(),
            timeout_ms: 30_000,
        }
    }
}

/// Resolved measurement container.
#[derive(Debug, Clone)]
struct MeasureHook {
    path: Vec<usize>,
    content_width: f32,
    font_size: f32,
}

/// A live template page used for exact line measurement.
pub struct RenderSandbox {
    label: String,
    page: Vec<DomNode>,
    hook: Option<MeasureHook>,
    fonts: FontManager,
    started: Instant,
    timeout_ms: u64,
    probes: usize,
}

impl RenderSandbox {
    /// Render the template's first page (no text, no signature) and locate
    /// the measurement container.
    pub fn launch(
        template: &LetterheadTemplate,
        form: &LetterForm,
        assets: &AssetStore,
        options: SandboxOptions,
    ) -> Result<Self> {
        let markup = template.measurement_page(form, assets);
        Self::from_markup(template.id, &markup, options)
    }

    /// Launch on arbitrary page markup.
    pub fn from_markup(label: &str, markup: &str, options: SandboxOptions) -> Result<Self> {
        let started = Instant::now();
        let page = parse_html(markup);

        let hook = match find_path_by_class(&page, MEASURE_HOOK_CLASS) {
            Some(path) => Some(resolve_hook(&page, path, &options.fonts)?),
            None => {
                log::warn!(
                    "template page '{label}' has no .{MEASURE_HOOK_CLASS} container; every measurement will report overflow"
                );
                None
            }
        };

        let sandbox = Self {
            label: label.to_string(),
            page,
            hook,
            fonts: options.fonts,
            started,
            timeout_ms: options.timeout_ms,
            probes: 0,
        };
        sandbox.check_deadline()?;
        if let Some(hook) = &sandbox.hook {
            log::debug!(
                "sandbox '{}' ready: column {:.2}pt at {}pt",
                sandbox.label,
                hook.content_width,
                hook.font_size
            );
        }
        Ok(sandbox)
    }

    /// Whether the page has a measurement container.
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Content-box width of the measurement container in pt.
    pub fn content_width(&self) -> Option<f32> {
        self.hook.as_ref().map(|h| h.content_width)
    }

    pub fn font_size(&self) -> Option<f32> {
        self.hook.as_ref().map(|h| h.font_size)
    }

    pub fn probes(&self) -> usize {
        self.probes
    }

    /// Serialized container, for checking that probes leave nothing behind.
    pub fn container_html(&self) -> Option<String> {
        let hook = self.hook.as_ref()?;
        element_at(&self.page, &hook.path).map(ElementNode::inner_html)
    }

    /// Rendered width of an inline-HTML run on one unwrapped line, or `None`
    /// when the page has no measurement container.
    pub fn probe_width(&mut self, run: &str) -> Result<Option<f32>> {
        self.check_deadline()?;
        let Some(hook) = self.hook.as_ref() else {
            return Ok(None);
        };
        let container = element_at_mut(&mut self.page, &hook.path)
            .ok_or_else(|| Error::Sandbox("measurement container vanished".into()))?;

        let mut probe = ElementNode::new(Tag::Span);
        probe
            .attributes
            .insert("class".into(), "measure-probe".into());
        probe.attributes.insert(
            "style".into(),
            "position: absolute; visibility: hidden; white-space: nowrap".into(),
        );
        probe.children = parse_html(run);
        container.children.push(DomNode::Element(probe));

        let width = match container.children.last() {
            Some(DomNode::Element(probe)) => {
                let mut prev_space = true;
                inline_width(
                    &probe.children,
                    &self.fonts,
                    hook.font_size,
                    Emphasis::default(),
                    &mut prev_space,
                )
            }
            _ => 0.0,
        };
        container.children.pop();
        self.probes += 1;
        Ok(Some(width))
    }

    fn check_deadline(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Ok(());
        }
        if self.started.elapsed() > Duration::from_millis(self.timeout_ms) {
            return Err(Error::SandboxTimeout(self.timeout_ms));
        }
        Ok(())
    }
}

impl Drop for RenderSandbox {
    fn drop(&mut self) {
        log::debug!(
            "sandbox '{}' torn down after {} probes in {:?}",
            self.label,
            self.probes,
            self.started.elapsed()
        );
    }
}

/// Exact measurer backed by a [`RenderSandbox`].
pub struct SandboxMeasurer {
    sandbox: RenderSandbox,
}

impl SandboxMeasurer {
    pub fn new(sandbox: RenderSandbox) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &RenderSandbox {
        &self.sandbox
    }
}

impl TextMeasurer for SandboxMeasurer {
    fn fits(&mut self, run: &str, indent_reserve: f32) -> Result<bool> {
        let Some(width) = self.sandbox.probe_width(run)? else {
            return Ok(false);
        };
        let available = self.sandbox.content_width().unwrap_or(0.0) - indent_reserve;
        Ok(width <= available + FIT_EPSILON)
    }
}

// ---------------------------------------------------------------------------
// Inline measurement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Emphasis {
    bold: bool,
    italic: bool,
}

/// Width of inline content with whitespace collapsed, as `nowrap` renders it.
fn inline_width(
    nodes: &[DomNode],
    fonts: &FontManager,
    font_size: f32,
    emphasis: Emphasis,
    prev_space: &mut bool,
) -> f32 {
    let mut width = 0.0;
    for node in nodes {
        match node {
            DomNode::Text(text) => {
                let mut collapsed = String::with_capacity(text.len());
                for c in text.chars() {
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
                width += fonts.measure_text_width(
                    &collapsed,
                    font_size,
                    emphasis.bold,
                    emphasis.italic,
                );
            }
            DomNode::Element(e) => {
                let mut inner = emphasis;
                match e.tag {
                    Tag::Strong | Tag::B => inner.bold = true,
                    Tag::Em | Tag::I => inner.italic = true,
                    Tag::Script | Tag::Style => continue,
                    _ => {}
                }
                width += inline_width(&e.children, fonts, font_size, inner, prev_space);
            }
        }
    }
    width
}

// ---------------------------------------------------------------------------
// Page layout
// ---------------------------------------------------------------------------

/// Lay the page out and read the container's content box.
fn resolve_hook(page: &[DomNode], path: Vec<usize>, fonts: &FontManager) -> Result<MeasureHook> {
    let root = page
        .iter()
        .position(|n| matches!(n, DomNode::Element(_)))
        .ok_or_else(|| Error::Sandbox("template page has no root element".into()))?;
    let DomNode::Element(root_elem) = &page[root] else {
        return Err(Error::Sandbox("template page has no root element".into()));
    };
    let container = element_at(page, &path)
        .ok_or_else(|| Error::Sandbox("measurement container path is invalid".into()))?;

    let page_width = style_length(root_elem, "width").unwrap_or(595.28);
    let page_height = style_length(root_elem, "height").unwrap_or(841.89);

    // Fractional point widths must survive; the PDF wraps to the declared column.
    let mut taffy: TaffyTree<()> = TaffyTree::new();
    taffy.disable_rounding();
    let mut builder = PageLayoutBuilder {
        taffy,
        fonts,
        target: &path,
        target_node: None,
    };
    let root_node = builder.build(root_elem, &mut vec![root], DEFAULT_FONT_SIZE)?;
    builder
        .taffy
        .compute_layout(
            root_node,
            Size {
                width: AvailableSpace::Definite(page_width),
                height: AvailableSpace::Definite(page_height),
            },
        )
        .map_err(|e| Error::Sandbox(format!("page layout failed: {e}")))?;

    let node = builder
        .target_node
        .ok_or_else(|| Error::Sandbox("measurement container is outside the page root".into()))?;
    let layout = builder
        .taffy
        .layout(node)
        .map_err(|e| Error::Sandbox(format!("page layout failed: {e}")))?;

    let padding = box_lengths(container, "padding");
    let content_width = (layout.size.width - padding.left - padding.right).max(0.0);
    let font_size = style_length(container, "font-size").unwrap_or(DEFAULT_FONT_SIZE);

    Ok(MeasureHook {
        path,
        content_width,
        font_size,
    })
}

struct PageLayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    target: &'a [usize],
    target_node: Option<NodeId>,
}

impl PageLayoutBuilder<'_> {
    fn build(&mut self, elem: &ElementNode, path: &mut Vec<usize>, font_size: f32) -> Result<NodeId> {
        let font_size = style_length(elem, "font-size").unwrap_or(font_size);
        let style = element_style(elem);

        let node = if elem.tag.is_void() {
            self.taffy.new_leaf(style)
        } else {
            let mut children = Vec::new();
            for (i, child) in elem.children.iter().enumerate() {
                match child {
                    DomNode::Element(e) => {
                        path.push(i);
                        children.push(self.build(e, path, font_size)?);
                        path.pop();
                    }
                    DomNode::Text(t) if !t.trim().is_empty() => {
                        children.push(self.text_leaf(t, font_size)?);
                    }
                    DomNode::Text(_) => {}
                }
            }
            self.taffy.new_with_children(style, &children)
        }
        .map_err(|e| Error::Sandbox(format!("page layout failed: {e}")))?;

        if path.as_slice() == self.target {
            self.target_node = Some(node);
        }
        Ok(node)
    }

    fn text_leaf(&mut self, text: &str, font_size: f32) -> Result<NodeId> {
        let collapsed: Vec<&str> = text.split_whitespace().collect();
        let width = self
            .fonts
            .measure_text_width(&collapsed.join(" "), font_size, false, false);
        let height = self.fonts.line_height_pt(font_size, DEFAULT_LINE_FACTOR);
        self.taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Length(width),
                    height: Dimension::Length(height),
                },
                ..Default::default()
            })
            .map_err(|e| Error::Sandbox(format!("page layout failed: {e}")))
    }
}

/// Translate an element's inline style into a Taffy style. Block elements
/// become column flex containers, like the rest of the layout code.
fn element_style(elem: &ElementNode) -> Style {
    let mut ts = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        ..Default::default()
    };
    let value = |prop: &str| elem.style_value(prop);

    match value("display").as_deref() {
        Some("flex") => {
            ts.flex_direction = match value("flex-direction").as_deref() {
                Some("column") => taffy::FlexDirection::Column,
                _ => taffy::FlexDirection::Row,
            };
        }
        Some("none") => ts.display = taffy::Display::None,
        _ => {}
    }
    if value("position").as_deref() == Some("absolute") {
        ts.position = taffy::Position::Absolute;
    }
    if value("justify-content").as_deref() == Some("space-between") {
        ts.justify_content = Some(taffy::JustifyContent::SpaceBetween);
    }

    if let Some(d) = value("width").and_then(|v| parse_dimension(&v)) {
        ts.size.width = d;
    }
    if let Some(d) = value("height").and_then(|v| parse_dimension(&v)) {
        ts.size.height = d;
    }
    if let Some(d) = value("max-width").and_then(|v| parse_dimension(&v)) {
        ts.max_size.width = d;
    }

    let padding = box_lengths(elem, "padding");
    ts.padding = Rect {
        top: LengthPercentage::Length(padding.top),
        right: LengthPercentage::Length(padding.right),
        bottom: LengthPercentage::Length(padding.bottom),
        left: LengthPercentage::Length(padding.left),
    };
    ts.margin = Rect {
        top: margin_value(elem, "margin-top"),
        right: LengthPercentageAuto::Length(0.0),
        bottom: margin_value(elem, "margin-bottom"),
        left: LengthPercentageAuto::Length(0.0),
    };
    if let Some(gap) = value("gap").and_then(|v| parse_length(&v)) {
        ts.gap = Size {
            width: LengthPercentage::Length(gap),
            height: LengthPercentage::Length(gap),
        };
    }

    if let Some(flex) = value("flex") {
        if let Ok(grow) = flex.trim().parse::<f32>() {
            ts.flex_grow = grow;
            ts.flex_shrink = 1.0;
            ts.flex_basis = taffy::Dimension::Length(0.0);
            // Let flex items compress below their content size.
            ts.min_size.width = taffy::Dimension::Length(0.0);
        }
    }
    if let Some(shrink) = value("flex-shrink").and_then(|v| v.trim().parse::<f32>().ok()) {
        ts.flex_shrink = shrink;
    }
    ts
}

fn margin_value(elem: &ElementNode, prop: &str) -> LengthPercentageAuto {
    match elem.style_value(prop).as_deref() {
        Some("auto") => LengthPercentageAuto::Auto,
        Some(v) => LengthPercentageAuto::Length(parse_length(v).unwrap_or(0.0)),
        None => LengthPercentageAuto::Length(0.0),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Edges {
    top: f32,
    right: f32,
    bottom: f32,
    left: f32,
}

/// Resolve a box shorthand (`padding: 1 2 3 4`) plus its longhands.
fn box_lengths(elem: &ElementNode, prop: &str) -> Edges {
    let mut edges = Edges::default();
    for (key, value) in elem.style_decls() {
        if key == prop {
            let parts: Vec<f32> = value
                .split_whitespace()
                .map(|p| parse_length(p).unwrap_or(0.0))
                .collect();
            let (t, r, b, l) = match parts.as_slice() {
                [a] => (*a, *a, *a, *a),
                [v, h] => (*v, *h, *v, *h),
                [t, h, b] => (*t, *h, *b, *h),
                [t, r, b, l, ..] => (*t, *r, *b, *l),
                [] => continue,
            };
            edges = Edges {
                top: t,
                right: r,
                bottom: b,
                left: l,
            };
        } else if let Some(side) = key.strip_prefix(prop).and_then(|s| s.strip_prefix('-')) {
            let v = parse_length(&value).unwrap_or(0.0);
            match side {
                "top" => edges.top = v,
                "right" => edges.right = v,
                "bottom" => edges.bottom = v,
                "left" => edges.left = v,
                _ => {}
            }
        }
    }
    edges
}

fn style_length(elem: &ElementNode, prop: &str) -> Option<f32> {
    elem.style_value(prop).and_then(|v| parse_length(&v))
}

/// Absolute length in pt (`pt`, `px`, `mm`, unitless).
fn parse_length(value: &str) -> Option<f32> {
    let v = value.trim();
    let (number, factor) = if let Some(n) = v.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = v.strip_suffix("px") {
        (n, PT_PER_PX)
    } else if let Some(n) = v.strip_suffix("mm") {
        (n, PT_PER_MM)
    } else {
        (v, 1.0)
    };
    number.trim().parse::<f32>().ok().map(|n| n * factor)
}

fn parse_dimension(value: &str) -> Option<taffy::Dimension> {
    let v = value.trim();
    if v == "auto" {
        return Some(taffy::Dimension::Auto);
    }
    if let Some(p) = v.strip_suffix('%') {
        return p.trim().parse::<f32>().ok().map(|p| taffy::Dimension::Percent(p / 100.0));
    }
    parse_length(v).map(taffy::Dimension::Length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates;

    fn launch(id: &str) -> RenderSandbox {
        let template = templates::find(id).unwrap();
        RenderSandbox::launch(
            template,
            &LetterForm::default(),
            &AssetStore::default(),
            SandboxOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn sandbox_column_matches_template_geometry() {
        for template in templates::all() {
            let sandbox = launch(template.id);
            let width = sandbox.content_width().unwrap();
            assert!(
                (width - template.geometry.column_width()).abs() < 0.05,
                "{}: sandbox {width} vs declared {}",
                template.id,
                template.geometry.column_width()
            );
            assert_eq!(sandbox.font_size(), Some(9.0));
        }
    }

    #[test]
    fn sandbox_column_keeps_fractional_points() {
        let sandbox = launch("a6labs-letterhead-1");
        let width = sandbox.content_width().unwrap();
        assert!((width - 324.28).abs() < 0.01, "column collapsed to {width}");
    }

    #[test]
    fn probe_measures_bold_wider_and_leaves_no_residue() {
        let mut sandbox = launch("a6labs-letterhead-1");
        let before = sandbox.container_html();
        let plain = sandbox.probe_width("Operations").unwrap().unwrap();
        let bold = sandbox.probe_width("<strong>Operations</strong>").unwrap().unwrap();
        assert!(bold > plain);
        assert_eq!(sandbox.container_html(), before);
        assert_eq!(sandbox.probes(), 2);
    }

    #[test]
    fn probe_collapses_whitespace() {
        let mut sandbox = launch("a6labs-letterhead-1");
        let a = sandbox.probe_width("a b").unwrap().unwrap();
        let b = sandbox.probe_width("a   <em> b</em>").unwrap().unwrap();
        assert!((a - b).abs() < 0.001);
    }

    #[test]
    fn measurer_respects_column_and_indent() {
        let sandbox = launch("a6labs-letterhead-1");
        let column = sandbox.content_width().unwrap();
        let mut measurer = SandboxMeasurer::new(sandbox);
        assert!(measurer.fits("Dear Melanie,", 0.0).unwrap());
        let long = "word ".repeat(80);
        assert!(!measurer.fits(long.trim(), 0.0).unwrap());
        assert!(!measurer.fits("x", column).unwrap());
    }

    #[test]
    fn missing_hook_reports_overflow() {
        let markup = r#"<div class="page" style="width: 595.28pt; height: 841.89pt"><div class="body-text">x</div></div>"#;
        let sandbox = RenderSandbox::from_markup("bare", markup, SandboxOptions::default()).unwrap();
        assert!(!sandbox.has_hook());
        let mut measurer = SandboxMeasurer::new(sandbox);
        assert!(!measurer.fits("a", 0.0).unwrap());
    }

    #[test]
    fn elapsed_deadline_is_timeout() {
        let markup = r#"<div class="page"><div class="letter-text" style="width: 100pt"></div></div>"#;
        let options = SandboxOptions {
            timeout_ms: 50,
            ..SandboxOptions::default()
        };
        let mut sandbox = RenderSandbox::from_markup("slow", markup, options).unwrap();
        std::thread::sleep(Duration::from_millis(80));
        assert!(matches!(
            sandbox.probe_width("late"),
            Err(Error::SandboxTimeout(50))
        ));
    }

    #[test]
    fn lengths_parse_units() {
        assert_eq!(parse_length("29pt"), Some(29.0));
        assert_eq!(parse_length("20px"), Some(15.0));
        assert!((parse_length("210mm").unwrap() - 595.28).abs() < 0.01);
        assert_eq!(parse_length("bogus"), None);
        assert_eq!(parse_dimension("100%"), Some(taffy::Dimension::Percent(1.0)));
    }
}
