//! Letterhead templates – the registry, page geometry, and the page HTML
//! renderer that places one page of packed letter text into a template.
//!
//! Every template renders two page shapes: a first page (header, date and
//! title row, recipient, stamps) and a continuation page (header and stamps
//! only). Layout-relevant properties are written as inline styles so the
//! measurement sandbox lays the page out from the same markup the final
//! document uses.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use regex::Regex;
use serde::Serialize;

use crate::blocks::ListKind;
use crate::dom::escape_text;
use crate::error::{Error, Result};
use crate::packer::{Page, PageBudget};
use crate::pipeline::LetterForm;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Template family: shared markup and header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Single header with one logo and one stamp.
    A6Labs,
    /// Dual header (two companies) with two stamps.
    A6Terraviva,
}

/// Colours used by the stylesheet and the PDF renderer (hex `#rrggbb`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub accent: &'static str,
}

/// Physical page and text-column measurements, in pt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemplateGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub padding: f32,
    pub header_margin: f32,
    pub left_column_width: f32,
    pub column_gap: f32,
    pub right_padding: f32,
    pub font_size: f32,
    pub line_height_factor: f32,
    /// Height of one visual line as the packer counts it.
    pub line_height: f32,
    pub first_page_text_height: f32,
    pub continuation_text_height: f32,
    pub ordered_gutter: f32,
    pub unordered_gutter: f32,
}

impl TemplateGeometry {
    /// Width of the `.letter-text` column as declared by the template CSS.
    pub fn column_width(&self) -> f32 {
        self.page_width
            - 2.0 * self.padding
            - self.left_column_width
            - self.column_gap
            - self.right_padding
    }

    pub fn first_page_max_lines(&self) -> usize {
        (self.first_page_text_height / self.line_height).floor() as usize
    }

    pub fn continuation_page_max_lines(&self) -> usize {
        (self.continuation_text_height / self.line_height).floor() as usize
    }

    pub fn budget(&self) -> PageBudget {
        PageBudget {
            first_page_max_lines: self.first_page_max_lines(),
            continuation_page_max_lines: self.continuation_page_max_lines(),
        }
    }

    /// Indent reserved for a list item's bullet or number.
    pub fn gutter(&self, kind: ListKind) -> f32 {
        match kind {
            ListKind::Ordered => self.ordered_gutter,
            ListKind::Unordered => self.unordered_gutter,
        }
    }
}

/// Asset file names, relative to the asset directory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemplateAssets {
    pub logo: &'static str,
    pub stamp: &'static str,
    /// Second company's logo and stamp (dual-header templates only).
    pub partner_logo: Option<&'static str>,
    pub partner_stamp: Option<&'static str>,
    pub background: &'static str,
}

/// A registered letterhead template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LetterheadTemplate {
    pub id: &'static str,
    pub company: &'static str,
    pub name: &'static str,
    pub family: Family,
    pub palette: Palette,
    pub geometry: TemplateGeometry,
    pub assets: TemplateAssets,
    pub show_stamps: bool,
}

const A4_WIDTH_PT: f32 = 595.28;
const A4_HEIGHT_PT: f32 = 841.89;

const LABS_GEOMETRY: TemplateGeometry = TemplateGeometry {
    page_width: A4_WIDTH_PT,
    page_height: A4_HEIGHT_PT,
    padding: 29.0,
    header_margin: 97.0,
    left_column_width: 113.0,
    column_gap: 29.0,
    right_padding: 71.0,
    font_size: 9.0,
    line_height_factor: 1.667,
    line_height: 15.0,
    first_page_text_height: 513.0,
    continuation_text_height: 580.0,
    ordered_gutter: 15.0,
    unordered_gutter: 15.0,
};

const TERRAVIVA_GEOMETRY: TemplateGeometry = TemplateGeometry {
    ordered_gutter: 20.0,
    unordered_gutter: 15.0,
    ..LABS_GEOMETRY
};

static TEMPLATES: [LetterheadTemplate; 3] = [
    LetterheadTemplate {
        id: "a6labs-letterhead-1",
        company: "a6labs",
        name: "Template 1",
        family: Family::A6Labs,
        palette: Palette {
            background: "#ffffff",
            text: "#27272a",
            muted: "#a3a3a3",
            accent: "#076143",
        },
        geometry: LABS_GEOMETRY,
        assets: TemplateAssets {
            logo: "a6labs/logo.png",
            stamp: "a6labs/stamp.png",
            partner_logo: None,
            partner_stamp: None,
            background: "a6labs/bg.png",
        },
        show_stamps: true,
    },
    LetterheadTemplate {
        id: "a6labs-letterhead-2",
        company: "a6labs",
        name: "Green BG",
        family: Family::A6Labs,
        palette: Palette {
            background: "#eef5f1",
            text: "#27272a",
            muted: "#7b9a8c",
            accent: "#076143",
        },
        geometry: LABS_GEOMETRY,
        assets: TemplateAssets {
            logo: "a6labs/logo.png",
            stamp: "a6labs/stamp.png",
            partner_logo: None,
            partner_stamp: None,
            background: "a6labs/bg-green.png",
        },
        show_stamps: true,
    },
    LetterheadTemplate {
        id: "a6terraviva-letterhead-1",
        company: "a6terraviva",
        name: "Simple",
        family: Family::A6Terraviva,
        palette: Palette {
            background: "#f0f5fb",
            text: "#27272a",
            muted: "#91b3c7",
            accent: "#076143",
        },
        geometry: TERRAVIVA_GEOMETRY,
        assets: TemplateAssets {
            logo: "a6terraviva/logo-1.png",
            stamp: "a6terraviva/stamp-1.png",
            partner_logo: Some("a6terraviva/logo-2.png"),
            partner_stamp: Some("a6terraviva/stamp-2.png"),
            background: "a6terraviva/bg.png",
        },
        show_stamps: true,
    },
];

/// Every registered template.
pub fn all() -> &'static [LetterheadTemplate] {
    &TEMPLATES
}

/// Look a template up by id. Unknown ids are an error, never a fallback.
pub fn find(id: &str) -> Result<&'static LetterheadTemplate> {
    TEMPLATES
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| Error::UnknownTemplate(id.to_string()))
}

pub fn for_company(company: &str) -> Vec<&'static LetterheadTemplate> {
    TEMPLATES.iter().filter(|t| t.company == company).collect()
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Logo, stamp and background images read from an optional directory.
///
/// A missing directory or file is never fatal: the markup falls back to a
/// text placeholder.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    root: Option<PathBuf>,
}

impl AssetStore {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Raw bytes of an asset, or `None` (logged) when it cannot be read.
    pub fn load(&self, name: &str) -> Option<Vec<u8>> {
        let root = self.root.as_ref()?;
        let path = root.join(name);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("asset {} unavailable: {e}", path.display());
                None
            }
        }
    }

    /// `data:` URI for an asset, for embedding in the HTML document.
    pub fn data_uri(&self, name: &str) -> Option<String> {
        let bytes = self.load(name)?;
        let mime = match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("svg") => "image/svg+xml",
            _ => "image/png",
        };
        Some(format!("data:{mime};base64,{}", BASE64_STD.encode(bytes)))
    }
}

// ---------------------------------------------------------------------------
// Field formatting
// ---------------------------------------------------------------------------

static COMMA_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*").expect("valid regex"));
static PERIOD_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s*").expect("valid regex"));
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s+").expect("valid regex"));
static SINCERELY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)sincerely,").expect("valid regex"));

/// Date and recipient lines break after every comma.
pub fn format_comma_lines(value: &str) -> String {
    COMMA_BREAK
        .replace_all(&escape_text(value), ",<br>")
        .into_owned()
}

impl LetterheadTemplate {
    /// Signature markup: A6 Labs breaks after every period; Terraviva keeps
    /// typed newlines, leaves a blank line after "Sincerely," and breaks
    /// after sentence periods.
    pub fn format_signature(&self, signature: &str) -> String {
        let escaped = escape_text(signature.trim());
        match self.family {
            Family::A6Labs => PERIOD_BREAK.replace_all(&escaped, ".<br>").into_owned(),
            Family::A6Terraviva => {
                let with_newlines = escaped.replace("\r\n", "\n").replace('\n', "<br>");
                let greeted = SINCERELY.replace_all(&with_newlines, "Sincerely,<br><br>");
                SENTENCE_BREAK.replace_all(&greeted, ".<br>").into_owned()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Page markup
// ---------------------------------------------------------------------------

/// Position of a page in the document and whether it carries the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSlot {
    pub number: usize,
    pub total: usize,
    pub signature: bool,
}

impl LetterheadTemplate {
    /// First page: header, date/title row, recipient, stamps, text.
    pub fn first_page(
        &self,
        form: &LetterForm,
        text_html: &str,
        slot: PageSlot,
        assets: &AssetStore,
    ) -> String {
        let g = &self.geometry;
        let date_title_margin = match self.family {
            Family::A6Labs => 29.0,
            Family::A6Terraviva => 25.0,
        };
        let date_title = format!(
            r#"<div class="date-title" style="display: flex; gap: {gap}pt; margin-bottom: {date_title_margin}pt; flex-shrink: 0"><div class="date" style="width: {left}pt">{date}</div><div class="title" style="flex: 1; padding-right: {right}pt">{title}</div></div>"#,
            gap = g.column_gap,
            left = g.left_column_width,
            right = g.right_padding,
            date = format_comma_lines(&form.date),
            title = escape_text(&form.letter_title),
        );
        let recipient = format!(
            r#"<div class="recipient">{}</div>"#,
            format_comma_lines(&form.recipient)
        );
        let one_page_signature = slot.total == 1 && slot.signature;
        let main_class = if one_page_signature {
            "main-content one-page-signature"
        } else {
            "main-content"
        };
        self.page(
            &date_title,
            main_class,
            &recipient,
            text_html,
            form,
            slot,
            assets,
        )
    }

    /// Continuation page: header, stamps, text.
    pub fn continuation_page(
        &self,
        form: &LetterForm,
        text_html: &str,
        slot: PageSlot,
        assets: &AssetStore,
    ) -> String {
        self.page(
            "",
            "main-content continuation",
            "",
            text_html,
            form,
            slot,
            assets,
        )
    }

    /// The page the measurement sandbox lays out: a first page with no text
    /// and no signature.
    pub fn measurement_page(&self, form: &LetterForm, assets: &AssetStore) -> String {
        let slot = PageSlot {
            number: 1,
            total: 1,
            signature: false,
        };
        self.first_page(form, "", slot, assets)
    }

    #[allow(clippy::too_many_arguments)]
    fn page(
        &self,
        date_title: &str,
        main_class: &str,
        recipient: &str,
        text_html: &str,
        form: &LetterForm,
        slot: PageSlot,
        assets: &AssetStore,
    ) -> String {
        let g = &self.geometry;
        let family_class = match self.family {
            Family::A6Labs => "a6labs-page",
            Family::A6Terraviva => "a6terraviva-page",
        };
        let left_class = match self.family {
            Family::A6Labs => "left-column",
            Family::A6Terraviva => "left-column-dual",
        };
        let background = assets
            .data_uri(self.assets.background)
            .map(|uri| {
                format!(
                    r#"<img src="{uri}" class="background-image" alt="" style="position: absolute">"#
                )
            })
            .unwrap_or_default();
        let signature = if slot.signature && !form.sender_signature.trim().is_empty() {
            format!(
                r#"<div class="signature" style="margin-top: 29pt; padding-top: 20pt; flex-shrink: 0">{}</div>"#,
                self.format_signature(&form.sender_signature)
            )
        } else {
            String::new()
        };

        format!(
            concat!(
                r#"<div class="page {family_class}" style="width: {w}pt; height: {h}pt">"#,
                "{background}",
                r#"<div class="content" style="display: flex; flex-direction: column; padding: {pad}pt; height: 100%">"#,
                "{header}{date_title}",
                r#"<div class="{main_class}" style="display: flex; gap: {gap}pt; flex: 1">"#,
                r#"<div class="{left_class}" style="width: {left}pt; display: flex; flex-direction: column; flex-shrink: 0">{recipient}{stamps}</div>"#,
                r#"<div class="right-column" style="flex: 1; padding-right: {right}pt; display: flex; flex-direction: column">"#,
                r#"<div class="letter-text" style="font-size: {font}pt; line-height: {lh}">{text}</div>"#,
                "{signature}",
                "</div></div>",
                r#"<div class="page-number" style="position: absolute">{number}/{total}</div>"#,
                "</div></div>"
            ),
            family_class = family_class,
            w = g.page_width,
            h = g.page_height,
            background = background,
            pad = g.padding,
            header = self.header(assets),
            date_title = date_title,
            main_class = main_class,
            gap = g.column_gap,
            left_class = left_class,
            left = g.left_column_width,
            recipient = recipient,
            stamps = self.stamps(assets),
            right = g.right_padding,
            font = g.font_size,
            lh = g.line_height_factor,
            text = text_html,
            signature = signature,
            number = slot.number,
            total = slot.total,
        )
    }

    fn header(&self, assets: &AssetStore) -> String {
        let margin = self.geometry.header_margin;
        match self.family {
            Family::A6Labs => format!(
                r#"<div class="header" style="display: flex; justify-content: space-between; margin-bottom: {margin}pt; flex-shrink: 0">{logo}<div class="address" style="max-width: 320pt">{address}</div></div>"#,
                logo = logo_html(assets, self.assets.logo, "logo-img", "A6 Labs"),
                address = address_html(LABS_ADDRESS),
            ),
            Family::A6Terraviva => {
                let partner = self
                    .assets
                    .partner_logo
                    .map(|name| logo_html(assets, name, "logo-img-terraviva", "Terraviva"))
                    .unwrap_or_default();
                format!(
                    concat!(
                        r#"<div class="header-dual" style="display: flex; justify-content: space-between; margin-bottom: {margin}pt; padding-bottom: 15pt; flex-shrink: 0">"#,
                        r#"<div class="header-left" style="display: flex; flex-direction: column; gap: 8pt">{logo}<div class="address" style="max-width: 200pt">{left}</div></div>"#,
                        r#"<div class="header-right" style="display: flex; flex-direction: column; gap: 8pt">{partner}<div class="address" style="max-width: 200pt">{right}</div></div>"#,
                        "</div>"
                    ),
                    margin = margin,
                    logo = logo_html(assets, self.assets.logo, "logo-img", "A6 Labs"),
                    left = address_html(TERRAVIVA_LEFT_ADDRESS),
                    partner = partner,
                    right = address_html(TERRAVIVA_RIGHT_ADDRESS),
                )
            }
        }
    }

    fn stamps(&self, assets: &AssetStore) -> String {
        if !self.show_stamps {
            return String::new();
        }
        let size = self.geometry.left_column_width;
        let stamp = |name: &str, label: &str| match assets.data_uri(name) {
            Some(uri) => format!(
                r#"<img src="{uri}" class="stamp-img" alt="{label} Stamp" style="width: {size}pt; height: {size}pt">"#
            ),
            None => format!(
                r#"<div class="stamp-placeholder" style="width: {size}pt; height: {size}pt">{}<br>STAMP</div>"#,
                label.to_uppercase()
            ),
        };
        match self.family {
            Family::A6Labs => format!(
                r#"<div class="stamp-container" style="width: {size}pt; height: {size}pt; margin-top: auto; flex-shrink: 0">{}</div>"#,
                stamp(self.assets.stamp, "A6 Labs")
            ),
            Family::A6Terraviva => {
                let partner = self
                    .assets
                    .partner_stamp
                    .map(|name| stamp(name, "Terraviva"))
                    .unwrap_or_default();
                format!(
                    r#"<div class="stamps-container" style="display: flex; flex-direction: column; gap: 15pt; margin-top: auto">{}{partner}</div>"#,
                    stamp(self.assets.stamp, "A6 Labs")
                )
            }
        }
    }

    /// Stylesheet for the document; layout lives in inline styles.
    pub fn stylesheet(&self) -> String {
        let p = &self.palette;
        let g = &self.geometry;
        format!(
            r#"@page {{ size: A4; margin: 0; }}
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{ font-family: 'Inter', Helvetica, Arial, sans-serif; color: {text}; }}
.page {{ position: relative; overflow: hidden; page-break-after: always; page-break-inside: avoid; background: {bg}; }}
.background-image {{ right: 0; bottom: 0; width: 100%; height: auto; z-index: 0; pointer-events: none; }}
.content {{ position: relative; z-index: 1; }}
.logo-text {{ font-size: 24pt; font-weight: 700; color: {accent}; }}
.logo-img {{ height: 16pt; width: auto; }}
.logo-img-terraviva {{ height: 16pt; width: auto; }}
.address, .date, .recipient {{ font-size: {font}pt; color: {muted}; line-height: {lh}; }}
.title {{ font-size: {font}pt; line-height: {lh}; }}
.stamp-placeholder {{ border: 2px solid {accent}; border-radius: 50%; display: flex; align-items: center; justify-content: center; text-align: center; font-size: 10pt; color: {accent}; font-weight: 600; line-height: 1.3; }}
.letter-text {{ overflow: hidden; }}
.letter-text p {{ margin: 0; }}
.letter-text p:has(br:only-child) {{ height: {line}pt; line-height: {line}pt; }}
.letter-text strong, .letter-text b {{ font-weight: 700; }}
.letter-text em, .letter-text i {{ font-style: italic; }}
.letter-text u {{ text-decoration: underline; }}
.letter-text ol {{ margin: 0; padding: 0 0 0 {ol}pt; list-style: decimal outside; }}
.letter-text ul {{ margin: 0; padding: 0 0 0 {ul}pt; list-style: disc outside; }}
.letter-text li {{ margin: 0; line-height: {lh}; }}
.signature {{ font-size: {font}pt; line-height: {lh}; }}
.main-content.one-page-signature .signature {{ margin-top: auto; }}
.page-number {{ bottom: {pad}pt; right: {pad}pt; font-size: {font}pt; color: {muted}; text-align: right; }}
"#,
            text = p.text,
            bg = p.background,
            accent = p.accent,
            muted = p.muted,
            font = g.font_size,
            lh = g.line_height_factor,
            line = g.line_height,
            ol = g.ordered_gutter,
            ul = g.unordered_gutter,
            pad = g.padding,
        )
    }
}

static LABS_ADDRESS: [&str; 2] = [
    "Unit GV-00-10-07-OF-02, Level 7, Gate Village Building 10,",
    "Dubai International Financial Centre, Dubai, United Arab Emirates",
];
static TERRAVIVA_LEFT_ADDRESS: [&str; 2] = [
    "GV10, Dubai International Financial Centre,",
    "Dubai, United Arab Emirates",
];
static TERRAVIVA_RIGHT_ADDRESS: [&str; 2] = ["JAFZA 15, Jebel Ali Dubai,", "Dubai, United Arab Emirates"];

impl LetterheadTemplate {
    /// Header address lines, left block first.
    pub fn address_lines(&self) -> Vec<&'static [&'static str; 2]> {
        match self.family {
            Family::A6Labs => vec![&LABS_ADDRESS],
            Family::A6Terraviva => vec![&TERRAVIVA_LEFT_ADDRESS, &TERRAVIVA_RIGHT_ADDRESS],
        }
    }
}

fn address_html(lines: [&str; 2]) -> String {
    format!("{}<br>{}", escape_text(lines[0]), escape_text(lines[1]))
}

fn logo_html(assets: &AssetStore, name: &str, class: &str, label: &str) -> String {
    match assets.data_uri(name) {
        Some(uri) => format!(r#"<img src="{uri}" class="{class}" alt="{label}">"#),
        None => format!(r#"<div class="logo-text">{label}</div>"#),
    }
}

/// Full HTML document: every page rendered through the template. A single
/// page carries the signature; otherwise only the last page does.
pub fn render_document(
    template: &LetterheadTemplate,
    form: &LetterForm,
    pages: &[Page],
    assets: &AssetStore,
) -> String {
    let total = pages.len().max(1);
    let mut body = String::new();
    for (i, page) in pages.iter().enumerate() {
        let slot = PageSlot {
            number: i + 1,
            total,
            signature: i + 1 == total,
        };
        let markup = if i == 0 {
            template.first_page(form, &page.content_html, slot, assets)
        } else {
            template.continuation_page(form, &page.content_html, slot, assets)
        };
        body.push_str(&markup);
        body.push('\n');
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{css}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_text(&form.letter_title),
        css = template.stylesheet(),
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> LetterForm {
        LetterForm {
            date: "Dubai, 1 March 2025".into(),
            letter_title: "Authorisation Letter".into(),
            recipient: "Melanie Knight, Partnerships Team".into(),
            sender_signature: "Sincerely, Alex Ring. Head Of Operations, A6 Labs.".into(),
            letter_text: String::new(),
        }
    }

    fn page(index: usize, html: &str) -> Page {
        Page {
            index,
            max_lines: 34,
            content_html: html.into(),
            line_count: 1,
        }
    }

    #[test]
    fn registry_lookup() {
        assert_eq!(all().len(), 3);
        assert_eq!(find("a6labs-letterhead-2").unwrap().name, "Green BG");
        assert_eq!(for_company("a6labs").len(), 2);
        assert!(matches!(
            find("letterhead-9"),
            Err(Error::UnknownTemplate(id)) if id == "letterhead-9"
        ));
    }

    #[test]
    fn geometry_line_budgets() {
        let g = find("a6labs-letterhead-1").unwrap().geometry;
        assert_eq!(g.first_page_max_lines(), 34);
        assert_eq!(g.continuation_page_max_lines(), 38);
        assert!((g.column_width() - 324.28).abs() < 0.01);
        let t = find("a6terraviva-letterhead-1").unwrap().geometry;
        assert_eq!(t.gutter(ListKind::Ordered), 20.0);
        assert_eq!(t.gutter(ListKind::Unordered), 15.0);
    }

    #[test]
    fn comma_fields_break_and_escape() {
        assert_eq!(
            format_comma_lines("Knight, R&D,  Team"),
            "Knight,<br>R&amp;D,<br>Team"
        );
    }

    #[test]
    fn signature_formatting_per_family() {
        let labs = find("a6labs-letterhead-1").unwrap();
        assert_eq!(
            labs.format_signature("Alex Ring. Head Of Operations."),
            "Alex Ring.<br>Head Of Operations.<br>"
        );
        let tv = find("a6terraviva-letterhead-1").unwrap();
        assert_eq!(
            tv.format_signature("Sincerely, Alex Ring. Head\nOps"),
            "Sincerely,<br><br> Alex Ring.<br>Head<br>Ops"
        );
    }

    #[test]
    fn single_page_document_has_signature_on_first_page() {
        let t = find("a6labs-letterhead-1").unwrap();
        let html = render_document(t, &form(), &[page(0, "<p>Hello</p>")], &AssetStore::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("class=\"signature\"").count(), 1);
        assert!(html.contains("main-content one-page-signature"));
        assert!(html.contains("1/1"));
        assert!(html.contains("<div class=\"logo-text\">A6 Labs</div>"));
        assert!(html.contains("A6 LABS<br>STAMP"));
    }

    #[test]
    fn signature_only_on_last_of_many_pages() {
        let t = find("a6terraviva-letterhead-1").unwrap();
        let pages = [page(0, "<p>a</p>"), page(1, "<p>b</p>"), page(2, "<p>c</p>")];
        let html = render_document(t, &form(), &pages, &AssetStore::default());
        assert_eq!(html.matches("class=\"signature\"").count(), 1);
        let sig = html.find("class=\"signature\"").unwrap();
        let last = html.find("3/3").unwrap();
        assert!(sig > html.find("2/3").unwrap() && sig < last);
        assert_eq!(html.matches("class=\"date-title\"").count(), 1);
        assert_eq!(html.matches("main-content continuation").count(), 2);
        assert!(html.contains("TERRAVIVA<br>STAMP"));
    }

    #[test]
    fn form_fields_are_escaped() {
        let t = find("a6labs-letterhead-1").unwrap();
        let mut f = form();
        f.letter_title = "<script>x</script>".into();
        let html = t.first_page(
            &f,
            "",
            PageSlot {
                number: 1,
                total: 1,
                signature: false,
            },
            &AssetStore::default(),
        );
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn missing_asset_dir_falls_back() {
        let store = AssetStore::new(Some(PathBuf::from("/nonexistent/letterforge-assets")));
        assert!(store.data_uri("a6labs/logo.png").is_none());
        assert!(AssetStore::default().load("a6labs/logo.png").is_none());
    }
}
