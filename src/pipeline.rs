//! Pipeline – ties together normalization, measurement, line breaking,
//! packing, and rendering into a single request.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blocks::{self, ContentBlock};
use crate::error::{Error, Result};
use crate::fonts::FontManager;
use crate::linebreak::lay_out;
use crate::measure::{MeasurerKind, MetricsMeasurer, TextMeasurer};
use crate::packer::{Page, PackerState};
use crate::render::render_pdf;
use crate::sandbox::{RenderSandbox, SandboxMeasurer, SandboxOptions};
use crate::templates::{self, render_document, AssetStore, LetterheadTemplate};

/// The letter form as submitted by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LetterForm {
    pub date: String,
    pub letter_title: String,
    pub recipient: String,
    pub sender_signature: String,
    /// Rich-text body (editor HTML or plain text).
    pub letter_text: String,
}

fn default_should_measure() -> bool {
    true
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub form_data: LetterForm,
    pub template_id: String,
    /// When false the whole body goes on one page without measuring.
    #[serde(default = "default_should_measure")]
    pub should_measure: bool,
}

impl GenerationRequest {
    pub fn new(template_id: &str, form_data: LetterForm) -> Self {
        Self {
            form_data,
            template_id: template_id.to_string(),
            should_measure: true,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for the generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Line measurer (default: sandbox).
    pub measurer: MeasurerKind,
    /// Directory holding logos, stamps and backgrounds. `None` renders text
    /// placeholders.
    pub assets_dir: Option<PathBuf>,
    /// TTF/OTF used for measurement; builtin Helvetica metrics otherwise.
    pub font_path: Option<PathBuf>,
    /// Sandbox deadline in ms (0 disables it).
    pub sandbox_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            measurer: MeasurerKind::Sandbox,
            assets_dir: None,
            font_path: None,
            sandbox_timeout_ms: 30_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn asset_store(&self) -> AssetStore {
        AssetStore::new(self.assets_dir.clone())
    }

    /// Fonts for this request; a configured font that fails to load is an
    /// error rather than a silent fallback.
    pub fn load_fonts(&self) -> Result<FontManager> {
        let mut fonts = FontManager::new();
        if let Some(path) = &self.font_path {
            fonts.load_font_file(path).map_err(|e| {
                Error::InvalidConfig(format!("font {}: {e}", path.display()))
            })?;
        }
        Ok(fonts)
    }
}

/// Cooperative cancellation flag shared between a caller and a request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A generated letter: packed pages plus the full HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterDocument {
    pub template_id: String,
    pub form: LetterForm,
    pub pages: Vec<Page>,
    pub html: String,
}

impl LetterDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.pages)?)
    }
}

/// Normalize, break and pack a letter body against one template.
pub fn paginate_letter(
    html: &str,
    template: &LetterheadTemplate,
    measurer: &mut dyn TextMeasurer,
    cancel: &CancelToken,
) -> Result<Vec<Page>> {
    let budget = template.geometry.budget();
    budget.validate()?;
    let blocks = blocks::normalize(html);
    log::debug!("{} content block(s) for {}", blocks.len(), template.id);

    let mut state = PackerState::new(budget);
    for (index, block) in blocks.iter().enumerate() {
        cancel.check()?;
        let laid = lay_out(index, block, measurer, &template.geometry)?;
        log::debug!(
            "block {index}: {} line(s), page {} at {} line(s)",
            laid.line_count(),
            state.page_index() + 1,
            state.lines_used()
        );
        state = state.step(&laid);
    }
    cancel.check()?;
    Ok(state.finish())
}

/// The whole body as one page, without measuring. The page is not capped:
/// `max_lines` grows to `line_count` so the budget still holds.
fn single_page(html: &str, template: &LetterheadTemplate) -> Vec<Page> {
    let blocks = blocks::normalize(html);
    let line_count: usize = blocks
        .iter()
        .map(|b| match b {
            ContentBlock::Paragraph { segments, .. } => segments.len(),
            ContentBlock::EmptyParagraph => 1,
            ContentBlock::OrderedList { items } | ContentBlock::UnorderedList { items } => {
                items.len()
            }
        })
        .sum();
    vec![Page {
        index: 0,
        max_lines: line_count.max(template.geometry.first_page_max_lines()),
        content_html: blocks::to_html(&blocks),
        line_count,
    }]
}

/// Run a request through the configured measurer and render the pages into
/// the template's HTML document.
pub fn generate_document(
    request: &GenerationRequest,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<LetterDocument> {
    let template = templates::find(&request.template_id)?;
    let assets = config.asset_store();
    let form = &request.form_data;
    cancel.check()?;

    let pages = if !request.should_measure {
        single_page(&form.letter_text, template)
    } else {
        let fonts = config.load_fonts()?;
        match config.measurer {
            MeasurerKind::Sandbox => {
                let options = SandboxOptions {
                    fonts,
                    timeout_ms: config.sandbox_timeout_ms,
                };
                let sandbox = RenderSandbox::launch(template, form, &assets, options)?;
                // The sandbox is torn down when the measurer drops, on every path.
                let mut measurer = SandboxMeasurer::new(sandbox);
                paginate_letter(&form.letter_text, template, &mut measurer, cancel)?
            }
            MeasurerKind::Metrics => {
                let g = &template.geometry;
                let mut measurer = MetricsMeasurer::new(fonts, g.column_width(), g.font_size);
                paginate_letter(&form.letter_text, template, &mut measurer, cancel)?
            }
        }
    };

    log::info!(
        "generated {} page(s) with template {}",
        pages.len(),
        template.id
    );
    let html = render_document(template, form, &pages, &assets);
    Ok(LetterDocument {
        template_id: template.id.to_string(),
        form: form.clone(),
        pages,
        html,
    })
}

/// Full pipeline: request → PDF bytes.
///
/// Returns `(pdf_bytes, document)`.
pub fn generate_pdf(
    request: &GenerationRequest,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<(Vec<u8>, LetterDocument)> {
    let document = generate_document(request, config, cancel)?;
    cancel.check()?;
    let bytes = render_pdf(&document, &config.asset_store())?;
    Ok((bytes, document))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &str) -> GenerationRequest {
        GenerationRequest::new(
            "a6labs-letterhead-1",
            LetterForm {
                date: "1 March 2025".into(),
                letter_title: "Authorisation Letter".into(),
                recipient: "Melanie Knight".into(),
                sender_signature: "Alex Ring.".into(),
                letter_text: body.into(),
            },
        )
    }

    #[test]
    fn pipeline_basic() {
        let req = request("<p>Dear Melanie,</p><p>Thank you.</p>");
        let (bytes, doc) = generate_pdf(&req, &PipelineConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
        assert_eq!(doc.page_count(), 1);
        assert!(doc.html.starts_with("<!DOCTYPE html>"));
        assert!(doc.pages[0].content_html.contains("Thank you."));
    }

    #[test]
    fn request_json_defaults_to_measuring() {
        let req = GenerationRequest::from_json(
            r#"{"formData": {"letterText": "<p>x</p>"}, "templateId": "a6labs-letterhead-2"}"#,
        )
        .unwrap();
        assert!(req.should_measure);
        assert_eq!(req.form_data.letter_text, "<p>x</p>");
        assert_eq!(req.form_data.date, "");
    }

    #[test]
    fn config_json_round_trip() {
        let cfg = PipelineConfig::from_json(r#"{"measurer": "metrics", "sandboxTimeoutMs": 5}"#).unwrap();
        assert_eq!(cfg.measurer, MeasurerKind::Metrics);
        assert_eq!(cfg.sandbox_timeout_ms, 5);
        assert_eq!(cfg.assets_dir, None);
        let back = PipelineConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn unmeasured_request_is_one_page() {
        let body = "<p>line</p>".repeat(200);
        let mut req = request(&body);
        req.should_measure = false;
        let doc = generate_document(&req, &PipelineConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages[0].line_count, 200);
        assert!(doc.pages[0].line_count <= doc.pages[0].max_lines);
    }

    #[test]
    fn short_unmeasured_page_keeps_template_budget() {
        let mut req = request("<p>a</p><p>b</p>");
        req.should_measure = false;
        let doc = generate_document(&req, &PipelineConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(doc.pages[0].line_count, 2);
        assert_eq!(doc.pages[0].max_lines, 34);
    }

    #[test]
    fn cancelled_pdf_request_yields_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = generate_pdf(&request("<p>a</p>"), &PipelineConfig::default(), &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn cancelled_request_yields_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let req = request("<p>a</p>");
        let result = generate_document(&req, &PipelineConfig::default(), &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn missing_font_file_is_config_error() {
        let cfg = PipelineConfig {
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            generate_document(&request("<p>a</p>"), &cfg, &CancelToken::new()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
