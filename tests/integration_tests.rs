//! Integration tests for the letterforge pipeline.
//!
//! These tests validate:
//! - Normalization is stable and loses no content
//! - Line breaking preserves every word in order
//! - Pages never exceed their line budget
//! - Lists resume across pages with the right numbering
//! - Full requests produce HTML documents and valid PDFs

use letterforge::blocks::{self, ContentBlock};
use letterforge::error::{Error, Result};
use letterforge::linebreak::{lay_out, split_words, LaidOutBlock};
use letterforge::measure::{plain_text, MeasurerKind, MetricsMeasurer, TextMeasurer};
use letterforge::packer::{pack, Page, PageBudget};
use letterforge::pipeline::{
    generate_document, generate_pdf, paginate_letter, CancelToken, GenerationRequest, LetterForm,
    PipelineConfig,
};
use letterforge::sandbox::{RenderSandbox, SandboxMeasurer, SandboxOptions};
use letterforge::templates::{self, TemplateGeometry};

// =====================================================================
// Helper
// =====================================================================

/// Fits when the run's plain text is at most `max` characters.
struct CharBudget {
    max: usize,
}

impl TextMeasurer for CharBudget {
    fn fits(&mut self, run: &str, _indent_reserve: f32) -> Result<bool> {
        Ok(plain_text(run).chars().count() <= self.max)
    }
}

fn geometry() -> TemplateGeometry {
    templates::find("a6labs-letterhead-1").unwrap().geometry
}

fn budget(first: usize, rest: usize) -> PageBudget {
    PageBudget {
        first_page_max_lines: first,
        continuation_page_max_lines: rest,
    }
}

fn lay_out_all(input: &str, measurer: &mut dyn TextMeasurer) -> Vec<LaidOutBlock> {
    blocks::normalize(input)
        .iter()
        .enumerate()
        .map(|(i, b)| lay_out(i, b, measurer, &geometry()).unwrap())
        .collect()
}

fn form(body: &str) -> LetterForm {
    LetterForm {
        date: "Dubai, 1 March 2025".into(),
        letter_title: "Authorisation Letter".into(),
        recipient: "Melanie Knight, Partnerships Team".into(),
        sender_signature: "Sincerely, Alex Ring. Head Of Operations, A6 Labs.".into(),
        letter_text: body.into(),
    }
}

fn metrics_config() -> PipelineConfig {
    PipelineConfig {
        measurer: MeasurerKind::Metrics,
        ..PipelineConfig::default()
    }
}

fn long_letter() -> String {
    let mut body = String::from("<p>Dear Melanie,</p><p><br></p>");
    for i in 0..30 {
        body.push_str(&format!(
            "<p>Paragraph {i} confirms that the <strong>partnership terms</strong> discussed \
             in our meeting remain valid and that <em>all parties</em> agree to proceed.</p>"
        ));
        if i % 7 == 3 {
            body.push_str("<ol><li>First point</li><li>Second point</li><li>Third point</li></ol>");
        }
    }
    body
}

/// Words of an HTML fragment; adjacent block elements do not run together.
fn words_of(html: &str) -> Vec<String> {
    plain_text(&html.replace('<', " <"))
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn page_words(pages: &[Page]) -> Vec<String> {
    pages.iter().flat_map(|p| words_of(&p.content_html)).collect()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Normalization
// =====================================================================

#[test]
fn normalization_is_idempotent_for_editor_markup() {
    let input = r#"<p>Dear <strong>Melanie</strong>,</p><p><br></p>
        <ol><li data-list="bullet">alpha</li><li data-list="ordered">one</li></ol>
        <p>line one<br>line two</p>"#;
    let once = blocks::normalize(input);
    let twice = blocks::normalize(&blocks::to_html(&once));
    assert_eq!(once, twice);
}

#[test]
fn normalization_loses_no_list_items() {
    let input = "<ul><li>a</li><li>b</li></ul><ol><li>c</li><li>d</li><li>e</li></ol>";
    let count: usize = blocks::normalize(input)
        .iter()
        .filter_map(ContentBlock::list_items)
        .map(<[String]>::len)
        .sum();
    assert_eq!(count, 5);
}

// =====================================================================
// Line breaking
// =====================================================================

#[test]
fn words_are_preserved_in_order() {
    let text = "The quick <strong>brown fox</strong> jumps over the <em>lazy dog</em> \
                again and again until the column runs out of room entirely.";
    let mut measurer = CharBudget { max: 18 };
    let laid = lay_out_all(&format!("<p>{text}</p>"), &mut measurer);
    let joined: Vec<String> = laid[0].lines().iter().map(|l| l.text.clone()).collect();
    assert!(laid[0].line_count() > 1);
    assert_eq!(split_words(&joined.join(" ")), split_words(text));
}

#[test]
fn nested_blocks_keep_words_through_packing() {
    let mut measurer = CharBudget { max: 40 };
    let input = "<blockquote><p>alpha</p><p>beta</p></blockquote>\
                 <ul><li><p>gamma</p><p>delta</p></li><li><div>epsilon</div><div>zeta</div></li></ul>";
    let laid = lay_out_all(input, &mut measurer);
    let pages = pack(&laid, budget(34, 38)).unwrap();
    assert_eq!(
        page_words(&pages),
        vec!["alpha", "beta", "gamma", "delta", "epsilon", "zeta"]
    );
}

#[test]
fn metrics_measurer_wraps_to_column() {
    let g = geometry();
    let mut measurer =
        MetricsMeasurer::new(Default::default(), g.column_width(), g.font_size);
    let laid = lay_out_all(&long_letter(), &mut measurer);
    for block in &laid {
        for line in block.lines() {
            let words = split_words(&line.text);
            if words.len() > 1 {
                assert!(measurer.fits(&line.text, 0.0).unwrap(), "overfull: {}", line.text);
            }
        }
    }
}

// =====================================================================
// Packing scenarios
// =====================================================================

#[test]
fn second_paragraph_moves_when_spacing_does_not_fit() {
    // Two paragraphs separated by a blank line, two visual lines each.
    let mut measurer = CharBudget { max: 11 };
    let laid = lay_out_all("aaaa bbbb cccc dddd\n\neeee ffff gggg hhhh", &mut measurer);
    assert_eq!(laid.iter().map(LaidOutBlock::line_count).collect::<Vec<_>>(), vec![2, 2]);

    let pages = pack(&laid, budget(3, 3)).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].content_html, "<p>aaaa bbbb cccc dddd</p>");
    assert_eq!(pages[0].line_count, 2);
    assert_eq!(pages[1].content_html, "<p>eeee ffff gggg hhhh</p>");
}

#[test]
fn ordered_list_resumes_with_start() {
    let mut measurer = CharBudget { max: 40 };
    let input = "<p>intro line one<br>intro line two</p>\
                 <ol><li>one</li><li>two</li><li>three</li><li>four</li><li>five</li></ol>";
    let laid = lay_out_all(input, &mut measurer);
    let pages = pack(&laid, budget(4, 10)).unwrap();

    assert_eq!(pages.len(), 2);
    assert!(pages[0].content_html.ends_with("<ol><li>one</li><li>two</li></ol>"));
    assert!(!pages[0].content_html.contains("start="));
    assert_eq!(
        pages[1].content_html,
        "<ol start=\"3\"><li>three</li><li>four</li><li>five</li></ol>"
    );
}

#[test]
fn unordered_list_resumes_without_start() {
    let mut measurer = CharBudget { max: 40 };
    let laid = lay_out_all("<ul><li>a</li><li>b</li><li>c</li></ul>", &mut measurer);
    let pages = pack(&laid, budget(2, 2)).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].content_html, "<ul><li>c</li></ul>");
}

#[test]
fn manual_break_counts_two_lines() {
    let mut measurer = CharBudget { max: 40 };
    let laid = lay_out_all("<p>first line<br>second line</p>", &mut measurer);
    let pages = pack(&laid, budget(34, 38)).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].content_html, "<p>first line<br>second line</p>");
    assert_eq!(pages[0].line_count, 2);
}

#[test]
fn missing_container_puts_every_word_on_its_own_line() {
    let template = templates::find("a6labs-letterhead-1").unwrap();
    let sandbox = RenderSandbox::from_markup(
        "bare",
        "<div class=\"page\"><div class=\"content\">no hook</div></div>",
        SandboxOptions::default(),
    )
    .unwrap();
    let mut measurer = SandboxMeasurer::new(sandbox);
    let body = "<p>one two three four five six seven eight nine ten</p>".repeat(6);
    let pages = paginate_letter(&body, template, &mut measurer, &CancelToken::new()).unwrap();

    assert!(!pages.is_empty());
    // 60 words, one per line, plus five spacer lines between paragraphs.
    let total: usize = pages.iter().map(|p| p.line_count).sum();
    assert_eq!(total, 65);
    assert_eq!(page_words(&pages).len(), 60);
}

// =====================================================================
// Budget invariant and content preservation
// =====================================================================

#[test]
fn pages_respect_budgets() {
    let mut measurer = CharBudget { max: 30 };
    let laid = lay_out_all(&long_letter(), &mut measurer);
    let b = budget(34, 38);
    let pages = pack(&laid, b).unwrap();
    assert!(pages.len() > 2);
    for page in &pages {
        assert!(page.line_count >= 1);
        assert!(page.line_count <= b.capacity(page.index), "page {} over budget", page.index);
        assert_eq!(page.max_lines, b.capacity(page.index));
    }
}

#[test]
fn no_words_are_lost_across_pages() {
    let body = long_letter();
    let mut measurer = CharBudget { max: 25 };
    let laid = lay_out_all(&body, &mut measurer);
    let pages = pack(&laid, budget(10, 12)).unwrap();
    assert_eq!(page_words(&pages), words_of(&body));
}

#[test]
fn oversized_list_item_is_split_across_pages() {
    let mut measurer = CharBudget { max: 10 };
    let item = "word ".repeat(12);
    let input = format!("<ol><li>first</li><li>{}</li><li>last</li></ol>", item.trim());
    let laid = lay_out_all(&input, &mut measurer);
    let pages = pack(&laid, budget(4, 4)).unwrap();

    // first | four lines of the long item | its last two lines, then "last".
    assert_eq!(pages.len(), 3);
    for page in &pages {
        assert!(page.line_count <= 4);
    }
    assert_eq!(pages[0].content_html, "<ol><li>first</li></ol>");
    assert!(pages[1].content_html.starts_with("<ol start=\"2\"><li>word word"));
    assert!(pages[2]
        .content_html
        .starts_with("<ol start=\"2\"><li style=\"list-style-type: none\">"));
    let last = pages.last().unwrap();
    assert!(last.content_html.contains("last"));
    assert_eq!(page_words(&pages).len(), 14);
}

// =====================================================================
// Full requests
// =====================================================================

#[test]
fn long_letter_paginates_with_metrics() {
    let request = GenerationRequest::new("a6labs-letterhead-1", form(&long_letter()));
    let doc = generate_document(&request, &metrics_config(), &CancelToken::new()).unwrap();
    assert!(doc.page_count() >= 2);
    let g = geometry();
    assert!(doc.pages[0].line_count <= g.first_page_max_lines());
    for page in &doc.pages[1..] {
        assert!(page.line_count <= g.continuation_page_max_lines());
    }
    assert_eq!(doc.html.matches("class=\"page-number\"").count(), doc.page_count());
}

#[test]
fn sandbox_and_metrics_agree_on_plain_text() {
    let body = "<p>".to_string() + &"letter ".repeat(300) + "</p>";
    let request = GenerationRequest::new("a6terraviva-letterhead-1", form(&body));
    let sandboxed =
        generate_document(&request, &PipelineConfig::default(), &CancelToken::new()).unwrap();
    let metric = generate_document(&request, &metrics_config(), &CancelToken::new()).unwrap();
    assert_eq!(sandboxed.pages, metric.pages);
}

#[test]
fn full_request_produces_pdf() {
    let request = GenerationRequest::from_json(
        r#"{
            "formData": {
                "date": "Dubai, 1 March 2025",
                "letterTitle": "Authorisation Letter",
                "recipient": "Melanie Knight, Partnerships Team",
                "senderSignature": "Sincerely,\nAlex Ring. Head Of Operations.",
                "letterText": "<p>Dear Melanie,</p><ul><li>one</li><li>two</li></ul>"
            },
            "templateId": "a6terraviva-letterhead-1"
        }"#,
    )
    .unwrap();
    let (bytes, doc) = generate_pdf(&request, &PipelineConfig::default(), &CancelToken::new()).unwrap();
    assert_valid_pdf(&bytes);
    assert_eq!(doc.page_count(), 1);
    assert!(doc.html.contains("Sincerely,<br><br>"));
}

#[test]
fn unknown_template_is_rejected() {
    let request = GenerationRequest::new("letterhead-404", form("<p>x</p>"));
    assert!(matches!(
        generate_pdf(&request, &PipelineConfig::default(), &CancelToken::new()),
        Err(Error::UnknownTemplate(id)) if id == "letterhead-404"
    ));
}

#[test]
fn cancellation_stops_pagination() {
    let template = templates::find("a6labs-letterhead-2").unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut measurer = CharBudget { max: 40 };
    let result = paginate_letter(&long_letter(), template, &mut measurer, &cancel);
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[test]
fn concurrent_requests_are_independent() {
    let handles: Vec<_> = templates::all()
        .iter()
        .map(|t| {
            let request = GenerationRequest::new(t.id, form(&long_letter()));
            std::thread::spawn(move || {
                generate_document(&request, &PipelineConfig::default(), &CancelToken::new())
            })
        })
        .collect();
    for handle in handles {
        let doc = handle.join().unwrap().unwrap();
        assert!(doc.page_count() >= 2);
    }
}
