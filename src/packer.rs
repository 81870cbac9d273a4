//! Page packing – fills pages with laid-out blocks under a per-page line
//! budget and emits one HTML fragment per page for the `.letter-text`
//! container.
//!
//! Handles:
//! - first-page vs continuation-page capacity
//! - one blank line of spacing before a paragraph that follows content
//! - paragraphs split across pages (the `<p>` is reopened)
//! - lists split across pages, with `start` on ordered continuations
//! - list items taller than a whole page, split line by line

use serde::{Deserialize, Serialize};

use crate::blocks::ListKind;
use crate::error::{Error, Result};
use crate::linebreak::{LaidOutBlock, VisualLine};

/// Markup for one charged blank line.
const SPACER: &str = "<p><br></p>";

/// Line capacity of the first page and of every later page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBudget {
    pub first_page_max_lines: usize,
    pub continuation_page_max_lines: usize,
}

impl PageBudget {
    pub fn capacity(&self, page_index: usize) -> usize {
        if page_index == 0 {
            self.first_page_max_lines
        } else {
            self.continuation_page_max_lines
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_page_max_lines == 0 || self.continuation_page_max_lines == 0 {
            return Err(Error::InvalidConfig(format!(
                "page budgets must be at least one line (first {}, continuation {})",
                self.first_page_max_lines, self.continuation_page_max_lines
            )));
        }
        Ok(())
    }
}

/// One packed page: the body fragment for its text column.
///
/// `line_count <= max_lines` always holds. An unmeasured single page raises
/// `max_lines` to its line count instead of splitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub index: usize,
    pub max_lines: usize,
    pub content_html: String,
    pub line_count: usize,
}

/// An ordered or unordered list that may continue on the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListContinuation {
    pub kind: ListKind,
    pub items_emitted: usize,
}

impl ListContinuation {
    /// Opening tag for a fragment of this list. Ordered fragments after the
    /// first carry `start` so numbering runs on.
    pub fn open_tag(&self) -> String {
        match self.kind {
            ListKind::Ordered if self.items_emitted > 0 => {
                format!("<ol start=\"{}\">", self.items_emitted + 1)
            }
            kind => format!("<{}>", kind.tag_name()),
        }
    }

    pub fn close_tag(&self) -> String {
        format!("</{}>", self.kind.tag_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastUnit {
    Nothing,
    Paragraph,
    EmptyParagraph,
    List,
}

/// Pagination state, threaded explicitly through [`PackerState::step`].
#[derive(Debug, Clone)]
pub struct PackerState {
    budget: PageBudget,
    pages: Vec<Page>,
    html: String,
    used: usize,
    last_unit: LastUnit,
    list: Option<ListContinuation>,
    list_tag_open: bool,
}

impl PackerState {
    pub fn new(budget: PageBudget) -> Self {
        Self {
            budget,
            pages: Vec::new(),
            html: String::new(),
            used: 0,
            last_unit: LastUnit::Nothing,
            list: None,
            list_tag_open: false,
        }
    }

    /// Index of the page being filled.
    pub fn page_index(&self) -> usize {
        self.pages.len()
    }

    /// Lines already used on the page being filled.
    pub fn lines_used(&self) -> usize {
        self.used
    }

    pub fn sealed_pages(&self) -> &[Page] {
        &self.pages
    }

    /// Place one laid-out block.
    pub fn step(mut self, block: &LaidOutBlock) -> Self {
        match block {
            LaidOutBlock::Paragraph { segments, .. } => self.place_paragraph(segments),
            LaidOutBlock::Empty { .. } => self.place_empty(),
            LaidOutBlock::List { kind, items, .. } => self.place_list(*kind, items),
        }
        self
    }

    /// Seal the page in progress and return every page (at least one).
    pub fn finish(mut self) -> Vec<Page> {
        self.seal();
        if self.pages.is_empty() {
            self.pages.push(Page {
                index: 0,
                max_lines: self.budget.capacity(0),
                content_html: String::new(),
                line_count: 0,
            });
        }
        log::info!("packed {} page(s)", self.pages.len());
        self.pages
    }

    fn capacity(&self) -> usize {
        self.budget.capacity(self.page_index())
    }

    fn fits(&self, cost: usize) -> bool {
        self.used + cost <= self.capacity()
    }

    fn seal(&mut self) {
        if self.used == 0 && self.html.is_empty() {
            return;
        }
        let index = self.page_index();
        log::debug!("sealing page {} with {} line(s)", index + 1, self.used);
        self.pages.push(Page {
            index,
            max_lines: self.budget.capacity(index),
            content_html: std::mem::take(&mut self.html),
            line_count: self.used,
        });
        self.used = 0;
        self.last_unit = LastUnit::Nothing;
    }

    /// Seal and continue on a fresh page, carrying an open list across.
    fn break_page(&mut self) {
        if self.list_tag_open {
            if let Some(list) = self.list {
                self.html.push_str(&list.close_tag());
            }
            self.list_tag_open = false;
        }
        self.seal();
    }

    fn ensure_list_open(&mut self) {
        if self.list_tag_open {
            return;
        }
        if let Some(list) = self.list {
            self.html.push_str(&list.open_tag());
            self.list_tag_open = true;
        }
    }

    fn place_paragraph(&mut self, segments: &[Vec<VisualLine>]) {
        let mut started = false;
        let mut last_empty = false;
        for segment in segments {
            for (i, line) in segment.iter().enumerate() {
                if !started {
                    let spacing = self.used > 0 && self.last_unit != LastUnit::EmptyParagraph;
                    if !self.fits(1 + usize::from(spacing)) {
                        self.seal();
                    } else if spacing {
                        self.html.push_str(SPACER);
                        self.used += 1;
                    }
                    self.html.push_str("<p>");
                    started = true;
                } else if !self.fits(1) {
                    self.close_paragraph(last_empty);
                    self.seal();
                    self.html.push_str("<p>");
                } else if i == 0 {
                    // Manual break between segments.
                    self.html.push_str("<br>");
                } else {
                    self.html.push(' ');
                }
                self.html.push_str(&line.text);
                self.used += 1;
                last_empty = line.text.is_empty();
            }
        }
        if started {
            self.close_paragraph(last_empty);
            self.last_unit = LastUnit::Paragraph;
        }
    }

    /// A paragraph ending in an empty line needs a closing `<br>`, or that
    /// charged line renders at zero height.
    fn close_paragraph(&mut self, last_empty: bool) {
        if last_empty {
            self.html.push_str("<br>");
        }
        self.html.push_str("</p>");
    }

    fn place_empty(&mut self) {
        if !self.fits(1) {
            self.seal();
        }
        self.html.push_str(SPACER);
        self.used += 1;
        self.last_unit = LastUnit::EmptyParagraph;
    }

    fn place_list(&mut self, kind: ListKind, items: &[Vec<VisualLine>]) {
        if items.is_empty() {
            return;
        }
        self.list = Some(ListContinuation {
            kind,
            items_emitted: 0,
        });

        for item in items {
            let cost = item.len().max(1);
            if !self.fits(cost) && self.used > 0 {
                self.break_page();
            }
            self.ensure_list_open();

            if self.fits(cost) {
                let text: Vec<&str> = item.iter().map(|l| l.text.as_str()).collect();
                self.html.push_str("<li>");
                self.html.push_str(&text.join(" "));
                self.html.push_str("</li>");
                self.used += cost;
            } else {
                self.place_oversized_item(item);
            }

            if let Some(list) = self.list.as_mut() {
                list.items_emitted += 1;
            }
        }

        if self.list_tag_open {
            if let Some(list) = self.list {
                self.html.push_str(&list.close_tag());
            }
        }
        self.list = None;
        self.list_tag_open = false;
        self.last_unit = LastUnit::List;
    }

    /// An item taller than a whole page, placed line by line. Its
    /// continuation on the next page is an unmarked `<li>`.
    fn place_oversized_item(&mut self, item: &[VisualLine]) {
        log::debug!("list item of {} lines exceeds a page; splitting it", item.len());
        self.html.push_str("<li>");
        for (i, line) in item.iter().enumerate() {
            if !self.fits(1) {
                self.html.push_str("</li>");
                self.break_page();
                self.ensure_list_open();
                self.html.push_str("<li style=\"list-style-type: none\">");
            } else if i > 0 {
                self.html.push(' ');
            }
            self.html.push_str(&line.text);
            self.used += 1;
        }
        self.html.push_str("</li>");
    }
}

/// Pack laid-out blocks into pages.
pub fn pack(blocks: &[LaidOutBlock], budget: PageBudget) -> Result<Vec<Page>> {
    budget.validate()?;
    let state = blocks
        .iter()
        .fold(PackerState::new(budget), |state, block| state.step(block));
    Ok(state.finish())
}
