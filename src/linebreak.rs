//! Line breaking – splits each block into the visual lines the letter column
//! will show, asking a [`TextMeasurer`] whether each candidate line fits.
//!
//! Words are split only at spaces outside inline tags, so a formatted run
//! never loses its closing tag across a line boundary.

use serde::Serialize;

use crate::blocks::{ContentBlock, ListKind};
use crate::dom::Tag;
use crate::error::Result;
use crate::measure::TextMeasurer;
use crate::templates::TemplateGeometry;

/// What a visual line is, for the packer and the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LineKind {
    Plain,
    /// First line of a list item (carries the bullet or number).
    ListItem,
    ListItemContinuation,
}

/// One line as it renders in the column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualLine {
    pub text: String,
    pub kind: LineKind,
    /// Index of the content block this line came from.
    pub owner_block: usize,
}

/// A content block broken into visual lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LaidOutBlock {
    /// Lines grouped per manual-break segment.
    Paragraph {
        owner_block: usize,
        segments: Vec<Vec<VisualLine>>,
    },
    Empty {
        owner_block: usize,
    },
    List {
        owner_block: usize,
        kind: ListKind,
        items: Vec<Vec<VisualLine>>,
    },
}

impl LaidOutBlock {
    pub fn owner_block(&self) -> usize {
        match self {
            LaidOutBlock::Paragraph { owner_block, .. }
            | LaidOutBlock::Empty { owner_block }
            | LaidOutBlock::List { owner_block, .. } => *owner_block,
        }
    }

    /// Lines this block occupies, not counting paragraph spacing.
    pub fn line_count(&self) -> usize {
        match self {
            LaidOutBlock::Paragraph { segments, .. } => segments.iter().map(Vec::len).sum(),
            LaidOutBlock::Empty { .. } => 1,
            LaidOutBlock::List { items, .. } => items.iter().map(Vec::len).sum(),
        }
    }

    pub fn lines(&self) -> Vec<&VisualLine> {
        match self {
            LaidOutBlock::Paragraph { segments, .. } => segments.iter().flatten().collect(),
            LaidOutBlock::Empty { .. } => Vec::new(),
            LaidOutBlock::List { items, .. } => items.iter().flatten().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Word splitting
// ---------------------------------------------------------------------------

/// Split inline HTML into words at spaces that sit outside every tag.
/// Void tags (`<br>`, `<img>`) do not open a nesting level.
pub fn split_words(inline_html: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut chars = inline_html.chars();

    while let Some(c) = chars.next() {
        if c == '<' {
            let mut tag = String::from('<');
            for t in chars.by_ref() {
                tag.push(t);
                if t == '>' {
                    break;
                }
            }
            depth = match tag_effect(&tag) {
                TagEffect::Open => depth + 1,
                TagEffect::Close => depth.saturating_sub(1),
                TagEffect::Neutral => depth,
            };
            current.push_str(&tag);
        } else if depth == 0 && c.is_ascii_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

enum TagEffect {
    Open,
    Close,
    Neutral,
}

fn tag_effect(tag: &str) -> TagEffect {
    let inner = tag.trim_start_matches('<');
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if name.is_empty() {
        return TagEffect::Neutral;
    }
    if Tag::from_name(&name).is_void() || tag.ends_with("/>") {
        return TagEffect::Neutral;
    }
    if closing {
        TagEffect::Close
    } else {
        TagEffect::Open
    }
}

// ---------------------------------------------------------------------------
// Greedy fill
// ---------------------------------------------------------------------------

/// Greedy line fill: extend the current line word by word while the
/// measurer says it fits. A word that does not fit alone still gets a line
/// of its own; an empty word list yields one empty line.
pub fn break_words(
    words: &[String],
    measurer: &mut dyn TextMeasurer,
    indent_reserve: f32,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in words {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measurer.fits(&candidate, indent_reserve)? {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.clone()));
        }
    }
    lines.push(current);
    Ok(lines)
}

/// Break one content block into visual lines.
pub fn lay_out(
    index: usize,
    block: &ContentBlock,
    measurer: &mut dyn TextMeasurer,
    geometry: &TemplateGeometry,
) -> Result<LaidOutBlock> {
    match block {
        ContentBlock::Paragraph { segments, .. } => {
            let mut laid = Vec::with_capacity(segments.len());
            for segment in segments {
                let lines = break_words(&split_words(segment), measurer, 0.0)?;
                laid.push(
                    lines
                        .into_iter()
                        .map(|text| VisualLine {
                            text,
                            kind: LineKind::Plain,
                            owner_block: index,
                        })
                        .collect(),
                );
            }
            Ok(LaidOutBlock::Paragraph {
                owner_block: index,
                segments: laid,
            })
        }
        ContentBlock::EmptyParagraph => Ok(LaidOutBlock::Empty { owner_block: index }),
        ContentBlock::OrderedList { items } | ContentBlock::UnorderedList { items } => {
            let kind = block.list_kind().unwrap_or(ListKind::Unordered);
            let gutter = geometry.gutter(kind);
            let mut laid = Vec::with_capacity(items.len());
            for item in items {
                let lines = break_words(&split_words(item), measurer, gutter)?;
                laid.push(
                    lines
                        .into_iter()
                        .enumerate()
                        .map(|(i, text)| VisualLine {
                            text,
                            kind: if i == 0 {
                                LineKind::ListItem
                            } else {
                                LineKind::ListItemContinuation
                            },
                            owner_block: index,
                        })
                        .collect(),
                );
            }
            Ok(LaidOutBlock::List {
                owner_block: index,
                kind,
                items: laid,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::plain_text;
    use crate::templates;

    /// Fits when the run's text is at most `max` characters (minus one per
    /// point of indent, so list gutters are visible).
    struct CharBudget {
        max: usize,
        queries: usize,
    }

    impl TextMeasurer for CharBudget {
        fn fits(&mut self, run: &str, indent_reserve: f32) -> Result<bool> {
            self.queries += 1;
            let budget = self.max.saturating_sub(indent_reserve as usize);
            Ok(plain_text(run).chars().count() <= budget)
        }
    }

    fn words(s: &str) -> Vec<String> {
        split_words(s)
    }

    #[test]
    fn split_respects_tag_depth() {
        assert_eq!(
            words("a <strong>b c</strong> d"),
            vec!["a", "<strong>b c</strong>", "d"]
        );
        assert_eq!(
            words("<em>x</em>  <a href=\"u v\">l k</a>"),
            vec!["<em>x</em>", "<a href=\"u v\">l k</a>"]
        );
    }

    #[test]
    fn split_void_tags_keep_depth() {
        assert_eq!(words("a<br>b c"), vec!["a<br>b", "c"]);
        assert_eq!(words("x <img src=\"p\"/> y"), vec!["x", "<img src=\"p\"/>", "y"]);
    }

    #[test]
    fn split_keeps_entities_and_nbsp() {
        assert_eq!(words("A6&nbsp;Labs &amp; co"), vec!["A6&nbsp;Labs", "&amp;", "co"]);
    }

    #[test]
    fn greedy_fill() {
        let mut m = CharBudget { max: 11, queries: 0 };
        let lines = break_words(&words("aaa bbb ccc ddd eee"), &mut m, 0.0).unwrap();
        assert_eq!(lines, vec!["aaa bbb ccc", "ddd eee"]);
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let mut m = CharBudget { max: 5, queries: 0 };
        let lines = break_words(&words("hi supercalifragilistic yo"), &mut m, 0.0).unwrap();
        assert_eq!(lines, vec!["hi", "supercalifragilistic", "yo"]);
    }

    #[test]
    fn empty_words_give_one_empty_line() {
        let mut m = CharBudget { max: 5, queries: 0 };
        assert_eq!(break_words(&[], &mut m, 0.0).unwrap(), vec![String::new()]);
        assert_eq!(m.queries, 0);
    }

    #[test]
    fn lay_out_paragraph_segments() {
        let g = templates::find("a6labs-letterhead-1").unwrap().geometry;
        let mut m = CharBudget { max: 7, queries: 0 };
        let block = ContentBlock::paragraph(vec!["aaa bbb ccc".into(), String::new(), "d".into()]);
        let laid = lay_out(4, &block, &mut m, &g).unwrap();
        match &laid {
            LaidOutBlock::Paragraph { segments, .. } => {
                let texts: Vec<Vec<&str>> = segments
                    .iter()
                    .map(|s| s.iter().map(|l| l.text.as_str()).collect())
                    .collect();
                assert_eq!(texts, vec![vec!["aaa bbb", "ccc"], vec![""], vec!["d"]]);
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        assert_eq!(laid.line_count(), 4);
        assert!(laid.lines().iter().all(|l| l.owner_block == 4));
    }

    #[test]
    fn lay_out_list_uses_gutter() {
        let g = templates::find("a6labs-letterhead-1").unwrap().geometry;
        // 20 chars minus a 15pt gutter leaves room for 5 characters.
        let mut m = CharBudget { max: 20, queries: 0 };
        let block = ContentBlock::OrderedList {
            items: vec!["one two".into(), "three".into()],
        };
        let laid = lay_out(0, &block, &mut m, &g).unwrap();
        match laid {
            LaidOutBlock::List { kind, items, .. } => {
                assert_eq!(kind, ListKind::Ordered);
                assert_eq!(items[0].len(), 2);
                assert_eq!(items[0][0].kind, LineKind::ListItem);
                assert_eq!(items[0][1].kind, LineKind::ListItemContinuation);
                assert_eq!(items[1].len(), 1);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn word_order_is_preserved() {
        let g = templates::find("a6labs-letterhead-1").unwrap().geometry;
        let text = "the quick <em>brown fox</em> jumps over the lazy dog again and again";
        let block = ContentBlock::paragraph(vec![text.into()]);
        let mut m = CharBudget { max: 12, queries: 0 };
        let laid = lay_out(0, &block, &mut m, &g).unwrap();
        let joined: Vec<String> = laid.lines().iter().map(|l| l.text.clone()).collect();
        assert_eq!(split_words(&joined.join(" ")), split_words(text));
    }
}
