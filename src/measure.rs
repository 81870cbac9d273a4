//! Line measurement – the fits/doesn't-fit oracle the line breaker asks for
//! every candidate line.
//!
//! Two implementations sit behind [`TextMeasurer`]:
//!
//! - [`SandboxMeasurer`](crate::sandbox::SandboxMeasurer) renders the run
//!   inside a live instance of the template page (exact, one layout query
//!   per candidate)
//! - [`MetricsMeasurer`] compares a font-table width against the template's
//!   declared column width (approximate, no page instance)

use serde::{Deserialize, Serialize};

use crate::dom::{parse_html, DomNode};
use crate::error::Result;
use crate::fonts::FontManager;

/// Answers whether an inline-HTML run fits on one line of the text column.
pub trait TextMeasurer {
    /// `indent_reserve` is subtracted from the column width first (list
    /// bullet / number gutter).
    fn fits(&mut self, run: &str, indent_reserve: f32) -> Result<bool>;
}

/// Which measurer a generation request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurerKind {
    /// Render into the live template page.
    #[default]
    Sandbox,
    /// Font-metrics table against the declared column width.
    Metrics,
}

impl std::str::FromStr for MeasurerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(MeasurerKind::Sandbox),
            "metrics" => Ok(MeasurerKind::Metrics),
            other => Err(format!("unknown measurer '{other}' (expected sandbox or metrics)")),
        }
    }
}

/// Approximate measurer: the run's plain text in the regular face.
pub struct MetricsMeasurer {
    fonts: FontManager,
    column_width: f32,
    font_size: f32,
}

impl MetricsMeasurer {
    pub fn new(fonts: FontManager, column_width: f32, font_size: f32) -> Self {
        Self {
            fonts,
            column_width,
            font_size,
        }
    }

    pub fn column_width(&self) -> f32 {
        self.column_width
    }
}

impl TextMeasurer for MetricsMeasurer {
    fn fits(&mut self, run: &str, indent_reserve: f32) -> Result<bool> {
        let text = plain_text(run);
        let width = self
            .fonts
            .measure_text_width(&text, self.font_size, false, false);
        Ok(width <= self.column_width - indent_reserve)
    }
}

/// Text content of an inline-HTML run, tags removed and entities decoded.
pub fn plain_text(run: &str) -> String {
    let mut out = String::new();
    for node in parse_html(run) {
        match node {
            DomNode::Text(t) => out.push_str(&t),
            DomNode::Element(e) => out.push_str(&e.text_content()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_strips_tags() {
        assert_eq!(
            plain_text("a <strong>bold</strong> &amp; <em>b</em>"),
            "a bold & b"
        );
    }

    #[test]
    fn metrics_measurer_respects_indent() {
        let fonts = FontManager::default();
        let width = fonts.measure_text_width("Dear Melanie,", 9.0, false, false);
        let mut m = MetricsMeasurer::new(fonts, width + 1.0, 9.0);
        assert!(m.fits("Dear Melanie,", 0.0).unwrap());
        assert!(m.fits("<strong>Dear</strong> Melanie,", 0.0).unwrap());
        assert!(!m.fits("Dear Melanie,", 15.0).unwrap());
    }

    #[test]
    fn measurer_kind_parses() {
        assert_eq!("Metrics".parse::<MeasurerKind>(), Ok(MeasurerKind::Metrics));
        assert_eq!("sandbox".parse::<MeasurerKind>(), Ok(MeasurerKind::Sandbox));
        assert!("browser".parse::<MeasurerKind>().is_err());
        let json = serde_json::to_string(&MeasurerKind::Metrics).unwrap();
        assert_eq!(json, "\"metrics\"");
    }
}
