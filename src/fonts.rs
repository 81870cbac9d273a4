//! Font loading and text measurement using `ttf-parser`.
//!
//! Without a font file the manager measures with the standard Helvetica
//! advance widths, which is also the face the PDF renderer writes with.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Helvetica advance widths (1/1000 em) for ASCII 0x20..=0x7E.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica-Bold advance widths (1/1000 em) for ASCII 0x20..=0x7E.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Width used for glyphs outside the table (accented letters, dashes, ...).
const FALLBACK_ADVANCE: u16 = 556;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Weight/slant variant of the single family used for letter text.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub bold: bool,
    pub italic: bool,
}

/// Manages loaded fonts.
#[derive(Clone, Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF font from bytes for one variant.
    pub fn load_font(&mut self, bold: bool, italic: bool, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse font: {e}")))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        self.fonts.insert(FontKey { bold, italic }, data);
        Ok(())
    }

    /// Load one font file and use it for every variant that has no face yet.
    pub fn load_font_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        for (bold, italic) in [(false, false), (true, false), (false, true), (true, true)] {
            if !self.fonts.contains_key(&FontKey { bold, italic }) {
                self.load_font(bold, italic, bytes.clone())?;
            }
        }
        log::debug!("loaded measurement font {}", path.display());
        Ok(())
    }

    /// Check if real font bytes are loaded for the regular face.
    pub fn has_real_fonts(&self) -> bool {
        self.fonts.contains_key(&FontKey {
            bold: false,
            italic: false,
        })
    }

    /// Measure the width of a string at a given font size (in pt).
    /// Loaded faces are measured by glyph advances; otherwise the builtin
    /// Helvetica table is used (oblique shares the upright widths).
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool, italic: bool) -> f32 {
        if let Some(data) = self.fonts.get(&FontKey { bold, italic }) {
            if let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) {
                let scale = font_size / data.units_per_em;
                return text
                    .chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        // Fallback for missing glyph
                        None => font_size * 0.5,
                    })
                    .sum();
            }
        }

        let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
        let units: u32 = text.chars().map(|ch| builtin_advance(table, ch) as u32).sum();
        units as f32 * font_size / 1000.0
    }

    /// Line height in pt.
    pub fn line_height_pt(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Ascender in pt for the regular face (Helvetica: 0.718 em).
    pub fn ascender_pt(&self, font_size: f32) -> f32 {
        match self.fonts.get(&FontKey {
            bold: false,
            italic: false,
        }) {
            Some(data) => data.ascender * font_size / data.units_per_em,
            None => font_size * 0.718,
        }
    }
}

fn builtin_advance(table: &[u16; 95], ch: char) -> u16 {
    match ch {
        '\u{00A0}' => table[0],
        ' '..='~' => table[ch as usize - 0x20],
        _ => FALLBACK_ADVANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 10.0, false, false);
        // H 722 + e 556 + l 222 + l 222 + o 556 = 2278 units
        assert!((w - 22.78).abs() < 0.01, "got {w}");
    }

    #[test]
    fn bold_is_wider() {
        let mgr = FontManager::default();
        let regular = mgr.measure_text_width("letterhead", 9.0, false, false);
        let bold = mgr.measure_text_width("letterhead", 9.0, true, false);
        assert!(bold > regular);
    }

    #[test]
    fn non_ascii_uses_fallback_advance() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("\u{00E9}", 10.0, false, false);
        assert!((w - 5.56).abs() < 0.01);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut mgr = FontManager::new();
        assert!(mgr.load_font(false, false, vec![0, 1, 2, 3]).is_err());
        assert!(!mgr.has_real_fonts());
    }
}
