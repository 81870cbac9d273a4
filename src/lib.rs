//! # letterforge – Letterhead generator
//!
//! Turns a letter form and a rich-text body into a paginated letterhead
//! document. The pipeline stages are:
//!
//! 1. **Normalize** – editor HTML or plain text → content blocks ([`blocks`])
//! 2. **Measure** – fits/doesn't-fit queries against the template's text
//!    column, in a live page instance ([`sandbox`]) or by font metrics
//!    ([`measure`])
//! 3. **Break** – blocks → visual lines ([`linebreak`])
//! 4. **Pack** – visual lines → pages under a line budget ([`packer`])
//! 5. **Render** – pages → template HTML ([`templates`]) and PDF ([`render`])

pub mod blocks;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod linebreak;
pub mod measure;
pub mod packer;
pub mod pipeline;
pub mod render;
pub mod sandbox;
pub mod templates;

// Re-exports for convenience
pub use error::{Error, Result};
pub use pipeline::{
    generate_document, generate_pdf, paginate_letter, CancelToken, GenerationRequest,
    LetterDocument, LetterForm, PipelineConfig,
};
