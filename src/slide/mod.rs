//! Slide content extraction - title line and verse text from OpenSong slide XML

mod parser;
mod sanitize;

pub use parser::parse_slide;

/// Text extracted from one slide, ready to be written for the overlay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideContent {
    /// Quoted title, optional author and optional CCLI line
    pub title_line: String,
    /// Verse bodies in document order, already sanitized
    pub verses: Vec<String>,
}

impl SlideContent {
    /// True when there is nothing to show
    pub fn is_empty(&self) -> bool {
        self.title_line.is_empty() && self.verses.is_empty()
    }
}
