//! OpenSong slide XML parser
//!
//! The REST API answers `GET /presentation/slide/{n}` with a document shaped
//! roughly like:
//!
//! ```xml
//! <response resource="slide" id="3">
//!   <slide type="song">
//!     <title>Amazing Grace</title>
//!     <author>John Newton</author>
//!     <ccli>12345</ccli>
//!     <slides>
//!       <slide><body>Amazing grace ...</body></slide>
//!     </slides>
//!   </slide>
//! </response>
//! ```

use anyhow::{bail, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use super::sanitize::sanitize;
use super::SlideContent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Author,
    Ccli,
    /// Index into the verse slots
    Body(usize),
}

/// Leading text of an element we care about
#[derive(Debug)]
struct Capture {
    field: Field,
    depth: usize,
    text: String,
    /// Cleared once the element opens its first child
    open: bool,
}

impl Capture {
    fn new(field: Field, depth: usize) -> Self {
        Self {
            field,
            depth,
            text: String::new(),
            open: true,
        }
    }
}

#[derive(Debug, Default)]
struct RawSlide {
    /// First `title`/`author`/`ccli` child only; later duplicates are ignored
    title: Option<String>,
    author: Option<String>,
    ccli: Option<String>,
    verses: Vec<String>,
}

impl RawSlide {
    fn into_content(self) -> SlideContent {
        let mut title_line = String::new();
        if let Some(title) = self.title.filter(|t| !t.is_empty()) {
            title_line.push_str(&format!("\"{}\"", title));
        }
        if let Some(author) = self.author.filter(|a| !a.is_empty()) {
            title_line.push_str(&format!(" - {}", author));
        }
        if let Some(ccli) = self.ccli.filter(|c| !c.is_empty()) {
            title_line.push_str(&format!("\nCCLI Song #{}", ccli));
        }

        SlideContent {
            title_line,
            verses: self.verses.into_iter().filter(|v| !v.is_empty()).collect(),
        }
    }
}

/// Parse a slide document into its title line and verses.
///
/// Content without a `slide` element under the document root, an empty body
/// (e.g. after a rejected fetch) and malformed XML all produce empty content.
pub fn parse_slide(xml: &str) -> SlideContent {
    if xml.trim().is_empty() {
        return SlideContent::default();
    }

    match read_slide(xml) {
        Ok(raw) => raw.into_content(),
        Err(e) => {
            warn!("Failed to parse slide XML: {}", e);
            debug!("Rejected slide XML: {}", xml);
            SlideContent::default()
        }
    }
}

fn read_slide(xml: &str) -> Result<RawSlide> {
    let mut reader = Reader::from_str(xml);

    let mut raw = RawSlide::default();
    let mut depth = 0usize;
    let mut slide_seen = false;
    let mut slide_depth: Option<usize> = None;
    let mut slides_depth: Option<usize> = None;
    let mut captures: Vec<Capture> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(capture) = captures.last_mut() {
                    capture.open = false;
                }
                depth += 1;

                let name = e.name();
                match (slide_depth, slides_depth) {
                    (None, _) if depth == 2 && !slide_seen && name.as_ref() == b"slide" => {
                        slide_seen = true;
                        slide_depth = Some(depth);
                    }
                    (Some(slide), None) if depth == slide + 1 => {
                        if name.as_ref() == b"slides" {
                            slides_depth = Some(depth);
                        } else if let Some(field) = meta_field(name.as_ref()) {
                            captures.push(Capture::new(field, depth));
                        }
                    }
                    (Some(_), Some(_)) if name.as_ref() == b"body" => {
                        // Reserve the slot now so nested bodies keep document order
                        raw.verses.push(String::new());
                        captures.push(Capture::new(Field::Body(raw.verses.len() - 1), depth));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if let Some(capture) = captures.last_mut() {
                    capture.open = false;
                }
                if depth == 1 && e.name().as_ref() == b"slide" {
                    slide_seen = true;
                }
                if slide_depth.is_some_and(|slide| depth == slide) && slides_depth.is_none() {
                    if let Some(field) = meta_field(e.name().as_ref()) {
                        store(&mut raw, Capture::new(field, depth + 1));
                    }
                }
            }
            Event::Comment(_) => {
                if let Some(capture) = captures.last_mut() {
                    capture.open = false;
                }
            }
            Event::Text(t) => {
                if let Some(capture) = captures.last_mut().filter(|c| c.open) {
                    capture.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(capture) = captures.last_mut().filter(|c| c.open) {
                    capture.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if captures.last().map(|c| c.depth == depth).unwrap_or(false) {
                    if let Some(capture) = captures.pop() {
                        store(&mut raw, capture);
                    }
                }
                if slides_depth == Some(depth) {
                    slides_depth = None;
                }
                if slide_depth == Some(depth) {
                    slide_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof if depth != 0 => bail!("document ends with {} unclosed element(s)", depth),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(raw)
}

fn meta_field(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"author" => Some(Field::Author),
        b"ccli" => Some(Field::Ccli),
        _ => None,
    }
}

fn store(raw: &mut RawSlide, capture: Capture) {
    match capture.field {
        Field::Title => {
            raw.title.get_or_insert(capture.text);
        }
        Field::Author => {
            raw.author.get_or_insert(capture.text);
        }
        Field::Ccli => {
            raw.ccli.get_or_insert(capture.text);
        }
        Field::Body(slot) => {
            if !capture.text.is_empty() {
                raw.verses[slot] = sanitize(&capture.text);
            }
        }
    }
}
