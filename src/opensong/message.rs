//! Classification of inbound WebSocket messages

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

const ALREADY_SUBSCRIBED: &str = "The requested action is not available.";
const OK: &str = "OK";

/// A message received on the push channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// Presentation status document
    Status(StatusUpdate),
    /// Plain text acknowledgement from the server
    Ack(Acknowledgement),
    /// Any other text, kept for logging
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Subscription accepted, OpenSong is running
    Ok,
    /// This client is already subscribed
    AlreadySubscribed,
}

/// Fields of interest in a status document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Presentation mode is active
    pub running: bool,
    /// Active slide, 0 when none
    pub slide_number: u32,
}

impl PushMessage {
    /// Classify a text frame.
    ///
    /// A frame is a status document iff it starts with an XML declaration
    /// and ends with `>`.
    pub fn classify(text: &str) -> Self {
        if text.starts_with("<?xml") && text.ends_with('>') {
            return Self::Status(StatusUpdate::parse(text));
        }

        match text {
            OK => Self::Ack(Acknowledgement::Ok),
            ALREADY_SUBSCRIBED => Self::Ack(Acknowledgement::AlreadySubscribed),
            other => Self::Other(other.to_string()),
        }
    }
}

impl StatusUpdate {
    /// Extract `presentation@running` and `slide@itemnumber`.
    ///
    /// Elements may appear anywhere and the last one wins. Missing or
    /// unparseable values, and malformed documents, fall back to
    /// "not running" and slide 0.
    pub fn parse(xml: &str) -> Self {
        let mut reader = Reader::from_str(xml);
        let mut update = StatusUpdate::default();
        let mut depth = 0usize;

        loop {
            let event = reader.read_event();
            match event {
                Ok(Event::Start(_)) => depth += 1,
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                _ => {}
            }

            match event {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                    b"presentation" => {
                        update.running = attribute(e, b"running")
                            .and_then(|v| v.trim().parse::<i64>().ok())
                            .map(|v| v != 0)
                            .unwrap_or(false);
                    }
                    b"slide" => {
                        update.slide_number = attribute(e, b"itemnumber")
                            .and_then(|v| v.trim().parse::<u32>().ok())
                            .unwrap_or(0);
                    }
                    _ => {}
                },
                Ok(Event::Eof) if depth != 0 => {
                    debug!("Truncated status document, treating as not running");
                    return StatusUpdate::default();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    debug!("Malformed status document ({}), treating as not running", e);
                    return StatusUpdate::default();
                }
                _ => {}
            }
        }

        update
    }
}

fn attribute(element: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(running: &str, slide: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <response resource=\"presentation\" action=\"status\">\
             <presentation running=\"{}\" mode=\"S\"><screen mode=\"N\"/>\
             <slide itemnumber=\"{}\"><name>Amazing Grace</name><title/></slide>\
             </presentation></response>",
            running, slide
        )
    }

    #[test]
    fn test_classify_acknowledgements() {
        assert_eq!(PushMessage::classify("OK"), PushMessage::Ack(Acknowledgement::Ok));
        assert_eq!(
            PushMessage::classify("The requested action is not available."),
            PushMessage::Ack(Acknowledgement::AlreadySubscribed)
        );
        assert_eq!(
            PushMessage::classify("something else"),
            PushMessage::Other("something else".to_string())
        );
    }

    #[test]
    fn test_classify_requires_declaration_and_closing_bracket() {
        assert!(matches!(PushMessage::classify(&status("1", "3")), PushMessage::Status(_)));
        assert!(matches!(
            PushMessage::classify("<response><presentation running=\"1\"/></response>"),
            PushMessage::Other(_)
        ));
        assert!(matches!(
            PushMessage::classify("<?xml version=\"1.0\"?><response"),
            PushMessage::Other(_)
        ));
    }

    #[test]
    fn test_parse_running_and_slide() {
        assert_eq!(
            StatusUpdate::parse(&status("1", "3")),
            StatusUpdate { running: true, slide_number: 3 }
        );
        assert_eq!(
            StatusUpdate::parse(&status("0", "12")),
            StatusUpdate { running: false, slide_number: 12 }
        );
    }

    #[test]
    fn test_parse_defaults_for_missing_or_bad_values() {
        let xml = "<?xml version=\"1.0\"?><response><presentation/></response>";
        assert_eq!(StatusUpdate::parse(xml), StatusUpdate::default());

        assert_eq!(StatusUpdate::parse(&status("yes", "three")), StatusUpdate::default());
    }

    #[test]
    fn test_parse_malformed_document_is_not_running() {
        let xml = "<?xml version=\"1.0\"?><response><presentation running=\"1\"><slide itemnumber=\"4\"></response>";
        assert_eq!(StatusUpdate::parse(xml), StatusUpdate::default());
    }

    #[test]
    fn test_truncated_document_is_not_running() {
        let xml = "<?xml version=\"1.0\"?><response><presentation running=\"1\"><slide itemnumber=\"4\">";
        let message = PushMessage::classify(xml);
        assert_eq!(message, PushMessage::Status(StatusUpdate::default()));

        let mut tracker = crate::opensong::PresentationTracker::new();
        assert_eq!(tracker.handle(&message).slide_to_fetch(), None);
    }
}
