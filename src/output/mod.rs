//! Overlay output - the two text files OBS text sources read from

mod writer;

pub use writer::OutputWriter;
