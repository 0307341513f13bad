//! Atomic writer for the title and verse files
//!
//! Each file is staged next to its target and renamed into place, so OBS
//! never reads a half-written file. The verse file is committed before the
//! title file: a title never shows up ahead of its verses.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OutputDestination;
use crate::slide::SlideContent;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to stage {path:?}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to replace {path:?}: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes slide content to the configured overlay files
#[derive(Debug, Clone)]
pub struct OutputWriter {
    destination: OutputDestination,
}

impl OutputWriter {
    pub fn new(destination: OutputDestination) -> Self {
        Self { destination }
    }

    pub fn destination(&self) -> &OutputDestination {
        &self.destination
    }

    /// Write the title line and flattened verses as one unit
    pub async fn write(&self, content: &SlideContent) -> Result<(), OutputError> {
        let title_path = &self.destination.title_file;
        let verse_path = &self.destination.verse_file;
        let title_tmp = staging_path(title_path);
        let verse_tmp = staging_path(verse_path);
        let verse_text = format_verses(&content.verses);

        // Both stages run to completion so nothing is left writing behind a discard
        let (title_staged, verse_staged) = tokio::join!(
            stage(&title_tmp, &content.title_line),
            stage(&verse_tmp, &verse_text),
        );
        if let Err(e) = title_staged.and(verse_staged) {
            discard(&title_tmp).await;
            discard(&verse_tmp).await;
            return Err(e);
        }

        if let Err(e) = commit(&verse_tmp, verse_path).await {
            discard(&title_tmp).await;
            discard(&verse_tmp).await;
            return Err(e);
        }
        if let Err(e) = commit(&title_tmp, title_path).await {
            discard(&title_tmp).await;
            return Err(e);
        }

        debug!(
            "Wrote {} title bytes to {:?} and {} verse bytes to {:?}",
            content.title_line.len(),
            title_path,
            verse_text.len(),
            verse_path
        );
        Ok(())
    }

    /// Empty both files, used at startup to drop text left by a previous run
    pub async fn clear(&self) -> Result<(), OutputError> {
        self.write(&SlideContent::default()).await
    }
}

/// Flatten verses into one newline-joined block with no trailing newline
pub fn format_verses(verses: &[String]) -> String {
    let mut text = String::new();
    for verse in verses {
        // A lone `\r` also ends a line
        let verse = verse.replace("\r\n", "\n").replace('\r', "\n");
        for line in verse.lines() {
            text.push_str(line);
            text.push('\n');
        }
    }

    if text.ends_with('\n') {
        text.pop();
    }
    text
}

/// Sibling temp file, so the final rename stays on one filesystem
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!(".{}.tmp", name))
}

async fn stage(path: &Path, contents: &str) -> Result<(), OutputError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| OutputError::Stage {
            path: path.to_path_buf(),
            source,
        })
}

async fn commit(staged: &Path, target: &Path) -> Result<(), OutputError> {
    tokio::fs::rename(staged, target)
        .await
        .map_err(|source| OutputError::Commit {
            path: target.to_path_buf(),
            source,
        })
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed staged file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged file {:?}: {}", path, e),
    }
}
