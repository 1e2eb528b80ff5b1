use std::path::{Path, PathBuf};

/// One extraction request: raw HTML, where it came from, and where to write the result.
///
/// Fields are fixed at construction; a task is consumed by a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTask {
    content: String,
    source_url: String,
    output_path: PathBuf,
}

impl ExtractionTask {
    pub fn new(
        content: impl Into<String>,
        source_url: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            content: content.into(),
            source_url: source_url.into(),
            output_path: output_path.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// What an extraction engine hands back. `summary_html` may or may not carry wrapper tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub title: String,
    pub summary_html: String,
}

/// Title and cleaned body as persisted to the output file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedOutput {
    pub title: String,
    pub body: String,
}
