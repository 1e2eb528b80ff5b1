//! The two-part output file: title, newline, body.
use crate::task::NormalizedOutput;
use lynks_common::{LynksError, Result};
use std::path::Path;
use tracing::debug;

/// Serialize an output exactly as it is written to disk.
///
/// ```
/// use lynks_extract::{output::encode, NormalizedOutput};
///
/// let out = NormalizedOutput { title: "T".into(), body: "B".into() };
/// assert_eq!(encode(&out), "T\nB");
/// ```
pub fn encode(output: &NormalizedOutput) -> String {
    let mut text = String::with_capacity(output.title.len() + 1 + output.body.len());
    text.push_str(&output.title);
    text.push('\n');
    text.push_str(&output.body);
    text
}

/// Split file contents at the first newline. No newline means an empty body.
pub fn decode(text: &str) -> NormalizedOutput {
    match text.split_once('\n') {
        Some((title, body)) => NormalizedOutput {
            title: title.to_string(),
            body: body.to_string(),
        },
        None => NormalizedOutput {
            title: text.to_string(),
            body: String::new(),
        },
    }
}

/// Overwrite `path` with the encoded output. Missing parent directories are not created.
pub fn write_output(path: &Path, output: &NormalizedOutput) -> Result<()> {
    std::fs::write(path, encode(output)).map_err(|source| LynksError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        title_bytes = output.title.len(),
        body_bytes = output.body.len(),
        "extract.output.written"
    );
    Ok(())
}

/// Read back a file produced by [`write_output`] or by a runner script.
pub fn read_output(path: &Path) -> Result<NormalizedOutput> {
    let text = std::fs::read_to_string(path).map_err(|source| LynksError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode(&text))
}
