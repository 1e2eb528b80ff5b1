//! Post-processing of engine output before it is persisted.
//!
//! [`StripMode::WrapperTags`] is plain substring deletion and deliberately
//! misses attributed or differently cased tags (`<body class="x">`).
//! [`StripMode::Markup`] catches those. Both passes repeat until nothing
//! changes, so normalizing twice equals normalizing once.
use crate::task::{ExtractionResult, NormalizedOutput};
use lynks_config::StripMode;
use regex::Regex;
use std::sync::LazyLock;

/// Structural wrappers the engine adds around its summary.
pub const WRAPPER_TAGS: [&str; 4] = ["<html>", "</html>", "<body>", "</body>"];

static WRAPPER_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:html|body)(?:\s[^>]*)?/?>").expect("WRAPPER_MARKUP regex")
});

/// Apply `mode` to the summary and flatten the title onto one line.
///
/// ```
/// use lynks_config::StripMode;
/// use lynks_extract::{normalize, ExtractionResult};
///
/// let result = ExtractionResult {
///     title: "Hello".into(),
///     summary_html: "<html><body><p>hi</p></body></html>".into(),
/// };
/// assert_eq!(normalize(result, StripMode::WrapperTags).body, "<p>hi</p>");
/// ```
pub fn normalize(result: ExtractionResult, mode: StripMode) -> NormalizedOutput {
    NormalizedOutput {
        title: single_line(&result.title),
        body: strip(result.summary_html, mode),
    }
}

/// Apply only the body part of normalization.
pub fn strip(summary_html: String, mode: StripMode) -> String {
    match mode {
        StripMode::WrapperTags => until_stable(summary_html, remove_wrapper_tags),
        StripMode::PassThrough => summary_html,
        StripMode::Markup => until_stable(summary_html, |text| {
            WRAPPER_MARKUP.replace_all(text, "").into_owned()
        }),
    }
}

/// Titles share the first line of the output file with nothing else.
pub fn single_line(title: &str) -> String {
    title.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn remove_wrapper_tags(text: &str) -> String {
    WRAPPER_TAGS
        .iter()
        .fold(text.to_string(), |acc, tag| acc.replace(tag, ""))
}

fn until_stable(mut text: String, step: impl Fn(&str) -> String) -> String {
    loop {
        let next = step(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}
