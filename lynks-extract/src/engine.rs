//! The extraction capability as seen from Lynks: HTML and a URL in, title and summary out.
use crate::task::ExtractionResult;
use lynks_common::{LynksError, Result};
use std::io::Cursor;
use tracing::debug;
use url::Url;

/// Base URL used when the task's URL does not parse; it only anchors relative links.
const PLACEHOLDER_BASE_URL: &str = "http://localhost/";

pub trait ExtractionEngine: Send + Sync {
    /// Turn raw HTML into a readable title and main-content HTML.
    ///
    /// `url` resolves relative references and need not be reachable.
    fn extract(&self, content: &str, url: &str) -> Result<ExtractionResult>;

    fn name(&self) -> &'static str;
}

/// In-process engine backed by the `readability` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadabilityEngine;

impl ExtractionEngine for ReadabilityEngine {
    fn extract(&self, content: &str, url: &str) -> Result<ExtractionResult> {
        let base = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(_) => Url::parse(PLACEHOLDER_BASE_URL).map_err(|e| LynksError::Extraction {
                url: url.to_string(),
                reason: format!("invalid placeholder base url: {e}"),
            })?,
        };

        let mut cursor = Cursor::new(content.as_bytes());
        match readability::extractor::extract(&mut cursor, &base) {
            Ok(product) => {
                debug!(
                    url = %url,
                    title = %product.title,
                    summary_bytes = product.content.len(),
                    "extract.engine.readability.done"
                );
                Ok(ExtractionResult {
                    title: product.title,
                    summary_html: product.content,
                })
            }
            // An empty document still yields a (blank) result.
            Err(_) if content.trim().is_empty() => Ok(ExtractionResult::default()),
            Err(e) => Err(LynksError::Extraction {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "readability"
    }
}
