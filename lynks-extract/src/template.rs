//! Runner templates and rendering of extraction tasks into executable units.
//!
//! Templates are Handlebars and use triple-stash placeholders: `{{{ content }}}`,
//! `{{{ url }}}`, `{{{ output }}}` and `{{{ strip_mode }}}`. Each placeholder is
//! replaced by a complete string literal, so a template writes
//! `content = {{{ content }}}` rather than quoting the value itself. Rendered
//! values are never rescanned for placeholders, and `\{{{` writes a literal
//! `{{{` into the unit.
use crate::literal::{self, LiteralError};
use crate::task::ExtractionTask;
use handlebars::{Handlebars, RenderError, RenderErrorReason, TemplateError};
use lynks_common::{LynksError, Result};
use lynks_config::{EmbeddingStrategy, StripMode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const READABILITY_RUNNER: &str = include_str!("../templates/readability_runner.py");

const CONTENT: &str = "content";
const URL: &str = "url";
const OUTPUT: &str = "output";
const STRIP_MODE: &str = "strip_mode";

/// A compiled runner template.
pub struct ScriptTemplate {
    name: String,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for ScriptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Fully substituted runner source plus the values the executor needs to report on it.
#[derive(Debug, Clone)]
pub struct RenderedUnit {
    source: String,
    source_url: String,
    output_path: PathBuf,
}

impl RenderedUnit {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Absolute path the unit writes to.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl ScriptTemplate {
    /// The built-in runner: readability extraction, normalization and the two-part output file.
    pub fn readability_runner() -> Result<Self> {
        Self::from_source("readability_runner.py", READABILITY_RUNNER)
    }

    /// Load a template from disk. Unreadable files are a configuration problem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            LynksError::Configuration(format!(
                "failed to read runner template {}: {e}",
                path.display()
            ))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_source(name, &source)
    }

    /// Compile template text. Syntax errors and unknown placeholders fail here,
    /// not at render time.
    ///
    /// ```
    /// use lynks_extract::template::ScriptTemplate;
    ///
    /// assert!(ScriptTemplate::from_source("ok", "print({{{ url }}})").is_ok());
    /// assert!(ScriptTemplate::from_source("bad", "print({{{ title }}})").is_err());
    /// ```
    pub fn from_source(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(&name, source)
            .map_err(|e| template_error(&name, e))?;

        let template = Self { name, registry };
        // A dry run with every value present leaves only unknown names to fail.
        template.substitute("", "", "", "")?;
        Ok(template)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Substitute the task's values, embedding `content` with `strategy`.
    ///
    /// `url` and `output` are always fully escaped. The output path is made
    /// absolute first because the unit runs in its own working directory.
    pub fn render(
        &self,
        task: &ExtractionTask,
        strategy: EmbeddingStrategy,
        strip: StripMode,
    ) -> Result<RenderedUnit> {
        let content =
            literal::embed(task.content(), strategy).map_err(|e| literal_error(CONTENT, e))?;
        let url = literal::escaped(task.source_url());

        let output_path = std::path::absolute(task.output_path()).map_err(|e| LynksError::Render {
            placeholder: OUTPUT.into(),
            reason: format!("cannot resolve {}: {e}", task.output_path().display()),
        })?;
        let output = output_path
            .to_str()
            .map(literal::escaped)
            .ok_or_else(|| LynksError::Render {
                placeholder: OUTPUT.into(),
                reason: format!("path is not valid UTF-8: {}", output_path.display()),
            })?;
        let strip_mode = literal::escaped(strip_mode_label(strip));

        let source = self.substitute(&content, &url, &output, &strip_mode)?;

        debug!(
            template = %self.name,
            strategy = ?strategy,
            strip = ?strip,
            content_bytes = task.content().len(),
            unit_bytes = source.len(),
            "extract.render.done"
        );

        Ok(RenderedUnit {
            source,
            source_url: task.source_url().to_string(),
            output_path,
        })
    }

    fn substitute(&self, content: &str, url: &str, output: &str, strip_mode: &str) -> Result<String> {
        let values = BTreeMap::from([
            (CONTENT, content),
            (URL, url),
            (OUTPUT, output),
            (STRIP_MODE, strip_mode),
        ]);
        self.registry
            .render(&self.name, &values)
            .map_err(|e| render_error(&self.name, e))
    }
}

/// Label the runner understands for each strip mode.
pub fn strip_mode_label(mode: StripMode) -> &'static str {
    match mode {
        StripMode::WrapperTags => "wrapper-tags",
        StripMode::PassThrough => "pass-through",
        StripMode::Markup => "markup",
    }
}

fn literal_error(placeholder: &str, err: LiteralError) -> LynksError {
    LynksError::Render {
        placeholder: placeholder.into(),
        reason: err.to_string(),
    }
}

fn template_error(name: &str, err: TemplateError) -> LynksError {
    LynksError::Render {
        placeholder: name.into(),
        reason: format!("invalid template: {err}"),
    }
}

fn render_error(name: &str, err: RenderError) -> LynksError {
    match err.reason() {
        RenderErrorReason::MissingVariable(Some(path)) => LynksError::Render {
            placeholder: path.clone(),
            reason: format!("unknown placeholder in template {name}"),
        },
        _ => LynksError::Render {
            placeholder: name.into(),
            reason: err.to_string(),
        },
    }
}
