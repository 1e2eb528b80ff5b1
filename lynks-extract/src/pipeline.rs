//! Extractor pipelines: how a task gets from raw HTML to an output file.
use crate::engine::{ExtractionEngine, ReadabilityEngine};
use crate::executor::{InterpreterExecutor, TaskExecutor};
use crate::normalize::normalize;
use crate::output::{read_output, write_output};
use crate::task::{ExtractionTask, NormalizedOutput};
use crate::template::ScriptTemplate;
use async_trait::async_trait;
use lynks_common::{LynksError, Result};
use lynks_config::{EmbeddingStrategy, ExtractionSettings, ExtractorMode, StripMode};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract `task`, write its output file and return what was written.
    async fn extract(&self, task: &ExtractionTask) -> Result<NormalizedOutput>;

    fn name(&self) -> &'static str;
}

/// Renders a runner, executes it and reads back the file it wrote.
pub struct ScriptExtractor<X: TaskExecutor> {
    template: ScriptTemplate,
    executor: X,
    strategy: EmbeddingStrategy,
    strip: StripMode,
}

impl<X: TaskExecutor> ScriptExtractor<X> {
    pub fn new(template: ScriptTemplate, executor: X) -> Self {
        Self {
            template,
            executor,
            strategy: EmbeddingStrategy::default(),
            strip: StripMode::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: EmbeddingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_strip(mut self, strip: StripMode) -> Self {
        self.strip = strip;
        self
    }
}

#[async_trait]
impl<X: TaskExecutor + 'static> ContentExtractor for ScriptExtractor<X> {
    async fn extract(&self, task: &ExtractionTask) -> Result<NormalizedOutput> {
        info!(
            template = %self.template.name(),
            url = %task.source_url(),
            output = %task.output_path().display(),
            "extract.render.start"
        );
        let unit = self.template.render(task, self.strategy, self.strip)?;
        let report = self.executor.execute(&unit).await?;
        let output = read_output(unit.output_path())?;
        info!(
            url = %task.source_url(),
            title = %output.title,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "extract.script.done"
        );
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

/// Calls the engine in-process and writes the normalized result itself.
///
/// The engine is synchronous, so it runs on the blocking pool.
pub struct DirectExtractor<E: ExtractionEngine> {
    engine: Arc<E>,
    strip: StripMode,
}

impl<E: ExtractionEngine> DirectExtractor<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            strip: StripMode::default(),
        }
    }

    pub fn with_strip(mut self, strip: StripMode) -> Self {
        self.strip = strip;
        self
    }
}

#[async_trait]
impl<E: ExtractionEngine + 'static> ContentExtractor for DirectExtractor<E> {
    async fn extract(&self, task: &ExtractionTask) -> Result<NormalizedOutput> {
        let started = Instant::now();
        let engine = Arc::clone(&self.engine);
        let strip = self.strip;
        let owned = task.clone();
        let output = tokio::task::spawn_blocking(move || {
            let result = engine.extract(owned.content(), owned.source_url())?;
            let output = normalize(result, strip);
            write_output(owned.output_path(), &output)?;
            Ok::<_, LynksError>(output)
        })
        .await
        .map_err(|e| LynksError::Extraction {
            url: task.source_url().to_string(),
            reason: format!("engine task failed: {e}"),
        })??;
        info!(
            engine = self.engine.name(),
            url = %task.source_url(),
            title = %output.title,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extract.direct.done"
        );
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Runs `fallback` when `primary` fails to extract or to execute.
pub struct FallbackExtractor {
    primary: Box<dyn ContentExtractor>,
    fallback: Box<dyn ContentExtractor>,
}

impl FallbackExtractor {
    pub fn new(primary: Box<dyn ContentExtractor>, fallback: Box<dyn ContentExtractor>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ContentExtractor for FallbackExtractor {
    async fn extract(&self, task: &ExtractionTask) -> Result<NormalizedOutput> {
        match self.primary.extract(task).await {
            Err(err @ (LynksError::Extraction { .. } | LynksError::Execution { .. })) => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    url = %task.source_url(),
                    kind = err.kind(),
                    error = %err,
                    "extract.fallback"
                );
                self.fallback.extract(task).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Assemble the extractor described by `settings`.
pub fn build_extractor(settings: &ExtractionSettings) -> Result<Box<dyn ContentExtractor>> {
    let direct = || DirectExtractor::new(ReadabilityEngine).with_strip(settings.strip);
    let script = || -> Result<ScriptExtractor<InterpreterExecutor>> {
        let template = match &settings.template {
            Some(path) => ScriptTemplate::from_file(path)?,
            None => ScriptTemplate::readability_runner()?,
        };
        Ok(
            ScriptExtractor::new(template, InterpreterExecutor::from_settings(settings))
                .with_strategy(settings.embedding)
                .with_strip(settings.strip),
        )
    };

    let extractor: Box<dyn ContentExtractor> = match settings.mode {
        ExtractorMode::Script => Box::new(script()?),
        ExtractorMode::Direct => Box::new(direct()),
        ExtractorMode::ScriptWithFallback => Box::new(FallbackExtractor::new(
            Box::new(script()?),
            Box::new(direct()),
        )),
    };
    info!(
        mode = ?settings.mode,
        extractor = extractor.name(),
        embedding = ?settings.embedding,
        strip = ?settings.strip,
        "extract.pipeline.ready"
    );
    Ok(extractor)
}
