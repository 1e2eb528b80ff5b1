//! Content extraction for Lynks: raw HTML in, a readable title and summary
//! written to an output file.
//!
//! The default pipeline renders a runner script from a template, executes it
//! in a fresh interpreter and reads back the file it produced. The
//! [`DirectExtractor`] calls an [`ExtractionEngine`] in-process instead, and
//! [`FallbackExtractor`] chains the two.
//!
//! ```no_run
//! use lynks_config::ExtractionSettings;
//! use lynks_extract::{build_extractor, ContentExtractor, ExtractionTask};
//!
//! # async fn run() -> lynks_common::Result<()> {
//! let extractor = build_extractor(&ExtractionSettings::default())?;
//! let task = ExtractionTask::new("<html>...</html>", "https://example.com", "/tmp/out.html");
//! let output = extractor.extract(&task).await?;
//! println!("{}", output.title);
//! # Ok(())
//! # }
//! ```
pub mod engine;
pub mod executor;
pub mod literal;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod task;
pub mod template;

pub use engine::{ExtractionEngine, ReadabilityEngine};
pub use executor::{ExecutionReport, InterpreterExecutor, TaskExecutor};
pub use lynks_config::{EmbeddingStrategy, StripMode};
pub use normalize::normalize;
pub use pipeline::{
    build_extractor, ContentExtractor, DirectExtractor, FallbackExtractor, ScriptExtractor,
};
pub use task::{ExtractionResult, ExtractionTask, NormalizedOutput};
pub use template::{RenderedUnit, ScriptTemplate};
