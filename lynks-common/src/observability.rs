//! Logging setup for the Lynks binaries.
//!
//! Events go to a daily file under the log directory and, optionally, to
//! stderr. The file rotates at midnight UTC and is named
//! `<component>.log.<YYYY-MM-DD>`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Keeps the background writer alive for the life of the process.
static WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static ACTIVE_FILE: OnceLock<PathBuf> = OnceLock::new();

const LOG_DIR_ENV: &str = "LYNKS_LOG_DIR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// What [`init_logging`] sets up.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Names the log file.
    pub component: &'static str,
    /// Falls back to `LYNKS_LOG_DIR`, then `~/.local/share/<component>`.
    pub dir: Option<PathBuf>,
    pub stderr: bool,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            component: "lynks",
            dir: None,
            stderr: false,
            format: LogFormat::Text,
            filter: "info".to_string(),
        }
    }
}

/// The rotating log file of one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    dir: PathBuf,
    stem: String,
}

impl LogFile {
    pub fn new(dir: impl Into<PathBuf>, component: &str) -> Self {
        Self {
            dir: dir.into(),
            stem: format!("{component}.log"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file written on `date` (UTC).
    pub fn path_on(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.stem, date.format("%Y-%m-%d")))
    }

    /// The file being written now.
    pub fn current(&self) -> PathBuf {
        self.path_on(Utc::now().date_naive())
    }

    fn appender(&self) -> rolling::RollingFileAppender {
        rolling::daily(&self.dir, &self.stem)
    }
}

/// Install the global subscriber and return today's log file.
///
/// Only the first call installs anything; later calls return the file
/// chosen by the first.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = ACTIVE_FILE.get() {
        return Ok(path.clone());
    }

    let file = LogFile::new(log_dir(&config), config.component);
    std::fs::create_dir_all(file.dir())
        .with_context(|| format!("failed to create log directory: {}", file.dir().display()))?;

    let (writer, guard) = tracing_appender::non_blocking(file.appender());
    let _ = WRITER_GUARD.set(guard);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(sinks(writer, config.format, config.stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let path = file.current();
    let _ = ACTIVE_FILE.set(path.clone());
    Ok(path)
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn sinks<S>(writer: NonBlocking, format: LogFormat, stderr: bool) -> Vec<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let mut layers = Vec::with_capacity(2);
    match format {
        LogFormat::Text => {
            layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
            if stderr {
                layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
            }
        }
        LogFormat::Json => {
            layers.push(fmt::layer().json().with_writer(writer).boxed());
            if stderr {
                layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
            }
        }
    }
    layers
}

fn log_dir(config: &LogConfig) -> PathBuf {
    config
        .dir
        .clone()
        .or_else(|| std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))
        .map(|dir| expand_home(&dir))
        .unwrap_or_else(|| data_dir(config.component))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn data_dir(component: &str) -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/share").join(component),
        None => PathBuf::from(component),
    }
}
