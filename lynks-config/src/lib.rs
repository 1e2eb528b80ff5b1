//! Loader for Lynks utility configuration with YAML + environment overlays.
//!
//! Two sources feed the utilities:
//!
//! - `lynks.yaml` (optional) holds extraction and logging settings. Values may
//!   reference `${VAR}` placeholders and `LYNKS_`-prefixed variables override
//!   individual keys (`LYNKS_EXTRACTION__EMBEDDING=escaped`).
//! - `config/.env` holds the database credentials, see [`DatabaseSettings`].
use config::{Config, ConfigError, Environment, File};
use lynks_common::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

mod credentials;

pub use credentials::DatabaseSettings;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
pub(crate) const ENV_PREFIX: &str = "LYNKS";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LynksConfig {
    pub version: Option<String>,
    pub extraction: ExtractionSettings,
    pub logging: LoggingSettings,
}

/// How the `content` placeholder is embedded into the generated runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingStrategy {
    /// `"""value"""`: no escaping at all.
    TripleQuoted,
    /// `r"""value"""`: backslashes stay literal.
    Raw,
    /// `"value"` with every special character escaped. Carries any string.
    #[default]
    Escaped,
}

/// Post-processing applied to the extracted summary before it is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StripMode {
    /// Delete the literal substrings `<html>`, `</html>`, `<body>`, `</body>`.
    #[default]
    WrapperTags,
    /// Leave the summary untouched.
    PassThrough,
    /// Remove `html`/`body` tags in any case and with attributes.
    Markup,
}

/// Which extractor pipeline to assemble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorMode {
    /// Generate a runner script and execute it in a fresh interpreter.
    #[default]
    Script,
    /// Call the in-process engine directly.
    Direct,
    /// Script first, in-process engine when the script fails.
    ScriptWithFallback,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    pub embedding: EmbeddingStrategy,
    pub strip: StripMode,
    /// Custom runner template; the built-in readability runner otherwise.
    pub template: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    /// Variables passed through to the interpreter; everything else is cleared.
    pub inherit_env: Vec<String>,
    pub mode: ExtractorMode,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            interpreter_args: vec!["-B".into()],
            embedding: EmbeddingStrategy::default(),
            strip: StripMode::default(),
            template: None,
            timeout_secs: None,
            inherit_env: ["PATH", "HOME", "VIRTUAL_ENV", "PYTHONPATH", "SYSTEMROOT"]
                .into_iter()
                .map(String::from)
                .collect(),
            mode: ExtractorMode::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
    pub filter: String,
    pub stderr: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            dir: None,
            filter: "info".into(),
            stderr: false,
        }
    }
}

impl LoggingSettings {
    /// Translate into the observability config for the named binary.
    pub fn to_log_config(&self, component: &'static str) -> LogConfig {
        LogConfig {
            component,
            dir: self.dir.clone(),
            stderr: self.stderr,
            format: self.format,
            filter: self.filter.clone(),
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct LynksConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for LynksConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LynksConfigLoader {
    /// Start with defaults; `LYNKS_` environment variables are overlaid on load.
    ///
    /// ```
    /// use lynks_config::{EmbeddingStrategy, LynksConfigLoader};
    ///
    /// let config = LynksConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.extraction.interpreter, "python3");
    /// assert_eq!(config.extraction.embedding, EmbeddingStrategy::Escaped);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so deployments can run on environment variables alone.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use lynks_config::{ExtractorMode, LynksConfigLoader, StripMode};
    ///
    /// let cfg = LynksConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// extraction:
    ///   strip: pass-through
    ///   mode: direct
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.extraction.strip, StripMode::PassThrough);
    /// assert_eq!(cfg.extraction.mode, ExtractorMode::Direct);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// `${VAR}` placeholders are expanded before the typed structs are built.
    ///
    /// ```
    /// use lynks_config::LynksConfigLoader;
    ///
    /// temp_env::with_var("LYNKS_TEST_PYTHON", Some("/opt/venv/bin/python"), || {
    ///     let config = LynksConfigLoader::new()
    ///         .with_yaml_str(r#"
    /// extraction:
    ///   interpreter: "${LYNKS_TEST_PYTHON}"
    ///   timeout_secs: 30
    /// "#)
    ///         .load()
    ///         .expect("valid configuration");
    ///
    ///     assert_eq!(config.extraction.interpreter, "/opt/venv/bin/python");
    ///     assert_eq!(config.extraction.timeout_secs, Some(30));
    /// });
    /// ```
    pub fn load(self) -> Result<LynksConfig, ConfigError> {
        // Environment goes last so it overrides every file.
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: LynksConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
