mod common;

use async_trait::async_trait;
use common::{install_stub_readability, python_available, readability_available, PYTHON};
use lynks_common::{LynksError, Result};
use lynks_config::{ExtractionSettings, ExtractorMode};
use lynks_extract::output::encode;
use lynks_extract::{
    build_extractor, ContentExtractor, DirectExtractor, EmbeddingStrategy, ExecutionReport,
    ExtractionEngine, ExtractionResult, ExtractionTask, FallbackExtractor, InterpreterExecutor,
    NormalizedOutput, RenderedUnit, ScriptExtractor, ScriptTemplate, StripMode, TaskExecutor,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct FakeEngine {
    title: &'static str,
    summary: &'static str,
}

impl ExtractionEngine for FakeEngine {
    fn extract(&self, _content: &str, _url: &str) -> Result<ExtractionResult> {
        Ok(ExtractionResult {
            title: self.title.into(),
            summary_html: self.summary.into(),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FailingEngine;

impl ExtractionEngine for FailingEngine {
    fn extract(&self, _content: &str, url: &str) -> Result<ExtractionResult> {
        Err(LynksError::Extraction {
            url: url.into(),
            reason: "engine exploded".into(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Records the thread it ran on.
struct ThreadRecordingEngine {
    ran_on: Arc<std::sync::Mutex<Option<std::thread::ThreadId>>>,
}

impl ExtractionEngine for ThreadRecordingEngine {
    fn extract(&self, _content: &str, _url: &str) -> Result<ExtractionResult> {
        *self.ran_on.lock().unwrap() = Some(std::thread::current().id());
        Ok(ExtractionResult {
            title: "T".into(),
            summary_html: "B".into(),
        })
    }

    fn name(&self) -> &'static str {
        "thread-recording"
    }
}

struct PanickingEngine;

impl ExtractionEngine for PanickingEngine {
    fn extract(&self, _content: &str, _url: &str) -> Result<ExtractionResult> {
        panic!("engine bug")
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// Pretends to be the interpreter: writes a fixed output or fails with a fixed error.
struct FakeExecutor {
    output: Option<NormalizedOutput>,
    failure: Option<fn(&RenderedUnit) -> LynksError>,
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl TaskExecutor for FakeExecutor {
    async fn execute(&self, unit: &RenderedUnit) -> Result<ExecutionReport> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = self.failure {
            return Err(fail(unit));
        }
        if let Some(out) = &self.output {
            std::fs::write(unit.output_path(), encode(out)).unwrap();
        }
        Ok(ExecutionReport {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::from_millis(1),
        })
    }
}

fn script_with(executor: FakeExecutor) -> ScriptExtractor<FakeExecutor> {
    ScriptExtractor::new(ScriptTemplate::readability_runner().unwrap(), executor)
}

fn interpreter_crash(_unit: &RenderedUnit) -> LynksError {
    LynksError::Execution {
        command: "python3 -B runner.py".into(),
        code: Some(1),
        detail: "ModuleNotFoundError: No module named 'readability'".into(),
    }
}

fn disk_full(unit: &RenderedUnit) -> LynksError {
    LynksError::Persistence {
        path: unit.output_path().to_path_buf(),
        source: std::io::Error::other("disk full"),
    }
}

fn crashing_executor(runs: Arc<AtomicUsize>) -> FakeExecutor {
    FakeExecutor {
        output: None,
        failure: Some(interpreter_crash),
        runs,
    }
}

#[tokio::test]
async fn direct_extractor_writes_title_newline_body() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.html");
    let extractor = DirectExtractor::new(FakeEngine {
        title: "T",
        summary: "<html><body>B</body></html>",
    });

    let out = extractor
        .extract(&ExtractionTask::new("<p>x</p>", "https://example.com", path.clone()))
        .await
        .unwrap();

    assert_eq!(out.body, "B");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "T\nB");
}

#[tokio::test]
async fn direct_extractor_pass_through_keeps_wrappers() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.html");
    let extractor = DirectExtractor::new(FakeEngine {
        title: "Multi\nline",
        summary: "<html><body>B</body></html>",
    })
    .with_strip(StripMode::PassThrough);

    extractor
        .extract(&ExtractionTask::new("", "", path.clone()))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Multi line\n<html><body>B</body></html>"
    );
}

#[tokio::test]
async fn direct_extractor_keeps_the_engine_off_the_runtime_thread() {
    let tmp = TempDir::new().unwrap();
    let ran_on = Arc::new(std::sync::Mutex::new(None));
    let extractor = DirectExtractor::new(ThreadRecordingEngine {
        ran_on: ran_on.clone(),
    });

    let out = extractor
        .extract(&ExtractionTask::new("<p>x</p>", "https://example.com", tmp.path().join("out.html")))
        .await
        .unwrap();

    assert_eq!(out.body, "B");
    let engine_thread = ran_on.lock().unwrap().expect("engine ran");
    assert_ne!(engine_thread, std::thread::current().id());
}

#[tokio::test]
async fn panicking_engine_is_an_extraction_failure() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.html");

    let err = DirectExtractor::new(PanickingEngine)
        .extract(&ExtractionTask::new("<p>x</p>", "https://example.com", path.clone()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "extraction");
    assert!(err.to_string().contains("engine task failed"), "{err}");
    assert!(!path.exists());
}

#[tokio::test]
async fn missing_parent_directory_is_not_created() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("missing").join("out.html");
    let extractor = DirectExtractor::new(FakeEngine {
        title: "T",
        summary: "B",
    });

    let err = extractor
        .extract(&ExtractionTask::new("<p>x</p>", "https://example.com", path))
        .await
        .unwrap_err();

    assert!(matches!(err, LynksError::Persistence { .. }), "{err}");
    assert!(!tmp.path().join("missing").exists());
}

#[tokio::test]
async fn script_extractor_reads_back_what_the_unit_wrote() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.html");
    let runs = Arc::new(AtomicUsize::new(0));
    let extractor = script_with(FakeExecutor {
        output: Some(NormalizedOutput {
            title: "Title".into(),
            body: "<p>body</p>\n".into(),
        }),
        failure: None,
        runs: runs.clone(),
    });

    let out = extractor
        .extract(&ExtractionTask::new("<p>x</p>", "https://example.com", path))
        .await
        .unwrap();

    assert_eq!(out.title, "Title");
    assert_eq!(out.body, "<p>body</p>\n");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn render_failures_never_reach_the_executor() {
    let tmp = TempDir::new().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let extractor = script_with(FakeExecutor {
        output: None,
        failure: None,
        runs: runs.clone(),
    })
    .with_strategy(EmbeddingStrategy::TripleQuoted);

    let err = extractor
        .extract(&ExtractionTask::new(
            "<script>/\\d+/</script>",
            "https://example.com",
            tmp.path().join("out.html"),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "render");
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fallback_runs_after_execution_failure() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.html");
    let runs = Arc::new(AtomicUsize::new(0));
    let extractor = FallbackExtractor::new(
        Box::new(script_with(crashing_executor(runs.clone()))),
        Box::new(DirectExtractor::new(FakeEngine {
            title: "Fallback",
            summary: "<p>ok</p>",
        })),
    );

    let out = extractor
        .extract(&ExtractionTask::new("<p>x</p>", "https://example.com", path.clone()))
        .await
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(out.title, "Fallback");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "Fallback\n<p>ok</p>");
}

#[tokio::test]
async fn fallback_does_not_hide_persistence_failures() {
    let tmp = TempDir::new().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let extractor = FallbackExtractor::new(
        Box::new(script_with(FakeExecutor {
            output: None,
            failure: Some(disk_full),
            runs: runs.clone(),
        })),
        Box::new(DirectExtractor::new(FakeEngine {
            title: "Fallback",
            summary: "",
        })),
    );

    let err = extractor
        .extract(&ExtractionTask::new("", "", tmp.path().join("out.html")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "persistence");
    assert!(!tmp.path().join("out.html").exists());
}

#[tokio::test]
async fn fallback_reports_the_secondary_error_when_both_fail() {
    let tmp = TempDir::new().unwrap();
    let extractor = FallbackExtractor::new(
        Box::new(script_with(crashing_executor(Arc::new(AtomicUsize::new(0))))),
        Box::new(DirectExtractor::new(FailingEngine)),
    );

    let err = extractor
        .extract(&ExtractionTask::new("<p>x</p>", "u", tmp.path().join("out.html")))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("engine exploded"), "{err}");
}

#[tokio::test]
async fn interpreter_exit_codes_map_to_the_error_taxonomy() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let task = ExtractionTask::new("", "https://example.com", tmp.path().join("out.html"));
    let cases = [
        ("import sys\nsys.exit(3)\n", "extraction"),
        ("import sys\nsys.exit(4)\n", "persistence"),
        ("raise RuntimeError('boom')\n", "execution"),
    ];
    for (source, kind) in cases {
        let template = ScriptTemplate::from_source("exit", source).unwrap();
        let unit = template
            .render(&task, EmbeddingStrategy::Raw, StripMode::WrapperTags)
            .unwrap();
        let err = InterpreterExecutor::new(PYTHON)
            .execute(&unit)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "{source}: {err}");
    }

    let crashed = ScriptTemplate::from_source("crash", "raise RuntimeError('boom')\n")
        .unwrap()
        .render(&task, EmbeddingStrategy::Raw, StripMode::WrapperTags)
        .unwrap();
    match InterpreterExecutor::new(PYTHON).execute(&crashed).await {
        Err(LynksError::Execution { code, detail, .. }) => {
            assert_eq!(code, Some(1));
            assert!(detail.contains("boom"), "{detail}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn interpreter_environment_is_restricted() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("env.out");
    let template = ScriptTemplate::from_source(
        "env",
        "import os\nwith open({{{ output }}}, 'w') as f:\n    f.write('\\n' + ','.join(sorted(k for k in os.environ if k.startswith('LYNKS_LEAK'))))\n",
    )
    .unwrap();
    let unit = template
        .render(
            &ExtractionTask::new("", "", path.clone()),
            EmbeddingStrategy::Raw,
            StripMode::WrapperTags,
        )
        .unwrap();

    temp_env::async_with_vars([("LYNKS_LEAK_SECRET", Some("x"))], async {
        InterpreterExecutor::new(PYTHON)
            .execute(&unit)
            .await
            .unwrap();
    })
    .await;

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "\n");
}

#[tokio::test]
async fn runaway_units_time_out() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let unit = ScriptTemplate::from_source("sleep", "import time\ntime.sleep(30)\n")
        .unwrap()
        .render(
            &ExtractionTask::new("", "", tmp.path().join("out.html")),
            EmbeddingStrategy::Raw,
            StripMode::WrapperTags,
        )
        .unwrap();

    let err = InterpreterExecutor::new(PYTHON)
        .with_timeout(Duration::from_millis(300))
        .execute(&unit)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "execution");
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test]
#[serial]
async fn built_in_runner_handles_empty_content() {
    if !python_available() || !readability_available() {
        eprintln!("python3 with readability not found, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.html");
    let extractor = ScriptExtractor::new(
        ScriptTemplate::readability_runner().unwrap(),
        InterpreterExecutor::new(PYTHON),
    );

    let out = extractor
        .extract(&ExtractionTask::new("", "https://example.com", path.clone()))
        .await
        .unwrap();

    assert!(path.exists());
    assert!(!out.title.contains('\n'));
}

/// The built-in runner against the stub engine, so its own logic runs without the real package.
async fn run_stub_runner(content: &str, strip: StripMode) -> (TempDir, Result<NormalizedOutput>) {
    let tmp = TempDir::new().unwrap();
    let stub_dir = tmp.path().join("stub");
    std::fs::create_dir(&stub_dir).unwrap();
    let extractor = ScriptExtractor::new(
        ScriptTemplate::readability_runner().unwrap(),
        InterpreterExecutor::new(PYTHON).with_var("PYTHONPATH", install_stub_readability(&stub_dir)),
    )
    .with_strip(strip);

    let task = ExtractionTask::new(content, "https://example.com/post", tmp.path().join("out.html"));
    let result = extractor.extract(&task).await;
    (tmp, result)
}

#[tokio::test]
async fn runner_strips_exact_wrapper_tags() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let (tmp, result) =
        run_stub_runner("<html><body><p>hi</p></body></html>", StripMode::WrapperTags).await;

    let out = result.unwrap();
    assert_eq!(out.title, "Stub title");
    assert_eq!(out.body, "<p>hi</p>");
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("out.html")).unwrap(),
        "Stub title\n<p>hi</p>"
    );
}

#[tokio::test]
async fn runner_pass_through_keeps_the_summary() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let summary = "<html><body><p>hi</p></body></html>";
    let (_tmp, result) = run_stub_runner(summary, StripMode::PassThrough).await;

    assert_eq!(result.unwrap().body, summary);
}

#[tokio::test]
async fn runner_markup_mode_matches_the_rust_normalizer() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let summary = "<HTML><body class=\"x\"><p>hi</p></BODY></html>";
    let (_tmp, result) = run_stub_runner(summary, StripMode::Markup).await;

    assert_eq!(
        result.unwrap().body,
        lynks_extract::normalize::strip(summary.into(), StripMode::Markup)
    );
}

#[tokio::test]
async fn runner_reports_engine_failures_as_extraction_errors() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let (tmp, result) = run_stub_runner("<p>RAISE</p>", StripMode::WrapperTags).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), "extraction", "{err}");
    assert!(err.to_string().contains("stub engine refused"), "{err}");
    assert!(!tmp.path().join("out.html").exists());
}

#[tokio::test]
async fn runner_writes_an_empty_result_for_empty_content() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let (tmp, result) = run_stub_runner("", StripMode::WrapperTags).await;

    assert_eq!(result.unwrap(), NormalizedOutput::default());
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("out.html")).unwrap(),
        "\n"
    );
}

#[tokio::test]
#[serial]
async fn default_settings_carry_crlf_pages_through_the_runner() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let stub_path = install_stub_readability(tmp.path());
    let page = "<html>\r\n<body><p>hello</p></body>\r\n</html>\r\n";

    for mode in [ExtractorMode::Script, ExtractorMode::ScriptWithFallback] {
        let settings = ExtractionSettings {
            mode,
            ..ExtractionSettings::default()
        };
        let path = tmp.path().join(format!("{mode:?}.html"));
        let extractor = build_extractor(&settings).unwrap();

        let out = temp_env::async_with_vars([("PYTHONPATH", Some(stub_path.as_str()))], async {
            extractor
                .extract(&ExtractionTask::new(page, "https://example.com", path.clone()))
                .await
        })
        .await
        .unwrap();

        assert_eq!(out.title, "Stub title");
        assert_eq!(out.body, "\r\n<p>hello</p>\r\n\r\n");
    }
}
