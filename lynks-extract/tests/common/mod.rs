#![allow(dead_code)]

use std::process::Command;

/// Interpreter used by the tests that run generated units.
pub const PYTHON: &str = "python3";

/// True when `python3` can be started. Tests that need it return early otherwise.
pub fn python_available() -> bool {
    Command::new(PYTHON)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// True when the interpreter can also import the readability package.
pub fn readability_available() -> bool {
    Command::new(PYTHON)
        .args(["-c", "import readability"])
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Decode the literal forms produced by `lynks_extract::literal` the way the
/// interpreter would. Returns `None` for anything else.
pub fn decode_literal(src: &str) -> Option<String> {
    if let Some(body) = src
        .strip_prefix("r\"\"\"")
        .and_then(|rest| rest.strip_suffix("\"\"\""))
    {
        return Some(body.to_string());
    }
    if let Some(body) = src
        .strip_prefix("\"\"\"")
        .and_then(|rest| rest.strip_suffix("\"\"\""))
    {
        return (!body.contains('\\')).then(|| body.to_string());
    }
    let body = src.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Stand-in for the `readability` package: the summary is the input itself,
/// blank input raises like the real engine, and input containing `RAISE` fails.
pub const STUB_READABILITY: &str = r#"class Document:
    def __init__(self, content, url=None):
        if not content.strip():
            raise ValueError("Document is empty")
        if "RAISE" in content:
            raise ValueError("stub engine refused the document")
        self._content = content

    def short_title(self):
        return "Stub\r\ntitle"

    def summary(self):
        return self._content
"#;

/// Write the stub package into `dir`, which then goes on `PYTHONPATH`.
pub fn install_stub_readability(dir: &std::path::Path) -> String {
    std::fs::write(dir.join("readability.py"), STUB_READABILITY).unwrap();
    dir.to_str().unwrap().to_string()
}
