//! Python string literals for generated runner scripts.
//!
//! Every function here returns source text that the interpreter parses back into
//! exactly the input value, or refuses with a reason. Block literals
//! (`"""…"""`, `r"""…"""`) keep the value verbatim and therefore cannot hold
//! everything; [`escaped`] can.
use lynks_config::EmbeddingStrategy;
use std::fmt::Write;

const BLOCK_DELIMITER: &str = "\"\"\"";

/// Why a value cannot be embedded with a given strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralError {
    /// The interpreter would end the literal before (or after) the value ends.
    Unterminated,
    /// Source newline translation would turn `\r` into `\n`.
    CarriageReturn,
    /// Interpreter source may not contain NUL.
    NulByte,
    /// A plain block literal would interpret the backslash as an escape.
    Backslash,
}

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            LiteralError::Unterminated => {
                "value contains a closing delimiter sequence or ends in an escaping quote/backslash"
            }
            LiteralError::CarriageReturn => "value contains a carriage return",
            LiteralError::NulByte => "value contains a NUL character",
            LiteralError::Backslash => "value contains a backslash",
        };
        f.write_str(msg)
    }
}

/// Embed `value` using the selected strategy.
pub fn embed(value: &str, strategy: EmbeddingStrategy) -> Result<String, LiteralError> {
    match strategy {
        EmbeddingStrategy::TripleQuoted => triple_quoted(value),
        EmbeddingStrategy::Raw => raw_triple_quoted(value),
        EmbeddingStrategy::Escaped => Ok(escaped(value)),
    }
}

/// `"""value"""`, valid only for values without backslashes.
pub fn triple_quoted(value: &str) -> Result<String, LiteralError> {
    if value.contains('\\') {
        return Err(LiteralError::Backslash);
    }
    check_block(value)?;
    Ok(format!("{BLOCK_DELIMITER}{value}{BLOCK_DELIMITER}"))
}

/// `r"""value"""`; backslashes keep their literal meaning.
pub fn raw_triple_quoted(value: &str) -> Result<String, LiteralError> {
    check_block(value)?;
    Ok(format!("r{BLOCK_DELIMITER}{value}{BLOCK_DELIMITER}"))
}

/// A double-quoted literal with every special character escaped. Always round-trips.
///
/// ```
/// use lynks_extract::literal::escaped;
///
/// assert_eq!(escaped("C:\\temp\\\"out\".html"), r#""C:\\temp\\\"out\".html""#);
/// assert_eq!(escaped("a\nb"), r#""a\nb""#);
/// ```
pub fn escaped(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn check_block(value: &str) -> Result<(), LiteralError> {
    if value.contains('\0') {
        return Err(LiteralError::NulByte);
    }
    if value.contains('\r') {
        return Err(LiteralError::CarriageReturn);
    }
    if !closes_at_end(value) {
        return Err(LiteralError::Unterminated);
    }
    Ok(())
}

/// Scan `value` followed by the closing delimiter the way the tokenizer does:
/// a backslash always consumes the next character, and the first bare `"""`
/// ends the literal. The literal is faithful only if that happens exactly at
/// the end of `value`.
fn closes_at_end(value: &str) -> bool {
    let mut source = String::with_capacity(value.len() + BLOCK_DELIMITER.len());
    source.push_str(value);
    source.push_str(BLOCK_DELIMITER);
    let bytes = source.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(BLOCK_DELIMITER.as_bytes()) {
            return i == value.len();
        }
        i += 1;
    }
    false
}
