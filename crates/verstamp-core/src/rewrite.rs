//! In-place stamping of version markers.
//!
//! Two fixed grammars are recognised:
//!
//! | Target | Grammar (first match only) |
//! |---|---|
//! | Declaration file | `^__version__ = '<value>'` / `"<value>"` and `^__revision__ = ''` |
//! | Packaging descriptor | `version=<value>` keyword argument |
//!
//! Files are handled as raw bytes so that everything outside the matched
//! span survives untouched, including non-UTF-8 content and line endings.
//! The new content is written to a sibling temporary file and renamed over
//! the target, so a failure leaves either the original or the stamped file,
//! never a truncated one.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::Regex;
use tracing::{debug, info};

use crate::error::{Result, StampError};

/// Human-readable form of the version declaration grammar.
pub const VERSION_PATTERN: &str = "__version__ = '<value>'";

/// Human-readable form of the descriptor keyword grammar.
pub const DESCRIPTOR_PATTERN: &str = "version=<value>";

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^__version__[ \t]*=[ \t]*(?:'([^'\r\n]*)'|"([^"\r\n]*)")"#)
        .expect("version declaration regex is valid")
});

static EMPTY_REVISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^__revision__[ \t]*=[ \t]*(?:''|"")"#)
        .expect("revision declaration regex is valid")
});

static DESCRIPTOR_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bversion[ \t]*=[ \t]*").expect("descriptor keyword regex is valid")
});

// Anchored at the start of the value. A parenthesised value must close on
// the same line and may not nest. Arguments inside strings or comments are
// filtered out separately.
static DESCRIPTOR_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:\([^()\r\n]*\)|'[^'\r\n]*'|"[^"\r\n]*"|[\w.]+(?:\([^()\r\n]*\))?)"#,
    )
    .expect("descriptor value regex is valid")
});

/// What a declaration rewrite changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Value the `__version__` declaration held before stamping.
    pub previous_version: String,
    /// Revision stamped into an empty `__revision__` slot, if there was one.
    pub revision: Option<String>,
    /// Whether the file was actually rewritten (false when already stamped
    /// with the same values).
    pub written: bool,
}

/// Read the value of the first `__version__` declaration in `path`.
///
/// # Errors
///
/// [`StampError::Io`] if the file cannot be read and
/// [`StampError::NoDeclarationFound`] if it has no declaration.
pub fn read_declared_version(path: &Path) -> Result<String> {
    let content = fs::read(path).map_err(|e| StampError::io(path, e))?;
    let caps = VERSION_RE
        .captures(&content)
        .ok_or_else(|| StampError::NoDeclarationFound {
            path: path.to_path_buf(),
            pattern: VERSION_PATTERN,
        })?;
    let value = caps.get(1).or_else(|| caps.get(2)).map_or(&[][..], |m| m.as_bytes());
    Ok(String::from_utf8_lossy(value).into_owned())
}

/// Stamp `version` into the first `__version__` declaration of `path`, and
/// the result of `revision` into the first empty `__revision__` slot.
///
/// `revision` runs only when an empty slot exists, so files that were
/// already stamped (or never had a slot) cost no repository query.
///
/// # Errors
///
/// [`StampError::NoDeclarationFound`] when there is no `__version__`
/// declaration (the file is left as it was), [`StampError::Io`] on read or
/// write failure, or whatever `revision` returns.
pub fn rewrite_declaration(
    path: &Path,
    version: &str,
    revision: impl FnOnce() -> Result<String>,
) -> Result<RewriteOutcome> {
    let original = fs::read(path).map_err(|e| StampError::io(path, e))?;

    let caps = VERSION_RE
        .captures(&original)
        .ok_or_else(|| StampError::NoDeclarationFound {
            path: path.to_path_buf(),
            pattern: VERSION_PATTERN,
        })?;
    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let previous_version = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        .unwrap_or_default();

    let mut content = splice(&original, whole, format!("__version__ = '{version}'").as_bytes());

    let mut stamped_revision = None;
    if let Some(slot) = EMPTY_REVISION_RE.find(&content).map(|m| m.range()) {
        let rev = revision()?;
        debug!(path = %path.display(), revision = %rev, "Stamping revision slot");
        content = splice(&content, slot, format!("__revision__ = '{rev}'").as_bytes());
        stamped_revision = Some(rev);
    }

    let written = content != original;
    if written {
        write_atomic(path, &content)?;
        info!(path = %path.display(), %version, "Stamped version declaration");
    } else {
        debug!(path = %path.display(), "Declaration already up to date");
    }

    Ok(RewriteOutcome {
        previous_version,
        revision: stamped_revision,
        written,
    })
}

/// Replace the value of the first `version=` keyword argument in a
/// packaging descriptor with the quoted literal `version`.
///
/// Returns whether the file changed.
///
/// # Errors
///
/// [`StampError::NoDeclarationFound`] when no `version=` argument exists,
/// [`StampError::UnsupportedDescriptor`] when its value cannot be delimited
/// on a single line (a nested call, or parentheses spanning lines), and
/// [`StampError::Io`] on read or write failure.
pub fn rewrite_descriptor_argument(path: &Path, version: &str) -> Result<bool> {
    let original = fs::read(path).map_err(|e| StampError::io(path, e))?;

    let keyword = DESCRIPTOR_KEYWORD_RE
        .find_iter(&original)
        .find(|m| is_keyword_argument(&original, m.start(), m.end()))
        .ok_or_else(|| StampError::NoDeclarationFound {
            path: path.to_path_buf(),
            pattern: DESCRIPTOR_PATTERN,
        })?;

    let unsupported = || StampError::UnsupportedDescriptor {
        path: path.to_path_buf(),
        line: line_of(&original, keyword.start()),
    };
    let value_start = keyword.end();
    let value = DESCRIPTOR_VALUE_RE
        .find(&original[value_start..])
        .ok_or_else(unsupported)?;

    let span = value_start..value_start + value.end();
    // The value must end the argument; anything else means the pattern only
    // matched a prefix of a nested or multi-line expression.
    let next = original[span.end..]
        .iter()
        .find(|&&b| b != b' ' && b != b'\t');
    if !matches!(next, None | Some(b',' | b')' | b'\n' | b'\r' | b'#')) {
        return Err(unsupported());
    }

    let content = splice(&original, span, format!("'{version}'").as_bytes());

    if content == original {
        debug!(path = %path.display(), "Descriptor already up to date");
        return Ok(false);
    }

    write_atomic(path, &content)?;
    info!(path = %path.display(), %version, "Stamped packaging descriptor");
    Ok(true)
}

/// Replace `path` with `content` via a temporary file in the same directory.
///
/// Permissions of an existing target are carried over.
///
/// # Errors
///
/// [`StampError::Io`] if the temporary file cannot be created, written or
/// renamed into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".verstamp-")
        .tempfile_in(dir)
        .map_err(|e| StampError::io(dir, e))?;

    tmp.write_all(content)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StampError::io(tmp.path(), e))?;

    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| StampError::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| StampError::io(path, e.error))?;
    Ok(())
}

/// A `version=` match is a keyword argument only when it follows `(` or `,`,
/// is not the start of `==`, and sits in code rather than a string or comment.
fn is_keyword_argument(content: &[u8], start: usize, end: usize) -> bool {
    if content.get(end) == Some(&b'=') {
        return false;
    }
    let opens_argument = matches!(
        content[..start].iter().rev().find(|b| !b.is_ascii_whitespace()),
        Some(b'(' | b',')
    );
    let line_start = content[..start]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    opens_argument && ends_in_code(&content[line_start..start])
}

/// Whether the end of `line` is outside any quoted string or `#` comment.
fn ends_in_code(line: &[u8]) -> bool {
    let mut quote = None;
    for &b in line {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'#' => return false,
            None => {}
        }
    }
    quote.is_none()
}

fn splice(content: &[u8], range: std::ops::Range<usize>, replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + replacement.len());
    out.extend_from_slice(&content[..range.start]);
    out.extend_from_slice(replacement);
    out.extend_from_slice(&content[range.end..]);
    out
}

fn line_of(content: &[u8], offset: usize) -> usize {
    content[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}
