//! Newline-delimited prefix feeds.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::prefix::Prefix;

/// Matches lines whose first non-whitespace character is `#`.
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#").expect("valid regex"));

/// How unparseable lines are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineMode {
    /// Skip and count them
    #[default]
    Relaxed,
    /// Fail on the first one
    Strict,
}

/// True for comment lines.
pub fn is_comment(line: &str) -> bool {
    COMMENT.is_match(line)
}

/// Parse one prefix per line, skipping blanks and comments.
///
/// Bare addresses become host routes.
pub fn parse_lines(bytes: &[u8], mode: LineMode) -> Result<Vec<Prefix>> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::parse("prefix list", e))?;

    let mut prefixes = Vec::new();
    let mut skipped = 0usize;
    for (n, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(line) {
            continue;
        }
        match trimmed.parse::<Prefix>() {
            Ok(prefix) => prefixes.push(prefix),
            Err(e) => match mode {
                LineMode::Strict => {
                    return Err(Error::parse("prefix list", format!("line {}: {}", n + 1, e)));
                }
                LineMode::Relaxed => skipped += 1,
            },
        }
    }

    if skipped > 0 {
        log::debug!("Skipped {} invalid line(s)", skipped);
    }
    Ok(prefixes)
}
