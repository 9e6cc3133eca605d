use std::sync::LazyLock;

use regex::Regex;

use crate::DiagnosticRecord;

const MAX_TITLE_CHARS: usize = 50;

static FIX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)replace with:?\s*[`']([^`']+)[`']",
        r"(?i)use:?\s*[`']([^`']+)[`']",
        r"(?i)change to:?\s*[`']([^`']+)[`']",
        r"(?i)should be:?\s*[`']([^`']+)[`']",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

/// A replacement an editor can offer for a diagnostic's line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickFix {
    pub title: String,
    pub line: u32,
    pub replacement: String,
}

/// Pulls a quoted replacement out of phrases such as ``replace with `x` ``.
pub fn suggest_fix(message: &str) -> Option<String> {
    FIX_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(message))
        .and_then(|captures| captures.get(1))
        .map(|snippet| snippet.as_str().to_string())
}

pub fn quick_fixes(records: &[DiagnosticRecord]) -> Vec<QuickFix> {
    records
        .iter()
        .filter_map(|record| {
            let replacement = suggest_fix(&record.message)?;
            Some(QuickFix {
                title: format!("Fix: {}", shorten(&record.message)),
                line: record.line,
                replacement,
            })
        })
        .collect()
}

fn shorten(message: &str) -> String {
    if message.chars().count() <= MAX_TITLE_CHARS {
        return message.to_string();
    }
    let mut short: String = message.chars().take(MAX_TITLE_CHARS - 3).collect();
    short.push_str("...");
    short
}
