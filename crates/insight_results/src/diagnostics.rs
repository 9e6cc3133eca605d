use std::fmt;
use std::sync::LazyLock;

use insight_core::LintIssue;
use insight_logging::insight_trace;
use regex::Regex;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)line\s+(\d+)(?::(\d+))?.*?:\s*(.+)").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Keyword heuristic: `error` beats `warning`; anything else is `info`.
    pub fn infer(line: &str) -> Self {
        let lower = line.to_lowercase();
        if lower.contains("error") {
            Severity::Error
        } else if lower.contains("warning") {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "error" | "fatal" => Severity::Error,
            "warning" | "warn" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    /// 1-based line in the reviewed document.
    pub line: u32,
    pub column: Option<u32>,
    pub severity: Severity,
    pub message: String,
    pub rule: Option<String>,
}

/// Turns result text into diagnostics. Line numbers are not yet checked
/// against any document.
pub trait DiagnosticExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<DiagnosticRecord>;
}

/// Matches `line <N>[:<M>] ... : <message>` on every line of the text,
/// fenced snippets included.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinePatternExtractor;

impl DiagnosticExtractor for LinePatternExtractor {
    fn extract(&self, text: &str) -> Vec<DiagnosticRecord> {
        text.lines().filter_map(match_line).collect()
    }
}

fn match_line(text: &str) -> Option<DiagnosticRecord> {
    let captures = LINE_PATTERN.captures(text)?;
    let line = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let column = captures
        .get(2)
        .and_then(|column| column.as_str().parse::<u32>().ok());
    let message = captures.get(3)?.as_str().trim();
    if message.is_empty() {
        return None;
    }

    Some(DiagnosticRecord {
        line,
        column,
        severity: Severity::infer(text),
        message: message.to_string(),
        rule: None,
    })
}

/// Drops records whose line does not exist in a document of `line_count` lines.
pub fn clamp_to_document(records: Vec<DiagnosticRecord>, line_count: usize) -> Vec<DiagnosticRecord> {
    records
        .into_iter()
        .filter(|record| {
            let in_range = record.line >= 1 && (record.line as usize) <= line_count;
            if !in_range {
                insight_trace!(
                    "Dropping diagnostic for line {} (document has {} lines)",
                    record.line,
                    line_count
                );
            }
            in_range
        })
        .collect()
}

/// Extracts diagnostics with the default extractor and keeps only those that
/// address a line of the current document.
pub fn extract(text: &str, document_line_count: usize) -> Vec<DiagnosticRecord> {
    clamp_to_document(LinePatternExtractor.extract(text), document_line_count)
}

/// Converts linter issues reported alongside a result. Issues without a line
/// are skipped.
pub fn from_lint_issues(issues: &[LintIssue]) -> Vec<DiagnosticRecord> {
    issues
        .iter()
        .filter_map(|issue| {
            let line = issue.line?;
            Some(DiagnosticRecord {
                line,
                column: issue.column,
                severity: issue
                    .severity
                    .as_deref()
                    .map(Severity::from_label)
                    .unwrap_or(Severity::Info),
                message: issue.message.trim().to_string(),
                rule: issue.rule.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_is_captured_when_present() {
        let record = match_line("Line 7:12: warning: shadowed binding").unwrap();
        assert_eq!(record.line, 7);
        assert_eq!(record.column, Some(12));
        assert_eq!(record.severity, Severity::Warning);
        assert_eq!(record.message, "warning: shadowed binding");
    }

    #[test]
    fn error_keyword_wins_over_warning() {
        assert_eq!(Severity::infer("warning: this is an ERROR"), Severity::Error);
    }

    #[test]
    fn lines_without_pattern_do_not_match() {
        assert!(match_line("No issues found.").is_none());
        assert!(match_line("line 4 has no colon").is_none());
    }
}
