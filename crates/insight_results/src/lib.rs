//! Turning a job's result text into diagnostics and rendered blocks.
mod diagnostics;
mod parse;
mod quick_fix;
mod render;
mod report;

use insight_core::Job;

pub use diagnostics::{
    clamp_to_document, from_lint_issues, DiagnosticExtractor, DiagnosticRecord,
    LinePatternExtractor, Severity,
};
pub use parse::{parse, BlockParser, CodeLine, LineKind, RenderBlock};
pub use quick_fix::{quick_fixes, suggest_fix, QuickFix};
pub use render::{
    clean_emphasis, render, to_html, to_terminal, CopyAffordance, LineStyle, PresentedBlock,
    PresentedLine, Presentation,
};
pub use report::{ensure_report_dir, report_filename, AtomicFileWriter, PersistError};

/// Diagnostics found in `result_text` that address a line of a document with
/// `document_line_count` lines.
pub fn get_diagnostics(result_text: &str, document_line_count: usize) -> Vec<DiagnosticRecord> {
    diagnostics::extract(result_text, document_line_count)
}

pub fn get_render_blocks(result_text: &str) -> Vec<RenderBlock> {
    parse(result_text).collect()
}

/// Linter issues followed by text-extracted diagnostics, ordered by line.
/// An extracted record repeating a linter issue's line and message is dropped.
pub fn diagnostics_for_job(job: &Job, document_line_count: usize) -> Vec<DiagnosticRecord> {
    let mut records = clamp_to_document(from_lint_issues(job.lint_issues()), document_line_count);
    if let Some(text) = job.result_text() {
        for record in get_diagnostics(text, document_line_count) {
            let duplicate = records
                .iter()
                .any(|seen| seen.line == record.line && seen.message == record.message);
            if !duplicate {
                records.push(record);
            }
        }
    }
    records.sort_by_key(|record| record.line);
    records
}
