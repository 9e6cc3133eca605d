use insight_core::{JobId, JobKind, JobStatus};
use serde::{Deserialize, Serialize};

const SUPPORTED_LANGUAGES: &[&str] = &[
    "javascript", "typescript", "python", "java", "go", "rust", "cpp", "c", "csharp", "php",
    "ruby", "swift", "kotlin", "scala", "html", "css", "json", "yaml", "sql",
];

/// Lines on each side of the cursor sent as review context.
pub const CURSOR_CONTEXT_RADIUS: usize = 10;

/// Body of `POST /jobs/enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    pub user_id: String,
    pub job_type: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
}

impl JobRequest {
    pub fn review(
        user_id: impl Into<String>,
        file_path: impl Into<String>,
        file_content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            job_type: JobKind::Review,
            file_path: Some(file_path.into()),
            file_content: Some(file_content.into()),
            language: Some(language.into()),
            cursor_context: None,
            error_log: None,
            repo_id: None,
        }
    }

    pub fn debug(
        user_id: impl Into<String>,
        file_path: impl Into<String>,
        file_content: impl Into<String>,
        error_log: impl Into<String>,
    ) -> Self {
        Self {
            job_type: JobKind::Debug,
            error_log: Some(error_log.into()),
            language: None,
            ..Self::review(user_id, file_path, file_content, "")
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_cursor_context(mut self, context: impl Into<String>) -> Self {
        self.cursor_context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

pub fn is_supported_language(language: &str) -> bool {
    SUPPORTED_LANGUAGES
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(language))
}

/// Best-effort language id from a file extension.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let language = match extension.as_str() {
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "java" => "java",
        "go" => "go",
        "rs" => "rust",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "c" | "h" => "c",
        "cs" => "csharp",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "html" | "htm" => "html",
        "css" => "css",
        "json" => "json",
        "yml" | "yaml" => "yaml",
        "sql" => "sql",
        _ => return None,
    };
    Some(language)
}

/// The lines within [`CURSOR_CONTEXT_RADIUS`] of `cursor_line` (0-based),
/// clamped to the document.
pub fn cursor_context(document: &str, cursor_line: usize) -> String {
    let lines: Vec<&str> = document.lines().collect();
    if lines.is_empty() {
        return String::new();
    }
    let last = lines.len() - 1;
    let cursor = cursor_line.min(last);
    let start = cursor.saturating_sub(CURSOR_CONTEXT_RADIUS);
    let end = (cursor + CURSOR_CONTEXT_RADIUS).min(last);
    lines[start..=end].join("\n")
}
