//! Presentation model for parsed result text, plus HTML and terminal output.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::parse::{LineKind, RenderBlock};

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    Highlight,
    Strikethrough,
}

impl From<LineKind> for LineStyle {
    fn from(kind: LineKind) -> Self {
        match kind {
            LineKind::Added => LineStyle::Highlight,
            LineKind::Removed => LineStyle::Strikethrough,
            LineKind::Unchanged => LineStyle::Plain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedLine {
    /// 1-based position inside the code block.
    pub number: usize,
    pub kind: LineKind,
    pub style: LineStyle,
    pub text: String,
}

/// Copy-to-clipboard payload. Always the fence body as received, markers
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyAffordance {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedBlock {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph(String),
    ListItem(String),
    Quote(String),
    Code {
        language: Option<String>,
        lines: Vec<PresentedLine>,
        copy: CopyAffordance,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presentation {
    pub blocks: Vec<PresentedBlock>,
}

impl Presentation {
    pub fn code_blocks(&self) -> impl Iterator<Item = &PresentedBlock> {
        self.blocks
            .iter()
            .filter(|block| matches!(block, PresentedBlock::Code { .. }))
    }
}

pub fn render(blocks: &[RenderBlock]) -> Presentation {
    Presentation {
        blocks: blocks.iter().map(present_block).collect(),
    }
}

fn present_block(block: &RenderBlock) -> PresentedBlock {
    match block {
        RenderBlock::Heading { level, text } => PresentedBlock::Heading {
            level: *level,
            text: clean_emphasis(text),
        },
        RenderBlock::Paragraph(text) => PresentedBlock::Paragraph(clean_emphasis(text)),
        RenderBlock::ListItem(text) => PresentedBlock::ListItem(clean_emphasis(text)),
        RenderBlock::Quote(text) => PresentedBlock::Quote(clean_emphasis(text)),
        RenderBlock::CodeBlock {
            language,
            lines,
            source,
        } => PresentedBlock::Code {
            language: language.clone(),
            lines: lines
                .iter()
                .enumerate()
                .map(|(idx, line)| PresentedLine {
                    number: idx + 1,
                    kind: line.kind,
                    style: line.kind.into(),
                    text: line.text.clone(),
                })
                .collect(),
            copy: CopyAffordance {
                text: source.clone(),
            },
        },
    }
}

/// Removes `**bold**` and `*italic*` markers, keeping the enclosed text.
pub fn clean_emphasis(text: &str) -> String {
    let without_bold = BOLD.replace_all(text, "$1");
    ITALIC.replace_all(&without_bold, "$1").into_owned()
}

pub fn to_html(presentation: &Presentation) -> String {
    let mut out = String::from("<div class=\"results\">\n");
    for block in &presentation.blocks {
        match block {
            PresentedBlock::Heading { level, text } => {
                let _ = writeln!(out, "<h{level}>{}</h{level}>", escape_html(text));
            }
            PresentedBlock::Paragraph(text) => {
                let _ = writeln!(out, "<p>{}</p>", escape_html(text));
            }
            PresentedBlock::ListItem(text) => {
                let _ = writeln!(out, "<li>{}</li>", escape_html(text));
            }
            PresentedBlock::Quote(text) => {
                let _ = writeln!(out, "<blockquote>{}</blockquote>", escape_html(text));
            }
            PresentedBlock::Code {
                language,
                lines,
                copy,
            } => write_code_html(&mut out, language.as_deref(), lines, copy),
        }
    }
    out.push_str("</div>\n");
    out
}

fn write_code_html(
    out: &mut String,
    language: Option<&str>,
    lines: &[PresentedLine],
    copy: &CopyAffordance,
) {
    let language = language.unwrap_or("text");
    let _ = writeln!(
        out,
        "<div class=\"code-block\" data-language=\"{}\">",
        escape_html(language)
    );
    let _ = writeln!(
        out,
        "<button class=\"copy-button\" data-code=\"{}\">Copy</button>",
        escape_html(&copy.text)
    );
    out.push_str("<pre><code>");
    for line in lines {
        let class = match line.kind {
            LineKind::Removed => "line-removed",
            LineKind::Added => "line-added",
            LineKind::Unchanged => "line-unchanged",
        };
        let _ = write!(
            out,
            "<div class=\"{class}\"><span class=\"line-number\">{}</span>{}</div>",
            line.number,
            escape_html(&line.text)
        );
    }
    out.push_str("</code></pre>\n</div>\n");
}

/// Plain-text rendering with a `+`/`-` gutter for code lines.
pub fn to_terminal(presentation: &Presentation) -> String {
    let mut out = String::new();
    for block in &presentation.blocks {
        match block {
            PresentedBlock::Heading { level, text } => {
                let _ = writeln!(out, "{} {text}", "#".repeat(usize::from(*level)));
            }
            PresentedBlock::Paragraph(text) => {
                let _ = writeln!(out, "{text}");
            }
            PresentedBlock::ListItem(text) => {
                let _ = writeln!(out, "  * {text}");
            }
            PresentedBlock::Quote(text) => {
                let _ = writeln!(out, "  | {text}");
            }
            PresentedBlock::Code {
                language, lines, ..
            } => {
                let _ = writeln!(out, "--- {}", language.as_deref().unwrap_or("code"));
                let width = lines.len().to_string().len();
                for line in lines {
                    let gutter = match line.kind {
                        LineKind::Added => '+',
                        LineKind::Removed => '-',
                        LineKind::Unchanged => ' ',
                    };
                    let _ = writeln!(out, "{:>width$} {gutter} {}", line.number, line.text);
                }
                out.push_str("---\n");
            }
        }
    }
    out
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            '\n' => escaped.push_str("&#10;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
