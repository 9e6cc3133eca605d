//! Block parser for the service's markdown/diff-shaped result text.
//!
//! Single left-to-right pass over lines. Fenced blocks are delimited by
//! paired ```` ``` ```` lines; an unterminated fence is flushed with whatever
//! was collected. Inside a fence, `- ` / `+ ` (or a tab separator) mark
//! removed / added lines. The parser never fails.

use std::str::Lines;

const FENCE: &str = "```";
const MAX_HEADING_LEVEL: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Added,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLine {
    pub kind: LineKind,
    /// Display text with the diff marker and its separator stripped.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderBlock {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph(String),
    ListItem(String),
    Quote(String),
    CodeBlock {
        language: Option<String>,
        lines: Vec<CodeLine>,
        /// The fence body exactly as received, for copying.
        source: String,
    },
}

/// Lazy iterator over the blocks of a result text.
#[derive(Debug, Clone)]
pub struct BlockParser<'a> {
    lines: Lines<'a>,
}

pub fn parse(text: &str) -> BlockParser<'_> {
    BlockParser {
        lines: text.lines(),
    }
}

impl Iterator for BlockParser<'_> {
    type Item = RenderBlock;

    fn next(&mut self) -> Option<RenderBlock> {
        loop {
            let line = self.lines.next()?;
            if let Some(info) = line.strip_prefix(FENCE) {
                return Some(self.read_fence(info));
            }
            if let Some(block) = classify_prose(line) {
                return Some(block);
            }
        }
    }
}

impl BlockParser<'_> {
    fn read_fence(&mut self, info: &str) -> RenderBlock {
        let language = Some(info.trim())
            .filter(|lang| !lang.is_empty())
            .map(str::to_string);
        let mut raw = Vec::new();
        for line in self.lines.by_ref() {
            if line.starts_with(FENCE) {
                break;
            }
            raw.push(line);
        }

        RenderBlock::CodeBlock {
            language,
            lines: raw.iter().map(|line| classify_code_line(line)).collect(),
            source: raw.join("\n"),
        }
    }
}

fn classify_prose(line: &str) -> Option<RenderBlock> {
    if line.trim().is_empty() {
        return None;
    }

    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if (1..=MAX_HEADING_LEVEL).contains(&hashes) {
        if let Some(text) = line[hashes..].strip_prefix(' ') {
            return Some(RenderBlock::Heading {
                level: hashes as u8,
                text: text.to_string(),
            });
        }
    }

    let mut chars = line.chars();
    if let (Some('-' | '*' | '+'), Some(sep)) = (chars.next(), chars.next()) {
        if sep.is_whitespace() {
            return Some(RenderBlock::ListItem(chars.as_str().to_string()));
        }
    }

    if let Some(text) = line.strip_prefix("> ") {
        return Some(RenderBlock::Quote(text.to_string()));
    }

    Some(RenderBlock::Paragraph(line.to_string()))
}

fn classify_code_line(line: &str) -> CodeLine {
    let (kind, text) = if let Some(rest) = strip_marker(line, '-') {
        (LineKind::Removed, rest)
    } else if let Some(rest) = strip_marker(line, '+') {
        (LineKind::Added, rest)
    } else {
        (LineKind::Unchanged, line)
    };
    CodeLine {
        kind,
        text: text.to_string(),
    }
}

/// Strips `marker` plus exactly one space or tab.
fn strip_marker(line: &str, marker: char) -> Option<&str> {
    line.strip_prefix(marker)
        .and_then(|rest| rest.strip_prefix(' ').or_else(|| rest.strip_prefix('\t')))
}
