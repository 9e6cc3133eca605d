use insight_results::{get_render_blocks, parse, CodeLine, LineKind, RenderBlock};
use pretty_assertions::assert_eq;

fn code_line(kind: LineKind, text: &str) -> CodeLine {
    CodeLine {
        kind,
        text: text.to_string(),
    }
}

#[test]
fn fenced_diff_lines_are_classified_and_stripped() {
    let text = "```python\n- old_call()\n+ new_call()\nunchanged_line\n```";
    let blocks = get_render_blocks(text);
    assert_eq!(
        blocks,
        vec![RenderBlock::CodeBlock {
            language: Some("python".to_string()),
            lines: vec![
                code_line(LineKind::Removed, "old_call()"),
                code_line(LineKind::Added, "new_call()"),
                code_line(LineKind::Unchanged, "unchanged_line"),
            ],
            source: "- old_call()\n+ new_call()\nunchanged_line".to_string(),
        }]
    );
}

#[test]
fn prose_prefixes_map_to_block_kinds() {
    let text = "# Summary\n\n## Details\n- first\n* second\n+ third\n> quoted\nplain words\n\n   \n";
    assert_eq!(
        get_render_blocks(text),
        vec![
            RenderBlock::Heading {
                level: 1,
                text: "Summary".to_string()
            },
            RenderBlock::Heading {
                level: 2,
                text: "Details".to_string()
            },
            RenderBlock::ListItem("first".to_string()),
            RenderBlock::ListItem("second".to_string()),
            RenderBlock::ListItem("third".to_string()),
            RenderBlock::Quote("quoted".to_string()),
            RenderBlock::Paragraph("plain words".to_string()),
        ]
    );
}

#[test]
fn unterminated_fence_is_flushed() {
    let blocks = get_render_blocks("intro\n```\nlet a = 1;\n+ let b = 2;");
    assert_eq!(
        blocks,
        vec![
            RenderBlock::Paragraph("intro".to_string()),
            RenderBlock::CodeBlock {
                language: None,
                lines: vec![
                    code_line(LineKind::Unchanged, "let a = 1;"),
                    code_line(LineKind::Added, "let b = 2;"),
                ],
                source: "let a = 1;\n+ let b = 2;".to_string(),
            },
        ]
    );
}

#[test]
fn empty_fence_and_empty_input() {
    assert!(get_render_blocks("").is_empty());
    assert_eq!(
        get_render_blocks("```\n```"),
        vec![RenderBlock::CodeBlock {
            language: None,
            lines: Vec::new(),
            source: String::new(),
        }]
    );
}

#[test]
fn blank_lines_inside_fence_are_kept() {
    let blocks = get_render_blocks("```rust\nfn a() {}\n\nfn b() {}\n```");
    let RenderBlock::CodeBlock { lines, .. } = &blocks[0] else {
        panic!("expected code block, got {blocks:?}");
    };
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], code_line(LineKind::Unchanged, ""));
}

#[test]
fn parsing_is_idempotent_and_restartable() {
    let text = "# Review\n```js\n- var x = 1;\n+ const x = 1;\n```\nLine 2: prefer const";
    let first: Vec<RenderBlock> = parse(text).collect();

    let mut partial = parse(text);
    let _ = partial.next();
    drop(partial);

    let second: Vec<RenderBlock> = parse(text).collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn crlf_input_parses_like_lf() {
    let lf = get_render_blocks("# T\n```\n- a\n```\n");
    let crlf = get_render_blocks("# T\r\n```\r\n- a\r\n```\r\n");
    assert_eq!(lf, crlf);
}
