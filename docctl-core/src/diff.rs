//! # diff: line redlines between two plaintext snapshots
//!
//! [`diff`] runs a Myers line diff (via `similar`) and renders the unified
//! hunks as styled paragraphs:
//!
//! | line kind | rendering                                     |
//! |-----------|-----------------------------------------------|
//! | hunk      | divider, then italic gray `@@ -a,b +c,d @@`   |
//! | added     | green paragraph prefixed `+ `                 |
//! | removed   | red strikethrough paragraph prefixed `- `     |
//! | context   | one gray paragraph per contiguous run         |
//!
//! [`DiffStats`] is computed from the raw edit script: a run of pure
//! inserts counts as added, pure deletes as removed, and a mixed run as
//! changed by the longer of its two sides.

use chrono::{DateTime, Utc};
use similar::{Algorithm, ChangeTag, DiffTag, TextDiff};

use crate::blocks::{split_long_spans, Annotations, Block, Color, Span, MAX_TEXT_LENGTH};
use crate::page::redline_title;

/// Lines of unchanged context kept around each hunk.
pub const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.changed == 0
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = [
            (self.added, "added"),
            (self.removed, "removed"),
            (self.changed, "changed"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, what)| format!("{n} lines {what}"))
        .collect();
        if parts.is_empty() {
            "No changes detected".to_string()
        } else {
            parts.join(", ")
        }
    }

    fn record_run(&mut self, old_len: usize, new_len: usize) {
        match (old_len, new_len) {
            (0, 0) => {}
            (0, n) => self.added += n,
            (o, 0) => self.removed += o,
            (o, n) => self.changed += o.max(n),
        }
    }
}

fn italic_gray() -> Annotations {
    Annotations {
        italic: true,
        color: Color::Gray,
        ..Default::default()
    }
}

fn styled_paragraph(content: String, annotations: Annotations) -> Block {
    Block::paragraph(split_long_spans(
        vec![Span::styled(content, annotations)],
        MAX_TEXT_LENGTH,
    ))
}

fn notice(content: &str) -> Block {
    Block::paragraph(vec![Span::styled(content, Annotations::italic())])
}

/// Counts line edits between `old` and `new`.
pub fn diff_stats(old: &str, new: &str) -> DiffStats {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(&old_lines, &new_lines);

    let mut stats = DiffStats::default();
    let (mut old_run, mut new_run) = (0usize, 0usize);
    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            stats.record_run(old_run, new_run);
            (old_run, new_run) = (0, 0);
        } else {
            old_run += old_range.len();
            new_run += new_range.len();
        }
    }
    stats.record_run(old_run, new_run);
    stats
}

/// Renders the line diff of two snapshots as redline blocks.
pub fn diff(old: &str, new: &str) -> (Vec<Block>, DiffStats) {
    let stats = diff_stats(old, new);
    if old.is_empty() {
        return (
            vec![notice(
                "Initial version \u{2014} no previous content to compare.",
            )],
            stats,
        );
    }

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(&old_lines, &new_lines);
    let mut unified = text_diff.unified_diff();
    unified.context_radius(CONTEXT_LINES);

    let mut blocks = Vec::new();
    let mut context = String::new();
    let flush = |context: &mut String, blocks: &mut Vec<Block>| {
        if !context.is_empty() {
            let run = std::mem::take(context);
            blocks.push(styled_paragraph(run, Annotations::colored(Color::Gray)));
        }
    };

    for hunk in unified.iter_hunks() {
        flush(&mut context, &mut blocks);
        blocks.push(Block::Divider);
        blocks.push(styled_paragraph(hunk.header().to_string(), italic_gray()));
        for change in hunk.iter_changes() {
            let line = change.value();
            match change.tag() {
                ChangeTag::Equal => {
                    context.push_str(line);
                    context.push('\n');
                }
                ChangeTag::Insert => {
                    flush(&mut context, &mut blocks);
                    blocks.push(styled_paragraph(
                        format!("+ {line}"),
                        Annotations::colored(Color::Green),
                    ));
                }
                ChangeTag::Delete => {
                    flush(&mut context, &mut blocks);
                    blocks.push(styled_paragraph(
                        format!("- {line}"),
                        Annotations {
                            strikethrough: true,
                            color: Color::Red,
                            ..Default::default()
                        },
                    ));
                }
            }
        }
    }
    flush(&mut context, &mut blocks);

    if blocks.is_empty() {
        blocks.push(notice("No differences detected."));
    }
    (blocks, stats)
}

/// Everything a redline page shows besides the diff itself.
#[derive(Debug, Clone)]
pub struct RedlineInput<'a> {
    pub uid: &'a str,
    pub prev_revision: &'a str,
    pub next_revision: &'a str,
    pub old_text: &'a str,
    pub new_text: &'a str,
    pub commit: &'a str,
    pub pr_url: Option<&'a str>,
    pub generated_at: DateTime<Utc>,
}

/// Full content of a redline child page: title, change summary, metadata
/// line, divider, then the diff.
pub fn build_redline_blocks(input: &RedlineInput<'_>) -> (Vec<Block>, DiffStats) {
    let (diff_blocks, stats) = diff(input.old_text, input.new_text);

    let mut meta = vec![Span::plain(format!(
        "Generated: {}",
        input.generated_at.format("%Y-%m-%d %H:%M UTC")
    ))];
    if !input.commit.is_empty() {
        let short: String = input.commit.chars().take(8).collect();
        meta.push(Span::plain(format!(" \u{2022} Commit: {short}")));
    }
    if let Some(pr_url) = input.pr_url.filter(|u| !u.is_empty()) {
        meta.push(Span::plain(" \u{2022} "));
        meta.push(Span::linked("Pull Request", pr_url));
    }

    let mut blocks = vec![
        Block::heading(
            1,
            vec![Span::plain(redline_title(
                input.uid,
                input.prev_revision,
                input.next_revision,
            ))],
        ),
        Block::paragraph(vec![
            Span::styled("Summary: ", Annotations::bold()),
            Span::plain(stats.summary()),
        ]),
        Block::paragraph(meta),
        Block::Divider,
    ];
    blocks.extend(diff_blocks);
    (blocks, stats)
}
