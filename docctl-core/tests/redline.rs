use chrono::{TimeZone, Utc};

use docctl_core::blocks::{plain_text, Block, Color};
use docctl_core::diff::{build_redline_blocks, diff, diff_stats, DiffStats, RedlineInput};

fn paragraphs(blocks: &[Block]) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::Paragraph { text } => Some(plain_text(text)),
            _ => None,
        })
        .collect()
}

#[test]
fn identical_snapshots_report_no_differences() {
    let (blocks, stats) = diff("a\nb\nc\n", "a\nb\nc\n");
    assert!(stats.is_empty());
    assert_eq!(stats.summary(), "No changes detected");
    assert_eq!(paragraphs(&blocks), vec!["No differences detected.".to_string()]);
}

#[test]
fn empty_old_snapshot_gets_initial_notice() {
    let (blocks, stats) = diff("", "first\nsecond\n");
    assert_eq!(blocks.len(), 1);
    assert!(paragraphs(&blocks)[0].starts_with("Initial version"));
    assert_eq!(stats.added, 2);
}

#[test]
fn stats_separate_added_removed_and_changed_runs() {
    assert_eq!(
        diff_stats("a\nb\nc", "a\nB\nc\nd"),
        DiffStats {
            added: 1,
            removed: 0,
            changed: 1
        }
    );
    assert_eq!(
        diff_stats("a\nb\nc", "a\nc"),
        DiffStats {
            added: 0,
            removed: 1,
            changed: 0
        }
    );
    // A mixed run counts the longer side.
    let stats = diff_stats("a\nx\ny\nz", "a\nq");
    assert_eq!(stats.changed, 3);
    assert_eq!(stats.summary(), "3 lines changed");
}

#[test]
fn hunks_render_with_styles() {
    let (blocks, stats) = diff("a\nb\nc", "a\nB\nc");
    assert_eq!(stats.changed, 1);
    assert_eq!(blocks[0], Block::Divider);

    let header = blocks[1].text().unwrap();
    assert!(plain_text(header).starts_with("@@"));
    assert!(header[0].annotations.italic);
    assert_eq!(header[0].annotations.color, Color::Gray);

    let removed = blocks
        .iter()
        .find_map(|b| b.text().filter(|t| plain_text(t) == "- b"))
        .expect("removed line rendered");
    assert!(removed[0].annotations.strikethrough);
    assert_eq!(removed[0].annotations.color, Color::Red);

    let added = blocks
        .iter()
        .find_map(|b| b.text().filter(|t| plain_text(t) == "+ B"))
        .expect("added line rendered");
    assert_eq!(added[0].annotations.color, Color::Green);
    assert!(!added[0].annotations.strikethrough);

    let context: Vec<String> = blocks
        .iter()
        .filter_map(Block::text)
        .filter(|t| !t.is_empty() && t[0].annotations.color == Color::Gray && !t[0].annotations.italic)
        .map(plain_text)
        .collect();
    assert_eq!(context, vec!["a\n".to_string(), "c\n".to_string()]);
}

#[test]
fn far_apart_edits_produce_separate_hunks() {
    let old: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
    let mut new = old.clone();
    new[2] = "changed early".to_string();
    new[27] = "changed late".to_string();
    let (blocks, stats) = diff(&old.join("\n"), &new.join("\n"));
    assert_eq!(stats.changed, 2);
    let dividers = blocks.iter().filter(|b| **b == Block::Divider).count();
    assert_eq!(dividers, 2);
}

#[test]
fn redline_page_has_title_summary_and_metadata() {
    let input = RedlineInput {
        uid: "MOS-ENG-SOP-001",
        prev_revision: "0.1",
        next_revision: "0.2",
        old_text: "Purpose\nOld step",
        new_text: "Purpose\nNew step",
        commit: "0123456789abcdef",
        pr_url: Some("https://git.example.com/org/docs/pulls/7"),
        generated_at: Utc.with_ymd_and_hms(2026, 5, 6, 7, 8, 0).unwrap(),
    };
    let (blocks, stats) = build_redline_blocks(&input);
    assert_eq!(stats.changed, 1);

    assert_eq!(blocks[0].kind(), "heading_1");
    assert_eq!(
        plain_text(blocks[0].text().unwrap()),
        "Redline: MOS-ENG-SOP-001 v0.1 \u{2192} v0.2"
    );

    let summary = blocks[1].text().unwrap();
    assert!(summary[0].annotations.bold);
    assert_eq!(plain_text(summary), "Summary: 1 lines changed");

    let meta = blocks[2].text().unwrap();
    let meta_text = plain_text(meta);
    assert!(meta_text.starts_with("Generated: 2026-05-06 07:08 UTC"));
    assert!(meta_text.contains("Commit: 01234567"));
    let pr = meta.last().unwrap();
    assert_eq!(pr.content, "Pull Request");
    assert_eq!(
        pr.link.as_deref(),
        Some("https://git.example.com/org/docs/pulls/7")
    );

    assert_eq!(blocks[3], Block::Divider);
    assert!(paragraphs(&blocks).iter().any(|p| p == "+ New step"));
}
