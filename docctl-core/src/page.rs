//! Canonical page layout: `[history table] + [content] + [footer]`.
//!
//! Also holds the inverse operations used during an update: reading the
//! existing history rows back, cutting the content region out of fetched
//! blocks, and flattening blocks to plaintext for diffing.

use chrono::{DateTime, Utc};

use crate::blocks::{plain_text, Annotations, Block, Color, RichText, Span, Table};

pub const HISTORY_COLUMNS: [&str; 5] = ["Rev", "Status", "Date", "Redline", "Archive"];

const ARCHIVE_COLUMN: usize = 4;
const NO_LINK: &str = "\u{2014}";
const FOOTER_PREFIX: &str = "Published from Git";

/// A labelled link to another page in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub label: String,
    pub page_id: String,
}

impl PageLink {
    pub fn new(label: impl Into<String>, page_id: impl Into<String>) -> Self {
        PageLink {
            label: label.into(),
            page_id: page_id.into(),
        }
    }

    fn cell(&self) -> RichText {
        vec![Span::linked(&self.label, format!("/{}", self.page_id))]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub revision: String,
    pub status: String,
    pub date: String,
    pub redline: Option<PageLink>,
    pub archive: Option<PageLink>,
}

impl HistoryRow {
    pub fn cells(&self) -> Vec<RichText> {
        let link_cell = |link: &Option<PageLink>| match link {
            Some(link) => link.cell(),
            None => vec![Span::plain(NO_LINK)],
        };
        vec![
            vec![Span::plain(&self.revision)],
            vec![Span::plain(&self.status)],
            vec![Span::plain(&self.date)],
            link_cell(&self.redline),
            link_cell(&self.archive),
        ]
    }
}

/// History table block; `rows` are newest-first data rows.
pub fn history_table(rows: Vec<Vec<RichText>>) -> Block {
    let header: Vec<RichText> = HISTORY_COLUMNS
        .iter()
        .map(|title| vec![Span::plain(*title)])
        .collect();
    let mut all = Vec::with_capacity(rows.len() + 1);
    all.push(header);
    for mut row in rows {
        row.truncate(HISTORY_COLUMNS.len());
        row.resize_with(HISTORY_COLUMNS.len(), || vec![Span::plain("")]);
        all.push(row);
    }
    Block::Table(Table::new(all, true))
}

fn is_history_table(table: &Table) -> bool {
    table
        .rows
        .first()
        .and_then(|row| row.first())
        .is_some_and(|cell| plain_text(cell).trim() == HISTORY_COLUMNS[0])
}

/// Data rows of the first table in `blocks`, header row excluded.
pub fn existing_history_rows(blocks: &[Block]) -> Vec<Vec<RichText>> {
    blocks
        .iter()
        .find_map(|block| match block {
            Block::Table(table) if !table.rows.is_empty() => {
                Some(table.rows.iter().skip(1).cloned().collect())
            }
            _ => None,
        })
        .unwrap_or_default()
}

/// Points a row's archive cell at `archive`. Rows too short to have an
/// archive column are left alone.
pub fn set_archive_link(row: &mut [RichText], archive: &PageLink) {
    if let Some(cell) = row.get_mut(ARCHIVE_COLUMN) {
        *cell = archive.cell();
    }
}

/// Divider plus the gray provenance note closing every canonical page.
pub fn footer_blocks(commit: &str, pr_url: Option<&str>, now: DateTime<Utc>) -> Vec<Block> {
    let gray = Annotations::colored(Color::Gray);
    let short: String = commit.chars().take(8).collect();
    let mut spans = vec![Span::styled(
        format!("{FOOTER_PREFIX} \u{2022} commit {short}"),
        gray,
    )];
    if let Some(pr_url) = pr_url.filter(|u| !u.is_empty()) {
        spans.push(Span::styled(" \u{2022} ", gray));
        spans.push(Span {
            content: "PR".to_string(),
            annotations: gray,
            link: Some(pr_url.to_string()),
        });
    }
    spans.push(Span::styled(
        format!(" \u{2022} {}", now.format("%Y-%m-%d %H:%M UTC")),
        gray,
    ));
    vec![Block::Divider, Block::paragraph(spans)]
}

fn is_footer(blocks: &[Block]) -> bool {
    match blocks {
        [Block::Divider, Block::Paragraph { text }] => {
            plain_text(text).starts_with(FOOTER_PREFIX)
        }
        _ => false,
    }
}

/// `blocks` without a leading history table and trailing footer.
pub fn content_region(blocks: &[Block]) -> &[Block] {
    let mut region = blocks;
    if let Some(Block::Table(table)) = region.first() {
        if is_history_table(table) {
            region = &region[1..];
        }
    }
    if region.len() >= 2 && is_footer(&region[region.len() - 2..]) {
        region = &region[..region.len() - 2];
    }
    region
}

/// Markdown-ish plaintext of `blocks`, one line per block, used only as
/// diff input.
pub fn blocks_to_plain_text(blocks: &[Block]) -> String {
    let mut lines = Vec::new();
    push_plain_lines(blocks, 0, &mut lines);
    lines.join("\n")
}

fn push_plain_lines(blocks: &[Block], depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for block in blocks {
        match block {
            Block::Heading { level, text } => {
                lines.push(format!("{}{} {}", indent, "#".repeat(*level as usize), plain_text(text)))
            }
            Block::Paragraph { text } => lines.push(format!("{indent}{}", plain_text(text))),
            Block::Quote { text } => lines.push(format!("{indent}> {}", plain_text(text))),
            Block::BulletedItem { text, children } => {
                lines.push(format!("{indent}- {}", plain_text(text)));
                push_plain_lines(children, depth + 1, lines);
            }
            Block::NumberedItem { text, children } => {
                lines.push(format!("{indent}1. {}", plain_text(text)));
                push_plain_lines(children, depth + 1, lines);
            }
            Block::Code { language, text } => {
                lines.push(format!("{indent}```{language}"));
                lines.push(plain_text(text));
                lines.push(format!("{indent}```"));
            }
            Block::Divider => lines.push(format!("{indent}---")),
            Block::Table(table) => {
                for row in &table.rows {
                    let cells: Vec<String> = row.iter().map(|cell| plain_text(cell)).collect();
                    lines.push(format!("{indent}| {} |", cells.join(" | ")));
                }
            }
            Block::Image(image) => {
                lines.push(format!("{indent}![{}](image)", plain_text(&image.caption)))
            }
        }
    }
}

pub fn archive_title(uid: &str, revision: &str) -> String {
    format!("Archive: {uid} v{revision}")
}

pub fn redline_title(uid: &str, prev: &str, next: &str) -> String {
    format!("Redline: {uid} v{prev} \u{2192} v{next}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(rev: &str) -> HistoryRow {
        HistoryRow {
            revision: rev.to_string(),
            status: "Draft".to_string(),
            date: "2026-01-02".to_string(),
            redline: None,
            archive: None,
        }
    }

    #[test]
    fn history_round_trips_through_table() {
        let table = history_table(vec![row("0.2").cells(), row("0.1").cells()]);
        let rows = existing_history_rows(&[table]);
        assert_eq!(rows.len(), 2);
        assert_eq!(plain_text(&rows[0][0]), "0.2");
        assert_eq!(plain_text(&rows[1][4]), NO_LINK);
    }

    #[test]
    fn archive_link_patches_fifth_cell() {
        let mut cells = row("0.1").cells();
        set_archive_link(&mut cells, &PageLink::new("v0.1", "arch-1"));
        assert_eq!(cells[4][0].link.as_deref(), Some("/arch-1"));
        assert_eq!(cells[4][0].content, "v0.1");
    }

    #[test]
    fn content_region_strips_table_and_footer() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 0).unwrap();
        let body = Block::paragraph(vec![Span::plain("Body")]);
        let mut blocks = vec![history_table(vec![row("0.1").cells()]), body.clone()];
        blocks.extend(footer_blocks("0123456789abcdef", None, now));
        assert_eq!(content_region(&blocks), &[body][..]);
    }

    #[test]
    fn footer_mentions_short_commit_and_pr() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 0).unwrap();
        let footer = footer_blocks("0123456789abcdef", Some("https://git/pr/7"), now);
        let Block::Paragraph { text } = &footer[1] else {
            panic!("expected footer paragraph");
        };
        assert_eq!(
            plain_text(text),
            "Published from Git \u{2022} commit 01234567 \u{2022} PR \u{2022} 2026-03-04 05:06 UTC"
        );
        assert_eq!(text[2].link.as_deref(), Some("https://git/pr/7"));
    }
}
