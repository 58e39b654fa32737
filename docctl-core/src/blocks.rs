//! # blocks: typed content tree for the page store
//!
//! Every piece of content that docctl sends to (or reads back from) the page
//! store passes through the [`Block`] sum type. Converters, the redline
//! generator and the history table all produce `Block`s; the wire module is
//! the only place that knows the JSON shape.
//!
//! Text lives in [`Span`]s: a run of characters with one set of
//! [`Annotations`] and an optional link target. The store rejects any span
//! longer than [`MAX_TEXT_LENGTH`] characters, so anything that builds spans
//! from unbounded input runs them through [`split_long_spans`].

use serde::{Deserialize, Serialize};

/// Longest text content (in characters) accepted for one rich-text span.
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Most blocks the store accepts in a single create/append request.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// Deepest heading level the store can render.
pub const MAX_HEADING_LEVEL: u8 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    #[default]
    Default,
    Gray,
    Green,
    Red,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Default => "default",
            Color::Gray => "gray",
            Color::Green => "green",
            Color::Red => "red",
        }
    }

    /// Unknown store colors collapse to `Default`.
    pub fn parse(name: &str) -> Self {
        match name {
            "gray" => Color::Gray,
            "green" => Color::Green,
            "red" => Color::Red,
            _ => Color::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub color: Color,
}

impl Annotations {
    pub fn italic() -> Self {
        Annotations {
            italic: true,
            ..Default::default()
        }
    }

    pub fn bold() -> Self {
        Annotations {
            bold: true,
            ..Default::default()
        }
    }

    pub fn colored(color: Color) -> Self {
        Annotations {
            color,
            ..Default::default()
        }
    }
}

/// A run of text sharing one annotation set and link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub content: String,
    pub annotations: Annotations,
    pub link: Option<String>,
}

impl Span {
    pub fn plain(content: impl Into<String>) -> Self {
        Span {
            content: content.into(),
            annotations: Annotations::default(),
            link: None,
        }
    }

    pub fn styled(content: impl Into<String>, annotations: Annotations) -> Self {
        Span {
            content: content.into(),
            annotations,
            link: None,
        }
    }

    pub fn linked(content: impl Into<String>, url: impl Into<String>) -> Self {
        Span {
            content: content.into(),
            annotations: Annotations::default(),
            link: Some(url.into()),
        }
    }

    fn same_style(&self, other: &Span) -> bool {
        self.annotations == other.annotations && self.link == other.link
    }
}

pub type RichText = Vec<Span>;

/// Concatenated content of a span sequence, formatting dropped.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.content.as_str()).collect()
}

/// Splits every span longer than `max` characters into consecutive chunks of
/// at most `max` characters. Chunks inherit annotations and link target and
/// keep their original order.
pub fn split_long_spans(spans: Vec<Span>, max: usize) -> Vec<Span> {
    let max = max.max(1);
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        if span.content.chars().count() <= max {
            out.push(span);
            continue;
        }
        let chars: Vec<char> = span.content.chars().collect();
        for chunk in chars.chunks(max) {
            out.push(Span {
                content: chunk.iter().collect(),
                annotations: span.annotations,
                link: span.link.clone(),
            });
        }
    }
    out
}

fn is_break(span: &Span) -> bool {
    span.content == "\n"
}

/// Folds neighbouring spans that share annotations and link into one.
/// Line-break spans stay on their own.
pub(crate) fn merge_adjacent(spans: Vec<Span>) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.content.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.same_style(&span) && !is_break(last) && !is_break(&span) => {
                last.content.push_str(&span.content)
            }
            _ => out.push(span),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub width: usize,
    pub has_column_header: bool,
    pub rows: Vec<Vec<RichText>>,
}

impl Table {
    /// Pads every row with empty cells up to the widest row.
    pub fn new(mut rows: Vec<Vec<RichText>>, has_column_header: bool) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize_with(width, Vec::new);
        }
        Table {
            width,
            has_column_header,
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub caption: RichText,
    /// Layout hint parsed from a `|width=N` alt-text suffix. The store has no
    /// field for it, so it only survives in memory.
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: RichText },
    Paragraph { text: RichText },
    Code { language: String, text: RichText },
    BulletedItem { text: RichText, children: Vec<Block> },
    NumberedItem { text: RichText, children: Vec<Block> },
    Quote { text: RichText },
    Divider,
    Table(Table),
    Image(Image),
}

impl Block {
    /// Heading with the level clamped into `1..=MAX_HEADING_LEVEL`.
    pub fn heading(level: u8, text: RichText) -> Self {
        Block::Heading {
            level: level.clamp(1, MAX_HEADING_LEVEL),
            text,
        }
    }

    pub fn paragraph(text: RichText) -> Self {
        Block::Paragraph { text }
    }

    /// A table block, or a placeholder paragraph when there are no rows.
    pub fn table(rows: Vec<Vec<RichText>>, has_column_header: bool) -> Self {
        if rows.is_empty() {
            return Block::paragraph(vec![Span::plain("(empty table)")]);
        }
        Block::Table(Table::new(rows, has_column_header))
    }

    /// Store type tag for this block.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Heading { level: 1, .. } => "heading_1",
            Block::Heading { level: 2, .. } => "heading_2",
            Block::Heading { .. } => "heading_3",
            Block::Paragraph { .. } => "paragraph",
            Block::Code { .. } => "code",
            Block::BulletedItem { .. } => "bulleted_list_item",
            Block::NumberedItem { .. } => "numbered_list_item",
            Block::Quote { .. } => "quote",
            Block::Divider => "divider",
            Block::Table(_) => "table",
            Block::Image(_) => "image",
        }
    }

    /// Rich text carried directly by the block, if it has any.
    pub fn text(&self) -> Option<&[Span]> {
        match self {
            Block::Heading { text, .. }
            | Block::Paragraph { text }
            | Block::Code { text, .. }
            | Block::BulletedItem { text, .. }
            | Block::NumberedItem { text, .. }
            | Block::Quote { text } => Some(text),
            Block::Image(image) => Some(&image.caption),
            Block::Divider | Block::Table(_) => None,
        }
    }

    pub fn children(&self) -> &[Block] {
        match self {
            Block::BulletedItem { children, .. } | Block::NumberedItem { children, .. } => {
                children
            }
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_are_padded_to_the_widest_row() {
        let cell = |s: &str| vec![Span::plain(s)];
        let rows = vec![
            vec![cell("a"), cell("b")],
            vec![cell("c"), cell("d"), cell("e")],
            vec![cell("f")],
        ];
        let Block::Table(table) = Block::table(rows, true) else {
            panic!("expected a table block");
        };
        assert_eq!(table.width, 3);
        assert!(table.rows.iter().all(|r| r.len() == 3));
        assert!(table.rows[2][1].is_empty());
        assert!(table.rows[2][2].is_empty());
    }

    #[test]
    fn empty_table_degrades_to_placeholder() {
        let block = Block::table(Vec::new(), true);
        assert_eq!(
            block,
            Block::paragraph(vec![Span::plain("(empty table)")])
        );
    }

    #[test]
    fn long_span_splits_and_rejoins() {
        let text: String = "abcdefghij".repeat(450);
        let span = Span {
            content: text.clone(),
            annotations: Annotations::bold(),
            link: Some("https://example.com".into()),
        };
        let chunks = split_long_spans(vec![span], MAX_TEXT_LENGTH);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= MAX_TEXT_LENGTH));
        assert!(chunks.iter().all(|c| c.annotations.bold));
        assert!(chunks
            .iter()
            .all(|c| c.link.as_deref() == Some("https://example.com")));
        assert_eq!(plain_text(&chunks), text);
    }

    #[test]
    fn split_counts_characters_not_bytes() {
        let text = "é".repeat(5);
        let chunks = split_long_spans(vec![Span::plain(text.clone())], 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(plain_text(&chunks), text);
    }

    #[test]
    fn heading_level_clamps() {
        assert_eq!(Block::heading(5, vec![]).kind(), "heading_3");
        assert_eq!(Block::heading(0, vec![]).kind(), "heading_1");
    }
}
