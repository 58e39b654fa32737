//! # convert: Markdown to store blocks
//!
//! Conversion runs in two passes:
//!   1. The pulldown-cmark event stream is folded into a small nested syntax
//!      tree ([`Node`]) by recursive descent, one function per container.
//!   2. The tree is walked to produce a flat, source-ordered `Vec<Block>`;
//!      only list items carry child blocks.
//!
//! Content the store cannot express is degraded rather than rejected:
//! headings deeper than level 3 become level 3, an image inside running text
//! is dropped, raw HTML becomes a plain paragraph, unknown constructs are
//! skipped. The output length is unbounded; batching to the per-request
//! limit is the caller's job (see [`crate::store`]).

use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::blocks::{split_long_spans, Block, Image, RichText, Span, MAX_TEXT_LENGTH};
use crate::document::strip_frontmatter;
use crate::inline::{format_inline, InlineToken, LinkContext, Mark};
use crate::links::{is_external, normalize_path, PageIndex};

/// Language tag used when a fence names nothing the store knows.
pub const PLAIN_TEXT_LANGUAGE: &str = "plain text";

const SUPPORTED_LANGUAGES: &[&str] = &[
    "python", "javascript", "typescript", "java", "c", "cpp", "c++", "c#", "csharp", "go",
    "rust", "ruby", "php", "swift", "kotlin", "scala", "r", "matlab", "sql", "html", "css",
    "scss", "json", "yaml", "xml", "markdown", "bash", "shell", "powershell", "docker",
    "dockerfile", "makefile", "toml", "ini", "diff", "graphql", "protobuf", "arduino",
    "elixir", "erlang", "haskell", "lua", "nix", "perl", "plain text", "mermaid",
];

static WIDTH_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|width=(\d+)\s*$").expect("width hint pattern is valid"));

/// Per-document inputs for a conversion.
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions<'a> {
    /// Source path of the document; relative links and images resolve
    /// against its directory.
    pub doc_path: &'a Path,
    pub repo_root: &'a Path,
    /// Raw-content base URL for relative images, e.g.
    /// `https://git.example.com/org/docs/raw/branch/main`.
    pub raw_url_base: Option<&'a str>,
    pub pages: Option<&'a PageIndex>,
}

impl<'a> ConvertOptions<'a> {
    pub fn new(doc_path: &'a Path, repo_root: &'a Path) -> Self {
        ConvertOptions {
            doc_path,
            repo_root,
            raw_url_base: None,
            pages: None,
        }
    }

    fn links(&self) -> LinkContext<'a> {
        LinkContext {
            doc_path: self.doc_path,
            pages: self.pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Heading {
        level: u8,
        inline: Vec<InlineToken>,
    },
    Paragraph(Vec<InlineToken>),
    Code {
        info: Option<String>,
        text: String,
    },
    List {
        ordered: bool,
        items: Vec<Vec<Node>>,
    },
    Quote(Vec<Node>),
    Table {
        has_header: bool,
        rows: Vec<Vec<Vec<InlineToken>>>,
    },
    Rule,
    Html(String),
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Converts a Markdown body into store blocks in source order. A leading
/// frontmatter block, if still present, is skipped.
pub fn markdown_to_blocks(markdown: &str, options: &ConvertOptions<'_>) -> Vec<Block> {
    let markdown = strip_frontmatter(markdown);
    let mut events = Parser::new_ext(markdown, parser_options()).peekable();
    let nodes = parse_blocks(&mut events, None);
    let mut blocks = Vec::new();
    for node in &nodes {
        convert_node(node, options, &mut blocks);
    }
    blocks
}

// ---------------------------------------------------------------------------
// Pass 1: events -> syntax tree
// ---------------------------------------------------------------------------

fn parse_blocks<'a, I>(events: &mut Peekable<I>, end: Option<TagEnd>) -> Vec<Node>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut nodes = Vec::new();
    loop {
        // Tight list items carry their text without a paragraph wrapper.
        if events.peek().is_some_and(|e| is_inline_event(e)) {
            nodes.push(Node::Paragraph(collect_loose_inline(events)));
            continue;
        }
        let Some(event) = events.next() else {
            break;
        };
        match event {
            Event::End(tag_end) => {
                if end == Some(tag_end) {
                    break;
                }
            }
            Event::Start(tag) => {
                if let Some(node) = parse_container(tag, events) {
                    nodes.push(node);
                }
            }
            Event::Rule => nodes.push(Node::Rule),
            Event::Html(html) => nodes.push(Node::Html(html.into_string())),
            _ => {}
        }
    }
    nodes
}

fn parse_container<'a, I>(tag: Tag<'a>, events: &mut Peekable<I>) -> Option<Node>
where
    I: Iterator<Item = Event<'a>>,
{
    let end = tag.to_end();
    match tag {
        Tag::Paragraph => Some(Node::Paragraph(collect_inline(events, end))),
        Tag::Heading { level, .. } => Some(Node::Heading {
            level: level as u8,
            inline: collect_inline(events, end),
        }),
        Tag::CodeBlock(kind) => {
            let info = match kind {
                CodeBlockKind::Fenced(info) => Some(info.into_string()),
                CodeBlockKind::Indented => None,
            };
            Some(Node::Code {
                info,
                text: collect_text(events, end),
            })
        }
        Tag::List(start) => Some(parse_list(events, start.is_some(), end)),
        Tag::BlockQuote(..) => Some(Node::Quote(parse_blocks(events, Some(end)))),
        Tag::Table(_) => Some(parse_table(events, end)),
        Tag::HtmlBlock => Some(Node::Html(collect_text(events, end))),
        _ => {
            // Footnote definitions, metadata blocks and anything newer.
            skip_subtree(events);
            None
        }
    }
}

fn parse_list<'a, I>(events: &mut Peekable<I>, ordered: bool, end: TagEnd) -> Node
where
    I: Iterator<Item = Event<'a>>,
{
    let mut items = Vec::new();
    while let Some(event) = events.next() {
        match event {
            Event::Start(Tag::Item) => items.push(parse_blocks(events, Some(TagEnd::Item))),
            Event::End(tag_end) if tag_end == end => break,
            _ => {}
        }
    }
    Node::List { ordered, items }
}

fn parse_table<'a, I>(events: &mut Peekable<I>, end: TagEnd) -> Node
where
    I: Iterator<Item = Event<'a>>,
{
    let mut has_header = false;
    let mut rows = Vec::new();
    let mut row: Option<Vec<Vec<InlineToken>>> = None;
    while let Some(event) = events.next() {
        match event {
            Event::Start(Tag::TableHead) => {
                has_header = true;
                row = Some(Vec::new());
            }
            Event::Start(Tag::TableRow) => row = Some(Vec::new()),
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                rows.extend(row.take());
            }
            Event::Start(Tag::TableCell) => {
                let cell = collect_inline(events, TagEnd::TableCell);
                row.get_or_insert_with(Vec::new).push(cell);
            }
            Event::End(tag_end) if tag_end == end => break,
            _ => {}
        }
    }
    Node::Table { has_header, rows }
}

fn is_inline_event(event: &Event<'_>) -> bool {
    match event {
        Event::Text(_)
        | Event::Code(_)
        | Event::SoftBreak
        | Event::HardBreak
        | Event::InlineHtml(_)
        | Event::FootnoteReference(_)
        | Event::TaskListMarker(_) => true,
        Event::Start(tag) => matches!(
            tag,
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
        ),
        Event::End(tag_end) => matches!(
            tag_end,
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
        ),
        _ => false,
    }
}

fn collect_inline<'a, I>(events: &mut Peekable<I>, end: TagEnd) -> Vec<InlineToken>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut tokens = Vec::new();
    while let Some(event) = events.next() {
        if matches!(&event, Event::End(tag_end) if *tag_end == end) {
            break;
        }
        push_inline(event, events, &mut tokens);
    }
    tokens
}

fn collect_loose_inline<'a, I>(events: &mut Peekable<I>) -> Vec<InlineToken>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut tokens = Vec::new();
    while events.peek().is_some_and(|e| is_inline_event(e)) {
        if let Some(event) = events.next() {
            push_inline(event, events, &mut tokens);
        }
    }
    tokens
}

fn push_inline<'a, I>(event: Event<'a>, events: &mut Peekable<I>, tokens: &mut Vec<InlineToken>)
where
    I: Iterator<Item = Event<'a>>,
{
    let token = match event {
        Event::Text(text) => InlineToken::Text(text.into_string()),
        Event::Code(code) => InlineToken::Code(code.into_string()),
        Event::SoftBreak => InlineToken::SoftBreak,
        Event::HardBreak => InlineToken::HardBreak,
        Event::InlineHtml(html) | Event::Html(html) => InlineToken::Html(html.into_string()),
        Event::Start(Tag::Strong) => InlineToken::Open(Mark::Bold),
        Event::End(TagEnd::Strong) => InlineToken::Close(Mark::Bold),
        Event::Start(Tag::Emphasis) => InlineToken::Open(Mark::Italic),
        Event::End(TagEnd::Emphasis) => InlineToken::Close(Mark::Italic),
        Event::Start(Tag::Strikethrough) => InlineToken::Open(Mark::Strikethrough),
        Event::End(TagEnd::Strikethrough) => InlineToken::Close(Mark::Strikethrough),
        Event::Start(Tag::Link { dest_url, .. }) => InlineToken::LinkOpen(dest_url.into_string()),
        Event::End(TagEnd::Link) => InlineToken::LinkClose,
        Event::Start(Tag::Image { dest_url, .. }) => InlineToken::Image {
            src: dest_url.into_string(),
            alt: collect_text(events, TagEnd::Image),
        },
        _ => return,
    };
    tokens.push(token);
}

/// Concatenates every text-bearing event up to `end`.
fn collect_text<'a, I>(events: &mut Peekable<I>, end: TagEnd) -> String
where
    I: Iterator<Item = Event<'a>>,
{
    let mut text = String::new();
    for event in events.by_ref() {
        match event {
            Event::End(tag_end) if tag_end == end => break,
            Event::Text(t) | Event::Code(t) | Event::Html(t) | Event::InlineHtml(t) => {
                text.push_str(&t)
            }
            _ => {}
        }
    }
    text
}

fn skip_subtree<'a, I>(events: &mut Peekable<I>)
where
    I: Iterator<Item = Event<'a>>,
{
    let mut depth = 0usize;
    for event in events.by_ref() {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 2: syntax tree -> blocks
// ---------------------------------------------------------------------------

fn convert_node(node: &Node, options: &ConvertOptions<'_>, out: &mut Vec<Block>) {
    match node {
        Node::Heading { level, inline } => {
            out.push(Block::heading(*level, format(inline, options)));
        }
        Node::Paragraph(inline) => {
            if let Some((src, alt)) = lone_image(inline) {
                out.push(image_block(src, alt, options));
                return;
            }
            let text = format(inline, options);
            if !text.is_empty() {
                out.push(Block::paragraph(text));
            }
        }
        Node::Code { info, text } => out.push(code_block(info.as_deref(), text)),
        Node::List { ordered, items } => {
            for item in items {
                out.push(list_item(*ordered, item, options));
            }
        }
        Node::Quote(children) => {
            let mut text = Vec::new();
            collect_quote_text(children, options, &mut text);
            if !text.is_empty() {
                out.push(Block::Quote { text });
            }
        }
        Node::Table { has_header, rows } => {
            let rows = rows
                .iter()
                .map(|row| row.iter().map(|cell| format(cell, options)).collect())
                .collect();
            out.push(Block::table(rows, *has_header));
        }
        Node::Rule => out.push(Block::Divider),
        Node::Html(html) => {
            let html = html.trim();
            if !html.is_empty() {
                out.push(Block::paragraph(split_long_spans(
                    vec![Span::plain(html)],
                    MAX_TEXT_LENGTH,
                )));
            }
        }
    }
}

fn format(inline: &[InlineToken], options: &ConvertOptions<'_>) -> RichText {
    format_inline(inline, &options.links())
}

/// The image of a paragraph made of exactly one image and whitespace.
fn lone_image(inline: &[InlineToken]) -> Option<(&str, &str)> {
    let mut image = None;
    for token in inline {
        match token {
            InlineToken::Image { src, alt } => {
                if image.is_some() {
                    return None;
                }
                image = Some((src.as_str(), alt.as_str()));
            }
            token if token.is_blank() => {}
            _ => return None,
        }
    }
    image
}

fn list_item(ordered: bool, item: &[Node], options: &ConvertOptions<'_>) -> Block {
    let mut text: Option<RichText> = None;
    let mut children = Vec::new();
    for node in item {
        match node {
            Node::Paragraph(inline) if text.is_none() => text = Some(format(inline, options)),
            nested @ Node::List { .. } => convert_node(nested, options, &mut children),
            _ => {}
        }
    }
    let text = match text {
        Some(text) if !text.is_empty() => text,
        _ => vec![Span::plain("")],
    };
    if ordered {
        Block::NumberedItem { text, children }
    } else {
        Block::BulletedItem { text, children }
    }
}

/// Every paragraph under a blockquote, joined by newline spans.
fn collect_quote_text(nodes: &[Node], options: &ConvertOptions<'_>, out: &mut RichText) {
    for node in nodes {
        match node {
            Node::Paragraph(inline) => {
                if !out.is_empty() {
                    out.push(Span::plain("\n"));
                }
                out.extend(format(inline, options));
            }
            Node::Quote(children) => collect_quote_text(children, options, out),
            Node::List { items, .. } => {
                for item in items {
                    collect_quote_text(item, options, out);
                }
            }
            _ => {}
        }
    }
}

/// Maps a fence info string onto the store's language set.
pub fn code_language(info: Option<&str>) -> &'static str {
    let Some(word) = info.and_then(|i| i.split_whitespace().next()) else {
        return PLAIN_TEXT_LANGUAGE;
    };
    let lower = word.to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| **lang == lower)
        .copied()
        .unwrap_or(PLAIN_TEXT_LANGUAGE)
}

fn code_block(info: Option<&str>, text: &str) -> Block {
    Block::Code {
        language: code_language(info).to_string(),
        text: split_long_spans(
            vec![Span::plain(text.trim_end_matches('\n'))],
            MAX_TEXT_LENGTH,
        ),
    }
}

/// Splits a trailing `|width=N` layout hint off image alt text.
pub fn split_width_hint(alt: &str) -> (String, Option<u32>) {
    match WIDTH_HINT.captures(alt) {
        Some(caps) => {
            let start = caps.get(0).map_or(alt.len(), |m| m.start());
            let width = caps.get(1).and_then(|m| m.as_str().parse().ok());
            (alt[..start].trim().to_string(), width)
        }
        None => (alt.to_string(), None),
    }
}

/// Absolute URLs pass through; relative paths become raw-content URLs when a
/// base is configured and stay literal otherwise.
pub fn resolve_image_url(src: &str, options: &ConvertOptions<'_>) -> String {
    if is_external(src) {
        return src.to_string();
    }
    let Some(base) = options.raw_url_base.filter(|b| !b.is_empty()) else {
        return src.to_string();
    };
    let doc_dir = options.doc_path.parent().unwrap_or_else(|| Path::new(""));
    let resolved = normalize_path(&doc_dir.join(src));
    let relative = resolved
        .strip_prefix(normalize_path(options.repo_root))
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(src));
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", base.trim_end_matches('/'), relative)
}

pub fn image_block(src: &str, alt: &str, options: &ConvertOptions<'_>) -> Block {
    let (caption, width) = split_width_hint(alt);
    let caption = if caption.is_empty() {
        Vec::new()
    } else {
        split_long_spans(vec![Span::plain(caption)], MAX_TEXT_LENGTH)
    };
    Block::Image(Image {
        url: resolve_image_url(src, options),
        caption,
        width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tight_list_items_become_paragraph_nodes() {
        let mut events = Parser::new_ext("- one\n- two\n", parser_options()).peekable();
        let nodes = parse_blocks(&mut events, None);
        let Node::List { ordered, items } = &nodes[0] else {
            panic!("expected a list, got {nodes:?}");
        };
        assert!(!ordered);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0][0], Node::Paragraph(_)));
    }

    #[test]
    fn width_hint_is_parsed_and_stripped() {
        assert_eq!(
            split_width_hint("Process flow |width=400"),
            ("Process flow".to_string(), Some(400))
        );
        assert_eq!(split_width_hint("No hint"), ("No hint".to_string(), None));
    }

    #[test]
    fn code_language_matches_case_insensitively() {
        assert_eq!(code_language(Some("Rust")), "rust");
        assert_eq!(code_language(Some("python3")), PLAIN_TEXT_LANGUAGE);
        assert_eq!(code_language(None), PLAIN_TEXT_LANGUAGE);
    }
}
