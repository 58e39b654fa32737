//! Inline markup to annotated spans.
//!
//! The converter lowers parser events into a flat [`InlineToken`] stream;
//! [`format_inline`] walks that stream once with its own annotation and link
//! stacks and returns store-ready spans.

use std::path::Path;

use crate::blocks::{merge_adjacent, split_long_spans, Annotations, Span, MAX_TEXT_LENGTH};
use crate::links::PageIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Bold,
    Italic,
    Strikethrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineToken {
    Text(String),
    Code(String),
    SoftBreak,
    HardBreak,
    Open(Mark),
    Close(Mark),
    LinkOpen(String),
    LinkClose,
    Image { src: String, alt: String },
    Html(String),
}

impl InlineToken {
    pub fn is_blank(&self) -> bool {
        match self {
            InlineToken::Text(t) => t.trim().is_empty(),
            InlineToken::SoftBreak | InlineToken::HardBreak => true,
            _ => false,
        }
    }
}

/// Where link targets get rewritten.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub doc_path: &'a Path,
    pub pages: Option<&'a PageIndex>,
}

impl LinkContext<'_> {
    fn target(&self, href: &str) -> Option<String> {
        if href.is_empty() {
            return None;
        }
        let resolved = self.pages.and_then(|p| p.resolve(self.doc_path, href));
        Some(resolved.unwrap_or_else(|| href.to_string()))
    }
}

/// Per-call formatting state. Marks are counted so that closing one emphasis
/// only removes that emphasis, even when the same mark is nested.
#[derive(Default)]
struct InlineState {
    bold: usize,
    italic: usize,
    strikethrough: usize,
    links: Vec<Option<String>>,
}

impl InlineState {
    fn open(&mut self, mark: Mark) {
        *self.counter(mark) += 1;
    }

    fn close(&mut self, mark: Mark) {
        let counter = self.counter(mark);
        *counter = counter.saturating_sub(1);
    }

    fn counter(&mut self, mark: Mark) -> &mut usize {
        match mark {
            Mark::Bold => &mut self.bold,
            Mark::Italic => &mut self.italic,
            Mark::Strikethrough => &mut self.strikethrough,
        }
    }

    fn annotations(&self) -> Annotations {
        Annotations {
            bold: self.bold > 0,
            italic: self.italic > 0,
            strikethrough: self.strikethrough > 0,
            ..Default::default()
        }
    }

    fn link(&self) -> Option<String> {
        self.links.last().cloned().flatten()
    }
}

/// Formats a run of inline tokens into spans no longer than the store limit.
///
/// Images are block-level in the store, so an image inside running text
/// produces nothing here.
pub fn format_inline(tokens: &[InlineToken], links: &LinkContext<'_>) -> Vec<Span> {
    let mut state = InlineState::default();
    let mut spans = Vec::new();

    for token in tokens {
        match token {
            InlineToken::Text(text) => spans.push(Span {
                content: text.clone(),
                annotations: state.annotations(),
                link: state.link(),
            }),
            InlineToken::Code(code) => spans.push(Span {
                content: code.clone(),
                annotations: Annotations {
                    code: true,
                    ..state.annotations()
                },
                link: state.link(),
            }),
            InlineToken::SoftBreak | InlineToken::HardBreak => spans.push(Span::plain("\n")),
            InlineToken::Open(mark) => state.open(*mark),
            InlineToken::Close(mark) => state.close(*mark),
            InlineToken::LinkOpen(href) => state.links.push(links.target(href)),
            InlineToken::LinkClose => {
                state.links.pop();
            }
            InlineToken::Image { .. } => {}
            InlineToken::Html(html) => spans.push(Span::plain(html.clone())),
        }
    }

    split_long_spans(merge_adjacent(spans), MAX_TEXT_LENGTH)
}
