//! JSON shapes spoken by the page store.
//!
//! Blocks encode as `{"type": t, t: {...}}` with rich text arrays; page
//! properties use the store's typed property objects. Decoding is lenient:
//! fields the store omits fall back to defaults, and block types outside
//! [`Block`] become a paragraph of their rich text or are dropped.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::blocks::{Annotations, Block, Color, Image, RichText, Span, Table};
use crate::contract::RemotePage;
use crate::revision::PriorState;

pub const PROP_TITLE: &str = "Title";
pub const PROP_DOC_UID: &str = "Doc UID";
pub const PROP_REVISION: &str = "Revision";
pub const PROP_STATUS: &str = "Status";
pub const PROP_COMMIT: &str = "Git Commit SHA";

pub fn encode_rich_text(spans: &[Span]) -> Value {
    Value::Array(
        spans
            .iter()
            .map(|span| {
                let link = match &span.link {
                    Some(url) => json!({ "url": url }),
                    None => Value::Null,
                };
                json!({
                    "type": "text",
                    "text": { "content": span.content, "link": link },
                    "annotations": {
                        "bold": span.annotations.bold,
                        "italic": span.annotations.italic,
                        "strikethrough": span.annotations.strikethrough,
                        "underline": false,
                        "code": span.annotations.code,
                        "color": span.annotations.color.as_str(),
                    },
                })
            })
            .collect(),
    )
}

fn text_body(text: &RichText) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("rich_text".into(), encode_rich_text(text));
    body
}

fn list_body(text: &RichText, children: &[Block]) -> Map<String, Value> {
    let mut body = text_body(text);
    if !children.is_empty() {
        body.insert("children".into(), encode_blocks(children));
    }
    body
}

pub fn encode_block(block: &Block) -> Value {
    let body = match block {
        Block::Heading { text, .. } | Block::Paragraph { text } | Block::Quote { text } => {
            Value::Object(text_body(text))
        }
        Block::Code { language, text } => {
            let mut body = text_body(text);
            body.insert("language".into(), Value::String(language.clone()));
            Value::Object(body)
        }
        Block::BulletedItem { text, children } | Block::NumberedItem { text, children } => {
            Value::Object(list_body(text, children))
        }
        Block::Divider => json!({}),
        Block::Table(table) => {
            let rows: Vec<Value> = table
                .rows
                .iter()
                .map(|row| {
                    let cells: Vec<Value> = row.iter().map(|cell| encode_rich_text(cell)).collect();
                    json!({ "type": "table_row", "table_row": { "cells": cells } })
                })
                .collect();
            json!({
                "table_width": table.width,
                "has_column_header": table.has_column_header,
                "has_row_header": false,
                "children": rows,
            })
        }
        Block::Image(image) => json!({
            "type": "external",
            "external": { "url": image.url },
            "caption": encode_rich_text(&image.caption),
        }),
    };
    let kind = block.kind();
    let mut object = Map::new();
    object.insert("object".into(), Value::String("block".into()));
    object.insert("type".into(), Value::String(kind.into()));
    object.insert(kind.into(), body);
    Value::Object(object)
}

pub fn encode_blocks(blocks: &[Block]) -> Value {
    Value::Array(blocks.iter().map(encode_block).collect())
}

fn decode_span(item: &Value) -> Span {
    let content = item
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| item.pointer("/text/content").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();
    let link = item
        .get("href")
        .and_then(Value::as_str)
        .or_else(|| item.pointer("/text/link/url").and_then(Value::as_str))
        .map(str::to_string);
    let flag = |name: &str| {
        item.pointer(&format!("/annotations/{name}"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    let color = item
        .pointer("/annotations/color")
        .and_then(Value::as_str)
        .map(Color::parse)
        .unwrap_or_default();
    Span {
        content,
        annotations: Annotations {
            bold: flag("bold"),
            italic: flag("italic"),
            strikethrough: flag("strikethrough"),
            code: flag("code"),
            color,
        },
        link,
    }
}

pub fn decode_rich_text(value: Option<&Value>) -> RichText {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(decode_span).collect())
        .unwrap_or_default()
}

fn decode_children(block: &Value, body: &Value) -> Vec<Block> {
    body.get("children")
        .or_else(|| block.get("children"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(decode_block).collect())
        .unwrap_or_default()
}

/// Decodes one store block. Returns `None` for blocks with no text worth
/// keeping, such as child pages and embeds.
pub fn decode_block(block: &Value) -> Option<Block> {
    let kind = block.get("type").and_then(Value::as_str)?;
    let empty = Value::Null;
    let body = block.get(kind).unwrap_or(&empty);
    let text = || decode_rich_text(body.get("rich_text"));

    let decoded = match kind {
        "heading_1" => Block::heading(1, text()),
        "heading_2" => Block::heading(2, text()),
        "heading_3" => Block::heading(3, text()),
        "paragraph" => Block::paragraph(text()),
        "quote" => Block::Quote { text: text() },
        "code" => Block::Code {
            language: body
                .get("language")
                .and_then(Value::as_str)
                .unwrap_or("plain text")
                .to_string(),
            text: text(),
        },
        "bulleted_list_item" => Block::BulletedItem {
            text: text(),
            children: decode_children(block, body),
        },
        "numbered_list_item" => Block::NumberedItem {
            text: text(),
            children: decode_children(block, body),
        },
        "divider" => Block::Divider,
        "table" => {
            let rows = body
                .get("children")
                .or_else(|| block.get("children"))
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|row| {
                            row.pointer("/table_row/cells")
                                .and_then(Value::as_array)
                                .map(|cells| {
                                    cells.iter().map(|c| decode_rich_text(Some(c))).collect()
                                })
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .unwrap_or_default();
            let has_header = body
                .get("has_column_header")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Block::Table(Table::new(rows, has_header))
        }
        "image" => {
            let url = body
                .pointer("/external/url")
                .or_else(|| body.pointer("/file/url"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Block::Image(Image {
                url,
                caption: decode_rich_text(body.get("caption")),
                width: None,
            })
        }
        _ => {
            let text = text();
            if text.is_empty() {
                return None;
            }
            Block::paragraph(text)
        }
    };
    Some(decoded)
}

fn rich_text_prop(value: &str) -> Value {
    json!({ "rich_text": [{ "type": "text", "text": { "content": value } }] })
}

fn select_prop(value: &str) -> Value {
    json!({ "select": { "name": value } })
}

/// Properties written to a canonical page on create and on every update.
#[derive(Debug, Clone, PartialEq)]
pub struct PageProperties {
    pub uid: String,
    pub title: String,
    pub category: String,
    pub department: String,
    pub org: String,
    pub revision: String,
    pub status: String,
    pub access_groups: Vec<String>,
    pub publish: bool,
    pub commit: String,
    pub pr_url: String,
    pub repo_url: String,
    pub source_path: String,
    pub format_profile: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl PageProperties {
    pub fn to_json(&self) -> Value {
        let groups: Vec<Value> = self
            .access_groups
            .iter()
            .map(|g| json!({ "name": g }))
            .collect();
        let mut props = Map::new();
        props.insert(
            PROP_TITLE.into(),
            json!({ "title": [{ "type": "text", "text": { "content": self.title } }] }),
        );
        props.insert(PROP_DOC_UID.into(), rich_text_prop(&self.uid));
        props.insert("Category".into(), select_prop(&self.category));
        props.insert("Department".into(), select_prop(&self.department));
        props.insert("Org".into(), select_prop(&self.org));
        props.insert(PROP_REVISION.into(), rich_text_prop(&self.revision));
        props.insert(PROP_STATUS.into(), rich_text_prop(&self.status));
        props.insert("Access Groups".into(), json!({ "multi_select": groups }));
        props.insert("Publish Enabled".into(), json!({ "checkbox": self.publish }));
        props.insert(PROP_COMMIT.into(), rich_text_prop(&self.commit));
        props.insert("Git PR".into(), rich_text_prop(&self.pr_url));
        props.insert("Git Repo".into(), rich_text_prop(&self.repo_url));
        props.insert("Source Path".into(), rich_text_prop(&self.source_path));
        props.insert(
            "Published At".into(),
            json!({ "date": { "start": self.published_at.to_rfc3339() } }),
        );
        if let Some(profile) = self.format_profile.as_deref().filter(|p| !p.is_empty()) {
            props.insert("Format Profile".into(), select_prop(profile));
        }
        Value::Object(props)
    }
}

/// Properties for an archive or redline child page.
pub fn child_page_properties(title: &str) -> Value {
    json!({ "title": { "title": [{ "type": "text", "text": { "content": title } }] } })
}

/// Concatenated text of a rich_text, title or select property.
pub fn property_text(properties: &Value, name: &str) -> String {
    let Some(prop) = properties.get(name) else {
        return String::new();
    };
    for key in ["rich_text", "title"] {
        if let Some(items) = prop.get(key).and_then(Value::as_array) {
            return items.iter().map(|i| decode_span(i).content).collect();
        }
    }
    prop.pointer("/select/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Published state recorded on a canonical page.
pub fn prior_state(page: &RemotePage) -> PriorState {
    let revision = property_text(&page.properties, PROP_REVISION);
    PriorState {
        page_id: page.id.clone(),
        url: page.url.clone(),
        revision: if revision.trim().is_empty() {
            "0.0".to_string()
        } else {
            revision.trim().to_string()
        },
        status: property_text(&page.properties, PROP_STATUS),
        source_commit: property_text(&page.properties, PROP_COMMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reads_rich_text_or_select() {
        let page = RemotePage {
            id: "p1".into(),
            url: None,
            properties: json!({
                "Revision": { "rich_text": [{ "plain_text": "1.2" }] },
                "Status": { "select": { "name": "Released" } },
                "Git Commit SHA": { "rich_text": [] },
            }),
        };
        let prior = prior_state(&page);
        assert_eq!(prior.revision, "1.2");
        assert_eq!(prior.status, "Released");
        assert_eq!(prior.source_commit, "");
    }

    #[test]
    fn missing_revision_defaults_to_initial() {
        let page = RemotePage {
            id: "p1".into(),
            url: None,
            properties: json!({}),
        };
        assert_eq!(prior_state(&page).revision, "0.0");
    }

    #[test]
    fn unknown_block_with_text_degrades_to_paragraph() {
        let callout = json!({
            "type": "callout",
            "callout": { "rich_text": [{ "plain_text": "Heads up", "annotations": { "bold": true } }] }
        });
        let block = decode_block(&callout).unwrap();
        assert_eq!(block.kind(), "paragraph");
        assert!(block.text().unwrap()[0].annotations.bold);

        let child_page = json!({ "type": "child_page", "child_page": { "title": "x" } });
        assert_eq!(decode_block(&child_page), None);
    }

    #[test]
    fn table_encodes_rows_as_children() {
        let block = Block::table(vec![vec![vec![Span::plain("a")], vec![]]], true);
        let value = encode_block(&block);
        assert_eq!(value["type"], "table");
        assert_eq!(value["table"]["table_width"], 2);
        assert_eq!(
            value["table"]["children"][0]["table_row"]["cells"][0][0]["text"]["content"],
            "a"
        );
        assert_eq!(decode_block(&value), Some(block));
    }
}
