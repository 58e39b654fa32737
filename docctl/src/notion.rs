#![doc = "Notion-backed page store: implements the core `PageStore` contract over the Notion REST API."]
//
//! # Page store integration (CLI <-> Core)
//!
//! [`NotionClient`] is the only place that speaks HTTP. It maps the
//! [`PageStore`] operations onto Notion endpoints, follows pagination
//! cursors to the end, and turns transport/status failures into
//! [`StoreError`]s for the core pipeline to record.
//!
//! - Authentication is a bearer integration token plus a pinned
//!   `Notion-Version` header.
//! - `list_children` returns tables with their rows and list items with
//!   their nested items, so that archives and redlines see the full
//!   content.
//! - Request batching and throttling live in `docctl_core::store`; this
//!   client sends exactly what it is given.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use docctl_core::blocks::Block;
use docctl_core::contract::{PageParent, PageStore, RemotePage, StoreError, StoredBlock};
use docctl_core::wire::{decode_block, encode_blocks, property_text, PROP_DOC_UID};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: usize = 100;

/// Block types whose children are part of the block's own content.
const EXPANDED_TYPES: [&str; 3] = ["table", "bulleted_list_item", "numbered_list_item"];

pub struct NotionClient {
    http: Client,
    token: String,
    database_id: String,
    base_url: String,
}

impl NotionClient {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        let database_id = database_id.into();
        tracing::info!(database_id = %database_id, "Initialized NotionClient");
        NotionClient {
            http: Client::new(),
            token: token.into(),
            database_id,
            base_url: NOTION_API_BASE.to_string(),
        }
    }

    /// Points the client at another API root, e.g. a local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = ?e, "[STORE] Request failed to send");
            StoreError::Transport(e.to_string())
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(status = %status, body = %body, "[STORE] Notion API returned error");
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }
        response.json::<Value>().await.map_err(|e| {
            tracing::error!(error = ?e, "[STORE] Failed to parse Notion response JSON");
            StoreError::Decode(e.to_string())
        })
    }

    /// Runs a database query, following `next_cursor` until exhausted.
    async fn query_all(&self, filter: Value) -> Result<Vec<Value>, StoreError> {
        let path = format!("/databases/{}/query", self.database_id);
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "filter": filter, "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let page = self.send(self.request(Method::POST, &path).json(&body)).await?;
            results.extend(
                page.get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            );
            match next_cursor(&page) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(results)
    }

    /// Raw child block objects of `block_id`, one level deep.
    async fn fetch_children(&self, block_id: &str) -> Result<Vec<Value>, StoreError> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut path = format!("/blocks/{block_id}/children?page_size={PAGE_SIZE}");
            if let Some(cursor) = &cursor {
                path.push_str(&format!("&start_cursor={cursor}"));
            }
            let page = self.send(self.request(Method::GET, &path)).await?;
            results.extend(
                page.get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            );
            match next_cursor(&page) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(results)
    }

    /// Like [`Self::fetch_children`], with the children of tables and list
    /// items attached under `<type>.children`.
    fn fetch_tree<'a>(
        &'a self,
        block_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Value>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut blocks = self.fetch_children(block_id).await?;
            for block in &mut blocks {
                let has_children = block
                    .get("has_children")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let kind = block
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if !has_children || !EXPANDED_TYPES.contains(&kind.as_str()) {
                    continue;
                }
                let Some(id) = block.get("id").and_then(Value::as_str).map(str::to_string) else {
                    continue;
                };
                let children = self.fetch_tree(&id).await?;
                if let Some(body) = block.get_mut(&kind).and_then(Value::as_object_mut) {
                    body.insert("children".into(), Value::Array(children));
                }
            }
            Ok(blocks)
        })
    }
}

fn next_cursor(page: &Value) -> Option<String> {
    if !page.get("has_more").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    page.get("next_cursor")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn remote_page(value: &Value) -> Result<RemotePage, StoreError> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("page object without id".to_string()))?;
    Ok(RemotePage {
        id: id.to_string(),
        url: value.get("url").and_then(Value::as_str).map(str::to_string),
        properties: value.get("properties").cloned().unwrap_or(Value::Null),
    })
}

#[async_trait]
impl PageStore for NotionClient {
    async fn query_page_by_uid(&self, uid: &str) -> Result<Option<RemotePage>, StoreError> {
        tracing::debug!(doc_uid = uid, "[STORE] Querying canonical page");
        let filter = json!({ "property": PROP_DOC_UID, "rich_text": { "equals": uid } });
        let path = format!("/databases/{}/query", self.database_id);
        let body = json!({ "filter": filter, "page_size": 1 });
        let page = self.send(self.request(Method::POST, &path).json(&body)).await?;
        match page
            .get("results")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
        {
            Some(first) => remote_page(first).map(Some),
            None => Ok(None),
        }
    }

    async fn query_uids_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let filter = json!({ "property": PROP_DOC_UID, "rich_text": { "starts_with": prefix } });
        let pages = self.query_all(filter).await?;
        let uids: Vec<String> = pages
            .iter()
            .filter_map(|p| p.get("properties"))
            .map(|props| property_text(props, PROP_DOC_UID))
            .filter(|uid| !uid.is_empty())
            .collect();
        tracing::info!(prefix, count = uids.len(), "[STORE] Fetched uids by prefix");
        Ok(uids)
    }

    async fn list_children(&self, page_id: &str) -> Result<Vec<StoredBlock>, StoreError> {
        let raw = self.fetch_tree(page_id).await?;
        let blocks: Vec<StoredBlock> = raw
            .iter()
            .filter_map(|value| {
                let id = value.get("id").and_then(Value::as_str)?;
                decode_block(value).map(|block| StoredBlock {
                    id: id.to_string(),
                    block,
                })
            })
            .collect();
        tracing::debug!(
            page_id,
            fetched = raw.len(),
            decoded = blocks.len(),
            "[STORE] Listed page children"
        );
        Ok(blocks)
    }

    async fn append_children(&self, parent_id: &str, blocks: &[Block]) -> Result<(), StoreError> {
        let body = json!({ "children": encode_blocks(blocks) });
        self.send(
            self.request(Method::PATCH, &format!("/blocks/{parent_id}/children"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_block(&self, block_id: &str) -> Result<(), StoreError> {
        self.send(self.request(Method::DELETE, &format!("/blocks/{block_id}")))
            .await?;
        Ok(())
    }

    async fn create_page(
        &self,
        parent: PageParent,
        properties: Value,
        children: &[Block],
    ) -> Result<RemotePage, StoreError> {
        let parent = match parent {
            PageParent::Database(id) => json!({ "database_id": id }),
            PageParent::Page(id) => json!({ "page_id": id }),
        };
        let body = json!({
            "parent": parent,
            "properties": properties,
            "children": encode_blocks(children),
        });
        let created = self
            .send(self.request(Method::POST, "/pages").json(&body))
            .await?;
        remote_page(&created)
    }

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: Value,
    ) -> Result<(), StoreError> {
        let body = json!({ "properties": properties });
        self.send(
            self.request(Method::PATCH, &format!("/pages/{page_id}"))
                .json(&body),
        )
        .await?;
        tracing::info!(page_id, "[STORE] Updated page properties");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (base_url, handle)
    }

    fn local_client(base_url: impl Into<String>) -> NotionClient {
        NotionClient {
            http: Client::builder().no_proxy().build().unwrap(),
            ..NotionClient::new("secret-token", "db-1").with_base_url(base_url)
        }
    }

    #[tokio::test]
    async fn query_by_uid_sends_filter_with_auth_headers() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"results":[{"id":"page-7","url":"https://www.notion.so/page-7","properties":{}}],"has_more":false}"#,
        )
        .await;
        let client = local_client(format!("{base_url}/"));

        let page = client.query_page_by_uid("MOS-ENG-SOP-007").await.unwrap();
        assert_eq!(page.map(|p| p.id).as_deref(), Some("page-7"));

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /databases/db-1/query "), "{request}");
        assert!(lower.contains("authorization: bearer secret-token"));
        assert!(lower.contains(&format!("notion-version: {NOTION_VERSION}")));
        assert!(request.contains(r#""equals":"MOS-ENG-SOP-007""#));
    }

    #[tokio::test]
    async fn error_status_keeps_response_body() {
        let (base_url, server) =
            serve_once("400 Bad Request", r#"{"code":"validation_error"}"#).await;
        let client = local_client(base_url);

        match client.delete_block("block-1").await {
            Err(StoreError::Http { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("validation_error"));
            }
            other => panic!("expected an HTTP error, got {other:?}"),
        }
        assert!(server.await.unwrap().starts_with("DELETE /blocks/block-1 "));
    }

    #[test]
    fn cursor_only_followed_while_has_more() {
        assert_eq!(
            next_cursor(&json!({ "has_more": true, "next_cursor": "c2" })),
            Some("c2".to_string())
        );
        assert_eq!(
            next_cursor(&json!({ "has_more": false, "next_cursor": "c2" })),
            None
        );
        assert_eq!(next_cursor(&json!({})), None);
    }

    #[test]
    fn page_object_maps_to_remote_page() {
        let page = remote_page(&json!({
            "id": "p-1",
            "url": "https://www.notion.so/p-1",
            "properties": { "Revision": { "rich_text": [] } }
        }))
        .unwrap();
        assert_eq!(page.id, "p-1");
        assert_eq!(page.url.as_deref(), Some("https://www.notion.so/p-1"));
        assert!(page.properties.get("Revision").is_some());

        assert!(matches!(
            remote_page(&json!({ "object": "error" })),
            Err(StoreError::Decode(_))
        ));
    }
}
