//! Batched writes on top of [`PageStore`].
//!
//! The store caps every create/append request at
//! [`MAX_BLOCKS_PER_REQUEST`] blocks and rate-limits bursts, so longer
//! content is sent in chunks with a fixed pause between consecutive
//! requests.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::blocks::{Block, MAX_BLOCKS_PER_REQUEST};
use crate::contract::{PageParent, PageStore, RemotePage, StoreError};

/// Appends `blocks` under `parent_id`, at most one full chunk per request,
/// sleeping `delay` between requests.
pub async fn append_blocks<S>(
    store: &S,
    parent_id: &str,
    blocks: &[Block],
    delay: Duration,
) -> Result<(), StoreError>
where
    S: PageStore + ?Sized,
{
    for (i, chunk) in blocks.chunks(MAX_BLOCKS_PER_REQUEST).enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        debug!(
            parent_id,
            batch = i,
            blocks = chunk.len(),
            "[STORE] Appending block batch"
        );
        store.append_children(parent_id, chunk).await?;
    }
    Ok(())
}

/// Creates a page carrying the first chunk of `blocks` inline and appends
/// the remainder.
pub async fn create_page_with_content<S>(
    store: &S,
    parent: PageParent,
    properties: serde_json::Value,
    blocks: &[Block],
    delay: Duration,
) -> Result<RemotePage, StoreError>
where
    S: PageStore + ?Sized,
{
    let split = blocks.len().min(MAX_BLOCKS_PER_REQUEST);
    let (initial, rest) = blocks.split_at(split);
    let page = store.create_page(parent, properties, initial).await?;
    info!(page_id = %page.id, blocks = blocks.len(), "[STORE] Created page");
    if !rest.is_empty() {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        append_blocks(store, &page.id, rest, delay).await?;
    }
    Ok(page)
}

/// Deletes every existing child of `page_id` and appends `blocks`.
///
/// A child that fails to delete is logged and left in place; the rest of
/// the replacement still goes ahead.
pub async fn replace_page_content<S>(
    store: &S,
    page_id: &str,
    blocks: &[Block],
    delay: Duration,
) -> Result<(), StoreError>
where
    S: PageStore + ?Sized,
{
    let existing = store.list_children(page_id).await?;
    let mut failed = 0usize;
    for child in &existing {
        if let Err(e) = store.delete_block(&child.id).await {
            failed += 1;
            warn!(page_id, block_id = %child.id, error = %e, "[STORE] Failed to delete block, skipping");
        }
    }
    info!(
        page_id,
        deleted = existing.len() - failed,
        failed,
        "[STORE] Cleared page content"
    );
    append_blocks(store, page_id, blocks, delay).await
}
