//! # contract: interfaces to the page store and source control
//!
//! docctl-core never talks HTTP or shells out to git itself. Everything it
//! needs from the outside world goes through the two traits here:
//!
//! - [`PageStore`]: the structured-content database holding canonical,
//!   archive and redline pages.
//! - [`SourceControl`]: changed-file detection and committing uid
//!   write-backs.
//!
//! The `docctl` binary crate provides the real implementations. With the
//! default `test-export-mocks` feature, `mockall` generates `MockPageStore`
//! and `MockSourceControl` for tests in this and dependent crates.
//!
//! ## Batching
//! `append_children` and `create_page` accept at most
//! [`MAX_BLOCKS_PER_REQUEST`](crate::blocks::MAX_BLOCKS_PER_REQUEST) blocks
//! per call. Callers go through [`crate::store`], which chunks and throttles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use thiserror::Error;

use crate::blocks::Block;

/// A page as returned by a store query. `properties` is the store's raw
/// property map; [`crate::wire`] knows how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePage {
    pub id: String,
    pub url: Option<String>,
    pub properties: serde_json::Value,
}

/// A child block read back from a page, with the id needed to delete it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlock {
    pub id: String,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageParent {
    Database(String),
    Page(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("could not decode store response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ScmError {
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PageStore: Send + Sync {
    /// The canonical page whose Doc UID property equals `uid`, if any.
    async fn query_page_by_uid(&self, uid: &str) -> Result<Option<RemotePage>, StoreError>;

    /// Every Doc UID in the database starting with `prefix`. Implementations
    /// follow pagination to the end.
    async fn query_uids_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Top-level children of a page in order. Tables come back with rows.
    async fn list_children(&self, page_id: &str) -> Result<Vec<StoredBlock>, StoreError>;

    async fn append_children(&self, parent_id: &str, blocks: &[Block]) -> Result<(), StoreError>;

    async fn delete_block(&self, block_id: &str) -> Result<(), StoreError>;

    async fn create_page(
        &self,
        parent: PageParent,
        properties: serde_json::Value,
        children: &[Block],
    ) -> Result<RemotePage, StoreError>;

    async fn update_page_properties(
        &self,
        page_id: &str,
        properties: serde_json::Value,
    ) -> Result<(), StoreError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Files touched by the commit being published, relative to the repo root.
    async fn changed_files(&self) -> Result<Vec<PathBuf>, ScmError>;

    /// Commits and pushes the uid write-back for one document.
    async fn commit_uid_assignment(&self, path: &Path, uid: &str) -> Result<(), ScmError>;
}
