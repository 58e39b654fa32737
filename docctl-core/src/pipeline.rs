//! High-level pipeline: validate, assign identifiers and publish a batch of
//! documents, one at a time.
//!
//! # Responsibilities
//! - Ignore runs triggered by the pipeline's own uid write-back commits
//! - Pick the documents to process: an explicit list, or the files the
//!   current commit changed (every document when that cannot be told)
//! - Build the run's [`PageIndex`] once, before the first document
//! - Per document: validate, allocate and commit a uid when needed, then
//!   [`publish_document`]
//!
//! # Error Handling
//! A document that fails anywhere becomes an `error` record and the batch
//! moves on to the next one. Nothing here returns early on a single
//! document's failure.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::contract::{PageStore, SourceControl};
use crate::document::{load_all, Document};
use crate::error::Result;
use crate::links::PageIndex;
use crate::publish::{publish_document, PublishContext, PublishRecord, PublishStatus};
use crate::revision::Intent;
use crate::schema::Schema;
use crate::uid::assign_uid;
use crate::validate::validate_doc;

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub intent: Intent,
    /// Documents to publish. `None` means the files changed by the current
    /// commit.
    pub paths: Option<Vec<PathBuf>>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub published: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl BatchSummary {
    pub fn from_records(records: &[PublishRecord]) -> Self {
        let mut summary = BatchSummary::default();
        for record in records {
            match record.status {
                s if s.is_published() => summary.published += 1,
                s if s.is_skipped() => summary.skipped += 1,
                _ => summary.errored += 1,
            }
        }
        summary
    }

    pub fn has_errors(&self) -> bool {
        self.errored > 0
    }
}

/// Markdown files under the docs dir touched by the current commit, or
/// every document when detection fails or finds none.
pub async fn changed_docs<C>(scm: &C, config: &PipelineConfig) -> Vec<PathBuf>
where
    C: SourceControl + ?Sized,
{
    match scm.changed_files().await {
        Ok(files) => {
            let changed: Vec<PathBuf> = files
                .iter()
                .map(|f| config.resolve(f))
                .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
                .filter(|p| p.is_file() && p.starts_with(&config.docs_dir))
                .collect();
            if !changed.is_empty() {
                info!(count = changed.len(), "[PIPELINE] Detected changed documents");
                return changed;
            }
            info!("[PIPELINE] No changed documents detected, falling back to all documents");
        }
        Err(e) => warn!(error = %e, "[PIPELINE] Changed-file detection failed, falling back to all documents"),
    }
    load_all(&config.docs_dir)
        .into_iter()
        .map(|d| d.path)
        .collect()
}

pub async fn publish_batch<S, C>(
    store: &S,
    scm: &C,
    config: &PipelineConfig,
    schema: &Schema,
    request: BatchRequest,
) -> Vec<PublishRecord>
where
    S: PageStore + ?Sized,
    C: SourceControl + ?Sized,
{
    info!(mode = %request.intent, "[PIPELINE] Starting publish run");

    if config.is_bot_actor() {
        info!(actor = %config.actor, "[PIPELINE] Commit by bot account, skipping run");
        return vec![PublishRecord::skipped("", None, "bot commit")];
    }

    let paths = match request.paths {
        Some(paths) => paths.iter().map(|p| config.resolve(p)).collect(),
        None => changed_docs(scm, config).await,
    };
    if paths.is_empty() {
        info!("[PIPELINE] No documents to publish");
        return Vec::new();
    }

    let all_docs = load_all(&config.docs_dir);
    let pages = PageIndex::build(store, &all_docs).await;
    let ctx = PublishContext {
        config,
        intent: request.intent,
        pages: &pages,
        now: request.now,
    };

    let mut records = Vec::with_capacity(paths.len());
    for path in &paths {
        let record = match publish_path(store, scm, &ctx, schema, &all_docs, path).await {
            Ok(record) => record,
            Err(e) => {
                error!(path = %path.display(), error = %e, "[PIPELINE] Failed to publish document");
                PublishRecord::error(file_name(path), None, e.to_string())
            }
        };
        records.push(record);
    }

    let summary = BatchSummary::from_records(&records);
    info!(
        published = summary.published,
        skipped = summary.skipped,
        errored = summary.errored,
        "[PIPELINE] Publish run complete"
    );
    records
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn publish_path<S, C>(
    store: &S,
    scm: &C,
    ctx: &PublishContext<'_>,
    schema: &Schema,
    all_docs: &[Document],
    path: &Path,
) -> Result<PublishRecord>
where
    S: PageStore + ?Sized,
    C: SourceControl + ?Sized,
{
    let mut doc = Document::load(path)?;

    let report = validate_doc(&doc, all_docs, schema);
    for warning in &report.warnings {
        warn!(path = %path.display(), warning = %warning, "[VALIDATE] Warning");
    }
    if !report.ok() {
        error!(path = %path.display(), errors = ?report.errors, "[VALIDATE] Validation failed");
        return Ok(PublishRecord {
            errors: report.errors,
            ..PublishRecord::new(
                doc.file_name(),
                doc.doc_uid().map(str::to_string),
                PublishStatus::Error,
            )
        });
    }

    let mut auto_assigned = false;
    if doc.needs_auto_uid() {
        let uid = assign_uid(store, &doc, &ctx.config.docs_dir).await?;
        scm.commit_uid_assignment(&doc.relative_path(&ctx.config.repo_root), &uid)
            .await?;
        doc = Document::load(path)?;
        auto_assigned = true;
    }
    let Some(uid) = doc.assigned_uid().map(str::to_string) else {
        return Ok(PublishRecord::error(
            doc.file_name(),
            None,
            "document has no doc_uid",
        ));
    };

    let mut record = publish_document(store, ctx, &doc, &uid).await?;
    record.auto_assigned = auto_assigned;
    Ok(record)
}
