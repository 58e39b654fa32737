//! # publish: one document, one canonical page
//!
//! [`publish_document`] drives a single document through the revision
//! decision and, when it publishes, the store writes:
//!
//! **First publish**: one-row history table, content and footer go out in
//! a single page creation.
//!
//! **Update**, in this order:
//! 1. read the canonical page's current content
//! 2. archive it verbatim as a child page titled with the current revision
//! 3. if the page had a real revision, build a redline child page
//! 4. point the previous head row's archive cell at the new archive
//! 5. prepend the new head row (redline link, no archive link)
//! 6. replace the canonical content with table + content + footer
//! 7. write the page properties
//!
//! Nothing is rolled back. A failure part-way leaves whatever was already
//! written; the caller records it as an error for this document.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::blocks::Block;
use crate::config::PipelineConfig;
use crate::contract::{PageParent, PageStore};
use crate::convert::{markdown_to_blocks, ConvertOptions};
use crate::diff::{build_redline_blocks, RedlineInput};
use crate::document::Document;
use crate::error::Result;
use crate::links::PageIndex;
use crate::page::{
    archive_title, blocks_to_plain_text, content_region, existing_history_rows, footer_blocks,
    history_table, redline_title, set_archive_link, HistoryRow, PageLink,
};
use crate::revision::{decide, skip_reason, Decision, Intent, PriorState};
use crate::store::{create_page_with_content, replace_page_content};
use crate::wire::{child_page_properties, prior_state, PageProperties};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStatus {
    Created,
    Updated,
    Skipped,
    NoOp,
    Error,
}

impl PublishStatus {
    /// Same spelling as the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            PublishStatus::Created => "created",
            PublishStatus::Updated => "updated",
            PublishStatus::Skipped => "skipped",
            PublishStatus::NoOp => "no-op",
            PublishStatus::Error => "error",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishStatus::Created | PublishStatus::Updated)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PublishStatus::Skipped | PublishStatus::NoOp)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome of one document in a run; serialized into the results file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRecord {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_uid: Option<String>,
    pub status: PublishStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redline_page_id: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_assigned: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl PublishRecord {
    pub fn new(file: impl Into<String>, doc_uid: Option<String>, status: PublishStatus) -> Self {
        PublishRecord {
            file: file.into(),
            doc_uid,
            status,
            reason: None,
            revision: None,
            previous_revision: None,
            page_id: None,
            page_url: None,
            archive_page_id: None,
            redline_page_id: None,
            auto_assigned: false,
            errors: Vec::new(),
        }
    }

    pub fn skipped(
        file: impl Into<String>,
        doc_uid: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        PublishRecord {
            reason: Some(reason.into()),
            ..PublishRecord::new(file, doc_uid, PublishStatus::Skipped)
        }
    }

    pub fn error(
        file: impl Into<String>,
        doc_uid: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        PublishRecord {
            reason: Some(reason.into()),
            ..PublishRecord::new(file, doc_uid, PublishStatus::Error)
        }
    }
}

/// Run-wide inputs shared by every document.
#[derive(Debug, Clone, Copy)]
pub struct PublishContext<'a> {
    pub config: &'a PipelineConfig,
    pub intent: Intent,
    pub pages: &'a PageIndex,
    pub now: DateTime<Utc>,
}

impl PublishContext<'_> {
    fn today(&self) -> String {
        self.now.format("%Y-%m-%d").to_string()
    }

    fn footer(&self) -> Vec<Block> {
        footer_blocks(&self.config.commit_sha, self.config.pr_url(), self.now)
    }

    fn properties(&self, doc: &Document, uid: &str, revision: &str) -> PageProperties {
        let source_path = doc
            .relative_path(&self.config.repo_root)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        PageProperties {
            uid: uid.to_string(),
            title: doc.title().to_string(),
            category: doc.category().to_string(),
            department: doc.department().to_string(),
            org: doc.org().to_string(),
            revision: revision.to_string(),
            status: self.intent.status_label().to_string(),
            access_groups: doc.access_groups(),
            publish: true,
            commit: self.config.commit_sha.clone(),
            pr_url: self.config.pr_url.clone(),
            repo_url: self.config.repo_url(),
            source_path,
            format_profile: doc.format_profile().map(str::to_string),
            published_at: self.now,
        }
    }
}

/// Publishes `doc` under `uid` according to the run's intent.
pub async fn publish_document<S>(
    store: &S,
    ctx: &PublishContext<'_>,
    doc: &Document,
    uid: &str,
) -> Result<PublishRecord>
where
    S: PageStore + ?Sized,
{
    let file = doc.file_name();
    if let Some(reason) = skip_reason(doc.publish(), doc.desired_state(), ctx.intent) {
        debug!(doc_uid = uid, %reason, "[PUBLISH] Skipping document");
        return Ok(PublishRecord::skipped(file, Some(uid.to_string()), reason));
    }

    let prior = store.query_page_by_uid(uid).await?.as_ref().map(prior_state);
    let commit = ctx.config.commit_sha.as_str();
    let decision = decide(doc.publish(), doc.desired_state(), ctx.intent, prior, commit);

    match decision {
        Decision::Skip { reason } => Ok(PublishRecord::skipped(file, Some(uid.to_string()), reason)),
        Decision::NoOp { revision } => {
            info!(
                doc_uid = uid,
                revision = %revision,
                commit = %commit,
                "[PUBLISH] Already published at this revision and commit, skipping"
            );
            Ok(PublishRecord {
                reason: Some("already published at this revision and commit".to_string()),
                revision: Some(revision),
                ..PublishRecord::new(file, Some(uid.to_string()), PublishStatus::NoOp)
            })
        }
        Decision::Create { next } => create(store, ctx, doc, uid, &next).await,
        Decision::Update { prior, next } => update(store, ctx, doc, uid, prior, &next).await,
    }
}

fn content_blocks(ctx: &PublishContext<'_>, doc: &Document) -> Vec<Block> {
    let raw_base = ctx.config.raw_content_base_url();
    let options = ConvertOptions {
        doc_path: &doc.path,
        repo_root: &ctx.config.repo_root,
        raw_url_base: raw_base.as_deref(),
        pages: Some(ctx.pages),
    };
    markdown_to_blocks(&doc.body, &options)
}

async fn create<S>(
    store: &S,
    ctx: &PublishContext<'_>,
    doc: &Document,
    uid: &str,
    next: &str,
) -> Result<PublishRecord>
where
    S: PageStore + ?Sized,
{
    info!(doc_uid = uid, revision = next, "[PUBLISH] First publish, creating canonical page");
    let row = HistoryRow {
        revision: next.to_string(),
        status: ctx.intent.status_label().to_string(),
        date: ctx.today(),
        redline: None,
        archive: None,
    };
    let mut blocks = vec![history_table(vec![row.cells()])];
    blocks.extend(content_blocks(ctx, doc));
    blocks.extend(ctx.footer());

    let properties = ctx.properties(doc, uid, next).to_json();
    let page = create_page_with_content(
        store,
        PageParent::Database(ctx.config.database_id.clone()),
        properties,
        &blocks,
        ctx.config.batch_delay,
    )
    .await?;

    info!(doc_uid = uid, page_id = %page.id, revision = next, "[PUBLISH] Created canonical page");
    Ok(PublishRecord {
        revision: Some(next.to_string()),
        page_id: Some(page.id),
        page_url: page.url,
        ..PublishRecord::new(doc.file_name(), Some(uid.to_string()), PublishStatus::Created)
    })
}

async fn update<S>(
    store: &S,
    ctx: &PublishContext<'_>,
    doc: &Document,
    uid: &str,
    prior: PriorState,
    next: &str,
) -> Result<PublishRecord>
where
    S: PageStore + ?Sized,
{
    let page_id = prior.page_id.as_str();
    let current_rev = prior.revision.as_str();
    let delay = ctx.config.batch_delay;
    info!(
        doc_uid = uid,
        page_id,
        from = current_rev,
        to = next,
        status = ctx.intent.status_label(),
        "[PUBLISH] Updating canonical page"
    );

    let current: Vec<Block> = store
        .list_children(page_id)
        .await?
        .into_iter()
        .map(|stored| stored.block)
        .collect();
    let mut history = existing_history_rows(&current);

    let archive = create_page_with_content(
        store,
        PageParent::Page(page_id.to_string()),
        child_page_properties(&archive_title(uid, current_rev)),
        &current,
        delay,
    )
    .await?;
    info!(doc_uid = uid, revision = current_rev, archive_page_id = %archive.id, "[PUBLISH] Archived previous revision");

    let new_content = content_blocks(ctx, doc);

    let mut redline_page_id = None;
    if current_rev != "0.0" {
        let old_text = blocks_to_plain_text(content_region(&current));
        let new_text = blocks_to_plain_text(&new_content);
        let (redline_blocks, stats) = build_redline_blocks(&RedlineInput {
            uid,
            prev_revision: current_rev,
            next_revision: next,
            old_text: &old_text,
            new_text: &new_text,
            commit: &ctx.config.commit_sha,
            pr_url: ctx.config.pr_url(),
            generated_at: ctx.now,
        });
        let redline = create_page_with_content(
            store,
            PageParent::Page(page_id.to_string()),
            child_page_properties(&redline_title(uid, current_rev, next)),
            &redline_blocks,
            delay,
        )
        .await?;
        info!(
            doc_uid = uid,
            redline_page_id = %redline.id,
            added = stats.added,
            removed = stats.removed,
            changed = stats.changed,
            "[PUBLISH] Created redline"
        );
        redline_page_id = Some(redline.id);
    }

    if let Some(head) = history.first_mut() {
        set_archive_link(head, &PageLink::new(format!("v{current_rev}"), &archive.id));
    }
    let row = HistoryRow {
        revision: next.to_string(),
        status: ctx.intent.status_label().to_string(),
        date: ctx.today(),
        redline: redline_page_id
            .as_ref()
            .map(|id| PageLink::new(format!("v{current_rev} \u{2192} v{next}"), id)),
        archive: None,
    };
    history.insert(0, row.cells());

    let mut blocks = vec![history_table(history)];
    blocks.extend(new_content);
    blocks.extend(ctx.footer());
    replace_page_content(store, page_id, &blocks, delay).await?;

    let properties = ctx.properties(doc, uid, next).to_json();
    store.update_page_properties(page_id, properties).await?;

    info!(doc_uid = uid, revision = next, "[PUBLISH] Updated canonical page");
    Ok(PublishRecord {
        revision: Some(next.to_string()),
        previous_revision: Some(prior.revision.clone()),
        page_id: Some(prior.page_id.clone()),
        page_url: prior.url.clone(),
        archive_page_id: Some(archive.id),
        redline_page_id,
        ..PublishRecord::new(doc.file_name(), Some(uid.to_string()), PublishStatus::Updated)
    })
}
