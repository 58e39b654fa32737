///
/// This module implements the CLI interface for docctl: command parsing,
/// argument validation and the async entrypoint used by `main` and the
/// integration tests.
///
/// All document logic (conversion, validation, revisions, redlines, uid
/// allocation, publish sequencing) lives in the [`docctl-core`] crate. This
/// module wires it to the environment, the Notion client and git.
///
/// ## Commands
/// - `validate`: check documents and print every error and warning.
/// - `publish --mode draft|release`: validate, assign uids and publish.
///
/// ## Exit status
/// [`run`] returns [`Outcome::Failed`] when validation reports errors or
/// any document ends in an `error` record; `main` maps that to exit code 1.
///
/// [`docctl-core`]: ../../docctl-core/
use crate::git::GitCli;
use crate::load_config::load_config;
use crate::notion::NotionClient;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use docctl_core::document::markdown_files;
use docctl_core::pipeline::{publish_batch, BatchRequest, BatchSummary};
use docctl_core::publish::PublishRecord;
use docctl_core::revision::Intent;
use docctl_core::schema::Schema;
use docctl_core::validate::validate_all;
use std::fs;
use std::path::PathBuf;

/// CLI for docctl: validate and publish controlled documents.
#[derive(Parser)]
#[clap(
    name = "docctl",
    version,
    about = "Validate and publish version-controlled Markdown documents to Notion"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate documents without publishing
    Validate {
        /// Repository root (defaults to GITHUB_WORKSPACE, then the working directory)
        #[clap(long)]
        repo_root: Option<PathBuf>,
        /// Documents to check; every document when empty
        files: Vec<PathBuf>,
    },
    /// Publish documents to the documents database
    Publish {
        /// draft or release
        #[clap(long, value_parser = parse_intent)]
        mode: Intent,
        #[clap(long)]
        repo_root: Option<PathBuf>,
        /// Publish every document instead of the files changed by the commit
        #[clap(long)]
        all: bool,
        /// Write the per-document results as JSON to this file
        #[clap(long)]
        output: Option<PathBuf>,
        files: Vec<PathBuf>,
    },
}

fn parse_intent(value: &str) -> Result<Intent, String> {
    value.parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<Outcome> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Validate { repo_root, files } => {
            let config = load_config(repo_root)?;
            let pipeline = &config.pipeline;
            tracing::info!(command = "validate", "Starting validation");
            let schema = Schema::load(&pipeline.meta_dir)?;
            let paths = (!files.is_empty()).then_some(files);
            let report = validate_all(pipeline, &schema, paths.as_deref());

            for error in &report.errors {
                println!("ERROR: {error}");
            }
            for warning in &report.warnings {
                println!("WARN:  {warning}");
            }
            let verdict = if report.ok() { "passed" } else { "failed" };
            println!(
                "Validation {verdict}: {} errors, {} warnings",
                report.errors.len(),
                report.warnings.len()
            );
            tracing::info!(
                command = "validate",
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                "Validation complete"
            );
            Ok(if report.ok() {
                Outcome::Success
            } else {
                Outcome::Failed
            })
        }
        Commands::Publish {
            mode,
            repo_root,
            all,
            output,
            files,
        } => {
            let config = load_config(repo_root)?;
            let (token, database_id) = config.store_credentials()?;
            let pipeline = &config.pipeline;
            tracing::info!(command = "publish", mode = %mode, "Starting publish run");

            let schema = Schema::load(&pipeline.meta_dir)?;
            let store = NotionClient::new(token, database_id);
            let scm = GitCli::new(&pipeline.repo_root, &pipeline.bot_author, &pipeline.branch);
            let paths = if !files.is_empty() {
                Some(files)
            } else if all {
                Some(markdown_files(&pipeline.docs_dir))
            } else {
                None
            };

            let request = BatchRequest {
                intent: mode,
                paths,
                now: Utc::now(),
            };
            let records = publish_batch(&store, &scm, pipeline, &schema, request).await;
            print_records(&records);

            if let Some(output) = output {
                let json = serde_json::to_string_pretty(&records)
                    .context("Failed to serialise publish results")?;
                fs::write(&output, json).with_context(|| {
                    format!("Failed to write results to {}", output.display())
                })?;
                tracing::info!(path = %output.display(), "Wrote publish results");
            }

            let summary = BatchSummary::from_records(&records);
            println!(
                "Publish {mode} complete: {} published, {} skipped, {} errors",
                summary.published, summary.skipped, summary.errored
            );
            Ok(if summary.has_errors() {
                Outcome::Failed
            } else {
                Outcome::Success
            })
        }
    }
}

fn print_records(records: &[PublishRecord]) {
    for record in records {
        let mut line = format!("[{}] {}", record.status.label(), record.file);
        if let Some(uid) = &record.doc_uid {
            line.push_str(&format!(" ({uid})"));
        }
        match (&record.previous_revision, &record.revision) {
            (Some(prev), Some(next)) => line.push_str(&format!(" v{prev} -> v{next}")),
            (None, Some(rev)) => line.push_str(&format!(" v{rev}")),
            _ => {}
        }
        if let Some(reason) = &record.reason {
            line.push_str(&format!(": {reason}"));
        }
        println!("{line}");
        for error in &record.errors {
            println!("    ERROR: {error}");
        }
    }
}
