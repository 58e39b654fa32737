//! # validate: gate documents before publishing
//!
//! Findings are collected, never raised. Errors block publishing of the
//! document they belong to; warnings are reported and otherwise ignored.
//!
//! Checks per document:
//! - frontmatter: required fields, uid format, enum membership, the
//!   `notion`/`lifecycle` blocks, computed fields that must not appear in
//!   source, uid prefix matching org/department/category
//! - links and images in the body (fenced code excluded)
//! - required headings of the declared format profile
//!
//! Checks per batch: duplicate uids, images nobody references.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::document::{load_all, Document, AUTO_UID};
use crate::links::{is_external, normalize_path};
use crate::schema::Schema;

static UID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2,4}-[A-Z]{2,4}-[A-Z]{2,4}-\d{3,}$").expect("uid pattern is valid")
});
static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").expect("link pattern is valid"));
static MD_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("image pattern is valid"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").expect("heading pattern is valid"));
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^```[^\n]*\n.*?^```").expect("code fence pattern is valid")
});

const COMPUTED_FIELDS: [&str; 6] = [
    "revision",
    "status",
    "git_commit",
    "git_pr",
    "published_at",
    "notion_page_id",
];
const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp"];
const ORPHAN_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "svg", "webp"];

pub fn is_valid_uid(uid: &str) -> bool {
    UID_PATTERN.is_match(uid)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

fn strip_code_blocks(body: &str) -> String {
    CODE_FENCE.replace_all(body, "").into_owned()
}

fn check_enum(
    report: &mut ValidationReport,
    name: &str,
    field: &str,
    value: &str,
    allowed: &BTreeSet<String>,
) {
    if !value.is_empty() && !allowed.contains(value) {
        let expected: Vec<&str> = allowed.iter().map(String::as_str).collect();
        report.error(format!(
            "{name}: invalid {field} '{value}' (expected one of {expected:?})"
        ));
    }
}

pub fn validate_frontmatter(doc: &Document, schema: &Schema) -> ValidationReport {
    let mut report = ValidationReport::default();
    let name = doc.file_name();

    for key in ["title", "org", "category", "department"] {
        if doc.str_field(key).is_none() {
            report.error(format!("{name}: missing required field '{key}'"));
        }
    }

    let uid = doc.doc_uid();
    match uid {
        None => report.error(format!("{name}: missing required field 'doc_uid'")),
        Some(uid) if uid != AUTO_UID && !is_valid_uid(uid) => report.error(format!(
            "{name}: invalid doc_uid '{uid}' (expected ORG-DEP-CAT-NNN or 'auto')"
        )),
        _ => {}
    }

    check_enum(&mut report, &name, "org", doc.org(), &schema.orgs);
    check_enum(&mut report, &name, "category", doc.category(), &schema.categories);
    check_enum(&mut report, &name, "department", doc.department(), &schema.departments);

    match doc.get("notion").and_then(Value::as_mapping) {
        None => report.error(format!("{name}: missing 'notion' block")),
        Some(notion) => {
            if !notion.contains_key("publish") {
                report.error(format!("{name}: missing 'notion.publish'"));
            }
            if doc.database().is_empty() {
                report.error(format!("{name}: missing 'notion.database'"));
            }
        }
    }

    match doc.get("lifecycle").and_then(Value::as_mapping) {
        None => report.error(format!("{name}: missing 'lifecycle' block")),
        Some(lifecycle) => match lifecycle.get("desired_state").and_then(Value::as_str) {
            None | Some("") => report.error(format!("{name}: missing 'lifecycle.desired_state'")),
            Some(state) => {
                check_enum(&mut report, &name, "desired_state", state, &schema.desired_states)
            }
        },
    }

    match doc.get("access_groups") {
        None => report.error(format!("{name}: missing 'access_groups'")),
        Some(groups) if !groups.is_sequence() => {
            report.error(format!("{name}: 'access_groups' must be a list"))
        }
        _ => {}
    }

    for field in COMPUTED_FIELDS {
        if doc.metadata.contains_key(field) {
            report.error(format!(
                "{name}: '{field}' is a computed field and must not appear in source frontmatter"
            ));
        }
    }

    if let Some(uid) = uid.filter(|u| is_valid_uid(u)) {
        let parts: Vec<&str> = uid.split('-').collect();
        let expected = [
            ("org", doc.org()),
            ("department", doc.department()),
            ("category", doc.category()),
        ];
        for ((field, value), part) in expected.iter().zip(parts.iter()) {
            if !value.is_empty() && part != value {
                report.error(format!(
                    "{name}: doc_uid {field} '{part}' doesn't match frontmatter {field} '{value}'"
                ));
            }
        }
    }

    let category = doc.category();
    let folder = doc
        .path
        .parent()
        .and_then(Path::file_name)
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !category.is_empty() && folder != category {
        report.warn(format!(
            "{name}: file is in folder '{folder}' but category is '{category}', expected folder '{category}/'"
        ));
    }

    report
}

fn resolve_relative(doc: &Document, target: &str) -> PathBuf {
    let dir = doc.path.parent().unwrap_or_else(|| Path::new(""));
    normalize_path(&dir.join(target))
}

pub fn validate_links(doc: &Document, all_docs: &[Document]) -> ValidationReport {
    let mut report = ValidationReport::default();
    let name = doc.file_name();
    let uid_by_path: HashMap<PathBuf, Option<&str>> = all_docs
        .iter()
        .map(|d| (normalize_path(&d.path), d.assigned_uid()))
        .collect();

    let body = strip_code_blocks(&doc.body);
    for caps in MD_LINK.captures_iter(&body) {
        let (Some(whole), Some(text), Some(target)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if body[..whole.start()].ends_with('!') {
            continue;
        }
        let (text, target) = (text.as_str(), target.as_str());

        if target.ends_with(".md") && !target.starts_with("http") {
            let resolved = resolve_relative(doc, target);
            if !resolved.exists() {
                report.error(format!(
                    "{name}: broken internal link [{text}]({target}), target file does not exist"
                ));
            } else if let Some(None) = uid_by_path.get(&resolved) {
                report.warn(format!(
                    "{name}: internal link [{text}]({target}) points to a doc without an assigned doc_uid"
                ));
            }
            continue;
        }
        if target.contains("notion.so") || target.contains("notion.site") {
            report.warn(format!(
                "{name}: Notion URL found [{text}]({target}), link to the source document instead"
            ));
            continue;
        }
        if is_external(target) || target.starts_with('#') {
            continue;
        }
        report.warn(format!("{name}: unrecognized link target: {target}"));
    }
    report
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub fn validate_images(doc: &Document) -> ValidationReport {
    let mut report = ValidationReport::default();
    let name = doc.file_name();
    let body = strip_code_blocks(&doc.body);
    for caps in MD_IMAGE.captures_iter(&body) {
        let (Some(alt), Some(src)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let (alt, src) = (alt.as_str(), src.as_str());
        if is_external(src) {
            continue;
        }
        let resolved = resolve_relative(doc, src);
        if !resolved.exists() {
            report.error(format!(
                "{name}: broken image reference ![{alt}]({src}), file does not exist"
            ));
            continue;
        }
        let ext = extension_of(&resolved).unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            report.warn(format!("{name}: unusual image extension: .{ext}"));
        }
    }
    report
}

pub fn validate_format_profile(doc: &Document, schema: &Schema) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(profile) = doc.format_profile() else {
        return report;
    };
    let name = doc.file_name();
    let Some(required) = schema.format_profiles.get(profile) else {
        report.warn(format!(
            "{name}: unknown format_profile '{profile}', skipping section checks"
        ));
        return report;
    };
    let headings: HashSet<String> = HEADING
        .captures_iter(&doc.body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .collect();
    for section in required {
        if !headings.contains(&section.to_lowercase()) {
            report.error(format!(
                "{name}: format profile '{profile}' requires section '{section}' but it was not found"
            ));
        }
    }
    report
}

/// Every per-document check.
pub fn validate_doc(doc: &Document, all_docs: &[Document], schema: &Schema) -> ValidationReport {
    let mut report = validate_frontmatter(doc, schema);
    report.merge(validate_links(doc, all_docs));
    report.merge(validate_images(doc));
    report.merge(validate_format_profile(doc, schema));
    report
}

pub fn validate_unique_uids(docs: &[Document]) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen: HashMap<&str, &Document> = HashMap::new();
    for doc in docs {
        let Some(uid) = doc.assigned_uid() else {
            continue;
        };
        match seen.get(uid) {
            Some(first) => report.error(format!(
                "Duplicate doc_uid '{uid}': found in both {} and {}",
                first.file_name(),
                doc.file_name()
            )),
            None => {
                seen.insert(uid, doc);
            }
        }
    }
    report
}

pub fn validate_orphaned_images(docs: &[Document], config: &PipelineConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Ok(entries) = fs::read_dir(&config.images_dir) else {
        return report;
    };
    let mut images: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            extension_of(p).is_some_and(|ext| ORPHAN_EXTENSIONS.contains(&ext.as_str()))
        })
        .map(|p| normalize_path(&p))
        .collect();
    images.sort();

    let referenced: HashSet<PathBuf> = docs
        .iter()
        .flat_map(|doc| {
            MD_IMAGE
                .captures_iter(&doc.body)
                .filter_map(|caps| caps.get(2))
                .map(|m| m.as_str())
                .filter(|src| !src.starts_with("http"))
                .map(|src| resolve_relative(doc, src))
                .collect::<Vec<_>>()
        })
        .collect();

    for image in images.iter().filter(|i| !referenced.contains(*i)) {
        let shown = image.strip_prefix(&config.repo_root).unwrap_or(image);
        report.warn(format!("Orphaned image: {}", shown.display()));
    }
    report
}

/// Validates `paths` (or every document when `None`) against the whole
/// document tree.
pub fn validate_all(
    config: &PipelineConfig,
    schema: &Schema,
    paths: Option<&[PathBuf]>,
) -> ValidationReport {
    let all_docs = load_all(&config.docs_dir);
    let mut report = validate_unique_uids(&all_docs);
    report.merge(validate_orphaned_images(&all_docs, config));

    let targets: Option<HashSet<PathBuf>> =
        paths.map(|ps| ps.iter().map(|p| normalize_path(&config.resolve(p))).collect());
    for doc in &all_docs {
        if let Some(targets) = &targets {
            if !targets.contains(&normalize_path(&doc.path)) {
                continue;
            }
        }
        let doc_report = validate_doc(doc, &all_docs, schema);
        if doc_report.ok() {
            debug!(path = %doc.path.display(), warnings = doc_report.warnings.len(), "[VALIDATE] Document passed");
        } else {
            warn!(path = %doc.path.display(), errors = doc_report.errors.len(), "[VALIDATE] Document failed");
        }
        report.merge(doc_report);
    }
    info!(
        documents = all_docs.len(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "[VALIDATE] Validation complete"
    );
    report
}
