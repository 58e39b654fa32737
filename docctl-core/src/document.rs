//! Source documents: Markdown files with a YAML frontmatter header.
//!
//! A [`Document`] is loaded once per run and treated as immutable, except
//! for the single in-place edit the uid allocator makes through
//! [`write_doc_uid`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{DocctlError, Result};

/// Sentinel `doc_uid` asking the pipeline to allocate an identifier.
pub const AUTO_UID: &str = "auto";

static UID_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^(\s*doc_uid:[ \t]*)(?:"auto"|'auto'|auto)[ \t]*$"#)
        .expect("placeholder pattern is valid")
});

#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    /// Frontmatter in source order.
    pub metadata: Mapping,
    /// Markdown after the closing `---`.
    pub body: String,
}

/// Byte ranges of a frontmatter block: the YAML text and the body start.
struct Frontmatter<'a> {
    yaml: &'a str,
    yaml_start: usize,
    body_start: usize,
}

fn split_frontmatter(content: &str) -> Option<Frontmatter<'_>> {
    let open = if content.starts_with("---\n") {
        4
    } else if content.starts_with("---\r\n") {
        5
    } else {
        return None;
    };
    let rest = &content[open..];
    // Empty frontmatter: the closing fence follows immediately.
    for fence in ["---\n", "---\r\n"] {
        if rest.starts_with(fence) {
            return Some(Frontmatter {
                yaml: "",
                yaml_start: open,
                body_start: open + fence.len(),
            });
        }
    }
    let (end, fence_len) = match (rest.find("\n---\n"), rest.find("\n---\r\n")) {
        (Some(a), Some(b)) if b < a => (b, 6),
        (Some(a), _) => (a, 5),
        (None, Some(b)) => (b, 6),
        (None, None) if rest.ends_with("\n---") => (rest.len() - 4, 4),
        (None, None) => return None,
    };
    Some(Frontmatter {
        yaml: &rest[..end],
        yaml_start: open,
        body_start: open + end + fence_len,
    })
}

/// `content` without a leading frontmatter block, if it has one.
pub fn strip_frontmatter(content: &str) -> &str {
    match split_frontmatter(content) {
        Some(fm) => &content[fm.body_start..],
        None => content,
    }
}

impl Document {
    /// Parses file content that is already in memory.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Document> {
        let path = path.into();
        let Some(fm) = split_frontmatter(content) else {
            return Err(DocctlError::NoFrontmatter(path));
        };
        let metadata = if fm.yaml.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Mapping>(fm.yaml) {
                Ok(metadata) => metadata,
                Err(source) => return Err(DocctlError::Yaml { path, source }),
            }
        };
        Ok(Document {
            path,
            metadata,
            body: content[fm.body_start..].to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Document> {
        let content = fs::read_to_string(path).map_err(|source| DocctlError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Document::parse(path, &content)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// A top-level string field; empty strings count as absent.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn nested(&self, block: &str, key: &str) -> Option<&Value> {
        self.get(block)
            .and_then(Value::as_mapping)
            .and_then(|m| m.get(key))
    }

    pub fn doc_uid(&self) -> Option<&str> {
        self.str_field("doc_uid")
    }

    pub fn title(&self) -> &str {
        self.str_field("title").unwrap_or_default()
    }

    pub fn org(&self) -> &str {
        self.str_field("org").unwrap_or_default()
    }

    pub fn department(&self) -> &str {
        self.str_field("department").unwrap_or_default()
    }

    pub fn category(&self) -> &str {
        self.str_field("category").unwrap_or_default()
    }

    pub fn publish(&self) -> bool {
        self.nested("notion", "publish")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn database(&self) -> &str {
        self.nested("notion", "database")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn desired_state(&self) -> &str {
        self.nested("lifecycle", "desired_state")
            .and_then(Value::as_str)
            .unwrap_or("none")
    }

    pub fn access_groups(&self) -> Vec<String> {
        match self.get("access_groups").and_then(Value::as_sequence) {
            Some(groups) => groups
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn format_profile(&self) -> Option<&str> {
        self.str_field("format_profile")
    }

    pub fn needs_auto_uid(&self) -> bool {
        self.doc_uid() == Some(AUTO_UID)
    }

    /// The real identifier, if one has been assigned.
    pub fn assigned_uid(&self) -> Option<&str> {
        self.doc_uid().filter(|uid| *uid != AUTO_UID)
    }

    /// `ORG-DEP-CAT`, the prefix every uid of this document's kind shares.
    pub fn uid_prefix(&self) -> String {
        format!("{}-{}-{}", self.org(), self.department(), self.category())
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path relative to `repo_root`, or the path as-is when it lies outside.
    pub fn relative_path(&self, repo_root: &Path) -> PathBuf {
        self.path
            .strip_prefix(repo_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.path.clone())
    }
}

/// Every `*.md` file under `docs_dir`, in path order.
pub fn markdown_files(docs_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(docs_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Parses every Markdown file under `docs_dir`. Files that fail to parse
/// are logged and left out.
pub fn load_all(docs_dir: &Path) -> Vec<Document> {
    let mut docs = Vec::new();
    for path in markdown_files(docs_dir) {
        match Document::load(&path) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unparsable document"),
        }
    }
    debug!(docs_dir = %docs_dir.display(), count = docs.len(), "Loaded documents");
    docs
}

/// Replaces the `doc_uid: auto` placeholder in the file's frontmatter with
/// `uid`, leaving every other byte of the file untouched.
pub fn write_doc_uid(path: &Path, uid: &str) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|source| DocctlError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let fm = split_frontmatter(&content)
        .ok_or_else(|| DocctlError::NoFrontmatter(path.to_path_buf()))?;
    let yaml_end = fm.yaml_start + fm.yaml.len();
    let Some(caps) = UID_PLACEHOLDER.captures(fm.yaml) else {
        return Err(DocctlError::PlaceholderNotFound(path.to_path_buf()));
    };
    let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
        return Err(DocctlError::PlaceholderNotFound(path.to_path_buf()));
    };

    let mut updated = String::with_capacity(content.len() + uid.len());
    updated.push_str(&content[..fm.yaml_start]);
    updated.push_str(&fm.yaml[..whole.start()]);
    updated.push_str(key.as_str());
    updated.push('"');
    updated.push_str(uid);
    updated.push('"');
    updated.push_str(&fm.yaml[whole.end()..]);
    updated.push_str(&content[yaml_end..]);

    fs::write(path, updated).map_err(|source| DocctlError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}
