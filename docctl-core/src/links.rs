//! Run-scoped index from local documents to their canonical pages.
//!
//! The index is filled once at the start of a run and never refreshed, so a
//! page created earlier in the same run is not a link target for documents
//! published after it. Relative `.md` links that cannot be resolved pass
//! through unchanged.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::contract::PageStore;
use crate::document::Document;

#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    uid_by_path: HashMap<PathBuf, String>,
    page_by_uid: HashMap<String, String>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries the store once for every document carrying an assigned uid.
    /// Lookup failures are logged and leave that uid unresolved.
    pub async fn build<S>(store: &S, docs: &[Document]) -> Self
    where
        S: PageStore + ?Sized,
    {
        let mut index = PageIndex::new();
        for doc in docs {
            let Some(uid) = doc.assigned_uid() else {
                continue;
            };
            index
                .uid_by_path
                .insert(normalize_path(&doc.path), uid.to_string());
            match store.query_page_by_uid(uid).await {
                Ok(Some(page)) => {
                    index.page_by_uid.insert(uid.to_string(), page.id);
                }
                Ok(None) => debug!(doc_uid = uid, "[LINKS] No canonical page yet"),
                Err(e) => warn!(doc_uid = uid, error = %e, "[LINKS] Page lookup failed"),
            }
        }
        info!(
            documents = index.uid_by_path.len(),
            pages = index.page_by_uid.len(),
            "[LINKS] Built page index"
        );
        index
    }

    pub fn insert(&mut self, doc_path: &Path, uid: &str, page_id: Option<&str>) {
        self.uid_by_path
            .insert(normalize_path(doc_path), uid.to_string());
        if let Some(page_id) = page_id {
            self.page_by_uid.insert(uid.to_string(), page_id.to_string());
        }
    }

    pub fn page_id(&self, uid: &str) -> Option<&str> {
        self.page_by_uid.get(uid).map(String::as_str)
    }

    /// Resolves a relative `.md` link written in `doc_path` to a page link.
    pub fn resolve(&self, doc_path: &Path, href: &str) -> Option<String> {
        if !is_internal_doc_link(href) {
            return None;
        }
        let target = href.split('#').next().unwrap_or(href);
        let dir = doc_path.parent().unwrap_or_else(|| Path::new(""));
        let uid = self.uid_by_path.get(&normalize_path(&dir.join(target)))?;
        self.page_id(uid).map(|id| format!("/{id}"))
    }
}

pub fn is_external(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://")
}

pub fn is_internal_doc_link(href: &str) -> bool {
    let target = href.split('#').next().unwrap_or(href);
    target.ends_with(".md") && !href.contains("://")
}

/// Lexically resolves `.` and `..` components without touching the
/// filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(
            normalize_path(Path::new("/repo/docs/SOP/../images/./a.png")),
            PathBuf::from("/repo/docs/images/a.png")
        );
    }

    #[test]
    fn resolve_maps_sibling_doc_to_page() {
        let mut index = PageIndex::new();
        index.insert(
            Path::new("/repo/docs/POL/travel.md"),
            "MOS-OPS-POL-001",
            Some("page-123"),
        );
        let from = Path::new("/repo/docs/SOP/intake.md");
        assert_eq!(
            index.resolve(from, "../POL/travel.md"),
            Some("/page-123".to_string())
        );
        assert_eq!(index.resolve(from, "../POL/missing.md"), None);
        assert_eq!(index.resolve(from, "https://example.com/a.md"), None);
    }
}
