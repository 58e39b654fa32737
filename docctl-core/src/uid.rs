//! # uid: sequential document identifiers
//!
//! A new document declares `doc_uid: auto`. Its identifier is
//! `ORG-DEP-CAT-NNN`, where `NNN` is one more than the highest sequence
//! already used under that prefix in either the page store or the local
//! document tree. Sequences are never reused, so gaps left by deleted
//! documents stay gaps.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

use crate::contract::PageStore;
use crate::document::{load_all, write_doc_uid, Document};
use crate::error::{DocctlError, Result};

/// Trailing numeric sequence of a uid, e.g. `12` for `MOS-ENG-SOP-012`.
pub fn extract_sequence(uid: &str) -> Option<u64> {
    let (_, tail) = uid.rsplit_once('-')?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// Next free uid under `prefix`. Identifiers under other prefixes are
/// ignored; the sequence is zero-padded to at least three digits.
pub fn find_next_uid<S: AsRef<str>>(prefix: &str, existing: &[S]) -> String {
    let prefix_dash = format!("{prefix}-");
    let max = existing
        .iter()
        .map(|uid| uid.as_ref())
        .filter(|uid| uid.starts_with(&prefix_dash))
        .filter_map(extract_sequence)
        .max()
        .unwrap_or(0);
    format!("{prefix}-{:03}", max + 1)
}

/// Union of uids under `prefix` known to the store and to `local_docs`.
pub async fn collect_existing_uids<S>(
    store: &S,
    prefix: &str,
    local_docs: &[Document],
) -> Result<Vec<String>>
where
    S: PageStore + ?Sized,
{
    let remote = store.query_uids_by_prefix(prefix).await?;
    let local: Vec<&str> = local_docs
        .iter()
        .filter_map(Document::assigned_uid)
        .filter(|uid| uid.starts_with(prefix))
        .collect();
    info!(
        prefix,
        remote = remote.len(),
        local = local.len(),
        "[UID] Collected existing identifiers"
    );
    let union: BTreeSet<String> = remote
        .into_iter()
        .chain(local.into_iter().map(str::to_string))
        .collect();
    Ok(union.into_iter().collect())
}

/// Allocates a uid for `doc` and writes it into the source file.
///
/// Documents that already carry a uid are returned unchanged. The local
/// tree under `docs_dir` is rescanned so that documents assigned earlier in
/// the same run are counted.
pub async fn assign_uid<S>(store: &S, doc: &Document, docs_dir: &Path) -> Result<String>
where
    S: PageStore + ?Sized,
{
    if !doc.needs_auto_uid() {
        return doc
            .doc_uid()
            .map(str::to_string)
            .ok_or_else(|| DocctlError::MissingUid(doc.path.clone()));
    }
    if doc.org().is_empty() || doc.department().is_empty() || doc.category().is_empty() {
        return Err(DocctlError::IncompletePrefix(doc.path.clone()));
    }
    let prefix = doc.uid_prefix();
    let local = load_all(docs_dir);
    let existing = collect_existing_uids(store, &prefix, &local).await?;
    let uid = find_next_uid(&prefix, &existing);
    write_doc_uid(&doc.path, &uid)?;
    info!(doc_uid = %uid, path = %doc.path.display(), "[UID] Assigned identifier");
    Ok(uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_requires_numeric_tail() {
        assert_eq!(extract_sequence("MOS-ENG-SOP-012"), Some(12));
        assert_eq!(extract_sequence("MOS-ENG-SOP-"), None);
        assert_eq!(extract_sequence("MOS-ENG-SOP-A1"), None);
        assert_eq!(extract_sequence("plain"), None);
    }

    #[test]
    fn padding_grows_past_three_digits() {
        assert_eq!(find_next_uid("MOS-ENG-SOP", &["MOS-ENG-SOP-999"]), "MOS-ENG-SOP-1000");
        assert_eq!(find_next_uid::<&str>("MOS-ENG-SOP", &[]), "MOS-ENG-SOP-001");
    }
}
