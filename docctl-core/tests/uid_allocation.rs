use std::fs;
use std::path::{Path, PathBuf};

use docctl_core::contract::{MockPageStore, StoreError};
use docctl_core::document::{write_doc_uid, Document};
use docctl_core::error::DocctlError;
use docctl_core::uid::{assign_uid, collect_existing_uids, find_next_uid};
use tempfile::tempdir;

fn write_doc(dir: &Path, name: &str, uid: &str) -> PathBuf {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        format!(
            "---\ntitle: {name}\ndoc_uid: {uid}\norg: MOS\ndepartment: ENG\ncategory: SOP\n---\n# {name}\n"
        ),
    )
    .unwrap();
    path
}

#[test]
fn next_uid_follows_highest_sequence_under_prefix() {
    let existing = ["MOS-ENG-SOP-003", "MOS-ENG-SOP-011", "MOS-ENG-OTHER-099"];
    assert_eq!(find_next_uid("MOS-ENG-SOP", &existing), "MOS-ENG-SOP-012");
}

#[test]
fn gaps_are_never_reused() {
    let existing = ["MOS-ENG-SOP-001", "MOS-ENG-SOP-005"];
    assert_eq!(find_next_uid("MOS-ENG-SOP", &existing), "MOS-ENG-SOP-006");
}

#[test]
fn write_back_only_touches_the_placeholder() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("intake.md");
    let original = "---\ntitle: Intake\ndoc_uid: auto\norg: MOS\n---\nBody mentions doc_uid: auto too.\n";
    fs::write(&path, original).unwrap();

    write_doc_uid(&path, "MOS-ENG-SOP-004").unwrap();

    let updated = fs::read_to_string(&path).unwrap();
    assert_eq!(
        updated,
        "---\ntitle: Intake\ndoc_uid: \"MOS-ENG-SOP-004\"\norg: MOS\n---\nBody mentions doc_uid: auto too.\n"
    );
    let doc = Document::load(&path).unwrap();
    assert_eq!(doc.assigned_uid(), Some("MOS-ENG-SOP-004"));
}

#[test]
fn write_back_without_placeholder_fails() {
    let dir = tempdir().unwrap();
    let path = write_doc(dir.path(), "a.md", "MOS-ENG-SOP-001");
    let err = write_doc_uid(&path, "MOS-ENG-SOP-002").unwrap_err();
    assert!(matches!(err, DocctlError::PlaceholderNotFound(_)));
}

#[tokio::test]
async fn existing_uids_union_store_and_local_tree() {
    let dir = tempdir().unwrap();
    write_doc(dir.path(), "SOP/a.md", "MOS-ENG-SOP-002");
    write_doc(dir.path(), "SOP/b.md", "MOS-ENG-SOP-007");
    let local = docctl_core::document::load_all(dir.path());

    let mut store = MockPageStore::new();
    store
        .expect_query_uids_by_prefix()
        .withf(|prefix| prefix == "MOS-ENG-SOP")
        .times(1)
        .returning(|_| Ok(vec!["MOS-ENG-SOP-002".into(), "MOS-ENG-SOP-004".into()]));

    let uids = collect_existing_uids(&store, "MOS-ENG-SOP", &local)
        .await
        .unwrap();
    assert_eq!(
        uids,
        vec!["MOS-ENG-SOP-002", "MOS-ENG-SOP-004", "MOS-ENG-SOP-007"]
    );
}

#[tokio::test]
async fn assign_uid_writes_next_identifier_into_the_file() {
    let dir = tempdir().unwrap();
    write_doc(dir.path(), "SOP/old.md", "MOS-ENG-SOP-007");
    let path = write_doc(dir.path(), "SOP/new.md", "auto");
    let doc = Document::load(&path).unwrap();

    let mut store = MockPageStore::new();
    store
        .expect_query_uids_by_prefix()
        .returning(|_| Ok(vec!["MOS-ENG-SOP-004".into()]));

    let uid = assign_uid(&store, &doc, dir.path()).await.unwrap();
    assert_eq!(uid, "MOS-ENG-SOP-008");
    let reloaded = Document::load(&path).unwrap();
    assert_eq!(reloaded.assigned_uid(), Some("MOS-ENG-SOP-008"));
}

#[tokio::test]
async fn assign_uid_keeps_existing_identifier() {
    let dir = tempdir().unwrap();
    let path = write_doc(dir.path(), "SOP/a.md", "MOS-ENG-SOP-003");
    let doc = Document::load(&path).unwrap();
    let store = MockPageStore::new();

    let uid = assign_uid(&store, &doc, dir.path()).await.unwrap();
    assert_eq!(uid, "MOS-ENG-SOP-003");
}

#[tokio::test]
async fn assign_uid_requires_full_prefix() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("SOP/a.md");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "---\ntitle: A\ndoc_uid: auto\norg: MOS\n---\n").unwrap();
    let doc = Document::load(&path).unwrap();
    let store = MockPageStore::new();

    let err = assign_uid(&store, &doc, dir.path()).await.unwrap_err();
    assert!(matches!(err, DocctlError::IncompletePrefix(_)));
}

#[tokio::test]
async fn store_failure_aborts_allocation_without_writing() {
    let dir = tempdir().unwrap();
    let path = write_doc(dir.path(), "SOP/new.md", "auto");
    let doc = Document::load(&path).unwrap();

    let mut store = MockPageStore::new();
    store
        .expect_query_uids_by_prefix()
        .returning(|_| Err(StoreError::Transport("connection reset".into())));

    let err = assign_uid(&store, &doc, dir.path()).await.unwrap_err();
    assert!(matches!(err, DocctlError::Store(_)));
    assert!(Document::load(&path).unwrap().needs_auto_uid());
}
