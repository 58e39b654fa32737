use std::path::PathBuf;

use thiserror::Error;

use crate::contract::{ScmError, StoreError};

#[derive(Debug, Error)]
pub enum DocctlError {
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("no frontmatter found in {0}")]
    NoFrontmatter(PathBuf),

    #[error("doc_uid placeholder `auto` not found in frontmatter of {0}")]
    PlaceholderNotFound(PathBuf),

    #[error("document {0} has no doc_uid")]
    MissingUid(PathBuf),

    #[error("cannot allocate a uid for {0}: org, department and category are required")]
    IncompletePrefix(PathBuf),

    #[error("page store error: {0}")]
    Store(#[from] StoreError),

    #[error("source control error: {0}")]
    SourceControl(#[from] ScmError),

    #[error("validation failed for {path}: {errors:?}")]
    Validation { path: PathBuf, errors: Vec<String> },
}

pub type Result<T> = std::result::Result<T, DocctlError>;
