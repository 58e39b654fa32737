//! Frontmatter vocabulary: allowed codes and format profiles.
//!
//! Built-in defaults can be replaced per repository with
//! `docs/.meta/schema.yaml`; any key the file leaves out keeps its default.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DocctlError, Result};

pub const SCHEMA_FILE: &str = "schema.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub orgs: BTreeSet<String>,
    pub departments: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub desired_states: BTreeSet<String>,
    /// Profile name to the headings a document of that profile must have.
    pub format_profiles: BTreeMap<String, Vec<String>>,
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Schema {
    fn default() -> Self {
        let mut format_profiles = BTreeMap::new();
        format_profiles.insert(
            "SOP_v1".to_string(),
            [
                "Purpose",
                "Scope",
                "Responsibilities",
                "Definitions",
                "Safety",
                "Procedure",
                "Records",
                "Revision History",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );
        Schema {
            orgs: set(&["MOS", "POP", "XCC", "ACC"]),
            departments: set(&["ENG", "OPS", "FIN", "BD"]),
            categories: set(&["SOP", "POL", "WI", "RPT", "DG", "STR", "GOV", "MKT", "PRO"]),
            desired_states: set(&["draft", "release", "none"]),
            format_profiles,
        }
    }
}

impl Schema {
    /// Reads `<meta_dir>/schema.yaml` when present, defaults otherwise.
    pub fn load(meta_dir: &Path) -> Result<Schema> {
        let path = meta_dir.join(SCHEMA_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "No schema override, using defaults");
            return Ok(Schema::default());
        }
        let content = fs::read_to_string(&path).map_err(|source| DocctlError::FileRead {
            path: path.clone(),
            source,
        })?;
        let schema: Schema =
            serde_yaml::from_str(&content).map_err(|source| DocctlError::Yaml {
                path: path.clone(),
                source,
            })?;
        info!(
            path = %path.display(),
            orgs = schema.orgs.len(),
            categories = schema.categories.len(),
            profiles = schema.format_profiles.len(),
            "Loaded schema override"
        );
        Ok(schema)
    }
}
