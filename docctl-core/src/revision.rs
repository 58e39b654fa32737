//! # revision: version numbers and the per-document publish decision
//!
//! A document's published state is keyed by its uid and is either absent
//! or `published(revision, status, source_commit)`. [`decide`] evaluates
//! the decision table in order:
//!
//! 1. publish flag off: skip
//! 2. release run, desired state not `release`: skip
//! 3. draft run, desired state neither `draft` nor `release`: skip
//! 4. already published from this commit at the target revision: no-op
//! 5. otherwise create (absent) or update (published)
//!
//! Every publish advances the revision, so a stored revision never equals
//! the freshly computed `next`. Rule 4 also matches a page already
//! published from this commit under the same status label; a replayed
//! commit therefore never archives twice.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Draft,
    Release,
}

impl Intent {
    /// Status label written to the page and the history table.
    pub fn status_label(&self) -> &'static str {
        match self {
            Intent::Draft => "Draft",
            Intent::Release => "Released",
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, Intent::Release)
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Intent::Draft),
            "release" => Ok(Intent::Release),
            other => Err(format!("unknown publish mode '{other}'")),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Intent::Draft => "draft",
            Intent::Release => "release",
        })
    }
}

/// Lifecycle target a document declares in its frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Draft,
    Release,
    None,
}

impl DesiredState {
    /// Unknown values are treated as `None`; validation reports them.
    pub fn parse(value: &str) -> Self {
        match value {
            "draft" => DesiredState::Draft,
            "release" => DesiredState::Release,
            _ => DesiredState::None,
        }
    }
}

/// `MAJOR.MINOR`. `0.0` means never published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision {
    pub major: u32,
    pub minor: u32,
}

impl Revision {
    pub const INITIAL: Revision = Revision { major: 0, minor: 0 };

    pub fn is_initial(&self) -> bool {
        *self == Revision::INITIAL
    }

    pub fn next(&self, intent: Intent) -> Revision {
        match (self.is_initial(), intent) {
            (true, Intent::Release) => Revision { major: 1, minor: 0 },
            (true, Intent::Draft) => Revision { major: 0, minor: 1 },
            (false, Intent::Release) => Revision {
                major: self.major.saturating_add(1),
                minor: 0,
            },
            (false, Intent::Draft) => Revision {
                major: self.major,
                minor: self.minor.saturating_add(1),
            },
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid revision '{0}'")]
pub struct InvalidRevision(pub String);

impl FromStr for Revision {
    type Err = InvalidRevision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRevision(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Revision {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Next revision label for a stored label. Empty or malformed labels are
/// treated as never published.
pub fn next_revision(current: &str, intent: Intent) -> String {
    current
        .parse::<Revision>()
        .unwrap_or(Revision::INITIAL)
        .next(intent)
        .to_string()
}

/// What the store says about a document's canonical page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorState {
    pub page_id: String,
    pub url: Option<String>,
    pub revision: String,
    pub status: String,
    pub source_commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip { reason: String },
    NoOp { revision: String },
    Create { next: String },
    Update { prior: PriorState, next: String },
}

/// Rules 1-3: why this run must leave the document alone, if it must.
pub fn skip_reason(publish: bool, desired: &str, intent: Intent) -> Option<String> {
    if !publish {
        return Some("publish is false".to_string());
    }
    match (intent, DesiredState::parse(desired)) {
        (Intent::Release, DesiredState::Draft | DesiredState::None) => {
            Some(format!("desired_state is '{desired}', not 'release'"))
        }
        (Intent::Draft, DesiredState::None) => Some(format!("desired_state is '{desired}'")),
        _ => None,
    }
}

pub fn decide(
    publish: bool,
    desired: &str,
    intent: Intent,
    prior: Option<PriorState>,
    commit: &str,
) -> Decision {
    if let Some(reason) = skip_reason(publish, desired, intent) {
        return Decision::Skip { reason };
    }

    let Some(prior) = prior else {
        return Decision::Create {
            next: next_revision("0.0", intent),
        };
    };
    let next = next_revision(&prior.revision, intent);
    let same_commit = !commit.is_empty() && prior.source_commit == commit;
    if same_commit && (prior.revision == next || prior.status == intent.status_label()) {
        return Decision::NoOp {
            revision: prior.revision,
        };
    }
    Decision::Update { prior, next }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage() {
        assert!("1".parse::<Revision>().is_err());
        assert!("a.b".parse::<Revision>().is_err());
        assert_eq!(
            "2.7".parse::<Revision>(),
            Ok(Revision { major: 2, minor: 7 })
        );
    }

    #[test]
    fn malformed_label_counts_as_initial() {
        assert_eq!(next_revision("", Intent::Draft), "0.1");
        assert_eq!(next_revision("v3", Intent::Release), "1.0");
    }
}
