//! Release domain types
//!
//! What spray sends to the release collaborator for one unit, and what it
//! gets back.

use serde::Deserialize;
use std::time::Duration;

use super::workload::WorkloadRef;
use crate::config::HelmFlags;

/// Terminal status a non-dry-run upgrade must report
pub const DEPLOYED_STATUS: &str = "deployed";

/// One `upgrade --install` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub release_name: String,
    /// Chart argument (directory, archive or URL already resolved)
    pub chart: String,
    pub namespace: String,
    pub value_files: Vec<String>,
    /// `--set` expressions, user ones first, enable/disable toggles last
    pub set_values: Vec<String>,
    pub string_values: Vec<String>,
    pub file_values: Vec<String>,
    pub flags: HelmFlags,
    pub timeout: Duration,
}

/// Raw answer of the release collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Terminal status (`deployed`, `failed`, ...), when reported
    pub status: Option<String>,
    /// Rendered multi-document manifest, when reported
    pub manifest: Option<String>,
}

/// A release as listed by the collaborator (diagnostics only)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(deserialize_with = "revision_from_any")]
    pub revision: u32,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub chart: String,
    #[serde(default)]
    pub app_version: String,
}

/// `helm list -o json` prints revisions as strings; accept numbers too
fn revision_from_any<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Revision {
        Number(u32),
        Text(String),
    }

    match Revision::deserialize(deserializer)? {
        Revision::Number(n) => Ok(n),
        Revision::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Structured result of upgrading one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseResult {
    pub release_name: String,
    pub status: Option<String>,
    /// Workloads created or touched by this release
    pub workloads: Vec<WorkloadRef>,
}
