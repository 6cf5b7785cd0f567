//! Manifest classification
//!
//! A successful release returns its rendered manifest as a stream of YAML
//! documents. Only the workloads the readiness barrier can wait for are kept.
//! Anything unreadable is reported as a warning and skipped: by the time a
//! manifest is parsed the release itself has already been applied.

use serde_yaml::Value;

use super::workload::{WorkloadKind, WorkloadRef};
use crate::error::ProbeWarning;

/// Workloads found in a manifest, plus what had to be skipped
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    pub workloads: Vec<WorkloadRef>,
    pub warnings: Vec<ProbeWarning>,
}

/// Split `manifest` into documents and collect Deployments, StatefulSets
/// and Jobs by name. Duplicates are reported once.
pub fn parse_workloads(release: &str, manifest: &str) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();

    for (index, document) in split_documents(manifest).into_iter().enumerate() {
        let value: Value = match serde_yaml::from_str(&document) {
            Ok(value) => value,
            Err(e) => {
                parsed.warnings.push(ProbeWarning::MalformedFragment {
                    release: release.to_string(),
                    index,
                    message: e.to_string(),
                });
                continue;
            }
        };

        // comment-only fragments (`# Source: ...`) parse to null
        let Some(kind) = value.get("kind").and_then(Value::as_str) else {
            continue;
        };
        let Some(kind) = WorkloadKind::from_manifest_kind(kind) else {
            continue;
        };

        match value
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
        {
            Some(name) if !name.is_empty() => {
                let workload = WorkloadRef::new(kind, name);
                if !parsed.workloads.contains(&workload) {
                    parsed.workloads.push(workload);
                }
            }
            _ => parsed.warnings.push(ProbeWarning::UnnamedWorkload {
                release: release.to_string(),
                kind: kind.to_string(),
            }),
        }
    }

    parsed
}

/// Split on `---` separator lines; each document is parsed on its own so one
/// broken fragment cannot poison the rest of the stream.
fn split_documents(manifest: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in manifest.lines() {
        if line.trim_end() == "---" || line.starts_with("--- ") {
            if !current.trim().is_empty() {
                documents.push(std::mem::take(&mut current));
            }
            current.clear();
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        documents.push(current);
    }
    documents
}
