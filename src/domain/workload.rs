//! Workload domain types
//!
//! A release touches workloads of two families: replica-controlled ones
//! (`Deployment`, `StatefulSet`) and run-to-completion ones (`Job`). Each family
//! has its own done-ness rule, evaluated here without any I/O.

use std::fmt;

/// Kind of workload the readiness barrier knows how to wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    Job,
}

impl WorkloadKind {
    /// Map a manifest `kind:` field to a tracked workload kind
    pub fn from_manifest_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(Self::Deployment),
            "StatefulSet" => Some(Self::StatefulSet),
            "Job" => Some(Self::Job),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::Job => "Job",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployments",
            Self::StatefulSet => "StatefulSets",
            Self::Job => "Jobs",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named workload produced by a release
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkloadRef {
    pub kind: WorkloadKind,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(kind: WorkloadKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Replica counters of a Deployment or StatefulSet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplicaCounts {
    pub desired: i32,
    pub current: i32,
    pub ready: i32,
    /// Not every controller reports it; `None` means "not tracked"
    pub updated: Option<i32>,
}

/// Observed state of one workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadStatus {
    Replicas(ReplicaCounts),
    Job { succeeded: i32 },
}

impl WorkloadStatus {
    /// Kind-specific done-ness
    ///
    /// Replica-controlled: desired == current == ready (== updated when tracked).
    /// Job-style: at least one successful completion.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Replicas(counts) => {
                counts.desired == counts.current
                    && counts.desired == counts.ready
                    && counts.updated.map_or(true, |u| u == counts.desired)
            }
            Self::Job { succeeded } => *succeeded >= 1,
        }
    }

    /// Short human summary, e.g. `2/3 ready` or `0 succeeded`
    pub fn summary(&self) -> String {
        match self {
            Self::Replicas(counts) => format!("{}/{} ready", counts.ready, counts.desired),
            Self::Job { succeeded } => format!("{} succeeded", succeeded),
        }
    }
}
