//! In-memory collaborators for service tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::domain::release::{ReleaseInfo, ReleaseOutcome, UpgradeRequest, DEPLOYED_STATUS};
use crate::domain::unit::Unit;
use crate::domain::workload::{ReplicaCounts, WorkloadKind, WorkloadRef, WorkloadStatus};
use crate::error::{ProbeWarning, ReleaseError};
use crate::services::driver::ReleaseBackend;
use crate::services::prober::WorkloadStatusSource;

pub fn unit(name: &str, weight: u32) -> Unit {
    Unit {
        name: name.to_string(),
        alias: None,
        used_name: name.to_string(),
        weight,
        release_name: name.to_string(),
        targeted: true,
        tags: vec![],
        allowed_by_tags: true,
        app_version: None,
    }
}

pub fn deployment_manifest(name: &str) -> String {
    format!("---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {}\n", name)
}

pub fn job_manifest(name: &str) -> String {
    format!("---\napiVersion: batch/v1\nkind: Job\nmetadata:\n  name: {}\n", name)
}

pub fn replicas(desired: i32, current: i32, ready: i32) -> WorkloadStatus {
    WorkloadStatus::Replicas(ReplicaCounts {
        desired,
        current,
        ready,
        updated: Some(current),
    })
}

pub fn job(succeeded: i32) -> WorkloadStatus {
    WorkloadStatus::Job { succeeded }
}

/// Release backend answering from canned outcomes and recording every call
#[derive(Default)]
pub struct FakeBackend {
    outcomes: HashMap<String, ReleaseOutcome>,
    failing: HashSet<String>,
    releases: Vec<ReleaseInfo>,
    list_fails: bool,
    calls: Mutex<Vec<UpgradeRequest>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn outcome_mut(&mut self, release: &str) -> &mut ReleaseOutcome {
        self.outcomes
            .entry(release.to_string())
            .or_insert_with(|| ReleaseOutcome {
                status: Some(DEPLOYED_STATUS.to_string()),
                manifest: None,
            })
    }

    pub fn with_manifest(mut self, release: &str, manifest: &str) -> Self {
        self.outcome_mut(release).manifest = Some(manifest.to_string());
        self
    }

    pub fn with_status(mut self, release: &str, status: Option<&str>) -> Self {
        self.outcome_mut(release).status = status.map(str::to_string);
        self
    }

    pub fn failing_on(mut self, release: &str) -> Self {
        self.failing.insert(release.to_string());
        self
    }

    pub fn with_release(mut self, name: &str, revision: u32, status: &str) -> Self {
        self.releases.push(ReleaseInfo {
            name: name.to_string(),
            namespace: String::new(),
            revision,
            updated: String::new(),
            status: status.to_string(),
            chart: String::new(),
            app_version: String::new(),
        });
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<UpgradeRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upgrade_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Release names in call order
    pub fn upgraded(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.release_name).collect()
    }
}

#[async_trait]
impl ReleaseBackend for FakeBackend {
    async fn upgrade_install(&self, request: &UpgradeRequest) -> Result<ReleaseOutcome, ReleaseError> {
        self.calls.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.release_name) {
            return Err(ReleaseError::UpgradeFailed {
                release: request.release_name.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self
            .outcomes
            .get(&request.release_name)
            .cloned()
            .unwrap_or(ReleaseOutcome {
                status: Some(DEPLOYED_STATUS.to_string()),
                manifest: None,
            }))
    }

    async fn list_releases(&self, namespace: &str) -> Result<Vec<ReleaseInfo>, ReleaseError> {
        if self.list_fails {
            return Err(ReleaseError::ListFailed {
                namespace: namespace.to_string(),
                message: "forbidden".to_string(),
            });
        }
        Ok(self.releases.clone())
    }
}

/// Cluster whose workloads walk through a scripted list of states. The last
/// state of a script repeats forever; unscripted workloads do not exist.
#[derive(Default)]
pub struct FakeCluster {
    scripts: Mutex<HashMap<WorkloadRef, VecDeque<Option<WorkloadStatus>>>>,
    failing: HashSet<WorkloadRef>,
    queries: Mutex<Vec<WorkloadRef>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, kind: WorkloadKind, name: &str, states: Vec<Option<WorkloadStatus>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(WorkloadRef::new(kind, name), states.into());
        self
    }

    pub fn failing(mut self, kind: WorkloadKind, name: &str) -> Self {
        self.failing.insert(WorkloadRef::new(kind, name));
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries_of(&self, kind: WorkloadKind, name: &str) -> usize {
        let target = WorkloadRef::new(kind, name);
        self.queries.lock().unwrap().iter().filter(|q| **q == target).count()
    }
}

#[async_trait]
impl WorkloadStatusSource for FakeCluster {
    async fn status(&self, namespace: &str, workload: &WorkloadRef) -> Result<Option<WorkloadStatus>, ProbeWarning> {
        self.queries.lock().unwrap().push(workload.clone());
        if self.failing.contains(workload) {
            return Err(ProbeWarning::QueryFailed {
                kind: workload.kind.to_string(),
                namespace: namespace.to_string(),
                message: "apiserver unavailable".to_string(),
            });
        }

        let mut scripts = self.scripts.lock().unwrap();
        let Some(states) = scripts.get_mut(workload) else {
            return Ok(None);
        };
        let state = if states.len() > 1 {
            states.pop_front().flatten()
        } else {
            states.front().copied().flatten()
        };
        Ok(state)
    }
}
