//! Kubernetes workload status lookups
//!
//! Reads Deployments, StatefulSets and Jobs through the API server and maps
//! them onto the pure [`WorkloadStatus`] model. The client is created on first
//! use so dry runs never need a reachable cluster.

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use kube::{api::Api, Client, Config};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::workload::{ReplicaCounts, WorkloadKind, WorkloadRef, WorkloadStatus};
use crate::error::ProbeWarning;
use crate::services::prober::WorkloadStatusSource;

/// Create Kubernetes client
pub async fn create_client() -> Result<Client> {
    let config = Config::infer()
        .await
        .context("Failed to infer kubeconfig")?;

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Status source backed by the Kubernetes API
#[derive(Default)]
pub struct KubeStatusSource {
    client: OnceCell<Client>,
}

impl KubeStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the client now instead of on the first poll
    pub async fn connect(&self) -> Result<&Client> {
        self.client.get_or_try_init(create_client).await
    }
}

fn deployment_status(deployment: Deployment) -> WorkloadStatus {
    let desired = deployment.spec.and_then(|s| s.replicas).unwrap_or(1);
    let status = deployment.status.unwrap_or_default();
    WorkloadStatus::Replicas(ReplicaCounts {
        desired,
        current: status.replicas.unwrap_or(0),
        ready: status.ready_replicas.unwrap_or(0),
        updated: Some(status.updated_replicas.unwrap_or(0)),
    })
}

fn statefulset_status(sts: StatefulSet) -> WorkloadStatus {
    let desired = sts.spec.and_then(|s| s.replicas).unwrap_or(1);
    let status = sts.status.unwrap_or_default();
    WorkloadStatus::Replicas(ReplicaCounts {
        desired,
        current: status.replicas,
        ready: status.ready_replicas.unwrap_or(0),
        // OnDelete statefulsets never report updated replicas
        updated: status.updated_replicas,
    })
}

fn job_status(job: Job) -> WorkloadStatus {
    WorkloadStatus::Job {
        succeeded: job.status.and_then(|s| s.succeeded).unwrap_or(0),
    }
}

#[async_trait]
impl WorkloadStatusSource for KubeStatusSource {
    async fn status(&self, namespace: &str, workload: &WorkloadRef) -> Result<Option<WorkloadStatus>, ProbeWarning> {
        let query_failed = |message: String| ProbeWarning::QueryFailed {
            kind: workload.kind.to_string(),
            namespace: namespace.to_string(),
            message,
        };

        let client = self
            .connect()
            .await
            .map_err(|e| query_failed(format!("{:#}", e)))?
            .clone();

        debug!("Getting {} in namespace {}", workload, namespace);
        let status = match workload.kind {
            WorkloadKind::Deployment => Api::<Deployment>::namespaced(client, namespace)
                .get_opt(&workload.name)
                .await
                .map(|d| d.map(deployment_status)),
            WorkloadKind::StatefulSet => Api::<StatefulSet>::namespaced(client, namespace)
                .get_opt(&workload.name)
                .await
                .map(|s| s.map(statefulset_status)),
            WorkloadKind::Job => Api::<Job>::namespaced(client, namespace)
                .get_opt(&workload.name)
                .await
                .map(|j| j.map(job_status)),
        };

        status.map_err(|e| query_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus, StatefulSetSpec, StatefulSetStatus};
    use k8s_openapi::api::batch::v1::JobStatus;

    #[test]
    fn test_deployment_status_mapping() {
        let deployment = Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(3),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                replicas: Some(3),
                ready_replicas: Some(2),
                updated_replicas: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        };
        let status = deployment_status(deployment);
        assert!(!status.is_ready());
        assert_eq!(status.summary(), "2/3 ready");
    }

    #[test]
    fn test_deployment_without_status_is_not_ready() {
        let deployment = Deployment::default();
        assert!(!deployment_status(deployment).is_ready());
    }

    #[test]
    fn test_statefulset_without_updated_counter() {
        let sts = StatefulSet {
            spec: Some(StatefulSetSpec {
                replicas: Some(2),
                ..Default::default()
            }),
            status: Some(StatefulSetStatus {
                replicas: 2,
                ready_replicas: Some(2),
                updated_replicas: None,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(statefulset_status(sts).is_ready());
    }

    #[test]
    fn test_job_status_mapping() {
        let job = Job {
            status: Some(JobStatus {
                succeeded: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(job_status(job), WorkloadStatus::Job { succeeded: 1 });
        assert_eq!(job_status(Job::default()), WorkloadStatus::Job { succeeded: 0 });
    }
}
