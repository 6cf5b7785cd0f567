//! Readiness probing
//!
//! The barrier asks one question per workload kind: is every named object of
//! this kind done? Answering it takes one status lookup per name. Lookups that
//! fail or find nothing count as "not ready yet", never as errors.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::workload::{WorkloadKind, WorkloadRef, WorkloadStatus};
use crate::error::ProbeWarning;

/// The cluster status collaborator
#[async_trait]
pub trait WorkloadStatusSource: Send + Sync {
    /// Current status of one workload; `Ok(None)` when it does not exist (yet)
    async fn status(&self, namespace: &str, workload: &WorkloadRef) -> Result<Option<WorkloadStatus>, ProbeWarning>;
}

/// Answers the barrier's readiness question
#[async_trait]
pub trait ReadinessProber: Send + Sync {
    /// `true` iff every name of `kind` in `namespace` satisfies its kind's
    /// done-ness rule
    async fn ready(&self, kind: WorkloadKind, names: &[String], namespace: &str) -> bool;
}

/// Prober that looks each workload up through a [`WorkloadStatusSource`]
pub struct StatusProber {
    source: Arc<dyn WorkloadStatusSource>,
}

impl StatusProber {
    pub fn new(source: Arc<dyn WorkloadStatusSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl ReadinessProber for StatusProber {
    async fn ready(&self, kind: WorkloadKind, names: &[String], namespace: &str) -> bool {
        let mut all_ready = true;

        for name in names {
            let workload = WorkloadRef::new(kind, name.clone());
            match self.source.status(namespace, &workload).await {
                Ok(Some(status)) if status.is_ready() => {
                    debug!("{} is ready ({})", workload, status.summary());
                }
                Ok(Some(status)) => {
                    debug!("{} not ready yet ({})", workload, status.summary());
                    all_ready = false;
                }
                Ok(None) => {
                    warn!(
                        "{}",
                        ProbeWarning::WorkloadNotFound {
                            kind: kind.to_string(),
                            name: name.clone(),
                            namespace: namespace.to_string(),
                        }
                    );
                    all_ready = false;
                }
                Err(warning) => {
                    warn!("{}", warning);
                    all_ready = false;
                }
            }
        }

        all_ready
    }
}
