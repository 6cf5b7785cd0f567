//! Release driver - one `upgrade --install` per unit
//!
//! Turns the umbrella into N single-unit deploys: every call installs the whole
//! umbrella chart with every other unit disabled and this one enabled, then
//! reads back which workloads the release produced.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{HelmFlags, ValuesOptions};
use crate::domain::manifest::parse_workloads;
use crate::domain::release::{ReleaseInfo, ReleaseOutcome, ReleaseResult, UpgradeRequest, DEPLOYED_STATUS};
use crate::domain::unit::Unit;
use crate::error::ReleaseError;

/// The release collaborator (helm in production)
#[async_trait]
pub trait ReleaseBackend: Send + Sync {
    /// Install or upgrade one release
    async fn upgrade_install(&self, request: &UpgradeRequest) -> Result<ReleaseOutcome, ReleaseError>;

    /// Releases currently known in `namespace`
    async fn list_releases(&self, namespace: &str) -> Result<Vec<ReleaseInfo>, ReleaseError>;
}

/// Settings shared by every upgrade of one run
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Chart argument handed to the backend
    pub chart: String,
    pub namespace: String,
    /// User values, forwarded untouched
    pub values: ValuesOptions,
    pub flags: HelmFlags,
    pub timeout: Duration,
}

/// Drives the release backend for single units
pub struct ReleaseDriver {
    backend: Arc<dyn ReleaseBackend>,
    settings: DriverSettings,
}

/// `x.enabled=false,...,unit.enabled=true` over every unit of the umbrella
pub fn toggle_overrides(unit: &Unit, all_units: &[Unit]) -> String {
    all_units
        .iter()
        .filter(|u| u.used_name != unit.used_name)
        .map(|u| format!("{}.enabled=false", u.used_name))
        .chain(std::iter::once(format!("{}.enabled=true", unit.used_name)))
        .collect::<Vec<_>>()
        .join(",")
}

impl ReleaseDriver {
    pub fn new(backend: Arc<dyn ReleaseBackend>, settings: DriverSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Request for `unit`. Toggles go after the user's `--set` values, so a
    /// user-supplied `<unit>.enabled` never wins over them.
    pub fn request_for(&self, unit: &Unit, all_units: &[Unit]) -> UpgradeRequest {
        let mut set_values = self.settings.values.values.clone();
        set_values.push(toggle_overrides(unit, all_units));

        UpgradeRequest {
            release_name: unit.release_name.clone(),
            chart: self.settings.chart.clone(),
            namespace: self.settings.namespace.clone(),
            value_files: self.settings.values.value_files.clone(),
            set_values,
            string_values: self.settings.values.string_values.clone(),
            file_values: self.settings.values.file_values.clone(),
            flags: self.settings.flags.clone(),
            timeout: self.settings.timeout,
        }
    }

    /// Upgrade one unit and collect the workloads it touched
    pub async fn upgrade(&self, unit: &Unit, all_units: &[Unit]) -> Result<ReleaseResult, ReleaseError> {
        let request = self.request_for(unit, all_units);
        let outcome = self.backend.upgrade_install(&request).await?;

        if !self.settings.flags.dry_run {
            match outcome.status.as_deref() {
                Some(status) if status.eq_ignore_ascii_case(DEPLOYED_STATUS) => {}
                other => {
                    return Err(ReleaseError::UnexpectedStatus {
                        release: unit.release_name.clone(),
                        status: other.unwrap_or("unknown").to_string(),
                    })
                }
            }
        }

        let parsed = parse_workloads(&unit.release_name, outcome.manifest.as_deref().unwrap_or_default());
        for warning in &parsed.warnings {
            warn!("{}", warning);
        }
        debug!(
            "Release {} touched {} workload(s): {}",
            unit.release_name,
            parsed.workloads.len(),
            parsed
                .workloads
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ReleaseResult {
            release_name: unit.release_name.clone(),
            status: outcome.status,
            workloads: parsed.workloads,
        })
    }

    /// Releases of the target namespace, for diagnostics
    pub async fn list_releases(&self) -> Result<Vec<ReleaseInfo>, ReleaseError> {
        self.backend.list_releases(&self.settings.namespace).await
    }
}
