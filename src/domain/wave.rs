//! Waves and run phases
//!
//! A wave is every eligible unit sharing one weight. While a wave is being
//! upgraded its results accumulate in a [`WaveState`] that the readiness
//! barrier consumes once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::release::ReleaseResult;
use super::unit::Unit;
use super::workload::{WorkloadKind, WorkloadRef};

/// Distinct weights present, lowest first. Weights in the gaps have no
/// unit and nothing to do, so they are not visited.
pub fn wave_weights(units: &[Unit]) -> BTreeSet<u32> {
    units.iter().map(|u| u.weight).collect()
}

/// Units eligible in wave `weight`, in resolution order
pub fn eligible_units(units: &[Unit], weight: u32) -> impl Iterator<Item = &Unit> {
    units.iter().filter(move |u| u.is_eligible(weight))
}

/// What one wave produced so far, partitioned by workload kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaveState {
    weight: u32,
    releases: Vec<String>,
    workloads: BTreeMap<WorkloadKind, Vec<String>>,
}

impl WaveState {
    pub fn new(weight: u32) -> Self {
        Self {
            weight,
            ..Default::default()
        }
    }

    /// Fold one release result into the state
    pub fn record(mut self, result: ReleaseResult) -> Self {
        for workload in result.workloads {
            let names = self.workloads.entry(workload.kind).or_default();
            if !names.contains(&workload.name) {
                names.push(workload.name);
            }
        }
        self.releases.push(result.release_name);
        self
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Release names upgraded in this wave
    pub fn releases(&self) -> &[String] {
        &self.releases
    }

    pub fn has_upgrades(&self) -> bool {
        !self.releases.is_empty()
    }

    /// Kinds with at least one workload to wait for
    pub fn kinds(&self) -> impl Iterator<Item = WorkloadKind> + '_ {
        self.workloads
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(kind, _)| *kind)
    }

    pub fn names(&self, kind: WorkloadKind) -> &[String] {
        self.workloads.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn workload_count(&self) -> usize {
        self.workloads.values().map(Vec::len).sum()
    }

    /// Every workload of the wave, kind by kind
    pub fn workloads(&self) -> Vec<WorkloadRef> {
        self.workloads
            .iter()
            .flat_map(|(kind, names)| names.iter().map(|n| WorkloadRef::new(*kind, n.clone())))
            .collect()
    }
}

/// Where a spray run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprayPhase {
    /// Not started
    Idle,
    ResolvingUnits,
    Validating,
    /// Upgrading every eligible unit of a weight
    UpgradingWave(u32),
    /// Barrier on the workloads of a weight
    AwaitingReadiness(u32),
    Completed,
    /// Stopped on a fatal error
    Aborted,
}

impl SprayPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for SprayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ResolvingUnits => write!(f, "resolving units"),
            Self::Validating => write!(f, "validating"),
            Self::UpgradingWave(w) => write!(f, "upgrading weight {}", w),
            Self::AwaitingReadiness(w) => write!(f, "awaiting readiness of weight {}", w),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, weight: u32) -> Unit {
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

    #[test]
    fn test_wave_weights_ascending_and_distinct() {
        let units = vec![unit("a", 5), unit("b", 0), unit("c", 2), unit("d", 2)];
        assert_eq!(wave_weights(&units).into_iter().collect::<Vec<_>>(), vec![0, 2, 5]);
        assert!(wave_weights(&[]).is_empty());
    }

    #[test]
    fn test_wave_weights_skip_large_gaps() {
        let units = vec![unit("a", 3), unit("b", 4_000_000_000)];
        assert_eq!(
            wave_weights(&units).into_iter().collect::<Vec<_>>(),
            vec![3, 4_000_000_000]
        );
    }

    #[test]
    fn test_eligible_units_keep_resolution_order() {
        let mut skipped = unit("d", 1);
        skipped.targeted = false;
        let units = vec![unit("a", 1), unit("b", 0), unit("c", 1), skipped];
        let names: Vec<&str> = eligible_units(&units, 1).map(|u| u.used_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_wave_state_partitions_by_kind() {
        let state = WaveState::new(1)
            .record(ReleaseResult {
                release_name: "db".to_string(),
                status: None,
                workloads: vec![
                    WorkloadRef::new(WorkloadKind::StatefulSet, "db"),
                    WorkloadRef::new(WorkloadKind::Job, "db-init"),
                ],
            })
            .record(ReleaseResult {
                release_name: "api".to_string(),
                status: None,
                workloads: vec![
                    WorkloadRef::new(WorkloadKind::Deployment, "api"),
                    WorkloadRef::new(WorkloadKind::Job, "db-init"),
                ],
            });

        assert_eq!(state.releases(), &["db".to_string(), "api".to_string()]);
        assert_eq!(state.names(WorkloadKind::Job), &["db-init".to_string()]);
        assert_eq!(state.workload_count(), 3);
        assert_eq!(
            state.kinds().collect::<Vec<_>>(),
            vec![WorkloadKind::Deployment, WorkloadKind::StatefulSet, WorkloadKind::Job]
        );
    }

    #[test]
    fn test_empty_wave_state() {
        let state = WaveState::new(4);
        assert!(!state.has_upgrades());
        assert_eq!(state.kinds().count(), 0);
        assert!(state.names(WorkloadKind::Deployment).is_empty());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SprayPhase::UpgradingWave(2).to_string(), "upgrading weight 2");
        assert!(SprayPhase::Aborted.is_terminal());
        assert!(!SprayPhase::AwaitingReadiness(0).is_terminal());
    }
}
