//! Wave scheduler - weight-ordered upgrades behind readiness barriers
//!
//! Weights are visited from the lowest to the highest present. Each wave
//! upgrades its eligible units one after the other, then blocks on the
//! readiness of every workload the wave produced before the next weight may
//! start. Weights without eligible units are skipped silently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::diagnostics;
use crate::domain::release::ReleaseInfo;
use crate::domain::unit::Unit;
use crate::domain::wave::{eligible_units, wave_weights, SprayPhase, WaveState};
use crate::domain::workload::{WorkloadKind, WorkloadRef};
use crate::error::{ReleaseError, SprayError, TimeoutError};
use crate::services::driver::ReleaseDriver;
use crate::services::prober::ReadinessProber;

/// Record of the phases a run went through
#[derive(Debug, Default)]
pub struct PhaseLog {
    history: Vec<SprayPhase>,
}

impl PhaseLog {
    pub fn enter(&mut self, phase: SprayPhase) {
        debug_assert!(!self.current().is_terminal(), "no transition after {}", self.current());
        debug!("Spray phase: {}", phase);
        self.history.push(phase);
    }

    pub fn current(&self) -> SprayPhase {
        self.history.last().copied().unwrap_or(SprayPhase::Idle)
    }

    pub fn history(&self) -> &[SprayPhase] {
        &self.history
    }

    pub fn into_history(self) -> Vec<SprayPhase> {
        self.history
    }
}

/// What one processed wave did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveOutcome {
    pub weight: u32,
    /// Release names, in upgrade order
    pub upgraded: Vec<String>,
    /// Workloads the barrier waited for
    pub awaited: Vec<WorkloadRef>,
    /// Readiness polls performed, 0 when the barrier was skipped
    pub poll_attempts: u32,
}

/// Number of polls that fit in `timeout`, at least one
pub fn poll_attempts(timeout: Duration, interval: Duration) -> u32 {
    let interval = interval.as_millis();
    if interval == 0 {
        return 1;
    }
    let attempts = timeout.as_millis().div_ceil(interval).max(1);
    u32::try_from(attempts).unwrap_or(u32::MAX)
}

pub struct WaveScheduler {
    driver: ReleaseDriver,
    prober: Arc<dyn ReadinessProber>,
    known_releases: HashMap<String, ReleaseInfo>,
    poll_interval: Duration,
}

impl WaveScheduler {
    pub fn new(driver: ReleaseDriver, prober: Arc<dyn ReadinessProber>, poll_interval: Duration) -> Self {
        Self {
            driver,
            prober,
            known_releases: HashMap::new(),
            poll_interval,
        }
    }

    /// Releases already installed, used to narrate upgrades
    pub fn with_known_releases(mut self, releases: HashMap<String, ReleaseInfo>) -> Self {
        self.known_releases = releases;
        self
    }

    fn dry_run(&self) -> bool {
        self.driver.settings().flags.dry_run
    }

    /// Run every wave. Stops at the first release failure or barrier timeout;
    /// nothing already applied is rolled back.
    pub async fn run(&self, units: &[Unit], phases: &mut PhaseLog) -> Result<Vec<WaveOutcome>, SprayError> {
        let weights = wave_weights(units);
        if weights.is_empty() {
            info!("No sub-chart to upgrade");
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::new();
        for weight in weights {
            if eligible_units(units, weight).next().is_none() {
                continue;
            }

            phases.enter(SprayPhase::UpgradingWave(weight));
            info!("Processing sub-charts of weight {}", weight);
            let state = self.upgrade_wave(units, WaveState::new(weight)).await?;

            let mut outcome = WaveOutcome {
                weight,
                upgraded: state.releases().to_vec(),
                awaited: Vec::new(),
                poll_attempts: 0,
            };

            if !self.dry_run() && state.has_upgrades() {
                phases.enter(SprayPhase::AwaitingReadiness(weight));
                outcome.awaited = state.workloads();
                outcome.poll_attempts = self.await_readiness(state).await?;
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Upgrade every eligible unit of the wave, in resolution order
    async fn upgrade_wave(&self, units: &[Unit], mut state: WaveState) -> Result<WaveState, ReleaseError> {
        for unit in eligible_units(units, state.weight()) {
            info!(
                "{}",
                diagnostics::upgrade_message(unit, self.known_releases.get(&unit.release_name))
            );
            let result = self.driver.upgrade(unit, units).await?;
            if let Some(status) = &result.status {
                debug!("Release \"{}\" status: {}", result.release_name, status);
            }
            state = state.record(result);
        }
        Ok(state)
    }

    /// Poll until every kind reports ready, at a fixed interval, for at most
    /// the configured timeout. Returns the number of polls performed.
    async fn await_readiness(&self, state: WaveState) -> Result<u32, TimeoutError> {
        let settings = self.driver.settings();
        let mut pending: Vec<WorkloadKind> = state.kinds().collect();
        if pending.is_empty() {
            debug!("Weight {} produced no workload to wait for", state.weight());
            return Ok(0);
        }

        info!(
            "Waiting for liveness and readiness of {} of weight {}...",
            pending.iter().map(WorkloadKind::plural).collect::<Vec<_>>().join(", "),
            state.weight()
        );
        debug!("{} workload(s) tracked for weight {}", state.workload_count(), state.weight());

        let attempts = poll_attempts(settings.timeout, self.poll_interval);
        for attempt in 1..=attempts {
            debug!("Readiness poll {}/{} for weight {}", attempt, attempts, state.weight());

            let mut still_pending = Vec::new();
            for kind in pending {
                if !self.prober.ready(kind, state.names(kind), &settings.namespace).await {
                    still_pending.push(kind);
                }
            }
            pending = still_pending;

            if pending.is_empty() {
                info!("All workloads of weight {} are ready", state.weight());
                return Ok(attempt);
            }
            if attempt < attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(TimeoutError {
            weight: state.weight(),
            timeout_secs: settings.timeout.as_secs(),
            attempts,
            pending: pending
                .iter()
                .flat_map(|kind| state.names(*kind).iter().map(|n| WorkloadRef::new(*kind, n.clone()).to_string()))
                .collect(),
        })
    }
}
