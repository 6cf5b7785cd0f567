//! Spray service - orchestrates one spray run
//!
//! Idle -> ResolvingUnits -> Validating -> (UpgradingWave <-> AwaitingReadiness)*
//! -> Completed, with Aborted reachable from anywhere on a fatal error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::chart::DependencySpec;
use crate::config::{SprayOptions, ValuesOptions};
use crate::diagnostics;
use crate::domain::unit::{resolve_units, Unit};
use crate::domain::wave::SprayPhase;
use crate::error::SprayError;
use crate::services::driver::{DriverSettings, ReleaseBackend, ReleaseDriver};
use crate::services::prober::ReadinessProber;
use crate::services::scheduler::{PhaseLog, WaveOutcome, WaveScheduler};
use crate::ui;
use crate::validation;

/// What the chart layer hands over to the scheduling core
#[derive(Debug, Clone)]
pub struct SprayPlan {
    /// Chart argument for every upgrade
    pub chart: String,
    pub dependencies: Vec<DependencySpec>,
    /// `appVersion` by dependency chart name
    pub app_versions: HashMap<String, String>,
    /// Umbrella defaults, sub-chart defaults and user overrides, merged
    pub values: crate::values::Values,
    /// Value files for helm, expanded umbrella values first when present
    pub value_files: Vec<String>,
}

/// Summary of a completed run
#[derive(Debug)]
pub struct SprayReport {
    pub units: Vec<Unit>,
    pub waves: Vec<WaveOutcome>,
    pub phases: Vec<SprayPhase>,
}

impl SprayReport {
    pub fn upgraded_count(&self) -> usize {
        self.waves.iter().map(|w| w.upgraded.len()).sum()
    }

    /// Headline of the run
    pub fn headline(&self) -> String {
        format!(
            "{} release(s) of {} sub-chart(s) upgraded over {} weight(s)",
            self.upgraded_count(),
            self.units.len(),
            self.waves.len()
        )
    }

    /// One line per processed weight
    pub fn wave_lines(&self) -> String {
        self.waves
            .iter()
            .map(|wave| {
                let barrier = if wave.awaited.is_empty() {
                    "no workload awaited".to_string()
                } else {
                    format!(
                        "{} workload(s) ready after {} poll(s)",
                        wave.awaited.len(),
                        wave.poll_attempts
                    )
                };
                format!("weight {}: {} ({})", wave.weight, wave.upgraded.join(", "), barrier)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn phase_trail(&self) -> String {
        self.phases
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Service for spraying an umbrella chart
pub struct SprayService {
    backend: Arc<dyn ReleaseBackend>,
    prober: Arc<dyn ReadinessProber>,
}

impl SprayService {
    pub fn new(backend: Arc<dyn ReleaseBackend>, prober: Arc<dyn ReadinessProber>) -> Self {
        Self { backend, prober }
    }

    /// Execute a full spray
    pub async fn run(&self, plan: SprayPlan, opts: &SprayOptions) -> Result<SprayReport, SprayError> {
        let start = Instant::now();
        let mut phases = PhaseLog::default();

        match self.execute(plan, opts, &mut phases).await {
            Ok((units, waves)) => {
                phases.enter(SprayPhase::Completed);
                info!(
                    "Upgrade of solution chart completed in {}",
                    humantime::format_duration(std::time::Duration::from_secs(start.elapsed().as_secs()))
                );
                Ok(SprayReport {
                    units,
                    waves,
                    phases: phases.into_history(),
                })
            }
            Err(e) => {
                debug!("Spray aborted while {} (phases: {:?})", phases.current(), phases.history());
                phases.enter(SprayPhase::Aborted);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        plan: SprayPlan,
        opts: &SprayOptions,
        phases: &mut PhaseLog,
    ) -> Result<(Vec<Unit>, Vec<WaveOutcome>), SprayError> {
        phases.enter(SprayPhase::ResolvingUnits);
        let checked = validation::check_options(opts)?;
        let units = resolve_units(
            &plan.dependencies,
            &plan.values,
            &checked.filter,
            &checked.prefix.resolve(&opts.namespace),
            |dependency| plan.app_versions.get(&dependency.name).cloned(),
        )?;

        phases.enter(SprayPhase::Validating);
        validation::check_filter_names(&checked.filter, &units)?;

        let driver = ReleaseDriver::new(
            self.backend.clone(),
            DriverSettings {
                chart: plan.chart,
                namespace: opts.namespace.clone(),
                values: ValuesOptions {
                    value_files: plan.value_files,
                    ..opts.values.clone()
                },
                flags: opts.helm.clone(),
                timeout: opts.timeout,
            },
        );

        // listing only feeds diagnostics
        let known = match driver.list_releases().await {
            Ok(releases) => diagnostics::release_index(releases),
            Err(e) => {
                warn!("{}", e);
                HashMap::new()
            }
        };

        if opts.verbose() {
            ui::print_block(&diagnostics::unit_table(&units, &known));
        }

        let scheduler = WaveScheduler::new(driver, self.prober.clone(), opts.poll_interval).with_known_releases(known);
        let waves = scheduler.run(&units, phases).await?;
        Ok((units, waves))
    }
}
