use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::chart::{Chart, ChartSource};
use crate::config::SprayOptions;
use crate::infrastructure::{HelmClient, KubeStatusSource};
use crate::services::{SprayPlan, SprayService, StatusProber};
use crate::ui;
use crate::validation;
use crate::values::{include::expand_includes, user_overrides, Values};

/// Umbrella values ready for the run, plus the temp file holding the
/// expanded `values.yaml` when include clauses were expanded
struct UmbrellaValues {
    values: Values,
    expanded_file: Option<NamedTempFile>,
}

fn umbrella_values(chart: &Chart, reuse_values: bool) -> Result<UmbrellaValues> {
    // with --reuse-values helm keeps the stored values; nothing to expand
    if reuse_values {
        return Ok(UmbrellaValues {
            values: Values::from_yaml_str(&chart.raw_values, "values.yaml")?,
            expanded_file: None,
        });
    }

    let expanded = expand_includes(&chart.raw_values, |name| chart.read_file(name))?;
    let values = Values::from_yaml_str(&expanded, "values.yaml")
        .context("Expanded umbrella values are not valid YAML")?;
    if expanded == chart.raw_values {
        return Ok(UmbrellaValues {
            values,
            expanded_file: None,
        });
    }

    let mut file = tempfile::Builder::new()
        .prefix("spray-values-")
        .suffix(".yaml")
        .tempfile()
        .context("Failed to create temp file for expanded values")?;
    file.write_all(expanded.as_bytes())
        .context("Failed to write expanded values")?;
    debug!("Expanded umbrella values written to {}", file.path().display());

    Ok(UmbrellaValues {
        values,
        expanded_file: Some(file),
    })
}

pub async fn execute(opts: SprayOptions) -> Result<()> {
    if opts.helm.debug {
        debug!("Starting spray with options: {}", opts.debug_dump()?);
    }

    // flag combinations are rejected before anything is fetched
    validation::check_options(&opts)?;
    validation::ensure_helm()?;

    let source = ChartSource::classify(&opts.chart);
    validation::check_chart_version(&source, opts.chart_version.as_deref())?;

    let helm = Arc::new(HelmClient::new());
    let local = source
        .materialize(&helm, opts.chart_version.as_deref())
        .await
        .with_context(|| format!("Failed to obtain chart {}", opts.chart))?;
    let chart = Chart::load(&local.dir)
        .await
        .with_context(|| format!("Failed to load chart {}", local.dir.display()))?;

    ui::print_header(&format!("Spray {} {}", chart.metadata.name, chart.metadata.version));
    info!("Namespace: {}", opts.namespace);
    if opts.dry_run() {
        info!("Dry run: releases are simulated and readiness is not awaited");
    }

    let umbrella = umbrella_values(&chart, opts.helm.reuse_values)?;
    let mut values = chart.coalesce(umbrella.values);
    values.merge(
        user_overrides(&opts.values)
            .await
            .context("Failed to read user-supplied values")?,
    );

    let mut value_files = Vec::new();
    if let Some(file) = &umbrella.expanded_file {
        value_files.push(file.path().display().to_string());
    }
    value_files.extend(opts.values.value_files.iter().cloned());

    let app_versions: HashMap<String, String> = chart
        .dependencies()
        .iter()
        .filter_map(|d| chart.app_version_of(d).map(|v| (d.name.clone(), v)))
        .collect();

    let plan = SprayPlan {
        chart: local.install_ref.clone(),
        dependencies: chart.dependencies().to_vec(),
        app_versions,
        values,
        value_files,
    };

    let cluster = Arc::new(KubeStatusSource::new());
    if !opts.dry_run() {
        cluster
            .connect()
            .await
            .context("Failed to connect to the Kubernetes cluster")?;
    }

    let service = SprayService::new(helm, Arc::new(StatusProber::new(cluster)));
    let report = service.run(plan, &opts).await?;

    debug!("Spray phases: {}", report.phase_trail());
    ui::print_success(&report.headline());
    if opts.verbose() {
        ui::print_block(&report.wave_lines());
    }
    Ok(())
}
