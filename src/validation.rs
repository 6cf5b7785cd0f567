//! Pre-flight checks
//!
//! Everything that can be rejected before a single release is touched is
//! rejected here: flag combinations first, filter names once units exist.

use crate::chart::ChartSource;
use crate::config::{ReleasePrefix, SprayOptions};
use crate::domain::unit::{TargetFilter, Unit};
use crate::error::{ConfigError, ValidationError};
use crate::tools::{ensure_tool, tools::HELM};

/// Validated flag combinations of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedOptions {
    pub filter: TargetFilter,
    pub prefix: ReleasePrefix,
}

/// Mutually exclusive flags and prefix syntax
pub fn check_options(opts: &SprayOptions) -> Result<CheckedOptions, ConfigError> {
    let filter = TargetFilter::new(&opts.targets, &opts.excludes)?;
    let prefix = opts.release_prefix()?;
    Ok(CheckedOptions { filter, prefix })
}

/// `--version` is only meaningful for charts fetched from a repository
pub fn check_chart_version(source: &ChartSource, version: Option<&str>) -> Result<(), ConfigError> {
    source.check_version(version)
}

/// `helm` must be reachable before anything else happens
pub fn ensure_helm() -> Result<(), ConfigError> {
    ensure_tool(HELM)
}

/// Every `--target` / `--exclude` name must match a unit's used name
pub fn check_filter_names(filter: &TargetFilter, units: &[Unit]) -> Result<(), ValidationError> {
    match filter.unknown_name(units) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
