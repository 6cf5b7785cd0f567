//! CLI definitions for spray
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::Parser;
use std::time::Duration;

use crate::config::{
    self, HelmFlags, SprayOptions, ValuesOptions, DEFAULT_NAMESPACE, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS,
};

#[derive(Parser, Debug)]
#[command(
    name = "spray",
    about = "Upgrade the sub-charts of an umbrella chart one weight at a time",
    long_about = "Upgrades every sub-chart of an umbrella chart as its own release.\n\
                  Sub-charts are processed by ascending weight; each weight waits for\n\
                  the liveness and readiness of its workloads before the next one starts.",
    disable_version_flag = true
)]
pub struct Cli {
    /// Chart directory, packaged chart, repository reference or URL
    #[arg(value_name = "CHART")]
    pub chart: String,

    /// Chart version, when fetching from a repository
    #[arg(long = "version")]
    pub chart_version: Option<String>,

    /// Only upgrade these sub-charts (name or alias)
    #[arg(short, long = "target", value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Upgrade every sub-chart except these (name or alias)
    #[arg(short = 'x', long = "exclude", value_delimiter = ',')]
    pub excludes: Vec<String>,

    /// Prefix release names with "<prefix>-"
    #[arg(long)]
    pub prefix_releases: Option<String>,

    /// Prefix release names with "<namespace>-"
    #[arg(long)]
    pub prefix_releases_with_namespace: bool,

    /// Namespace to spray into
    #[arg(short, long, env = "HELM_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Create the namespace if it does not exist
    #[arg(long)]
    pub create_namespace: bool,

    /// Reset values to the ones built into the chart
    #[arg(long)]
    pub reset_values: bool,

    /// Reuse the last release's values (skips values include expansion)
    #[arg(long)]
    pub reuse_values: bool,

    /// Values files or URLs
    #[arg(short = 'f', long = "values", value_delimiter = ',')]
    pub value_files: Vec<String>,

    /// Set values (key1=val1,key2=val2)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Set string values (key1=val1,key2=val2)
    #[arg(long = "set-string")]
    pub set_string: Vec<String>,

    /// Set values from files (key1=path1,key2=path2)
    #[arg(long = "set-file")]
    pub set_file: Vec<String>,

    /// Force resource updates through delete/recreate
    #[arg(long)]
    pub force: bool,

    /// Seconds to wait for each release and for each weight's readiness
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Seconds between two readiness polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval: u64,

    /// Simulate the upgrades
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable helm debug output (implies --verbose)
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Typed options for the run; `HELM_DEBUG` from the environment counts as
    /// `--debug`.
    pub fn into_options(self) -> SprayOptions {
        self.into_options_with_env_debug(config::helm_debug_from_env())
    }

    fn into_options_with_env_debug(self, env_debug: bool) -> SprayOptions {
        SprayOptions {
            chart: self.chart,
            chart_version: self.chart_version.filter(|v| !v.is_empty()),
            namespace: self.namespace,
            targets: self.targets,
            excludes: self.excludes,
            prefix_releases: self.prefix_releases,
            prefix_releases_with_namespace: self.prefix_releases_with_namespace,
            values: ValuesOptions {
                value_files: self.value_files,
                values: self.set,
                string_values: self.set_string,
                file_values: self.set_file,
            },
            helm: HelmFlags {
                create_namespace: self.create_namespace,
                reset_values: self.reset_values,
                reuse_values: self.reuse_values,
                force: self.force,
                dry_run: self.dry_run,
                debug: self.debug || env_debug,
            },
            timeout: Duration::from_secs(self.timeout),
            poll_interval: Duration::from_secs(self.poll_interval),
            verbose: self.verbose,
        }
    }
}
