//! Typed options of one spray invocation.

use serde::Serialize;
use std::time::Duration;

use super::prefix::ReleasePrefix;

/// Default for `--timeout`, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default delay between two readiness polls, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// User-supplied values, forwarded verbatim to every helm call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValuesOptions {
    /// `-f/--values`: local files or URLs
    pub value_files: Vec<String>,
    /// `--set`
    pub values: Vec<String>,
    /// `--set-string`
    pub string_values: Vec<String>,
    /// `--set-file`
    pub file_values: Vec<String>,
}

/// Flags passed through to `helm upgrade` untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HelmFlags {
    pub create_namespace: bool,
    pub reset_values: bool,
    pub reuse_values: bool,
    pub force: bool,
    pub dry_run: bool,
    pub debug: bool,
}

/// Everything one run needs to know
#[derive(Debug, Clone, Serialize)]
pub struct SprayOptions {
    /// Chart reference: directory, archive, repo reference or URL
    pub chart: String,
    pub chart_version: Option<String>,
    pub namespace: String,
    pub targets: Vec<String>,
    pub excludes: Vec<String>,
    pub prefix_releases: Option<String>,
    pub prefix_releases_with_namespace: bool,
    pub values: ValuesOptions,
    pub helm: HelmFlags,
    #[serde(with = "humantime_serde_secs")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde_secs")]
    pub poll_interval: Duration,
    pub verbose: bool,
}

impl SprayOptions {
    pub fn new(chart: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            chart: chart.into(),
            chart_version: None,
            namespace: namespace.into(),
            targets: Vec::new(),
            excludes: Vec::new(),
            prefix_releases: None,
            prefix_releases_with_namespace: false,
            values: ValuesOptions::default(),
            helm: HelmFlags::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            verbose: false,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.helm.dry_run
    }

    /// `--debug` implies `--verbose`
    pub fn verbose(&self) -> bool {
        self.verbose || self.helm.debug
    }

    /// One-line JSON rendering of every option, logged when `--debug` is on
    pub fn debug_dump(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The single prefix mode in effect. Fails if both modes were requested.
    pub fn release_prefix(&self) -> Result<ReleasePrefix, crate::error::ConfigError> {
        ReleasePrefix::from_flags(
            self.prefix_releases.as_deref(),
            self.prefix_releases_with_namespace,
        )
    }
}

/// Durations render as `5m` / `30s` in debug dumps of the options
mod humantime_serde_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }
}
