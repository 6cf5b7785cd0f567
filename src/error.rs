//! Centralized error types for spray
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for a spray run.
///
/// Every variant is fatal: the run stops at the point of failure and
/// nothing is rolled back.
#[derive(Error, Debug)]
pub enum SprayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    #[error("Timeout error: {0}")]
    Timeout(#[from] TimeoutError),
}

/// Invalid flag combinations, detected before anything is resolved.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot use both --target and --exclude together")]
    TargetAndExclude,

    #[error("cannot use both --prefix-releases and --prefix-releases-with-namespace together")]
    ConflictingPrefixes,

    #[error("invalid release prefix \"{prefix}\": allowed characters are a-z A-Z 0-9 and -")]
    InvalidPrefix { prefix: String },

    #[error("cannot use --version together with {source_kind}")]
    VersionWithLocalChart { source_kind: String },

    #[error("required tool \"{tool}\" not found in PATH (set {env_var} to override)")]
    ToolNotFound { tool: String, env_var: String },
}

/// Problems found once units are resolved, before the first upgrade.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid targeted sub-chart name/alias \"{name}\"")]
    UnknownTarget { name: String },

    #[error("invalid excluded sub-chart name/alias \"{name}\"")]
    UnknownExclude { name: String },

    #[error("weight value for sub-chart \"{unit}\" shall be positive or equal to zero (got {value})")]
    NegativeWeight { unit: String, value: i64 },

    #[error("weight value for sub-chart \"{unit}\" shall be an integer (got {value})")]
    NonIntegerWeight { unit: String, value: String },
}

/// Chart loading, fetching and values merging errors.
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("chart not found at {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("fetching chart {chart}: {message}")]
    Fetch { chart: String, message: String },

    #[error("finding file \"{file}\" referenced in the \"{clause}\" clause of the default values file of the umbrella chart")]
    IncludeNotFound { file: String, clause: String },

    #[error("finding values matching path \"{path}\" in values file \"{file}\"")]
    IncludePathNotFound { file: String, path: String },

    #[error("invalid value override \"{expression}\": {message}")]
    InvalidOverride { expression: String, message: String },
}

/// Release collaborator failures. Fatal at the current unit.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("calling helm upgrade for release \"{release}\": {message}")]
    UpgradeFailed { release: String, message: String },

    #[error("status returned by helm for release \"{release}\" is \"{status}\" instead of \"deployed\", spray interrupted")]
    UnexpectedStatus { release: String, status: String },

    #[error("listing releases in namespace {namespace}: {message}")]
    ListFailed { namespace: String, message: String },
}

/// The readiness barrier of a wave did not resolve in time.
#[derive(Error, Debug)]
#[error("timed out after {timeout_secs}s waiting for liveness and readiness of weight {weight} workloads: {}", .pending.join(", "))]
pub struct TimeoutError {
    pub weight: u32,
    pub timeout_secs: u64,
    pub attempts: u32,
    /// `kind/name` of every workload still not ready at the deadline
    pub pending: Vec<String>,
}

/// Non-fatal conditions. Logged as warnings, never propagated.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProbeWarning {
    #[error("skipping unparseable manifest fragment #{index} of release \"{release}\": {message}")]
    MalformedFragment {
        release: String,
        index: usize,
        message: String,
    },

    #[error("skipping {kind} without metadata.name in release \"{release}\"")]
    UnnamedWorkload { release: String, kind: String },

    #[error("{kind} \"{name}\" not found in namespace {namespace} yet")]
    WorkloadNotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("querying {kind} status in namespace {namespace} failed: {message}")]
    QueryFailed {
        kind: String,
        namespace: String,
        message: String,
    },
}
